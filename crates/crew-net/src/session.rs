//! Shared session state read by the station tick and written by dispatch.
//!
//! Every field has exactly one writer:
//!
//! | field               | writer                                   |
//! |---------------------|------------------------------------------|
//! | `role`              | host application, once ([`SessionState::assign_role`]) |
//! | `availability`      | control-channel dispatch                 |
//! | `level`             | control-channel dispatch                 |
//! | `level_changed`     | set by dispatch, cleared by the host tick |
//!
//! Readers may sit on any thread. The state is shared as an
//! `Arc<SessionState>`; nothing here is global.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{OnceLock, PoisonError, RwLock};

use crate::role::{Level, Role, RoleAvailability};

/// Errors from session-state mutation.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SessionError {
    /// The station already holds a role for this session.
    #[error("role already assigned: {0}")]
    RoleAlreadyAssigned(Role),
}

/// Process-wide session state for one station.
#[derive(Debug)]
pub struct SessionState {
    role: OnceLock<Role>,
    availability: RwLock<RoleAvailability>,
    level: AtomicU8,
    level_changed: AtomicBool,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionState {
    /// Fresh state: no role, every role open, [`Level::FIRST`], no pulse.
    pub fn new() -> Self {
        Self {
            role: OnceLock::new(),
            availability: RwLock::new(RoleAvailability::default()),
            level: AtomicU8::new(Level::FIRST.0),
            level_changed: AtomicBool::new(false),
        }
    }

    // --- role ---

    /// Assign the station's role. Succeeds once per session.
    pub fn assign_role(&self, role: Role) -> Result<(), SessionError> {
        match self.role.set(role) {
            Ok(()) => {
                self.write_availability(|availability| availability.set(role, false));
                Ok(())
            }
            Err(_) => Err(SessionError::RoleAlreadyAssigned(
                self.role.get().copied().unwrap_or(role),
            )),
        }
    }

    /// The role held by this station, if assigned.
    pub fn role(&self) -> Option<Role> {
        self.role.get().copied()
    }

    // --- availability ---

    /// Snapshot of which roles can still be selected.
    pub fn availability(&self) -> RoleAvailability {
        *self
            .availability
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Mark `role` as taken. Other roles keep their flags.
    pub fn mark_taken(&self, role: Role) -> RoleAvailability {
        self.write_availability(|availability| availability.set(role, false))
    }

    /// Replace the whole availability mapping with the host's view.
    pub fn replace_availability(&self, availability: RoleAvailability) -> RoleAvailability {
        self.write_availability(|current| *current = availability)
    }

    /// Apply `update`, then hide the locally held role, and return the result.
    fn write_availability(&self, update: impl FnOnce(&mut RoleAvailability)) -> RoleAvailability {
        let mut guard = self
            .availability
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        update(&mut guard);
        if let Some(role) = self.role() {
            guard.set(role, false);
        }
        *guard
    }

    // --- level ---

    /// Current level.
    pub fn level(&self) -> Level {
        Level(self.level.load(Ordering::Acquire))
    }

    /// Store a level pushed by the host.
    ///
    /// Raises the level-changed pulse unless `level` is the lobby. Never
    /// clears a pulse that is already raised. Returns whether the pulse was
    /// raised by this call.
    pub fn set_level(&self, level: Level) -> bool {
        self.level.store(level.0, Ordering::Release);
        if level.is_lobby() {
            return false;
        }
        self.level_changed.store(true, Ordering::Release);
        true
    }

    /// Whether a level transition is in progress.
    pub fn level_changed(&self) -> bool {
        self.level_changed.load(Ordering::Acquire)
    }

    /// Lower the level-changed pulse.
    ///
    /// Returns `true` only for the caller that observed the pulse raised, so
    /// concurrent callers cannot both act on one transition.
    pub fn clear_level_changed(&self) -> bool {
        self.level_changed
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_new_state_defaults() {
        let state = SessionState::new();
        assert_eq!(state.role(), None);
        assert_eq!(state.level(), Level::FIRST);
        assert!(!state.level_changed());
        assert_eq!(state.availability(), RoleAvailability::default());
    }

    #[test]
    fn test_role_assigned_once() {
        let state = SessionState::new();
        state.assign_role(Role::Captain).unwrap();
        assert_eq!(
            state.assign_role(Role::OppsCommander),
            Err(SessionError::RoleAlreadyAssigned(Role::Captain))
        );
        assert_eq!(state.role(), Some(Role::Captain));
    }

    #[test]
    fn test_mark_taken_keeps_other_flags() {
        let state = SessionState::new();
        state.replace_availability(RoleAvailability::from_flags([true, false, true]));

        let after = state.mark_taken(Role::OppsCommander);
        assert_eq!(after.flags(), [false, false, true]);
    }

    #[test]
    fn test_own_role_never_available() {
        let state = SessionState::new();
        state.assign_role(Role::WeaponsOfficer).unwrap();
        assert!(!state.availability().is_available(Role::WeaponsOfficer));

        let after = state.replace_availability(RoleAvailability::from_flags([true, true, true]));
        assert_eq!(after.flags(), [true, false, true]);
    }

    #[test]
    fn test_level_change_raises_pulse() {
        let state = SessionState::new();
        assert!(state.set_level(Level(3)));
        assert_eq!(state.level(), Level(3));
        assert!(state.level_changed());
    }

    #[test]
    fn test_lobby_does_not_raise_pulse() {
        let state = SessionState::new();
        assert!(!state.set_level(Level::LOBBY));
        assert_eq!(state.level(), Level::LOBBY);
        assert!(!state.level_changed());
    }

    #[test]
    fn test_lobby_does_not_clear_raised_pulse() {
        let state = SessionState::new();
        state.set_level(Level(2));
        state.set_level(Level::LOBBY);
        assert!(state.level_changed());
    }

    #[test]
    fn test_clear_pulse_succeeds_once() {
        let state = SessionState::new();
        state.set_level(Level(2));
        assert!(state.clear_level_changed());
        assert!(!state.clear_level_changed());
        assert!(!state.level_changed());
    }

    #[test]
    fn test_exactly_one_concurrent_clearer() {
        let state = Arc::new(SessionState::new());
        state.set_level(Level(4));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let state = Arc::clone(&state);
                std::thread::spawn(move || state.clear_level_changed())
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|cleared| *cleared)
            .count();
        assert_eq!(winners, 1);
    }
}
