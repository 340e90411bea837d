//! Time-based gates driven by the station tick.

use std::time::{Duration, Instant};

use crew_net::SessionState;

/// Rate limit on the action button.
#[derive(Debug, Clone)]
pub struct Cooldown {
    length: Duration,
    started: Option<Instant>,
}

impl Cooldown {
    /// Cooldown lasting `length` after each accepted press.
    pub fn new(length: Duration) -> Self {
        Self {
            length,
            started: None,
        }
    }

    /// Whether a press at `now` would be ignored.
    pub fn is_active(&self, now: Instant) -> bool {
        self.started
            .is_some_and(|started| now.saturating_duration_since(started) <= self.length)
    }

    /// Accept a press at `now` unless the cooldown is running; an accepted
    /// press restarts it.
    pub fn try_start(&mut self, now: Instant) -> bool {
        if self.is_active(now) {
            return false;
        }
        self.started = Some(now);
        true
    }
}

/// Holds the level-changed pulse up for a fixed settle time, then lowers it.
///
/// The first tick that sees the pulse records the time; the tick that finds
/// more than `settle` elapsed clears it via
/// [`SessionState::clear_level_changed`].
#[derive(Debug, Clone)]
pub struct LevelTransition {
    settle: Duration,
    started: Option<Instant>,
}

impl LevelTransition {
    /// Transition gate with the given settle time.
    pub fn new(settle: Duration) -> Self {
        Self {
            settle,
            started: None,
        }
    }

    /// Advance the gate. Returns whether this tick is inside a transition.
    pub fn update(&mut self, session: &SessionState, now: Instant) -> bool {
        if !session.level_changed() {
            self.started = None;
            return false;
        }

        let started = *self.started.get_or_insert(now);
        if now.saturating_duration_since(started) > self.settle {
            if session.clear_level_changed() {
                tracing::debug!("Level transition settled");
            }
            self.started = None;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crew_net::Level;

    const SECOND: Duration = Duration::from_secs(1);

    #[test]
    fn test_cooldown_blocks_second_press() {
        let t0 = Instant::now();
        let mut cooldown = Cooldown::new(5 * SECOND);

        assert!(cooldown.try_start(t0));
        assert!(!cooldown.try_start(t0 + SECOND));
        assert!(!cooldown.try_start(t0 + 5 * SECOND));
        assert!(cooldown.try_start(t0 + 6 * SECOND));
    }

    #[test]
    fn test_cooldown_initially_inactive() {
        let cooldown = Cooldown::new(5 * SECOND);
        assert!(!cooldown.is_active(Instant::now()));
    }

    #[test]
    fn test_transition_settles_after_two_and_a_half_seconds() {
        let session = SessionState::new();
        let mut transition = LevelTransition::new(Duration::from_millis(2500));
        session.set_level(Level(2));

        let t0 = Instant::now();
        assert!(transition.update(&session, t0));
        assert!(transition.update(&session, t0 + SECOND));
        assert!(transition.update(&session, t0 + Duration::from_millis(2500)));
        assert!(session.level_changed());

        // clearing tick still counts as inside the transition
        assert!(transition.update(&session, t0 + Duration::from_millis(2600)));
        assert!(!session.level_changed());

        assert!(!transition.update(&session, t0 + 3 * SECOND));
        assert!(!session.level_changed());
    }

    #[test]
    fn test_no_pulse_no_transition() {
        let session = SessionState::new();
        let mut transition = LevelTransition::new(Duration::from_millis(2500));
        assert!(!transition.update(&session, Instant::now()));
    }

    #[test]
    fn test_new_pulse_restarts_timer() {
        let session = SessionState::new();
        let mut transition = LevelTransition::new(SECOND);
        let t0 = Instant::now();

        session.set_level(Level(1));
        transition.update(&session, t0);
        transition.update(&session, t0 + 2 * SECOND);
        assert!(!session.level_changed());

        session.set_level(Level(2));
        assert!(transition.update(&session, t0 + 10 * SECOND));
        assert!(transition.update(&session, t0 + 10 * SECOND + Duration::from_millis(500)));
        assert!(session.level_changed());
    }
}
