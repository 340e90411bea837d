//! Station roles, role availability, levels, and session identifiers.

use std::fmt;
use std::str::FromStr;

/// One of the fixed station identities a client can hold during a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Operations commander.
    OppsCommander,
    /// Weapons officer.
    WeaponsOfficer,
    /// Captain.
    Captain,
}

impl Role {
    /// Every role, in wire order.
    pub const ALL: [Role; 3] = [Role::OppsCommander, Role::WeaponsOfficer, Role::Captain];

    /// Position of this role in [`Role::ALL`] and in availability triples.
    pub fn index(self) -> usize {
        match self {
            Role::OppsCommander => 0,
            Role::WeaponsOfficer => 1,
            Role::Captain => 2,
        }
    }

    /// Name used on the wire and in telemetry fragments.
    pub fn as_str(self) -> &'static str {
        match self {
            Role::OppsCommander => "OppsCommander",
            Role::WeaponsOfficer => "WeaponsOfficer",
            Role::Captain => "Captain",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a role name does not match any [`Role`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role '{0}'")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| UnknownRole(s.to_string()))
    }
}

/// Which roles can still be selected, one flag per role in wire order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleAvailability([bool; 3]);

impl Default for RoleAvailability {
    /// Every role open.
    fn default() -> Self {
        Self([true; 3])
    }
}

impl RoleAvailability {
    /// Build from a flag triple ordered like [`Role::ALL`].
    pub fn from_flags(flags: [bool; 3]) -> Self {
        Self(flags)
    }

    /// Build from a flag slice; `None` unless it holds exactly three flags.
    pub fn from_slice(flags: &[bool]) -> Option<Self> {
        <[bool; 3]>::try_from(flags).ok().map(Self)
    }

    /// The flag triple, ordered like [`Role::ALL`].
    pub fn flags(&self) -> [bool; 3] {
        self.0
    }

    /// Whether `role` can still be selected.
    pub fn is_available(&self, role: Role) -> bool {
        self.0[role.index()]
    }

    /// Set the flag for `role`.
    pub fn set(&mut self, role: Role, available: bool) {
        self.0[role.index()] = available;
    }

    /// Roles that are still open.
    pub fn available_roles(&self) -> impl Iterator<Item = Role> + '_ {
        Role::ALL.into_iter().filter(|role| self.is_available(*role))
    }
}

/// Game level identifier. Level 0 is the lobby.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Level(pub u8);

impl Level {
    /// The lobby ("cave"). Entering it raises no transition pulse.
    pub const LOBBY: Level = Level(0);
    /// Level a station shows before the host says otherwise.
    pub const FIRST: Level = Level(1);

    /// Whether this is the lobby level.
    pub fn is_lobby(self) -> bool {
        self == Self::LOBBY
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque per-connection session identifier carried as a packet's sender.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    /// Fresh random identifier in UUID v4 text form.
    pub fn generate() -> Self {
        let mut bytes: [u8; 16] = rand::random();
        bytes[6] = (bytes[6] & 0x0f) | 0x40;
        bytes[8] = (bytes[8] & 0x3f) | 0x80;

        let hex: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
        Self(format!(
            "{}-{}-{}-{}-{}",
            &hex[0..8],
            &hex[8..12],
            &hex[12..16],
            &hex[16..20],
            &hex[20..32]
        ))
    }

    /// Wrap an identifier received from the host.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The identifier text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_names_parse_back() {
        for role in Role::ALL {
            assert_eq!(role.as_str().parse::<Role>(), Ok(role));
        }
    }

    #[test]
    fn test_unknown_role_rejected() {
        let result = "Navigator".parse::<Role>();
        assert_eq!(result, Err(UnknownRole("Navigator".to_string())));
    }

    #[test]
    fn test_role_index_matches_all_order() {
        for (i, role) in Role::ALL.into_iter().enumerate() {
            assert_eq!(role.index(), i);
        }
    }

    #[test]
    fn test_availability_defaults_open() {
        let availability = RoleAvailability::default();
        assert_eq!(availability.available_roles().count(), 3);
    }

    #[test]
    fn test_availability_set_touches_one_role() {
        let mut availability = RoleAvailability::default();
        availability.set(Role::WeaponsOfficer, false);
        assert_eq!(availability.flags(), [true, false, true]);
        assert!(!availability.is_available(Role::WeaponsOfficer));
    }

    #[test]
    fn test_availability_from_slice_requires_three() {
        assert!(RoleAvailability::from_slice(&[true, false]).is_none());
        assert!(RoleAvailability::from_slice(&[true, false, true, true]).is_none());
        assert_eq!(
            RoleAvailability::from_slice(&[false, true, false]),
            Some(RoleAvailability::from_flags([false, true, false]))
        );
    }

    #[test]
    fn test_lobby_level() {
        assert!(Level::LOBBY.is_lobby());
        assert!(!Level::FIRST.is_lobby());
    }

    #[test]
    fn test_session_id_is_uuid_v4_shaped() {
        let id = SessionId::generate();
        let text = id.as_str();
        assert_eq!(text.len(), 36);
        let groups: Vec<&str> = text.split('-').collect();
        assert_eq!(
            groups.iter().map(|g| g.len()).collect::<Vec<_>>(),
            vec![8, 4, 4, 4, 12]
        );
        assert!(groups[2].starts_with('4'));
    }

    #[test]
    fn test_session_ids_are_unique() {
        assert_ne!(SessionId::generate(), SessionId::generate());
    }
}
