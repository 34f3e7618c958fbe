//! Organization roles and capability derivation.
//!
//! Every page and handler derives its authorization decisions from the
//! single mapping here instead of comparing role strings locally.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Role of a principal within one organization.
///
/// Roles form a strict total order of privilege:
/// `owner > admin > librarian > member`. Exactly one owner exists per
/// organization; the platform enforces that invariant.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Organization owner with full permissions.
    Owner,
    /// Administrator: manages members, settings, and billing.
    Admin,
    /// Librarian: manages the catalog and circulation.
    Librarian,
    /// Regular member: borrows and reserves books.
    #[default]
    Member,
}

impl Role {
    /// Get the string representation of the role.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Admin => "admin",
            Self::Librarian => "librarian",
            Self::Member => "member",
        }
    }

    /// Get the hierarchy level (higher = more permissions).
    #[must_use]
    pub fn hierarchy_level(&self) -> u8 {
        match self {
            Self::Owner => 4,
            Self::Admin => 3,
            Self::Librarian => 2,
            Self::Member => 1,
        }
    }

    /// Check if this role has at least the permissions of another role.
    #[must_use]
    pub fn has_at_least(&self, other: &Self) -> bool {
        self.hierarchy_level() >= other.hierarchy_level()
    }

    /// Whether this is the owner role.
    #[must_use]
    pub fn is_owner(&self) -> bool {
        matches!(self, Self::Owner)
    }

    /// Whether this role carries administrative permissions.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        matches!(self, Self::Owner | Self::Admin)
    }

    /// Whether this role carries librarian permissions.
    #[must_use]
    pub fn is_librarian(&self) -> bool {
        matches!(self, Self::Owner | Self::Admin | Self::Librarian)
    }

    /// Whether this role can manage the book catalog.
    #[must_use]
    pub fn can_manage_books(&self) -> bool {
        self.is_librarian()
    }

    /// Whether this role can invite, remove, and re-role members.
    #[must_use]
    pub fn can_manage_members(&self) -> bool {
        self.is_admin()
    }
}

impl PartialOrd for Role {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Role {
    fn cmp(&self, other: &Self) -> Ordering {
        self.hierarchy_level().cmp(&other.hierarchy_level())
    }
}

/// Error returned when parsing a role string fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseRoleError {
    invalid_value: String,
}

impl fmt::Display for ParseRoleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid role: '{}' (expected: owner, admin, librarian, or member)",
            self.invalid_value
        )
    }
}

impl std::error::Error for ParseRoleError {}

impl FromStr for Role {
    type Err = ParseRoleError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "owner" => Ok(Self::Owner),
            "admin" => Ok(Self::Admin),
            "librarian" => Ok(Self::Librarian),
            "member" => Ok(Self::Member),
            _ => Err(ParseRoleError {
                invalid_value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Capability flags derived from a [`Role`].
///
/// These are recomputed from the role whenever the role changes, never
/// stored independently, so they cannot drift from it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    pub is_owner: bool,
    pub is_admin: bool,
    pub is_librarian: bool,
    pub can_manage_books: bool,
    pub can_manage_members: bool,
}

impl Capabilities {
    /// Derive the capability flags for a role.
    #[must_use]
    pub fn of(role: Role) -> Self {
        Self {
            is_owner: role.is_owner(),
            is_admin: role.is_admin(),
            is_librarian: role.is_librarian(),
            can_manage_books: role.can_manage_books(),
            can_manage_members: role.can_manage_members(),
        }
    }

    /// All-false flags, used when no tenant is resolved.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capability_mapping_is_total() {
        let owner = Capabilities::of(Role::Owner);
        assert!(owner.is_owner);
        assert!(owner.is_admin);
        assert!(owner.is_librarian);
        assert!(owner.can_manage_books);
        assert!(owner.can_manage_members);

        let admin = Capabilities::of(Role::Admin);
        assert!(!admin.is_owner);
        assert!(admin.is_admin);
        assert!(admin.is_librarian);
        assert!(admin.can_manage_books);
        assert!(admin.can_manage_members);

        let librarian = Capabilities::of(Role::Librarian);
        assert!(!librarian.is_owner);
        assert!(!librarian.is_admin);
        assert!(librarian.is_librarian);
        assert!(librarian.can_manage_books);
        assert!(!librarian.can_manage_members);

        let member = Capabilities::of(Role::Member);
        assert_eq!(member, Capabilities::none());
    }

    #[test]
    fn role_hierarchy() {
        assert!(Role::Owner > Role::Admin);
        assert!(Role::Admin > Role::Librarian);
        assert!(Role::Librarian > Role::Member);
        assert!(Role::Owner.has_at_least(&Role::Member));
        assert!(!Role::Librarian.has_at_least(&Role::Admin));
    }

    #[test]
    fn role_parsing() {
        assert_eq!("owner".parse::<Role>().unwrap(), Role::Owner);
        assert_eq!("ADMIN".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!("Librarian".parse::<Role>().unwrap(), Role::Librarian);
        assert_eq!("member".parse::<Role>().unwrap(), Role::Member);
        assert!("viewer".parse::<Role>().is_err());
    }

    #[test]
    fn role_serialization() {
        let role = Role::Librarian;
        let json = serde_json::to_string(&role).unwrap();
        assert_eq!(json, "\"librarian\"");

        let parsed: Role = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, role);
    }
}
