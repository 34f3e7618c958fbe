//! Directory error types.

use crate::error::LibrariumError;
use thiserror::Error;

/// Typed outcome of `accept_invitation`.
///
/// Mirrors the platform's documented error codes one-to-one.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AcceptInvitationError {
    #[error("Invalid invitation token")]
    InvalidToken,

    #[error("This invitation has expired")]
    Expired,

    #[error("This invitation is no longer pending")]
    NotPending,

    #[error("This invitation was sent to a different email address")]
    EmailMismatch,

    #[error("The organization has reached its member limit")]
    UserLimitReached,

    #[error("You are already a member of this organization")]
    AlreadyMember,

    #[error("Invitation could not be accepted: {0}")]
    Other(String),
}

impl AcceptInvitationError {
    /// Map a platform error code to the typed variant.
    #[must_use]
    pub fn from_code(code: &str) -> Self {
        match code {
            "invalid_token" => Self::InvalidToken,
            "invitation_expired" => Self::Expired,
            "invitation_not_pending" => Self::NotPending,
            "email_mismatch" => Self::EmailMismatch,
            "user_limit_reached" => Self::UserLimitReached,
            "already_member" => Self::AlreadyMember,
            other => Self::Other(other.to_string()),
        }
    }
}

/// Errors from directory operations.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// The principal has no membership in the target organization.
    #[error("You are not a member of this organization")]
    NotAMember,

    /// The requested slug is already in use. User-correctable.
    #[error("The slug '{slug}' is already taken")]
    SlugTaken { slug: String },

    /// The platform rejected the request for another stated reason.
    #[error("{0}")]
    Rejected(String),

    #[error(transparent)]
    Invitation(#[from] AcceptInvitationError),

    #[error(transparent)]
    Platform(#[from] LibrariumError),
}

impl From<DirectoryError> for LibrariumError {
    fn from(err: DirectoryError) -> Self {
        match err {
            DirectoryError::NotAMember => LibrariumError::Forbidden(err.to_string()),
            DirectoryError::SlugTaken { .. }
            | DirectoryError::Rejected(_)
            | DirectoryError::Invitation(_) => LibrariumError::BadRequest(err.to_string()),
            DirectoryError::Platform(inner) => inner,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accept_codes_round_trip() {
        assert_eq!(
            AcceptInvitationError::from_code("invalid_token"),
            AcceptInvitationError::InvalidToken
        );
        assert_eq!(
            AcceptInvitationError::from_code("invitation_expired"),
            AcceptInvitationError::Expired
        );
        assert_eq!(
            AcceptInvitationError::from_code("invitation_not_pending"),
            AcceptInvitationError::NotPending
        );
        assert_eq!(
            AcceptInvitationError::from_code("email_mismatch"),
            AcceptInvitationError::EmailMismatch
        );
        assert_eq!(
            AcceptInvitationError::from_code("user_limit_reached"),
            AcceptInvitationError::UserLimitReached
        );
        assert_eq!(
            AcceptInvitationError::from_code("already_member"),
            AcceptInvitationError::AlreadyMember
        );
        assert!(matches!(
            AcceptInvitationError::from_code("surprise"),
            AcceptInvitationError::Other(_)
        ));
    }
}
