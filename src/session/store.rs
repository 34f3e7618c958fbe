use super::profile_sync::ProfileSync;
use crate::error::LibrariumError;
use crate::platform::PlatformClient;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, instrument, warn};

/// Minimum password length enforced before calling the provider.
pub const MIN_PASSWORD_LEN: usize = 6;

/// An authenticated end-user identity.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Principal {
    pub id: String,
    pub email: String,
    /// Opaque profile metadata (username, full name, avatar, ...).
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// Errors surfaced by session operations.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Bad password or unknown email. The provider does not distinguish
    /// the two cases to the caller.
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Registration failed: {reason}")]
    RegistrationFailed { reason: String },

    #[error("Password must be at least {min} characters")]
    WeakPassword { min: usize },

    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("Identity provider error: {0}")]
    Provider(String),
}

impl From<AuthError> for LibrariumError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials | AuthError::NotAuthenticated => {
                LibrariumError::Unauthorized(err.to_string())
            }
            AuthError::RegistrationFailed { .. } | AuthError::WeakPassword { .. } => {
                LibrariumError::BadRequest(err.to_string())
            }
            AuthError::Provider(msg) => LibrariumError::ServiceUnavailable(msg),
        }
    }
}

/// The external identity provider.
///
/// `admin_*` operations run with a privileged key on the server side and
/// never with an end-user session.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Principal, AuthError>;

    async fn admin_create_user(
        &self,
        email: &str,
        password: &str,
        metadata: &serde_json::Value,
    ) -> Result<Principal, AuthError>;

    async fn admin_delete_user(&self, user_id: &str) -> Result<(), AuthError>;

    async fn send_reset_email(&self, email: &str) -> Result<(), AuthError>;

    async fn send_magic_link(&self, email: &str) -> Result<(), AuthError>;

    async fn update_password(&self, user_id: &str, new_password: &str) -> Result<(), AuthError>;
}

/// Holds the active [`Principal`] and performs authentication operations
/// against the identity provider.
///
/// Every change to the principal is published on a watch channel; the
/// tenant context subscribes and re-resolves on each change. A successful
/// authentication also triggers a fire-and-forget profile sync that can
/// never fail the authentication itself.
pub struct SessionStore {
    provider: Arc<dyn IdentityProvider>,
    principal_tx: watch::Sender<Option<Principal>>,
    profile_sync: ProfileSync,
}

impl SessionStore {
    pub fn new(provider: Arc<dyn IdentityProvider>, platform: Arc<dyn PlatformClient>) -> Self {
        let (principal_tx, _) = watch::channel(None);
        Self {
            provider,
            principal_tx,
            profile_sync: ProfileSync::new(platform),
        }
    }

    /// The currently authenticated principal, if any.
    #[must_use]
    pub fn current(&self) -> Option<Principal> {
        self.principal_tx.borrow().clone()
    }

    /// Subscribe to principal changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<Principal>> {
        self.principal_tx.subscribe()
    }

    /// Authenticate with email and password.
    #[instrument(skip(self, password), fields(email = %email))]
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Principal, AuthError> {
        let email = email.trim().to_lowercase();
        let principal = self.provider.sign_in_with_password(&email, password).await?;

        info!(user_id = %principal.id, "Signed in");
        self.set_principal(Some(principal.clone()));
        Ok(principal)
    }

    /// Register a new account, then authenticate it.
    ///
    /// The identity record is created through the privileged server-side
    /// step; if the profile-linking step fails afterwards, the partially
    /// created identity is deleted again before the error is reported.
    #[instrument(skip(self, password), fields(email = %email))]
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        username: &str,
        full_name: &str,
    ) -> Result<Principal, AuthError> {
        let email = email.trim().to_lowercase();
        if !crate::directory::is_valid_email(&email) {
            return Err(AuthError::RegistrationFailed {
                reason: "invalid email format".to_string(),
            });
        }
        if password.len() < MIN_PASSWORD_LEN {
            return Err(AuthError::WeakPassword {
                min: MIN_PASSWORD_LEN,
            });
        }

        let metadata = json!({
            "username": username,
            "full_name": full_name,
        });

        let created = self
            .provider
            .admin_create_user(&email, password, &metadata)
            .await?;

        // Link the denormalized profile record. On failure, compensate by
        // deleting the identity we just created so registration stays
        // all-or-nothing from the caller's perspective.
        if let Err(err) = self
            .profile_sync
            .sync_now(&created.id, &email, &metadata)
            .await
        {
            warn!(user_id = %created.id, error = %err, "Profile link failed, rolling back registration");
            if let Err(delete_err) = self.provider.admin_delete_user(&created.id).await {
                warn!(user_id = %created.id, error = %delete_err, "Compensating deletion failed");
            }
            return Err(AuthError::RegistrationFailed {
                reason: "could not initialize account profile".to_string(),
            });
        }

        let principal = self.provider.sign_in_with_password(&email, password).await?;

        info!(user_id = %principal.id, "Registered and signed in");
        self.set_principal(Some(principal.clone()));
        Ok(principal)
    }

    /// Clear the active principal.
    #[instrument(skip(self))]
    pub async fn sign_out(&self) {
        if let Some(principal) = self.current() {
            info!(user_id = %principal.id, "Signed out");
        }
        self.set_principal(None);
    }

    /// Request a password-reset email.
    ///
    /// Always reports success, even for unknown addresses, so callers
    /// cannot enumerate accounts. Provider failures are logged only.
    #[instrument(skip(self))]
    pub async fn reset_password(&self, email: &str) {
        let email = email.trim().to_lowercase();
        if let Err(err) = self.provider.send_reset_email(&email).await {
            info!(email = %email, error = %err, "Password reset request not delivered");
        }
    }

    /// Request a magic-link email. Same enumeration-safe contract as
    /// [`reset_password`](Self::reset_password).
    #[instrument(skip(self))]
    pub async fn sign_in_with_magic_link(&self, email: &str) {
        let email = email.trim().to_lowercase();
        if let Err(err) = self.provider.send_magic_link(&email).await {
            info!(email = %email, error = %err, "Magic link request not delivered");
        }
    }

    /// Change the password of the authenticated principal.
    #[instrument(skip(self, new_password))]
    pub async fn update_password(&self, new_password: &str) -> Result<(), AuthError> {
        let principal = self.current().ok_or(AuthError::NotAuthenticated)?;
        if new_password.len() < MIN_PASSWORD_LEN {
            return Err(AuthError::WeakPassword {
                min: MIN_PASSWORD_LEN,
            });
        }
        self.provider
            .update_password(&principal.id, new_password)
            .await?;
        info!(user_id = %principal.id, "Password updated");
        Ok(())
    }

    fn set_principal(&self, principal: Option<Principal>) {
        if let Some(ref p) = principal {
            // Best-effort background sync; never blocks or fails the
            // authentication path.
            self.profile_sync.spawn(p.clone());
        }
        self.principal_tx.send_replace(principal);
    }
}
