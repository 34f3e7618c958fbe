//! Mock identity provider for tests.

use super::store::{AuthError, IdentityProvider, Principal};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

#[derive(Clone)]
struct MockUser {
    id: String,
    password: String,
    metadata: serde_json::Value,
}

/// In-memory [`IdentityProvider`].
///
/// Records reset/magic-link requests so tests can assert delivery without
/// distinguishing unknown addresses at the call site.
#[derive(Default)]
pub struct MockIdentityProvider {
    users: RwLock<HashMap<String, MockUser>>, // email -> user
    reset_requests: RwLock<Vec<String>>,
    magic_link_requests: RwLock<Vec<String>>,
}

impl MockIdentityProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-register a user with a fixed id.
    pub fn seed_user(&self, id: &str, email: &str, password: &str) {
        self.users.write().unwrap().insert(
            email.to_lowercase(),
            MockUser {
                id: id.to_string(),
                password: password.to_string(),
                metadata: serde_json::Value::Null,
            },
        );
    }

    /// Whether a user with this email currently exists.
    #[must_use]
    pub fn has_user(&self, email: &str) -> bool {
        self.users
            .read()
            .unwrap()
            .contains_key(&email.to_lowercase())
    }

    /// Emails that requested a password reset.
    #[must_use]
    pub fn reset_requests(&self) -> Vec<String> {
        self.reset_requests.read().unwrap().clone()
    }

    /// Emails that requested a magic link.
    #[must_use]
    pub fn magic_link_requests(&self) -> Vec<String> {
        self.magic_link_requests.read().unwrap().clone()
    }
}

#[async_trait]
impl IdentityProvider for MockIdentityProvider {
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Principal, AuthError> {
        let users = self.users.read().unwrap();
        // One error for both unknown email and bad password.
        let user = users.get(email).ok_or(AuthError::InvalidCredentials)?;
        if user.password != password {
            return Err(AuthError::InvalidCredentials);
        }
        Ok(Principal {
            id: user.id.clone(),
            email: email.to_string(),
            metadata: user.metadata.clone(),
        })
    }

    async fn admin_create_user(
        &self,
        email: &str,
        password: &str,
        metadata: &serde_json::Value,
    ) -> Result<Principal, AuthError> {
        let mut users = self.users.write().unwrap();
        if users.contains_key(email) {
            return Err(AuthError::RegistrationFailed {
                reason: "email already registered".to_string(),
            });
        }
        let user = MockUser {
            id: Uuid::new_v4().to_string(),
            password: password.to_string(),
            metadata: metadata.clone(),
        };
        let principal = Principal {
            id: user.id.clone(),
            email: email.to_string(),
            metadata: metadata.clone(),
        };
        users.insert(email.to_string(), user);
        Ok(principal)
    }

    async fn admin_delete_user(&self, user_id: &str) -> Result<(), AuthError> {
        self.users.write().unwrap().retain(|_, u| u.id != user_id);
        Ok(())
    }

    async fn send_reset_email(&self, email: &str) -> Result<(), AuthError> {
        if !self.users.read().unwrap().contains_key(email) {
            return Err(AuthError::Provider("user not found".to_string()));
        }
        self.reset_requests.write().unwrap().push(email.to_string());
        Ok(())
    }

    async fn send_magic_link(&self, email: &str) -> Result<(), AuthError> {
        if !self.users.read().unwrap().contains_key(email) {
            return Err(AuthError::Provider("user not found".to_string()));
        }
        self.magic_link_requests
            .write()
            .unwrap()
            .push(email.to_string());
        Ok(())
    }

    async fn update_password(&self, user_id: &str, new_password: &str) -> Result<(), AuthError> {
        let mut users = self.users.write().unwrap();
        let user = users
            .values_mut()
            .find(|u| u.id == user_id)
            .ok_or(AuthError::NotAuthenticated)?;
        user.password = new_password.to_string();
        Ok(())
    }
}
