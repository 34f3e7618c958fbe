use crate::error::Result;
use crate::platform::PlatformClient;
use crate::session::Principal;
use std::sync::Arc;
use tracing::warn;

/// Background synchronization of the denormalized profile record.
///
/// Runs after every successful authentication change. The task is
/// detached: it may complete after the triggering caller is gone, and a
/// failure is logged but never propagated to the authentication path.
#[derive(Clone)]
pub struct ProfileSync {
    platform: Arc<dyn PlatformClient>,
}

impl ProfileSync {
    pub fn new(platform: Arc<dyn PlatformClient>) -> Self {
        Self { platform }
    }

    /// Synchronous variant used by registration, where the profile link is
    /// part of the operation and its failure triggers compensation.
    pub async fn sync_now(
        &self,
        user_id: &str,
        email: &str,
        metadata: &serde_json::Value,
    ) -> Result<()> {
        self.platform.upsert_profile(user_id, email, metadata).await
    }

    /// Fire-and-forget sync for an authenticated principal.
    pub fn spawn(&self, principal: Principal) {
        let platform = Arc::clone(&self.platform);
        tokio::spawn(async move {
            if let Err(err) = platform
                .upsert_profile(&principal.id, &principal.email, &principal.metadata)
                .await
            {
                warn!(user_id = %principal.id, error = %err, "Profile sync failed");
            }
        });
    }
}
