//! Customer portal orchestration.
//!
//! Creates processor portal sessions for subscription self-service. The
//! three failure categories (portal not configured, invalid customer,
//! generic processor error) are distinct remediation paths and stay
//! distinct all the way to the UI.

use super::client::{CreatePortalSessionRequest, PaymentClient, PaymentErrorCode, PortalSession};
use super::error::BillingError;
use crate::directory::DirectoryClient;
use crate::platform::PlatformClient;
use std::sync::Arc;
use tracing::{info, instrument};

/// Configuration for the customer portal.
#[derive(Debug, Clone)]
pub struct PortalConfig {
    pub return_url: String,
    /// Processor portal configuration id; `None` uses the default.
    pub configuration_id: Option<String>,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            return_url: "https://localhost/settings/billing".to_string(),
            configuration_id: None,
        }
    }
}

impl PortalConfig {
    #[must_use]
    pub fn new(return_url: impl Into<String>) -> Self {
        Self {
            return_url: return_url.into(),
            configuration_id: None,
        }
    }

    #[must_use]
    pub fn configuration_id(mut self, id: impl Into<String>) -> Self {
        self.configuration_id = Some(id.into());
        self
    }
}

/// Portal session orchestrator.
pub struct PortalManager<C: PaymentClient> {
    directory: DirectoryClient,
    client: Arc<C>,
    config: PortalConfig,
}

impl<C: PaymentClient> PortalManager<C> {
    pub fn new(platform: Arc<dyn PlatformClient>, client: Arc<C>, config: PortalConfig) -> Self {
        Self {
            directory: DirectoryClient::new(platform),
            client,
            config,
        }
    }

    /// Open a billing portal session for an organization.
    ///
    /// Only owners and admins may manage billing; the organization must
    /// already have a linked customer record.
    #[instrument(skip(self))]
    pub async fn manage_billing(
        &self,
        organization_id: &str,
        user_id: &str,
    ) -> Result<PortalSession, BillingError> {
        let role = self
            .directory
            .member_role(organization_id, user_id)
            .await?
            .ok_or(BillingError::Forbidden)?;
        if !role.is_admin() {
            return Err(BillingError::Forbidden);
        }

        let organization = self.directory.organization(organization_id).await?;
        let customer_id =
            organization
                .stripe_customer_id
                .ok_or_else(|| BillingError::NoCustomer {
                    organization_id: organization_id.to_string(),
                })?;

        let session = self
            .client
            .create_portal_session(CreatePortalSessionRequest {
                customer_id,
                return_url: self.config.return_url.clone(),
                configuration_id: self.config.configuration_id.clone(),
            })
            .await
            .map_err(|err| match err.code {
                PaymentErrorCode::PortalNotConfigured => BillingError::PortalNotConfigured,
                PaymentErrorCode::InvalidCustomer => BillingError::InvalidCustomer,
                _ => BillingError::Payment {
                    message: err.message,
                },
            })?;

        info!(organization_id, session_id = %session.id, "Portal session created");
        Ok(session)
    }
}
