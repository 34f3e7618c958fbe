//! Processor customer management.
//!
//! Links organizations to payment-processor customer records, and creates
//! replacement customers when the existing record is pinned to the wrong
//! currency.

use super::client::{CreateCustomerRequest, PaymentClient};
use super::error::BillingError;
use crate::directory::Organization;
use crate::platform::PlatformClient;
use std::sync::Arc;
use tracing::{info, instrument};

/// Customer lookup/creation over the platform's stored identifiers.
pub struct CustomerManager<C: PaymentClient> {
    platform: Arc<dyn PlatformClient>,
    client: Arc<C>,
}

impl<C: PaymentClient> CustomerManager<C> {
    pub fn new(platform: Arc<dyn PlatformClient>, client: Arc<C>) -> Self {
        Self { platform, client }
    }

    /// The customer id for an organization, creating and persisting one if
    /// none is linked yet.
    pub async fn get_or_create(
        &self,
        organization: &Organization,
    ) -> Result<String, BillingError> {
        if let Some(customer_id) = &organization.stripe_customer_id {
            return Ok(customer_id.clone());
        }
        self.create_and_link(organization).await
    }

    /// Create a replacement customer and persist the new identifier.
    ///
    /// Used by the currency-mismatch recovery: the old record stays at the
    /// processor (it may carry history) but the organization now points at
    /// the replacement.
    #[instrument(skip(self, organization), fields(organization_id = %organization.id))]
    pub async fn replace(&self, organization: &Organization) -> Result<String, BillingError> {
        let new_id = self.create_and_link(organization).await?;
        info!(
            organization_id = %organization.id,
            old_customer = ?organization.stripe_customer_id,
            new_customer = %new_id,
            "Billing customer replaced"
        );
        Ok(new_id)
    }

    async fn create_and_link(&self, organization: &Organization) -> Result<String, BillingError> {
        let email = organization
            .contact_email
            .clone()
            .unwrap_or_else(|| format!("billing@{}.invalid", organization.slug));

        let customer_id = self
            .client
            .create_customer(CreateCustomerRequest {
                email,
                name: Some(organization.name.clone()),
                organization_id: organization.id.clone(),
            })
            .await
            .map_err(|err| BillingError::Payment {
                message: err.message,
            })?;

        self.platform
            .set_billing_customer(&organization.id, &customer_id)
            .await
            .map_err(BillingError::Platform)?;

        Ok(customer_id)
    }
}
