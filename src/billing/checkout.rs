//! Checkout orchestration.
//!
//! Sequences the calls needed to start a subscription purchase: admin
//! gate, already-subscribed gate, customer lookup/creation, and checkout
//! session creation with a single currency-mismatch recovery attempt.
//! The returned session URL is an external hosted payment page; the
//! caller performs a full navigation to it.

use super::client::{
    BillingPeriod, CheckoutMetadata, CheckoutSession, CreateCheckoutSessionRequest, PaymentClient,
    PaymentErrorCode,
};
use super::customer::CustomerManager;
use super::error::BillingError;
use super::plans::Plans;
use crate::directory::DirectoryClient;
use crate::platform::PlatformClient;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Phase of one checkout attempt, for tracing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CheckoutPhase {
    Idle,
    CreatingSession,
    Redirecting,
    Failed,
}

impl fmt::Display for CheckoutPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let phase = match self {
            Self::Idle => "idle",
            Self::CreatingSession => "creating_session",
            Self::Redirecting => "redirecting",
            Self::Failed => "failed",
        };
        write!(f, "{phase}")
    }
}

/// Configuration for checkout sessions.
#[derive(Debug, Clone)]
pub struct CheckoutConfig {
    pub success_url: String,
    pub cancel_url: String,
    /// Allowed domains for redirect URLs (empty = allow any HTTPS URL).
    pub allowed_redirect_domains: Vec<String>,
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            success_url: "https://localhost/billing/success".to_string(),
            cancel_url: "https://localhost/billing/cancel".to_string(),
            allowed_redirect_domains: Vec::new(),
        }
    }
}

impl CheckoutConfig {
    #[must_use]
    pub fn new(success_url: impl Into<String>, cancel_url: impl Into<String>) -> Self {
        Self {
            success_url: success_url.into(),
            cancel_url: cancel_url.into(),
            allowed_redirect_domains: Vec::new(),
        }
    }

    /// Restrict redirect URLs to the given domains (and their subdomains).
    #[must_use]
    pub fn allowed_redirect_domains<I, S>(mut self, domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_redirect_domains = domains.into_iter().map(Into::into).collect();
        self
    }

    /// Validate a redirect URL: must parse, must be HTTPS, and must match
    /// the allowed domain list when one is configured.
    pub fn validate_redirect_url(&self, url: &str) -> Result<(), BillingError> {
        let parsed = url::Url::parse(url).map_err(|e| BillingError::InvalidRedirectUrl {
            reason: e.to_string(),
        })?;

        if parsed.scheme() != "https" {
            return Err(BillingError::InvalidRedirectUrl {
                reason: "redirect URL must use HTTPS".to_string(),
            });
        }

        if !self.allowed_redirect_domains.is_empty() {
            let host = parsed
                .host_str()
                .ok_or_else(|| BillingError::InvalidRedirectUrl {
                    reason: "redirect URL must have a host".to_string(),
                })?;
            let allowed = self
                .allowed_redirect_domains
                .iter()
                .any(|domain| host == domain || host.ends_with(&format!(".{domain}")));
            if !allowed {
                return Err(BillingError::InvalidRedirectUrl {
                    reason: format!("domain '{host}' is not allowed"),
                });
            }
        }

        Ok(())
    }
}

/// Checkout orchestrator.
pub struct CheckoutManager<C: PaymentClient> {
    directory: DirectoryClient,
    customers: CustomerManager<C>,
    client: Arc<C>,
    plans: Plans,
    config: CheckoutConfig,
}

impl<C: PaymentClient> CheckoutManager<C> {
    pub fn new(
        platform: Arc<dyn PlatformClient>,
        client: Arc<C>,
        plans: Plans,
        config: CheckoutConfig,
    ) -> Self {
        Self {
            directory: DirectoryClient::new(Arc::clone(&platform)),
            customers: CustomerManager::new(platform, Arc::clone(&client)),
            client,
            plans,
            config,
        }
    }

    /// Start a subscription purchase for an organization.
    ///
    /// Guards, in order: the free tier needs no checkout; only owners and
    /// admins may subscribe; an organization with a live subscription is
    /// rejected. A currency-mismatch failure from the processor triggers
    /// one customer replacement and one retry, never a loop.
    #[instrument(skip(self), fields(phase = %CheckoutPhase::Idle))]
    pub async fn subscribe(
        &self,
        organization_id: &str,
        plan_id: &str,
        period: BillingPeriod,
        user_id: &str,
    ) -> Result<CheckoutSession, BillingError> {
        let plan = self
            .plans
            .get(plan_id)
            .ok_or_else(|| BillingError::UnknownPlan {
                plan_id: plan_id.to_string(),
            })?;
        if plan.is_free {
            return Err(BillingError::FreePlan);
        }
        let price_id = plan
            .price_for(period)
            .ok_or_else(|| BillingError::UnknownPlan {
                plan_id: format!("{plan_id} ({period})"),
            })?
            .to_string();

        let role = self
            .directory
            .member_role(organization_id, user_id)
            .await?
            .ok_or(BillingError::Forbidden)?;
        if !role.is_admin() {
            return Err(BillingError::Forbidden);
        }

        let organization = self.directory.organization(organization_id).await?;
        if organization.subscription_status.is_subscribed() {
            debug!(
                organization_id,
                status = %organization.subscription_status,
                "Checkout rejected: already subscribed"
            );
            return Err(BillingError::AlreadySubscribed);
        }

        self.config.validate_redirect_url(&self.config.success_url)?;
        self.config.validate_redirect_url(&self.config.cancel_url)?;

        let customer_id = self.customers.get_or_create(&organization).await?;

        debug!(organization_id, plan_id, phase = %CheckoutPhase::CreatingSession, "Creating checkout session");
        let request = CreateCheckoutSessionRequest {
            customer_id,
            price_id: price_id.clone(),
            success_url: self.config.success_url.clone(),
            cancel_url: self.config.cancel_url.clone(),
            trial_period_days: plan.trial_days,
            metadata: CheckoutMetadata {
                organization_id: organization_id.to_string(),
                plan_id: plan_id.to_string(),
                billing_period: period,
            },
        };

        let session = match self.client.create_checkout_session(request.clone()).await {
            Ok(session) => session,
            Err(err) if err.code == PaymentErrorCode::CurrencyMismatch => {
                // The existing customer is pinned to another currency.
                // Replace it, persist the new id, and retry exactly once.
                warn!(
                    organization_id,
                    error = %err,
                    "Currency mismatch; replacing billing customer and retrying"
                );
                let new_customer = self.customers.replace(&organization).await?;
                let retry = CreateCheckoutSessionRequest {
                    customer_id: new_customer,
                    ..request
                };
                self.client
                    .create_checkout_session(retry)
                    .await
                    .map_err(|err| {
                        debug!(organization_id, phase = %CheckoutPhase::Failed, "Checkout failed after retry");
                        BillingError::Payment { message: err.message }
                    })?
            }
            Err(err) => {
                debug!(organization_id, phase = %CheckoutPhase::Failed, "Checkout failed");
                return Err(BillingError::Payment {
                    message: err.message,
                });
            }
        };

        info!(
            organization_id,
            plan_id,
            session_id = %session.id,
            phase = %CheckoutPhase::Redirecting,
            "Checkout session created"
        );
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redirect_url_validation() {
        let config = CheckoutConfig::default();
        assert!(config.validate_redirect_url("https://example.com/ok").is_ok());
        assert!(config.validate_redirect_url("http://example.com/no").is_err());
        assert!(config.validate_redirect_url("not-a-url").is_err());

        let config =
            CheckoutConfig::default().allowed_redirect_domains(["example.com"]);
        assert!(config.validate_redirect_url("https://example.com/ok").is_ok());
        assert!(config
            .validate_redirect_url("https://app.example.com/ok")
            .is_ok());
        assert!(config.validate_redirect_url("https://evil.com/no").is_err());
        assert!(config
            .validate_redirect_url("https://notexample.com/no")
            .is_err());
    }
}
