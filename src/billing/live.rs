//! Live Stripe client.
//!
//! Minimal form-encoded client for the three API surfaces this tier
//! uses: customers, checkout sessions, and portal sessions. Failure
//! classification goes through [`PaymentError::classify`] so the
//! substring fallback stays in one place.

use super::client::{
    CheckoutSession, CreateCheckoutSessionRequest, CreateCustomerRequest,
    CreatePortalSessionRequest, PaymentClient, PaymentError, PortalSession,
};
use async_trait::async_trait;
use serde::Deserialize;

const STRIPE_API: &str = "https://api.stripe.com/v1";

/// Stripe client over `reqwest`.
#[derive(Clone)]
pub struct StripeClient {
    http: reqwest::Client,
    secret_key: String,
    api_base: String,
}

#[derive(Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Deserialize)]
struct StripeErrorDetail {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Deserialize)]
struct StripeObject {
    id: String,
    #[serde(default)]
    url: Option<String>,
}

impl StripeClient {
    pub fn new(secret_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            secret_key: secret_key.into(),
            api_base: STRIPE_API.to_string(),
        }
    }

    /// Point the client at a different API base (test servers).
    #[must_use]
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self
    }

    async fn post(
        &self,
        path: &str,
        form: &[(String, String)],
    ) -> Result<StripeObject, PaymentError> {
        let url = format!("{}{path}", self.api_base);
        let response = self
            .http
            .post(&url)
            .basic_auth(&self.secret_key, None::<&str>)
            .form(form)
            .send()
            .await
            .map_err(|e| PaymentError::api(format!("stripe request failed: {e}")))?;

        if response.status().is_success() {
            return response
                .json::<StripeObject>()
                .await
                .map_err(|e| PaymentError::api(format!("malformed stripe response: {e}")));
        }

        let body: StripeErrorBody = response
            .json()
            .await
            .map_err(|e| PaymentError::api(format!("malformed stripe error: {e}")))?;
        let message = body
            .error
            .message
            .unwrap_or_else(|| "unknown stripe error".to_string());
        Err(PaymentError::classify(body.error.code.as_deref(), &message))
    }

    async fn delete(&self, path: &str) -> Result<(), PaymentError> {
        let url = format!("{}{path}", self.api_base);
        let response = self
            .http
            .delete(&url)
            .basic_auth(&self.secret_key, None::<&str>)
            .send()
            .await
            .map_err(|e| PaymentError::api(format!("stripe request failed: {e}")))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(PaymentError::api(format!(
                "stripe delete failed: {}",
                response.status()
            )))
        }
    }
}

#[async_trait]
impl PaymentClient for StripeClient {
    async fn create_customer(
        &self,
        request: CreateCustomerRequest,
    ) -> Result<String, PaymentError> {
        let mut form = vec![
            ("email".to_string(), request.email),
            (
                "metadata[organization_id]".to_string(),
                request.organization_id,
            ),
        ];
        if let Some(name) = request.name {
            form.push(("name".to_string(), name));
        }
        let object = self.post("/customers", &form).await?;
        Ok(object.id)
    }

    async fn delete_customer(&self, customer_id: &str) -> Result<(), PaymentError> {
        self.delete(&format!("/customers/{customer_id}")).await
    }

    async fn create_checkout_session(
        &self,
        request: CreateCheckoutSessionRequest,
    ) -> Result<CheckoutSession, PaymentError> {
        let mut form = vec![
            ("mode".to_string(), "subscription".to_string()),
            ("customer".to_string(), request.customer_id),
            ("line_items[0][price]".to_string(), request.price_id),
            ("line_items[0][quantity]".to_string(), "1".to_string()),
            ("success_url".to_string(), request.success_url),
            ("cancel_url".to_string(), request.cancel_url),
            (
                "metadata[organization_id]".to_string(),
                request.metadata.organization_id,
            ),
            ("metadata[plan_id]".to_string(), request.metadata.plan_id),
            (
                "metadata[billing_period]".to_string(),
                request.metadata.billing_period.to_string(),
            ),
        ];
        if let Some(days) = request.trial_period_days {
            form.push((
                "subscription_data[trial_period_days]".to_string(),
                days.to_string(),
            ));
        }

        let object = self.post("/checkout/sessions", &form).await?;
        let url = object
            .url
            .ok_or_else(|| PaymentError::api("checkout session has no url"))?;
        Ok(CheckoutSession { id: object.id, url })
    }

    async fn create_portal_session(
        &self,
        request: CreatePortalSessionRequest,
    ) -> Result<PortalSession, PaymentError> {
        let mut form = vec![
            ("customer".to_string(), request.customer_id),
            ("return_url".to_string(), request.return_url),
        ];
        if let Some(configuration) = request.configuration_id {
            form.push(("configuration".to_string(), configuration));
        }

        let object = self.post("/billing_portal/sessions", &form).await?;
        let url = object
            .url
            .ok_or_else(|| PaymentError::api("portal session has no url"))?;
        Ok(PortalSession { id: object.id, url })
    }
}
