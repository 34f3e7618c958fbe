//! Payment-processor client abstraction.
//!
//! The trait lets billing orchestration run against a mock in tests and a
//! real Stripe client in production. Failures carry a structured
//! [`PaymentErrorCode`]; classification prefers the processor's own error
//! codes, with substring matching confined to
//! [`PaymentError::classify`] as a documented last resort.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Billing period selected at checkout.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BillingPeriod {
    Monthly,
    Yearly,
}

impl BillingPeriod {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
        }
    }
}

impl FromStr for BillingPeriod {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "monthly" | "month" => Ok(Self::Monthly),
            "yearly" | "year" | "annual" => Ok(Self::Yearly),
            other => Err(format!("unknown billing period: {other}")),
        }
    }
}

impl fmt::Display for BillingPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Remediation category of a processor failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PaymentErrorCode {
    /// The customer record is pinned to a different currency than the
    /// selected price. Recoverable by replacing the customer.
    CurrencyMismatch,
    /// The billing portal is not configured in the processor dashboard.
    PortalNotConfigured,
    /// The stored customer identifier is unknown or deleted.
    InvalidCustomer,
    /// Any other processor error.
    Api,
}

/// A failure reported by the payment processor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PaymentError {
    pub code: PaymentErrorCode,
    pub message: String,
}

impl PaymentError {
    pub fn new(code: PaymentErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn api(message: impl Into<String>) -> Self {
        Self::new(PaymentErrorCode::Api, message)
    }

    /// Classify a processor failure into a remediation category.
    ///
    /// Structured codes from the response are authoritative. The message
    /// substrings below are the legacy fallback for responses without a
    /// usable code; they are kept in this one function so a processor SDK
    /// upgrade removes them in one place.
    #[must_use]
    pub fn classify(code: Option<&str>, message: &str) -> Self {
        let classified = match code {
            Some("currency_mismatch") => Some(PaymentErrorCode::CurrencyMismatch),
            Some("resource_missing") if message.contains("customer") => {
                Some(PaymentErrorCode::InvalidCustomer)
            }
            _ => None,
        };

        let classified = classified.unwrap_or_else(|| {
            let lower = message.to_lowercase();
            if lower.contains("cannot combine currencies") || lower.contains("currency") {
                PaymentErrorCode::CurrencyMismatch
            } else if lower.contains("portal") && lower.contains("configuration") {
                PaymentErrorCode::PortalNotConfigured
            } else if lower.contains("no such customer") || lower.contains("customer") {
                PaymentErrorCode::InvalidCustomer
            } else {
                PaymentErrorCode::Api
            }
        });

        Self::new(classified, message)
    }
}

impl fmt::Display for PaymentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for PaymentError {}

/// Request to create a processor customer.
#[derive(Debug, Clone)]
pub struct CreateCustomerRequest {
    pub email: String,
    pub name: Option<String>,
    /// The organization this customer belongs to, stored as metadata.
    pub organization_id: String,
}

/// Request to create a checkout session.
#[derive(Debug, Clone)]
pub struct CreateCheckoutSessionRequest {
    pub customer_id: String,
    pub price_id: String,
    pub success_url: String,
    pub cancel_url: String,
    pub trial_period_days: Option<u32>,
    pub metadata: CheckoutMetadata,
}

/// Metadata attached to checkout sessions for webhook correlation.
#[derive(Debug, Clone)]
pub struct CheckoutMetadata {
    pub organization_id: String,
    pub plan_id: String,
    pub billing_period: BillingPeriod,
}

/// Checkout session response; the caller navigates to `url`.
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
}

/// Request to create a customer portal session.
#[derive(Debug, Clone)]
pub struct CreatePortalSessionRequest {
    pub customer_id: String,
    pub return_url: String,
    pub configuration_id: Option<String>,
}

/// Portal session response; the caller navigates to `url`.
#[derive(Debug, Clone, Serialize)]
pub struct PortalSession {
    pub id: String,
    pub url: String,
}

/// Trait for payment-processor operations.
#[async_trait]
pub trait PaymentClient: Send + Sync {
    /// Create a customer; returns the processor's customer id.
    async fn create_customer(
        &self,
        request: CreateCustomerRequest,
    ) -> std::result::Result<String, PaymentError>;

    /// Delete a customer record at the processor.
    async fn delete_customer(&self, customer_id: &str) -> std::result::Result<(), PaymentError>;

    /// Create a hosted checkout session.
    async fn create_checkout_session(
        &self,
        request: CreateCheckoutSessionRequest,
    ) -> std::result::Result<CheckoutSession, PaymentError>;

    /// Create a customer portal session.
    async fn create_portal_session(
        &self,
        request: CreatePortalSessionRequest,
    ) -> std::result::Result<PortalSession, PaymentError>;
}

/// Mock payment client for testing.
pub mod testing {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Mutex;

    /// Scriptable mock [`PaymentClient`].
    #[derive(Default)]
    pub struct MockPaymentClient {
        customer_counter: AtomicU64,
        session_counter: AtomicU64,
        checkout_failures: Mutex<VecDeque<PaymentError>>,
        portal_failures: Mutex<VecDeque<PaymentError>>,
        created_customers: Mutex<Vec<String>>,
        deleted_customers: Mutex<Vec<String>>,
    }

    impl MockPaymentClient {
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Queue a failure for the next checkout session attempt.
        pub fn fail_next_checkout(&self, error: PaymentError) {
            self.checkout_failures.lock().unwrap().push_back(error);
        }

        /// Queue a failure for the next portal session attempt.
        pub fn fail_next_portal(&self, error: PaymentError) {
            self.portal_failures.lock().unwrap().push_back(error);
        }

        /// Customer ids created so far (for assertions).
        #[must_use]
        pub fn created_customers(&self) -> Vec<String> {
            self.created_customers.lock().unwrap().clone()
        }

        /// Customer ids deleted so far (for assertions).
        #[must_use]
        pub fn deleted_customers(&self) -> Vec<String> {
            self.deleted_customers.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PaymentClient for MockPaymentClient {
        async fn create_customer(
            &self,
            _request: CreateCustomerRequest,
        ) -> std::result::Result<String, PaymentError> {
            let id = format!(
                "cus_test_{}",
                self.customer_counter.fetch_add(1, Ordering::SeqCst)
            );
            self.created_customers.lock().unwrap().push(id.clone());
            Ok(id)
        }

        async fn delete_customer(
            &self,
            customer_id: &str,
        ) -> std::result::Result<(), PaymentError> {
            self.deleted_customers
                .lock()
                .unwrap()
                .push(customer_id.to_string());
            Ok(())
        }

        async fn create_checkout_session(
            &self,
            _request: CreateCheckoutSessionRequest,
        ) -> std::result::Result<CheckoutSession, PaymentError> {
            if let Some(err) = self.checkout_failures.lock().unwrap().pop_front() {
                return Err(err);
            }
            let id = format!(
                "cs_test_{}",
                self.session_counter.fetch_add(1, Ordering::SeqCst)
            );
            Ok(CheckoutSession {
                url: format!("https://checkout.stripe.com/c/pay/{id}"),
                id,
            })
        }

        async fn create_portal_session(
            &self,
            _request: CreatePortalSessionRequest,
        ) -> std::result::Result<PortalSession, PaymentError> {
            if let Some(err) = self.portal_failures.lock().unwrap().pop_front() {
                return Err(err);
            }
            let id = format!(
                "bps_test_{}",
                self.session_counter.fetch_add(1, Ordering::SeqCst)
            );
            Ok(PortalSession {
                url: format!("https://billing.stripe.com/p/session/{id}"),
                id,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structured_code_wins_over_message() {
        let err = PaymentError::classify(Some("currency_mismatch"), "something generic");
        assert_eq!(err.code, PaymentErrorCode::CurrencyMismatch);
    }

    #[test]
    fn substring_fallback_classification() {
        let err = PaymentError::classify(
            None,
            "You cannot combine currencies on a single customer.",
        );
        assert_eq!(err.code, PaymentErrorCode::CurrencyMismatch);

        let err = PaymentError::classify(
            None,
            "No configuration provided and your test mode default portal configuration has not been created.",
        );
        assert_eq!(err.code, PaymentErrorCode::PortalNotConfigured);

        let err = PaymentError::classify(None, "No such customer: 'cus_404'");
        assert_eq!(err.code, PaymentErrorCode::InvalidCustomer);

        let err = PaymentError::classify(None, "An unknown error occurred");
        assert_eq!(err.code, PaymentErrorCode::Api);
    }

    #[test]
    fn billing_period_parsing() {
        assert_eq!("monthly".parse::<BillingPeriod>().unwrap(), BillingPeriod::Monthly);
        assert_eq!("Yearly".parse::<BillingPeriod>().unwrap(), BillingPeriod::Yearly);
        assert_eq!("annual".parse::<BillingPeriod>().unwrap(), BillingPeriod::Yearly);
        assert!("weekly".parse::<BillingPeriod>().is_err());
    }
}
