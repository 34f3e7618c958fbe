//! Billing-specific error types.
//!
//! Portal and checkout failures are classified into a small fixed set of
//! remediation categories; the three portal categories map to three
//! different operator remediation paths and must never be collapsed into
//! one generic message.

use crate::directory::DirectoryError;
use crate::error::LibrariumError;
use thiserror::Error;

/// Errors from billing orchestration.
#[derive(Debug, Error)]
pub enum BillingError {
    /// Checkout requested for the free tier; nothing to purchase.
    #[error("The free plan does not require checkout")]
    FreePlan,

    #[error("Unknown plan: {plan_id}")]
    UnknownPlan { plan_id: String },

    /// Caller's role is below admin. Surfaced with fixed copy, never the
    /// raw backend text.
    #[error("Only admins can manage billing")]
    Forbidden,

    /// The organization already holds a live subscription.
    #[error("This organization already has an active subscription")]
    AlreadySubscribed,

    /// No billing customer record exists for the organization.
    #[error("No billing customer found for organization {organization_id}")]
    NoCustomer { organization_id: String },

    /// The processor's billing portal is not configured for this
    /// environment. Operator remediation: configure the portal.
    #[error("The billing portal is not configured")]
    PortalNotConfigured,

    /// The stored customer record is invalid at the processor. Operator
    /// remediation: relink or replace the customer.
    #[error("The billing customer record is invalid")]
    InvalidCustomer,

    /// Any other processor failure; the message is the processor's own
    /// and is surfaced verbatim.
    #[error("{message}")]
    Payment { message: String },

    #[error("Invalid redirect URL: {reason}")]
    InvalidRedirectUrl { reason: String },

    #[error(transparent)]
    Directory(#[from] DirectoryError),

    #[error(transparent)]
    Platform(LibrariumError),
}

impl BillingError {
    /// The fixed user-facing copy for this failure.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Directory(DirectoryError::NotAMember) | Self::Forbidden => {
                "Only admins can manage billing".to_string()
            }
            Self::Payment { message } => message.clone(),
            other => other.to_string(),
        }
    }
}

impl From<BillingError> for LibrariumError {
    fn from(err: BillingError) -> Self {
        match err {
            BillingError::Forbidden => LibrariumError::Forbidden(err.user_message()),
            BillingError::NoCustomer { .. } => LibrariumError::NotFound(err.user_message()),
            BillingError::FreePlan
            | BillingError::UnknownPlan { .. }
            | BillingError::AlreadySubscribed
            | BillingError::InvalidCustomer
            | BillingError::InvalidRedirectUrl { .. } => {
                LibrariumError::BadRequest(err.user_message())
            }
            BillingError::PortalNotConfigured | BillingError::Payment { .. } => {
                LibrariumError::ServiceUnavailable(err.user_message())
            }
            BillingError::Directory(inner) => inner.into(),
            BillingError::Platform(inner) => inner,
        }
    }
}
