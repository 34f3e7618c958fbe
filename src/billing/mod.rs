//! Billing orchestration against the external payment processor.
//!
//! Sequences customer lookup/creation, checkout session creation, and
//! portal session creation, guarded by tenant admin checks. Subscription
//! state itself is owned by the processor and the platform's webhook
//! handling; this tier only orchestrates.

mod checkout;
mod client;
mod customer;
mod error;
mod live;
mod plans;
mod portal;

pub use checkout::{CheckoutConfig, CheckoutManager, CheckoutPhase};
pub use client::{
    BillingPeriod, CheckoutMetadata, CheckoutSession, CreateCheckoutSessionRequest,
    CreateCustomerRequest, CreatePortalSessionRequest, PaymentClient, PaymentError,
    PaymentErrorCode, PortalSession,
};
pub use customer::CustomerManager;
pub use error::BillingError;
pub use live::StripeClient;
pub use plans::{PlanBuilder, PlanConfig, Plans, PlansBuilder};
pub use portal::{PortalConfig, PortalManager};

pub use client::testing::MockPaymentClient;
