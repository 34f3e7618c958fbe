//! Client for the managed data platform.
//!
//! All of the application's business rules (borrow/return transactions,
//! quota enforcement, invitation lifecycle, row-level authorization) live
//! in the platform's stored procedures. This module is the boundary: a
//! [`PlatformClient`] trait describing the RPC surface, an HTTP transport
//! for production, and an in-memory implementation reproducing the
//! documented contract for tests.

mod http;
pub mod testing;
pub mod types;

pub use http::HttpPlatformClient;
pub use types::{
    AcceptOutcome, BorrowOutcome, CreateOrgOutcome, DashboardStatsRow, InvitationRow,
    InviteOutcome, OrgStatsRow, OrgSummaryRow, OrganizationRow, ReserveOutcome, ReturnOutcome,
    RpcOutcome,
};

pub use testing::InMemoryPlatform;

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// The platform's RPC surface, as called by this tier.
///
/// Argument names and result shapes are the authoritative contract
/// (`p_`-prefixed parameters on the wire); the HTTP transport maps them
/// verbatim. Implementations must be cheap to clone behind an `Arc` and
/// callable concurrently.
#[async_trait]
pub trait PlatformClient: Send + Sync {
    /// List the organizations a user belongs to. Zero or one row has
    /// `is_current = true`.
    async fn get_user_organizations(&self, user_id: &str) -> Result<Vec<OrgSummaryRow>>;

    /// Mark an organization as the user's current one. Idempotent when
    /// already current; fails with `not_a_member` otherwise.
    async fn switch_organization(&self, user_id: &str, organization_id: &str)
        -> Result<RpcOutcome>;

    /// Create an organization with the caller as owner. Slug uniqueness is
    /// enforced case-insensitively; the new organization becomes current.
    async fn create_organization(
        &self,
        user_id: &str,
        name: &str,
        slug: &str,
        description: Option<&str>,
        contact_email: Option<&str>,
    ) -> Result<CreateOrgOutcome>;

    /// Fetch the full organization record.
    async fn get_organization(&self, organization_id: &str) -> Result<Option<OrganizationRow>>;

    /// Aggregate usage counts for one organization.
    async fn get_organization_stats(&self, organization_id: &str) -> Result<OrgStatsRow>;

    /// Per-user dashboard aggregates.
    async fn get_user_dashboard_stats(
        &self,
        organization_id: &str,
        user_id: Option<&str>,
    ) -> Result<DashboardStatsRow>;

    async fn borrow_book(
        &self,
        organization_id: &str,
        book_id: &str,
        user_id: Option<&str>,
        due_date: Option<DateTime<Utc>>,
    ) -> Result<BorrowOutcome>;

    async fn return_book(
        &self,
        loan_id: &str,
        organization_id: Option<&str>,
    ) -> Result<ReturnOutcome>;

    async fn reserve_book(
        &self,
        organization_id: &str,
        book_id: &str,
        user_id: Option<&str>,
    ) -> Result<ReserveOutcome>;

    /// Create an invitation. The acting user must hold an admin role.
    async fn invite_to_organization(
        &self,
        organization_id: &str,
        actor_id: &str,
        email: &str,
        role: Option<&str>,
        message: Option<&str>,
    ) -> Result<InviteOutcome>;

    /// Fetch an invitation record (used by the invite-email endpoint).
    async fn get_invitation(&self, invitation_id: &str) -> Result<Option<InvitationRow>>;

    /// Consume an invitation token. At-most-once; see
    /// [`AcceptOutcome`](types::AcceptOutcome) for the error codes.
    async fn accept_invitation(&self, token: &str, user_id: &str) -> Result<AcceptOutcome>;

    /// Upsert the denormalized profile record for a user.
    async fn upsert_profile(
        &self,
        user_id: &str,
        email: &str,
        metadata: &serde_json::Value,
    ) -> Result<()>;

    /// Persist the billing customer identifier on an organization.
    async fn set_billing_customer(&self, organization_id: &str, customer_id: &str) -> Result<()>;

    /// Cheap connectivity probe used by the health endpoint.
    async fn ping(&self) -> Result<()>;
}
