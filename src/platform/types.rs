//! Wire types for the managed data platform's RPC surface.
//!
//! These structs mirror the platform's ad hoc JSON result shapes verbatim
//! (snake_case fields, stringly-typed roles and statuses). The directory
//! client normalizes them into typed domain values; nothing outside
//! `platform` and `directory` should consume these rows directly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One row of `get_user_organizations`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OrgSummaryRow {
    pub organization_id: String,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub logo_url: Option<String>,
    pub role: String,
    pub subscription_plan: String,
    pub subscription_status: String,
    pub is_current: bool,
    /// When the caller joined the organization. Used for the deterministic
    /// fallback when no entry is marked current.
    #[serde(default)]
    pub joined_at: Option<DateTime<Utc>>,
}

/// Full organization record as stored by the platform.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OrganizationRow {
    pub id: String,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub logo_url: Option<String>,
    #[serde(default)]
    pub contact_email: Option<String>,
    pub max_books: u32,
    pub max_users: u32,
    pub max_loans_per_user: u32,
    pub subscription_plan: String,
    pub subscription_status: String,
    #[serde(default)]
    pub current_period_end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub cancel_at_period_end: bool,
    #[serde(default)]
    pub trial_ends_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub stripe_customer_id: Option<String>,
    #[serde(default)]
    pub stripe_subscription_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// One row of `get_organization_stats`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct OrgStatsRow {
    pub total_books: u32,
    pub total_members: u32,
    pub active_loans: u32,
    pub overdue_loans: u32,
    pub total_reservations: u32,
    pub books_quota: u32,
    pub users_quota: u32,
}

/// One row of `get_user_dashboard_stats`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DashboardStatsRow {
    pub total_books: u32,
    pub borrowed_books: u32,
    pub overdue_books: u32,
    pub reservations: u32,
}

/// Generic `{success, error?}` RPC outcome.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RpcOutcome {
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
}

/// Outcome of `create_organization`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CreateOrgOutcome {
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub organization_id: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
}

/// Outcome of `borrow_book`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct BorrowOutcome {
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub loan_id: Option<String>,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
}

/// Outcome of `return_book`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ReturnOutcome {
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub fine_amount: Option<f64>,
}

/// Outcome of `reserve_book`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ReserveOutcome {
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub reservation_id: Option<String>,
    #[serde(default)]
    pub position: Option<u32>,
}

/// Outcome of `invite_to_organization`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct InviteOutcome {
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub invitation_id: Option<String>,
}

/// Outcome of `accept_invitation`.
///
/// Documented error codes: `invalid_token`, `invitation_expired`,
/// `invitation_not_pending`, `email_mismatch`, `user_limit_reached`,
/// `already_member`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AcceptOutcome {
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub organization_id: Option<String>,
}

/// Full invitation record, fetched when sending the invitation email.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InvitationRow {
    pub id: String,
    pub organization_id: String,
    pub organization_name: String,
    pub email: String,
    pub role: String,
    pub token: String,
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
    pub invited_by: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl InvitationRow {
    /// Read-time expiry check. An invitation past `expires_at` is rejected
    /// regardless of its stored status.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }
}
