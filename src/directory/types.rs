//! Typed domain objects produced by the directory client.

use crate::tenant::Role;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Subscription status of an organization, as reported by the platform.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Trialing,
    /// Legacy spelling still emitted by older platform rows.
    Trial,
    PastDue,
    Canceled,
    Unpaid,
    #[default]
    Inactive,
}

impl SubscriptionStatus {
    /// Whether the organization currently holds a live subscription.
    /// Checkout is rejected for these states.
    #[must_use]
    pub fn is_subscribed(&self) -> bool {
        matches!(self, Self::Active | Self::Trialing | Self::Trial)
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Trialing => "trialing",
            Self::Trial => "trial",
            Self::PastDue => "past_due",
            Self::Canceled => "canceled",
            Self::Unpaid => "unpaid",
            Self::Inactive => "inactive",
        }
    }
}

impl FromStr for SubscriptionStatus {
    type Err = std::convert::Infallible;

    /// Unrecognized statuses normalize to `Inactive` so a new platform
    /// status never breaks tenant resolution.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s.to_lowercase().as_str() {
            "active" => Self::Active,
            "trialing" => Self::Trialing,
            "trial" => Self::Trial,
            "past_due" => Self::PastDue,
            "canceled" | "cancelled" => Self::Canceled,
            "unpaid" => Self::Unpaid,
            _ => Self::Inactive,
        })
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One entry in a principal's organization list.
#[derive(Clone, Debug, Serialize)]
pub struct OrgSummary {
    pub organization_id: String,
    pub name: String,
    pub slug: String,
    pub logo_url: Option<String>,
    pub role: Role,
    pub subscription_plan: String,
    pub subscription_status: SubscriptionStatus,
    pub is_current: bool,
    pub joined_at: Option<DateTime<Utc>>,
}

/// Full organization record.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Organization {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub logo_url: Option<String>,
    pub contact_email: Option<String>,
    pub max_books: u32,
    pub max_users: u32,
    pub max_loans_per_user: u32,
    pub subscription_plan: String,
    pub subscription_status: SubscriptionStatus,
    pub current_period_end: Option<DateTime<Utc>>,
    pub cancel_at_period_end: bool,
    pub trial_ends_at: Option<DateTime<Utc>>,
    pub stripe_customer_id: Option<String>,
    pub stripe_subscription_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Result of a successful `create_organization`.
#[derive(Clone, Debug, Serialize)]
pub struct CreatedOrg {
    pub organization_id: String,
    pub slug: String,
}

/// Result of a successful `invite_member`.
#[derive(Clone, Debug, Serialize)]
pub struct CreatedInvitation {
    pub invitation_id: String,
    pub token: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscription_states() {
        assert!(SubscriptionStatus::Active.is_subscribed());
        assert!(SubscriptionStatus::Trialing.is_subscribed());
        assert!(SubscriptionStatus::Trial.is_subscribed());
        assert!(!SubscriptionStatus::PastDue.is_subscribed());
        assert!(!SubscriptionStatus::Canceled.is_subscribed());
        assert!(!SubscriptionStatus::Inactive.is_subscribed());
    }

    #[test]
    fn status_parsing_never_fails() {
        assert_eq!(
            "active".parse::<SubscriptionStatus>().unwrap(),
            SubscriptionStatus::Active
        );
        assert_eq!(
            "cancelled".parse::<SubscriptionStatus>().unwrap(),
            SubscriptionStatus::Canceled
        );
        assert_eq!(
            "something_new".parse::<SubscriptionStatus>().unwrap(),
            SubscriptionStatus::Inactive
        );
    }
}
