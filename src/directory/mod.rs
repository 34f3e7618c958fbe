//! Tenant directory client.
//!
//! Wraps the platform RPCs for listing, switching, and creating
//! organizations (plus the invitation operations), and normalizes their
//! ad hoc `{success, error}` result shapes into typed outcomes. Everything
//! above this layer works with [`OrgSummary`], [`Organization`], and typed
//! errors; nothing above it sees a wire row.

mod error;
mod types;

pub use error::{AcceptInvitationError, DirectoryError};
pub use types::{
    CreatedInvitation, CreatedOrg, OrgSummary, Organization, SubscriptionStatus,
};

use crate::error::LibrariumError;
use crate::platform::types::{OrgSummaryRow, OrganizationRow};
use crate::platform::PlatformClient;
use crate::tenant::Role;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, instrument};

type Result<T> = std::result::Result<T, DirectoryError>;

/// Typed client over the platform's organization RPCs.
#[derive(Clone)]
pub struct DirectoryClient {
    platform: Arc<dyn PlatformClient>,
}

impl DirectoryClient {
    pub fn new(platform: Arc<dyn PlatformClient>) -> Self {
        Self { platform }
    }

    pub fn platform(&self) -> &Arc<dyn PlatformClient> {
        &self.platform
    }

    /// List the organizations a principal belongs to.
    ///
    /// At most one entry has `is_current = true`; callers may rely on that.
    #[instrument(skip(self))]
    pub async fn list_organizations(&self, principal_id: &str) -> Result<Vec<OrgSummary>> {
        let rows = self
            .platform
            .get_user_organizations(principal_id)
            .await
            .map_err(DirectoryError::Platform)?;
        rows.into_iter().map(summary_from_row).collect()
    }

    /// The principal's role in one organization, if a member.
    pub async fn member_role(
        &self,
        organization_id: &str,
        principal_id: &str,
    ) -> Result<Option<Role>> {
        let summaries = self.list_organizations(principal_id).await?;
        Ok(summaries
            .into_iter()
            .find(|s| s.organization_id == organization_id)
            .map(|s| s.role))
    }

    /// Mark an organization as current for the principal.
    #[instrument(skip(self))]
    pub async fn switch_organization(
        &self,
        principal_id: &str,
        organization_id: &str,
    ) -> Result<()> {
        let outcome = self
            .platform
            .switch_organization(principal_id, organization_id)
            .await
            .map_err(DirectoryError::Platform)?;

        if outcome.success {
            debug!(organization_id, "Switched current organization");
            return Ok(());
        }
        match outcome.error.as_deref() {
            Some("not_a_member") => Err(DirectoryError::NotAMember),
            Some(other) => Err(DirectoryError::Rejected(other.to_string())),
            None => Err(DirectoryError::Rejected(
                "switch_organization failed without an error code".to_string(),
            )),
        }
    }

    /// Create an organization; the principal becomes its owner and it
    /// becomes their current organization.
    #[instrument(skip(self))]
    pub async fn create_organization(
        &self,
        principal_id: &str,
        name: &str,
        slug: &str,
        description: Option<&str>,
        contact_email: Option<&str>,
    ) -> Result<CreatedOrg> {
        let name = name.trim();
        if name.is_empty() {
            return Err(DirectoryError::Rejected(
                "Organization name is required".to_string(),
            ));
        }

        // Malformed slugs are caught here, before any network call.
        let slug = if slug.trim().is_empty() {
            slugify(name)
        } else {
            slug.trim().to_string()
        };
        if !is_valid_slug(&slug) {
            return Err(DirectoryError::Rejected(format!(
                "Slug '{slug}' may only contain lowercase letters, digits, and hyphens"
            )));
        }

        let outcome = self
            .platform
            .create_organization(principal_id, name, &slug, description, contact_email)
            .await
            .map_err(DirectoryError::Platform)?;

        if !outcome.success {
            return Err(match outcome.error.as_deref() {
                Some("slug_taken") => DirectoryError::SlugTaken { slug },
                Some(other) => DirectoryError::Rejected(other.to_string()),
                None => DirectoryError::Rejected(
                    "create_organization failed without an error code".to_string(),
                ),
            });
        }

        let organization_id = outcome.organization_id.ok_or_else(|| {
            DirectoryError::Rejected("create_organization returned no id".to_string())
        })?;
        info!(organization_id, slug, "Organization created");

        Ok(CreatedOrg {
            organization_id,
            slug: outcome.slug.unwrap_or(slug),
        })
    }

    /// Fetch the full organization record.
    #[instrument(skip(self))]
    pub async fn organization(&self, organization_id: &str) -> Result<Organization> {
        let row = self
            .platform
            .get_organization(organization_id)
            .await
            .map_err(DirectoryError::Platform)?
            .ok_or_else(|| {
                DirectoryError::Platform(LibrariumError::not_found(format!(
                    "organization {organization_id}"
                )))
            })?;
        Ok(organization_from_row(row))
    }

    /// Create an invitation. The acting principal must be an admin; the
    /// platform enforces that and we normalize its refusal.
    #[instrument(skip(self))]
    pub async fn invite_member(
        &self,
        organization_id: &str,
        actor_id: &str,
        email: &str,
        role: Role,
        message: Option<&str>,
    ) -> Result<CreatedInvitation> {
        let email = email.trim().to_lowercase();
        if !is_valid_email(&email) {
            return Err(DirectoryError::Rejected(format!(
                "Invalid email address: {email}"
            )));
        }

        let outcome = self
            .platform
            .invite_to_organization(organization_id, actor_id, &email, Some(role.as_str()), message)
            .await
            .map_err(DirectoryError::Platform)?;

        if !outcome.success {
            return Err(match outcome.error.as_deref() {
                Some("forbidden") => DirectoryError::NotAMember,
                Some(other) => DirectoryError::Rejected(other.to_string()),
                None => DirectoryError::Rejected(
                    "invite_to_organization failed without an error code".to_string(),
                ),
            });
        }

        let invitation_id = outcome.invitation_id.ok_or_else(|| {
            DirectoryError::Rejected("invite_to_organization returned no id".to_string())
        })?;
        let token = outcome.token.ok_or_else(|| {
            DirectoryError::Rejected("invite_to_organization returned no token".to_string())
        })?;
        info!(organization_id, invitation_id, "Invitation created");

        Ok(CreatedInvitation {
            invitation_id,
            token,
        })
    }

    /// Consume an invitation token for a principal. Returns the joined
    /// organization's id.
    #[instrument(skip(self, token))]
    pub async fn accept_invitation(&self, token: &str, principal_id: &str) -> Result<String> {
        let outcome = self
            .platform
            .accept_invitation(token, principal_id)
            .await
            .map_err(DirectoryError::Platform)?;

        if !outcome.success {
            let code = outcome.error.unwrap_or_default();
            return Err(AcceptInvitationError::from_code(&code).into());
        }
        let organization_id = outcome.organization_id.ok_or_else(|| {
            DirectoryError::Rejected("accept_invitation returned no organization".to_string())
        })?;
        info!(organization_id, "Invitation accepted");
        Ok(organization_id)
    }
}

fn summary_from_row(row: OrgSummaryRow) -> Result<OrgSummary> {
    let role = Role::from_str(&row.role)
        .map_err(|e| DirectoryError::Rejected(e.to_string()))?;
    let subscription_status = row
        .subscription_status
        .parse()
        .unwrap_or_default();
    Ok(OrgSummary {
        organization_id: row.organization_id,
        name: row.name,
        slug: row.slug,
        logo_url: row.logo_url,
        role,
        subscription_plan: row.subscription_plan,
        subscription_status,
        is_current: row.is_current,
        joined_at: row.joined_at,
    })
}

fn organization_from_row(row: OrganizationRow) -> Organization {
    Organization {
        id: row.id,
        name: row.name,
        slug: row.slug,
        description: row.description,
        logo_url: row.logo_url,
        contact_email: row.contact_email,
        max_books: row.max_books,
        max_users: row.max_users,
        max_loans_per_user: row.max_loans_per_user,
        subscription_plan: row.subscription_plan,
        subscription_status: row.subscription_status.parse().unwrap_or_default(),
        current_period_end: row.current_period_end,
        cancel_at_period_end: row.cancel_at_period_end,
        trial_ends_at: row.trial_ends_at,
        stripe_customer_id: row.stripe_customer_id,
        stripe_subscription_id: row.stripe_subscription_id,
        created_at: row.created_at,
    }
}

/// Generate a URL-safe slug from a name.
pub(crate) fn slugify(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty()
        && !slug.starts_with('-')
        && !slug.ends_with('-')
        && slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

/// Basic email format validation. Not RFC 5322 compliant, but catches
/// obvious formatting errors before a network call.
pub(crate) fn is_valid_email(email: &str) -> bool {
    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 {
        return false;
    }
    let (local, domain) = (parts[0], parts[1]);
    !local.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
}
