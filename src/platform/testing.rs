//! In-memory platform for testing.
//!
//! Reproduces the documented contract of the managed platform's stored
//! procedures: case-insensitive slug uniqueness, the single current-
//! organization pointer, at-most-once invitation acceptance with the six
//! documented error codes, read-time expiry, user-quota rejection, and
//! loan bookkeeping. Cloning shares the same underlying data.

use super::types::*;
use super::PlatformClient;
use crate::error::{LibrariumError, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use uuid::Uuid;

const FREE_PLAN_MAX_BOOKS: u32 = 100;
const FREE_PLAN_MAX_USERS: u32 = 5;
const FREE_PLAN_MAX_LOANS: u32 = 5;
const LOAN_PERIOD_DAYS: i64 = 14;
const INVITATION_EXPIRY_DAYS: i64 = 7;
const DAILY_FINE: f64 = 0.50;

#[derive(Clone, Debug)]
struct UserRecord {
    email: String,
    current_org: Option<String>,
}

#[derive(Clone, Debug)]
struct MembershipRecord {
    role: String,
    joined_at: DateTime<Utc>,
}

#[derive(Clone, Debug)]
struct InvitationRecord {
    id: String,
    organization_id: String,
    email: String,
    role: String,
    token: String,
    status: String,
    message: Option<String>,
    invited_by: String,
    expires_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

#[derive(Clone, Debug)]
struct LoanRecord {
    organization_id: String,
    book_id: String,
    user_id: String,
    due_date: DateTime<Utc>,
    returned: bool,
}

#[derive(Clone, Debug)]
struct ReservationRecord {
    organization_id: String,
    user_id: String,
}

struct Inner {
    users: RwLock<HashMap<String, UserRecord>>,
    orgs: RwLock<HashMap<String, OrganizationRow>>,
    slugs: RwLock<HashMap<String, String>>, // lowercase slug -> org id
    memberships: RwLock<HashMap<(String, String), MembershipRecord>>, // (org, user)
    invitations: RwLock<HashMap<String, InvitationRecord>>,
    invitations_by_token: RwLock<HashMap<String, String>>,
    books: RwLock<HashMap<String, String>>, // book id -> org id
    loans: RwLock<HashMap<String, LoanRecord>>,
    reservations: RwLock<HashMap<String, ReservationRecord>>,
    profiles: RwLock<HashMap<String, (String, Value)>>,
    fail_next_org_fetch: AtomicBool,
    fail_next_profile_upsert: AtomicBool,
    org_fetch_delay_ms: AtomicU64,
}

/// In-memory [`PlatformClient`] for tests.
#[derive(Clone)]
pub struct InMemoryPlatform {
    inner: Arc<Inner>,
}

impl Default for InMemoryPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryPlatform {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                users: RwLock::new(HashMap::new()),
                orgs: RwLock::new(HashMap::new()),
                slugs: RwLock::new(HashMap::new()),
                memberships: RwLock::new(HashMap::new()),
                invitations: RwLock::new(HashMap::new()),
                invitations_by_token: RwLock::new(HashMap::new()),
                books: RwLock::new(HashMap::new()),
                loans: RwLock::new(HashMap::new()),
                reservations: RwLock::new(HashMap::new()),
                profiles: RwLock::new(HashMap::new()),
                fail_next_org_fetch: AtomicBool::new(false),
                fail_next_profile_upsert: AtomicBool::new(false),
                org_fetch_delay_ms: AtomicU64::new(0),
            }),
        }
    }

    // === Test setup helpers ===

    /// Register a user the identity provider knows about.
    pub fn seed_user(&self, user_id: impl Into<String>, email: impl Into<String>) {
        self.inner.users.write().unwrap().insert(
            user_id.into(),
            UserRecord {
                email: email.into().to_lowercase(),
                current_org: None,
            },
        );
    }

    /// Add a book to an organization's catalog.
    pub fn seed_book(&self, organization_id: impl Into<String>, book_id: impl Into<String>) {
        self.inner
            .books
            .write()
            .unwrap()
            .insert(book_id.into(), organization_id.into());
    }

    /// Add a membership directly, bypassing the invitation flow.
    pub fn seed_membership(&self, organization_id: &str, user_id: &str, role: &str) {
        self.inner.memberships.write().unwrap().insert(
            (organization_id.to_string(), user_id.to_string()),
            MembershipRecord {
                role: role.to_string(),
                joined_at: Utc::now(),
            },
        );
    }

    /// Backdate a membership's join timestamp (for tie-break tests).
    pub fn set_joined_at(&self, organization_id: &str, user_id: &str, joined_at: DateTime<Utc>) {
        if let Some(m) = self
            .inner
            .memberships
            .write()
            .unwrap()
            .get_mut(&(organization_id.to_string(), user_id.to_string()))
        {
            m.joined_at = joined_at;
        }
    }

    /// Clear a user's current-organization pointer (defensive-fallback tests).
    pub fn clear_current_org(&self, user_id: &str) {
        if let Some(u) = self.inner.users.write().unwrap().get_mut(user_id) {
            u.current_org = None;
        }
    }

    /// Set an organization's subscription plan and status.
    pub fn set_subscription(&self, organization_id: &str, plan: &str, status: &str) {
        if let Some(org) = self.inner.orgs.write().unwrap().get_mut(organization_id) {
            org.subscription_plan = plan.to_string();
            org.subscription_status = status.to_string();
        }
    }

    /// Set an organization's member quota.
    pub fn set_max_users(&self, organization_id: &str, max_users: u32) {
        if let Some(org) = self.inner.orgs.write().unwrap().get_mut(organization_id) {
            org.max_users = max_users;
        }
    }

    /// Backdate an invitation's expiry (read-time expiry tests).
    pub fn expire_invitation(&self, invitation_id: &str) {
        if let Some(inv) = self.inner.invitations.write().unwrap().get_mut(invitation_id) {
            inv.expires_at = Utc::now() - Duration::hours(1);
        }
    }

    /// The stored billing customer id for an organization.
    #[must_use]
    pub fn billing_customer(&self, organization_id: &str) -> Option<String> {
        self.inner
            .orgs
            .read()
            .unwrap()
            .get(organization_id)
            .and_then(|o| o.stripe_customer_id.clone())
    }

    /// The synced profile record for a user, if any.
    #[must_use]
    pub fn profile(&self, user_id: &str) -> Option<(String, Value)> {
        self.inner.profiles.read().unwrap().get(user_id).cloned()
    }

    /// Make the next `get_organization` call fail with a transient error.
    pub fn fail_next_org_fetch(&self) {
        self.inner.fail_next_org_fetch.store(true, Ordering::SeqCst);
    }

    /// Make the next `upsert_profile` call fail with a transient error.
    pub fn fail_next_profile_upsert(&self) {
        self.inner
            .fail_next_profile_upsert
            .store(true, Ordering::SeqCst);
    }

    /// Delay the next `get_organization` call (overlapping-switch tests).
    pub fn delay_next_org_fetch(&self, delay: std::time::Duration) {
        self.inner
            .org_fetch_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    fn user_email(&self, user_id: &str) -> Option<String> {
        self.inner
            .users
            .read()
            .unwrap()
            .get(user_id)
            .map(|u| u.email.clone())
    }

    fn member_count(&self, organization_id: &str) -> u32 {
        self.inner
            .memberships
            .read()
            .unwrap()
            .keys()
            .filter(|(org, _)| org == organization_id)
            .count() as u32
    }

    fn failed<T: Default + WithError>(code: &str) -> T {
        T::with_error(code)
    }
}

/// Shared shape of the `{success, error}` outcome rows.
trait WithError: Default {
    fn with_error(code: &str) -> Self;
}

macro_rules! impl_with_error {
    ($($ty:ty),+) => {
        $(impl WithError for $ty {
            fn with_error(code: &str) -> Self {
                Self {
                    success: false,
                    error: Some(code.to_string()),
                    ..Default::default()
                }
            }
        })+
    };
}

impl_with_error!(
    RpcOutcome,
    CreateOrgOutcome,
    BorrowOutcome,
    ReturnOutcome,
    ReserveOutcome,
    InviteOutcome,
    AcceptOutcome
);

fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

#[async_trait]
impl PlatformClient for InMemoryPlatform {
    async fn get_user_organizations(&self, user_id: &str) -> Result<Vec<OrgSummaryRow>> {
        let current = self
            .inner
            .users
            .read()
            .unwrap()
            .get(user_id)
            .and_then(|u| u.current_org.clone());
        let orgs = self.inner.orgs.read().unwrap();
        let memberships = self.inner.memberships.read().unwrap();

        let mut rows: Vec<OrgSummaryRow> = memberships
            .iter()
            .filter(|((_, uid), _)| uid == user_id)
            .filter_map(|((org_id, _), m)| {
                orgs.get(org_id).map(|org| OrgSummaryRow {
                    organization_id: org.id.clone(),
                    name: org.name.clone(),
                    slug: org.slug.clone(),
                    logo_url: org.logo_url.clone(),
                    role: m.role.clone(),
                    subscription_plan: org.subscription_plan.clone(),
                    subscription_status: org.subscription_status.clone(),
                    is_current: current.as_deref() == Some(org.id.as_str()),
                    joined_at: Some(m.joined_at),
                })
            })
            .collect();
        rows.sort_by(|a, b| a.organization_id.cmp(&b.organization_id));
        Ok(rows)
    }

    async fn switch_organization(
        &self,
        user_id: &str,
        organization_id: &str,
    ) -> Result<RpcOutcome> {
        let is_member = self
            .inner
            .memberships
            .read()
            .unwrap()
            .contains_key(&(organization_id.to_string(), user_id.to_string()));
        if !is_member {
            return Ok(Self::failed("not_a_member"));
        }

        if let Some(user) = self.inner.users.write().unwrap().get_mut(user_id) {
            user.current_org = Some(organization_id.to_string());
        }
        Ok(RpcOutcome {
            success: true,
            error: None,
        })
    }

    async fn create_organization(
        &self,
        user_id: &str,
        name: &str,
        slug: &str,
        description: Option<&str>,
        contact_email: Option<&str>,
    ) -> Result<CreateOrgOutcome> {
        let slug_key = slug.to_lowercase();
        {
            let slugs = self.inner.slugs.read().unwrap();
            if slugs.contains_key(&slug_key) {
                return Ok(Self::failed("slug_taken"));
            }
        }

        let now = Utc::now();
        let org_id = Uuid::new_v4().to_string();
        let org = OrganizationRow {
            id: org_id.clone(),
            name: name.to_string(),
            slug: slug.to_string(),
            description: description.map(String::from),
            logo_url: None,
            contact_email: contact_email.map(String::from),
            max_books: FREE_PLAN_MAX_BOOKS,
            max_users: FREE_PLAN_MAX_USERS,
            max_loans_per_user: FREE_PLAN_MAX_LOANS,
            subscription_plan: "free".to_string(),
            subscription_status: "inactive".to_string(),
            current_period_end: None,
            cancel_at_period_end: false,
            trial_ends_at: None,
            stripe_customer_id: None,
            stripe_subscription_id: None,
            created_at: now,
        };

        self.inner.orgs.write().unwrap().insert(org_id.clone(), org);
        self.inner
            .slugs
            .write()
            .unwrap()
            .insert(slug_key, org_id.clone());
        self.inner.memberships.write().unwrap().insert(
            (org_id.clone(), user_id.to_string()),
            MembershipRecord {
                role: "owner".to_string(),
                joined_at: now,
            },
        );
        if let Some(user) = self.inner.users.write().unwrap().get_mut(user_id) {
            user.current_org = Some(org_id.clone());
        }

        Ok(CreateOrgOutcome {
            success: true,
            error: None,
            organization_id: Some(org_id),
            slug: Some(slug.to_string()),
        })
    }

    async fn get_organization(&self, organization_id: &str) -> Result<Option<OrganizationRow>> {
        let delay_ms = self.inner.org_fetch_delay_ms.swap(0, Ordering::SeqCst);
        if delay_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(delay_ms)).await;
        }
        if self
            .inner
            .fail_next_org_fetch
            .swap(false, Ordering::SeqCst)
        {
            return Err(LibrariumError::service_unavailable(
                "injected organization fetch failure",
            ));
        }
        Ok(self
            .inner
            .orgs
            .read()
            .unwrap()
            .get(organization_id)
            .cloned())
    }

    async fn get_organization_stats(&self, organization_id: &str) -> Result<OrgStatsRow> {
        let now = Utc::now();
        let org = self
            .inner
            .orgs
            .read()
            .unwrap()
            .get(organization_id)
            .cloned()
            .ok_or_else(|| LibrariumError::not_found(organization_id.to_string()))?;

        let loans = self.inner.loans.read().unwrap();
        let active: Vec<_> = loans
            .values()
            .filter(|l| l.organization_id == organization_id && !l.returned)
            .collect();
        let overdue = active.iter().filter(|l| l.due_date < now).count() as u32;

        Ok(OrgStatsRow {
            total_books: self
                .inner
                .books
                .read()
                .unwrap()
                .values()
                .filter(|org_id| org_id.as_str() == organization_id)
                .count() as u32,
            total_members: self.member_count(organization_id),
            active_loans: active.len() as u32,
            overdue_loans: overdue,
            total_reservations: self
                .inner
                .reservations
                .read()
                .unwrap()
                .values()
                .filter(|r| r.organization_id == organization_id)
                .count() as u32,
            books_quota: org.max_books,
            users_quota: org.max_users,
        })
    }

    async fn get_user_dashboard_stats(
        &self,
        organization_id: &str,
        user_id: Option<&str>,
    ) -> Result<DashboardStatsRow> {
        let now = Utc::now();
        let loans = self.inner.loans.read().unwrap();
        let user_loans: Vec<_> = loans
            .values()
            .filter(|l| {
                l.organization_id == organization_id
                    && user_id.map_or(true, |uid| l.user_id == uid)
                    && !l.returned
            })
            .collect();

        Ok(DashboardStatsRow {
            total_books: self
                .inner
                .books
                .read()
                .unwrap()
                .values()
                .filter(|org_id| org_id.as_str() == organization_id)
                .count() as u32,
            borrowed_books: user_loans.len() as u32,
            overdue_books: user_loans.iter().filter(|l| l.due_date < now).count() as u32,
            reservations: self
                .inner
                .reservations
                .read()
                .unwrap()
                .values()
                .filter(|r| {
                    r.organization_id == organization_id
                        && user_id.map_or(true, |uid| r.user_id == uid)
                })
                .count() as u32,
        })
    }

    async fn borrow_book(
        &self,
        organization_id: &str,
        book_id: &str,
        user_id: Option<&str>,
        due_date: Option<DateTime<Utc>>,
    ) -> Result<BorrowOutcome> {
        let Some(user_id) = user_id else {
            return Ok(Self::failed("user_required"));
        };

        let in_catalog = self
            .inner
            .books
            .read()
            .unwrap()
            .get(book_id)
            .is_some_and(|org| org == organization_id);
        if !in_catalog {
            return Ok(Self::failed("book_not_found"));
        }

        let max_loans = self
            .inner
            .orgs
            .read()
            .unwrap()
            .get(organization_id)
            .map_or(FREE_PLAN_MAX_LOANS, |o| o.max_loans_per_user);

        let mut loans = self.inner.loans.write().unwrap();
        if loans.values().any(|l| l.book_id == book_id && !l.returned) {
            return Ok(Self::failed("book_unavailable"));
        }
        let user_active = loans
            .values()
            .filter(|l| l.organization_id == organization_id && l.user_id == user_id && !l.returned)
            .count() as u32;
        if user_active >= max_loans {
            return Ok(Self::failed("loan_limit_reached"));
        }

        let due = due_date.unwrap_or_else(|| Utc::now() + Duration::days(LOAN_PERIOD_DAYS));
        let loan_id = Uuid::new_v4().to_string();
        loans.insert(
            loan_id.clone(),
            LoanRecord {
                organization_id: organization_id.to_string(),
                book_id: book_id.to_string(),
                user_id: user_id.to_string(),
                due_date: due,
                returned: false,
            },
        );

        Ok(BorrowOutcome {
            success: true,
            error: None,
            loan_id: Some(loan_id),
            due_date: Some(due),
        })
    }

    async fn return_book(
        &self,
        loan_id: &str,
        _organization_id: Option<&str>,
    ) -> Result<ReturnOutcome> {
        let mut loans = self.inner.loans.write().unwrap();
        let Some(loan) = loans.get_mut(loan_id) else {
            return Ok(Self::failed("loan_not_found"));
        };
        if loan.returned {
            return Ok(Self::failed("already_returned"));
        }
        loan.returned = true;

        let now = Utc::now();
        let fine = if now > loan.due_date {
            let days_late = (now - loan.due_date).num_days().max(1);
            Some(days_late as f64 * DAILY_FINE)
        } else {
            None
        };

        Ok(ReturnOutcome {
            success: true,
            error: None,
            fine_amount: fine,
        })
    }

    async fn reserve_book(
        &self,
        organization_id: &str,
        book_id: &str,
        user_id: Option<&str>,
    ) -> Result<ReserveOutcome> {
        let Some(user_id) = user_id else {
            return Ok(Self::failed("user_required"));
        };
        let in_catalog = self
            .inner
            .books
            .read()
            .unwrap()
            .get(book_id)
            .is_some_and(|org| org == organization_id);
        if !in_catalog {
            return Ok(Self::failed("book_not_found"));
        }

        let mut reservations = self.inner.reservations.write().unwrap();
        let position = reservations
            .values()
            .filter(|r| r.organization_id == organization_id)
            .count() as u32
            + 1;
        let reservation_id = Uuid::new_v4().to_string();
        reservations.insert(
            reservation_id.clone(),
            ReservationRecord {
                organization_id: organization_id.to_string(),
                user_id: user_id.to_string(),
            },
        );

        Ok(ReserveOutcome {
            success: true,
            error: None,
            reservation_id: Some(reservation_id),
            position: Some(position),
        })
    }

    async fn invite_to_organization(
        &self,
        organization_id: &str,
        actor_id: &str,
        email: &str,
        role: Option<&str>,
        message: Option<&str>,
    ) -> Result<InviteOutcome> {
        let actor_role = self
            .inner
            .memberships
            .read()
            .unwrap()
            .get(&(organization_id.to_string(), actor_id.to_string()))
            .map(|m| m.role.clone());
        if !matches!(actor_role.as_deref(), Some("owner") | Some("admin")) {
            return Ok(Self::failed("forbidden"));
        }

        let email = email.to_lowercase();
        let has_pending = self.inner.invitations.read().unwrap().values().any(|i| {
            i.organization_id == organization_id && i.email == email && i.status == "pending"
        });
        if has_pending {
            return Ok(Self::failed("already_invited"));
        }

        let now = Utc::now();
        let invitation = InvitationRecord {
            id: Uuid::new_v4().to_string(),
            organization_id: organization_id.to_string(),
            email,
            role: role.unwrap_or("member").to_string(),
            token: generate_token(),
            status: "pending".to_string(),
            message: message.map(String::from),
            invited_by: actor_id.to_string(),
            expires_at: now + Duration::days(INVITATION_EXPIRY_DAYS),
            created_at: now,
        };

        let outcome = InviteOutcome {
            success: true,
            error: None,
            token: Some(invitation.token.clone()),
            invitation_id: Some(invitation.id.clone()),
        };
        self.inner
            .invitations_by_token
            .write()
            .unwrap()
            .insert(invitation.token.clone(), invitation.id.clone());
        self.inner
            .invitations
            .write()
            .unwrap()
            .insert(invitation.id.clone(), invitation);

        Ok(outcome)
    }

    async fn get_invitation(&self, invitation_id: &str) -> Result<Option<InvitationRow>> {
        let invitations = self.inner.invitations.read().unwrap();
        let Some(inv) = invitations.get(invitation_id) else {
            return Ok(None);
        };
        let org_name = self
            .inner
            .orgs
            .read()
            .unwrap()
            .get(&inv.organization_id)
            .map_or_else(String::new, |o| o.name.clone());

        Ok(Some(InvitationRow {
            id: inv.id.clone(),
            organization_id: inv.organization_id.clone(),
            organization_name: org_name,
            email: inv.email.clone(),
            role: inv.role.clone(),
            token: inv.token.clone(),
            status: inv.status.clone(),
            message: inv.message.clone(),
            invited_by: inv.invited_by.clone(),
            expires_at: inv.expires_at,
            created_at: inv.created_at,
        }))
    }

    async fn accept_invitation(&self, token: &str, user_id: &str) -> Result<AcceptOutcome> {
        let invitation_id = self
            .inner
            .invitations_by_token
            .read()
            .unwrap()
            .get(token)
            .cloned();
        let Some(invitation_id) = invitation_id else {
            return Ok(Self::failed("invalid_token"));
        };

        let invitation = self
            .inner
            .invitations
            .read()
            .unwrap()
            .get(&invitation_id)
            .cloned()
            .expect("token index points at a stored invitation");

        // Expiry wins over stored status: a stale pending row is still dead.
        if invitation.expires_at < Utc::now() {
            return Ok(Self::failed("invitation_expired"));
        }
        if invitation.status != "pending" {
            return Ok(Self::failed("invitation_not_pending"));
        }

        let Some(user_email) = self.user_email(user_id) else {
            return Ok(Self::failed("email_mismatch"));
        };
        if user_email != invitation.email {
            return Ok(Self::failed("email_mismatch"));
        }

        let org_id = invitation.organization_id.clone();
        let already_member = self
            .inner
            .memberships
            .read()
            .unwrap()
            .contains_key(&(org_id.clone(), user_id.to_string()));
        if already_member {
            return Ok(Self::failed("already_member"));
        }

        let max_users = self
            .inner
            .orgs
            .read()
            .unwrap()
            .get(&org_id)
            .map_or(FREE_PLAN_MAX_USERS, |o| o.max_users);
        if self.member_count(&org_id) >= max_users {
            return Ok(Self::failed("user_limit_reached"));
        }

        self.inner.memberships.write().unwrap().insert(
            (org_id.clone(), user_id.to_string()),
            MembershipRecord {
                role: invitation.role.clone(),
                joined_at: Utc::now(),
            },
        );
        if let Some(inv) = self.inner.invitations.write().unwrap().get_mut(&invitation_id) {
            inv.status = "accepted".to_string();
        }
        // First membership becomes the current organization.
        if let Some(user) = self.inner.users.write().unwrap().get_mut(user_id) {
            if user.current_org.is_none() {
                user.current_org = Some(org_id.clone());
            }
        }

        Ok(AcceptOutcome {
            success: true,
            error: None,
            organization_id: Some(org_id),
        })
    }

    async fn upsert_profile(
        &self,
        user_id: &str,
        email: &str,
        metadata: &serde_json::Value,
    ) -> Result<()> {
        if self
            .inner
            .fail_next_profile_upsert
            .swap(false, Ordering::SeqCst)
        {
            return Err(LibrariumError::service_unavailable(
                "injected profile upsert failure",
            ));
        }
        self.inner
            .profiles
            .write()
            .unwrap()
            .insert(user_id.to_string(), (email.to_string(), metadata.clone()));
        Ok(())
    }

    async fn set_billing_customer(&self, organization_id: &str, customer_id: &str) -> Result<()> {
        let mut orgs = self.inner.orgs.write().unwrap();
        let org = orgs
            .get_mut(organization_id)
            .ok_or_else(|| LibrariumError::not_found(organization_id.to_string()))?;
        org.stripe_customer_id = Some(customer_id.to_string());
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
