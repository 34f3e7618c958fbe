//! Tenant context: the single source of truth for "who am I acting as,
//! in which organization, with which privileges".
//!
//! The context owns the current-organization pointer for the life of the
//! session. All other components read it through snapshots; mutation goes
//! through [`switch_organization`](TenantContext::switch_organization),
//! [`refresh_organizations`](TenantContext::refresh_organizations), and
//! [`create_organization`](TenantContext::create_organization) only.

use super::role::{Capabilities, Role};
use super::stats::{OrgStats, StatsCache};
use crate::directory::{CreatedOrg, DirectoryClient, DirectoryError, OrgSummary, Organization};
use crate::error::LibrariumError;
use crate::platform::PlatformClient;
use crate::session::Principal;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

type Result<T> = std::result::Result<T, DirectoryError>;

/// Resolution state of the tenant context.
///
/// The whole value is replaced in a single assignment on every
/// transition, so a reader can never observe a fresh organization paired
/// with a stale role.
#[derive(Clone, Debug, Default)]
pub enum TenantState {
    /// No principal, or resolution has not completed (or failed and will
    /// be retried by the consuming page's guard).
    #[default]
    Unresolved,
    /// The principal has no memberships; tenant features are inert.
    NoTenant,
    /// The principal is acting as `role` inside `organization`.
    Resolved {
        organization: Organization,
        role: Role,
    },
}

/// Immutable view of the tenant context, published on every change.
///
/// This is the contract pages consume to render or redirect; they never
/// talk to the platform directly.
#[derive(Clone, Debug, Default)]
pub struct TenantSnapshot {
    pub state: TenantState,
    pub organizations: Vec<OrgSummary>,
    pub is_loading_orgs: bool,
    pub org_stats: Option<OrgStats>,
}

impl TenantSnapshot {
    #[must_use]
    pub fn current_organization(&self) -> Option<&Organization> {
        match &self.state {
            TenantState::Resolved { organization, .. } => Some(organization),
            _ => None,
        }
    }

    #[must_use]
    pub fn current_role(&self) -> Option<Role> {
        match &self.state {
            TenantState::Resolved { role, .. } => Some(*role),
            _ => None,
        }
    }

    /// Capability flags for the current role; all false when no tenant is
    /// resolved. Always derived from the role, never cached.
    #[must_use]
    pub fn capabilities(&self) -> Capabilities {
        self.current_role()
            .map_or_else(Capabilities::none, Capabilities::of)
    }

    /// Guard for catalog-management actions. Pages redirect on `Err`.
    pub fn require_manage_books(&self) -> std::result::Result<(), LibrariumError> {
        if self.capabilities().can_manage_books {
            Ok(())
        } else {
            Err(LibrariumError::forbidden(
                "You do not have permission to manage books",
            ))
        }
    }

    /// Guard for member-management actions. Pages redirect on `Err`.
    pub fn require_manage_members(&self) -> std::result::Result<(), LibrariumError> {
        if self.capabilities().can_manage_members {
            Ok(())
        } else {
            Err(LibrariumError::forbidden(
                "You do not have permission to manage members",
            ))
        }
    }
}

/// Owner of the tenant state machine.
///
/// Lifecycle: constructed once per session, re-resolves on every
/// principal change, clears on sign-out. Overlapping mutations are
/// serialized latest-wins: each operation takes an epoch, and a
/// superseded operation's eventual result is discarded instead of
/// overwriting newer state.
pub struct TenantContext {
    directory: DirectoryClient,
    stats: StatsCache,
    snapshot_tx: watch::Sender<TenantSnapshot>,
    epoch: AtomicU64,
    principal: Mutex<Option<Principal>>,
}

impl TenantContext {
    pub fn new(platform: Arc<dyn PlatformClient>) -> Self {
        let (snapshot_tx, _) = watch::channel(TenantSnapshot::default());
        Self {
            directory: DirectoryClient::new(Arc::clone(&platform)),
            stats: StatsCache::new(platform),
            snapshot_tx,
            epoch: AtomicU64::new(0),
            principal: Mutex::new(None),
        }
    }

    /// The current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> TenantSnapshot {
        self.snapshot_tx.borrow().clone()
    }

    /// Subscribe to snapshot changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<TenantSnapshot> {
        self.snapshot_tx.subscribe()
    }

    /// React to a principal change: resolve the active organization and
    /// role, or clear all tenant state when the principal is gone.
    #[instrument(skip(self, principal))]
    pub async fn resolve(&self, principal: Option<Principal>) -> Result<()> {
        *self.principal.lock().unwrap() = principal.clone();
        let epoch = self.begin_op();

        let Some(principal) = principal else {
            self.publish_if_current(epoch, |s| {
                *s = TenantSnapshot::default();
            });
            return Ok(());
        };

        self.publish_if_current(epoch, |s| s.is_loading_orgs = true);

        let list = match self.directory.list_organizations(&principal.id).await {
            Ok(list) => list,
            Err(err) => {
                self.publish_if_current(epoch, |s| {
                    *s = TenantSnapshot::default();
                });
                return Err(err);
            }
        };

        if list.is_empty() {
            debug!(user_id = %principal.id, "Principal has no memberships");
            self.publish_if_current(epoch, |s| {
                *s = TenantSnapshot {
                    state: TenantState::NoTenant,
                    ..TenantSnapshot::default()
                };
            });
            return Ok(());
        }

        let current = match list.iter().find(|s| s.is_current) {
            Some(entry) => entry.clone(),
            None => {
                // The platform should always mark one membership current.
                // Recover deterministically: earliest joined wins, ties
                // broken by organization id, and persist the choice.
                let entry = earliest_joined(&list).clone();
                warn!(
                    user_id = %principal.id,
                    organization_id = %entry.organization_id,
                    "No current organization marked; selecting earliest-joined"
                );
                if let Err(err) = self
                    .directory
                    .switch_organization(&principal.id, &entry.organization_id)
                    .await
                {
                    self.publish_if_current(epoch, |s| {
                        *s = TenantSnapshot::default();
                    });
                    return Err(err);
                }
                entry
            }
        };

        self.finish_resolution(epoch, &principal.id, current, list)
            .await
    }

    /// Switch the active organization.
    ///
    /// On failure the previously active organization is left untouched;
    /// in particular a `NotAMember` refusal causes no partial update.
    #[instrument(skip(self))]
    pub async fn switch_organization(&self, organization_id: &str) -> Result<()> {
        let principal = self.require_principal()?;
        let epoch = self.begin_op();

        self.publish_if_current(epoch, |s| s.is_loading_orgs = true);

        if let Err(err) = self
            .directory
            .switch_organization(&principal.id, organization_id)
            .await
        {
            self.publish_if_current(epoch, |s| s.is_loading_orgs = false);
            return Err(err);
        }

        let list = match self.directory.list_organizations(&principal.id).await {
            Ok(list) => list,
            Err(err) => {
                self.publish_if_current(epoch, |s| {
                    *s = TenantSnapshot::default();
                });
                return Err(err);
            }
        };
        let entry = match list
            .iter()
            .find(|s| s.organization_id == organization_id)
            .cloned()
        {
            Some(entry) => entry,
            None => {
                self.publish_if_current(epoch, |s| {
                    *s = TenantSnapshot::default();
                });
                return Err(DirectoryError::NotAMember);
            }
        };

        info!(organization_id, role = %entry.role, "Active organization switched");
        self.finish_resolution(epoch, &principal.id, entry, list)
            .await
    }

    /// Re-run resolution for the current principal.
    pub async fn refresh_organizations(&self) -> Result<()> {
        let principal = self.principal.lock().unwrap().clone();
        self.resolve(principal).await
    }

    /// Create an organization and switch into it as owner.
    #[instrument(skip(self))]
    pub async fn create_organization(
        &self,
        name: &str,
        slug: &str,
        description: Option<&str>,
    ) -> Result<CreatedOrg> {
        let principal = self.require_principal()?;
        let created = self
            .directory
            .create_organization(&principal.id, name, slug, description, Some(&principal.email))
            .await?;

        // The platform already marked the new organization current;
        // re-resolve to pick it up.
        self.resolve(Some(principal)).await?;
        Ok(created)
    }

    /// Re-fetch usage stats for the current organization. Clears the
    /// cached value when no organization is current.
    pub async fn refresh_org_stats(&self) {
        let epoch = self.epoch.load(Ordering::SeqCst);
        // Clone the id out before touching the sender again; holding the
        // watch borrow across send_modify would deadlock.
        let organization_id = {
            let snapshot = self.snapshot_tx.borrow();
            match &snapshot.state {
                TenantState::Resolved { organization, .. } => Some(organization.id.clone()),
                _ => None,
            }
        };
        match organization_id {
            Some(id) => self.fetch_stats(epoch, &id).await,
            None => self.snapshot_tx.send_modify(|s| s.org_stats = None),
        }
    }

    /// Common tail of resolve/switch: fetch details and replace the whole
    /// state in one step so organization and role stay paired.
    async fn finish_resolution(
        &self,
        epoch: u64,
        principal_id: &str,
        entry: OrgSummary,
        list: Vec<OrgSummary>,
    ) -> Result<()> {
        let organization = match self.directory.organization(&entry.organization_id).await {
            Ok(org) => org,
            Err(err) => {
                // A half-updated context must never survive a failed
                // detail fetch; drop to Unresolved and let the page guard
                // retry.
                warn!(
                    user_id = %principal_id,
                    organization_id = %entry.organization_id,
                    error = %err,
                    "Organization detail fetch failed after listing"
                );
                self.publish_if_current(epoch, |s| {
                    *s = TenantSnapshot::default();
                });
                return Err(err);
            }
        };

        let organization_id = organization.id.clone();
        let applied = self.publish_if_current(epoch, |s| {
            *s = TenantSnapshot {
                state: TenantState::Resolved {
                    organization: organization.clone(),
                    role: entry.role,
                },
                organizations: list.clone(),
                is_loading_orgs: false,
                org_stats: None,
            };
        });

        if applied {
            self.fetch_stats(epoch, &organization_id).await;
        }
        Ok(())
    }

    async fn fetch_stats(&self, epoch: u64, organization_id: &str) {
        match self.stats.fetch(organization_id).await {
            Ok(stats) => {
                self.publish_if_current(epoch, |s| s.org_stats = Some(stats));
            }
            Err(err) => {
                warn!(organization_id, error = %err, "Stats refresh failed");
                self.publish_if_current(epoch, |s| s.org_stats = None);
            }
        }
    }

    fn require_principal(&self) -> Result<Principal> {
        self.principal
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| DirectoryError::Platform(LibrariumError::unauthorized("No active session")))
    }

    fn begin_op(&self) -> u64 {
        self.epoch.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Apply a snapshot mutation only if no newer operation has started.
    /// A superseded operation's result is discarded, which is what makes
    /// overlapping switches latest-wins.
    fn publish_if_current(&self, epoch: u64, f: impl FnOnce(&mut TenantSnapshot)) -> bool {
        let mut applied = false;
        self.snapshot_tx.send_if_modified(|snapshot| {
            if self.epoch.load(Ordering::SeqCst) != epoch {
                return false;
            }
            f(snapshot);
            applied = true;
            true
        });
        applied
    }

    /// Spawn a task that re-resolves on every principal change for the
    /// lifetime of the session.
    pub fn spawn_principal_listener(
        self: &Arc<Self>,
        mut principal_rx: watch::Receiver<Option<Principal>>,
    ) -> tokio::task::JoinHandle<()> {
        let context = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                let principal = principal_rx.borrow_and_update().clone();
                if let Err(err) = context.resolve(principal).await {
                    warn!(error = %err, "Tenant resolution failed");
                }
                if principal_rx.changed().await.is_err() {
                    break;
                }
            }
        })
    }
}

/// Deterministic fallback ordering: earliest joined first, organization id
/// as tie-break, entries without a join timestamp last.
fn earliest_joined(list: &[OrgSummary]) -> &OrgSummary {
    list.iter()
        .min_by(|a, b| {
            match (&a.joined_at, &b.joined_at) {
                (Some(a_at), Some(b_at)) => a_at.cmp(b_at),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => std::cmp::Ordering::Equal,
            }
            .then_with(|| a.organization_id.cmp(&b.organization_id))
        })
        .expect("caller checked the list is non-empty")
}
