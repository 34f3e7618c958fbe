//! Usage stats for the active organization.
//!
//! Fetched on demand and re-fetched by the tenant context whenever the
//! current organization changes; consumers only read the cached value.

use crate::error::Result;
use crate::platform::types::OrgStatsRow;
use crate::platform::PlatformClient;
use serde::Serialize;
use std::sync::Arc;

/// Aggregate usage counts for one organization.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct OrgStats {
    pub total_books: u32,
    pub total_members: u32,
    pub active_loans: u32,
    pub overdue_loans: u32,
    pub total_reservations: u32,
    pub books_quota: u32,
    pub users_quota: u32,
}

impl From<OrgStatsRow> for OrgStats {
    fn from(row: OrgStatsRow) -> Self {
        Self {
            total_books: row.total_books,
            total_members: row.total_members,
            active_loans: row.active_loans,
            overdue_loans: row.overdue_loans,
            total_reservations: row.total_reservations,
            books_quota: row.books_quota,
            users_quota: row.users_quota,
        }
    }
}

/// On-demand fetcher for [`OrgStats`].
#[derive(Clone)]
pub(crate) struct StatsCache {
    platform: Arc<dyn PlatformClient>,
}

impl StatsCache {
    pub(crate) fn new(platform: Arc<dyn PlatformClient>) -> Self {
        Self { platform }
    }

    pub(crate) async fn fetch(&self, organization_id: &str) -> Result<OrgStats> {
        let row = self.platform.get_organization_stats(organization_id).await?;
        Ok(row.into())
    }
}
