//! Circulation: borrowing, returning, and reserving books.
//!
//! The transactional semantics (availability, per-user loan quotas, fine
//! calculation) live in the platform's stored procedures. This client
//! forwards the calls and normalizes their outcomes; it holds no local
//! business rules.

use crate::error::{LibrariumError, Result};
use crate::platform::types::DashboardStatsRow;
use crate::platform::PlatformClient;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument};

/// A successfully created loan.
#[derive(Clone, Debug, Serialize)]
pub struct Loan {
    pub loan_id: String,
    pub due_date: Option<DateTime<Utc>>,
}

/// Result of returning a book. A fine is present when the loan was
/// overdue.
#[derive(Clone, Debug, Serialize)]
pub struct ReturnReceipt {
    pub fine_amount: Option<f64>,
}

/// A successfully created reservation.
#[derive(Clone, Debug, Serialize)]
pub struct Reservation {
    pub reservation_id: String,
    pub position: Option<u32>,
}

/// Per-user dashboard aggregates.
#[derive(Clone, Copy, Debug, Default, Serialize)]
pub struct DashboardStats {
    pub total_books: u32,
    pub borrowed_books: u32,
    pub overdue_books: u32,
    pub reservations: u32,
}

impl From<DashboardStatsRow> for DashboardStats {
    fn from(row: DashboardStatsRow) -> Self {
        Self {
            total_books: row.total_books,
            borrowed_books: row.borrowed_books,
            overdue_books: row.overdue_books,
            reservations: row.reservations,
        }
    }
}

/// Typed client over the circulation RPCs.
#[derive(Clone)]
pub struct CirculationClient {
    platform: Arc<dyn PlatformClient>,
}

impl CirculationClient {
    pub fn new(platform: Arc<dyn PlatformClient>) -> Self {
        Self { platform }
    }

    #[instrument(skip(self))]
    pub async fn borrow_book(
        &self,
        organization_id: &str,
        book_id: &str,
        user_id: Option<&str>,
        due_date: Option<DateTime<Utc>>,
    ) -> Result<Loan> {
        let outcome = self
            .platform
            .borrow_book(organization_id, book_id, user_id, due_date)
            .await?;
        if !outcome.success {
            return Err(rejection(outcome.error, "borrow_book"));
        }
        let loan_id = outcome
            .loan_id
            .ok_or_else(|| LibrariumError::internal("borrow_book returned no loan id"))?;
        info!(organization_id, book_id, loan_id, "Book borrowed");
        Ok(Loan {
            loan_id,
            due_date: outcome.due_date,
        })
    }

    #[instrument(skip(self))]
    pub async fn return_book(
        &self,
        loan_id: &str,
        organization_id: Option<&str>,
    ) -> Result<ReturnReceipt> {
        let outcome = self.platform.return_book(loan_id, organization_id).await?;
        if !outcome.success {
            return Err(rejection(outcome.error, "return_book"));
        }
        info!(loan_id, fine = ?outcome.fine_amount, "Book returned");
        Ok(ReturnReceipt {
            fine_amount: outcome.fine_amount,
        })
    }

    #[instrument(skip(self))]
    pub async fn reserve_book(
        &self,
        organization_id: &str,
        book_id: &str,
        user_id: Option<&str>,
    ) -> Result<Reservation> {
        let outcome = self
            .platform
            .reserve_book(organization_id, book_id, user_id)
            .await?;
        if !outcome.success {
            return Err(rejection(outcome.error, "reserve_book"));
        }
        let reservation_id = outcome
            .reservation_id
            .ok_or_else(|| LibrariumError::internal("reserve_book returned no id"))?;
        info!(organization_id, book_id, reservation_id, "Book reserved");
        Ok(Reservation {
            reservation_id,
            position: outcome.position,
        })
    }

    pub async fn dashboard_stats(
        &self,
        organization_id: &str,
        user_id: Option<&str>,
    ) -> Result<DashboardStats> {
        let row = self
            .platform
            .get_user_dashboard_stats(organization_id, user_id)
            .await?;
        Ok(row.into())
    }
}

/// Map a platform refusal code to a user-presentable error. `not_found`
/// codes get their own status so the UI can distinguish them from
/// transient failures.
fn rejection(code: Option<String>, operation: &str) -> LibrariumError {
    match code.as_deref() {
        Some("book_not_found") => LibrariumError::not_found("Book not found"),
        Some("loan_not_found") => LibrariumError::not_found("Loan not found"),
        Some("book_unavailable") => {
            LibrariumError::bad_request("This book is currently on loan")
        }
        Some("loan_limit_reached") => {
            LibrariumError::bad_request("You have reached your loan limit")
        }
        Some("already_returned") => {
            LibrariumError::bad_request("This loan has already been returned")
        }
        Some(other) => LibrariumError::bad_request(other.to_string()),
        None => LibrariumError::internal(format!("{operation} failed without an error code")),
    }
}
