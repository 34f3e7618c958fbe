//! Tenant context and role-based authorization.
//!
//! This is the contract every page and route consumes to decide whether
//! to render content or redirect: the active organization, the
//! principal's role in it, and the capability flags derived from that
//! role.

mod context;
mod role;
mod stats;

pub use context::{TenantContext, TenantSnapshot, TenantState};
pub use role::{Capabilities, ParseRoleError, Role};
pub use stats::OrgStats;
