//! HTTP endpoints exposed by the application tier.
//!
//! Only a handful of operations need a server-side hop (privileged
//! registration, transactional email, payment-processor calls, health);
//! everything else goes straight from pages to the platform. Every
//! handler recovers errors at this boundary via `IntoResponse`.

mod routes;

pub use routes::{router, AppState};
