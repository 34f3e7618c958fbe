use crate::billing::{BillingPeriod, CheckoutManager, PaymentClient, PortalManager};
use crate::config::EmailConfig;
use crate::directory::DirectoryClient;
use crate::email::{compose_invitation_email, Mailer};
use crate::error::LibrariumError;
use crate::platform::PlatformClient;
use crate::session::SessionStore;
use crate::tenant::TenantContext;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Shared state for the HTTP layer.
pub struct AppState<C: PaymentClient> {
    pub sessions: Arc<SessionStore>,
    pub tenant: Arc<TenantContext>,
    pub platform: Arc<dyn PlatformClient>,
    pub directory: DirectoryClient,
    pub checkout: Arc<CheckoutManager<C>>,
    pub portal: Arc<PortalManager<C>>,
    pub mailer: Arc<dyn Mailer>,
    pub email: EmailConfig,
}

impl<C: PaymentClient> Clone for AppState<C> {
    fn clone(&self) -> Self {
        Self {
            sessions: Arc::clone(&self.sessions),
            tenant: Arc::clone(&self.tenant),
            platform: Arc::clone(&self.platform),
            directory: self.directory.clone(),
            checkout: Arc::clone(&self.checkout),
            portal: Arc::clone(&self.portal),
            mailer: Arc::clone(&self.mailer),
            email: self.email.clone(),
        }
    }
}

/// Build the application router.
pub fn router<C: PaymentClient + 'static>(state: AppState<C>) -> Router {
    Router::new()
        .route("/api/auth/register", post(register::<C>))
        .route("/api/email/invite", post(invite_email::<C>))
        .route("/api/stripe/checkout", post(checkout::<C>))
        .route("/api/stripe/portal", post(portal::<C>))
        .route("/api/health/ping", get(ping::<C>).post(ping::<C>))
        .with_state(state)
}

// === /api/auth/register ===

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegisterRequest {
    email: String,
    password: String,
    username: String,
    full_name: String,
}

#[derive(Debug, Serialize)]
struct RegisterResponse {
    success: bool,
    user: RegisteredUser,
}

#[derive(Debug, Serialize)]
struct RegisteredUser {
    id: String,
    email: String,
}

async fn register<C: PaymentClient + 'static>(
    State(state): State<AppState<C>>,
    Json(request): Json<RegisterRequest>,
) -> Result<Json<RegisterResponse>, LibrariumError> {
    if request.email.trim().is_empty()
        || request.password.is_empty()
        || request.username.trim().is_empty()
    {
        return Err(LibrariumError::bad_request(
            "email, password, and username are required",
        ));
    }

    let principal = state
        .sessions
        .sign_up(
            &request.email,
            &request.password,
            request.username.trim(),
            request.full_name.trim(),
        )
        .await?;

    Ok(Json(RegisterResponse {
        success: true,
        user: RegisteredUser {
            id: principal.id,
            email: principal.email,
        },
    }))
}

// === /api/email/invite ===

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InviteEmailRequest {
    invitation_id: String,
    user_id: String,
}

#[derive(Debug, Serialize)]
struct InviteEmailResponse {
    success: bool,
}

async fn invite_email<C: PaymentClient + 'static>(
    State(state): State<AppState<C>>,
    Json(request): Json<InviteEmailRequest>,
) -> Result<Json<InviteEmailResponse>, LibrariumError> {
    let invitation = state
        .platform
        .get_invitation(&request.invitation_id)
        .await?
        .ok_or_else(|| LibrariumError::not_found("Invitation not found"))?;

    // Only admins of the inviting organization may trigger delivery.
    let role = state
        .directory
        .member_role(&invitation.organization_id, &request.user_id)
        .await
        .map_err(LibrariumError::from)?;
    if !role.is_some_and(|r| r.can_manage_members()) {
        return Err(LibrariumError::forbidden(
            "Only admins can send invitations",
        ));
    }

    let email = compose_invitation_email(
        &invitation,
        &state.email.from_address,
        &state.email.app_url,
    );
    state.mailer.send(&email).await?;

    info!(invitation_id = %invitation.id, "Invitation email sent");
    Ok(Json(InviteEmailResponse { success: true }))
}

// === /api/stripe/checkout ===

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CheckoutRequest {
    organization_id: String,
    plan_id: String,
    billing_period: String,
    user_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CheckoutResponse {
    session_id: String,
    url: String,
}

async fn checkout<C: PaymentClient + 'static>(
    State(state): State<AppState<C>>,
    Json(request): Json<CheckoutRequest>,
) -> Result<Json<CheckoutResponse>, LibrariumError> {
    let period: BillingPeriod = request
        .billing_period
        .parse()
        .map_err(LibrariumError::BadRequest)?;

    let session = state
        .checkout
        .subscribe(
            &request.organization_id,
            &request.plan_id,
            period,
            &request.user_id,
        )
        .await?;

    Ok(Json(CheckoutResponse {
        session_id: session.id,
        url: session.url,
    }))
}

// === /api/stripe/portal ===

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PortalRequest {
    organization_id: String,
    user_id: String,
}

#[derive(Debug, Serialize)]
struct PortalResponse {
    url: String,
}

async fn portal<C: PaymentClient + 'static>(
    State(state): State<AppState<C>>,
    Json(request): Json<PortalRequest>,
) -> Result<Json<PortalResponse>, LibrariumError> {
    let session = state
        .portal
        .manage_billing(&request.organization_id, &request.user_id)
        .await?;

    Ok(Json(PortalResponse { url: session.url }))
}

// === /api/health/ping ===

#[derive(Debug, Serialize)]
struct PingResponse {
    status: String,
    message: String,
    timestamp: String,
    response_time_ms: u64,
}

async fn ping<C: PaymentClient + 'static>(State(state): State<AppState<C>>) -> Response {
    let started = Instant::now();
    let result = state.platform.ping().await;
    let response_time_ms = started.elapsed().as_millis() as u64;

    match result {
        Ok(()) => (
            StatusCode::OK,
            Json(PingResponse {
                status: "ok".to_string(),
                message: "Platform reachable".to_string(),
                timestamp: Utc::now().to_rfc3339(),
                response_time_ms,
            }),
        )
            .into_response(),
        Err(err) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(PingResponse {
                status: "error".to_string(),
                message: err.to_string(),
                timestamp: Utc::now().to_rfc3339(),
                response_time_ms,
            }),
        )
            .into_response(),
    }
}
