//! HTTP endpoint tests over the assembled router.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use librarium::billing::{
    CheckoutConfig, CheckoutManager, MockPaymentClient, Plans, PortalConfig, PortalManager,
};
use librarium::directory::DirectoryClient;
use librarium::email::ConsoleMailer;
use librarium::http::{router, AppState};
use librarium::platform::InMemoryPlatform;
use librarium::session::{MockIdentityProvider, SessionStore};
use librarium::tenant::{Role, TenantContext};
use librarium::{EmailConfig, PlatformClient};
use serde_json::{json, Value};
use tower::ServiceExt;

struct Harness {
    app: Router,
    platform: InMemoryPlatform,
    mailer: Arc<ConsoleMailer>,
    directory: DirectoryClient,
}

fn harness() -> Harness {
    let platform = InMemoryPlatform::new();
    let shared: Arc<dyn PlatformClient> = Arc::new(platform.clone());
    let provider = Arc::new(MockIdentityProvider::new());
    let client = Arc::new(MockPaymentClient::new());
    let mailer = Arc::new(ConsoleMailer::new());
    let mailer_dyn: Arc<dyn librarium::email::Mailer> = mailer.clone();

    let plans = Plans::builder()
        .plan("free")
            .free()
            .done()
        .plan("starter")
            .monthly_price("price_starter_m")
            .yearly_price("price_starter_y")
            .done()
        .build();

    let state = AppState {
        sessions: Arc::new(SessionStore::new(provider, Arc::clone(&shared))),
        tenant: Arc::new(TenantContext::new(Arc::clone(&shared))),
        platform: Arc::clone(&shared),
        directory: DirectoryClient::new(Arc::clone(&shared)),
        checkout: Arc::new(CheckoutManager::new(
            Arc::clone(&shared),
            Arc::clone(&client),
            plans,
            CheckoutConfig::new(
                "https://app.example.com/success",
                "https://app.example.com/cancel",
            ),
        )),
        portal: Arc::new(PortalManager::new(
            Arc::clone(&shared),
            client,
            PortalConfig::new("https://app.example.com/settings/billing"),
        )),
        mailer: mailer_dyn,
        email: EmailConfig::default(),
    };

    Harness {
        app: router(state),
        directory: DirectoryClient::new(shared),
        platform,
        mailer,
    }
}

async fn post_json(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(
            Request::post(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

#[tokio::test]
async fn register_creates_and_reports_the_user() {
    let h = harness();
    let (status, body) = post_json(
        &h.app,
        "/api/auth/register",
        json!({
            "email": "bob@example.com",
            "password": "secret-password",
            "username": "bob",
            "fullName": "Bob Builder",
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["user"]["email"], "bob@example.com");
    assert!(body["user"]["id"].as_str().is_some());
}

#[tokio::test]
async fn register_rejects_missing_fields_and_weak_passwords() {
    let h = harness();

    let (status, _) = post_json(
        &h.app,
        "/api/auth/register",
        json!({"email": "", "password": "x", "username": "u", "fullName": ""}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = post_json(
        &h.app,
        "/api/auth/register",
        json!({
            "email": "bob@example.com",
            "password": "12345",
            "username": "bob",
            "fullName": "Bob",
        }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("at least 6"));
}

#[tokio::test]
async fn invite_email_is_admin_gated_and_delivered() {
    let h = harness();
    h.platform.seed_user("admin", "admin@example.com");
    h.platform.seed_user("m", "m@example.com");
    let org_id = h
        .platform
        .create_organization("admin", "Riverside", "riverside", None, None)
        .await
        .unwrap()
        .organization_id
        .unwrap();
    h.platform.seed_membership(&org_id, "m", "member");

    let invitation = h
        .directory
        .invite_member(&org_id, "admin", "bob@example.com", Role::Librarian, None)
        .await
        .unwrap();

    // A plain member may not trigger delivery.
    let (status, _) = post_json(
        &h.app,
        "/api/email/invite",
        json!({"invitationId": invitation.invitation_id, "userId": "m"}),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(h.mailer.sent().is_empty());

    // The admin may.
    let (status, body) = post_json(
        &h.app,
        "/api/email/invite",
        json!({"invitationId": invitation.invitation_id, "userId": "admin"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let sent = h.mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "bob@example.com");
    assert!(sent[0].text.as_ref().unwrap().contains(&invitation.token));

    // Unknown invitation id is a 404, not a generic failure.
    let (status, _) = post_json(
        &h.app,
        "/api/email/invite",
        json!({"invitationId": "missing", "userId": "admin"}),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn checkout_endpoint_returns_session_and_maps_errors() {
    let h = harness();
    h.platform.seed_user("owner", "owner@example.com");
    h.platform.seed_user("m", "m@example.com");
    let org_id = h
        .platform
        .create_organization("owner", "Riverside", "riverside", None, None)
        .await
        .unwrap()
        .organization_id
        .unwrap();
    h.platform.seed_membership(&org_id, "m", "member");

    let (status, body) = post_json(
        &h.app,
        "/api/stripe/checkout",
        json!({
            "organizationId": org_id,
            "planId": "starter",
            "billingPeriod": "monthly",
            "userId": "owner",
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["sessionId"].as_str().unwrap().starts_with("cs_test_"));
    assert!(body["url"].as_str().unwrap().contains("checkout.stripe.com"));

    // Member: fixed 403 copy.
    let (status, body) = post_json(
        &h.app,
        "/api/stripe/checkout",
        json!({
            "organizationId": org_id,
            "planId": "starter",
            "billingPeriod": "monthly",
            "userId": "m",
        }),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body["error"]
        .as_str()
        .unwrap()
        .contains("Only admins can manage billing"));

    // Free tier: client-visible no-op message.
    let (status, _) = post_json(
        &h.app,
        "/api/stripe/checkout",
        json!({
            "organizationId": org_id,
            "planId": "free",
            "billingPeriod": "monthly",
            "userId": "owner",
        }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Malformed billing period is caught before orchestration.
    let (status, _) = post_json(
        &h.app,
        "/api/stripe/checkout",
        json!({
            "organizationId": org_id,
            "planId": "starter",
            "billingPeriod": "weekly",
            "userId": "owner",
        }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn portal_endpoint_returns_url_after_checkout() {
    let h = harness();
    h.platform.seed_user("owner", "owner@example.com");
    let org_id = h
        .platform
        .create_organization("owner", "Riverside", "riverside", None, None)
        .await
        .unwrap()
        .organization_id
        .unwrap();

    // Before any checkout there is no customer record.
    let (status, _) = post_json(
        &h.app,
        "/api/stripe/portal",
        json!({"organizationId": org_id, "userId": "owner"}),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    post_json(
        &h.app,
        "/api/stripe/checkout",
        json!({
            "organizationId": org_id,
            "planId": "starter",
            "billingPeriod": "monthly",
            "userId": "owner",
        }),
    )
    .await;

    let (status, body) = post_json(
        &h.app,
        "/api/stripe/portal",
        json!({"organizationId": org_id, "userId": "owner"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["url"].as_str().unwrap().contains("billing.stripe.com"));
}

#[tokio::test]
async fn health_ping_reports_platform_round_trip() {
    let h = harness();
    let response = h
        .app
        .clone()
        .oneshot(Request::get("/api/health/ping").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["status"], "ok");
    assert!(body["timestamp"].as_str().is_some());
    assert!(body["response_time_ms"].as_u64().is_some());

    // POST works too.
    let (status, body) = post_json(&h.app, "/api/health/ping", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}
