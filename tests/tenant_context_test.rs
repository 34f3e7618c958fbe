//! Tenant context state machine tests.

use std::sync::Arc;

use librarium::directory::DirectoryError;
use librarium::platform::{InMemoryPlatform, PlatformClient};
use librarium::session::Principal;
use librarium::tenant::{Capabilities, Role, TenantContext, TenantState};

fn principal(id: &str, email: &str) -> Principal {
    Principal {
        id: id.to_string(),
        email: email.to_string(),
        metadata: serde_json::Value::Null,
    }
}

fn context(platform: &InMemoryPlatform) -> TenantContext {
    TenantContext::new(Arc::new(platform.clone()))
}

#[tokio::test]
async fn zero_memberships_resolve_to_no_tenant() {
    let platform = InMemoryPlatform::new();
    platform.seed_user("lonely", "lonely@example.com");

    let context = context(&platform);
    context
        .resolve(Some(principal("lonely", "lonely@example.com")))
        .await
        .unwrap();

    let snapshot = context.snapshot();
    assert!(matches!(snapshot.state, TenantState::NoTenant));
    assert!(snapshot.current_organization().is_none());
    assert!(snapshot.current_role().is_none());
    assert_eq!(snapshot.capabilities(), Capabilities::none());
    assert!(snapshot.org_stats.is_none());
}

#[tokio::test]
async fn single_membership_resolves_to_it() {
    let platform = InMemoryPlatform::new();
    platform.seed_user("alice", "alice@example.com");
    let org_id = platform
        .create_organization("alice", "Riverside Library", "riverside-library", None, None)
        .await
        .unwrap()
        .organization_id
        .unwrap();

    let context = context(&platform);
    context
        .resolve(Some(principal("alice", "alice@example.com")))
        .await
        .unwrap();

    let snapshot = context.snapshot();
    let organization = snapshot.current_organization().unwrap();
    assert_eq!(organization.id, org_id);
    assert_eq!(snapshot.current_role(), Some(Role::Owner));
    assert!(snapshot.capabilities().is_owner);
    // Stats are refreshed by the context itself on resolution.
    let stats = snapshot.org_stats.unwrap();
    assert_eq!(stats.total_members, 1);
}

#[tokio::test]
async fn switch_to_foreign_org_fails_without_partial_update() {
    let platform = InMemoryPlatform::new();
    platform.seed_user("alice", "alice@example.com");
    platform.seed_user("mallory", "mallory@example.com");
    let own_org = platform
        .create_organization("alice", "Alice's Shelf", "alice-shelf", None, None)
        .await
        .unwrap()
        .organization_id
        .unwrap();
    let foreign_org = platform
        .create_organization("mallory", "Not Yours", "not-yours", None, None)
        .await
        .unwrap()
        .organization_id
        .unwrap();

    let context = context(&platform);
    context
        .resolve(Some(principal("alice", "alice@example.com")))
        .await
        .unwrap();

    let err = context.switch_organization(&foreign_org).await.unwrap_err();
    assert!(matches!(err, DirectoryError::NotAMember));

    // The previously active organization is untouched.
    let snapshot = context.snapshot();
    assert_eq!(snapshot.current_organization().unwrap().id, own_org);
    assert_eq!(snapshot.current_role(), Some(Role::Owner));
    assert!(!snapshot.is_loading_orgs);
}

#[tokio::test]
async fn switch_recomputes_role_atomically() {
    let platform = InMemoryPlatform::new();
    platform.seed_user("alice", "alice@example.com");
    let first = platform
        .create_organization("alice", "First", "first-org", None, None)
        .await
        .unwrap()
        .organization_id
        .unwrap();
    let second = platform
        .create_organization("alice", "Second", "second-org", None, None)
        .await
        .unwrap()
        .organization_id
        .unwrap();
    // Alice is owner of both via creation; demote her in the second org.
    platform.seed_membership(&second, "alice", "librarian");

    let context = context(&platform);
    context
        .resolve(Some(principal("alice", "alice@example.com")))
        .await
        .unwrap();

    context.switch_organization(&first).await.unwrap();
    let snapshot = context.snapshot();
    assert_eq!(snapshot.current_organization().unwrap().id, first);
    assert_eq!(snapshot.current_role(), Some(Role::Owner));

    context.switch_organization(&second).await.unwrap();
    let snapshot = context.snapshot();
    assert_eq!(snapshot.current_organization().unwrap().id, second);
    assert_eq!(snapshot.current_role(), Some(Role::Librarian));
    let caps = snapshot.capabilities();
    assert!(caps.can_manage_books);
    assert!(!caps.can_manage_members);
}

#[tokio::test]
async fn missing_current_marker_falls_back_to_earliest_joined() {
    let platform = InMemoryPlatform::new();
    platform.seed_user("alice", "alice@example.com");
    let newer = platform
        .create_organization("alice", "Newer", "newer-org", None, None)
        .await
        .unwrap()
        .organization_id
        .unwrap();
    let older = platform
        .create_organization("alice", "Older", "older-org", None, None)
        .await
        .unwrap()
        .organization_id
        .unwrap();
    platform.set_joined_at(
        &older,
        "alice",
        chrono::Utc::now() - chrono::Duration::days(30),
    );
    // Defensive case: the platform lost the current marker entirely.
    platform.clear_current_org("alice");

    let context = context(&platform);
    context
        .resolve(Some(principal("alice", "alice@example.com")))
        .await
        .unwrap();

    let snapshot = context.snapshot();
    assert_eq!(snapshot.current_organization().unwrap().id, older);
    assert_ne!(snapshot.current_organization().unwrap().id, newer);

    // The tie-break choice was persisted back to the platform.
    let listed = platform.get_user_organizations("alice").await.unwrap();
    let current: Vec<_> = listed.iter().filter(|row| row.is_current).collect();
    assert_eq!(current.len(), 1);
    assert_eq!(current[0].organization_id, older);
}

#[tokio::test]
async fn failed_detail_fetch_returns_to_unresolved() {
    let platform = InMemoryPlatform::new();
    platform.seed_user("alice", "alice@example.com");
    platform
        .create_organization("alice", "Riverside", "riverside", None, None)
        .await
        .unwrap();

    let context = context(&platform);
    platform.fail_next_org_fetch();
    let result = context
        .resolve(Some(principal("alice", "alice@example.com")))
        .await;
    assert!(result.is_err());

    // No stale or half-updated state survives the failure.
    let snapshot = context.snapshot();
    assert!(matches!(snapshot.state, TenantState::Unresolved));
    assert!(snapshot.org_stats.is_none());

    // The consuming page's guard retries and succeeds.
    context
        .resolve(Some(principal("alice", "alice@example.com")))
        .await
        .unwrap();
    assert!(context.snapshot().current_organization().is_some());
}

#[tokio::test]
async fn sign_out_clears_all_tenant_state() {
    let platform = InMemoryPlatform::new();
    platform.seed_user("alice", "alice@example.com");
    platform
        .create_organization("alice", "Riverside", "riverside", None, None)
        .await
        .unwrap();

    let context = context(&platform);
    context
        .resolve(Some(principal("alice", "alice@example.com")))
        .await
        .unwrap();
    assert!(context.snapshot().current_organization().is_some());

    context.resolve(None).await.unwrap();
    let snapshot = context.snapshot();
    assert!(matches!(snapshot.state, TenantState::Unresolved));
    assert!(snapshot.organizations.is_empty());
    assert!(snapshot.org_stats.is_none());
}

#[tokio::test]
async fn create_organization_transitions_no_tenant_to_resolved_owner() {
    let platform = InMemoryPlatform::new();
    platform.seed_user("p", "p@example.com");

    let context = context(&platform);
    context
        .resolve(Some(principal("p", "p@example.com")))
        .await
        .unwrap();
    assert!(matches!(context.snapshot().state, TenantState::NoTenant));

    let created = context
        .create_organization("Riverside Library", "riverside-library", None)
        .await
        .unwrap();
    assert_eq!(created.slug, "riverside-library");

    let snapshot = context.snapshot();
    let organization = snapshot.current_organization().unwrap();
    assert_eq!(organization.slug, "riverside-library");
    assert_eq!(snapshot.current_role(), Some(Role::Owner));
    assert!(snapshot.capabilities().can_manage_members);
}

#[tokio::test]
async fn duplicate_slug_is_surfaced_as_slug_taken() {
    let platform = InMemoryPlatform::new();
    platform.seed_user("a", "a@example.com");
    platform.seed_user("b", "b@example.com");

    let context_a = context(&platform);
    context_a
        .resolve(Some(principal("a", "a@example.com")))
        .await
        .unwrap();
    context_a
        .create_organization("Riverside", "riverside-library", None)
        .await
        .unwrap();

    let context_b = context(&platform);
    context_b
        .resolve(Some(principal("b", "b@example.com")))
        .await
        .unwrap();
    let err = context_b
        .create_organization("Copycat", "riverside-library", None)
        .await
        .unwrap_err();
    assert!(matches!(err, DirectoryError::SlugTaken { .. }));
    // Context B still has no tenant: nothing was created.
    assert!(matches!(context_b.snapshot().state, TenantState::NoTenant));
}

#[tokio::test]
async fn member_role_gates_book_management() {
    let platform = InMemoryPlatform::new();
    platform.seed_user("admin", "admin@example.com");
    platform.seed_user("m", "m@example.com");
    let org = platform
        .create_organization("admin", "Riverside", "riverside", None, None)
        .await
        .unwrap()
        .organization_id
        .unwrap();
    platform.seed_membership(&org, "m", "member");

    let context = context(&platform);
    context
        .resolve(Some(principal("m", "m@example.com")))
        .await
        .unwrap();

    let snapshot = context.snapshot();
    assert_eq!(snapshot.current_role(), Some(Role::Member));
    assert!(!snapshot.capabilities().can_manage_books);
    // The add-book page redirects instead of rendering the form.
    assert!(snapshot.require_manage_books().is_err());
}

#[tokio::test]
async fn refresh_org_stats_clears_without_current_org() {
    let platform = InMemoryPlatform::new();
    platform.seed_user("lonely", "lonely@example.com");

    let context = context(&platform);
    context
        .resolve(Some(principal("lonely", "lonely@example.com")))
        .await
        .unwrap();
    context.refresh_org_stats().await;
    assert!(context.snapshot().org_stats.is_none());
}

#[tokio::test]
async fn overlapping_switches_are_latest_wins() {
    let platform = InMemoryPlatform::new();
    platform.seed_user("alice", "alice@example.com");
    let slow_org = platform
        .create_organization("alice", "Slow", "slow-org", None, None)
        .await
        .unwrap()
        .organization_id
        .unwrap();
    let fast_org = platform
        .create_organization("alice", "Fast", "fast-org", None, None)
        .await
        .unwrap()
        .organization_id
        .unwrap();

    let context = Arc::new(TenantContext::new(Arc::new(platform.clone())));
    context
        .resolve(Some(principal("alice", "alice@example.com")))
        .await
        .unwrap();

    // The first switch stalls in its detail fetch while a second switch
    // starts and completes. The stale result must be discarded.
    platform.delay_next_org_fetch(std::time::Duration::from_millis(200));
    let slow = {
        let context = Arc::clone(&context);
        let slow_org = slow_org.clone();
        tokio::spawn(async move { context.switch_organization(&slow_org).await })
    };
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    context.switch_organization(&fast_org).await.unwrap();
    let _ = slow.await.unwrap();

    let snapshot = context.snapshot();
    assert_eq!(snapshot.current_organization().unwrap().id, fast_org);
    assert_eq!(snapshot.current_organization().unwrap().slug, "fast-org");
}

#[tokio::test]
async fn stats_follow_the_active_organization() {
    let platform = InMemoryPlatform::new();
    platform.seed_user("alice", "alice@example.com");
    let first = platform
        .create_organization("alice", "First", "first-org", None, None)
        .await
        .unwrap()
        .organization_id
        .unwrap();
    let second = platform
        .create_organization("alice", "Second", "second-org", None, None)
        .await
        .unwrap()
        .organization_id
        .unwrap();
    platform.seed_book(&first, "book_1");
    platform.seed_book(&first, "book_2");
    platform.seed_book(&second, "book_3");

    let context = context(&platform);
    context
        .resolve(Some(principal("alice", "alice@example.com")))
        .await
        .unwrap();

    context.switch_organization(&first).await.unwrap();
    assert_eq!(context.snapshot().org_stats.unwrap().total_books, 2);

    context.switch_organization(&second).await.unwrap();
    assert_eq!(context.snapshot().org_stats.unwrap().total_books, 1);
}
