//! End-to-end invitation flows: invite, register, accept.

use std::sync::Arc;

use librarium::directory::{AcceptInvitationError, DirectoryClient, DirectoryError};
use librarium::platform::{InMemoryPlatform, PlatformClient};
use librarium::session::{MockIdentityProvider, Principal, SessionStore};
use librarium::tenant::{Role, TenantContext, TenantState};

struct Harness {
    platform: InMemoryPlatform,
    directory: DirectoryClient,
    org_id: String,
}

/// One organization with an admin, ready to invite.
async fn harness() -> Harness {
    let platform = InMemoryPlatform::new();
    platform.seed_user("admin", "admin@example.com");
    let org_id = platform
        .create_organization("admin", "Riverside Library", "riverside-library", None, None)
        .await
        .unwrap()
        .organization_id
        .unwrap();
    let directory = DirectoryClient::new(Arc::new(platform.clone()));
    Harness {
        platform,
        directory,
        org_id,
    }
}

#[tokio::test]
async fn invite_register_accept_resolves_as_librarian() {
    let h = harness().await;

    let invitation = h
        .directory
        .invite_member(&h.org_id, "admin", "bob@example.com", Role::Librarian, None)
        .await
        .unwrap();

    // Bob registers with the invited email, then opens the invite link.
    let provider = Arc::new(MockIdentityProvider::new());
    let sessions = SessionStore::new(provider, Arc::new(h.platform.clone()));
    let bob = sessions
        .sign_up("bob@example.com", "secret-password", "bob", "Bob Builder")
        .await
        .unwrap();
    h.platform.seed_user(&bob.id, "bob@example.com");

    let joined_org = h
        .directory
        .accept_invitation(&invitation.token, &bob.id)
        .await
        .unwrap();
    assert_eq!(joined_org, h.org_id);

    // Bob's tenant context resolves to the joined organization.
    let context = TenantContext::new(Arc::new(h.platform.clone()));
    context
        .resolve(Some(Principal {
            id: bob.id.clone(),
            email: bob.email.clone(),
            metadata: serde_json::Value::Null,
        }))
        .await
        .unwrap();

    let snapshot = context.snapshot();
    assert_eq!(snapshot.current_organization().unwrap().id, h.org_id);
    assert_eq!(snapshot.current_role(), Some(Role::Librarian));
    assert!(snapshot.capabilities().can_manage_books);
    assert!(!snapshot.capabilities().can_manage_members);
}

#[tokio::test]
async fn acceptance_with_different_email_fails_with_email_mismatch() {
    let h = harness().await;

    let invitation = h
        .directory
        .invite_member(&h.org_id, "admin", "bob@example.com", Role::Librarian, None)
        .await
        .unwrap();

    // Bob registers under a different address than the one invited.
    h.platform.seed_user("bob2", "robert@example.com");

    let err = h
        .directory
        .accept_invitation(&invitation.token, "bob2")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        DirectoryError::Invitation(AcceptInvitationError::EmailMismatch)
    ));
}

#[tokio::test]
async fn acceptance_is_at_most_once() {
    let h = harness().await;

    let invitation = h
        .directory
        .invite_member(&h.org_id, "admin", "bob@example.com", Role::Member, None)
        .await
        .unwrap();
    h.platform.seed_user("bob", "bob@example.com");

    h.directory
        .accept_invitation(&invitation.token, "bob")
        .await
        .unwrap();

    let err = h
        .directory
        .accept_invitation(&invitation.token, "bob")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        DirectoryError::Invitation(AcceptInvitationError::NotPending)
    ));

    // Only the admin and bob are members; no duplicate row.
    let stats = h.platform.get_organization_stats(&h.org_id).await.unwrap();
    assert_eq!(stats.total_members, 2);
}

#[tokio::test]
async fn expired_invitation_rejected_regardless_of_status() {
    let h = harness().await;

    let invitation = h
        .directory
        .invite_member(&h.org_id, "admin", "bob@example.com", Role::Member, None)
        .await
        .unwrap();
    h.platform.seed_user("bob", "bob@example.com");

    // The stored status is still pending; expiry is a read-time check.
    h.platform.expire_invitation(&invitation.invitation_id);

    let err = h
        .directory
        .accept_invitation(&invitation.token, "bob")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        DirectoryError::Invitation(AcceptInvitationError::Expired)
    ));
}

#[tokio::test]
async fn acceptance_respects_the_member_quota() {
    let h = harness().await;
    h.platform.set_max_users(&h.org_id, 1);

    let invitation = h
        .directory
        .invite_member(&h.org_id, "admin", "bob@example.com", Role::Member, None)
        .await
        .unwrap();
    h.platform.seed_user("bob", "bob@example.com");

    let err = h
        .directory
        .accept_invitation(&invitation.token, "bob")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        DirectoryError::Invitation(AcceptInvitationError::UserLimitReached)
    ));
}

#[tokio::test]
async fn garbage_token_is_invalid() {
    let h = harness().await;
    h.platform.seed_user("bob", "bob@example.com");

    let err = h
        .directory
        .accept_invitation("not-a-real-token", "bob")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        DirectoryError::Invitation(AcceptInvitationError::InvalidToken)
    ));
}

#[tokio::test]
async fn non_admin_cannot_invite() {
    let h = harness().await;
    h.platform.seed_membership(&h.org_id, "m", "member");

    let err = h
        .directory
        .invite_member(&h.org_id, "m", "friend@example.com", Role::Member, None)
        .await
        .unwrap_err();
    assert!(matches!(err, DirectoryError::NotAMember));
}

#[tokio::test]
async fn existing_member_cannot_accept_again() {
    let h = harness().await;

    let invitation = h
        .directory
        .invite_member(
            &h.org_id,
            "admin",
            "admin@example.com",
            Role::Member,
            None,
        )
        .await
        .unwrap();

    let err = h
        .directory
        .accept_invitation(&invitation.token, "admin")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        DirectoryError::Invitation(AcceptInvitationError::AlreadyMember)
    ));
}

#[tokio::test]
async fn state_machine_reaches_terminal_states_exactly_once() {
    // TenantState transitions across a full sign-in, join, sign-out cycle.
    let h = harness().await;
    h.platform.seed_user("bob", "bob@example.com");
    let invitation = h
        .directory
        .invite_member(&h.org_id, "admin", "bob@example.com", Role::Member, None)
        .await
        .unwrap();

    let context = TenantContext::new(Arc::new(h.platform.clone()));
    let bob = Principal {
        id: "bob".to_string(),
        email: "bob@example.com".to_string(),
        metadata: serde_json::Value::Null,
    };

    // Before joining: NoTenant.
    context.resolve(Some(bob.clone())).await.unwrap();
    assert!(matches!(context.snapshot().state, TenantState::NoTenant));

    // After joining: Resolved.
    h.directory
        .accept_invitation(&invitation.token, "bob")
        .await
        .unwrap();
    context.refresh_organizations().await.unwrap();
    assert!(matches!(
        context.snapshot().state,
        TenantState::Resolved { .. }
    ));

    // Sign-out: Unresolved again.
    context.resolve(None).await.unwrap();
    assert!(matches!(context.snapshot().state, TenantState::Unresolved));
}
