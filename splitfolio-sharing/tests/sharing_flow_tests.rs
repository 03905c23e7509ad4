//! End-to-end sharing flows against the in-memory store.

mod support;

use pretty_assertions::assert_eq;
use serde_json::json;
use splitfolio_crypto::{decrypt, unwrap_resource_key};
use splitfolio_sharing::{
    InMemoryShareStore, MembershipStatus, ResourceKind, ShareStore, SharingError,
};
use std::sync::Arc;
use support::{init_tracing, keypair, user};

#[tokio::test]
async fn owner_reads_created_group() {
    init_tracing();
    let store = Arc::new(InMemoryShareStore::new());
    let owner = user(&store, 0).await;

    let data = json!({"name": "Flat 4B", "expenses": [{"amount": 42.5, "currency": "EUR"}]});
    let id = owner.create_resource(ResourceKind::ExpenseGroup, &data).await.unwrap();

    assert_eq!(owner.read_resource(id).await.unwrap(), data);

    let stored = store.resource(id).await.unwrap();
    assert_eq!(stored.kind, ResourceKind::ExpenseGroup);
    assert!(!stored.encrypted_data.contains("Flat 4B"));

    let members = owner.members(id).await.unwrap();
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].status, MembershipStatus::Confirmed);
}

#[tokio::test]
async fn invitee_reads_after_accepting() {
    let store = Arc::new(InMemoryShareStore::new());
    let owner = user(&store, 0).await;
    let friend = user(&store, 1).await;

    let data = json!({"holdings": [{"ticker": "VWCE", "units": 12}]});
    let id = owner.create_resource(ResourceKind::Portfolio, &data).await.unwrap();
    let invite = owner.invite(id, friend.session().user_id()).await.unwrap();
    assert_eq!(invite.status, MembershipStatus::Pending);

    assert!(matches!(
        friend.read_resource(id).await,
        Err(SharingError::ShareDenied(_))
    ));

    friend.respond(id, true).await.unwrap();
    assert_eq!(friend.read_resource(id).await.unwrap(), data);
}

#[tokio::test]
async fn both_members_recover_the_same_key() {
    let store = Arc::new(InMemoryShareStore::new());
    let owner = user(&store, 0).await;
    let friend = user(&store, 1).await;

    let id = owner.create_resource(ResourceKind::ExpenseGroup, &json!({})).await.unwrap();
    owner.invite(id, friend.session().user_id()).await.unwrap();

    let owner_row = store.membership(id, owner.session().user_id()).await.unwrap();
    let friend_row = store.membership(id, friend.session().user_id()).await.unwrap();
    assert_ne!(owner_row.wrapped_key, friend_row.wrapped_key);

    let owner_key = unwrap_resource_key(&keypair(0).private_key, &owner_row.wrapped_key).unwrap();
    let friend_key = unwrap_resource_key(&keypair(1).private_key, &friend_row.wrapped_key).unwrap();
    assert_eq!(owner_key, friend_key);
}

#[tokio::test]
async fn inviting_does_not_touch_existing_rows() {
    let store = Arc::new(InMemoryShareStore::new());
    let owner = user(&store, 0).await;
    let first = user(&store, 1).await;
    let second = user(&store, 2).await;

    let id = owner.create_resource(ResourceKind::ExpenseGroup, &json!({"n": 1})).await.unwrap();
    owner.invite(id, first.session().user_id()).await.unwrap();

    let data_before = store.resource(id).await.unwrap().encrypted_data;
    let rows_before = store.memberships(id).await.unwrap();

    owner.invite(id, second.session().user_id()).await.unwrap();

    assert_eq!(store.resource(id).await.unwrap().encrypted_data, data_before);
    let rows_after = store.memberships(id).await.unwrap();
    assert_eq!(rows_after.len(), 3);
    for row in &rows_before {
        assert!(rows_after.contains(row));
    }
}

#[tokio::test]
async fn one_membership_per_user() {
    let store = Arc::new(InMemoryShareStore::new());
    let owner = user(&store, 0).await;
    let friend = user(&store, 1).await;

    let id = owner.create_resource(ResourceKind::ExpenseGroup, &json!({})).await.unwrap();
    owner.invite(id, friend.session().user_id()).await.unwrap();

    assert!(matches!(
        owner.invite(id, friend.session().user_id()).await,
        Err(SharingError::AlreadyMember { .. })
    ));
    assert!(matches!(
        owner.invite(id, owner.session().user_id()).await,
        Err(SharingError::AlreadyMember { .. })
    ));
}

#[tokio::test]
async fn rejected_invite_cannot_be_accepted_later() {
    let store = Arc::new(InMemoryShareStore::new());
    let owner = user(&store, 0).await;
    let friend = user(&store, 1).await;

    let id = owner.create_resource(ResourceKind::Portfolio, &json!({})).await.unwrap();
    owner.invite(id, friend.session().user_id()).await.unwrap();

    let rejected = friend.respond(id, false).await.unwrap();
    assert_eq!(rejected.status, MembershipStatus::Rejected);

    match friend.respond(id, true).await {
        Err(SharingError::InvalidTransition { from, to }) => {
            assert_eq!(from, MembershipStatus::Rejected);
            assert_eq!(to, MembershipStatus::Confirmed);
        }
        other => panic!("expected InvalidTransition, got {other:?}"),
    }
    assert!(friend.read_resource(id).await.is_err());
}

#[tokio::test]
async fn outsider_is_not_a_member() {
    let store = Arc::new(InMemoryShareStore::new());
    let owner = user(&store, 0).await;
    let outsider = user(&store, 3).await;

    let id = owner.create_resource(ResourceKind::ExpenseGroup, &json!({})).await.unwrap();
    assert!(matches!(
        outsider.read_resource(id).await,
        Err(SharingError::NotMember { .. })
    ));
    assert!(matches!(
        outsider.invite(id, outsider.session().user_id()).await,
        Err(SharingError::NotMember { .. })
    ));
}

#[tokio::test]
async fn updates_are_visible_to_members() {
    let store = Arc::new(InMemoryShareStore::new());
    let owner = user(&store, 0).await;
    let friend = user(&store, 1).await;

    let id = owner.create_resource(ResourceKind::ExpenseGroup, &json!({"total": 0})).await.unwrap();
    owner.invite(id, friend.session().user_id()).await.unwrap();
    friend.respond(id, true).await.unwrap();

    friend.update_resource(id, &json!({"total": 18.4})).await.unwrap();
    assert_eq!(owner.read_resource(id).await.unwrap(), json!({"total": 18.4}));
}

#[tokio::test]
async fn removal_without_rotation_leaves_old_key_working() {
    let store = Arc::new(InMemoryShareStore::new());
    let owner = user(&store, 0).await;
    let friend = user(&store, 1).await;

    let id = owner.create_resource(ResourceKind::ExpenseGroup, &json!({"v": 1})).await.unwrap();
    owner.invite(id, friend.session().user_id()).await.unwrap();
    let removed = owner.remove_member(id, friend.session().user_id()).await.unwrap();

    assert!(friend.read_resource(id).await.is_err());

    // The removed member kept their wrapped key and the key was not rotated.
    let kept = unwrap_resource_key(&keypair(1).private_key, &removed.wrapped_key).unwrap();
    let ciphertext = store.resource(id).await.unwrap().encrypted_data;
    assert_eq!(decrypt(&ciphertext, &kept).unwrap(), json!({"v": 1}));
}

#[tokio::test]
async fn rotation_locks_out_removed_member() {
    init_tracing();
    let store = Arc::new(InMemoryShareStore::new());
    let owner = user(&store, 0).await;
    let stays = user(&store, 1).await;
    let leaves = user(&store, 2).await;

    let data = json!({"name": "Ski trip"});
    let id = owner.create_resource(ResourceKind::ExpenseGroup, &data).await.unwrap();
    owner.invite(id, stays.session().user_id()).await.unwrap();
    owner.invite(id, leaves.session().user_id()).await.unwrap();
    stays.respond(id, true).await.unwrap();

    // Warm the remaining member's cache with the old key.
    assert_eq!(stays.read_resource(id).await.unwrap(), data);

    let removed = owner.remove_member(id, leaves.session().user_id()).await.unwrap();
    owner.rotate_resource_key(id).await.unwrap();

    let old_key = unwrap_resource_key(&keypair(2).private_key, &removed.wrapped_key).unwrap();
    let ciphertext = store.resource(id).await.unwrap().encrypted_data;
    assert!(decrypt(&ciphertext, &old_key).is_err());

    assert_eq!(owner.read_resource(id).await.unwrap(), data);
    assert_eq!(stays.read_resource(id).await.unwrap(), data);
}

#[tokio::test]
async fn rotation_drops_rejected_memberships() {
    let store = Arc::new(InMemoryShareStore::new());
    let owner = user(&store, 0).await;
    let friend = user(&store, 1).await;

    let id = owner.create_resource(ResourceKind::Portfolio, &json!({})).await.unwrap();
    owner.invite(id, friend.session().user_id()).await.unwrap();
    friend.respond(id, false).await.unwrap();

    owner.rotate_resource_key(id).await.unwrap();
    let members = owner.members(id).await.unwrap();
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].user_id, owner.session().user_id());
}

#[tokio::test]
async fn only_owner_rotates_or_removes_others() {
    let store = Arc::new(InMemoryShareStore::new());
    let owner = user(&store, 0).await;
    let first = user(&store, 1).await;
    let second = user(&store, 2).await;

    let id = owner.create_resource(ResourceKind::ExpenseGroup, &json!({})).await.unwrap();
    for member in [&first, &second] {
        owner.invite(id, member.session().user_id()).await.unwrap();
        member.respond(id, true).await.unwrap();
    }

    assert!(matches!(
        first.rotate_resource_key(id).await,
        Err(SharingError::ShareDenied(_))
    ));
    assert!(matches!(
        first.remove_member(id, second.session().user_id()).await,
        Err(SharingError::ShareDenied(_))
    ));
    assert!(matches!(
        owner.remove_member(id, owner.session().user_id()).await,
        Err(SharingError::ShareDenied(_))
    ));

    // Members may leave on their own.
    first.remove_member(id, first.session().user_id()).await.unwrap();
    assert!(first.keyring().is_empty().await);
    assert_eq!(owner.members(id).await.unwrap().len(), 2);
}
