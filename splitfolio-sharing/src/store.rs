//! Storage seam for users' key material, encrypted resources and memberships.
//!
//! The backend only ever sees public keys, sealed private-key records,
//! envelopes and wrapped keys. [`InMemoryShareStore`] backs tests and
//! offline use.

use crate::error::{SharingError, SharingResult};
use crate::types::{
    EncryptedResource, KeyRotation, Membership, MembershipStatus, ResourceId, UserId, UserKeys,
};
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Persistence for the sharing layer.
pub trait ShareStore: Send + Sync {
    /// Inserts or replaces a user's published key material.
    fn put_user_keys(&self, keys: UserKeys) -> impl Future<Output = SharingResult<()>> + Send;

    fn user_keys(&self, user_id: UserId) -> impl Future<Output = SharingResult<UserKeys>> + Send;

    fn insert_resource(
        &self,
        resource: EncryptedResource,
    ) -> impl Future<Output = SharingResult<()>> + Send;

    fn resource(
        &self,
        resource_id: ResourceId,
    ) -> impl Future<Output = SharingResult<EncryptedResource>> + Send;

    /// Replaces a resource's envelope.
    fn update_resource_data(
        &self,
        resource_id: ResourceId,
        encrypted_data: String,
    ) -> impl Future<Output = SharingResult<()>> + Send;

    /// Fails with [`SharingError::AlreadyMember`] if the pair already exists.
    fn insert_membership(
        &self,
        membership: Membership,
    ) -> impl Future<Output = SharingResult<()>> + Send;

    fn membership(
        &self,
        resource_id: ResourceId,
        user_id: UserId,
    ) -> impl Future<Output = SharingResult<Membership>> + Send;

    fn memberships(
        &self,
        resource_id: ResourceId,
    ) -> impl Future<Output = SharingResult<Vec<Membership>>> + Send;

    /// Replaces an existing membership (status change or re-wrapped key).
    fn update_membership(
        &self,
        membership: Membership,
    ) -> impl Future<Output = SharingResult<()>> + Send;

    fn delete_membership(
        &self,
        resource_id: ResourceId,
        user_id: UserId,
    ) -> impl Future<Output = SharingResult<Membership>> + Send;

    /// Applies a key rotation atomically: the new envelope, every new
    /// wrapped key and the dropped memberships land together or not at all.
    ///
    /// Fails with [`SharingError::ConcurrentChange`] without writing if the
    /// envelope or the set of (member, status) pairs differs from the
    /// rotation's snapshot.
    fn replace_resource_key(
        &self,
        rotation: KeyRotation,
    ) -> impl Future<Output = SharingResult<()>> + Send;
}

#[derive(Default)]
struct Tables {
    users: HashMap<UserId, UserKeys>,
    resources: HashMap<ResourceId, EncryptedResource>,
    memberships: HashMap<(ResourceId, UserId), Membership>,
}

/// [`ShareStore`] held in process memory. Clones share the same tables.
#[derive(Clone, Default)]
pub struct InMemoryShareStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryShareStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ShareStore for InMemoryShareStore {
    async fn put_user_keys(&self, keys: UserKeys) -> SharingResult<()> {
        self.tables.write().await.users.insert(keys.user_id, keys);
        Ok(())
    }

    async fn user_keys(&self, user_id: UserId) -> SharingResult<UserKeys> {
        self.tables
            .read()
            .await
            .users
            .get(&user_id)
            .cloned()
            .ok_or_else(|| SharingError::NotFound(format!("no keys published for user {user_id}")))
    }

    async fn insert_resource(&self, resource: EncryptedResource) -> SharingResult<()> {
        let mut tables = self.tables.write().await;
        if tables.resources.contains_key(&resource.id) {
            return Err(SharingError::ShareDenied(format!(
                "resource {} already exists",
                resource.id
            )));
        }
        tables.resources.insert(resource.id, resource);
        Ok(())
    }

    async fn resource(&self, resource_id: ResourceId) -> SharingResult<EncryptedResource> {
        self.tables
            .read()
            .await
            .resources
            .get(&resource_id)
            .cloned()
            .ok_or_else(|| SharingError::NotFound(format!("resource {resource_id}")))
    }

    async fn update_resource_data(
        &self,
        resource_id: ResourceId,
        encrypted_data: String,
    ) -> SharingResult<()> {
        let mut tables = self.tables.write().await;
        let resource = tables
            .resources
            .get_mut(&resource_id)
            .ok_or_else(|| SharingError::NotFound(format!("resource {resource_id}")))?;
        resource.encrypted_data = encrypted_data;
        resource.updated_at = Utc::now();
        Ok(())
    }

    async fn insert_membership(&self, membership: Membership) -> SharingResult<()> {
        let mut tables = self.tables.write().await;
        let pair = (membership.resource_id, membership.user_id);
        if tables.memberships.contains_key(&pair) {
            return Err(SharingError::AlreadyMember {
                resource_id: pair.0,
                user_id: pair.1,
            });
        }
        tables.memberships.insert(pair, membership);
        Ok(())
    }

    async fn membership(&self, resource_id: ResourceId, user_id: UserId) -> SharingResult<Membership> {
        self.tables
            .read()
            .await
            .memberships
            .get(&(resource_id, user_id))
            .cloned()
            .ok_or(SharingError::NotMember {
                resource_id,
                user_id,
            })
    }

    async fn memberships(&self, resource_id: ResourceId) -> SharingResult<Vec<Membership>> {
        let tables = self.tables.read().await;
        let mut members: Vec<Membership> = tables
            .memberships
            .values()
            .filter(|m| m.resource_id == resource_id)
            .cloned()
            .collect();
        members.sort_by_key(|m| m.created_at);
        Ok(members)
    }

    async fn update_membership(&self, membership: Membership) -> SharingResult<()> {
        let mut tables = self.tables.write().await;
        let pair = (membership.resource_id, membership.user_id);
        match tables.memberships.get_mut(&pair) {
            Some(existing) => {
                *existing = Membership {
                    updated_at: Utc::now(),
                    ..membership
                };
                Ok(())
            }
            None => Err(SharingError::NotMember {
                resource_id: pair.0,
                user_id: pair.1,
            }),
        }
    }

    async fn delete_membership(
        &self,
        resource_id: ResourceId,
        user_id: UserId,
    ) -> SharingResult<Membership> {
        self.tables
            .write()
            .await
            .memberships
            .remove(&(resource_id, user_id))
            .ok_or(SharingError::NotMember {
                resource_id,
                user_id,
            })
    }

    async fn replace_resource_key(&self, rotation: KeyRotation) -> SharingResult<()> {
        let KeyRotation {
            resource_id,
            previous_data,
            encrypted_data,
            rewrapped,
            dropped,
        } = rotation;

        let mut tables = self.tables.write().await;
        let Tables {
            resources,
            memberships,
            ..
        } = &mut *tables;

        let resource = resources
            .get_mut(&resource_id)
            .ok_or_else(|| SharingError::NotFound(format!("resource {resource_id}")))?;

        let current: HashSet<(UserId, MembershipStatus)> = memberships
            .values()
            .filter(|m| m.resource_id == resource_id)
            .map(|m| (m.user_id, m.status))
            .collect();
        let expected: HashSet<(UserId, MembershipStatus)> = rewrapped
            .iter()
            .chain(&dropped)
            .map(|m| (m.user_id, m.status))
            .collect();
        if resource.encrypted_data != previous_data || current != expected {
            return Err(SharingError::ConcurrentChange(resource_id));
        }

        let now = Utc::now();
        resource.encrypted_data = encrypted_data;
        resource.updated_at = now;
        for membership in rewrapped {
            if let Some(existing) = memberships.get_mut(&(resource_id, membership.user_id)) {
                existing.wrapped_key = membership.wrapped_key;
                existing.updated_at = now;
            }
        }
        for membership in dropped {
            memberships.remove(&(resource_id, membership.user_id));
        }
        Ok(())
    }
}
