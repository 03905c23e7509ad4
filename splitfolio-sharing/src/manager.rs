//! Share workflow: create, invite, respond, read, update, remove, rotate.
//!
//! Coordinates the store (resources, memberships, public keys) with the
//! envelope primitives. Resource data is encrypted once per resource; each
//! member gets their own wrapped copy of the resource key.

use crate::error::{SharingError, SharingResult};
use crate::keyring::ResourceKeyring;
use crate::session::Session;
use crate::store::ShareStore;
use crate::types::*;
use chrono::Utc;
use serde_json::Value;
use splitfolio_crypto::{
    decrypt, encrypt, generate_symmetric_key, seal_resource, unwrap_resource_key,
    wrap_resource_key, SymmetricKey,
};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Orchestrates resource sharing for the signed-in user.
pub struct ShareManager<S: ShareStore> {
    store: Arc<S>,
    session: Arc<Session>,
    keyring: ResourceKeyring,
}

impl<S: ShareStore> ShareManager<S> {
    pub fn new(store: Arc<S>, session: Arc<Session>) -> Self {
        Self {
            store,
            session,
            keyring: ResourceKeyring::new(),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn keyring(&self) -> &ResourceKeyring {
        &self.keyring
    }

    /// Creates an encrypted resource owned by the current user.
    ///
    /// The owner's membership is confirmed immediately.
    pub async fn create_resource(&self, kind: ResourceKind, data: &Value) -> SharingResult<ResourceId> {
        let me = self.session.user_id();
        let sealed = seal_resource(self.session.public_key(), data, self.session.config().cipher)?;

        let id = Uuid::now_v7();
        let now = Utc::now();
        self.store
            .insert_resource(EncryptedResource {
                id,
                kind,
                owner_id: me,
                encrypted_data: sealed.encrypted_data,
                created_at: now,
                updated_at: now,
            })
            .await?;
        self.store
            .insert_membership(Membership::new(
                id,
                me,
                sealed.owner_key.clone(),
                MembershipStatus::Confirmed,
            ))
            .await?;
        self.keyring.insert(id, sealed.owner_key.clone(), sealed.key).await;

        info!(resource_id = %id, ?kind, "created resource");
        Ok(id)
    }

    /// Invites a user by wrapping the resource key to their public key.
    ///
    /// Only confirmed members can invite. Existing memberships, the resource
    /// key and the resource data are left untouched.
    pub async fn invite(&self, resource_id: ResourceId, invitee: UserId) -> SharingResult<Membership> {
        let mine = self.require_confirmed(resource_id).await?;
        match self.store.membership(resource_id, invitee).await {
            Ok(_) => {
                return Err(SharingError::AlreadyMember {
                    resource_id,
                    user_id: invitee,
                });
            }
            Err(SharingError::NotMember { .. }) => {}
            Err(e) => return Err(e),
        }

        let invitee_keys = self.store.user_keys(invitee).await?;
        let key = self.resource_key(&mine).await?;
        let wrapped = wrap_resource_key(&key, &invitee_keys.public_key)?;

        let membership = Membership::new(resource_id, invitee, wrapped, MembershipStatus::Pending);
        self.store.insert_membership(membership.clone()).await?;

        info!(%resource_id, %invitee, "invited member");
        Ok(membership)
    }

    /// Accepts or rejects the current user's pending invitation.
    pub async fn respond(&self, resource_id: ResourceId, accept: bool) -> SharingResult<Membership> {
        let me = self.session.user_id();
        let mut membership = self.store.membership(resource_id, me).await?;
        let target = if accept {
            MembershipStatus::Confirmed
        } else {
            MembershipStatus::Rejected
        };
        if membership.status != MembershipStatus::Pending {
            return Err(SharingError::InvalidTransition {
                from: membership.status,
                to: target,
            });
        }

        membership.status = target;
        self.store.update_membership(membership.clone()).await?;
        if !accept {
            self.keyring.remove(&resource_id).await;
        }

        info!(%resource_id, status = %target, "responded to invitation");
        Ok(membership)
    }

    /// Decrypts a resource's data for a confirmed member.
    ///
    /// Data that is not JSON is returned as `Value::String`.
    pub async fn read_resource(&self, resource_id: ResourceId) -> SharingResult<Value> {
        let mine = self.require_confirmed(resource_id).await?;
        let resource = self.store.resource(resource_id).await?;
        let key = self.resource_key(&mine).await?;
        Ok(decrypt(&resource.encrypted_data, &key)?)
    }

    /// Re-encrypts new data under the existing resource key.
    pub async fn update_resource(&self, resource_id: ResourceId, data: &Value) -> SharingResult<()> {
        let mine = self.require_confirmed(resource_id).await?;
        let key = self.resource_key(&mine).await?;
        let encrypted = encrypt(data, &key, self.session.config().cipher)?;
        self.store.update_resource_data(resource_id, encrypted).await?;

        debug!(%resource_id, "updated resource data");
        Ok(())
    }

    /// Lists every membership of a resource the current user belongs to.
    pub async fn members(&self, resource_id: ResourceId) -> SharingResult<Vec<Membership>> {
        self.require_confirmed(resource_id).await?;
        self.store.memberships(resource_id).await
    }

    /// Removes a membership. The owner can remove anyone but themselves;
    /// other members can only remove themselves.
    ///
    /// The resource key is not rotated, so a removed member who kept the key
    /// can still read data encrypted before [`Self::rotate_resource_key`].
    pub async fn remove_member(&self, resource_id: ResourceId, user_id: UserId) -> SharingResult<Membership> {
        let me = self.session.user_id();
        let resource = self.store.resource(resource_id).await?;

        if user_id == resource.owner_id {
            return Err(SharingError::ShareDenied(
                "the owner cannot be removed from their resource".to_string(),
            ));
        }
        if me != resource.owner_id && me != user_id {
            return Err(SharingError::ShareDenied(
                "only the owner can remove other members".to_string(),
            ));
        }

        let removed = self.store.delete_membership(resource_id, user_id).await?;
        if me == user_id {
            self.keyring.remove(&resource_id).await;
        }

        warn!(
            %resource_id,
            %user_id,
            "removed member without key rotation; earlier data stays readable with the old key"
        );
        Ok(removed)
    }

    /// Replaces the resource key. Owner only.
    ///
    /// The data is re-encrypted under a new key and the new key is wrapped
    /// for every pending or confirmed member. Rejected memberships are
    /// dropped since they would otherwise keep a wrapped copy. The store
    /// applies all of it in one step; if the resource changed in the
    /// meantime the rotation fails with [`SharingError::ConcurrentChange`]
    /// and nothing is written.
    pub async fn rotate_resource_key(&self, resource_id: ResourceId) -> SharingResult<()> {
        let resource = self.store.resource(resource_id).await?;
        if resource.owner_id != self.session.user_id() {
            return Err(SharingError::ShareDenied(
                "only the owner can rotate the resource key".to_string(),
            ));
        }

        let mine = self.require_confirmed(resource_id).await?;
        let old_key = self.resource_key(&mine).await?;
        let data = decrypt(&resource.encrypted_data, &old_key)?;

        let new_key = generate_symmetric_key();
        let encrypted = encrypt(&data, &new_key, self.session.config().cipher)?;

        let mut rewrapped = Vec::new();
        let mut dropped = Vec::new();
        for membership in self.store.memberships(resource_id).await? {
            if !membership.status.holds_key() {
                dropped.push(membership);
                continue;
            }
            let public_key = self.store.user_keys(membership.user_id).await?.public_key;
            rewrapped.push(Membership {
                wrapped_key: wrap_resource_key(&new_key, &public_key)?,
                ..membership
            });
        }

        let members = rewrapped.len();
        let own_wrapped = rewrapped
            .iter()
            .find(|m| m.user_id == mine.user_id)
            .map(|m| m.wrapped_key.clone());
        self.store
            .replace_resource_key(KeyRotation {
                resource_id,
                previous_data: resource.encrypted_data,
                encrypted_data: encrypted,
                rewrapped,
                dropped,
            })
            .await?;

        match own_wrapped {
            Some(wrapped) => self.keyring.insert(resource_id, wrapped, new_key).await,
            None => {
                self.keyring.remove(&resource_id).await;
            }
        }

        info!(%resource_id, members, "rotated resource key");
        Ok(())
    }

    async fn require_confirmed(&self, resource_id: ResourceId) -> SharingResult<Membership> {
        let membership = self
            .store
            .membership(resource_id, self.session.user_id())
            .await?;
        if membership.status != MembershipStatus::Confirmed {
            return Err(SharingError::ShareDenied(format!(
                "membership is {}, not confirmed",
                membership.status
            )));
        }
        Ok(membership)
    }

    /// Cached key, or unwrap the current user's own wrapped key and cache it.
    async fn resource_key(&self, mine: &Membership) -> SharingResult<SymmetricKey> {
        if let Ok(key) = self.keyring.get(&mine.resource_id, &mine.wrapped_key).await {
            return Ok(key);
        }
        let key = unwrap_resource_key(self.session.private_key(), &mine.wrapped_key)?;
        self.keyring
            .insert(mine.resource_id, mine.wrapped_key.clone(), key.clone())
            .await;
        Ok(key)
    }
}
