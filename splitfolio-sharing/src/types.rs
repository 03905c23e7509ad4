//! Shared types for resource sharing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use splitfolio_crypto::WrappedKey;
use std::fmt;
use uuid::Uuid;

pub type UserId = Uuid;
pub type ResourceId = Uuid;

/// What an encrypted resource holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    ExpenseGroup,
    Portfolio,
}

/// Where a member stands on an invitation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MembershipStatus {
    Pending,
    Confirmed,
    Rejected,
}

impl MembershipStatus {
    /// Members in these states keep a wrapped key across rotations.
    pub fn holds_key(self) -> bool {
        matches!(self, MembershipStatus::Pending | MembershipStatus::Confirmed)
    }
}

impl fmt::Display for MembershipStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MembershipStatus::Pending => "pending",
            MembershipStatus::Confirmed => "confirmed",
            MembershipStatus::Rejected => "rejected",
        })
    }
}

/// A user's access to one resource. One per (resource, user).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    pub resource_id: ResourceId,
    pub user_id: UserId,
    /// The resource key wrapped to this user's public key.
    pub wrapped_key: WrappedKey,
    pub status: MembershipStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Membership {
    pub fn new(
        resource_id: ResourceId,
        user_id: UserId,
        wrapped_key: WrappedKey,
        status: MembershipStatus,
    ) -> Self {
        let now = Utc::now();
        Self {
            resource_id,
            user_id,
            wrapped_key,
            status,
            created_at: now,
            updated_at: now,
        }
    }
}

/// An expense group or portfolio as the backend stores it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedResource {
    pub id: ResourceId,
    pub kind: ResourceKind,
    pub owner_id: UserId,
    /// Envelope of the resource's JSON data.
    pub encrypted_data: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A user's published key material.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserKeys {
    pub user_id: UserId,
    /// RSA public key (PEM), readable by everyone.
    pub public_key: String,
    /// Serialized `PrivateKeyRecord`.
    pub private_key_record: String,
}

/// A prepared resource-key rotation, applied by the store in one step.
///
/// `previous_data`, `rewrapped` and `dropped` describe the state the
/// rotation was computed from. The store refuses the swap if the resource
/// or its memberships no longer match it.
#[derive(Clone, Debug)]
pub struct KeyRotation {
    pub resource_id: ResourceId,
    pub previous_data: String,
    /// The data re-encrypted under the new key.
    pub encrypted_data: String,
    /// Memberships that keep access, carrying the new wrapped key.
    pub rewrapped: Vec<Membership>,
    /// Memberships deleted by the rotation.
    pub dropped: Vec<Membership>,
}
