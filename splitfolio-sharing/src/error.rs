//! Sharing error types.

use crate::types::{MembershipStatus, ResourceId, UserId};
use thiserror::Error;

/// Result type for sharing operations.
pub type SharingResult<T> = Result<T, SharingError>;

/// Errors that can occur while creating, sharing or opening resources.
#[derive(Debug, Error)]
pub enum SharingError {
    #[error("crypto error: {0}")]
    Crypto(#[from] splitfolio_crypto::CryptoError),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("user {user_id} is not a member of resource {resource_id}")]
    NotMember {
        resource_id: ResourceId,
        user_id: UserId,
    },

    #[error("user {user_id} is already a member of resource {resource_id}")]
    AlreadyMember {
        resource_id: ResourceId,
        user_id: UserId,
    },

    #[error("membership cannot move from {from} to {to}")]
    InvalidTransition {
        from: MembershipStatus,
        to: MembershipStatus,
    },

    #[error("share operation denied: {0}")]
    ShareDenied(String),

    #[error("resource {0} changed during key rotation")]
    ConcurrentChange(ResourceId),

    #[error("background task failed: {0}")]
    Task(String),
}
