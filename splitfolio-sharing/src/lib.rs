//! Resource sharing for Splitfolio.
//!
//! Drives the encryption layer for the rest of the app:
//! - Identity registration, login and password change ([`Session`])
//! - Expense groups and portfolios encrypted once under a resource key
//! - Per-member wrapped keys with pending / confirmed / rejected memberships
//! - Explicit resource-key rotation after removing a member
//!
//! Storage sits behind [`ShareStore`]; the backend only ever receives
//! ciphertext, wrapped keys and public keys.

pub mod error;
pub mod keyring;
pub mod manager;
pub mod session;
pub mod store;
pub mod types;

pub use error::{SharingError, SharingResult};
pub use keyring::ResourceKeyring;
pub use manager::ShareManager;
pub use session::Session;
pub use store::{InMemoryShareStore, ShareStore};
pub use types::*;
