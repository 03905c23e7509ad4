//! Client-side encryption layer for Splitfolio.
//!
//! Keeps expense-group and portfolio data opaque to the backend using:
//! - AES-256-GCM envelopes for resource data (AES-256-CTR for legacy data)
//! - RSA-OAEP to wrap per-resource keys for each member
//! - Argon2id (or the legacy iterated SHA-256 loop) to derive the key that
//!   protects a user's RSA private key at rest
//!
//! # Architecture
//!
//! 1. **Identity**: one RSA keypair per user. The public key is published;
//!    the private key is stored only as a [`PrivateKeyRecord`] sealed under a
//!    password-derived key.
//!
//! 2. **Resource key**: one random 256-bit key per group or portfolio. The
//!    resource data is encrypted once under it, and the key is wrapped
//!    separately for every member.
//!
//! Nothing here touches the network or storage. All functions are
//! synchronous and share no state, so they can run on any thread.

pub mod asym;
pub mod cipher;
pub mod config;
pub mod custody;
pub mod envelope;
mod error;
pub mod key;
pub mod primitives;

pub use asym::{
    decrypt_asym, encrypt_asym, generate_key_pair, generate_key_pair_with_bits,
    max_asym_payload, sign, verify, KeyPair, RSA_KEY_BITS,
};
pub use cipher::{
    decrypt, decrypt_json, decrypt_str, encrypt, encrypt_json, encrypt_str, envelope_suite,
    CipherSuite,
};
pub use config::CryptoConfig;
pub use custody::{
    open_private_key, rewrap_private_key, seal_private_key, unwrap_private_key,
    wrap_private_key, PrivateKeyRecord,
};
pub use envelope::{
    open_resource, seal_resource, share_resource_key, unwrap_resource_key, wrap_resource_key,
    SealedResource, WrappedKey,
};
pub use error::{CryptoError, CryptoResult};
pub use key::{
    derive_key, generate_symmetric_key, DerivedKey, KdfParams, Salt, SymmetricKey, KEY_SIZE,
    SALT_SIZE,
};
pub use primitives::{from_base64, hash, hash_bytes, random_bytes, to_base64};
