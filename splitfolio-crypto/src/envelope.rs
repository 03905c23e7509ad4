//! Hybrid envelope encryption for shared resources.
//!
//! Each expense group or portfolio has one random resource key. The
//! resource data is encrypted once under that key; the key itself is
//! wrapped (RSA-OAEP) separately for every member's public key. Adding a
//! member wraps the same key again and leaves the data and the other
//! members' wrapped keys alone.

use crate::asym::{decrypt_asym, encrypt_asym};
use crate::cipher::{decrypt, encrypt, CipherSuite};
use crate::error::CryptoResult;
use crate::key::{generate_symmetric_key, SymmetricKey};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use zeroize::Zeroize;

/// A resource key encrypted to one member's public key (base64).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WrappedKey(String);

impl WrappedKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl From<String> for WrappedKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Output of creating a new shared resource.
///
/// `key` stays in memory for the session; only `owner_key` and
/// `encrypted_data` are persisted.
#[derive(Debug)]
pub struct SealedResource {
    pub key: SymmetricKey,
    pub owner_key: WrappedKey,
    pub encrypted_data: String,
}

/// Wraps a resource key for a recipient.
pub fn wrap_resource_key(key: &SymmetricKey, recipient_public_key: &str) -> CryptoResult<WrappedKey> {
    encrypt_asym(recipient_public_key, key.as_bytes()).map(WrappedKey)
}

/// Recovers a resource key from the caller's own wrapped copy.
pub fn unwrap_resource_key(private_key: &str, wrapped: &WrappedKey) -> CryptoResult<SymmetricKey> {
    let mut raw = decrypt_asym(private_key, wrapped.as_str())?;
    let key = SymmetricKey::from_slice(&raw);
    raw.zeroize();
    key
}

/// Creates a resource: fresh key, data encrypted once, key wrapped for the owner.
pub fn seal_resource(
    owner_public_key: &str,
    data: &Value,
    suite: CipherSuite,
) -> CryptoResult<SealedResource> {
    let key = generate_symmetric_key();
    let encrypted_data = encrypt(data, &key, suite)?;
    let owner_key = wrap_resource_key(&key, owner_public_key)?;

    debug!(?suite, "sealed new resource");
    Ok(SealedResource {
        key,
        owner_key,
        encrypted_data,
    })
}

/// Issues a wrapped key for an invitee.
///
/// The owner's own wrapped key is opened with the owner's private key and
/// the raw key is re-wrapped to the invitee. The resource ciphertext is
/// untouched.
pub fn share_resource_key(
    owner_private_key: &str,
    owner_key: &WrappedKey,
    invitee_public_key: &str,
) -> CryptoResult<WrappedKey> {
    let key = unwrap_resource_key(owner_private_key, owner_key)?;
    wrap_resource_key(&key, invitee_public_key)
}

/// Member access: unwrap the member's key, then decrypt the resource data.
pub fn open_resource(
    private_key: &str,
    wrapped: &WrappedKey,
    encrypted_data: &str,
) -> CryptoResult<Value> {
    let key = unwrap_resource_key(private_key, wrapped)?;
    decrypt(encrypted_data, &key)
}
