//! Symmetric keys, salts and password-based key derivation.
//!
//! Two derivations are supported. [`KdfParams::Argon2id`] is used for new
//! private-key records. [`KdfParams::LegacySha256`] reproduces the iterated
//! SHA-256 stretching loop that existing records were written with and must
//! stay bit-for-bit stable:
//!
//! ```text
//! k = SHA256(password || salt)
//! for i in 0..iterations:
//!     k = SHA256(k || salt || u32_le(i))
//! ```

use crate::error::{CryptoError, CryptoResult};
use crate::primitives::{from_base64, random_array, to_base64};
use argon2::{Algorithm, Argon2, Params, Version};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use std::time::Instant;
use tracing::debug;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Size of a symmetric key in bytes (256 bits).
pub const KEY_SIZE: usize = 32;

/// Size of a key-derivation salt in bytes (128 bits).
pub const SALT_SIZE: usize = 16;

/// Round count of the legacy derivation used by existing records.
pub const LEGACY_ITERATIONS: u32 = 20_000;

/// Legacy round counts below this are refused.
pub const MIN_LEGACY_ITERATIONS: u32 = 10_000;

/// Legacy round counts above this are refused.
pub const MAX_LEGACY_ITERATIONS: u32 = 1_000_000;

/// Largest Argon2id memory cost accepted from a record (1 GiB).
pub const MAX_ARGON2_MEMORY_KIB: u32 = 1024 * 1024;

/// Largest Argon2id pass count accepted from a record.
pub const MAX_ARGON2_ITERATIONS: u32 = 16;

/// Largest Argon2id lane count accepted from a record.
pub const MAX_ARGON2_PARALLELISM: u32 = 16;

/// A raw 256-bit symmetric key. Zeroized on drop.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SymmetricKey([u8; KEY_SIZE]);

impl SymmetricKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Builds a key from a slice, rejecting anything but 32 bytes.
    pub fn from_slice(bytes: &[u8]) -> CryptoResult<Self> {
        let array: [u8; KEY_SIZE] =
            bytes
                .try_into()
                .map_err(|_| CryptoError::InvalidKeyLength {
                    expected: KEY_SIZE,
                    actual: bytes.len(),
                })?;
        Ok(Self(array))
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }

    /// Exports the raw key as base64. Only for handing the key to a wrapper.
    pub fn to_base64(&self) -> String {
        to_base64(&self.0)
    }

    pub fn from_base64(encoded: &str) -> CryptoResult<Self> {
        let mut bytes = from_base64(encoded)?;
        let key = Self::from_slice(&bytes);
        bytes.zeroize();
        key
    }
}

impl fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SymmetricKey([REDACTED])")
    }
}

/// Generates a fresh random symmetric key (e.g. a new resource key).
pub fn generate_symmetric_key() -> SymmetricKey {
    SymmetricKey(random_array())
}

/// A 128-bit key-derivation salt. Serialized as base64.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Salt([u8; SALT_SIZE]);

impl Salt {
    pub fn random() -> Self {
        Self(random_array())
    }

    pub fn from_bytes(bytes: [u8; SALT_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; SALT_SIZE] {
        &self.0
    }

    pub fn to_base64(&self) -> String {
        to_base64(&self.0)
    }

    /// Parses a base64 salt; anything but exactly 16 bytes is rejected.
    pub fn from_base64(encoded: &str) -> CryptoResult<Self> {
        let bytes = from_base64(encoded)?;
        let array: [u8; SALT_SIZE] =
            bytes
                .as_slice()
                .try_into()
                .map_err(|_| {
                    CryptoError::Encoding(format!(
                        "salt must be {SALT_SIZE} bytes, got {}",
                        bytes.len()
                    ))
                })?;
        Ok(Self(array))
    }
}

impl Serialize for Salt {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_base64())
    }
}

impl<'de> Deserialize<'de> for Salt {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        Salt::from_base64(&encoded).map_err(serde::de::Error::custom)
    }
}

/// Password-based key derivation parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "algorithm", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum KdfParams {
    /// Iterated SHA-256 loop. Kept for records written before Argon2id.
    LegacySha256 { iterations: u32 },
    /// Argon2id (v0x13) with a 32-byte output.
    Argon2id {
        memory_kib: u32,
        iterations: u32,
        parallelism: u32,
    },
}

impl KdfParams {
    /// The legacy loop at its production round count.
    pub fn legacy() -> Self {
        KdfParams::LegacySha256 {
            iterations: LEGACY_ITERATIONS,
        }
    }

    pub fn is_legacy(&self) -> bool {
        matches!(self, KdfParams::LegacySha256 { .. })
    }

    /// Checks the cost bounds. [`derive_key`] refuses parameters outside
    /// them before doing any work.
    pub fn validate(&self) -> CryptoResult<()> {
        match *self {
            KdfParams::LegacySha256 { iterations } => {
                if !(MIN_LEGACY_ITERATIONS..=MAX_LEGACY_ITERATIONS).contains(&iterations) {
                    return Err(CryptoError::KeyDerivation(format!(
                        "legacy derivation needs {MIN_LEGACY_ITERATIONS}..={MAX_LEGACY_ITERATIONS} rounds, got {iterations}"
                    )));
                }
            }
            KdfParams::Argon2id {
                memory_kib,
                iterations,
                parallelism,
            } => {
                if memory_kib > MAX_ARGON2_MEMORY_KIB {
                    return Err(CryptoError::KeyDerivation(format!(
                        "Argon2id memory {memory_kib} KiB exceeds {MAX_ARGON2_MEMORY_KIB} KiB"
                    )));
                }
                if iterations > MAX_ARGON2_ITERATIONS {
                    return Err(CryptoError::KeyDerivation(format!(
                        "Argon2id passes {iterations} exceed {MAX_ARGON2_ITERATIONS}"
                    )));
                }
                if parallelism > MAX_ARGON2_PARALLELISM {
                    return Err(CryptoError::KeyDerivation(format!(
                        "Argon2id lanes {parallelism} exceed {MAX_ARGON2_PARALLELISM}"
                    )));
                }
            }
        }
        Ok(())
    }
}

impl Default for KdfParams {
    /// OWASP minimum for Argon2id: 19 MiB, 2 passes, 1 lane.
    fn default() -> Self {
        KdfParams::Argon2id {
            memory_kib: 19 * 1024,
            iterations: 2,
            parallelism: 1,
        }
    }
}

/// A key derived from a password together with the salt it was derived with.
#[derive(Clone, Debug)]
pub struct DerivedKey {
    pub key: SymmetricKey,
    pub salt: Salt,
}

/// Derives a 256-bit key from a password.
///
/// A missing salt is generated. Identical inputs always derive the same key;
/// login depends on this to unwrap the stored private key.
///
/// This is deliberately slow. Call it off any latency-sensitive thread.
pub fn derive_key(
    password: &str,
    salt: Option<&Salt>,
    params: &KdfParams,
) -> CryptoResult<DerivedKey> {
    params.validate()?;
    let salt = salt.copied().unwrap_or_else(Salt::random);
    let started = Instant::now();

    let key = match *params {
        KdfParams::LegacySha256 { iterations } => legacy_stretch(password, &salt, iterations)?,
        KdfParams::Argon2id {
            memory_kib,
            iterations,
            parallelism,
        } => argon2id(password, &salt, memory_kib, iterations, parallelism)?,
    };

    debug!(
        kdf = ?params,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "derived key from password"
    );
    Ok(DerivedKey { key, salt })
}

fn legacy_stretch(password: &str, salt: &Salt, iterations: u32) -> CryptoResult<SymmetricKey> {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    hasher.update(salt.as_bytes());
    let mut current: [u8; KEY_SIZE] = hasher.finalize().into();

    for i in 0..iterations {
        let mut hasher = Sha256::new();
        hasher.update(current);
        hasher.update(salt.as_bytes());
        hasher.update(i.to_le_bytes());
        current = hasher.finalize().into();
    }

    let key = SymmetricKey(current);
    current.zeroize();
    Ok(key)
}

fn argon2id(
    password: &str,
    salt: &Salt,
    memory_kib: u32,
    iterations: u32,
    parallelism: u32,
) -> CryptoResult<SymmetricKey> {
    let params = Params::new(memory_kib, iterations, parallelism, Some(KEY_SIZE))
        .map_err(|e| CryptoError::KeyDerivation(format!("invalid Argon2 parameters: {e}")))?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut out = [0u8; KEY_SIZE];
    argon2
        .hash_password_into(password.as_bytes(), salt.as_bytes(), &mut out)
        .map_err(|e| CryptoError::KeyDerivation(format!("Argon2id failed: {e}")))?;

    let key = SymmetricKey(out);
    out.zeroize();
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FAST_ARGON2: KdfParams = KdfParams::Argon2id {
        memory_kib: 1024,
        iterations: 1,
        parallelism: 1,
    };

    #[test]
    fn legacy_golden_vector() {
        let salt = Salt::from_base64("AAAAAAAAAAAAAAAAAAAAAA==").unwrap();
        assert_eq!(salt.as_bytes(), &[0u8; SALT_SIZE]);

        let derived =
            derive_key("correct horse battery staple", Some(&salt), &KdfParams::legacy()).unwrap();
        assert_eq!(
            hex::encode(derived.key.as_bytes()),
            "604abd991e732863991bf607d51b41c2639a7ab771137bb9ed9476f2b34abb48"
        );

        let again =
            derive_key("correct horse battery staple", Some(&salt), &KdfParams::legacy()).unwrap();
        assert_eq!(derived.key, again.key);
    }

    #[test]
    fn legacy_rejects_low_round_counts() {
        let err = derive_key("pw", None, &KdfParams::LegacySha256 { iterations: 10 }).unwrap_err();
        assert!(matches!(err, CryptoError::KeyDerivation(_)));
    }

    #[test]
    fn missing_salt_is_generated() {
        let a = derive_key("pw", None, &FAST_ARGON2).unwrap();
        let b = derive_key("pw", None, &FAST_ARGON2).unwrap();
        assert_ne!(a.salt, b.salt);
        assert_ne!(a.key, b.key);
    }

    #[test]
    fn argon2id_is_deterministic() {
        let salt = Salt::random();
        let a = derive_key("hunter2", Some(&salt), &FAST_ARGON2).unwrap();
        let b = derive_key("hunter2", Some(&salt), &FAST_ARGON2).unwrap();
        assert_eq!(a.key, b.key);
        assert_eq!(a.salt, salt);
    }

    #[test]
    fn different_salts_give_different_keys() {
        for params in [KdfParams::legacy(), FAST_ARGON2] {
            let a = derive_key("pw", Some(&Salt::from_bytes([1; SALT_SIZE])), &params).unwrap();
            let b = derive_key("pw", Some(&Salt::from_bytes([2; SALT_SIZE])), &params).unwrap();
            assert_ne!(a.key, b.key, "{params:?}");
        }
    }

    #[test]
    fn legacy_and_argon2id_disagree() {
        let salt = Salt::random();
        let a = derive_key("pw", Some(&salt), &KdfParams::legacy()).unwrap();
        let b = derive_key("pw", Some(&salt), &FAST_ARGON2).unwrap();
        assert_ne!(a.key, b.key);
    }

    #[test]
    fn invalid_argon2_params_rejected() {
        let params = KdfParams::Argon2id {
            memory_kib: 1,
            iterations: 1,
            parallelism: 1,
        };
        assert!(matches!(
            derive_key("pw", None, &params),
            Err(CryptoError::KeyDerivation(_))
        ));
    }

    #[test]
    fn symmetric_key_from_slice_checks_length() {
        let err = SymmetricKey::from_slice(&[0u8; 16]).unwrap_err();
        assert!(matches!(
            err,
            CryptoError::InvalidKeyLength { expected: 32, actual: 16 }
        ));
        assert!(SymmetricKey::from_slice(&[7u8; 32]).is_ok());
    }

    #[test]
    fn symmetric_key_debug_is_redacted() {
        let key = generate_symmetric_key();
        assert_eq!(format!("{key:?}"), "SymmetricKey([REDACTED])");
    }

    #[test]
    fn oversized_params_rejected_before_work() {
        let oversized = [
            KdfParams::LegacySha256 {
                iterations: u32::MAX,
            },
            KdfParams::Argon2id {
                memory_kib: 4_000_000_000,
                iterations: 1,
                parallelism: 1,
            },
            KdfParams::Argon2id {
                memory_kib: 1024,
                iterations: MAX_ARGON2_ITERATIONS + 1,
                parallelism: 1,
            },
            KdfParams::Argon2id {
                memory_kib: 1024,
                iterations: 1,
                parallelism: MAX_ARGON2_PARALLELISM + 1,
            },
        ];
        for params in oversized {
            assert!(
                matches!(derive_key("pw", None, &params), Err(CryptoError::KeyDerivation(_))),
                "{params:?}"
            );
        }
        assert!(KdfParams::default().validate().is_ok());
        assert!(KdfParams::legacy().validate().is_ok());
    }

    #[test]
    fn salt_rejects_wrong_length() {
        let short = to_base64(&[0u8; 8]);
        assert!(matches!(
            Salt::from_base64(&short),
            Err(CryptoError::Encoding(_))
        ));
    }

    #[test]
    fn kdf_params_serialize_tagged() {
        let json = serde_json::to_string(&KdfParams::legacy()).unwrap();
        assert_eq!(json, r#"{"algorithm":"legacy_sha256","iterations":20000}"#);

        let json = serde_json::to_string(&FAST_ARGON2).unwrap();
        assert_eq!(
            json,
            r#"{"algorithm":"argon2id","memoryKib":1024,"iterations":1,"parallelism":1}"#
        );
        let parsed: KdfParams = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, FAST_ARGON2);
    }
}
