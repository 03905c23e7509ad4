//! Password-protected storage of a user's RSA private key.
//!
//! A [`PrivateKeyRecord`] is the JSON document persisted for each user:
//!
//! ```json
//! {"salt": "<base64, 16 bytes>", "encryptedKey": "<envelope>"}
//! ```
//!
//! Records written by this crate also carry a `"kdf"` object. A record
//! without one predates Argon2id and is derived with the legacy SHA-256
//! loop at 20,000 rounds.

use crate::asym::parse_private_key;
use crate::cipher::{decrypt_str, encrypt_str, CipherSuite};
use crate::config::CryptoConfig;
use crate::error::{CryptoError, CryptoResult};
use crate::key::{derive_key, KdfParams, Salt, SymmetricKey};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use zeroize::Zeroizing;

/// Persisted, encrypted form of a private key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrivateKeyRecord {
    pub salt: Salt,
    pub encrypted_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kdf: Option<KdfParams>,
}

impl PrivateKeyRecord {
    pub fn from_json(json: &str) -> CryptoResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> CryptoResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Derivation that reproduces this record's key.
    pub fn kdf(&self) -> KdfParams {
        self.kdf.unwrap_or_else(KdfParams::legacy)
    }

    pub fn is_legacy(&self) -> bool {
        self.kdf().is_legacy()
    }
}

/// Encrypts a private key under an already-derived key.
///
/// Writes the legacy record shape (AES-CTR envelope, no `"kdf"`), so
/// `derived_key` must come from the legacy derivation for [`open_private_key`]
/// to read it back. New records should go through [`seal_private_key`].
pub fn wrap_private_key(
    private_key: &str,
    derived_key: &SymmetricKey,
    salt: &Salt,
) -> CryptoResult<String> {
    let record = PrivateKeyRecord {
        salt: *salt,
        encrypted_key: encrypt_str(private_key, derived_key, CipherSuite::LegacyAesCtr)?,
        kdf: None,
    };
    record.to_json()
}

/// Decrypts the record's private key with a key the caller re-derived from
/// the password and the record's salt.
///
/// With a legacy record a wrong key is not detected here; the result is
/// garbage or a UTF-8 error. [`open_private_key`] adds that check.
pub fn unwrap_private_key(record: &str, derived_key: &SymmetricKey) -> CryptoResult<Zeroizing<String>> {
    let record = PrivateKeyRecord::from_json(record)?;
    decrypt_str(&record.encrypted_key, derived_key).map(Zeroizing::new)
}

/// Derives a key from `password` with the configured KDF and seals the
/// private key under it. Every call uses a fresh salt.
pub fn seal_private_key(
    private_key: &str,
    password: &str,
    config: &CryptoConfig,
) -> CryptoResult<String> {
    let derived = derive_key(password, None, &config.kdf)?;
    let record = PrivateKeyRecord {
        salt: derived.salt,
        encrypted_key: encrypt_str(private_key, &derived.key, config.cipher)?,
        kdf: Some(config.kdf),
    };
    debug!(kdf = ?config.kdf, cipher = ?config.cipher, "sealed private key record");
    record.to_json()
}

/// Re-derives the record's key from `password`, decrypts, and checks the
/// result is a usable RSA private key.
///
/// Any failure after parsing the record is reported as
/// [`CryptoError::WrongPassword`].
pub fn open_private_key(record: &str, password: &str) -> CryptoResult<Zeroizing<String>> {
    let parsed = PrivateKeyRecord::from_json(record)?;
    if parsed.is_legacy() {
        warn!("opening legacy private key record; re-seal to upgrade");
    }

    let derived = derive_key(password, Some(&parsed.salt), &parsed.kdf())?;
    let private_key = match decrypt_str(&parsed.encrypted_key, &derived.key) {
        Ok(text) => Zeroizing::new(text),
        Err(CryptoError::Decryption(_)) => return Err(CryptoError::WrongPassword),
        Err(other) => return Err(other),
    };

    parse_private_key(&private_key).map_err(|_| CryptoError::WrongPassword)?;
    Ok(private_key)
}

/// Opens a record with the old password and seals it again under the new
/// one with `config`. Also upgrades legacy records.
pub fn rewrap_private_key(
    record: &str,
    old_password: &str,
    new_password: &str,
    config: &CryptoConfig,
) -> CryptoResult<String> {
    let private_key = open_private_key(record, old_password)?;
    seal_private_key(&private_key, new_password, config)
}
