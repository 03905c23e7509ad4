//! Symmetric encryption of JSON payloads under a 256-bit key.
//!
//! Envelopes are self-describing strings:
//!
//! - authenticated (default): `"v2:" + base64(nonce[12] || ciphertext || tag[16])`,
//!   AES-256-GCM
//! - legacy: `base64(nonce[16] || ciphertext)`, AES-256-CTR with a 128-bit
//!   big-endian counter block
//!
//! `:` is not in the base64 alphabet so the two forms never collide.
//! Legacy envelopes carry no tag. Opening one under the wrong key is only
//! caught when the keystream output is not valid UTF-8; otherwise the
//! garbage text comes back as a string and the caller has to validate it.

use crate::error::{CryptoError, CryptoResult};
use crate::key::SymmetricKey;
use crate::primitives::{from_base64, random_array, to_base64};
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use ctr::cipher::{KeyIvInit, StreamCipher};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

type Aes256Ctr = ctr::Ctr128BE<aes::Aes256>;

/// Counter block size of a legacy envelope.
pub const CTR_NONCE_SIZE: usize = 16;
/// Nonce size of an authenticated envelope.
pub const GCM_NONCE_SIZE: usize = 12;
/// GCM authentication tag size.
pub const TAG_SIZE: usize = 16;
/// Marks an authenticated envelope.
pub const AUTHENTICATED_PREFIX: &str = "v2:";

/// Which cipher seals new envelopes. Opening always follows the envelope.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CipherSuite {
    /// AES-256-CTR without integrity. Only for the legacy record contract.
    LegacyAesCtr,
    #[default]
    Aes256Gcm,
}

/// Reports which suite sealed an envelope.
pub fn envelope_suite(envelope: &str) -> CipherSuite {
    if envelope.starts_with(AUTHENTICATED_PREFIX) {
        CipherSuite::Aes256Gcm
    } else {
        CipherSuite::LegacyAesCtr
    }
}

/// Encrypts a JSON value.
///
/// A `Value::String` is encrypted as its raw text; anything else is
/// serialized first. Every call draws a fresh nonce.
pub fn encrypt(payload: &Value, key: &SymmetricKey, suite: CipherSuite) -> CryptoResult<String> {
    match payload {
        Value::String(text) => encrypt_str(text, key, suite),
        other => encrypt_str(&serde_json::to_string(other)?, key, suite),
    }
}

/// Encrypts any serializable payload. See [`encrypt`].
pub fn encrypt_json<T: Serialize + ?Sized>(
    payload: &T,
    key: &SymmetricKey,
    suite: CipherSuite,
) -> CryptoResult<String> {
    encrypt(&serde_json::to_value(payload)?, key, suite)
}

/// Encrypts text as-is.
pub fn encrypt_str(text: &str, key: &SymmetricKey, suite: CipherSuite) -> CryptoResult<String> {
    match suite {
        CipherSuite::LegacyAesCtr => seal_ctr(text.as_bytes(), key, &random_array()),
        CipherSuite::Aes256Gcm => seal_gcm(text.as_bytes(), key, &random_array()),
    }
}

/// Decrypts an envelope and parses the plaintext as JSON.
///
/// Plaintext that is not JSON comes back as `Value::String`, so callers get
/// "parsed JSON or the raw string", never a guaranteed structure.
pub fn decrypt(envelope: &str, key: &SymmetricKey) -> CryptoResult<Value> {
    let text = decrypt_str(envelope, key)?;
    match serde_json::from_str(&text) {
        Ok(value) => Ok(value),
        Err(_) => Ok(Value::String(text)),
    }
}

/// Decrypts an envelope into a typed payload.
pub fn decrypt_json<T: DeserializeOwned>(envelope: &str, key: &SymmetricKey) -> CryptoResult<T> {
    let text = decrypt_str(envelope, key)?;
    Ok(serde_json::from_str(&text)?)
}

/// Decrypts an envelope into its raw text.
pub fn decrypt_str(envelope: &str, key: &SymmetricKey) -> CryptoResult<String> {
    let plaintext = decrypt_bytes(envelope, key)?;
    String::from_utf8(plaintext).map_err(|_| {
        CryptoError::Decryption("plaintext is not valid UTF-8 (wrong key?)".to_string())
    })
}

fn decrypt_bytes(envelope: &str, key: &SymmetricKey) -> CryptoResult<Vec<u8>> {
    match envelope.strip_prefix(AUTHENTICATED_PREFIX) {
        Some(body) => open_gcm(&decode_envelope(body)?, key),
        None => open_ctr(&decode_envelope(envelope)?, key),
    }
}

fn decode_envelope(body: &str) -> CryptoResult<Vec<u8>> {
    from_base64(body).map_err(|e| CryptoError::InvalidEnvelope(e.to_string()))
}

fn seal_ctr(plaintext: &[u8], key: &SymmetricKey, nonce: &[u8; CTR_NONCE_SIZE]) -> CryptoResult<String> {
    let mut cipher = Aes256Ctr::new_from_slices(key.as_bytes(), nonce)
        .map_err(|e| CryptoError::Encryption(e.to_string()))?;

    let mut out = Vec::with_capacity(CTR_NONCE_SIZE + plaintext.len());
    out.extend_from_slice(nonce);
    out.extend_from_slice(plaintext);
    cipher.apply_keystream(&mut out[CTR_NONCE_SIZE..]);

    Ok(to_base64(&out))
}

fn open_ctr(raw: &[u8], key: &SymmetricKey) -> CryptoResult<Vec<u8>> {
    if raw.len() < CTR_NONCE_SIZE {
        return Err(CryptoError::InvalidEnvelope(format!(
            "envelope too short: {} bytes (minimum {CTR_NONCE_SIZE})",
            raw.len()
        )));
    }
    let (nonce, ciphertext) = raw.split_at(CTR_NONCE_SIZE);

    let mut cipher = Aes256Ctr::new_from_slices(key.as_bytes(), nonce)
        .map_err(|e| CryptoError::Decryption(e.to_string()))?;
    let mut plaintext = ciphertext.to_vec();
    cipher.apply_keystream(&mut plaintext);
    Ok(plaintext)
}

fn seal_gcm(plaintext: &[u8], key: &SymmetricKey, nonce: &[u8; GCM_NONCE_SIZE]) -> CryptoResult<String> {
    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| CryptoError::Encryption(e.to_string()))?;
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(nonce), plaintext)
        .map_err(|e| CryptoError::Encryption(format!("AES-GCM seal failed: {e}")))?;

    let mut out = Vec::with_capacity(GCM_NONCE_SIZE + ciphertext.len());
    out.extend_from_slice(nonce);
    out.extend_from_slice(&ciphertext);

    Ok(format!("{AUTHENTICATED_PREFIX}{}", to_base64(&out)))
}

fn open_gcm(raw: &[u8], key: &SymmetricKey) -> CryptoResult<Vec<u8>> {
    if raw.len() < GCM_NONCE_SIZE + TAG_SIZE {
        return Err(CryptoError::InvalidEnvelope(format!(
            "envelope too short: {} bytes (minimum {})",
            raw.len(),
            GCM_NONCE_SIZE + TAG_SIZE
        )));
    }
    let (nonce, ciphertext) = raw.split_at(GCM_NONCE_SIZE);

    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| CryptoError::Decryption(e.to_string()))?;
    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| CryptoError::Decryption("wrong key or tampered data".to_string()))
}
