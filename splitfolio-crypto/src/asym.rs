//! RSA identity keys: generation, small-payload encryption and signatures.
//!
//! Keys travel as PEM strings (SPKI public, PKCS#8 private). Encryption uses
//! OAEP with SHA-256 and is only ever meant for resource keys; anything over
//! the OAEP ceiling is refused before touching RSA. Signatures are
//! RSASSA-PKCS1-v1_5 over SHA-256.

use crate::error::{CryptoError, CryptoResult};
use crate::primitives::{from_base64, to_base64};
use rsa::pkcs1v15::{Signature, SigningKey, VerifyingKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::signature::{SignatureEncoding, Signer, Verifier};
use rsa::traits::PublicKeyParts;
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::time::Instant;
use tracing::debug;
use zeroize::Zeroizing;

/// Default modulus size.
pub const RSA_KEY_BITS: usize = 2048;

/// Smallest modulus accepted by [`generate_key_pair_with_bits`].
pub const MIN_RSA_KEY_BITS: usize = 2048;

/// SHA-256 output length, used for the OAEP ceiling.
const OAEP_HASH_LEN: usize = 32;

/// A user's RSA identity as PEM strings.
///
/// The public half is published in the clear; the private half is only
/// persisted through [`crate::custody`].
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyPair {
    pub public_key: String,
    pub private_key: Zeroizing<String>,
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &self.public_key)
            .field("private_key", &"[REDACTED]")
            .finish()
    }
}

/// Generates a 2048-bit RSA keypair.
///
/// Expensive: run once per identity, off any latency-sensitive thread.
pub fn generate_key_pair() -> CryptoResult<KeyPair> {
    generate_key_pair_with_bits(RSA_KEY_BITS)
}

pub fn generate_key_pair_with_bits(bits: usize) -> CryptoResult<KeyPair> {
    if bits < MIN_RSA_KEY_BITS {
        return Err(CryptoError::KeyGeneration(format!(
            "RSA modulus must be at least {MIN_RSA_KEY_BITS} bits, got {bits}"
        )));
    }

    let started = Instant::now();
    let private = RsaPrivateKey::new(&mut rand::rngs::OsRng, bits)
        .map_err(|e| CryptoError::KeyGeneration(e.to_string()))?;
    let public = RsaPublicKey::from(&private);

    let private_key = private
        .to_pkcs8_pem(LineEnding::LF)
        .map_err(|e| CryptoError::KeyGeneration(format!("private key export failed: {e}")))?;
    let public_key = public
        .to_public_key_pem(LineEnding::LF)
        .map_err(|e| CryptoError::KeyGeneration(format!("public key export failed: {e}")))?;

    debug!(
        bits,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "generated RSA keypair"
    );
    Ok(KeyPair {
        public_key,
        private_key,
    })
}

pub(crate) fn parse_public_key(pem: &str) -> CryptoResult<RsaPublicKey> {
    RsaPublicKey::from_public_key_pem(pem)
        .map_err(|e| CryptoError::InvalidKey(format!("bad RSA public key: {e}")))
}

pub(crate) fn parse_private_key(pem: &str) -> CryptoResult<RsaPrivateKey> {
    RsaPrivateKey::from_pkcs8_pem(pem)
        .map_err(|e| CryptoError::InvalidKey(format!("bad RSA private key: {e}")))
}

/// Largest payload OAEP-SHA256 can carry under this public key.
pub fn max_asym_payload(public_key: &str) -> CryptoResult<usize> {
    Ok(oaep_ceiling(&parse_public_key(public_key)?))
}

fn oaep_ceiling(key: &RsaPublicKey) -> usize {
    key.size().saturating_sub(2 * OAEP_HASH_LEN + 2)
}

/// Encrypts a small payload to a public key. Returns base64.
pub fn encrypt_asym(public_key: &str, data: &[u8]) -> CryptoResult<String> {
    let key = parse_public_key(public_key)?;
    let max = oaep_ceiling(&key);
    if data.len() > max {
        return Err(CryptoError::PayloadTooLarge {
            max,
            actual: data.len(),
        });
    }

    let ciphertext = key
        .encrypt(&mut rand::rngs::OsRng, Oaep::new::<Sha256>(), data)
        .map_err(|e| CryptoError::Encryption(format!("RSA-OAEP failed: {e}")))?;
    Ok(to_base64(&ciphertext))
}

/// Decrypts a base64 RSA-OAEP ciphertext with a private key.
pub fn decrypt_asym(private_key: &str, ciphertext: &str) -> CryptoResult<Vec<u8>> {
    let key = parse_private_key(private_key)?;
    let raw = from_base64(ciphertext)?;
    key.decrypt(Oaep::new::<Sha256>(), &raw)
        .map_err(|_| CryptoError::Decryption("RSA-OAEP failed (wrong key or corrupt data)".to_string()))
}

/// Signs `data` and returns a base64 signature.
pub fn sign(private_key: &str, data: &str) -> CryptoResult<String> {
    let key = parse_private_key(private_key)?;
    let signing_key = SigningKey::<Sha256>::new(key);
    let signature = signing_key
        .try_sign(data.as_bytes())
        .map_err(|e| CryptoError::Signing(e.to_string()))?;
    Ok(to_base64(&signature.to_bytes()))
}

/// Checks a signature. Any failure, malformed input included, is `false`.
pub fn verify(public_key: &str, data: &str, signature: &str) -> bool {
    let Ok(key) = parse_public_key(public_key) else {
        return false;
    };
    let Ok(raw) = from_base64(signature) else {
        return false;
    };
    let Ok(signature) = Signature::try_from(raw.as_slice()) else {
        return false;
    };
    VerifyingKey::<Sha256>::new(key)
        .verify(data.as_bytes(), &signature)
        .is_ok()
}
