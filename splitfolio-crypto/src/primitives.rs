//! Stateless building blocks: randomness, hashing and base64.

use crate::error::{CryptoError, CryptoResult};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::RngCore;
use sha2::{Digest, Sha256};

/// Size of a SHA-256 digest in bytes.
pub const DIGEST_SIZE: usize = 32;

/// Returns `n` bytes from the OS CSPRNG.
///
/// An unavailable OS RNG aborts the operation with a panic; there is no
/// fallback to a weaker source.
pub fn random_bytes(n: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; n];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    bytes
}

/// Fills a fixed-size array from the OS CSPRNG.
pub fn random_array<const N: usize>() -> [u8; N] {
    let mut bytes = [0u8; N];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    bytes
}

/// SHA-256 of a string, as lowercase hex.
pub fn hash(value: &str) -> String {
    hex::encode(hash_bytes(value.as_bytes()))
}

/// SHA-256 of raw bytes.
pub fn hash_bytes(data: &[u8]) -> [u8; DIGEST_SIZE] {
    Sha256::digest(data).into()
}

/// Standard base64 with padding.
pub fn to_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

pub fn from_base64(encoded: &str) -> CryptoResult<Vec<u8>> {
    STANDARD
        .decode(encoded)
        .map_err(|e| CryptoError::Encoding(format!("invalid base64: {e}")))
}
