//! Encryption layer error types.

use thiserror::Error;

/// Result type for crypto operations.
pub type CryptoResult<T> = Result<T, CryptoError>;

/// Errors that can occur in the encryption layer.
///
/// Wrong-key decryption of a legacy (unauthenticated) envelope is not
/// guaranteed to produce an error; see [`crate::cipher::decrypt`].
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("encryption failed: {0}")]
    Encryption(String),

    #[error("decryption failed: {0}")]
    Decryption(String),

    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("invalid key length: expected {expected} bytes, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    #[error("invalid envelope: {0}")]
    InvalidEnvelope(String),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("payload too large for asymmetric encryption: {actual} bytes (max {max})")]
    PayloadTooLarge { max: usize, actual: usize },

    #[error("key generation failed: {0}")]
    KeyGeneration(String),

    #[error("signing failed: {0}")]
    Signing(String),

    #[error("wrong password or corrupt private key record")]
    WrongPassword,

    #[error("invalid encoding: {0}")]
    Encoding(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_key_length_display() {
        let err = CryptoError::InvalidKeyLength { expected: 32, actual: 16 };
        assert_eq!(
            err.to_string(),
            "invalid key length: expected 32 bytes, got 16"
        );
    }

    #[test]
    fn payload_too_large_display() {
        let err = CryptoError::PayloadTooLarge { max: 190, actual: 512 };
        assert_eq!(
            err.to_string(),
            "payload too large for asymmetric encryption: 512 bytes (max 190)"
        );
    }

    #[test]
    fn serde_error_converts() {
        let parse: Result<serde_json::Value, _> = serde_json::from_str("{not json");
        let err: CryptoError = parse.unwrap_err().into();
        assert!(matches!(err, CryptoError::Serialization(_)));
    }
}
