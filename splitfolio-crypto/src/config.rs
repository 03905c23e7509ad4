//! Encryption layer configuration.

use crate::asym::RSA_KEY_BITS;
use crate::cipher::CipherSuite;
use crate::error::CryptoResult;
use crate::key::KdfParams;
use serde::{Deserialize, Serialize};

/// Knobs for new keys and records. Existing envelopes and records always
/// open with whatever parameters they were written with.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CryptoConfig {
    /// Password derivation for new private-key records.
    pub kdf: KdfParams,

    /// Cipher used to seal new envelopes.
    pub cipher: CipherSuite,

    /// RSA modulus size for new identities.
    pub rsa_key_bits: usize,
}

impl Default for CryptoConfig {
    fn default() -> Self {
        Self {
            kdf: KdfParams::default(),
            cipher: CipherSuite::Aes256Gcm,
            rsa_key_bits: RSA_KEY_BITS,
        }
    }
}

impl CryptoConfig {
    /// Writes records and envelopes readable by clients that only know the
    /// iterated SHA-256 derivation and AES-CTR.
    pub fn legacy() -> Self {
        Self {
            kdf: KdfParams::legacy(),
            cipher: CipherSuite::LegacyAesCtr,
            rsa_key_bits: RSA_KEY_BITS,
        }
    }

    /// Parses a config; missing fields take their defaults.
    pub fn from_json(json: &str) -> CryptoResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
