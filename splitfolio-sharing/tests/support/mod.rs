//! Shared fixtures for sharing integration tests.

#![allow(dead_code)]

use splitfolio_crypto::{generate_key_pair, CryptoConfig, KdfParams, KeyPair};
use splitfolio_sharing::{InMemoryShareStore, Session, ShareManager};
use std::sync::{Arc, OnceLock};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

/// RSA keygen is slow, so each test binary generates a small pool once.
pub fn keypair(index: usize) -> KeyPair {
    static POOL: OnceLock<Vec<KeyPair>> = OnceLock::new();
    let pool = POOL.get_or_init(|| {
        (0..4)
            .map(|_| generate_key_pair().expect("RSA keygen must succeed"))
            .collect()
    });
    pool[index].clone()
}

/// Argon2id at minimal cost so tests stay fast.
pub fn fast_config() -> CryptoConfig {
    CryptoConfig {
        kdf: KdfParams::Argon2id {
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
        },
        ..CryptoConfig::default()
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("splitfolio_sharing=debug,splitfolio_crypto=debug"))
        .with_test_writer()
        .try_init();
}

/// Registers a user with a pooled keypair and returns their manager.
pub async fn user(
    store: &Arc<InMemoryShareStore>,
    index: usize,
) -> ShareManager<InMemoryShareStore> {
    let session = Session::register_with_keys(
        store.as_ref(),
        Uuid::now_v7(),
        keypair(index),
        &format!("password-{index}"),
        fast_config(),
    )
    .await
    .expect("registration must succeed");
    ShareManager::new(Arc::clone(store), Arc::new(session))
}
