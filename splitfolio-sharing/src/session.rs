//! The signed-in user's identity.
//!
//! A [`Session`] holds the user's RSA keypair after registration or login.
//! The application builds one explicitly and hands it to the managers that
//! need it; there is no global session.

use crate::error::{SharingError, SharingResult};
use crate::store::ShareStore;
use crate::types::{UserId, UserKeys};
use splitfolio_crypto::{
    generate_key_pair_with_bits, open_private_key, rewrap_private_key, seal_private_key,
    CryptoConfig, CryptoResult, KeyPair, PrivateKeyRecord,
};
use tokio::task::spawn_blocking;
use tracing::info;
use zeroize::Zeroizing;

pub struct Session {
    user_id: UserId,
    keys: KeyPair,
    config: CryptoConfig,
}

impl Session {
    /// Creates a new identity: generates a keypair, seals the private key
    /// under `password` and publishes both.
    pub async fn register<S: ShareStore>(
        store: &S,
        user_id: UserId,
        password: &str,
        config: CryptoConfig,
    ) -> SharingResult<Self> {
        let bits = config.rsa_key_bits;
        let keys = run_blocking(move || generate_key_pair_with_bits(bits)).await?;
        Self::register_with_keys(store, user_id, keys, password, config).await
    }

    /// Publishes an already generated keypair as a new identity.
    pub async fn register_with_keys<S: ShareStore>(
        store: &S,
        user_id: UserId,
        keys: KeyPair,
        password: &str,
        config: CryptoConfig,
    ) -> SharingResult<Self> {
        let private_key = keys.private_key.clone();
        let password = Zeroizing::new(password.to_owned());
        let seal_config = config.clone();
        let record =
            run_blocking(move || seal_private_key(&private_key, &password, &seal_config)).await?;

        store
            .put_user_keys(UserKeys {
                user_id,
                public_key: keys.public_key.clone(),
                private_key_record: record,
            })
            .await?;

        info!(%user_id, "registered identity");
        Ok(Self {
            user_id,
            keys,
            config,
        })
    }

    /// Unlocks a published identity with the user's password.
    ///
    /// Legacy records are re-sealed with `config` on success when `config`
    /// uses a different KDF.
    pub async fn login<S: ShareStore>(
        store: &S,
        user_id: UserId,
        password: &str,
        config: CryptoConfig,
    ) -> SharingResult<Self> {
        let published = store.user_keys(user_id).await?;
        let record = published.private_key_record.clone();
        let password = Zeroizing::new(password.to_owned());

        let legacy = PrivateKeyRecord::from_json(&record)?.is_legacy();
        let unlock_password = password.clone();
        let private_key = run_blocking(move || open_private_key(&record, &unlock_password)).await?;

        if legacy && !config.kdf.is_legacy() {
            let reseal_key = private_key.clone();
            let reseal_config = config.clone();
            let upgraded = run_blocking(move || {
                seal_private_key(&reseal_key, &password, &reseal_config)
            })
            .await?;
            store
                .put_user_keys(UserKeys {
                    private_key_record: upgraded,
                    ..published.clone()
                })
                .await?;
            info!(%user_id, "upgraded legacy private key record");
        }

        info!(%user_id, "unlocked identity");
        Ok(Self {
            user_id,
            keys: KeyPair {
                public_key: published.public_key,
                private_key,
            },
            config,
        })
    }

    /// Re-seals the private key under a new password and republishes it.
    pub async fn change_password<S: ShareStore>(
        &self,
        store: &S,
        old_password: &str,
        new_password: &str,
    ) -> SharingResult<()> {
        let published = store.user_keys(self.user_id).await?;
        let record = published.private_key_record.clone();
        let old_password = Zeroizing::new(old_password.to_owned());
        let new_password = Zeroizing::new(new_password.to_owned());
        let config = self.config.clone();

        let rewrapped = run_blocking(move || {
            rewrap_private_key(&record, &old_password, &new_password, &config)
        })
        .await?;
        store
            .put_user_keys(UserKeys {
                private_key_record: rewrapped,
                ..published
            })
            .await?;

        info!(user_id = %self.user_id, "changed password");
        Ok(())
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn public_key(&self) -> &str {
        &self.keys.public_key
    }

    pub(crate) fn private_key(&self) -> &str {
        &self.keys.private_key
    }

    pub fn config(&self) -> &CryptoConfig {
        &self.config
    }
}

/// Runs a CPU-heavy crypto call (keygen, key derivation) off the async workers.
async fn run_blocking<T, F>(f: F) -> SharingResult<T>
where
    F: FnOnce() -> CryptoResult<T> + Send + 'static,
    T: Send + 'static,
{
    spawn_blocking(f)
        .await
        .map_err(|e| SharingError::Task(e.to_string()))?
        .map_err(SharingError::from)
}
