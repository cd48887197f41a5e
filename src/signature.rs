//! User-authorized decryption capability, cached so the wallet is not asked
//! to sign again for every decryption.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::chain::GameSigner;
use crate::fhevm::FhevmInstance;
use crate::Address;

/// Validity window requested when signing a fresh authorization.
pub const DEFAULT_DURATION_DAYS: u64 = 365;

const SECONDS_PER_DAY: u64 = 86_400;

/// Opaque string store for cached signatures. The host decides where it
/// lives (memory, browser local storage, a file); keys and values are ours.
pub trait StringStorage: Send + Sync {
    fn get_item(&self, key: &str) -> Option<String>;
    fn set_item(&self, key: &str, value: &str);
    fn remove_item(&self, key: &str);
}

/// A signed, time-bounded permission to decrypt handles emitted by a fixed
/// set of contracts for one user, together with the keypair the decryption
/// results are bound to.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DecryptionSignature {
    pub public_key: String,
    pub private_key: String,
    pub signature: String,
    pub contract_addresses: Vec<Address>,
    pub user_address: Address,
    pub start_timestamp: u64,
    pub duration_days: u64,
}

impl DecryptionSignature {
    pub fn is_valid_at(&self, now: u64) -> bool {
        now < self.start_timestamp + self.duration_days * SECONDS_PER_DAY
    }

    fn storage_key(user: &Address, contracts: &[Address]) -> String {
        let mut names: Vec<String> = contracts
            .iter()
            .map(|address| address.as_str().to_lowercase())
            .collect();
        names.sort();
        format!(
            "fhevm.decryption-signature.{}.{}",
            user.as_str().to_lowercase(),
            names.join(",")
        )
    }

    /// Reuses a cached, still-valid signature for (user, contracts), or asks
    /// the signer for a fresh one and caches it. `None` means the user (or
    /// wallet) declined to sign; the caller reports that and does not retry.
    pub async fn load_or_sign(
        instance: &dyn FhevmInstance,
        contract_addresses: &[Address],
        signer: &dyn GameSigner,
        storage: &dyn StringStorage,
    ) -> Option<Self> {
        let user_address = signer.address();
        let key = Self::storage_key(&user_address, contract_addresses);

        if let Some(raw) = storage.get_item(&key) {
            match serde_json::from_str::<Self>(&raw) {
                Ok(cached)
                    if cached.user_address == user_address && cached.is_valid_at(unix_now()) =>
                {
                    return Some(cached);
                }
                Ok(_) => {
                    tracing::info!("cached decryption signature expired, re-signing");
                    storage.remove_item(&key);
                }
                Err(error) => {
                    tracing::warn!("discarding unreadable cached decryption signature: {error}");
                    storage.remove_item(&key);
                }
            }
        }

        let keypair = instance.generate_keypair();
        let start_timestamp = unix_now();
        let signature = match signer
            .sign_decryption_authorization(
                contract_addresses,
                &keypair.public_key,
                start_timestamp,
                DEFAULT_DURATION_DAYS,
            )
            .await
        {
            Ok(signature) => signature,
            Err(error) => {
                tracing::warn!("decryption authorization was not signed: {error}");
                return None;
            }
        };

        let signed = DecryptionSignature {
            public_key: keypair.public_key,
            private_key: keypair.private_key,
            signature,
            contract_addresses: contract_addresses.to_vec(),
            user_address,
            start_timestamp,
            duration_days: DEFAULT_DURATION_DAYS,
        };
        match serde_json::to_string(&signed) {
            Ok(raw) => storage.set_item(&key, &raw),
            Err(error) => tracing::warn!("decryption signature not cached: {error}"),
        }
        Some(signed)
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0)
}

/// In-memory [`StringStorage`], the default for hosts without a durable
/// store and for tests.
#[derive(Default)]
pub struct MemoryStorage {
    items: std::sync::Mutex<std::collections::HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StringStorage for MemoryStorage {
    fn get_item(&self, key: &str) -> Option<String> {
        self.items
            .lock()
            .expect("storage lock poisoned")
            .get(key)
            .cloned()
    }

    fn set_item(&self, key: &str, value: &str) {
        self.items
            .lock()
            .expect("storage lock poisoned")
            .insert(key.to_string(), value.to_string());
    }

    fn remove_item(&self, key: &str) {
        self.items
            .lock()
            .expect("storage lock poisoned")
            .remove(key);
    }
}
