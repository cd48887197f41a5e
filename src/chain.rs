//! Chain-side collaborators: a read-only view of the contract and a
//! transaction-capable signer. Both are opaque wrappers over whatever RPC
//! stack the host application wires in; this crate never constructs them.

use std::fmt;

use anyhow::Result;
use async_trait::async_trait;

use crate::fhevm::EncryptedInput;
use crate::{Address, CiphertextHandle};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxHash(String);

impl TxHash {
    pub fn new(hash: impl Into<String>) -> Self {
        TxHash(hash.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug)]
pub struct TxReceipt {
    pub hash: TxHash,
    /// 1 on success, 0 on revert, mirroring the RPC receipt field.
    pub status: u64,
}

/// The pair of ciphertext handles `getHint` returns: whether the guess
/// equals the secret, and whether it is greater.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HintHandles {
    pub is_equal: CiphertextHandle,
    pub is_greater: CiphertextHandle,
}

/// Read-only contract calls, served by any provider.
#[async_trait]
pub trait GameReader: Send + Sync {
    async fn is_game_active(&self, contract: &Address) -> Result<bool>;

    async fn owner(&self, contract: &Address) -> Result<Address>;

    async fn protocol_id(&self, contract: &Address) -> Result<u64>;
}

/// Transaction-capable signer bound to one account. Submitting returns as
/// soon as the transaction is accepted by the node; [`GameSigner::wait_for`]
/// suspends until inclusion.
#[async_trait]
pub trait GameSigner: Send + Sync {
    fn address(&self) -> Address;

    async fn submit_set_secret(
        &self,
        contract: &Address,
        input: &EncryptedInput,
    ) -> Result<TxHash>;

    async fn submit_make_guess(
        &self,
        contract: &Address,
        input: &EncryptedInput,
    ) -> Result<TxHash>;

    async fn submit_reset_game(&self, contract: &Address) -> Result<TxHash>;

    async fn wait_for(&self, tx: &TxHash) -> Result<TxReceipt>;

    /// `getHint` is declared state-mutating by the contract even though it
    /// reads like a query, so it goes through the signer rather than the
    /// reader. It returns the handle pair directly.
    async fn call_get_hint(
        &self,
        contract: &Address,
        input: &EncryptedInput,
    ) -> Result<HintHandles>;

    /// Signs the typed-data authorization that lets the relayer decrypt
    /// handles from `contracts` for this account within the validity window.
    async fn sign_decryption_authorization(
        &self,
        contracts: &[Address],
        public_key: &str,
        start_timestamp: u64,
        duration_days: u64,
    ) -> Result<String>;
}
