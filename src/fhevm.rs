//! The FHE relayer SDK, seen from the client.
//!
//! The SDK instance is an opaque collaborator: it turns plaintexts into
//! ciphertext handles plus validity proofs the contract will accept, and
//! turns handles back into plaintexts once the user has authorized a
//! decryption. Key material, proofs, and the co-processor protocol all stay
//! behind [`FhevmInstance`]; this crate never looks inside a handle.

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;

use crate::{Address, CiphertextHandle, Plaintext};

/// Ephemeral keypair used to authorize and receive user decryptions.
#[derive(Clone, Debug)]
pub struct Keypair {
    pub public_key: String,
    pub private_key: String,
}

/// Result of encrypting an input batch: one handle per added value plus a
/// single proof covering the batch, both submitted verbatim to the contract.
#[derive(Clone, Debug)]
pub struct EncryptedInput {
    pub handles: Vec<CiphertextHandle>,
    pub input_proof: String,
}

/// One handle to decrypt, paired with the contract it was emitted by.
#[derive(Clone, Debug)]
pub struct HandleContractPair {
    pub handle: CiphertextHandle,
    pub contract_address: Address,
}

/// Collects plaintext inputs bound to a (contract, user) pair before the
/// CPU-intensive encryption step runs.
#[derive(Clone, Debug)]
pub struct EncryptedInputBuilder {
    contract_address: Address,
    user_address: Address,
    values32: Vec<u32>,
}

impl EncryptedInputBuilder {
    pub fn new(contract_address: Address, user_address: Address) -> Self {
        EncryptedInputBuilder {
            contract_address,
            user_address,
            values32: Vec::new(),
        }
    }

    pub fn add32(&mut self, value: u32) -> &mut Self {
        self.values32.push(value);
        self
    }

    pub fn contract_address(&self) -> &Address {
        &self.contract_address
    }

    pub fn user_address(&self) -> &Address {
        &self.user_address
    }

    pub fn values32(&self) -> &[u32] {
        &self.values32
    }

    pub async fn encrypt(self, instance: &dyn FhevmInstance) -> Result<EncryptedInput> {
        instance.encrypt(&self).await
    }
}

#[async_trait]
pub trait FhevmInstance: Send + Sync {
    fn create_encrypted_input(
        &self,
        contract_address: &Address,
        user_address: &Address,
    ) -> EncryptedInputBuilder {
        EncryptedInputBuilder::new(contract_address.clone(), user_address.clone())
    }

    /// Fresh keypair for a decryption authorization.
    fn generate_keypair(&self) -> Keypair;

    /// Produces ciphertext handles and the input proof for a collected
    /// batch. CPU-intensive; must be awaited, never run on a hot path that
    /// cannot suspend.
    async fn encrypt(&self, input: &EncryptedInputBuilder) -> Result<EncryptedInput>;

    /// Decrypts the given handles under a user-authorized capability.
    /// Handles absent from the returned map were not decryptable right now;
    /// that is partial availability, not an error.
    #[allow(clippy::too_many_arguments)]
    async fn user_decrypt(
        &self,
        pairs: &[HandleContractPair],
        private_key: &str,
        public_key: &str,
        signature: &str,
        contract_addresses: &[Address],
        user_address: &Address,
        start_timestamp: u64,
        duration_days: u64,
    ) -> Result<HashMap<CiphertextHandle, Plaintext>>;
}
