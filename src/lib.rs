/*! Client-side session controller for the PrivateGuessingGame FHEVM contract.

The hard parts of the system live elsewhere: the FHE scheme runs in the
relayer SDK, the encrypted comparisons run in the deployed contract. This
crate owns everything in between: resolving the deployment for the active
chain, driving the contract's call sequence (status refresh, encrypted
secret/guess submission, hint request, hint decryption) and keeping a single
observable session state consistent while the wallet connection can change
under our feet at any await point. */

use std::fmt;

use serde::{Deserialize, Serialize};

pub mod chain;
pub mod connection;
pub mod controller;
pub mod deployments;
pub mod fhevm;
pub mod service;
pub mod signature;
pub mod state;

pub use connection::{CallScope, Connection};
pub use controller::GameController;
pub use deployments::{resolve, GameDescriptor};
pub use service::GuessingGameService;
pub use state::{GameSessionState, OperationFlags};

/// EVM chain id as reported by the wallet.
pub type ChainId = u64;

/// A checksummed `0x…` account or contract address, kept opaque the way the
/// wallet hands it to us. Compared verbatim.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Address(String);

impl Address {
    pub fn new(address: impl Into<String>) -> Self {
        Address(address.into())
    }

    /// The null address, used by deployment registries for "not deployed".
    pub fn zero() -> Self {
        Address("0x0000000000000000000000000000000000000000".to_string())
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::zero()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque reference to an encrypted value held by the FHE co-processor.
/// Only the co-processor can turn it back into a plaintext.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CiphertextHandle(String);

impl CiphertextHandle {
    pub fn new(handle: impl Into<String>) -> Self {
        CiphertextHandle(handle.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CiphertextHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A decrypted value as returned by `userDecrypt`. Hint results are booleans;
/// the 32-bit inputs come back as integers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Plaintext {
    Bool(bool),
    Uint(u64),
}

impl Plaintext {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Plaintext::Bool(b) => Some(*b),
            Plaintext::Uint(_) => None,
        }
    }
}

impl fmt::Display for Plaintext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Plaintext::Bool(b) => write!(f, "{b}"),
            Plaintext::Uint(n) => write!(f, "{n}"),
        }
    }
}

/// A decryption result pinned to the handle it was decrypted from. The value
/// is only meaningful while that handle is still the one held in the session
/// state; a newer hint request makes it stale without touching it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClearValue {
    pub handle: CiphertextHandle,
    pub clear: Plaintext,
}
