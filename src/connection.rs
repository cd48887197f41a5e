//! Live wallet connection state, and the capture-then-revalidate scope used
//! to detect that it changed while an action was suspended.

use std::sync::{Arc, RwLock};

use crate::chain::{GameReader, GameSigner};
use crate::{deployments, Address, ChainId};

#[derive(Default)]
struct ConnectionState {
    chain_id: Option<ChainId>,
    reader: Option<Arc<dyn GameReader>>,
    signer: Option<Arc<dyn GameSigner>>,
}

/// Shared handle on the wallet connection. The host application mutates it
/// when the user connects, switches network, or switches account; actions in
/// flight observe those changes through [`CallScope::is_stale`].
#[derive(Clone, Default)]
pub struct Connection {
    inner: Arc<RwLock<ConnectionState>>,
}

impl Connection {
    pub fn disconnected() -> Self {
        Self::default()
    }

    pub fn connected(
        chain_id: ChainId,
        reader: Arc<dyn GameReader>,
        signer: Arc<dyn GameSigner>,
    ) -> Self {
        let connection = Self::default();
        connection.set(Some(chain_id), Some(reader), Some(signer));
        connection
    }

    /// Replaces the whole connection in one step.
    pub fn set(
        &self,
        chain_id: Option<ChainId>,
        reader: Option<Arc<dyn GameReader>>,
        signer: Option<Arc<dyn GameSigner>>,
    ) {
        let mut state = self.write();
        state.chain_id = chain_id;
        state.reader = reader;
        state.signer = signer;
    }

    pub fn set_chain_id(&self, chain_id: Option<ChainId>) {
        self.write().chain_id = chain_id;
    }

    pub fn set_reader(&self, reader: Option<Arc<dyn GameReader>>) {
        self.write().reader = reader;
    }

    pub fn set_signer(&self, signer: Option<Arc<dyn GameSigner>>) {
        self.write().signer = signer;
    }

    pub fn is_connected(&self) -> bool {
        self.read().chain_id.is_some()
    }

    pub fn chain_id(&self) -> Option<ChainId> {
        self.read().chain_id
    }

    pub fn reader(&self) -> Option<Arc<dyn GameReader>> {
        self.read().reader.clone()
    }

    pub fn signer(&self) -> Option<Arc<dyn GameSigner>> {
        self.read().signer.clone()
    }

    pub fn signer_address(&self) -> Option<Address> {
        self.read().signer.as_ref().map(|signer| signer.address())
    }

    pub fn same_chain(&self, chain_id: Option<ChainId>) -> bool {
        self.chain_id() == chain_id
    }

    pub fn same_signer(&self, address: Option<&Address>) -> bool {
        self.signer_address().as_ref() == address
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, ConnectionState> {
        self.inner.read().expect("connection lock poisoned")
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, ConnectionState> {
        self.inner.write().expect("connection lock poisoned")
    }
}

/// Snapshot of the context an action started under. Checked after every
/// suspension point: if the chain, the resolved contract address, or (for
/// signed scopes) the signer moved on, the action's pending result must be
/// discarded rather than applied.
#[derive(Clone, Debug)]
pub struct CallScope {
    chain_id: Option<ChainId>,
    contract_address: Address,
    signer_address: Option<Address>,
}

impl CallScope {
    /// Scope for read-only calls; the signer is not part of the contract.
    pub fn read(connection: &Connection, contract_address: &Address) -> Self {
        CallScope {
            chain_id: connection.chain_id(),
            contract_address: contract_address.clone(),
            signer_address: None,
        }
    }

    /// Scope for calls made on behalf of the connected account.
    pub fn signed(connection: &Connection, contract_address: &Address) -> Self {
        CallScope {
            chain_id: connection.chain_id(),
            contract_address: contract_address.clone(),
            signer_address: connection.signer_address(),
        }
    }

    pub fn is_stale(&self, connection: &Connection) -> bool {
        let current = deployments::resolve(connection.chain_id());
        if current.address.as_ref() != Some(&self.contract_address) {
            return true;
        }
        if !connection.same_chain(self.chain_id) {
            return true;
        }
        if let Some(signer_address) = &self.signer_address {
            if !connection.same_signer(Some(signer_address)) {
                return true;
            }
        }
        false
    }
}
