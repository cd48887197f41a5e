//! Test doubles for the external collaborators: a chain that enforces the
//! contract's revert semantics over plaintexts, an FHE instance backed by a
//! plaintext-behind-handle ledger shared with that chain, and an in-memory
//! signature store.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;

use private_guessing_game::chain::{GameReader, GameSigner, HintHandles, TxHash, TxReceipt};
use private_guessing_game::fhevm::{
    EncryptedInput, EncryptedInputBuilder, FhevmInstance, HandleContractPair, Keypair,
};
use private_guessing_game::signature::MemoryStorage;
use private_guessing_game::{
    Address, CiphertextHandle, Connection, GameController, Plaintext,
};

pub const CHAIN_ID: u64 = 31337;
pub const OWNER: &str = "0x1111111111111111111111111111111111111111";
pub const PLAYER: &str = "0x2222222222222222222222222222222222222222";

type Hook = Box<dyn Fn() + Send + Sync>;

/// The co-processor's view of the world: which plaintext hides behind which
/// handle. Shared between the mock FHE instance (which mints handles when
/// encrypting and resolves them when decrypting) and the mock chain (which
/// resolves submitted input handles and mints hint result handles).
#[derive(Default)]
pub struct CoprocessorInner {
    values: HashMap<CiphertextHandle, Plaintext>,
    next_handle: u64,
    pub withheld: HashSet<CiphertextHandle>,
    pub encrypt_count: u32,
    pub decrypt_count: u32,
}

impl CoprocessorInner {
    fn mint(&mut self, value: Plaintext) -> CiphertextHandle {
        self.next_handle += 1;
        let handle = CiphertextHandle::new(format!("0xhandle{:04x}", self.next_handle));
        self.values.insert(handle.clone(), value);
        handle
    }

    fn resolve_u64(&self, handle: &CiphertextHandle) -> Result<u64> {
        match self.values.get(handle) {
            Some(Plaintext::Uint(value)) => Ok(*value),
            Some(Plaintext::Bool(_)) => bail!("handle {handle} is not an integer"),
            None => bail!("unknown ciphertext handle {handle}"),
        }
    }
}

pub type Coprocessor = Arc<Mutex<CoprocessorInner>>;

/// Plaintext game the contract would run over ciphertexts.
pub struct GameInner {
    pub owner: Address,
    pub active: bool,
    pub secret: Option<u64>,
    pub protocol_id: u64,
}

pub type Game = Arc<Mutex<GameInner>>;

pub struct MockFhevm {
    pub coprocessor: Coprocessor,
    keypairs: AtomicU32,
}

impl MockFhevm {
    pub fn new(coprocessor: Coprocessor) -> Self {
        MockFhevm {
            coprocessor,
            keypairs: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl FhevmInstance for MockFhevm {
    fn generate_keypair(&self) -> Keypair {
        let n = self.keypairs.fetch_add(1, Ordering::SeqCst);
        Keypair {
            public_key: format!("0xpub{n}"),
            private_key: format!("0xpriv{n}"),
        }
    }

    async fn encrypt(&self, input: &EncryptedInputBuilder) -> Result<EncryptedInput> {
        let mut coprocessor = self.coprocessor.lock().unwrap();
        coprocessor.encrypt_count += 1;
        let handles = input
            .values32()
            .iter()
            .map(|value| coprocessor.mint(Plaintext::Uint(*value as u64)))
            .collect::<Vec<_>>();
        Ok(EncryptedInput {
            handles,
            input_proof: format!("0xproof{:04x}", coprocessor.encrypt_count),
        })
    }

    async fn user_decrypt(
        &self,
        pairs: &[HandleContractPair],
        _private_key: &str,
        _public_key: &str,
        signature: &str,
        _contract_addresses: &[Address],
        _user_address: &Address,
        _start_timestamp: u64,
        _duration_days: u64,
    ) -> Result<HashMap<CiphertextHandle, Plaintext>> {
        if signature.is_empty() {
            bail!("missing decryption signature");
        }
        let mut coprocessor = self.coprocessor.lock().unwrap();
        coprocessor.decrypt_count += 1;
        let mut decrypted = HashMap::new();
        for pair in pairs {
            if coprocessor.withheld.contains(&pair.handle) {
                continue;
            }
            if let Some(value) = coprocessor.values.get(&pair.handle) {
                decrypted.insert(pair.handle.clone(), value.clone());
            }
        }
        Ok(decrypted)
    }
}

pub struct MockReader {
    pub game: Game,
    pub calls: AtomicU32,
}

#[async_trait]
impl GameReader for MockReader {
    async fn is_game_active(&self, _contract: &Address) -> Result<bool> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.game.lock().unwrap().active)
    }

    async fn owner(&self, _contract: &Address) -> Result<Address> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.game.lock().unwrap().owner.clone())
    }

    async fn protocol_id(&self, _contract: &Address) -> Result<u64> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.game.lock().unwrap().protocol_id)
    }
}

pub struct MockSigner {
    address: Address,
    pub game: Game,
    pub coprocessor: Coprocessor,
    txs: AtomicU32,
    pub sign_count: AtomicU32,
    before_confirm: Mutex<Option<Hook>>,
}

impl MockSigner {
    pub fn new(address: &str, game: Game, coprocessor: Coprocessor) -> Self {
        MockSigner {
            address: Address::new(address),
            game,
            coprocessor,
            txs: AtomicU32::new(0),
            sign_count: AtomicU32::new(0),
            before_confirm: Mutex::new(None),
        }
    }

    /// Runs once the transaction has been submitted but before it confirms;
    /// used to move the connection out from under an in-flight action.
    pub fn set_before_confirm(&self, hook: Hook) {
        *self.before_confirm.lock().unwrap() = Some(hook);
    }

    fn next_tx(&self) -> TxHash {
        let n = self.txs.fetch_add(1, Ordering::SeqCst);
        TxHash::new(format!("0xtx{n:04x}"))
    }

    fn input_value(&self, input: &EncryptedInput) -> Result<u64> {
        let handle = input
            .handles
            .first()
            .ok_or_else(|| anyhow!("empty encrypted input"))?;
        self.coprocessor.lock().unwrap().resolve_u64(handle)
    }
}

#[async_trait]
impl GameSigner for MockSigner {
    fn address(&self) -> Address {
        self.address.clone()
    }

    async fn submit_set_secret(
        &self,
        _contract: &Address,
        input: &EncryptedInput,
    ) -> Result<TxHash> {
        let value = self.input_value(input)?;
        let mut game = self.game.lock().unwrap();
        if self.address != game.owner {
            bail!("execution reverted: NotOwner");
        }
        if game.active {
            bail!("execution reverted: GameAlreadyActive");
        }
        if !(1..=100).contains(&value) {
            bail!("execution reverted: InvalidRange");
        }
        game.secret = Some(value);
        game.active = true;
        Ok(self.next_tx())
    }

    async fn submit_make_guess(
        &self,
        _contract: &Address,
        input: &EncryptedInput,
    ) -> Result<TxHash> {
        let value = self.input_value(input)?;
        let game = self.game.lock().unwrap();
        if !game.active {
            bail!("execution reverted: GameNotActive");
        }
        if !(1..=100).contains(&value) {
            bail!("execution reverted: InvalidRange");
        }
        Ok(self.next_tx())
    }

    async fn submit_reset_game(&self, _contract: &Address) -> Result<TxHash> {
        let mut game = self.game.lock().unwrap();
        if self.address != game.owner {
            bail!("execution reverted: NotOwner");
        }
        game.active = false;
        game.secret = None;
        Ok(self.next_tx())
    }

    async fn wait_for(&self, tx: &TxHash) -> Result<TxReceipt> {
        if let Some(hook) = self.before_confirm.lock().unwrap().as_ref() {
            hook();
        }
        Ok(TxReceipt {
            hash: tx.clone(),
            status: 1,
        })
    }

    async fn call_get_hint(
        &self,
        _contract: &Address,
        input: &EncryptedInput,
    ) -> Result<HintHandles> {
        let guess = self.input_value(input)?;
        let game = self.game.lock().unwrap();
        if !game.active {
            bail!("execution reverted: GameNotActive");
        }
        let secret = game
            .secret
            .ok_or_else(|| anyhow!("active game without a secret"))?;
        let mut coprocessor = self.coprocessor.lock().unwrap();
        Ok(HintHandles {
            is_equal: coprocessor.mint(Plaintext::Bool(guess == secret)),
            is_greater: coprocessor.mint(Plaintext::Bool(guess > secret)),
        })
    }

    async fn sign_decryption_authorization(
        &self,
        _contracts: &[Address],
        public_key: &str,
        _start_timestamp: u64,
        _duration_days: u64,
    ) -> Result<String> {
        let n = self.sign_count.fetch_add(1, Ordering::SeqCst);
        Ok(format!("0xsig{n}:{public_key}"))
    }
}

/// One fully wired session: controller, live connection (owner signer by
/// default), shared game and co-processor ledgers.
pub struct TestBed {
    pub controller: Arc<GameController>,
    pub connection: Connection,
    pub fhevm: Arc<MockFhevm>,
    pub reader: Arc<MockReader>,
    pub owner_signer: Arc<MockSigner>,
    pub player_signer: Arc<MockSigner>,
    pub game: Game,
    pub coprocessor: Coprocessor,
}

pub fn setup() -> TestBed {
    let coprocessor: Coprocessor = Arc::new(Mutex::new(CoprocessorInner::default()));
    let game: Game = Arc::new(Mutex::new(GameInner {
        owner: Address::new(OWNER),
        active: false,
        secret: None,
        protocol_id: 1,
    }));

    let fhevm = Arc::new(MockFhevm::new(coprocessor.clone()));
    let reader = Arc::new(MockReader {
        game: game.clone(),
        calls: AtomicU32::new(0),
    });
    let owner_signer = Arc::new(MockSigner::new(OWNER, game.clone(), coprocessor.clone()));
    let player_signer = Arc::new(MockSigner::new(PLAYER, game.clone(), coprocessor.clone()));

    let connection = Connection::connected(CHAIN_ID, reader.clone(), owner_signer.clone());
    let controller = Arc::new(GameController::new(
        connection.clone(),
        Arc::new(MemoryStorage::new()),
    ));
    controller.set_instance(Some(fhevm.clone()));

    TestBed {
        controller,
        connection,
        fhevm,
        reader,
        owner_signer,
        player_signer,
        game,
        coprocessor,
    }
}

impl TestBed {
    pub fn use_player_signer(&self) {
        self.connection
            .set_signer(Some(self.player_signer.clone() as Arc<dyn GameSigner>));
    }

    pub fn encrypt_count(&self) -> u32 {
        self.coprocessor.lock().unwrap().encrypt_count
    }

    pub fn decrypt_count(&self) -> u32 {
        self.coprocessor.lock().unwrap().decrypt_count
    }
}
