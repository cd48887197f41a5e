//! The game session controller: one method per user-visible action, each a
//! linear async sequence behind a synchronous re-entrancy guard, narrating
//! progress into the session state and discarding results that were computed
//! against a connection the user has since navigated away from.

use std::ops::RangeInclusive;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::Duration;

use crate::chain::GameSigner;
use crate::connection::{CallScope, Connection};
use crate::deployments::{self, GameDescriptor};
use crate::fhevm::{EncryptedInput, FhevmInstance, HandleContractPair};
use crate::signature::{DecryptionSignature, StringStorage};
use crate::state::{ActionKind, GameSessionState, OperationFlags};
use crate::{Address, ClearValue};

/// Valid plaintext domain for secrets and guesses.
pub const GUESS_RANGE: RangeInclusive<u32> = 1..=100;

/// Short yield between setting a busy flag and starting the CPU-heavy
/// encryption, so observers get a chance to render the flag first.
const PRE_ENCRYPT_YIELD: Duration = Duration::from_millis(100);

const FHEVM_UNAVAILABLE: &str = "FHEVM instance not available. Please wait for initialization.";

/// Clears the action's busy flag when dropped. Every exit path of an action
/// releases its flag exactly once, including panics.
struct FlightGuard<'a> {
    state: &'a Mutex<GameSessionState>,
    kind: ActionKind,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut state) = self.state.lock() {
            state.flags.set(self.kind, false);
        }
    }
}

pub struct GameController {
    connection: Connection,
    instance: RwLock<Option<Arc<dyn FhevmInstance>>>,
    signature_storage: Arc<dyn StringStorage>,
    state: Mutex<GameSessionState>,
}

impl GameController {
    pub fn new(connection: Connection, signature_storage: Arc<dyn StringStorage>) -> Self {
        GameController {
            connection,
            instance: RwLock::new(None),
            signature_storage,
            state: Mutex::new(GameSessionState::default()),
        }
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    /// Installs (or removes) the FHE instance once the SDK has loaded.
    pub fn set_instance(&self, instance: Option<Arc<dyn FhevmInstance>>) {
        *self.instance.write().expect("instance lock poisoned") = instance;
    }

    pub fn has_instance(&self) -> bool {
        self.instance().is_some()
    }

    /// Deployment descriptor for the active chain, re-resolved on every call
    /// so a chain switch is never served from a cached value.
    pub fn descriptor(&self) -> GameDescriptor {
        deployments::resolve(self.connection.chain_id())
    }

    /// `None` before a chain is known, then whether the game is deployed on
    /// the active chain.
    pub fn is_deployed(&self) -> Option<bool> {
        self.connection
            .chain_id()
            .map(|_| self.descriptor().is_deployed())
    }

    pub fn snapshot(&self) -> GameSessionState {
        self.state().clone()
    }

    pub fn message(&self) -> String {
        self.state().message.clone()
    }

    pub fn flags(&self) -> OperationFlags {
        self.state().flags
    }

    pub fn is_decrypted(&self) -> bool {
        self.state().is_decrypted()
    }

    //
    // Eligibility predicates, mirrored by the presentation layer to disable
    // controls instead of surfacing precondition errors.
    //

    pub fn can_get_game_status(&self) -> bool {
        self.descriptor().is_deployed()
            && self.connection.reader().is_some()
            && !self.flags().is_refreshing
    }

    pub fn can_set_secret(&self) -> bool {
        self.descriptor().is_deployed()
            && self.has_instance()
            && self.connection.signer().is_some()
            && !self.flags().is_refreshing
            && !self.flags().is_setting_secret
    }

    pub fn can_make_guess(&self) -> bool {
        self.descriptor().is_deployed()
            && self.connection.signer().is_some()
            && !self.flags().is_refreshing
            && !self.flags().is_making_guess
    }

    pub fn can_get_hint(&self) -> bool {
        self.descriptor().is_deployed()
            && self.connection.signer().is_some()
            && !self.flags().is_refreshing
            && !self.flags().is_getting_hint
    }

    pub fn can_decrypt(&self) -> bool {
        let state = self.state();
        self.descriptor().is_deployed()
            && self.connection.signer().is_some()
            && !state.flags.is_refreshing
            && !state.flags.is_decrypting
            && state.has_hint()
            && !state.fully_decrypted()
    }

    pub fn can_reset(&self) -> bool {
        let owner = self.state().owner.clone();
        self.descriptor().is_deployed()
            && owner.is_some()
            && owner == self.connection.signer_address()
            && !self.flags().is_refreshing
            && !self.flags().is_resetting
    }

    /// Level-triggered entry point: the host calls this whenever the wallet
    /// connection changed (connect, chain switch, account switch).
    pub async fn connection_changed(&self) {
        let descriptor = self.descriptor();
        if descriptor.address.is_none() {
            if let Some(chain_id) = descriptor.chain_id {
                self.state().set_message(format!(
                    "PrivateGuessingGame deployment not found for chainId={chain_id}."
                ));
            }
        }
        self.refresh_game_status().await;
    }

    /// Re-reads the on-chain game status (active flag, owner, protocol id).
    /// With no resolved deployment or reader the status is reset to unknown
    /// and nothing is called.
    pub async fn refresh_game_status(&self) {
        if self.flags().is_refreshing {
            return;
        }
        let descriptor = self.descriptor();
        let (Some(address), Some(_chain_id)) = (descriptor.address, descriptor.chain_id) else {
            self.state().reset_game_status();
            return;
        };
        let Some(reader) = self.connection.reader() else {
            self.state().reset_game_status();
            return;
        };
        let Some(_guard) = self.begin(ActionKind::Refresh) else {
            return;
        };

        let scope = CallScope::read(&self.connection, &address);

        match reader.is_game_active(&address).await {
            Ok(active) => {
                tracing::debug!("isGameActive()={active}");
                if !scope.is_stale(&self.connection) {
                    self.state().game_active = Some(active);
                }
            }
            Err(error) => {
                self.state()
                    .set_message(format!("PrivateGuessingGame status call failed! error={error}"));
                return;
            }
        }

        match reader.owner(&address).await {
            Ok(owner) => {
                tracing::debug!("owner()={owner}");
                if !scope.is_stale(&self.connection) {
                    self.state().owner = Some(owner);
                }
            }
            Err(error) => {
                self.state()
                    .set_message(format!("PrivateGuessingGame status call failed! error={error}"));
                return;
            }
        }

        match reader.protocol_id(&address).await {
            Ok(protocol_id) => {
                if !scope.is_stale(&self.connection) {
                    self.state().protocol_id = Some(protocol_id);
                }
            }
            Err(error) => {
                self.state()
                    .set_message(format!("PrivateGuessingGame status call failed! error={error}"));
            }
        }
    }

    /// Encrypts `value` and starts the game with it. Owner only; the
    /// contract reverts with `NotOwner` otherwise.
    pub async fn set_secret(&self, value: u32) {
        self.submit_encrypted(ActionKind::SetSecret, value).await;
    }

    /// Encrypts `value` and submits it as a guess against the running game.
    pub async fn make_guess(&self, value: u32) {
        self.submit_encrypted(ActionKind::MakeGuess, value).await;
    }

    /// Encrypts `value`, asks the contract for the encrypted comparison
    /// against the secret, and stores the returned handle pair. Storing a
    /// new pair implicitly invalidates both cached decrypted values.
    pub async fn get_hint(&self, value: u32) {
        let kind = ActionKind::GetHint;
        let method = kind.method_name();
        let Some(call) = self.prepare_encrypted_call(kind, value).await else {
            return;
        };
        let PreparedCall {
            guard: _guard,
            scope,
            signer,
            contract,
            input,
        } = call;

        self.state().set_message(format!("Call {method}({value})..."));
        let handles = match signer.call_get_hint(&contract, &input).await {
            Ok(handles) => handles,
            Err(error) => {
                self.state()
                    .set_message(format!("{method}({value}) Failed! error={error}"));
                return;
            }
        };
        self.state()
            .set_message(format!("Call {method}({value}) completed"));

        if scope.is_stale(&self.connection) {
            self.state().set_message(format!("Ignore {method}({value})"));
            return;
        }

        let mut state = self.state();
        state.store_hint_handles(&handles);
        state.set_message(format!(
            "Hint handles stored: isEqual={}, isGreater={}",
            handles.is_equal, handles.is_greater
        ));
    }

    /// Resets the game to inactive. Owner only, no encryption step.
    pub async fn reset_game(&self) {
        let kind = ActionKind::Reset;
        let method = kind.method_name();
        let Some(contract) = self.descriptor().address else {
            return;
        };
        let Some(signer) = self.connection.signer() else {
            return;
        };
        let Some(_guard) = self.begin(kind) else {
            return;
        };

        let scope = CallScope::signed(&self.connection, &contract);
        self.state().set_message(format!("Start {method}()..."));

        let tx = match signer.submit_reset_game(&contract).await {
            Ok(tx) => tx,
            Err(error) => {
                self.state()
                    .set_message(format!("{method}() Failed! error={error}"));
                return;
            }
        };
        self.state().set_message(format!("Wait for tx:{tx}..."));
        let receipt = match signer.wait_for(&tx).await {
            Ok(receipt) => receipt,
            Err(error) => {
                self.state()
                    .set_message(format!("{method}() Failed! error={error}"));
                return;
            }
        };
        self.state().set_message(format!(
            "Call {method}() completed status={}",
            receipt.status
        ));

        if scope.is_stale(&self.connection) {
            self.state().set_message(format!("Ignore {method}()"));
            return;
        }
        self.refresh_game_status().await;
    }

    /// Decrypts whichever hint handles are present and not already matched
    /// by a cached clear value. A missing handle in the relayer's response
    /// is partial availability, reported as `N/A`.
    pub async fn decrypt_hint(&self) {
        let Some(contract) = self.descriptor().address else {
            return;
        };
        let Some(signer) = self.connection.signer() else {
            return;
        };
        let Some(instance) = self.instance() else {
            self.state().set_message(FHEVM_UNAVAILABLE);
            return;
        };

        let (is_equal_handle, is_greater_handle) = {
            let mut state = self.state();
            if state.fully_decrypted() && state.has_hint() {
                return;
            }
            if !state.has_hint() {
                state.clear_decrypted();
                return;
            }
            (
                state.is_equal_handle.clone(),
                state.is_greater_handle.clone(),
            )
        };

        let Some(_guard) = self.begin(ActionKind::Decrypt) else {
            return;
        };

        let scope = CallScope::signed(&self.connection, &contract);
        self.state().set_message("Start decrypt hint...");

        let sig = match DecryptionSignature::load_or_sign(
            instance.as_ref(),
            std::slice::from_ref(&contract),
            signer.as_ref(),
            self.signature_storage.as_ref(),
        )
        .await
        {
            Some(sig) => sig,
            None => {
                self.state()
                    .set_message("Unable to build FHEVM decryption signature");
                return;
            }
        };

        if scope.is_stale(&self.connection) {
            self.state().set_message("Ignore FHEVM decryption");
            return;
        }

        self.state().set_message("Call FHEVM userDecrypt...");

        let mut pairs = Vec::new();
        for handle in [&is_equal_handle, &is_greater_handle].into_iter().flatten() {
            pairs.push(HandleContractPair {
                handle: handle.clone(),
                contract_address: contract.clone(),
            });
        }

        let decrypted = match instance
            .user_decrypt(
                &pairs,
                &sig.private_key,
                &sig.public_key,
                &sig.signature,
                &sig.contract_addresses,
                &sig.user_address,
                sig.start_timestamp,
                sig.duration_days,
            )
            .await
        {
            Ok(decrypted) => decrypted,
            Err(error) => {
                self.state()
                    .set_message(format!("FHEVM userDecrypt failed! error={error}"));
                return;
            }
        };
        self.state().set_message("FHEVM userDecrypt completed!");

        if scope.is_stale(&self.connection) {
            self.state().set_message("Ignore FHEVM decryption");
            return;
        }

        let mut state = self.state();
        if let Some(handle) = &is_equal_handle {
            if let Some(clear) = decrypted.get(handle) {
                state.clear_is_equal = Some(ClearValue {
                    handle: handle.clone(),
                    clear: clear.clone(),
                });
            }
        }
        if let Some(handle) = &is_greater_handle {
            if let Some(clear) = decrypted.get(handle) {
                state.clear_is_greater = Some(ClearValue {
                    handle: handle.clone(),
                    clear: clear.clone(),
                });
            }
        }

        let is_equal_text = is_equal_handle
            .as_ref()
            .and_then(|handle| decrypted.get(handle))
            .map(|clear| clear.to_string())
            .unwrap_or_else(|| "N/A".to_string());
        let is_greater_text = is_greater_handle
            .as_ref()
            .and_then(|handle| decrypted.get(handle))
            .map(|clear| clear.to_string())
            .unwrap_or_else(|| "N/A".to_string());
        state.set_message(format!(
            "Hint decrypted: isEqual={is_equal_text}, isGreater={is_greater_text}"
        ));
    }

    //
    // Internals
    //

    fn state(&self) -> MutexGuard<'_, GameSessionState> {
        self.state.lock().expect("state lock poisoned")
    }

    fn instance(&self) -> Option<Arc<dyn FhevmInstance>> {
        self.instance.read().expect("instance lock poisoned").clone()
    }

    /// Atomically claims the busy flag for `kind`. Returns `None` while a
    /// refresh or another instance of the same kind is in flight; the check
    /// and the flag write happen under one lock, before any suspension point.
    fn begin(&self, kind: ActionKind) -> Option<FlightGuard<'_>> {
        let mut state = self.state();
        if state.flags.is_refreshing || state.flags.get(kind) {
            return None;
        }
        state.flags.set(kind, true);
        Some(FlightGuard {
            state: &self.state,
            kind,
        })
    }

    /// Shared front half of the encrypted actions: preconditions, guard,
    /// start message, pre-encryption yield, encryption, first stale check.
    async fn prepare_encrypted_call(
        &self,
        kind: ActionKind,
        value: u32,
    ) -> Option<PreparedCall<'_>> {
        let method = kind.method_name();
        let contract = self.descriptor().address?;
        let signer = self.connection.signer()?;
        if !GUESS_RANGE.contains(&value) {
            return None;
        }
        let instance = match self.instance() {
            Some(instance) => instance,
            None => {
                self.state().set_message(FHEVM_UNAVAILABLE);
                return None;
            }
        };
        let guard = self.begin(kind)?;

        let scope = CallScope::signed(&self.connection, &contract);
        self.state()
            .set_message(format!("Start {method}({value})..."));
        tokio::time::sleep(PRE_ENCRYPT_YIELD).await;

        let mut builder = instance.create_encrypted_input(&contract, &signer.address());
        builder.add32(value);
        let input = match builder.encrypt(instance.as_ref()).await {
            Ok(input) => input,
            Err(error) => {
                self.state()
                    .set_message(format!("{method}({value}) Failed! error={error}"));
                return None;
            }
        };

        if scope.is_stale(&self.connection) {
            self.state().set_message(format!("Ignore {method}({value})"));
            return None;
        }

        Some(PreparedCall {
            guard,
            scope,
            signer,
            contract,
            input,
        })
    }

    /// Back half shared by `setSecret` and `makeGuess`: submit, await
    /// inclusion, final stale check, then refresh the game status.
    async fn submit_encrypted(&self, kind: ActionKind, value: u32) {
        let method = kind.method_name();
        let Some(call) = self.prepare_encrypted_call(kind, value).await else {
            return;
        };
        let PreparedCall {
            guard: _guard,
            scope,
            signer,
            contract,
            input,
        } = call;

        self.state().set_message(format!("Call {method}({value})..."));
        let submitted = match kind {
            ActionKind::SetSecret => signer.submit_set_secret(&contract, &input).await,
            ActionKind::MakeGuess => signer.submit_make_guess(&contract, &input).await,
            _ => unreachable!("submit_encrypted only handles secret and guess"),
        };
        let tx = match submitted {
            Ok(tx) => tx,
            Err(error) => {
                self.state()
                    .set_message(format!("{method}({value}) Failed! error={error}"));
                return;
            }
        };
        self.state().set_message(format!("Wait for tx:{tx}..."));

        let receipt = match signer.wait_for(&tx).await {
            Ok(receipt) => receipt,
            Err(error) => {
                self.state()
                    .set_message(format!("{method}({value}) Failed! error={error}"));
                return;
            }
        };
        self.state().set_message(format!(
            "Call {method}({value}) completed status={}",
            receipt.status
        ));

        if scope.is_stale(&self.connection) {
            self.state().set_message(format!("Ignore {method}({value})"));
            return;
        }

        self.refresh_game_status().await;
    }
}

struct PreparedCall<'a> {
    guard: FlightGuard<'a>,
    scope: CallScope,
    signer: Arc<dyn GameSigner>,
    contract: Address,
    input: EncryptedInput,
}
