//! The session state the UI renders, owned by the controller and mutated
//! only through the transitions below.

use async_graphql::SimpleObject;
use serde::{Deserialize, Serialize};

use crate::chain::HintHandles;
use crate::{Address, CiphertextHandle, ClearValue};

/// The kinds of guarded actions the controller runs. At most one instance of
/// each kind is in flight at a time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActionKind {
    Refresh,
    Decrypt,
    SetSecret,
    MakeGuess,
    GetHint,
    Reset,
}

impl ActionKind {
    /// Contract-side method name, used verbatim in status messages.
    pub fn method_name(&self) -> &'static str {
        match self {
            ActionKind::Refresh => "refreshGameStatus",
            ActionKind::Decrypt => "decryptHint",
            ActionKind::SetSecret => "setSecret",
            ActionKind::MakeGuess => "makeGuess",
            ActionKind::GetHint => "getHint",
            ActionKind::Reset => "resetGame",
        }
    }
}

/// One busy flag per action kind. Set before an action's first suspension
/// point and cleared on every exit path; a set flag makes a re-entrant call
/// of the same kind a no-op.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, SimpleObject)]
#[graphql(rename_fields = "camelCase")]
pub struct OperationFlags {
    pub is_refreshing: bool,
    pub is_decrypting: bool,
    pub is_setting_secret: bool,
    pub is_making_guess: bool,
    pub is_getting_hint: bool,
    pub is_resetting: bool,
}

impl OperationFlags {
    pub fn get(&self, kind: ActionKind) -> bool {
        match kind {
            ActionKind::Refresh => self.is_refreshing,
            ActionKind::Decrypt => self.is_decrypting,
            ActionKind::SetSecret => self.is_setting_secret,
            ActionKind::MakeGuess => self.is_making_guess,
            ActionKind::GetHint => self.is_getting_hint,
            ActionKind::Reset => self.is_resetting,
        }
    }

    pub(crate) fn set(&mut self, kind: ActionKind, value: bool) {
        match kind {
            ActionKind::Refresh => self.is_refreshing = value,
            ActionKind::Decrypt => self.is_decrypting = value,
            ActionKind::SetSecret => self.is_setting_secret = value,
            ActionKind::MakeGuess => self.is_making_guess = value,
            ActionKind::GetHint => self.is_getting_hint = value,
            ActionKind::Reset => self.is_resetting = value,
        }
    }

    pub fn any(&self) -> bool {
        self.is_refreshing
            || self.is_decrypting
            || self.is_setting_secret
            || self.is_making_guess
            || self.is_getting_hint
            || self.is_resetting
    }
}

/// Everything observable about the current game session.
#[derive(Clone, Debug, Default)]
pub struct GameSessionState {
    /// `None` until the first successful refresh, and again whenever the
    /// descriptor becomes unresolved.
    pub game_active: Option<bool>,
    pub owner: Option<Address>,
    pub protocol_id: Option<u64>,
    pub is_equal_handle: Option<CiphertextHandle>,
    pub is_greater_handle: Option<CiphertextHandle>,
    pub clear_is_equal: Option<ClearValue>,
    pub clear_is_greater: Option<ClearValue>,
    pub flags: OperationFlags,
    /// Free-text narration of the last state transition.
    pub message: String,
}

impl GameSessionState {
    pub(crate) fn set_message(&mut self, message: impl Into<String>) {
        self.message = message.into();
        tracing::info!("{}", self.message);
    }

    pub(crate) fn reset_game_status(&mut self) {
        self.game_active = None;
        self.owner = None;
        self.protocol_id = None;
    }

    /// Installs a new hint pair. The previously cached clears are left in
    /// place; they go stale by no longer matching the stored handles.
    pub(crate) fn store_hint_handles(&mut self, handles: &HintHandles) {
        self.is_equal_handle = Some(handles.is_equal.clone());
        self.is_greater_handle = Some(handles.is_greater.clone());
    }

    pub(crate) fn clear_decrypted(&mut self) {
        self.clear_is_equal = None;
        self.clear_is_greater = None;
    }

    pub fn has_hint(&self) -> bool {
        self.is_equal_handle.is_some() || self.is_greater_handle.is_some()
    }

    /// True when the equality hint has been decrypted for the handle
    /// currently held.
    pub fn is_decrypted(&self) -> bool {
        match &self.is_equal_handle {
            Some(handle) => matches_clear(handle, &self.clear_is_equal),
            None => false,
        }
    }

    /// True when every held handle already has a matching decrypted value;
    /// vacuously true for an absent handle.
    pub fn fully_decrypted(&self) -> bool {
        let equal = match &self.is_equal_handle {
            Some(handle) => matches_clear(handle, &self.clear_is_equal),
            None => true,
        };
        let greater = match &self.is_greater_handle {
            Some(handle) => matches_clear(handle, &self.clear_is_greater),
            None => true,
        };
        equal && greater
    }
}

fn matches_clear(handle: &CiphertextHandle, clear: &Option<ClearValue>) -> bool {
    clear.as_ref().is_some_and(|value| &value.handle == handle)
}
