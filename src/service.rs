//! GraphQL presentation surface over the controller. Strictly derivative:
//! queries project the session state into view objects, mutations await the
//! corresponding controller action and return the resulting status message.

use std::sync::Arc;

use async_graphql::{EmptySubscription, Object, Request, Response, Schema, SimpleObject};

use crate::controller::GameController;
use crate::state::OperationFlags;

pub struct GuessingGameService {
    controller: Arc<GameController>,
}

impl GuessingGameService {
    pub fn new(controller: Arc<GameController>) -> Self {
        GuessingGameService { controller }
    }

    pub fn schema(&self) -> Schema<QueryRoot, MutationRoot, EmptySubscription> {
        Schema::build(
            QueryRoot {
                controller: self.controller.clone(),
            },
            MutationRoot {
                controller: self.controller.clone(),
            },
            EmptySubscription,
        )
        .finish()
    }

    pub async fn handle_query(&self, request: Request) -> Response {
        self.schema().execute(request).await
    }
}

/// Full session view: deployment, connection, game status, hint handles and
/// their decrypted values, narration message.
#[derive(Debug, Clone, SimpleObject)]
#[graphql(rename_fields = "camelCase")]
pub struct GameView {
    pub contract_address: Option<String>,
    pub chain_id: Option<u64>,
    pub chain_name: Option<String>,
    pub is_deployed: Option<bool>,
    pub is_connected: bool,
    pub your_address: Option<String>,
    pub is_owner: bool,
    pub game_active: Option<bool>,
    pub owner: Option<String>,
    pub protocol_id: Option<u64>,
    pub is_equal_handle: Option<String>,
    pub is_greater_handle: Option<String>,
    pub clear_is_equal: Option<String>,
    pub clear_is_greater: Option<String>,
    pub is_decrypted: bool,
    pub message: String,
}

/// Which actions are currently allowed; buttons bind their enabled state to
/// these, so refused preconditions never surface as errors.
#[derive(Debug, Clone, SimpleObject)]
#[graphql(rename_fields = "camelCase")]
pub struct ActionGates {
    pub can_get_game_status: bool,
    pub can_set_secret: bool,
    pub can_make_guess: bool,
    pub can_get_hint: bool,
    pub can_decrypt: bool,
    pub can_reset: bool,
}

#[derive(Debug, Clone, SimpleObject)]
#[graphql(rename_fields = "camelCase")]
pub struct InterfaceView {
    pub functions: Vec<String>,
    pub events: Vec<String>,
    pub errors: Vec<String>,
}

pub struct QueryRoot {
    controller: Arc<GameController>,
}

#[Object]
impl QueryRoot {
    async fn game(&self) -> GameView {
        let controller = &self.controller;
        let descriptor = controller.descriptor();
        let state = controller.snapshot();
        let your_address = controller.connection().signer_address();

        GameView {
            contract_address: descriptor.address.map(|address| address.to_string()),
            chain_id: descriptor.chain_id,
            chain_name: descriptor.chain_name,
            is_deployed: controller.is_deployed(),
            is_connected: controller.connection().is_connected(),
            is_owner: your_address.is_some() && state.owner == your_address,
            your_address: your_address.map(|address| address.to_string()),
            game_active: state.game_active,
            owner: state.owner.map(|owner| owner.to_string()),
            protocol_id: state.protocol_id,
            is_equal_handle: state.is_equal_handle.map(|handle| handle.to_string()),
            is_greater_handle: state.is_greater_handle.map(|handle| handle.to_string()),
            clear_is_equal: state.clear_is_equal.map(|value| value.clear.to_string()),
            clear_is_greater: state.clear_is_greater.map(|value| value.clear.to_string()),
            is_decrypted: controller.is_decrypted(),
            message: state.message,
        }
    }

    async fn flags(&self) -> OperationFlags {
        self.controller.flags()
    }

    async fn gates(&self) -> ActionGates {
        let controller = &self.controller;
        ActionGates {
            can_get_game_status: controller.can_get_game_status(),
            can_set_secret: controller.can_set_secret(),
            can_make_guess: controller.can_make_guess(),
            can_get_hint: controller.can_get_hint(),
            can_decrypt: controller.can_decrypt(),
            can_reset: controller.can_reset(),
        }
    }

    async fn interface(&self) -> InterfaceView {
        let interface = self.controller.descriptor().interface;
        InterfaceView {
            functions: interface.functions.iter().map(|s| s.to_string()).collect(),
            events: interface.events.iter().map(|s| s.to_string()).collect(),
            errors: interface.errors.iter().map(|s| s.to_string()).collect(),
        }
    }

    async fn message(&self) -> String {
        self.controller.message()
    }
}

pub struct MutationRoot {
    controller: Arc<GameController>,
}

#[Object]
impl MutationRoot {
    async fn refresh_game_status(&self) -> String {
        self.controller.refresh_game_status().await;
        self.controller.message()
    }

    async fn set_secret(&self, value: u32) -> String {
        self.controller.set_secret(value).await;
        self.controller.message()
    }

    async fn make_guess(&self, value: u32) -> String {
        self.controller.make_guess(value).await;
        self.controller.message()
    }

    async fn get_hint(&self, value: u32) -> String {
        self.controller.get_hint(value).await;
        self.controller.message()
    }

    async fn decrypt_hint(&self) -> String {
        self.controller.decrypt_hint().await;
        self.controller.message()
    }

    async fn reset_game(&self) -> String {
        self.controller.reset_game().await;
        self.controller.message()
    }
}
