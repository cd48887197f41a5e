//! Deployment registry for the PrivateGuessingGame contract.
//!
//! The registry mirrors the artifacts a deploy pipeline emits per network:
//! one entry per chain id with the deployed address and a human chain name.
//! A missing entry, or an entry still carrying the null address, means the
//! contract is not deployed on that chain.

use crate::{Address, ChainId};

/// Names from the contract ABI, surfaced so the presentation layer can
/// describe the interface without a chain connection.
#[derive(Debug, PartialEq, Eq)]
pub struct GameInterface {
    pub functions: &'static [&'static str],
    pub events: &'static [&'static str],
    pub errors: &'static [&'static str],
}

pub const INTERFACE: GameInterface = GameInterface {
    functions: &[
        "getHint",
        "isGameActive",
        "makeGuess",
        "owner",
        "protocolId",
        "resetGame",
        "setSecret",
    ],
    events: &["GameActivated", "GuessMade", "HintResult", "SecretSet"],
    errors: &[
        "GameAlreadyActive",
        "GameNotActive",
        "InvalidRange",
        "NotOwner",
    ],
};

#[derive(Debug, Clone, Copy)]
pub struct GameDeployment {
    pub chain_id: ChainId,
    pub chain_name: &'static str,
    pub address: &'static str,
}

/// Known deployments, regenerated on every deploy.
pub const DEPLOYMENTS: &[GameDeployment] = &[
    GameDeployment {
        chain_id: 31337,
        chain_name: "hardhat",
        address: "0x7553CB9124f974Ee475E5cE45482F90d5B6076BC",
    },
    GameDeployment {
        chain_id: 11155111,
        chain_name: "sepolia",
        address: "0x0000000000000000000000000000000000000000",
    },
];

/// Resolved deployment metadata for one chain. `address == None` with a
/// `chain_id` set is the "not deployed on this network" condition; both
/// `None` means no wallet connection yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameDescriptor {
    pub address: Option<Address>,
    pub chain_id: Option<ChainId>,
    pub chain_name: Option<String>,
    pub interface: &'static GameInterface,
}

impl GameDescriptor {
    pub fn is_deployed(&self) -> bool {
        self.address.is_some()
    }
}

/// Resolves the descriptor for `chain_id` against the built-in registry.
/// Pure; callers re-resolve whenever the active chain may have changed.
pub fn resolve(chain_id: Option<ChainId>) -> GameDescriptor {
    resolve_in(DEPLOYMENTS, chain_id)
}

pub fn resolve_in(registry: &[GameDeployment], chain_id: Option<ChainId>) -> GameDescriptor {
    let Some(chain_id) = chain_id else {
        return GameDescriptor {
            address: None,
            chain_id: None,
            chain_name: None,
            interface: &INTERFACE,
        };
    };

    match registry.iter().find(|entry| entry.chain_id == chain_id) {
        Some(entry) if !Address::new(entry.address).is_zero() => GameDescriptor {
            address: Some(Address::new(entry.address)),
            chain_id: Some(chain_id),
            chain_name: Some(entry.chain_name.to_string()),
            interface: &INTERFACE,
        },
        _ => GameDescriptor {
            address: None,
            chain_id: Some(chain_id),
            chain_name: None,
            interface: &INTERFACE,
        },
    }
}
