//! Core types for the two-layer sweep agent.
//!
//! This crate provides the foundational types shared across the workspace:
//!
//! - [`Layer`] -- which of the two ledgers a value lives on
//! - [`Network`] -- network identifier (Mainnet, Testnet)
//! - [`amount`] -- fixed-precision amounts and cross-layer unit scaling
//! - [`address`] -- consensus (Bech32) and EVM (hex) address codecs
//!
//! It is a leaf crate: no async, no I/O, no transport. Everything here is
//! a pure value type so the controller and its tests can share one
//! vocabulary.

pub mod address;
pub mod amount;
pub mod hex;

pub use address::{AddressError, ConsensusAddress, EvmAddress};
pub use amount::{Quantity, scale_factor, to_consensus_units, to_paratime_units};

use std::fmt;

// ---------------------------------------------------------------------------
// Layer
// ---------------------------------------------------------------------------

/// The two ledgers the agent observes.
///
/// The consensus layer holds staking/custody balances in its native unit;
/// the paratime (execution runtime) layer has its own account model and a
/// finer base-unit precision, bridged to consensus via deposit/withdraw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Layer {
    /// The base consensus ledger.
    Consensus,
    /// The dependent execution-runtime ledger.
    Paratime,
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Consensus => write!(f, "consensus"),
            Self::Paratime => write!(f, "paratime"),
        }
    }
}

// ---------------------------------------------------------------------------
// Network
// ---------------------------------------------------------------------------

/// Network identifier.
///
/// Determines which chain context, runtime identifier, and bridging
/// account the agent talks to. Both networks share the consensus address
/// HRP, so addresses alone do not reveal the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Network {
    /// Production network.
    Mainnet,
    /// Public test network.
    Testnet,
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mainnet => write!(f, "mainnet"),
            Self::Testnet => write!(f, "testnet"),
        }
    }
}
