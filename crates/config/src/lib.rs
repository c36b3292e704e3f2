//! Per-network configuration for the sweep agent.
//!
//! This crate provides static configuration for both ledgers:
//!
//! - [`NetworkConfig`] -- endpoint, decimals, and paratime parameters for a network
//! - [`ParatimeConfig`] -- runtime identifier, bridging account, and fee parameters
//! - [`constants`] -- protocol-level timing parameters
//!
//! All data is compile-time constant (`&'static str`), and the types are
//! `Copy`. `config` depends only on `sweep-core`, so it can be used freely
//! as a leaf dependency.

pub mod constants;

use sweep_core::{scale_factor, AddressError, ConsensusAddress, Network};

// ---------------------------------------------------------------------------
// ParatimeConfig
// ---------------------------------------------------------------------------

/// Configuration for the execution-runtime layer.
#[derive(Debug, Clone, Copy)]
pub struct ParatimeConfig {
    /// Hex-encoded 32-byte runtime identifier, bound into paratime
    /// transaction signatures.
    pub runtime_id: &'static str,

    /// The runtime's staking account on the consensus layer. Deposits
    /// require an allowance toward this account.
    pub staking_address: &'static str,

    /// Decimal precision of the paratime base unit.
    pub decimals: u32,

    /// Gas price used for paratime fee computation, in consensus base
    /// units per gas unit.
    pub gas_price: u128,

    /// Fixed gas limit for paratime deposit/withdraw transactions.
    ///
    /// A conservative constant rather than an estimate; it must be raised
    /// if a runtime upgrade makes these calls more expensive. A stale
    /// value overpays fees, it does not fail.
    pub fee_gas: u64,
}

// ---------------------------------------------------------------------------
// NetworkConfig
// ---------------------------------------------------------------------------

/// Network-specific configuration for both layers.
#[derive(Debug, Clone, Copy)]
pub struct NetworkConfig {
    /// The network this configuration is for.
    pub network: Network,

    /// gRPC endpoint of the ledger node.
    pub grpc_endpoint: &'static str,

    /// Decimal precision of the consensus base unit.
    pub consensus_decimals: u32,

    /// Execution-runtime parameters.
    pub paratime: ParatimeConfig,
}

impl NetworkConfig {
    /// Get the configuration for a specific network.
    pub const fn for_network(network: Network) -> Self {
        match network {
            Network::Mainnet => Self::MAINNET,
            Network::Testnet => Self::TESTNET,
        }
    }

    /// The consensus-to-paratime unit multiplier for this network.
    pub const fn scale(&self) -> u128 {
        scale_factor(self.paratime.decimals, self.consensus_decimals)
    }

    /// Parse the paratime's consensus staking account.
    pub fn paratime_staking_account(&self) -> Result<ConsensusAddress, AddressError> {
        ConsensusAddress::parse(self.paratime.staking_address)
    }

    // -----------------------------------------------------------------------
    // Built-in network configurations
    // -----------------------------------------------------------------------

    /// Production mainnet configuration.
    pub const MAINNET: Self = Self {
        network: Network::Mainnet,
        grpc_endpoint: "https://grpc.oasis.io",
        consensus_decimals: 9,
        paratime: ParatimeConfig {
            runtime_id: "000000000000000000000000000000000000000000000000f80306c9858e7279",
            staking_address: "oasis1qrd3mnzhhgst26hsp96uf45yhq6zlax0cuzdgcfc",
            decimals: 18,
            gas_price: 100,
            fee_gas: 70_000,
        },
    };

    /// Public testnet configuration.
    pub const TESTNET: Self = Self {
        network: Network::Testnet,
        grpc_endpoint: "https://testnet.grpc.oasis.io",
        consensus_decimals: 9,
        paratime: ParatimeConfig {
            runtime_id: "000000000000000000000000000000000000000000000000a6d1e3ebf60dff6c",
            staking_address: "oasis1qqczuf3x6glkgjuf0xgtcpjjw95r3crf7y2323xd",
            decimals: 18,
            gas_price: 100,
            fee_gas: 70_000,
        },
    };
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
