//! Sweep identities and destinations.
//!
//! An [`Identity`] is the account being swept: the signer, its consensus
//! address, and (for the two-hop policy) the intermediate quarantine
//! account. Identities come from a [`KeySource`] -- a freshly generated
//! mnemonic for ephemeral receiving accounts, or a supplied mnemonic when
//! resuming a sweep of an existing account.
//!
//! A [`Destination`] is where the funds end up, on whichever layer the
//! policy targets.

use bip39::Mnemonic;
use rand_core::OsRng;
use signer::hd;
use signer::{Ed25519Signer, Signer};
use sweep_core::{ConsensusAddress, EvmAddress, Layer};

use crate::SweepError;

// ---------------------------------------------------------------------------
// KeySource
// ---------------------------------------------------------------------------

/// Where the sweep identity's key material comes from.
pub enum KeySource {
    /// Generate a fresh 24-word mnemonic. The caller must surface it to
    /// the operator: it is the only way to recover funds if the sweep
    /// is interrupted for good.
    Generate,
    /// Derive from an existing mnemonic (resume an interrupted sweep).
    FromMnemonic(Mnemonic),
}

/// Derivation account index of the primary sweep identity.
const PRIMARY_ACCOUNT: u32 = 0;

/// Derivation account index of the intermediate quarantine account.
const INTERMEDIATE_ACCOUNT: u32 = 1;

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// An account on the intermediate hop of a two-hop sweep.
pub struct IntermediateAccount<S> {
    pub signer: S,
    pub address: ConsensusAddress,
}

/// The account being swept.
pub struct Identity<S> {
    pub signer: S,
    pub address: ConsensusAddress,
    /// Retained so the operator can back it up; `None` when the identity
    /// was built from a bare signer.
    pub mnemonic: Option<Mnemonic>,
    pub intermediate: Option<IntermediateAccount<S>>,
}

impl Identity<Ed25519Signer> {
    /// Build an identity from a key source along the standard derivation
    /// path, optionally deriving the intermediate account as well.
    pub fn from_key_source(source: KeySource, with_intermediate: bool) -> Result<Self, SweepError> {
        let mnemonic = match source {
            KeySource::Generate => hd::generate_mnemonic(&mut OsRng),
            KeySource::FromMnemonic(mnemonic) => mnemonic,
        };

        let signer = hd::derive_signer(&mnemonic, PRIMARY_ACCOUNT)
            .map_err(|_| SweepError::KeyDerivationFailed)?;
        let address = ConsensusAddress::from_public_key(&signer.public_key());

        let intermediate = if with_intermediate {
            let signer = hd::derive_signer(&mnemonic, INTERMEDIATE_ACCOUNT)
                .map_err(|_| SweepError::KeyDerivationFailed)?;
            let address = ConsensusAddress::from_public_key(&signer.public_key());
            Some(IntermediateAccount { signer, address })
        } else {
            None
        };

        Ok(Self {
            signer,
            address,
            mnemonic: Some(mnemonic),
            intermediate,
        })
    }
}

impl<S: Signer> Identity<S> {
    /// Build an identity around an externally managed signer (hardware
    /// or remote). No mnemonic, no intermediate account.
    pub fn from_signer(signer: S) -> Self {
        let address = ConsensusAddress::from_public_key(&signer.public_key());
        Self {
            signer,
            address,
            mnemonic: None,
            intermediate: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Destination
// ---------------------------------------------------------------------------

/// Where swept funds are delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    /// An EVM account inside the paratime (deposit target).
    Paratime(EvmAddress),
    /// A consensus-layer account (withdraw/transfer target).
    Consensus(ConsensusAddress),
}

impl Destination {
    /// Parse a destination for the given layer. The address syntax is
    /// layer-specific: `0x...` for the paratime, bech32 for consensus.
    pub fn parse(layer: Layer, input: &str) -> Result<Self, SweepError> {
        match layer {
            Layer::Paratime => input
                .parse::<EvmAddress>()
                .map(Self::Paratime)
                .map_err(|_| SweepError::InvalidDestination),
            Layer::Consensus => input
                .parse::<ConsensusAddress>()
                .map(Self::Consensus)
                .map_err(|_| SweepError::InvalidDestination),
        }
    }

    /// The layer this destination lives on.
    pub fn layer(&self) -> Layer {
        match self {
            Self::Paratime(_) => Layer::Paratime,
            Self::Consensus(_) => Layer::Consensus,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
