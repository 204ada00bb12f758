//! Per-network parameter tables.
//!
//! Parameters are configuration data, not behavior: genesis values, the
//! fixed compact target, peg thresholds and the versionbits deployment
//! table are consumed by the consensus core as opaque constants.

use crate::header::Header;
use crate::{BundleHash, SideBlockHash};
use bitcoin::hashes::Hash;
use bitcoin::{BlockHash, TxMerkleNode};
use hex_literal::hex;
use serde::{Deserialize, Serialize};

/// Supported networks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Network {
    /// The production sidechain.
    Main,
    /// Local regression testing.
    Regtest,
}

/// A versionbits soft-fork deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deployment {
    /// Deployment name.
    pub name: String,
    /// Version bit reserved for signalling.
    pub bit: u8,
    /// Start time for signalling.
    pub start_time: u32,
    /// Expiry time for signalling.
    pub timeout: u32,
    /// Per-deployment threshold override.
    pub threshold: Option<u32>,
    /// Per-deployment window override.
    pub window: Option<u32>,
    /// Whether activation is mandatory.
    pub required: bool,
    /// Whether the deployment activates regardless of signalling.
    pub force: bool,
}

impl Deployment {
    fn new(
        name: &str,
        bit: u8,
        start_time: u32,
        timeout: u32,
        threshold: Option<u32>,
        window: Option<u32>,
        required: bool,
        force: bool,
    ) -> Self {
        Self {
            name: name.to_owned(),
            bit,
            start_time,
            timeout,
            threshold,
            window,
            required,
            force,
        }
    }
}

/// BIP9 threshold state of a deployment at a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ThresholdState {
    Defined = 0,
    Started = 1,
    LockedIn = 2,
    Active = 3,
    Failed = 4,
}

impl ThresholdState {
    /// The state's storage byte.
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Parses a storage byte; out-of-range bytes are rejected.
    pub fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Self::Defined),
            1 => Some(Self::Started),
            2 => Some(Self::LockedIn),
            3 => Some(Self::Active),
            4 => Some(Self::Failed),
            _ => None,
        }
    }
}

/// Consensus parameters of a network.
#[derive(Debug, Clone)]
pub struct Params {
    /// Which network these parameters describe.
    pub network: Network,
    /// Fixed compact proof-of-work target. Retargeting is disabled, so the
    /// target is a per-network constant rather than a per-entry field.
    pub pow_bits: u32,
    /// This sidechain's slot number on the mainchain.
    pub sidechain_number: u8,
    /// Mainchain acknowledgement count required before a withdrawal bundle
    /// is considered spent.
    pub required_work_score: u32,
    /// Blocks a created bundle may wait for acknowledgement before it fails.
    pub bundle_fail_window: u32,
    /// Versionbits activation threshold within `miner_window`.
    pub activation_threshold: u32,
    /// Versionbits signalling window.
    pub miner_window: u32,
    /// Versionbits deployments.
    pub deployments: Vec<Deployment>,
    genesis_version: u32,
    genesis_time: u32,
    genesis_merkle_root: [u8; 32],
}

impl Params {
    /// Parameters for `network`.
    pub fn new(network: Network) -> Self {
        match network {
            Network::Main => Self {
                network,
                pow_bits: 486604799,
                sidechain_number: 0,
                required_work_score: 13150,
                bundle_fail_window: 26300,
                activation_threshold: 1916,
                miner_window: 2016,
                deployments: default_deployments(),
                genesis_version: 1,
                genesis_time: 1668664716,
                genesis_merkle_root: hex!(
                    "8a6be158deb38d5cc20aa8612ac303bb7ae59520d3b22213df5e88434f36b18e"
                ),
            },
            Network::Regtest => Self {
                network,
                pow_bits: 545259519,
                sidechain_number: 0,
                required_work_score: 8,
                bundle_fail_window: 16,
                activation_threshold: 108,
                miner_window: 144,
                deployments: default_deployments(),
                genesis_version: 1,
                genesis_time: 1624147757,
                genesis_merkle_root: hex!(
                    "3ba3edfd7a7b12b27ac72c3e67768f617fc81bc3888a51323a9fb8aa4b1e5e4a"
                ),
            },
        }
    }

    /// The network's genesis block header.
    pub fn genesis_header(&self) -> Header {
        Header {
            version: self.genesis_version,
            prev_block: SideBlockHash::all_zeros(),
            merkle_root: TxMerkleNode::from_byte_array(self.genesis_merkle_root),
            withdrawal_bundle: BundleHash::all_zeros(),
            mainchain_block: BlockHash::all_zeros(),
            time: self.genesis_time,
        }
    }

    /// Looks up a deployment by name.
    pub fn deployment(&self, name: &str) -> Option<&Deployment> {
        self.deployments.iter().find(|d| d.name == name)
    }
}

fn default_deployments() -> Vec<Deployment> {
    vec![
        Deployment::new("csv", 0, 1462060800, 1493596800, None, None, false, true),
        Deployment::new("segwit", 1, 1479168000, 1510704000, None, None, true, false),
        Deployment::new(
            "segsignal",
            4,
            1496275200,
            1510704000,
            Some(269),
            Some(336),
            false,
            false,
        ),
        Deployment::new(
            "testdummy",
            28,
            1199145601,
            1230767999,
            None,
            None,
            false,
            true,
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn genesis_headers_link_the_zero_hash() {
        for network in [Network::Main, Network::Regtest] {
            let params = Params::new(network);
            let genesis = params.genesis_header();
            assert_eq!(genesis.prev_block, SideBlockHash::all_zeros());
            assert_eq!(genesis.withdrawal_bundle, BundleHash::all_zeros());
        }
    }

    #[test]
    fn deployments_are_addressable_by_name() {
        let params = Params::new(Network::Main);
        let segwit = params.deployment("segwit").unwrap();
        assert_eq!(segwit.bit, 1);
        assert!(segwit.required);
        assert!(params.deployment("taproot").is_none());
    }

    #[test]
    fn threshold_state_round_trips_and_rejects_garbage() {
        for state in [
            ThresholdState::Defined,
            ThresholdState::Started,
            ThresholdState::LockedIn,
            ThresholdState::Active,
            ThresholdState::Failed,
        ] {
            assert_eq!(ThresholdState::from_u8(state.as_u8()), Some(state));
        }
        assert_eq!(ThresholdState::from_u8(5), None);
    }
}
