//! Runtime configuration of the payment subsystem.

use std::path::PathBuf;

use ingot_crypto::IngotKeyPair;
use ingot_types::OutPoint;

/// Node-level settings for masternode payment processing.
#[derive(Debug, Clone)]
pub struct PaymentsConfig {
    /// Protocol version fully-updated peers are expected to run.
    pub active_protocol: u32,
    /// Oldest protocol version still allowed to participate while the
    /// pay-updated-nodes spork is inactive.
    pub min_protocol_before_enforcement: u32,
    /// Lite nodes skip all masternode payment processing.
    pub lite_mode: bool,
    /// Directory holding this subsystem's cache files.
    pub data_dir: PathBuf,
    /// Network magic bytes, stamped into cache files so a testnet cache
    /// is never loaded on mainnet.
    pub network_magic: [u8; 4],
}

impl Default for PaymentsConfig {
    fn default() -> Self {
        Self {
            active_protocol: 70016,
            min_protocol_before_enforcement: 70015,
            lite_mode: false,
            data_dir: PathBuf::from("."),
            network_magic: *b"ingt",
        }
    }
}

/// The locally-running masternode, when this node is one: its collateral
/// outpoint and the operator key it signs votes with.
pub struct ActiveMasternode {
    pub vin: OutPoint,
    pub operator_keypair: IngotKeyPair,
}

impl ActiveMasternode {
    pub fn new(vin: OutPoint, operator_keypair: IngotKeyPair) -> Self {
        Self { vin, operator_keypair }
    }
}
