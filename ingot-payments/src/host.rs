//! Capabilities the host node injects into the payment subsystem.
//!
//! The chain, registry, budget, treasury, sporks, reward math, peer
//! transport and sync tracker are all owned elsewhere in the node. The
//! subsystem reaches them only through these traits, which keeps the
//! dependency graph one-directional and lets tests run against in-memory
//! fakes (see [`crate::testutil`]).

use std::sync::Arc;

use ingot_types::{script_for_pubkey, Amount, Hash, OutPoint, Script, Tier, Transaction};

use crate::net::Inventory;

/// Identifies a connected peer. The transport owns the socket; we only
/// ever address peers by id.
pub type PeerId = u64;

/// A registry record for one masternode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MasternodeInfo {
    /// The collateral outpoint that names this masternode.
    pub vin: OutPoint,
    /// Key the operator signs gossip messages with.
    pub operator_key: [u8; 32],
    /// Key holding the collateral; payments go to its script.
    pub collateral_key: [u8; 32],
    pub tier: Tier,
    pub protocol_version: u32,
}

impl MasternodeInfo {
    /// The script this masternode is paid to.
    pub fn payment_script(&self) -> Script {
        script_for_pubkey(&self.collateral_key)
    }
}

/// Read access to the active chain.
///
/// The chain lock is a bigger lock than ours and is never waited on:
/// `try_tip_height` returns `None` on contention and the caller gives up
/// the operation, which the eventually-consistent vote model tolerates.
pub trait ChainView: Send + Sync {
    /// Height of the active tip, or `None` when the chain lock is
    /// contended or no chain exists yet.
    fn try_tip_height(&self) -> Option<u64>;
    /// Hash of the active-chain block at `height`, if known.
    fn block_hash_at(&self, height: u64) -> Option<Hash>;
    /// Height of a known block hash, active chain or not.
    fn height_of(&self, hash: &Hash) -> Option<u64>;
}

/// The masternode registry: membership, deterministic ranking, payment
/// queue. Owned by the masternode manager.
pub trait MasternodeRegistry: Send + Sync {
    fn find(&self, vin: &OutPoint) -> Option<MasternodeInfo>;
    /// Resolve a masternode by its payment script. Needed for votes from
    /// peers that predate the tiered-winner format.
    fn find_by_script(&self, script: &Script) -> Option<MasternodeInfo>;
    /// Deterministic rank of `vin` at `anchor_height` among masternodes
    /// running at least `min_protocol`. `None` when the node is unknown
    /// or the anchor is not buried yet.
    fn rank(&self, vin: &OutPoint, anchor_height: u64, min_protocol: u32) -> Option<u32>;
    fn count_enabled(&self, tier: Tier) -> usize;
    fn size(&self) -> usize;
    /// Masternode count ignoring recently-activated nodes.
    fn stable_size(&self) -> usize;
    /// Slack added to the count when computing required payments, to
    /// tolerate peers seeing slightly different registries.
    fn drift_allowance(&self) -> usize;
    /// The masternode next in line for payment at `height` in `tier`.
    fn next_in_queue(&self, height: u64, tier: Tier, only_enabled: bool) -> Option<MasternodeInfo>;
    /// The live top-ranked masternode of `tier`, used as a fallback payee
    /// when no votes exist for a height.
    fn current_masternode(&self, tier: Tier) -> Option<MasternodeInfo>;
}

/// Narrow peer capability handed to message processing. No peer object
/// ever crosses into this subsystem.
pub trait PeerOps: Send + Sync {
    fn protocol_version(&self, peer: PeerId) -> u32;
    /// Ask a peer for a full masternode list refresh. Implementations
    /// throttle this to one request per peer per 3 hours.
    fn request_masternode_list(&self, peer: PeerId);
    /// Ask a peer for a single masternode record.
    fn request_masternode(&self, peer: PeerId, vin: &OutPoint);
    fn push_inventory(&self, peer: PeerId, inv: Inventory);
    /// Send a `"ssc"` sync-status count for the given sync item.
    fn push_sync_status(&self, peer: PeerId, item: u32, count: u32);
    fn misbehave(&self, peer: PeerId, score: u32);
    /// Announce an inventory item to all connected peers.
    fn relay_inventory(&self, inv: Inventory);
}

/// Progress of our own sync with the network.
pub trait SyncTracker: Send + Sync {
    /// Headers are caught up; gossip may be ingested.
    fn is_blockchain_synced(&self) -> bool;
    /// All masternode data is caught up; enforcement may rely on it.
    fn is_synced(&self) -> bool;
    /// Record that a winner id has been seen, for sync accounting.
    fn note_winner(&self, id: &Hash);
    /// Drop a winner id from sync accounting after pruning.
    fn forget_winner(&self, id: &Hash);
}

/// Outcome of validating a transaction against a finalized budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudgetTxStatus {
    Valid,
    Invalid,
    /// The same proposal would be paid twice.
    DoublePayment,
    /// Not enough masternode votes behind any finalized budget.
    VoteThreshold,
}

/// The governance/budget subsystem ("superblocks").
pub trait BudgetView: Send + Sync {
    fn is_budget_payment_block(&self, height: u64) -> bool;
    fn is_transaction_valid(&self, tx: &Transaction, height: u64) -> BudgetTxStatus;
    fn fill_block_payee(&self, tx: &mut Transaction, fees: Amount, is_proof_of_stake: bool, block_value: &mut Amount);
    fn fill_treasury_block_payee(&self, tx: &mut Transaction, fees: Amount, is_proof_of_stake: bool, block_value: &mut Amount);
    fn required_payments_string(&self, height: u64) -> String;
    /// Length of one budget cycle in blocks.
    fn cycle_blocks(&self) -> u64;
}

/// The hard-coded treasury schedule.
pub trait TreasuryView: Send + Sync {
    fn is_treasury_block(&self, height: u64) -> bool;
    /// `(script, percent)` splits of the treasury award at `height`.
    fn schedule(&self, height: u64) -> Vec<(Script, u64)>;
    fn award(&self, height: u64) -> Amount;
}

/// Network policy toggles read by this subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum SporkKey {
    MasternodePaymentEnforcement = 8,
    BudgetEnforcement = 9,
    PayUpdatedNodes = 10,
    EnableSuperblocks = 13,
    TreasuryEnforcement = 17,
    NewMasternodeTiers = 18,
}

pub trait SporkSet: Send + Sync {
    fn is_active(&self, key: SporkKey) -> bool;
    /// Raw spork value; for enforcement sporks this is the activation
    /// timestamp.
    fn value(&self, key: SporkKey) -> i64;
}

/// Block reward and masternode payment math.
pub trait Economics: Send + Sync {
    fn block_value(&self, height: u64, is_proof_of_stake: bool, coin_age: u64) -> Amount;
    /// The payment owed to a tier-`tier` masternode out of `block_value`,
    /// given `drift_count` masternodes assumed by the payer.
    fn masternode_payment(
        &self,
        height: u64,
        block_value: Amount,
        is_proof_of_stake: bool,
        tier: Tier,
        drift_count: usize,
        has_zerocoin_spend: bool,
    ) -> Amount;
    /// Coin age consumed by a coinstake, an input to `block_value`.
    fn coin_age(&self, tx: &Transaction, block_time: u64, height: u64) -> u64;
}

/// The bundle of host capabilities the payment subsystem runs against.
#[derive(Clone)]
pub struct Host {
    pub chain: Arc<dyn ChainView>,
    pub registry: Arc<dyn MasternodeRegistry>,
    pub peers: Arc<dyn PeerOps>,
    pub sync: Arc<dyn SyncTracker>,
    pub budget: Arc<dyn BudgetView>,
    pub treasury: Arc<dyn TreasuryView>,
    pub sporks: Arc<dyn SporkSet>,
    pub economics: Arc<dyn Economics>,
}
