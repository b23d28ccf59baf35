//! In-memory fakes of the host capabilities, for tests.
//!
//! Every fake is deliberately deterministic: ranks follow registry
//! insertion order, block hashes are digests of the height, rewards are a
//! fixed formula. Tests set up a [`FakeHost`], tweak the pieces they care
//! about, and build a [`MasternodePayments`] against it.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use ingot_crypto::hash::object_hash;
use ingot_crypto::IngotKeyPair;
use ingot_types::{Amount, Hash, OutPoint, Script, Tier, Transaction};

use crate::config::{ActiveMasternode, PaymentsConfig};
use crate::host::{
    BudgetTxStatus, BudgetView, ChainView, Economics, Host, MasternodeInfo, MasternodeRegistry,
    PeerId, PeerOps, SporkKey, SporkSet, SyncTracker, TreasuryView,
};
use crate::manager::MasternodePayments;
use crate::net::Inventory;
use crate::winner::PaymentWinner;

/// A chain whose block at height `h` hashes to `blake3(h)`. A tip of
/// `None` models a contended chain lock.
pub struct FakeChain {
    tip: Mutex<Option<u64>>,
}

impl FakeChain {
    pub fn new(tip: u64) -> Self {
        FakeChain { tip: Mutex::new(Some(tip)) }
    }

    pub fn set_tip(&self, tip: Option<u64>) {
        *self.tip.lock().unwrap() = tip;
    }

    pub fn hash_at(height: u64) -> Hash {
        object_hash(&height.to_le_bytes())
    }
}

impl ChainView for FakeChain {
    fn try_tip_height(&self) -> Option<u64> {
        *self.tip.lock().unwrap()
    }

    fn block_hash_at(&self, height: u64) -> Option<Hash> {
        let tip = (*self.tip.lock().unwrap())?;
        if height <= tip {
            Some(Self::hash_at(height))
        } else {
            None
        }
    }

    fn height_of(&self, hash: &Hash) -> Option<u64> {
        let tip = (*self.tip.lock().unwrap())?;
        (0..=tip).find(|height| Self::hash_at(*height) == *hash)
    }
}

/// Registry whose rank is 1-based insertion order among nodes meeting the
/// protocol floor, at every anchor height.
#[derive(Default)]
pub struct FakeRegistry {
    nodes: Mutex<Vec<MasternodeInfo>>,
}

impl FakeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, info: MasternodeInfo) {
        self.nodes.lock().unwrap().push(info);
    }
}

impl MasternodeRegistry for FakeRegistry {
    fn find(&self, vin: &OutPoint) -> Option<MasternodeInfo> {
        self.nodes.lock().unwrap().iter().find(|mn| &mn.vin == vin).cloned()
    }

    fn find_by_script(&self, script: &Script) -> Option<MasternodeInfo> {
        self.nodes
            .lock()
            .unwrap()
            .iter()
            .find(|mn| &mn.payment_script() == script)
            .cloned()
    }

    fn rank(&self, vin: &OutPoint, _anchor_height: u64, min_protocol: u32) -> Option<u32> {
        self.nodes
            .lock()
            .unwrap()
            .iter()
            .filter(|mn| mn.protocol_version >= min_protocol)
            .position(|mn| &mn.vin == vin)
            .map(|pos| pos as u32 + 1)
    }

    fn count_enabled(&self, tier: Tier) -> usize {
        self.nodes.lock().unwrap().iter().filter(|mn| mn.tier == tier).count()
    }

    fn size(&self) -> usize {
        self.nodes.lock().unwrap().len()
    }

    fn stable_size(&self) -> usize {
        self.nodes.lock().unwrap().len()
    }

    fn drift_allowance(&self) -> usize {
        0
    }

    fn next_in_queue(&self, _height: u64, tier: Tier, _only_enabled: bool) -> Option<MasternodeInfo> {
        self.nodes.lock().unwrap().iter().find(|mn| mn.tier == tier).cloned()
    }

    fn current_masternode(&self, tier: Tier) -> Option<MasternodeInfo> {
        self.nodes.lock().unwrap().iter().find(|mn| mn.tier == tier).cloned()
    }
}

/// Everything the subsystem asked of the peer layer, recorded in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerEvent {
    RequestedList(PeerId),
    RequestedMasternode(PeerId, OutPoint),
    PushedInventory(PeerId, Inventory),
    SyncStatus(PeerId, u32, u32),
    Misbehave(PeerId, u32),
    Relayed(Inventory),
}

pub struct RecordingPeers {
    events: Mutex<Vec<PeerEvent>>,
    versions: Mutex<HashMap<PeerId, u32>>,
    default_version: u32,
}

impl RecordingPeers {
    pub fn new(default_version: u32) -> Self {
        RecordingPeers {
            events: Mutex::new(Vec::new()),
            versions: Mutex::new(HashMap::new()),
            default_version,
        }
    }

    pub fn set_version(&self, peer: PeerId, version: u32) {
        self.versions.lock().unwrap().insert(peer, version);
    }

    pub fn events(&self) -> Vec<PeerEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn relayed_count(&self) -> usize {
        self.events()
            .iter()
            .filter(|event| matches!(event, PeerEvent::Relayed(_)))
            .count()
    }

    pub fn misbehavior_total(&self, peer: PeerId) -> u32 {
        self.events()
            .iter()
            .filter_map(|event| match event {
                PeerEvent::Misbehave(p, score) if *p == peer => Some(*score),
                _ => None,
            })
            .sum()
    }

    fn record(&self, event: PeerEvent) {
        self.events.lock().unwrap().push(event);
    }
}

impl PeerOps for RecordingPeers {
    fn protocol_version(&self, peer: PeerId) -> u32 {
        self.versions
            .lock()
            .unwrap()
            .get(&peer)
            .copied()
            .unwrap_or(self.default_version)
    }

    fn request_masternode_list(&self, peer: PeerId) {
        self.record(PeerEvent::RequestedList(peer));
    }

    fn request_masternode(&self, peer: PeerId, vin: &OutPoint) {
        self.record(PeerEvent::RequestedMasternode(peer, vin.clone()));
    }

    fn push_inventory(&self, peer: PeerId, inv: Inventory) {
        self.record(PeerEvent::PushedInventory(peer, inv));
    }

    fn push_sync_status(&self, peer: PeerId, item: u32, count: u32) {
        self.record(PeerEvent::SyncStatus(peer, item, count));
    }

    fn misbehave(&self, peer: PeerId, score: u32) {
        self.record(PeerEvent::Misbehave(peer, score));
    }

    fn relay_inventory(&self, inv: Inventory) {
        self.record(PeerEvent::Relayed(inv));
    }
}

pub struct FakeSync {
    blockchain_synced: AtomicBool,
    synced: AtomicBool,
    noted: Mutex<HashSet<Hash>>,
    forgotten: Mutex<usize>,
}

impl FakeSync {
    pub fn new() -> Self {
        FakeSync {
            blockchain_synced: AtomicBool::new(true),
            synced: AtomicBool::new(true),
            noted: Mutex::new(HashSet::new()),
            forgotten: Mutex::new(0),
        }
    }

    pub fn set_blockchain_synced(&self, synced: bool) {
        self.blockchain_synced.store(synced, Ordering::SeqCst);
    }

    pub fn set_synced(&self, synced: bool) {
        self.synced.store(synced, Ordering::SeqCst);
    }

    pub fn noted(&self, id: &Hash) -> bool {
        self.noted.lock().unwrap().contains(id)
    }

    pub fn forgotten_count(&self) -> usize {
        *self.forgotten.lock().unwrap()
    }
}

impl Default for FakeSync {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncTracker for FakeSync {
    fn is_blockchain_synced(&self) -> bool {
        self.blockchain_synced.load(Ordering::SeqCst)
    }

    fn is_synced(&self) -> bool {
        self.synced.load(Ordering::SeqCst)
    }

    fn note_winner(&self, id: &Hash) {
        self.noted.lock().unwrap().insert(*id);
    }

    fn forget_winner(&self, id: &Hash) {
        self.noted.lock().unwrap().remove(id);
        *self.forgotten.lock().unwrap() += 1;
    }
}

pub struct FakeBudget {
    budget_blocks: Mutex<HashSet<u64>>,
    status: Mutex<BudgetTxStatus>,
    cycle: u64,
}

impl FakeBudget {
    pub fn new() -> Self {
        FakeBudget {
            budget_blocks: Mutex::new(HashSet::new()),
            status: Mutex::new(BudgetTxStatus::Valid),
            cycle: 43_200,
        }
    }

    pub fn set_budget_block(&self, height: u64) {
        self.budget_blocks.lock().unwrap().insert(height);
    }

    pub fn set_status(&self, status: BudgetTxStatus) {
        *self.status.lock().unwrap() = status;
    }

    /// Marker script the fake budget pays to.
    pub fn budget_script() -> Script {
        vec![0xbb]
    }

    /// Marker script the fake treasury-fill pays to.
    pub fn treasury_fill_script() -> Script {
        vec![0xcc]
    }
}

impl Default for FakeBudget {
    fn default() -> Self {
        Self::new()
    }
}

impl BudgetView for FakeBudget {
    fn is_budget_payment_block(&self, height: u64) -> bool {
        self.budget_blocks.lock().unwrap().contains(&height)
    }

    fn is_transaction_valid(&self, _tx: &Transaction, _height: u64) -> BudgetTxStatus {
        *self.status.lock().unwrap()
    }

    fn fill_block_payee(
        &self,
        tx: &mut Transaction,
        _fees: Amount,
        _is_proof_of_stake: bool,
        block_value: &mut Amount,
    ) {
        tx.outputs.push(ingot_types::TxOutput::new(*block_value, Self::budget_script()));
    }

    fn fill_treasury_block_payee(
        &self,
        tx: &mut Transaction,
        _fees: Amount,
        _is_proof_of_stake: bool,
        block_value: &mut Amount,
    ) {
        tx.outputs
            .push(ingot_types::TxOutput::new(*block_value, Self::treasury_fill_script()));
    }

    fn required_payments_string(&self, _height: u64) -> String {
        String::from("budget")
    }

    fn cycle_blocks(&self) -> u64 {
        self.cycle
    }
}

pub struct FakeTreasury {
    blocks: Mutex<HashSet<u64>>,
    schedule: Mutex<Vec<(Script, u64)>>,
    award: Mutex<Amount>,
}

impl FakeTreasury {
    pub fn new() -> Self {
        FakeTreasury {
            blocks: Mutex::new(HashSet::new()),
            schedule: Mutex::new(Vec::new()),
            award: Mutex::new(0),
        }
    }

    pub fn set_treasury_block(&self, height: u64, schedule: Vec<(Script, u64)>, award: Amount) {
        self.blocks.lock().unwrap().insert(height);
        *self.schedule.lock().unwrap() = schedule;
        *self.award.lock().unwrap() = award;
    }
}

impl Default for FakeTreasury {
    fn default() -> Self {
        Self::new()
    }
}

impl TreasuryView for FakeTreasury {
    fn is_treasury_block(&self, height: u64) -> bool {
        self.blocks.lock().unwrap().contains(&height)
    }

    fn schedule(&self, _height: u64) -> Vec<(Script, u64)> {
        self.schedule.lock().unwrap().clone()
    }

    fn award(&self, _height: u64) -> Amount {
        *self.award.lock().unwrap()
    }
}

/// Spork values default to the far-future timestamp networks use for
/// "defined but never activated".
pub const SPORK_VALUE_INACTIVE: i64 = 4_070_908_800;

pub struct FakeSporks {
    active: Mutex<HashSet<SporkKey>>,
    values: Mutex<HashMap<SporkKey, i64>>,
}

impl FakeSporks {
    pub fn new() -> Self {
        FakeSporks {
            active: Mutex::new(HashSet::new()),
            values: Mutex::new(HashMap::new()),
        }
    }

    pub fn activate(&self, key: SporkKey) {
        self.active.lock().unwrap().insert(key);
        self.values.lock().unwrap().insert(key, 0);
    }

    pub fn deactivate(&self, key: SporkKey) {
        self.active.lock().unwrap().remove(&key);
        self.values.lock().unwrap().remove(&key);
    }

    pub fn set_value(&self, key: SporkKey, value: i64) {
        self.values.lock().unwrap().insert(key, value);
    }
}

impl Default for FakeSporks {
    fn default() -> Self {
        Self::new()
    }
}

impl SporkSet for FakeSporks {
    fn is_active(&self, key: SporkKey) -> bool {
        self.active.lock().unwrap().contains(&key)
    }

    fn value(&self, key: SporkKey) -> i64 {
        self.values
            .lock()
            .unwrap()
            .get(&key)
            .copied()
            .unwrap_or(SPORK_VALUE_INACTIVE)
    }
}

/// Fixed reward math: the block is worth `block_value` and a tier-`t`
/// masternode is owed `block_value * t / 10` of it.
pub struct FakeEconomics {
    pub block_value: Amount,
}

impl FakeEconomics {
    pub fn new() -> Self {
        FakeEconomics { block_value: 1000 }
    }

    pub fn payment_for(&self, tier: Tier) -> Amount {
        self.block_value * tier as Amount / 10
    }
}

impl Default for FakeEconomics {
    fn default() -> Self {
        Self::new()
    }
}

impl Economics for FakeEconomics {
    fn block_value(&self, _height: u64, _is_proof_of_stake: bool, _coin_age: u64) -> Amount {
        self.block_value
    }

    fn masternode_payment(
        &self,
        _height: u64,
        block_value: Amount,
        _is_proof_of_stake: bool,
        tier: Tier,
        _drift_count: usize,
        _has_zerocoin_spend: bool,
    ) -> Amount {
        block_value * tier as Amount / 10
    }

    fn coin_age(&self, _tx: &Transaction, _block_time: u64, _height: u64) -> u64 {
        0
    }
}

/// The full set of fakes plus the [`Host`] bundle over them.
pub struct FakeHost {
    pub chain: Arc<FakeChain>,
    pub registry: Arc<FakeRegistry>,
    pub peers: Arc<RecordingPeers>,
    pub sync: Arc<FakeSync>,
    pub budget: Arc<FakeBudget>,
    pub treasury: Arc<FakeTreasury>,
    pub sporks: Arc<FakeSporks>,
    pub economics: Arc<FakeEconomics>,
}

impl FakeHost {
    pub fn new(tip: u64) -> Self {
        let config = PaymentsConfig::default();
        FakeHost {
            chain: Arc::new(FakeChain::new(tip)),
            registry: Arc::new(FakeRegistry::new()),
            peers: Arc::new(RecordingPeers::new(config.active_protocol)),
            sync: Arc::new(FakeSync::new()),
            budget: Arc::new(FakeBudget::new()),
            treasury: Arc::new(FakeTreasury::new()),
            sporks: Arc::new(FakeSporks::new()),
            economics: Arc::new(FakeEconomics::new()),
        }
    }

    pub fn host(&self) -> Host {
        Host {
            chain: self.chain.clone(),
            registry: self.registry.clone(),
            peers: self.peers.clone(),
            sync: self.sync.clone(),
            budget: self.budget.clone(),
            treasury: self.treasury.clone(),
            sporks: self.sporks.clone(),
            economics: self.economics.clone(),
        }
    }

    pub fn payments(&self) -> MasternodePayments {
        MasternodePayments::new(PaymentsConfig::default(), self.host(), None)
    }

    pub fn payments_with_active(&self, active: ActiveMasternode) -> MasternodePayments {
        MasternodePayments::new(PaymentsConfig::default(), self.host(), Some(active))
    }
}

/// A registry entry plus the operator keypair that can sign for it.
pub struct TestMasternode {
    pub info: MasternodeInfo,
    pub keypair: IngotKeyPair,
}

impl TestMasternode {
    /// Builds a masternode whose collateral outpoint and collateral key
    /// are derived from `seed`, with a fresh operator keypair.
    pub fn new(seed: u8, tier: Tier) -> Self {
        let keypair = IngotKeyPair::generate();
        let info = MasternodeInfo {
            vin: OutPoint::new([seed; 32], 0),
            operator_key: keypair.public_key_bytes(),
            collateral_key: [seed ^ 0x55; 32],
            tier,
            protocol_version: PaymentsConfig::default().active_protocol,
        };
        TestMasternode { info, keypair }
    }

    pub fn active_masternode(&self) -> ActiveMasternode {
        let operator_keypair = IngotKeyPair::from_secret_bytes(&self.keypair.secret_bytes())
            .expect("re-importing our own secret cannot fail");
        ActiveMasternode::new(self.info.vin.clone(), operator_keypair)
    }

    /// A signed vote from this masternode electing `payee` for `height`.
    pub fn signed_vote(&self, height: u64, payee: &MasternodeInfo) -> PaymentWinner {
        let mut winner = PaymentWinner::new(self.info.vin.clone());
        winner.block_height = height;
        winner.add_payee(payee.payment_script(), payee.tier, payee.vin.clone());
        winner.sign(&self.keypair).expect("signing with own key cannot fail");
        winner
    }
}

/// Registers `count` tier-`tier` masternodes and returns them.
pub fn register_masternodes(host: &FakeHost, count: u8, tier: Tier) -> Vec<TestMasternode> {
    (1..=count)
        .map(|seed| {
            let mn = TestMasternode::new(seed, tier);
            host.registry.add(mn.info.clone());
            mn
        })
        .collect()
}

/// A plain coinbase paying `outputs`.
pub fn coinbase_with_outputs(outputs: Vec<ingot_types::TxOutput>) -> Transaction {
    Transaction::new(
        vec![ingot_types::TxInput {
            previous_output: OutPoint::null(),
            script_sig: vec![],
            sequence: 0,
        }],
        outputs,
    )
}

/// A PoW block whose coinbase pays `outputs`, chained onto the fake chain
/// at `prev_height`.
pub fn pow_block(prev_height: u64, outputs: Vec<ingot_types::TxOutput>) -> ingot_types::Block {
    ingot_types::Block {
        prev_block_hash: FakeChain::hash_at(prev_height),
        time: 1_700_000_000,
        transactions: vec![coinbase_with_outputs(outputs)],
    }
}
