//! The payment manager: one instance per node, owning the vote ledger and
//! tying it to the host's chain, registry and peer services.

use std::collections::BTreeMap;
use std::sync::Mutex;

use log::debug;

use ingot_types::{Amount, Script, Tier, Transaction, TIER_MAX, TIER_MIN};

use crate::config::{ActiveMasternode, PaymentsConfig};
use crate::constants::{
    scaled_masternode_count, vote_retention_window, MASTERNODE_SYNC_MNW, SCHEDULE_LOOKAHEAD,
    VOTE_ANCHOR_DEPTH, VOTE_FUTURE_LIMIT,
};
use crate::host::{Host, MasternodeInfo, PeerId, SporkKey};
use crate::ledger::PaymentLedger;
use crate::net::Inventory;
use crate::winner::PaymentWinner;

pub struct MasternodePayments {
    pub(crate) config: PaymentsConfig,
    pub(crate) host: Host,
    pub(crate) ledger: PaymentLedger,
    /// When this node is a masternode: the identity it votes as.
    pub(crate) active: Option<ActiveMasternode>,
    /// Last height we emitted our own votes for. Guarded by a lock held
    /// across the whole election so two tip events for the same height
    /// cannot both elect.
    pub(crate) last_processed_height: Mutex<u64>,
}

impl MasternodePayments {
    pub fn new(config: PaymentsConfig, host: Host, active: Option<ActiveMasternode>) -> Self {
        Self {
            config,
            host,
            ledger: PaymentLedger::new(),
            active,
            last_processed_height: Mutex::new(0),
        }
    }

    pub fn ledger(&self) -> &PaymentLedger {
        &self.ledger
    }

    /// Oldest protocol version currently allowed to participate in
    /// payment voting.
    pub fn min_payments_protocol(&self) -> u32 {
        if self.host.sporks.is_active(SporkKey::PayUpdatedNodes) {
            self.config.active_protocol
        } else {
            self.config.min_protocol_before_enforcement
        }
    }

    /// Accepts a vote into the ledger. The vote must be anchored to a
    /// block we already know, 100 blocks below the voted height.
    pub fn accept_vote(&self, winner: &PaymentWinner) -> bool {
        let anchor_height = match winner.block_height.checked_sub(VOTE_ANCHOR_DEPTH) {
            Some(height) => height,
            None => return false,
        };
        if self.host.chain.block_hash_at(anchor_height).is_none() {
            return false;
        }
        self.ledger.accept_vote(winner)
    }

    pub fn get_payee(&self, height: u64, tier: Tier) -> Option<Script> {
        self.ledger.get_payee(height, tier)
    }

    /// Is this masternode due a payment in the next few blocks? Looks
    /// ahead [`SCHEDULE_LOOKAHEAD`] blocks past the tip.
    pub fn is_scheduled(&self, mn: &MasternodeInfo, not_block_height: u64) -> bool {
        let tip_height = match self.host.chain.try_tip_height() {
            Some(height) => height,
            None => return false,
        };

        let mn_payee = mn.payment_script();
        for height in tip_height..=tip_height + SCHEDULE_LOOKAHEAD {
            if height == not_block_height {
                continue;
            }
            if self.ledger.get_payee(height, mn.tier).as_ref() == Some(&mn_payee) {
                return true;
            }
        }
        false
    }

    /// Does `tx` satisfy the elected payments for `height`? Accepts when
    /// no votes exist for the height.
    pub fn is_transaction_valid(
        &self,
        tx: &Transaction,
        height: u64,
        block_value: Amount,
        is_proof_of_stake: bool,
    ) -> bool {
        match self.ledger.block_payees(height) {
            Some(payees) => payees.is_transaction_valid(tx, block_value, is_proof_of_stake, &self.host),
            None => true,
        }
    }

    /// Diagnostic payee list for `height`, routed to the budget when a
    /// superblock owns it.
    pub fn required_payments_string(&self, height: u64) -> String {
        if self.host.sporks.is_active(SporkKey::EnableSuperblocks)
            && self.host.budget.is_budget_payment_block(height)
        {
            return self.host.budget.required_payments_string(height);
        }
        match self.ledger.block_payees(height) {
            Some(payees) => payees.required_payments_string(),
            None => String::from("Unknown"),
        }
    }

    /// Prunes votes beyond the retention window behind the tip. A no-op
    /// when the chain lock is contended.
    pub fn clean_payment_list(&self) {
        let tip_height = match self.host.chain.try_tip_height() {
            Some(height) => height,
            None => return,
        };
        let retention = vote_retention_window(self.host.registry.size());
        self.ledger.clean(tip_height, retention, &*self.host.sync);
    }

    /// Answers a peer's `"mnget"`: announce our recent winners, then report
    /// how many we pushed.
    pub fn sync(&self, peer: PeerId, count_needed: u32) {
        let tip_height = match self.host.chain.try_tip_height() {
            Some(height) => height,
            None => return,
        };

        let mut depth_by_tier: BTreeMap<Tier, u64> = BTreeMap::new();
        for tier in TIER_MIN..=TIER_MAX {
            let enabled = scaled_masternode_count(self.host.registry.count_enabled(tier));
            depth_by_tier.insert(tier, enabled.min(count_needed as u64));
        }

        let ids = self
            .ledger
            .votes_for_sync(tip_height, &depth_by_tier, VOTE_FUTURE_LIMIT);
        let count = ids.len() as u32;
        for id in ids {
            self.host.peers.push_inventory(peer, Inventory::winner(id));
        }
        debug!("sync - pushed {} masternode winners to peer {}", count, peer);
        self.host.peers.push_sync_status(peer, MASTERNODE_SYNC_MNW, count);
    }

    /// One-line state summary, `"Votes: N, Blocks: M"`.
    pub fn summary(&self) -> String {
        self.ledger.summary()
    }
}
