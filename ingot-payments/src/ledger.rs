//! The process-wide vote store: every accepted winner plus the per-height
//! tallies derived from them.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use log::debug;
use serde::{Deserialize, Serialize};

use ingot_types::{Hash, OutPoint, Script, Tier};

use crate::host::SyncTracker;
use crate::payees::BlockPayees;
use crate::winner::PaymentWinner;

#[derive(Default)]
struct VoteStore {
    by_id: HashMap<Hash, PaymentWinner>,
    /// Most recent height each `(voter, tier)` has voted for.
    last_vote: HashMap<(OutPoint, Tier), u64>,
}

#[derive(Default)]
struct TallyStore {
    by_height: HashMap<u64, BlockPayees>,
}

/// Serialized form of the ledger: the two maps. The voter history is
/// rebuilt from the votes on load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub votes: HashMap<Hash, PaymentWinner>,
    pub blocks: HashMap<u64, BlockPayees>,
}

/// Thread-safe store of payment votes and tallies.
///
/// Two locks guard the state: votes (with voter history) and tallies,
/// always taken in that order. Only combined operations are exposed, so
/// callers cannot interleave the locks themselves.
#[derive(Default)]
pub struct PaymentLedger {
    votes: Mutex<VoteStore>,
    tallies: Mutex<TallyStore>,
}

impl PaymentLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ingests an already-validated vote. Returns `false` without mutation
    /// when the vote is already known. The vote, its tally entry and the
    /// voter history are updated under both locks, so readers never see a
    /// partial ingest.
    pub fn accept_vote(&self, winner: &PaymentWinner) -> bool {
        let id = winner.id();
        let mut votes = self.votes.lock().unwrap();
        if votes.by_id.contains_key(&id) {
            return false;
        }

        let mut tallies = self.tallies.lock().unwrap();
        votes.by_id.insert(id, winner.clone());

        tallies
            .by_height
            .entry(winner.block_height)
            .or_insert_with(|| BlockPayees::new(winner.block_height))
            .add_payee(
                winner.payee_tier,
                winner.payee.clone(),
                winner.payee_vin.clone(),
                1,
            );

        let key = (winner.voter.clone(), winner.payee_tier);
        let last = votes.last_vote.entry(key).or_insert(0);
        if winner.block_height > *last {
            *last = winner.block_height;
        }
        true
    }

    pub fn has_vote(&self, id: &Hash) -> bool {
        self.votes.lock().unwrap().by_id.contains_key(id)
    }

    pub fn vote_count(&self) -> usize {
        self.votes.lock().unwrap().by_id.len()
    }

    /// A voter may cast one vote per tier per height, and only for heights
    /// above anything it has voted for before.
    pub fn can_vote(&self, voter: &OutPoint, block_height: u64, tier: Tier) -> bool {
        let votes = self.votes.lock().unwrap();
        match votes.last_vote.get(&(voter.clone(), tier)) {
            Some(&last) => last < block_height,
            None => true,
        }
    }

    /// The elected payee of `tier` at `height`, if any votes exist.
    pub fn get_payee(&self, height: u64, tier: Tier) -> Option<Script> {
        let tallies = self.tallies.lock().unwrap();
        tallies.by_height.get(&height).and_then(|p| p.get_payee(tier))
    }

    /// Clone of the full tally at `height`.
    pub fn block_payees(&self, height: u64) -> Option<BlockPayees> {
        self.tallies.lock().unwrap().by_height.get(&height).cloned()
    }

    /// Ids of votes a syncing peer should be told about: per tier, votes
    /// no deeper below the tip than that tier's limit, and at most
    /// [`crate::constants::VOTE_FUTURE_LIMIT`] ahead.
    pub fn votes_for_sync(
        &self,
        tip_height: u64,
        depth_by_tier: &BTreeMap<Tier, u64>,
        future_limit: u64,
    ) -> Vec<Hash> {
        let votes = self.votes.lock().unwrap();
        votes
            .by_id
            .iter()
            .filter(|(_, winner)| {
                let depth = depth_by_tier.get(&winner.payee_tier).copied().unwrap_or(0);
                winner.block_height >= tip_height.saturating_sub(depth)
                    && winner.block_height <= tip_height + future_limit
            })
            .map(|(id, _)| *id)
            .collect()
    }

    /// Drops votes buried deeper than `retention` below the tip, together
    /// with the whole tally bucket of each expired height. Never prunes
    /// forward.
    pub fn clean(&self, tip_height: u64, retention: u64, sync: &dyn SyncTracker) {
        let mut votes = self.votes.lock().unwrap();
        let mut tallies = self.tallies.lock().unwrap();

        let expired: Vec<Hash> = votes
            .by_id
            .iter()
            .filter(|(_, winner)| {
                tip_height
                    .checked_sub(winner.block_height)
                    .map(|depth| depth > retention)
                    .unwrap_or(false)
            })
            .map(|(id, _)| *id)
            .collect();

        for id in expired {
            if let Some(winner) = votes.by_id.remove(&id) {
                debug!(
                    "clean - removing old masternode payment vote, block {}",
                    winner.block_height
                );
                tallies.by_height.remove(&winner.block_height);
                sync.forget_winner(&id);
            }
        }
    }

    pub fn oldest_block(&self) -> Option<u64> {
        self.tallies.lock().unwrap().by_height.keys().min().copied()
    }

    pub fn newest_block(&self) -> Option<u64> {
        self.tallies.lock().unwrap().by_height.keys().max().copied()
    }

    /// One-line state summary for startup and RPC logs.
    pub fn summary(&self) -> String {
        let votes = self.votes.lock().unwrap().by_id.len();
        let blocks = self.tallies.lock().unwrap().by_height.len();
        format!("Votes: {}, Blocks: {}", votes, blocks)
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        let votes = self.votes.lock().unwrap();
        let tallies = self.tallies.lock().unwrap();
        LedgerSnapshot {
            votes: votes.by_id.clone(),
            blocks: tallies.by_height.clone(),
        }
    }

    /// Replaces the ledger contents with a snapshot, rebuilding the voter
    /// history from the votes themselves.
    pub fn load(&self, snapshot: LedgerSnapshot) {
        let mut votes = self.votes.lock().unwrap();
        let mut tallies = self.tallies.lock().unwrap();

        votes.last_vote.clear();
        for winner in snapshot.votes.values() {
            let key = (winner.voter.clone(), winner.payee_tier);
            let last = votes.last_vote.entry(key).or_insert(0);
            if winner.block_height > *last {
                *last = winner.block_height;
            }
        }
        votes.by_id = snapshot.votes;
        tallies.by_height = snapshot.blocks;
    }

    pub fn clear(&self) {
        let mut votes = self.votes.lock().unwrap();
        let mut tallies = self.tallies.lock().unwrap();
        votes.by_id.clear();
        votes.last_vote.clear();
        tallies.by_height.clear();
    }
}
