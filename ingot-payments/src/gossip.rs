//! Gossip ingress for payment votes.
//!
//! Votes arrive from untrusted peers; everything here is rate-, rank- and
//! signature-checked before it reaches the ledger. Most rejections are
//! silent drops, since stale or duplicate votes are routine. Only a bad
//! signature from a known voter, or a vote from far outside the eligible
//! ranks, costs the peer misbehavior score.

use log::{debug, error};

use crate::constants::{
    scaled_masternode_count, MISBEHAVE_SCORE_INVALID_VOTE, VOTE_ANCHOR_DEPTH, VOTE_FUTURE_LIMIT,
    VOTING_RANK_SLACK, VOTING_TOP_RANK,
};
use crate::host::PeerId;
use crate::manager::MasternodePayments;
use crate::net::{Inventory, PaymentMessage};
use crate::winner::PaymentWinner;

impl MasternodePayments {
    /// Entry point for payment protocol messages from a peer.
    pub fn process_message(&self, peer: PeerId, message: PaymentMessage) {
        if self.config.lite_mode {
            return;
        }
        // Votes before header sync would sit unprunable in the ledger.
        if !self.host.sync.is_blockchain_synced() {
            return;
        }

        match message {
            PaymentMessage::SyncRequest { count_needed } => self.sync(peer, count_needed),
            PaymentMessage::Winner(winner) => self.process_winner(peer, winner),
        }
    }

    fn process_winner(&self, peer: PeerId, mut winner: PaymentWinner) {
        if self.host.peers.protocol_version(peer) < self.min_payments_protocol() {
            return;
        }

        let tip_height = match self.host.chain.try_tip_height() {
            Some(height) => height,
            None => return,
        };

        // Pre-tier peers name the payee by script only; resolve the vin
        // and tier from the registry.
        let was_legacy = winner.is_legacy();
        let payee_mn = if was_legacy {
            self.host.registry.find_by_script(&winner.payee)
        } else {
            self.host.registry.find(&winner.payee_vin)
        };

        match payee_mn {
            Some(mn) => {
                if was_legacy {
                    winner.payee_tier = mn.tier;
                    winner.payee_vin = mn.vin;
                }
            }
            None => {
                debug!(
                    "mnw - unknown payee from peer={} height={}",
                    peer, winner.block_height
                );
                if was_legacy {
                    self.host.peers.request_masternode_list(peer);
                } else {
                    self.host.peers.request_masternode(peer, &winner.payee_vin);
                }
                return;
            }
        }

        let id = winner.id();
        if self.ledger.has_vote(&id) {
            debug!("mnw - already seen, peer={} height={}", peer, winner.block_height);
            self.host.sync.note_winner(&id);
            return;
        }

        let depth =
            scaled_masternode_count(self.host.registry.count_enabled(winner.payee_tier));
        let first_block = tip_height.saturating_sub(depth);
        if winner.block_height < first_block
            || winner.block_height > tip_height + VOTE_FUTURE_LIMIT
        {
            debug!(
                "mnw - out of range, peer={} height={} window=[{}, {}]",
                peer,
                winner.block_height,
                first_block,
                tip_height + VOTE_FUTURE_LIMIT
            );
            return;
        }

        if !self.is_valid_winner(&winner, peer) {
            return;
        }

        if !self
            .ledger
            .can_vote(&winner.voter, winner.block_height, winner.payee_tier)
        {
            debug!(
                "mnw - masternode {} already voted, peer={} height={}",
                winner.voter, peer, winner.block_height
            );
            return;
        }

        let voter_mn = match self.host.registry.find(&winner.voter) {
            Some(mn) => mn,
            None => return,
        };
        if !winner.verify_signature(&voter_mn.operator_key) {
            if self.host.sync.is_synced() {
                error!("mnw - invalid signature from peer={}", peer);
                self.host.peers.misbehave(peer, MISBEHAVE_SCORE_INVALID_VOTE);
            }
            // it could just be a stale masternode record; refetch it
            self.host.peers.request_masternode(peer, &winner.voter);
            return;
        }

        debug!(
            "mnw - winning vote, peer={} height={} tier={}",
            peer, winner.block_height, winner.payee_tier
        );

        if self.accept_vote(&winner) {
            self.host.peers.relay_inventory(Inventory::winner(id));
            self.host.sync.note_winner(&id);
        }
    }

    /// Structural validity of a vote: the voter must be a known, current
    /// masternode ranked high enough at the anchor height.
    pub(crate) fn is_valid_winner(&self, winner: &PaymentWinner, peer: PeerId) -> bool {
        let mn = match self.host.registry.find(&winner.voter) {
            Some(mn) => mn,
            None => {
                debug!("is_valid_winner - unknown masternode {}", winner.voter);
                self.host.peers.request_masternode(peer, &winner.voter);
                return false;
            }
        };

        if mn.protocol_version < self.config.active_protocol {
            debug!(
                "is_valid_winner - masternode protocol too old {} - req {}",
                mn.protocol_version, self.config.active_protocol
            );
            return false;
        }

        let anchor_height = match winner.block_height.checked_sub(VOTE_ANCHOR_DEPTH) {
            Some(height) => height,
            None => return false,
        };
        let rank = match self.host.registry.rank(
            &winner.voter,
            anchor_height,
            self.config.active_protocol,
        ) {
            Some(rank) => rank,
            None => {
                debug!("is_valid_winner - unknown rank for masternode {}", winner.voter);
                return false;
            }
        };

        if rank > VOTING_TOP_RANK {
            // It's common for masternodes to mistakenly think they are in
            // the top 10; only punish the ones that are way off.
            if rank > VOTING_RANK_SLACK {
                debug!(
                    "is_valid_winner - masternode not in the top {} ({})",
                    VOTING_RANK_SLACK, rank
                );
                if self.host.sync.is_synced() {
                    self.host.peers.misbehave(peer, MISBEHAVE_SCORE_INVALID_VOTE);
                }
            }
            return false;
        }

        true
    }
}
