//! The election loop: on each new tip, a top-ranked masternode signs and
//! broadcasts its choice of next winner for every tier.

use log::{debug, info, warn};

use ingot_types::{TIER_MAX, TIER_MIN};

use crate::constants::{VOTE_ANCHOR_DEPTH, VOTING_TOP_RANK};
use crate::manager::MasternodePayments;
use crate::net::Inventory;
use crate::winner::PaymentWinner;

impl MasternodePayments {
    /// Runs one election for `block_height`. Returns `true` when at least
    /// one vote was produced and relayed. The election lock is held for
    /// the duration, so a second tip event for the same height aborts.
    pub fn process_block(&self, block_height: u64) -> bool {
        let active = match &self.active {
            Some(active) => active,
            None => return false,
        };

        let mut last_height = self.last_processed_height.lock().unwrap();
        if block_height <= *last_height {
            return false;
        }

        let anchor_height = match block_height.checked_sub(VOTE_ANCHOR_DEPTH) {
            Some(height) => height,
            None => return false,
        };
        let rank = match self.host.registry.rank(
            &active.vin,
            anchor_height,
            self.config.active_protocol,
        ) {
            Some(rank) => rank,
            None => {
                debug!("process_block - own masternode {} has no rank yet", active.vin);
                return false;
            }
        };
        if rank > VOTING_TOP_RANK {
            debug!(
                "process_block - masternode not in the top {} ({})",
                VOTING_TOP_RANK, rank
            );
            return false;
        }

        info!(
            "process_block - start height {} vin {}",
            block_height, active.vin
        );

        let mut winners: Vec<PaymentWinner> = Vec::new();

        if self.host.budget.is_budget_payment_block(block_height) {
            // budget payment block; the budgeting subsystem owns it
        } else {
            for tier in TIER_MIN..=TIER_MAX {
                let mn = match self.host.registry.next_in_queue(block_height, tier, true) {
                    Some(mn) => mn,
                    None => {
                        debug!(
                            "process_block - failed to find tier {} masternode to pay",
                            tier
                        );
                        continue;
                    }
                };

                let mut winner = PaymentWinner::new(active.vin.clone());
                winner.block_height = block_height;
                winner.add_payee(mn.payment_script(), tier, mn.vin);

                if let Err(err) = winner.sign(&active.operator_keypair) {
                    warn!("process_block - failed to sign tier {} winner: {}", tier, err);
                    continue;
                }

                if !self.accept_vote(&winner) {
                    continue;
                }

                info!(
                    "process_block - winner height {} tier {} payee {}",
                    block_height,
                    tier,
                    ingot_types::script_to_string(&winner.payee)
                );
                winners.push(winner);
            }
        }

        if winners.is_empty() {
            return false;
        }

        for winner in &winners {
            self.host.peers.relay_inventory(Inventory::winner(winner.id()));
        }

        *last_height = block_height;
        true
    }
}
