//! Consensus checks on incoming blocks: are the right payees paid, and is
//! the minted value within bounds?

use log::{debug, warn};

use ingot_types::{Amount, Block};

use crate::host::{BudgetTxStatus, SporkKey};
use crate::manager::MasternodePayments;

impl MasternodePayments {
    /// Does the block at `height` pay the payees the network elected?
    ///
    /// Consensus-critical: every node must answer identically, or the
    /// chain forks. When this node lacks the data to judge (not yet
    /// synced, no votes for the height), it accepts.
    pub fn is_block_payee_valid(&self, block: &Block, height: u64) -> bool {
        if !self.host.sync.is_synced() {
            debug!("is_block_payee_valid - client not synced, skipping payee checks");
            return true;
        }

        let is_proof_of_stake = block.is_proof_of_stake();
        let tx = match block.reward_transaction() {
            Some(tx) => tx,
            None => return true,
        };

        if self.host.sporks.is_active(SporkKey::EnableSuperblocks)
            && self.host.budget.is_budget_payment_block(height)
        {
            match self.host.budget.is_transaction_valid(tx, height) {
                BudgetTxStatus::Valid => return true,
                BudgetTxStatus::Invalid => {
                    warn!("is_block_payee_valid - invalid budget payment at height {}", height);
                    if self.host.sporks.is_active(SporkKey::BudgetEnforcement) {
                        return false;
                    }
                    warn!("is_block_payee_valid - budget enforcement is disabled, accepting block");
                }
                // A double budget payment or a budget without enough votes
                // falls through: a masternode gets the slot instead.
                BudgetTxStatus::DoublePayment | BudgetTxStatus::VoteThreshold => {}
            }
        }

        let coin_age = if is_proof_of_stake {
            self.host.economics.coin_age(tx, block.time, height)
        } else {
            0
        };
        let block_value = self.host.economics.block_value(height, is_proof_of_stake, coin_age);

        // Treasury blocks carry no masternode payment; their outputs are
        // checked by is_block_value_valid.
        if !self.host.treasury.is_treasury_block(height) {
            if self.is_transaction_valid(tx, height, block_value, is_proof_of_stake) {
                return true;
            }
            warn!("is_block_payee_valid - invalid mn payment at height {}", height);

            if self.host.sporks.is_active(SporkKey::MasternodePaymentEnforcement) {
                return false;
            }
            warn!("is_block_payee_valid - masternode payment enforcement is disabled, accepting block");
        }

        true
    }

    /// Is the minted value of `block` within what the schedule allows?
    /// Treasury splits are checked here; budget superblocks check their
    /// own value elsewhere.
    pub fn is_block_value_valid(
        &self,
        block: &Block,
        expected_value: Amount,
        minted_value: Amount,
    ) -> bool {
        let tip_height = match self.host.chain.try_tip_height() {
            Some(height) => height,
            None => return true,
        };

        let height = if self.host.chain.block_hash_at(tip_height) == Some(block.prev_block_hash)
        {
            tip_height + 1
        } else {
            // out of order
            match self.host.chain.height_of(&block.prev_block_hash) {
                Some(prev_height) => prev_height + 1,
                None => 0,
            }
        };

        if height == 0 {
            warn!("is_block_value_valid - couldn't find previous block");
        }

        if self.host.treasury.is_treasury_block(height) && !self.treasury_outputs_valid(block, height) {
            return false;
        }

        if !self.host.sync.is_synced() {
            // Superblocks always land early in a budget cycle; without
            // sync data we cannot tell them apart, so give that window a
            // pass.
            if height % self.host.budget.cycle_blocks() < 100 {
                true
            } else {
                minted_value <= expected_value
            }
        } else {
            if !self.host.sporks.is_active(SporkKey::EnableSuperblocks) {
                return minted_value <= expected_value;
            }
            if self.host.budget.is_budget_payment_block(height) {
                // the value of a budget block is evaluated with the budget
                true
            } else {
                minted_value <= expected_value
            }
        }
    }

    /// Checks the hard-coded treasury split at `height` against the reward
    /// transaction. Only rejects while treasury enforcement is active for
    /// the block's timestamp.
    fn treasury_outputs_valid(&self, block: &Block, height: u64) -> bool {
        let tx = match block.reward_transaction() {
            Some(tx) => tx,
            None => return true,
        };

        let award = self.host.treasury.award(height);
        let schedule = self.host.treasury.schedule(height);

        let mut found = 0usize;
        for (script, percent) in &schedule {
            let required = award * percent / 100;
            if tx
                .outputs
                .iter()
                .any(|out| &out.script_pubkey == script && out.value == required)
            {
                found += 1;
            }
        }

        if found != schedule.len() {
            warn!("is_block_value_valid - invalid treasury payment at height {}", height);
            if (block.time as i64) > self.host.sporks.value(SporkKey::TreasuryEnforcement) {
                return false;
            }
            warn!("is_block_value_valid - treasury enforcement is not enabled, accept anyway");
        } else {
            debug!("is_block_value_valid - valid treasury payment at height {}", height);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use ingot_types::TxOutput;

    use crate::testutil::{pow_block, register_masternodes, FakeHost};

    use super::*;

    /// A manager whose ledger holds ten votes for height 1010, tier 4:
    /// seven electing payee A, three payee B. Only A clears the six-vote
    /// enforcement threshold.
    fn payments_with_votes(host: &FakeHost) -> (MasternodePayments, Vec<u8>, Vec<u8>) {
        let nodes = register_masternodes(host, 12, 4);
        let payments = host.payments();
        for voter in 0..7 {
            assert!(payments.accept_vote(&nodes[voter].signed_vote(1010, &nodes[10].info)));
        }
        for voter in 7..10 {
            assert!(payments.accept_vote(&nodes[voter].signed_vote(1010, &nodes[11].info)));
        }
        let payee_a = nodes[10].info.payment_script();
        let payee_b = nodes[11].info.payment_script();
        (payments, payee_a, payee_b)
    }

    #[test]
    fn test_block_paying_elected_winner_is_valid() {
        let host = FakeHost::new(1000);
        let (payments, payee_a, _) = payments_with_votes(&host);
        host.sporks.activate(SporkKey::MasternodePaymentEnforcement);

        let block = pow_block(1009, vec![TxOutput::new(600, vec![0x99]), TxOutput::new(400, payee_a)]);
        assert!(payments.is_block_payee_valid(&block, 1010));
    }

    #[test]
    fn test_block_paying_wrong_payee_is_rejected_under_enforcement() {
        let host = FakeHost::new(1000);
        let (payments, _, _) = payments_with_votes(&host);
        host.sporks.activate(SporkKey::MasternodePaymentEnforcement);

        let block = pow_block(1009, vec![TxOutput::new(600, vec![0x99]), TxOutput::new(400, vec![0xcf])]);
        assert!(!payments.is_block_payee_valid(&block, 1010));
    }

    #[test]
    fn test_wrong_payee_accepted_without_enforcement() {
        let host = FakeHost::new(1000);
        let (payments, _, _) = payments_with_votes(&host);

        let block = pow_block(1009, vec![TxOutput::new(600, vec![0x99]), TxOutput::new(400, vec![0xcf])]);
        assert!(payments.is_block_payee_valid(&block, 1010));
    }

    #[test]
    fn test_underpaying_elected_winner_is_rejected() {
        let host = FakeHost::new(1000);
        let (payments, payee_a, _) = payments_with_votes(&host);
        host.sporks.activate(SporkKey::MasternodePaymentEnforcement);

        let block = pow_block(1009, vec![TxOutput::new(601, vec![0x99]), TxOutput::new(399, payee_a)]);
        assert!(!payments.is_block_payee_valid(&block, 1010));
    }

    #[test]
    fn test_minority_payee_is_rejected() {
        let host = FakeHost::new(1000);
        let (payments, _, payee_b) = payments_with_votes(&host);
        host.sporks.activate(SporkKey::MasternodePaymentEnforcement);

        // B has three votes, below the six-vote threshold; A is required
        let block = pow_block(1009, vec![TxOutput::new(600, vec![0x99]), TxOutput::new(400, payee_b)]);
        assert!(!payments.is_block_payee_valid(&block, 1010));
    }

    #[test]
    fn test_accepted_when_not_synced() {
        let host = FakeHost::new(1000);
        let (payments, _, _) = payments_with_votes(&host);
        host.sporks.activate(SporkKey::MasternodePaymentEnforcement);
        host.sync.set_synced(false);

        let block = pow_block(1009, vec![TxOutput::new(1000, vec![0x99])]);
        assert!(payments.is_block_payee_valid(&block, 1010));
    }

    #[test]
    fn test_accepted_when_no_votes_for_height() {
        let host = FakeHost::new(1000);
        let (payments, _, _) = payments_with_votes(&host);
        host.sporks.activate(SporkKey::MasternodePaymentEnforcement);

        let block = pow_block(1010, vec![TxOutput::new(1000, vec![0x99])]);
        assert!(payments.is_block_payee_valid(&block, 1011));
    }

    #[test]
    fn test_votes_below_threshold_accept_any_payee() {
        let host = FakeHost::new(1000);
        let nodes = register_masternodes(&host, 5, 4);
        let payments = host.payments();
        host.sporks.activate(SporkKey::MasternodePaymentEnforcement);

        for voter in 0..5 {
            assert!(payments.accept_vote(&nodes[voter].signed_vote(1010, &nodes[0].info)));
        }

        let block = pow_block(1009, vec![TxOutput::new(1000, vec![0x99])]);
        assert!(payments.is_block_payee_valid(&block, 1010));
    }

    #[test]
    fn test_valid_budget_block_accepted() {
        let host = FakeHost::new(1000);
        let (payments, _, _) = payments_with_votes(&host);
        host.sporks.activate(SporkKey::EnableSuperblocks);
        host.sporks.activate(SporkKey::MasternodePaymentEnforcement);
        host.budget.set_budget_block(1010);

        // pays nobody we elected, but the budget approves it
        let block = pow_block(1009, vec![TxOutput::new(5000, vec![0x42])]);
        assert!(payments.is_block_payee_valid(&block, 1010));
    }

    #[test]
    fn test_invalid_budget_block_rejected_under_enforcement() {
        let host = FakeHost::new(1000);
        let (payments, _, _) = payments_with_votes(&host);
        host.sporks.activate(SporkKey::EnableSuperblocks);
        host.sporks.activate(SporkKey::BudgetEnforcement);
        host.budget.set_budget_block(1010);
        host.budget.set_status(BudgetTxStatus::Invalid);

        let block = pow_block(1009, vec![TxOutput::new(5000, vec![0x42])]);
        assert!(!payments.is_block_payee_valid(&block, 1010));
    }

    #[test]
    fn test_unfunded_budget_slot_falls_back_to_masternode_payment() {
        let host = FakeHost::new(1000);
        let (payments, payee_a, _) = payments_with_votes(&host);
        host.sporks.activate(SporkKey::EnableSuperblocks);
        host.sporks.activate(SporkKey::MasternodePaymentEnforcement);
        host.budget.set_budget_block(1010);
        host.budget.set_status(BudgetTxStatus::VoteThreshold);

        let bad = pow_block(1009, vec![TxOutput::new(1000, vec![0x42])]);
        assert!(!payments.is_block_payee_valid(&bad, 1010));

        let good = pow_block(1009, vec![TxOutput::new(600, vec![0x42]), TxOutput::new(400, payee_a)]);
        assert!(payments.is_block_payee_valid(&good, 1010));
    }

    #[test]
    fn test_treasury_block_skips_masternode_check() {
        let host = FakeHost::new(1000);
        let (payments, _, _) = payments_with_votes(&host);
        host.sporks.activate(SporkKey::MasternodePaymentEnforcement);
        host.treasury.set_treasury_block(1010, vec![(vec![0xdd], 100)], 200);

        // pays no masternode at all; the treasury owns this height
        let block = pow_block(1009, vec![TxOutput::new(1000, vec![0x99])]);
        assert!(payments.is_block_payee_valid(&block, 1010));
    }

    #[test]
    fn test_block_value_within_expected() {
        let host = FakeHost::new(1000);
        let payments = host.payments();

        let block = pow_block(1000, vec![TxOutput::new(1000, vec![0x99])]);
        assert!(payments.is_block_value_valid(&block, 1000, 1000));
        assert!(!payments.is_block_value_valid(&block, 1000, 1001));
    }

    #[test]
    fn test_budget_block_value_deferred_to_budget() {
        let host = FakeHost::new(1000);
        let payments = host.payments();
        host.sporks.activate(SporkKey::EnableSuperblocks);
        host.budget.set_budget_block(1001);

        let block = pow_block(1000, vec![TxOutput::new(99_999, vec![0x99])]);
        assert!(payments.is_block_value_valid(&block, 1000, 99_999));
    }

    #[test]
    fn test_superblocks_disabled_means_plain_value_check() {
        let host = FakeHost::new(1000);
        let payments = host.payments();
        host.budget.set_budget_block(1001);

        let block = pow_block(1000, vec![TxOutput::new(99_999, vec![0x99])]);
        assert!(!payments.is_block_value_valid(&block, 1000, 99_999));
    }

    #[test]
    fn test_unsynced_accepts_cycle_start_window() {
        let host = FakeHost::new(43_199);
        let payments = host.payments();
        host.sync.set_synced(false);

        // height 43200 is the first block of a budget cycle
        let block = pow_block(43_199, vec![TxOutput::new(99_999, vec![0x99])]);
        assert!(payments.is_block_value_valid(&block, 1000, 99_999));
    }

    #[test]
    fn test_unsynced_outside_window_checks_value() {
        let host = FakeHost::new(1000);
        let payments = host.payments();
        host.sync.set_synced(false);

        let block = pow_block(1000, vec![TxOutput::new(1001, vec![0x99])]);
        assert!(!payments.is_block_value_valid(&block, 1000, 1001));
        assert!(payments.is_block_value_valid(&block, 1000, 999));
    }

    #[test]
    fn test_treasury_split_enforced_by_timestamp() {
        let host = FakeHost::new(1000);
        let payments = host.payments();
        host.treasury
            .set_treasury_block(1001, vec![(vec![0xd1], 60), (vec![0xd2], 40)], 500);

        // pays 300/200 as scheduled
        let good = pow_block(
            1000,
            vec![TxOutput::new(300, vec![0xd1]), TxOutput::new(200, vec![0xd2])],
        );
        assert!(payments.is_block_value_valid(&good, 1000, 500));

        // missing one treasury payee; enforcement timestamp still in the
        // future, so it passes with a warning
        let bad = pow_block(1000, vec![TxOutput::new(300, vec![0xd1])]);
        assert!(payments.is_block_value_valid(&bad, 1000, 300));

        // enforcement active since timestamp zero: now it is rejected
        host.sporks.set_value(SporkKey::TreasuryEnforcement, 0);
        assert!(!payments.is_block_value_valid(&bad, 1000, 300));
        assert!(payments.is_block_value_valid(&good, 1000, 500));
    }

    #[test]
    fn test_out_of_order_block_resolved_by_prev_hash() {
        let host = FakeHost::new(1000);
        let payments = host.payments();
        host.treasury
            .set_treasury_block(901, vec![(vec![0xd1], 100)], 500);
        host.sporks.set_value(SporkKey::TreasuryEnforcement, 0);

        // block extends height 900, not the tip
        let block = pow_block(900, vec![TxOutput::new(1, vec![0x99])]);
        assert!(!payments.is_block_value_valid(&block, 1000, 1));
    }
}
