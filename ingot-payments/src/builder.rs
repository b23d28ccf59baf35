//! Block-template construction: inserting the elected payments into the
//! reward transaction of the block being mined or staked.

use log::{debug, info};

use ingot_types::{script_to_string, Amount, Transaction, TxOutput, TIER_MAX, TIER_MIN};

use crate::host::SporkKey;
use crate::manager::MasternodePayments;

impl MasternodePayments {
    /// Fills in the non-miner payments for the next block. Superblocks and
    /// treasury blocks are owned by the budget subsystem; every other
    /// block pays one masternode per active tier.
    pub fn fill_block_payee(
        &self,
        tx: &mut Transaction,
        fees: Amount,
        is_proof_of_stake: bool,
        is_zerocoin_stake: bool,
        block_value: &mut Amount,
    ) {
        let tip_height = match self.host.chain.try_tip_height() {
            Some(height) => height,
            None => return,
        };
        let height = tip_height + 1;

        if self.host.sporks.is_active(SporkKey::EnableSuperblocks)
            && self.host.budget.is_budget_payment_block(height)
        {
            self.host
                .budget
                .fill_block_payee(tx, fees, is_proof_of_stake, block_value);
        } else if self.host.treasury.is_treasury_block(height) {
            self.host
                .budget
                .fill_treasury_block_payee(tx, fees, is_proof_of_stake, block_value);
        } else {
            self.fill_masternode_payees(tx, height, is_proof_of_stake, is_zerocoin_stake, *block_value);
        }
    }

    fn fill_masternode_payees(
        &self,
        tx: &mut Transaction,
        height: u64,
        is_proof_of_stake: bool,
        is_zerocoin_stake: bool,
        block_value: Amount,
    ) {
        let pay_new_tiers = self.host.sporks.is_active(SporkKey::NewMasternodeTiers);
        let start_tier = if pay_new_tiers { TIER_MIN } else { TIER_MAX };

        // Position of the payment output per paid tier; independent of the
        // tier number when the legacy single-tier mode skips tiers.
        let mut level: usize = 1;
        let mut stake_outputs: usize = 1;

        for tier in start_tier..=TIER_MAX {
            let payee = match self.get_payee(height, tier) {
                Some(payee) => payee,
                // No votes yet; fall back to the live top-ranked node.
                None => match self.host.registry.current_masternode(tier) {
                    Some(mn) => mn.payment_script(),
                    None => {
                        debug!(
                            "fill_block_payee - failed to detect tier {} masternode to pay",
                            tier
                        );
                        continue;
                    }
                },
            };

            let payment = self.host.economics.masternode_payment(
                height,
                block_value,
                is_proof_of_stake,
                tier,
                0,
                is_zerocoin_stake,
            );

            if is_proof_of_stake {
                // The first output of a coinstake is empty and the stake
                // reward may already be split over several outputs; the
                // payment is appended and deducted from all of them.
                let appended_at = tx.outputs.len();
                if level == 1 {
                    stake_outputs = appended_at.saturating_sub(1);
                }
                tx.outputs.push(TxOutput::new(payment, payee.clone()));

                if tx.outputs.len() > 1 && !tx.outputs[1].is_zerocoin_mint() {
                    if stake_outputs == 1 {
                        tx.outputs[1].value = tx.outputs[1].value.saturating_sub(payment);
                    } else if stake_outputs > 1 {
                        let split = payment / stake_outputs as u64;
                        let remainder = payment - split * stake_outputs as u64;
                        for out in &mut tx.outputs[1..=stake_outputs] {
                            out.value = out.value.saturating_sub(split);
                        }
                        // uneven division: the last stake output eats the dust
                        tx.outputs[stake_outputs].value =
                            tx.outputs[stake_outputs].value.saturating_sub(remainder);
                    }
                }
            } else {
                tx.outputs.resize(level + 1, TxOutput::default());
                tx.outputs[level] = TxOutput::new(payment, payee.clone());
                if level == 1 {
                    tx.outputs[0].value = block_value.saturating_sub(payment);
                } else {
                    tx.outputs[0].value = tx.outputs[0].value.saturating_sub(payment);
                }
            }

            info!(
                "fill_block_payee - masternode payment of {} to {}",
                payment,
                script_to_string(&payee)
            );
            level += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use ingot_types::{OutPoint, TxInput, OP_ZEROCOINMINT};

    use crate::host::SporkKey;
    use crate::testutil::{register_masternodes, FakeBudget, FakeHost, TestMasternode};

    use super::*;

    fn miner_script() -> Vec<u8> {
        vec![0x99]
    }

    fn coinstake(stake_values: &[Amount]) -> Transaction {
        let mut outputs = vec![TxOutput::empty()];
        outputs.extend(stake_values.iter().map(|v| TxOutput::new(*v, miner_script())));
        Transaction::new(
            vec![TxInput {
                previous_output: OutPoint::new([7; 32], 0),
                script_sig: vec![],
                sequence: 0,
            }],
            outputs,
        )
    }

    #[test]
    fn test_pow_single_tier_payment() {
        let host = FakeHost::new(1000);
        let nodes = register_masternodes(&host, 1, TIER_MAX);
        let payments = host.payments();

        // elected payee for the next block
        payments.accept_vote(&nodes[0].signed_vote(1001, &nodes[0].info));

        let mut tx = Transaction::new(vec![], vec![TxOutput::new(1000, miner_script())]);
        let mut block_value = 1000;
        payments.fill_block_payee(&mut tx, 0, false, false, &mut block_value);

        assert_eq!(tx.outputs.len(), 2);
        assert_eq!(tx.outputs[0].value, 600);
        assert_eq!(tx.outputs[1].value, 400);
        assert_eq!(tx.outputs[1].script_pubkey, nodes[0].info.payment_script());
    }

    #[test]
    fn test_pow_all_tiers_with_fallback_payees() {
        let host = FakeHost::new(1000);
        host.sporks.activate(SporkKey::NewMasternodeTiers);
        let nodes: Vec<TestMasternode> = (TIER_MIN..=TIER_MAX)
            .map(|tier| {
                let mn = TestMasternode::new(tier * 10, tier);
                host.registry.add(mn.info.clone());
                mn
            })
            .collect();
        let payments = host.payments();

        // no votes at all: every tier falls back to the live top node
        let mut tx = Transaction::new(vec![], vec![TxOutput::new(1000, miner_script())]);
        let mut block_value = 1000;
        payments.fill_block_payee(&mut tx, 0, false, false, &mut block_value);

        // payments are 100, 200, 300, 400 for tiers 1..=4
        assert_eq!(tx.outputs.len(), 5);
        assert_eq!(tx.outputs[0].value, 0);
        for (tier, node) in (TIER_MIN..=TIER_MAX).zip(&nodes) {
            let out = &tx.outputs[tier as usize];
            assert_eq!(out.value, host.economics.payment_for(tier));
            assert_eq!(out.script_pubkey, node.info.payment_script());
        }
    }

    #[test]
    fn test_pow_missing_tier_skipped() {
        let host = FakeHost::new(1000);
        host.sporks.activate(SporkKey::NewMasternodeTiers);
        // only tier 2 has a masternode
        let nodes = register_masternodes(&host, 1, 2);
        let payments = host.payments();

        let mut tx = Transaction::new(vec![], vec![TxOutput::new(1000, miner_script())]);
        let mut block_value = 1000;
        payments.fill_block_payee(&mut tx, 0, false, false, &mut block_value);

        assert_eq!(tx.outputs.len(), 2);
        assert_eq!(tx.outputs[0].value, 800);
        assert_eq!(tx.outputs[1].value, 200);
        assert_eq!(tx.outputs[1].script_pubkey, nodes[0].info.payment_script());
    }

    #[test]
    fn test_pos_single_stake_output() {
        let host = FakeHost::new(1000);
        let nodes = register_masternodes(&host, 1, TIER_MAX);
        let payments = host.payments();

        let mut tx = coinstake(&[1000]);
        let mut block_value = 1000;
        payments.fill_block_payee(&mut tx, 0, true, false, &mut block_value);

        assert_eq!(tx.outputs.len(), 3);
        assert_eq!(tx.outputs[1].value, 600);
        assert_eq!(tx.outputs[2].value, 400);
        assert_eq!(tx.outputs[2].script_pubkey, nodes[0].info.payment_script());
    }

    #[test]
    fn test_pos_split_stake_outputs() {
        let host = FakeHost::new(1000);
        register_masternodes(&host, 1, TIER_MAX);
        let payments = host.payments();

        let mut tx = coinstake(&[500, 500]);
        let mut block_value = 1000;
        payments.fill_block_payee(&mut tx, 0, true, false, &mut block_value);

        // 400 split evenly over the two stake outputs
        assert_eq!(tx.outputs.len(), 4);
        assert_eq!(tx.outputs[1].value, 300);
        assert_eq!(tx.outputs[2].value, 300);
        assert_eq!(tx.outputs[3].value, 400);
    }

    #[test]
    fn test_pos_split_remainder_comes_from_last_output() {
        let host = FakeHost::new(1000);
        register_masternodes(&host, 1, TIER_MAX);
        let payments = host.payments();

        let mut tx = coinstake(&[500, 500, 500]);
        let mut block_value = 1000;
        payments.fill_block_payee(&mut tx, 0, true, false, &mut block_value);

        // 400 / 3 = 133 rem 1; the last stake output pays the dust
        assert_eq!(tx.outputs[1].value, 367);
        assert_eq!(tx.outputs[2].value, 367);
        assert_eq!(tx.outputs[3].value, 366);
        assert_eq!(tx.outputs[4].value, 400);
    }

    #[test]
    fn test_pos_zerocoin_mint_stake_is_not_deducted() {
        let host = FakeHost::new(1000);
        register_masternodes(&host, 1, TIER_MAX);
        let payments = host.payments();

        let mut tx = coinstake(&[1000]);
        tx.outputs[1].script_pubkey = vec![OP_ZEROCOINMINT, 0x01];
        let mut block_value = 1000;
        payments.fill_block_payee(&mut tx, 0, true, false, &mut block_value);

        // the payment is appended but the mint output keeps its value
        assert_eq!(tx.outputs[1].value, 1000);
        assert_eq!(tx.outputs[2].value, 400);
    }

    #[test]
    fn test_budget_block_delegates_to_budget() {
        let host = FakeHost::new(1000);
        register_masternodes(&host, 1, TIER_MAX);
        host.sporks.activate(SporkKey::EnableSuperblocks);
        host.budget.set_budget_block(1001);
        let payments = host.payments();

        let mut tx = Transaction::new(vec![], vec![TxOutput::new(1000, miner_script())]);
        let mut block_value = 1000;
        payments.fill_block_payee(&mut tx, 0, false, false, &mut block_value);

        assert_eq!(tx.outputs.last().unwrap().script_pubkey, FakeBudget::budget_script());
    }

    #[test]
    fn test_treasury_block_delegates_to_treasury_fill() {
        let host = FakeHost::new(1000);
        register_masternodes(&host, 1, TIER_MAX);
        host.treasury.set_treasury_block(1001, vec![(vec![0xcc], 100)], 200);
        let payments = host.payments();

        let mut tx = Transaction::new(vec![], vec![TxOutput::new(1000, miner_script())]);
        let mut block_value = 1000;
        payments.fill_block_payee(&mut tx, 0, false, false, &mut block_value);

        assert_eq!(
            tx.outputs.last().unwrap().script_pubkey,
            FakeBudget::treasury_fill_script()
        );
    }

    #[test]
    fn test_noop_when_chain_lock_contended() {
        let host = FakeHost::new(1000);
        register_masternodes(&host, 1, TIER_MAX);
        host.chain.set_tip(None);
        let payments = host.payments();

        let mut tx = Transaction::new(vec![], vec![TxOutput::new(1000, miner_script())]);
        let before = tx.clone();
        let mut block_value = 1000;
        payments.fill_block_payee(&mut tx, 0, false, false, &mut block_value);
        assert_eq!(tx, before);
    }
}
