//! Per-height vote tallies: who the network wants paid in each tier.

use std::collections::BTreeMap;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use ingot_types::{script_to_string, Amount, OutPoint, Script, Tier, Transaction, TIER_MAX};

use crate::constants::MIN_PAYMENT_VOTES;
use crate::host::{Host, SporkKey};

/// Vote count for one `(tier, payee)` pair at one height.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayeeTally {
    pub script: Script,
    pub vin: OutPoint,
    /// Fixed at insertion; a vote naming the same script with another
    /// tier still lands here.
    pub tier: Tier,
    pub votes: u32,
}

impl PayeeTally {
    pub fn new(script: Script, tier: Tier, vin: OutPoint, votes: u32) -> Self {
        PayeeTally { script, vin, tier, votes }
    }
}

/// All payee tallies for a single block height, in first-seen order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockPayees {
    pub height: u64,
    pub payees: Vec<PayeeTally>,
}

impl BlockPayees {
    pub fn new(height: u64) -> Self {
        BlockPayees { height, payees: Vec::new() }
    }

    /// Credits `votes` to the payee with a byte-equal script, creating the
    /// entry if this is the first vote for that script.
    pub fn add_payee(&mut self, tier: Tier, script: Script, vin: OutPoint, votes: u32) {
        if let Some(existing) = self.payees.iter_mut().find(|p| p.script == script) {
            existing.votes += votes;
        } else {
            self.payees.push(PayeeTally::new(script, tier, vin, votes));
        }
    }

    /// The winning payee of `tier`: most votes, first-seen on ties.
    pub fn get_payee(&self, tier: Tier) -> Option<Script> {
        let mut best: Option<&PayeeTally> = None;
        for payee in self.payees.iter().filter(|p| p.tier == tier) {
            match best {
                Some(current) if payee.votes <= current.votes => {}
                _ => best = Some(payee),
            }
        }
        best.map(|p| p.script.clone())
    }

    /// Diagnostic list of tallied payees, `"{script}:{tier}:{votes}"`.
    pub fn required_payments_string(&self) -> String {
        let mut ret = String::from("Unknown");
        for payee in &self.payees {
            let payee_str = format!(
                "{}:{}:{}",
                script_to_string(&payee.script),
                payee.tier,
                payee.votes
            );
            if ret == "Unknown" {
                ret = payee_str;
            } else {
                ret += &format!(", {}", payee_str);
            }
        }
        ret
    }

    /// Consensus check: does `tx` pay every tier whose tally reached the
    /// vote threshold at least the required amount?
    pub fn is_transaction_valid(
        &self,
        tx: &Transaction,
        block_value: Amount,
        is_proof_of_stake: bool,
        host: &Host,
    ) -> bool {
        let pay_new_tiers = host.sporks.is_active(SporkKey::NewMasternodeTiers);

        let drift_count = if host.sporks.is_active(SporkKey::MasternodePaymentEnforcement) {
            // A stable count ignores masternodes activated moments ago,
            // which peers may not have seen yet.
            host.registry.stable_size() + host.registry.drift_allowance()
        } else {
            // Only an increased count matters: more masternodes means a
            // smaller required payment, and we check value >= required.
            host.registry.size() + host.registry.drift_allowance()
        };

        // Highest vote count per tier among payees past the threshold.
        let mut max_signatures: BTreeMap<Tier, u32> = BTreeMap::new();
        for payee in &self.payees {
            if payee.votes < MIN_PAYMENT_VOTES || (!pay_new_tiers && payee.tier != TIER_MAX) {
                continue;
            }
            let entry = max_signatures.entry(payee.tier).or_insert(payee.votes);
            if payee.votes > *entry {
                *entry = payee.votes;
            }
        }

        // No payee has enough votes; approve whichever is the longest chain.
        if max_signatures.is_empty() {
            debug!("is_transaction_valid - not enough signatures at height {}, accepting", self.height);
            return true;
        }

        let mut payees_possible = String::new();

        for payee in &self.payees {
            if payee.votes < MIN_PAYMENT_VOTES || (!pay_new_tiers && payee.tier != TIER_MAX) {
                continue;
            }

            let required = host.economics.masternode_payment(
                self.height,
                block_value,
                is_proof_of_stake,
                payee.tier,
                drift_count,
                tx.has_zerocoin_spend(),
            );

            let paid = tx.outputs.iter().any(|out| {
                let is_payee = out.script_pubkey == payee.script;
                if is_payee && out.value < required {
                    debug!(
                        "masternode payment out of drift range: paid={} min={}",
                        out.value, required
                    );
                }
                is_payee && out.value >= required
            });

            if paid {
                max_signatures.remove(&payee.tier);
                if max_signatures.is_empty() {
                    return true;
                }
                continue;
            }

            let missing = format!("{}:{}", payee.tier, script_to_string(&payee.script));
            if payees_possible.is_empty() {
                payees_possible = missing;
            } else {
                payees_possible += &format!(", {}", missing);
            }
        }

        warn!(
            "is_transaction_valid - missing required payment at height {} to {}",
            self.height, payees_possible
        );
        false
    }
}

#[cfg(test)]
mod tests {
    use ingot_types::OutPoint;

    use super::*;

    fn outpoint(byte: u8) -> OutPoint {
        OutPoint::new([byte; 32], 0)
    }

    #[test]
    fn test_add_payee_merges_by_script() {
        let mut payees = BlockPayees::new(1005);
        payees.add_payee(4, vec![0x51], outpoint(1), 1);
        payees.add_payee(4, vec![0x51], outpoint(2), 1);
        payees.add_payee(4, vec![0x52], outpoint(3), 1);

        assert_eq!(payees.payees.len(), 2);
        assert_eq!(payees.payees[0].votes, 2);
        // the vin of the first vote sticks
        assert_eq!(payees.payees[0].vin, outpoint(1));
    }

    #[test]
    fn test_tier_fixed_at_insertion() {
        let mut payees = BlockPayees::new(1005);
        payees.add_payee(4, vec![0x51], outpoint(1), 1);
        payees.add_payee(2, vec![0x51], outpoint(1), 1);

        assert_eq!(payees.payees.len(), 1);
        assert_eq!(payees.payees[0].tier, 4);
        assert_eq!(payees.payees[0].votes, 2);
    }

    #[test]
    fn test_get_payee_majority() {
        let mut payees = BlockPayees::new(1010);
        payees.add_payee(4, vec![0x51], outpoint(1), 3);
        payees.add_payee(4, vec![0x52], outpoint(2), 7);
        payees.add_payee(2, vec![0x53], outpoint(3), 9);

        assert_eq!(payees.get_payee(4), Some(vec![0x52]));
        assert_eq!(payees.get_payee(2), Some(vec![0x53]));
        assert_eq!(payees.get_payee(1), None);
    }

    #[test]
    fn test_get_payee_tie_keeps_first_seen() {
        let mut payees = BlockPayees::new(1010);
        payees.add_payee(4, vec![0x51], outpoint(1), 5);
        payees.add_payee(4, vec![0x52], outpoint(2), 5);

        assert_eq!(payees.get_payee(4), Some(vec![0x51]));
    }

    #[test]
    fn test_required_payments_string() {
        let mut payees = BlockPayees::new(1010);
        assert_eq!(payees.required_payments_string(), "Unknown");

        payees.add_payee(4, vec![0x51], outpoint(1), 6);
        payees.add_payee(1, vec![0x52], outpoint(2), 2);
        assert_eq!(payees.required_payments_string(), "51:4:6, 52:1:2");
    }
}
