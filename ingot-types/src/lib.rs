//! Shared data structures for the Ingot cryptocurrency.
//!
//! These types are serialization-stable: both the wire protocol and the
//! on-disk caches encode them with `bincode`, so field order matters.

use serde::{Deserialize, Serialize};

pub type PublicKey = [u8; 32];
pub type SignatureBytes = [u8; 64];
pub type Hash = [u8; 32];

/// Output value in the smallest coin unit.
pub type Amount = u64;

/// A locking script as raw bytes.
pub type Script = Vec<u8>;

/// Masternode collateral class. Higher tiers post more collateral and earn
/// a larger share of the block reward.
pub type Tier = u8;

/// Lowest masternode tier.
pub const TIER_MIN: Tier = 1;
/// Highest masternode tier.
pub const TIER_MAX: Tier = 4;

/// First byte of a zerocoin mint output script.
pub const OP_ZEROCOINMINT: u8 = 0xc1;
/// First byte of a zerocoin spend input script.
pub const OP_ZEROCOINSPEND: u8 = 0xc2;
/// Script opcode terminating a pay-to-pubkey script.
pub const OP_CHECKSIG: u8 = 0xac;

/// Canonical string form of a script: lowercase hex of its bytes.
pub fn script_to_string(script: &Script) -> String {
    hex::encode(script)
}

/// Builds the pay-to-pubkey locking script for a raw public key.
pub fn script_for_pubkey(pubkey: &PublicKey) -> Script {
    let mut script = Vec::with_capacity(pubkey.len() + 2);
    script.push(pubkey.len() as u8);
    script.extend_from_slice(pubkey);
    script.push(OP_CHECKSIG);
    script
}

/// Represents a reference to a specific transaction output.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutPoint {
    /// The transaction ID (hash) of the transaction containing the output.
    pub txid: Hash,
    /// The index of the output within that transaction.
    pub vout: u32,
}

impl OutPoint {
    pub fn new(txid: Hash, vout: u32) -> Self {
        OutPoint { txid, vout }
    }

    /// The sentinel outpoint carried by coinbase inputs and by payment
    /// votes from peers that predate the tiered-winner format.
    pub fn null() -> Self {
        OutPoint { txid: [0u8; 32], vout: u32::MAX }
    }

    pub fn is_null(&self) -> bool {
        self.txid == [0u8; 32] && self.vout == u32::MAX
    }

    /// Canonical short form, `"{txid-hex}-{vout}"`. Signed messages embed
    /// this string, so it must never change.
    pub fn to_short_string(&self) -> String {
        format!("{}-{}", hex::encode(self.txid), self.vout)
    }
}

impl std::fmt::Display for OutPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_short_string())
    }
}

/// Represents a transaction input, referencing a previous transaction's output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxInput {
    /// The `OutPoint` referencing the output being spent.
    pub previous_output: OutPoint,
    /// The script signature, providing proof of ownership.
    pub script_sig: Vec<u8>,
    /// A sequence number, typically used for replace-by-fee or relative lock-times.
    pub sequence: u32,
}

impl TxInput {
    pub fn is_zerocoin_spend(&self) -> bool {
        self.previous_output.is_null() && self.script_sig.first() == Some(&OP_ZEROCOINSPEND)
    }
}

/// Represents a transaction output, specifying a value and a locking script.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    /// The value of the output in the smallest coin unit.
    pub value: Amount,
    /// The locking script (scriptPubKey) that defines the conditions for spending this output.
    pub script_pubkey: Script,
}

impl TxOutput {
    pub fn new(value: Amount, script_pubkey: Script) -> Self {
        TxOutput { value, script_pubkey }
    }

    /// An empty output, used as the mandatory first output of a coinstake.
    pub fn empty() -> Self {
        TxOutput { value: 0, script_pubkey: Vec::new() }
    }

    pub fn is_empty(&self) -> bool {
        self.value == 0 && self.script_pubkey.is_empty()
    }

    pub fn is_zerocoin_mint(&self) -> bool {
        self.script_pubkey.first() == Some(&OP_ZEROCOINMINT)
    }
}

/// A transaction. Coinbase and coinstake transactions are ordinary
/// transactions distinguished by their shape, as in the UTXO model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub version: u32,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
    pub lock_time: u32,
}

impl Transaction {
    pub fn new(inputs: Vec<TxInput>, outputs: Vec<TxOutput>) -> Self {
        Transaction { version: 1, inputs, outputs, lock_time: 0 }
    }

    /// Hash of the canonical serialization.
    pub fn hash(&self) -> Hash {
        let bytes = bincode::serialize(self).expect("transaction serialization cannot fail");
        *blake3::hash(&bytes).as_bytes()
    }

    /// A coinbase spends nothing: a single input with a null previous output.
    pub fn is_coinbase(&self) -> bool {
        self.inputs.len() == 1
            && self.inputs[0].previous_output.is_null()
            && !self.inputs[0].is_zerocoin_spend()
    }

    /// A coinstake spends real inputs and leaves its first output empty as
    /// a marker; the stake reward lives in the outputs that follow.
    pub fn is_coinstake(&self) -> bool {
        !self.inputs.is_empty()
            && !self.inputs[0].previous_output.is_null()
            && self.outputs.len() >= 2
            && self.outputs[0].is_empty()
    }

    pub fn has_zerocoin_spend(&self) -> bool {
        self.inputs.iter().any(TxInput::is_zerocoin_spend)
    }
}

/// A block as seen by the payment subsystem: header fields it reads plus
/// the transaction list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub prev_block_hash: Hash,
    /// Block timestamp in seconds since the epoch.
    pub time: u64,
    pub transactions: Vec<Transaction>,
}

impl Block {
    /// Proof-of-stake blocks carry an empty coinbase followed by the
    /// coinstake in the second slot.
    pub fn is_proof_of_stake(&self) -> bool {
        self.transactions.len() > 1 && self.transactions[1].is_coinstake()
    }

    /// The transaction that pays the block reward: the coinstake for PoS
    /// blocks, the coinbase otherwise.
    pub fn reward_transaction(&self) -> Option<&Transaction> {
        if self.is_proof_of_stake() {
            self.transactions.get(1)
        } else {
            self.transactions.first()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outpoint(byte: u8, vout: u32) -> OutPoint {
        OutPoint::new([byte; 32], vout)
    }

    #[test]
    fn test_outpoint_short_string() {
        let out = outpoint(0xab, 3);
        let s = out.to_short_string();
        assert!(s.starts_with("abab"));
        assert!(s.ends_with("-3"));
        assert_eq!(s.len(), 64 + 2);
    }

    #[test]
    fn test_null_outpoint() {
        assert!(OutPoint::null().is_null());
        assert!(!outpoint(1, 0).is_null());
    }

    #[test]
    fn test_outpoint_roundtrip() {
        let out = outpoint(7, 42);
        let bytes = bincode::serialize(&out).unwrap();
        let back: OutPoint = bincode::deserialize(&bytes).unwrap();
        assert_eq!(out, back);
    }

    #[test]
    fn test_coinstake_shape() {
        let stake_input = TxInput {
            previous_output: outpoint(1, 0),
            script_sig: vec![],
            sequence: 0,
        };
        let tx = Transaction::new(
            vec![stake_input],
            vec![TxOutput::empty(), TxOutput::new(500, vec![0x51])],
        );
        assert!(tx.is_coinstake());
        assert!(!tx.is_coinbase());
    }

    #[test]
    fn test_coinbase_shape() {
        let tx = Transaction::new(
            vec![TxInput { previous_output: OutPoint::null(), script_sig: vec![], sequence: 0 }],
            vec![TxOutput::new(1000, vec![0x51])],
        );
        assert!(tx.is_coinbase());
        assert!(!tx.is_coinstake());
    }

    #[test]
    fn test_zerocoin_detection() {
        let mint = TxOutput::new(100, vec![OP_ZEROCOINMINT, 0x01]);
        assert!(mint.is_zerocoin_mint());

        let spend = TxInput {
            previous_output: OutPoint::null(),
            script_sig: vec![OP_ZEROCOINSPEND],
            sequence: 0,
        };
        let tx = Transaction::new(vec![spend], vec![TxOutput::new(100, vec![0x51])]);
        assert!(tx.has_zerocoin_spend());
        assert!(!tx.is_coinbase());
    }

    #[test]
    fn test_pos_block_detection() {
        let coinbase = Transaction::new(
            vec![TxInput { previous_output: OutPoint::null(), script_sig: vec![], sequence: 0 }],
            vec![TxOutput::empty()],
        );
        let coinstake = Transaction::new(
            vec![TxInput { previous_output: outpoint(2, 0), script_sig: vec![], sequence: 0 }],
            vec![TxOutput::empty(), TxOutput::new(900, vec![0x51])],
        );
        let block = Block {
            prev_block_hash: [0; 32],
            time: 1_700_000_000,
            transactions: vec![coinbase.clone(), coinstake.clone()],
        };
        assert!(block.is_proof_of_stake());
        assert_eq!(block.reward_transaction(), Some(&coinstake));

        let pow = Block {
            prev_block_hash: [0; 32],
            time: 1_700_000_000,
            transactions: vec![coinbase.clone()],
        };
        assert!(!pow.is_proof_of_stake());
        assert_eq!(pow.reward_transaction(), Some(&coinbase));
    }

    #[test]
    fn test_script_for_pubkey() {
        let key = [9u8; 32];
        let script = script_for_pubkey(&key);
        assert_eq!(script.len(), 34);
        assert_eq!(script[0], 32);
        assert_eq!(*script.last().unwrap(), OP_CHECKSIG);
        assert_eq!(&script[1..33], &key);
    }
}
