//! The signed payment vote: "masternode M elects payee P at tier L for
//! block H".

use bincode::Options;
use serde::{Deserialize, Serialize};

use ingot_crypto::hash::object_hash;
use ingot_crypto::signature::verify_raw;
use ingot_crypto::IngotKeyPair;
use ingot_types::{Hash, OutPoint, Script, Tier, TIER_MAX};

use crate::error::PaymentError;

/// A payment winner declaration, signed by the voting masternode's
/// operator key.
///
/// Field order is the wire format; see [`PaymentWinner::from_wire`] for
/// the legacy layout without `payee_vin`/`payee_tier`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentWinner {
    /// Collateral outpoint of the masternode casting this vote.
    pub voter: OutPoint,
    /// The block whose reward the payee should receive.
    pub block_height: u64,
    /// Script the winner is paid to.
    pub payee: Script,
    /// Collateral outpoint of the winning masternode. Null on votes from
    /// peers that predate the tiered format; filled from the registry on
    /// ingest.
    pub payee_vin: OutPoint,
    pub payee_tier: Tier,
    pub signature: Vec<u8>,
}

/// The pre-tier wire layout. Only ever deserialized.
#[derive(Deserialize)]
struct LegacyWinnerWire {
    voter: OutPoint,
    block_height: u64,
    payee: Script,
    signature: Vec<u8>,
}

impl PaymentWinner {
    pub fn new(voter: OutPoint) -> Self {
        PaymentWinner {
            voter,
            block_height: 0,
            payee: Vec::new(),
            payee_vin: OutPoint::null(),
            payee_tier: TIER_MAX,
            signature: Vec::new(),
        }
    }

    pub fn add_payee(&mut self, payee: Script, tier: Tier, payee_vin: OutPoint) {
        self.payee = payee;
        self.payee_tier = tier;
        self.payee_vin = payee_vin;
    }

    /// True when this vote came from a peer that predates the tiered
    /// format and still needs its payee resolved against the registry.
    pub fn is_legacy(&self) -> bool {
        self.payee_vin.is_null()
    }

    /// Unique id of this vote: digest of its canonical serialization.
    pub fn id(&self) -> Hash {
        let bytes = bincode::serialize(self).expect("winner serialization cannot fail");
        object_hash(&bytes)
    }

    /// The canonical message covered by `signature`. Stable across
    /// versions: outpoint short form, decimal height, payee script hex.
    pub fn signed_message(&self) -> Vec<u8> {
        format!(
            "{}{}{}",
            self.voter.to_short_string(),
            self.block_height,
            hex::encode(&self.payee)
        )
        .into_bytes()
    }

    /// Signs the vote with the operator key, then verifies the fresh
    /// signature before letting it out the door.
    pub fn sign(&mut self, operator_keypair: &IngotKeyPair) -> Result<(), PaymentError> {
        let message = self.signed_message();
        let signature = operator_keypair.sign(&message);
        self.signature = signature.to_bytes().to_vec();

        if !self.verify_signature(&operator_keypair.public_key_bytes()) {
            return Err(PaymentError::Signing(
                "fresh winner signature failed self-verification".to_string(),
            ));
        }
        Ok(())
    }

    /// True iff `signature` covers the canonical message under the given
    /// operator key.
    pub fn verify_signature(&self, operator_key: &[u8]) -> bool {
        verify_raw(operator_key, &self.signed_message(), &self.signature)
    }

    pub fn to_wire(&self) -> Vec<u8> {
        bincode::serialize(self).expect("winner serialization cannot fail")
    }

    /// Decodes a winner off the wire, tolerating the legacy layout that
    /// omits `payee_vin` and `payee_tier`.
    ///
    /// Each layout is accepted only when it consumes the payload exactly;
    /// a legacy payload whose signature bytes happen to parse as an
    /// outpoint would otherwise be taken for the full layout.
    pub fn from_wire(bytes: &[u8]) -> Result<Self, PaymentError> {
        let strict = bincode::options().with_fixint_encoding();

        let mut cursor = std::io::Cursor::new(bytes);
        if let Ok(winner) = strict.deserialize_from::<_, PaymentWinner>(&mut cursor) {
            if cursor.position() == bytes.len() as u64 {
                return Ok(winner);
            }
        }

        let mut cursor = std::io::Cursor::new(bytes);
        let legacy: LegacyWinnerWire = strict.deserialize_from(&mut cursor)?;
        if cursor.position() != bytes.len() as u64 {
            return Err(PaymentError::Serialization(
                "trailing bytes after winner record".to_string(),
            ));
        }
        Ok(PaymentWinner {
            voter: legacy.voter,
            block_height: legacy.block_height,
            payee: legacy.payee,
            payee_vin: OutPoint::null(),
            payee_tier: TIER_MAX,
            signature: legacy.signature,
        })
    }
}
