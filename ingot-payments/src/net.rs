//! Wire messages of the payment protocol.
//!
//! Full records travel as `"mnw"` messages; everything else moves through
//! the host's generic inventory machinery, which fetches a record by the
//! hash carried in an [`Inventory`].

use serde::{Deserialize, Serialize};

use ingot_types::Hash;

use crate::winner::PaymentWinner;

/// Inventory object types this subsystem announces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InventoryType {
    MasternodeWinner,
}

/// An inventory announcement: "I have this object, fetch it if you want it".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inventory {
    pub kind: InventoryType,
    pub hash: Hash,
}

impl Inventory {
    pub fn winner(hash: Hash) -> Self {
        Inventory { kind: InventoryType::MasternodeWinner, hash }
    }
}

/// Messages handled by the payment subsystem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentMessage {
    /// A masternode declares a payment winner for an upcoming block.
    Winner(PaymentWinner),
    /// A syncing peer asks for our recent winner inventory.
    SyncRequest { count_needed: u32 },
}

impl PaymentMessage {
    /// Get the command string for this message type
    pub fn command(&self) -> &'static str {
        match self {
            PaymentMessage::Winner(_) => "mnw",
            PaymentMessage::SyncRequest { .. } => "mnget",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commands() {
        let msg = PaymentMessage::SyncRequest { count_needed: 6 };
        assert_eq!(msg.command(), "mnget");
    }

    #[test]
    fn test_inventory_roundtrip() {
        let inv = Inventory::winner([7u8; 32]);
        let bytes = bincode::serialize(&inv).unwrap();
        let back: Inventory = bincode::deserialize(&bytes).unwrap();
        assert_eq!(inv, back);
    }
}
