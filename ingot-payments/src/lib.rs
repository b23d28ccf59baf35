//! Masternode payment election and validation for Ingot.
//!
//! Every block pays part of its reward to one masternode per active tier.
//! The winners are elected by the top-ranked masternodes gossiping signed
//! votes; this crate owns the vote ledger, the gossip ingress rules, the
//! election loop, and the consensus checks that accept or reject a block
//! based on who it pays.
//!
//! The chain, the masternode registry, the budget and treasury rules, the
//! spork toggles and the peer transport all live elsewhere in the node;
//! they are reached through the capability traits in [`host`].

pub mod builder;
pub mod config;
pub mod constants;
pub mod db;
pub mod error;
pub mod gossip;
pub mod host;
pub mod ledger;
pub mod manager;
pub mod net;
pub mod payees;
pub mod testutil;
pub mod validation;
pub mod winner;

mod elector;

pub use config::{ActiveMasternode, PaymentsConfig};
pub use error::PaymentError;
pub use ledger::PaymentLedger;
pub use manager::MasternodePayments;
pub use payees::{BlockPayees, PayeeTally};
pub use winner::PaymentWinner;
