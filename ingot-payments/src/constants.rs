//! Consensus constants of the masternode payment protocol.
//!
//! All of these are network rules: changing any of them forks the chain.

/// Only masternodes ranked in the top ten at the anchor height may vote
/// for a block's winner.
pub const VOTING_TOP_RANK: u32 = 10;

/// Votes from ranks beyond twice [`VOTING_TOP_RANK`] are treated as
/// hostile rather than merely stale.
pub const VOTING_RANK_SLACK: u32 = VOTING_TOP_RANK * 2;

/// A payee needs at least this many votes before its payment is enforced
/// against incoming blocks.
pub const MIN_PAYMENT_VOTES: u32 = 6;

/// Votes are bound to the block hash and masternode ranking this many
/// blocks below the height being voted on.
pub const VOTE_ANCHOR_DEPTH: u64 = 100;

/// Votes may run ahead of our tip by at most this many blocks.
pub const VOTE_FUTURE_LIMIT: u64 = 20;

/// How far past the tip `is_scheduled` looks for an upcoming payment.
/// Kept short so the latest two winners can still propagate.
pub const SCHEDULE_LOOKAHEAD: u64 = 8;

/// Minimum number of block heights worth of votes kept around.
pub const VOTE_RETENTION_FLOOR: u64 = 1000;

/// Misbehavior score applied for a bad vote signature or a vote from far
/// outside the eligible ranks.
pub const MISBEHAVE_SCORE_INVALID_VOTE: u32 = 20;

/// Sync checkpoint tag for masternode winner inventory counts.
pub const MASTERNODE_SYNC_MNW: u32 = 3;

/// Peers do not see the same masternode count at the same instant, so
/// vote windows and retention scale the count by 5/4.
pub fn scaled_masternode_count(count: usize) -> u64 {
    count as u64 * 5 / 4
}

/// Number of heights behind the tip for which votes are retained.
pub fn vote_retention_window(masternode_count: usize) -> u64 {
    scaled_masternode_count(masternode_count).max(VOTE_RETENTION_FLOOR)
}
