//! Longest-valid-chain selection.
//!
//! Length is counted in blocks, not cumulative work. A strictly longer remote
//! chain wins only if it passes full validation; ties and invalid winners
//! leave the local chain in place.

use crate::blockchain::{is_valid_chain, Block, LedgerSnapshot};
use crate::transaction::Transaction;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsensusOutcome {
    Replaced,
    Kept,
}

/// Result of one consensus round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsensusDecision {
    pub outcome: ConsensusOutcome,
    /// Peer whose chain was adopted, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub chain: Vec<Block>,
}

impl ConsensusDecision {
    pub fn replaced(&self) -> bool {
        self.outcome == ConsensusOutcome::Replaced
    }
}

/// The ledger a consensus round decided to adopt.
#[derive(Debug, Clone, PartialEq)]
pub struct Adoption {
    pub source: String,
    pub chain: Vec<Block>,
    pub pending_transactions: Vec<Transaction>,
}

/// Pick the remote ledger to adopt, if any.
///
/// The longest candidate is chosen first (the earliest one on a tie between
/// peers) and only then validated; if it fails, nothing is adopted even when a
/// shorter valid candidate would also have beaten the local chain.
pub fn select_longest_valid(local_length: usize, candidates: Vec<(String, LedgerSnapshot)>) -> Option<Adoption> {
    let mut best: Option<(String, LedgerSnapshot)> = None;
    let mut best_length = local_length;

    for (source, snapshot) in candidates {
        if snapshot.chain.len() > best_length {
            best_length = snapshot.chain.len();
            best = Some((source, snapshot));
        }
    }

    let (source, snapshot) = best?;
    if !is_valid_chain(&snapshot.chain) {
        tracing::warn!(
            peer = %source,
            length = snapshot.chain.len(),
            "longest peer chain is invalid; keeping local chain"
        );
        return None;
    }

    Some(Adoption {
        source,
        chain: snapshot.chain,
        pending_transactions: snapshot.pending_transactions,
    })
}
