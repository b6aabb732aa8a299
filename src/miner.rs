//! Proof-of-work search.
//!
//! The search walks nonces upward from zero, so the same inputs always yield
//! the same nonce. There is no iteration cap.

use crate::blockchain::{hash_with_json, meets_difficulty, BlockData};
use crate::error::ChainError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// How many nonces are tried between checks of the cancellation flag.
const CANCEL_CHECK_INTERVAL: u64 = 1024;

/// A solved block: the nonce and the digest it produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Proof {
    pub nonce: u64,
    pub hash: String,
}

/// Find the first nonce whose digest meets the difficulty prefix. Blocks the
/// calling thread until it does.
pub fn proof_of_work(previous_hash: &str, data: &BlockData) -> Result<u64, ChainError> {
    let never = AtomicBool::new(false);
    search(previous_hash, data, &never)?
        .map(|proof| proof.nonce)
        .ok_or(ChainError::MiningCancelled)
}

/// Like [`proof_of_work`], but gives up with `None` once `cancel` is set.
pub fn search(
    previous_hash: &str,
    data: &BlockData,
    cancel: &AtomicBool,
) -> Result<Option<Proof>, ChainError> {
    let data_json = data.canonical_json()?;
    let mut nonce: u64 = 0;

    loop {
        if nonce % CANCEL_CHECK_INTERVAL == 0 && cancel.load(Ordering::Relaxed) {
            return Ok(None);
        }

        let hash = hash_with_json(previous_hash, &data_json, nonce);
        if meets_difficulty(&hash) {
            return Ok(Some(Proof { nonce, hash }));
        }
        nonce = nonce.wrapping_add(1);
    }
}

/// Handle used to stop an in-flight search.
#[derive(Debug, Clone, Default)]
pub struct MiningJob {
    cancel: Arc<AtomicBool>,
}

impl MiningJob {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    /// Run the search on tokio's blocking pool and wait for it.
    pub async fn solve(&self, previous_hash: String, data: BlockData) -> Result<Proof, ChainError> {
        let cancel = self.cancel.clone();
        let index = data.index;
        let started = std::time::Instant::now();

        let outcome = tokio::task::spawn_blocking(move || search(&previous_hash, &data, &cancel))
            .await
            .map_err(|e| ChainError::MiningError(format!("mining task failed: {}", e)))??;

        match outcome {
            Some(proof) => {
                tracing::debug!(
                    index,
                    nonce = proof.nonce,
                    elapsed_ms = %started.elapsed().as_millis(),
                    "proof of work found"
                );
                Ok(proof)
            }
            None => Err(ChainError::MiningCancelled),
        }
    }
}
