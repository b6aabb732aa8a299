//! Chain validation.
//!
//! Works on any slice of blocks, so a peer's chain can be checked without
//! touching the local ledger.

use crate::error::ChainError;

use super::chain::{hash_block, meets_difficulty, Block, GENESIS_HASH, GENESIS_NONCE};

/// Check every invariant of `chain`, returning the first violation.
pub fn validate_chain(chain: &[Block]) -> Result<(), ChainError> {
    let genesis = chain
        .first()
        .ok_or_else(|| ChainError::InvalidChain("chain has no genesis block".to_string()))?;
    validate_genesis(genesis)?;

    for pair in chain.windows(2) {
        validate_next_block(&pair[0], &pair[1])?;
    }
    Ok(())
}

/// `true` when [`validate_chain`] finds nothing wrong.
pub fn is_valid_chain(chain: &[Block]) -> bool {
    match validate_chain(chain) {
        Ok(()) => true,
        Err(e) => {
            tracing::debug!(error = %e, length = chain.len(), "chain failed validation");
            false
        }
    }
}

pub fn validate_genesis(block: &Block) -> Result<(), ChainError> {
    if block.index != 1
        || block.nonce != GENESIS_NONCE
        || block.hash != GENESIS_HASH
        || block.previous_block_hash != GENESIS_HASH
        || !block.transactions.is_empty()
    {
        return Err(ChainError::InvalidChain(format!(
            "malformed genesis block (index {}, nonce {}, hash {:?}, previous {:?}, {} transactions)",
            block.index,
            block.nonce,
            block.hash,
            block.previous_block_hash,
            block.transactions.len()
        )));
    }
    Ok(())
}

/// Check that `block` may follow `previous`: consecutive index, matching
/// linkage, and a recomputed digest that meets the difficulty prefix.
pub fn validate_next_block(previous: &Block, block: &Block) -> Result<(), ChainError> {
    if block.index != previous.index + 1 {
        return Err(ChainError::InvalidBlock(format!(
            "Invalid block index. Expected {}, but got {}.",
            previous.index + 1,
            block.index
        )));
    }

    if block.previous_block_hash != previous.hash {
        tracing::debug!(
            index = block.index,
            expected = %previous.hash,
            got = %block.previous_block_hash,
            "previous hash mismatch"
        );
        return Err(ChainError::InvalidBlockLinkage);
    }

    let recomputed = hash_block(&previous.hash, &block.data(), block.nonce)?;
    if !meets_difficulty(&recomputed) {
        return Err(ChainError::InvalidProofOfWork);
    }
    Ok(())
}
