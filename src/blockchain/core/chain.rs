use crate::crypto::sha256_hex;
use crate::error::ChainError;
use crate::mempool::Mempool;
use crate::transaction::Transaction;
use serde::{Deserialize, Serialize};

use super::validation::validate_next_block;

/// Version of the hashing / JSON contract shared by all nodes.
pub const WIRE_VERSION: u32 = 1;

/// A block hash satisfies the proof of work when it starts with this prefix.
pub const DIFFICULTY_PREFIX: &str = "0000";

/// Hash and previous hash of the genesis block.
pub const GENESIS_HASH: &str = "0";
pub const GENESIS_NONCE: u64 = 0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    /// 1-based position in the chain.
    pub index: u64,
    /// Milliseconds since the Unix epoch. Informational only.
    pub timestamp: u64,
    pub transactions: Vec<Transaction>,
    pub nonce: u64,
    pub hash: String,
    pub previous_block_hash: String,
}

impl Block {
    pub fn is_genesis(&self) -> bool {
        self.index == 1
    }

    /// The content this block's hash commits to.
    pub fn data(&self) -> BlockData {
        BlockData {
            transactions: self.transactions.clone(),
            index: self.index,
        }
    }
}

/// The `{transactions, index}` pair a block hash is computed over.
///
/// Serialized compactly with `transactions` first; see [`hash_block`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockData {
    pub transactions: Vec<Transaction>,
    pub index: u64,
}

impl BlockData {
    pub fn canonical_json(&self) -> Result<String, ChainError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// `sha256(previous_hash ++ nonce ++ json(data))` as lowercase hex.
pub fn hash_block(previous_hash: &str, data: &BlockData, nonce: u64) -> Result<String, ChainError> {
    Ok(hash_with_json(previous_hash, &data.canonical_json()?, nonce))
}

/// Same digest as [`hash_block`] with the block data already serialized.
pub fn hash_with_json(previous_hash: &str, data_json: &str, nonce: u64) -> String {
    sha256_hex(format!("{}{}{}", previous_hash, nonce, data_json).as_bytes())
}

pub fn meets_difficulty(hash: &str) -> bool {
    hash.starts_with(DIFFICULTY_PREFIX)
}

/// Everything a peer needs to evaluate this node's ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerSnapshot {
    pub chain: Vec<Block>,
    pub pending_transactions: Vec<Transaction>,
    #[serde(default)]
    pub current_node_url: String,
    #[serde(default)]
    pub network_nodes: Vec<String>,
}

/// One node's chain of confirmed blocks plus its pool of pending transactions.
#[derive(Debug, Clone)]
pub struct Blockchain {
    chain: Vec<Block>,
    pending: Mempool,
}

impl Default for Blockchain {
    fn default() -> Self {
        Self::new()
    }
}

impl Blockchain {
    /// Create a ledger holding only the genesis block.
    pub fn new() -> Self {
        let genesis = Block {
            index: 1,
            timestamp: now_millis(),
            transactions: Vec::new(),
            nonce: GENESIS_NONCE,
            hash: GENESIS_HASH.to_string(),
            previous_block_hash: GENESIS_HASH.to_string(),
        };

        Blockchain {
            chain: vec![genesis],
            pending: Mempool::new(),
        }
    }

    /// Allocate an unattached transaction. The pool is not touched.
    pub fn new_transaction(amount: f64, sender: &str, receiver: &str) -> Transaction {
        Transaction::new(amount, sender, receiver)
    }

    /// Append `tx` to the pending pool and return the index of the block it is
    /// expected to land in. The index is advisory: the pool may look different
    /// by the time a block is mined.
    ///
    /// A transaction already pending or already confirmed on the chain is not
    /// stored again.
    pub fn enqueue_transaction(&mut self, tx: Transaction) -> Result<u64, ChainError> {
        let next_index = self.last_block()?.index + 1;
        if self.find_transaction_by_id(&tx.transaction_id).is_some() {
            tracing::debug!(
                next_index,
                transaction_id = %tx.transaction_id,
                "transaction already confirmed; not enqueued"
            );
        } else if !self.pending.add_transaction(tx) {
            tracing::debug!(next_index, "transaction already pending; not enqueued twice");
        }
        Ok(next_index)
    }

    /// Seal the whole pending pool into a new block with the given proof
    /// fields and append it. The pool is left empty.
    pub fn commit_block(
        &mut self,
        nonce: u64,
        previous_hash: &str,
        hash: &str,
    ) -> Result<Block, ChainError> {
        let index = self.last_block()?.index + 1;
        let block = Block {
            index,
            timestamp: now_millis(),
            transactions: self.pending.take_all(),
            nonce,
            hash: hash.to_string(),
            previous_block_hash: previous_hash.to_string(),
        };

        self.chain.push(block.clone());
        Ok(block)
    }

    /// Append a block mined elsewhere after checking that it extends our tip.
    /// On success the pending pool is cleared.
    pub fn append_block(&mut self, block: Block) -> Result<(), ChainError> {
        validate_next_block(self.last_block()?, &block)?;
        self.chain.push(block);
        self.pending.take_all();
        Ok(())
    }

    /// Swap in another chain and pool wholesale.
    pub fn replace(&mut self, chain: Vec<Block>, pending: Vec<Transaction>) -> Result<(), ChainError> {
        if chain.is_empty() {
            return Err(ChainError::EmptyChain);
        }
        self.chain = chain;
        self.pending = Mempool::from_transactions(pending);
        Ok(())
    }

    /// The data the next block will be hashed over: the pending pool and the
    /// next index.
    pub fn next_block_data(&self) -> Result<BlockData, ChainError> {
        Ok(BlockData {
            transactions: self.pending.transactions().to_vec(),
            index: self.last_block()?.index + 1,
        })
    }

    pub fn last_block(&self) -> Result<&Block, ChainError> {
        self.chain.last().ok_or(ChainError::EmptyChain)
    }

    pub fn genesis_block(&self) -> Result<&Block, ChainError> {
        self.chain.first().ok_or(ChainError::EmptyChain)
    }

    pub fn blocks(&self) -> &[Block] {
        &self.chain
    }

    pub fn len(&self) -> usize {
        self.chain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    pub fn pending(&self) -> &Mempool {
        &self.pending
    }

    /// Hold back every pending transaction past the first `len`.
    pub fn split_pending_after(&mut self, len: usize) -> Vec<Transaction> {
        self.pending.split_off(len)
    }

    /// Put transactions back into the pool, skipping ids already present.
    pub fn restore_pending(&mut self, transactions: Vec<Transaction>) {
        for tx in transactions {
            self.pending.add_transaction(tx);
        }
    }

    pub fn find_block_by_hash(&self, hash: &str) -> Option<&Block> {
        self.chain.iter().find(|block| block.hash == hash)
    }

    /// Locate a confirmed transaction together with the block holding it.
    pub fn find_transaction_by_id(&self, transaction_id: &str) -> Option<(&Transaction, &Block)> {
        self.chain.iter().find_map(|block| {
            block
                .transactions
                .iter()
                .find(|tx| tx.transaction_id == transaction_id)
                .map(|tx| (tx, block))
        })
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            chain: self.chain.clone(),
            pending_transactions: self.pending.transactions().to_vec(),
            current_node_url: String::new(),
            network_nodes: Vec::new(),
        }
    }
}

fn now_millis() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::miner::proof_of_work;

    fn mine_next(chain: &mut Blockchain) -> Block {
        let previous_hash = chain.last_block().unwrap().hash.clone();
        let data = chain.next_block_data().unwrap();
        let nonce = proof_of_work(&previous_hash, &data).unwrap();
        let hash = hash_block(&previous_hash, &data, nonce).unwrap();
        chain.commit_block(nonce, &previous_hash, &hash).unwrap()
    }

    #[test]
    fn test_genesis_block_invariants() {
        let chain = Blockchain::new();
        let genesis = chain.genesis_block().unwrap();
        assert_eq!(chain.len(), 1);
        assert_eq!(genesis.index, 1);
        assert_eq!(genesis.nonce, 0);
        assert_eq!(genesis.hash, "0");
        assert_eq!(genesis.previous_block_hash, "0");
        assert!(genesis.transactions.is_empty());
        assert_eq!(chain.last_block().unwrap(), genesis);
    }

    #[test]
    fn test_hash_block_matches_wire_vector() {
        let data = BlockData {
            transactions: vec![],
            index: 2,
        };
        assert_eq!(data.canonical_json().unwrap(), r#"{"transactions":[],"index":2}"#);
        assert_eq!(
            hash_block("0", &data, 0).unwrap(),
            "9d858973998eb5bd6cb8e97fbd6bf5eaa5ebe501aa00eb01e1e35d96bc731ccd"
        );
    }

    #[test]
    fn test_new_transaction_does_not_touch_pool() {
        let chain = Blockchain::new();
        let tx = Blockchain::new_transaction(5.0, "a", "b");
        assert_eq!(tx.amount, 5.0);
        assert!(chain.pending().is_empty());
    }

    #[test]
    fn test_enqueue_returns_next_block_index() {
        let mut chain = Blockchain::new();
        let index = chain
            .enqueue_transaction(Transaction::new(10.0, "a", "b"))
            .unwrap();
        assert_eq!(index, 2);
        assert_eq!(chain.pending().len(), 1);
    }

    #[test]
    fn test_enqueue_skips_already_confirmed_transaction() {
        let mut chain = Blockchain::new();
        let tx = Transaction::new(10.0, "a", "b");
        chain.enqueue_transaction(tx.clone()).unwrap();
        mine_next(&mut chain);

        let index = chain.enqueue_transaction(tx.clone()).unwrap();
        assert_eq!(index, 3);
        assert!(chain.pending().is_empty());

        // Mining again must not confirm the same id twice.
        let block = mine_next(&mut chain);
        assert!(block.transactions.is_empty());
        assert_eq!(chain.address_activity("b").address_balance, 10.0);
    }

    #[test]
    fn test_commit_folds_pool_in_order_and_clears_it() {
        let mut chain = Blockchain::new();
        let first = Transaction::new(10.0, "a", "b");
        let second = Transaction::new(3.0, "b", "c");
        chain.enqueue_transaction(first.clone()).unwrap();
        chain.enqueue_transaction(second.clone()).unwrap();

        let block = mine_next(&mut chain);

        assert!(chain.pending().is_empty());
        assert_eq!(block.transactions, vec![first, second]);
        assert_eq!(block.index, 2);
        assert_eq!(block.previous_block_hash, "0");
        assert!(meets_difficulty(&block.hash));
        assert_eq!(chain.last_block().unwrap(), &block);
    }

    #[test]
    fn test_find_block_and_transaction() {
        let mut chain = Blockchain::new();
        let tx = Transaction::new(1.0, "a", "b");
        chain.enqueue_transaction(tx.clone()).unwrap();
        let block = mine_next(&mut chain);

        assert_eq!(chain.find_block_by_hash(&block.hash), Some(&block));
        assert!(chain.find_block_by_hash("missing").is_none());

        let (found, holder) = chain.find_transaction_by_id(&tx.transaction_id).unwrap();
        assert_eq!(found, &tx);
        assert_eq!(holder.index, 2);
        assert!(chain.find_transaction_by_id("missing").is_none());
    }

    #[test]
    fn test_pending_transaction_is_not_found_as_confirmed() {
        let mut chain = Blockchain::new();
        let tx = Transaction::new(1.0, "a", "b");
        chain.enqueue_transaction(tx.clone()).unwrap();
        assert!(chain.find_transaction_by_id(&tx.transaction_id).is_none());
    }

    #[test]
    fn test_append_block_from_peer_clears_pool() {
        let mut producer = Blockchain::new();
        producer
            .enqueue_transaction(Transaction::new(4.0, "x", "y"))
            .unwrap();
        let block = mine_next(&mut producer);

        let mut receiver = Blockchain::new();
        receiver
            .enqueue_transaction(Transaction::new(9.0, "p", "q"))
            .unwrap();
        receiver.append_block(block.clone()).unwrap();

        assert_eq!(receiver.last_block().unwrap(), &block);
        assert!(receiver.pending().is_empty());
    }

    #[test]
    fn test_append_block_rejects_wrong_previous_hash() {
        let mut producer = Blockchain::new();
        mine_next(&mut producer);
        let third = mine_next(&mut producer);

        let mut receiver = Blockchain::new();
        assert!(receiver.append_block(third).is_err());
        assert_eq!(receiver.len(), 1);
    }

    #[test]
    fn test_replace_rejects_empty_chain() {
        let mut chain = Blockchain::new();
        assert!(matches!(chain.replace(vec![], vec![]), Err(ChainError::EmptyChain)));
        assert_eq!(chain.len(), 1);
    }

    #[test]
    fn test_split_and_restore_pending() {
        let mut chain = Blockchain::new();
        let a = Transaction::new(1.0, "a", "b");
        let b = Transaction::new(2.0, "a", "b");
        chain.enqueue_transaction(a.clone()).unwrap();
        chain.enqueue_transaction(b.clone()).unwrap();

        let late = chain.split_pending_after(1);
        assert_eq!(late, vec![b.clone()]);
        assert_eq!(chain.pending().transactions(), &[a.clone()]);

        chain.restore_pending(late);
        assert_eq!(chain.pending().transactions(), &[a, b]);
    }

    #[test]
    fn test_snapshot_uses_wire_field_names() {
        let chain = Blockchain::new();
        let json = serde_json::to_value(chain.snapshot()).unwrap();
        assert!(json["chain"].is_array());
        assert!(json["pendingTransactions"].is_array());
        assert_eq!(json["chain"][0]["previousBlockHash"], "0");
    }
}
