//! Pending transaction pool.
//!
//! Insertion ordered; the pool's contents become a block's transaction list
//! verbatim, so order is never rearranged.

use crate::transaction::Transaction;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Mempool {
    transactions: Vec<Transaction>,
}

impl Mempool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_transactions(transactions: Vec<Transaction>) -> Self {
        Self { transactions }
    }

    /// Append a transaction. Returns `false` when a transaction with the same
    /// id is already pending.
    pub fn add_transaction(&mut self, tx: Transaction) -> bool {
        if self.contains(&tx.transaction_id) {
            return false;
        }
        self.transactions.push(tx);
        true
    }

    pub fn contains(&self, transaction_id: &str) -> bool {
        self.get_transaction(transaction_id).is_some()
    }

    pub fn get_transaction(&self, transaction_id: &str) -> Option<&Transaction> {
        self.transactions
            .iter()
            .find(|tx| tx.transaction_id == transaction_id)
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    /// Empty the pool, returning everything it held in order.
    pub fn take_all(&mut self) -> Vec<Transaction> {
        std::mem::take(&mut self.transactions)
    }

    /// Remove and return every transaction after the first `len`.
    pub fn split_off(&mut self, len: usize) -> Vec<Transaction> {
        if len >= self.transactions.len() {
            return Vec::new();
        }
        self.transactions.split_off(len)
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_keeps_insertion_order() {
        let mut pool = Mempool::new();
        let a = Transaction::new(1.0, "a", "b");
        let b = Transaction::new(2.0, "b", "c");
        assert!(pool.add_transaction(a.clone()));
        assert!(pool.add_transaction(b.clone()));
        assert_eq!(pool.transactions(), &[a, b]);
    }

    #[test]
    fn test_duplicate_id_is_ignored() {
        let mut pool = Mempool::new();
        let tx = Transaction::new(1.0, "a", "b");
        assert!(pool.add_transaction(tx.clone()));
        assert!(!pool.add_transaction(tx));
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_take_all_empties_pool() {
        let mut pool = Mempool::new();
        pool.add_transaction(Transaction::new(1.0, "a", "b"));
        let taken = pool.take_all();
        assert_eq!(taken.len(), 1);
        assert!(pool.is_empty());
    }

    #[test]
    fn test_split_off_returns_late_arrivals() {
        let mut pool = Mempool::new();
        let first = Transaction::new(1.0, "a", "b");
        let late = Transaction::new(2.0, "c", "d");
        pool.add_transaction(first.clone());
        pool.add_transaction(late.clone());

        assert_eq!(pool.split_off(1), vec![late]);
        assert_eq!(pool.transactions(), &[first]);
        assert!(pool.split_off(5).is_empty());
    }

    #[test]
    fn test_serializes_as_plain_array() {
        let pool = Mempool::new();
        assert_eq!(serde_json::to_string(&pool).unwrap(), "[]");
    }
}
