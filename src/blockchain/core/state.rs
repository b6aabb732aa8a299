use crate::transaction::Transaction;
use serde::{Deserialize, Serialize};

use super::chain::Blockchain;

/// Confirmed history of one address and the balance it implies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressActivity {
    pub address_transactions: Vec<Transaction>,
    pub address_balance: f64,
}

impl Blockchain {
    /// Every confirmed transaction sending from or to `address`, in chain
    /// order, with balance = received - sent. Pending transactions are not
    /// counted.
    pub fn address_activity(&self, address: &str) -> AddressActivity {
        let mut address_transactions = Vec::new();
        let mut address_balance = 0.0;

        for tx in self.blocks().iter().flat_map(|block| block.transactions.iter()) {
            if !tx.involves(address) {
                continue;
            }
            if tx.receiver == address {
                address_balance += tx.amount;
            }
            if tx.sender == address {
                address_balance -= tx.amount;
            }
            address_transactions.push(tx.clone());
        }

        AddressActivity {
            address_transactions,
            address_balance,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::blockchain::{hash_block, Blockchain};
    use crate::miner::proof_of_work;
    use crate::transaction::Transaction;

    fn mine(chain: &mut Blockchain) {
        let previous_hash = chain.last_block().unwrap().hash.clone();
        let data = chain.next_block_data().unwrap();
        let nonce = proof_of_work(&previous_hash, &data).unwrap();
        let hash = hash_block(&previous_hash, &data, nonce).unwrap();
        chain.commit_block(nonce, &previous_hash, &hash).unwrap();
    }

    #[test]
    fn test_balance_is_received_minus_sent() {
        let mut chain = Blockchain::new();
        chain.enqueue_transaction(Transaction::new(10.0, "alice", "bob")).unwrap();
        chain.enqueue_transaction(Transaction::new(4.5, "bob", "carol")).unwrap();
        chain.enqueue_transaction(Transaction::new(1.0, "carol", "bob")).unwrap();
        mine(&mut chain);

        let bob = chain.address_activity("bob");
        assert_eq!(bob.address_transactions.len(), 3);
        assert_eq!(bob.address_balance, 10.0 - 4.5 + 1.0);

        let alice = chain.address_activity("alice");
        assert_eq!(alice.address_balance, -10.0);
    }

    #[test]
    fn test_pending_transactions_do_not_count() {
        let mut chain = Blockchain::new();
        chain.enqueue_transaction(Transaction::new(10.0, "alice", "bob")).unwrap();
        mine(&mut chain);
        chain.enqueue_transaction(Transaction::new(100.0, "alice", "bob")).unwrap();

        let bob = chain.address_activity("bob");
        assert_eq!(bob.address_balance, 10.0);
        assert_eq!(bob.address_transactions.len(), 1);
    }

    #[test]
    fn test_unknown_address_has_empty_activity() {
        let chain = Blockchain::new();
        let activity = chain.address_activity("nobody");
        assert!(activity.address_transactions.is_empty());
        assert_eq!(activity.address_balance, 0.0);
    }

    #[test]
    fn test_self_transfer_nets_zero() {
        let mut chain = Blockchain::new();
        chain.enqueue_transaction(Transaction::new(3.0, "zed", "zed")).unwrap();
        mine(&mut chain);
        let zed = chain.address_activity("zed");
        assert_eq!(zed.address_transactions.len(), 1);
        assert_eq!(zed.address_balance, 0.0);
    }
}
