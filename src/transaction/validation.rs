use crate::error::ChainError;

use super::types::{Transaction, MAX_TRANSACTION_SIZE};

impl Transaction {
    /// Structural checks applied before a transaction enters a pending pool.
    pub fn validate(&self) -> Result<(), ChainError> {
        if !self.amount.is_finite() {
            return Err(ChainError::InvalidTransaction(format!(
                "Amount must be a finite number, got {}",
                self.amount
            )));
        }

        if self.sender.trim().is_empty() {
            return Err(ChainError::InvalidTransaction("Sender address is empty".to_string()));
        }

        if self.receiver.trim().is_empty() {
            return Err(ChainError::InvalidTransaction("Receiver address is empty".to_string()));
        }

        if self.transaction_id.trim().is_empty() {
            return Err(ChainError::InvalidTransaction("Transaction id is empty".to_string()));
        }

        self.validate_size()
    }

    /// Validate transaction size to prevent DoS attacks
    pub fn validate_size(&self) -> Result<(), ChainError> {
        let serialized = bincode::serialize(self)
            .map_err(|e| ChainError::InvalidTransaction(format!("Serialization failed: {}", e)))?;

        if serialized.len() > MAX_TRANSACTION_SIZE {
            return Err(ChainError::InvalidTransaction(format!(
                "Transaction too large: {} bytes (max: {})",
                serialized.len(),
                MAX_TRANSACTION_SIZE
            )));
        }
        Ok(())
    }
}
