//! Error types for PeerChain

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum ChainError {
    #[error("Invalid block linkage")]
    InvalidBlockLinkage,
    #[error("Invalid proof of work")]
    InvalidProofOfWork,
    #[error("Invalid block: {0}")]
    InvalidBlock(String),
    #[error("Invalid chain: {0}")]
    InvalidChain(String),
    #[error("Invalid transaction: {0}")]
    InvalidTransaction(String),
    #[error("Chain is empty")]
    EmptyChain,
    #[error("Invalid peer address: {0}")]
    InvalidPeer(String),
    #[error("Network error: {0}")]
    NetworkError(String),
    #[error("Mining was cancelled")]
    MiningCancelled,
    #[error("Mining error: {0}")]
    MiningError(String),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("IO error: {0}")]
    IoError(String),
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<std::io::Error> for ChainError {
    fn from(err: std::io::Error) -> Self {
        ChainError::IoError(err.to_string())
    }
}

impl From<serde_json::Error> for ChainError {
    fn from(err: serde_json::Error) -> Self {
        ChainError::SerializationError(err.to_string())
    }
}

impl From<Box<bincode::ErrorKind>> for ChainError {
    fn from(err: Box<bincode::ErrorKind>) -> Self {
        ChainError::SerializationError(err.to_string())
    }
}

impl From<toml::de::Error> for ChainError {
    fn from(err: toml::de::Error) -> Self {
        ChainError::ConfigError(err.to_string())
    }
}

impl From<reqwest::Error> for ChainError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ChainError::NetworkError(format!("request timed out: {}", err))
        } else if err.is_connect() {
            ChainError::NetworkError(format!("connection failed: {}", err))
        } else {
            ChainError::NetworkError(err.to_string())
        }
    }
}

/// Convenience alias used across the crate
pub type Result<T> = std::result::Result<T, ChainError>;
