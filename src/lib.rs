//! PeerChain - a replicated proof-of-work ledger reconciled by the longest
//! valid chain
//!
//! # Architecture
//!
//! The crate is organized into logical modules:
//!
//! ## Core Ledger
//! - [`blockchain`] - Blocks, hashing, the ledger and chain validation
//! - [`transaction`] - Transaction types and validation
//! - [`mempool`] - Pending transaction pool
//!
//! ## Consensus & Mining
//! - [`miner`] - Cancellable proof-of-work search
//! - [`consensus`] - Longest-valid-chain selection
//!
//! ## Cryptography
//! - [`crypto`] - SHA-256 helpers and random identifiers
//!
//! ## Networking & Integration
//! - [`network`] - Peer registry, transport and broadcast fan-out
//! - [`node`] - Node orchestration
//! - [`api`] - HTTP routes
//!
//! ## Configuration & Utilities
//! - [`config`] - Configuration management
//! - [`error`] - Error types

#![forbid(unsafe_code)]

// ============================================================================
// Core Ledger
// ============================================================================
pub mod blockchain;
pub mod mempool;
pub mod transaction;

// ============================================================================
// Consensus & Mining
// ============================================================================
pub mod consensus;
pub mod miner;

// ============================================================================
// Cryptography
// ============================================================================
pub mod crypto;

// ============================================================================
// Networking & Integration
// ============================================================================
pub mod api;
pub mod network;
pub mod node;

// ============================================================================
// Configuration & Utilities
// ============================================================================
pub mod config;
pub mod error;
