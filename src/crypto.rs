//! Hashing and identifier primitives.
//!
//! Addresses and transaction ids are opaque strings on the wire. This module
//! only produces them; nothing in the protocol signs or verifies authorship.

use rand::RngCore;
use sha2::{Digest, Sha256};

/// Opaque account / node address.
pub type Address = String;

/// Lowercase hex SHA-256 of `data`.
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// 16 random bytes as 32 lowercase hex characters.
pub fn random_id() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Generate the address a node uses as its default reward recipient.
pub fn generate_node_address() -> Address {
    random_id()
}
