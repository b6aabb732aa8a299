/// Transaction types for PeerChain
use crate::crypto::{random_id, Address};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::value::RawValue;

/// Maximum transaction size in bytes (100KB) to prevent DoS
pub const MAX_TRANSACTION_SIZE: usize = 100_000;

/// Amount credited to the miner of every block.
pub const MINING_REWARD: f64 = 12.5;

/// Sender of a system-minted reward; it has no real source account.
pub const REWARD_SENDER: &str = "00";

/// A value transfer between two opaque addresses.
///
/// Field order is part of the hashing contract: blocks are hashed over the
/// JSON form of their transactions, so it must never change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    #[serde(serialize_with = "serialize_amount")]
    pub amount: f64,
    pub sender: Address,
    pub receiver: Address,
    pub transaction_id: String,
}

impl Transaction {
    /// Build a transaction with a freshly allocated id. It is not attached to
    /// any pool until it is enqueued.
    pub fn new(amount: f64, sender: impl Into<Address>, receiver: impl Into<Address>) -> Self {
        Transaction {
            amount,
            sender: sender.into(),
            receiver: receiver.into(),
            transaction_id: random_id(),
        }
    }

    /// The block reward for `miner`.
    pub fn reward(miner: impl Into<Address>) -> Self {
        Self::new(MINING_REWARD, REWARD_SENDER, miner)
    }

    pub fn is_reward(&self) -> bool {
        self.sender == REWARD_SENDER
    }

    pub fn involves(&self, address: &str) -> bool {
        self.sender == address || self.receiver == address
    }
}

/// Amounts go on the wire verbatim as [`format_amount`] renders them.
fn serialize_amount<S: Serializer>(amount: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    let raw = RawValue::from_string(format_amount(*amount)).map_err(serde::ser::Error::custom)?;
    raw.serialize(serializer)
}

/// Render an amount the way JavaScript's `Number.prototype.toString` does.
///
/// Block hashes cover the JSON text of every amount, so all nodes must agree
/// on it byte for byte: `10` rather than `10.0`, `0.0000015` rather than
/// `1.5e-6`, and `1e+21` once the value leaves plain-decimal range.
/// Non-finite values have no JSON form and become `null`.
pub fn format_amount(amount: f64) -> String {
    if !amount.is_finite() {
        return "null".to_string();
    }
    if amount == 0.0 {
        return "0".to_string();
    }

    // `{:e}` gives the shortest digits that round-trip, e.g. `1.5e-6`.
    let scientific = format!("{:e}", amount.abs());
    let (mantissa, exponent) = scientific.split_once('e').unwrap_or((scientific.as_str(), "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);
    let digits: String = mantissa.chars().filter(|c| *c != '.').collect();
    let k = digits.len() as i32;
    let n = exponent + 1;

    let body = if k <= n && n <= 21 {
        format!("{}{}", digits, "0".repeat((n - k) as usize))
    } else if 0 < n && n <= 21 {
        let (whole, fraction) = digits.split_at(n as usize);
        format!("{}.{}", whole, fraction)
    } else if -6 < n && n <= 0 {
        format!("0.{}{}", "0".repeat(n.unsigned_abs() as usize), digits)
    } else {
        let sign = if n > 0 { '+' } else { '-' };
        let magnitude = (n - 1).unsigned_abs();
        match digits.split_at(1) {
            (lead, "") => format!("{}e{}{}", lead, sign, magnitude),
            (lead, rest) => format!("{}.{}e{}{}", lead, rest, sign, magnitude),
        }
    };

    if amount < 0.0 {
        format!("-{}", body)
    } else {
        body
    }
}
