//! Peer registry, peer transport, and the broadcast dispatcher.
//!
//! Every fan-out contacts all peers concurrently and independently: a slow or
//! failing peer never blocks the others, and the per-peer results are handed
//! back to the caller rather than collapsed into a single error.

use crate::blockchain::{Block, LedgerSnapshot};
use crate::error::{ChainError, Result};
use crate::transaction::Transaction;
use futures_util::future::{join_all, BoxFuture};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// Wire payloads
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterNodeRequest {
    pub new_node_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkRegisterRequest {
    pub all_network_nodes: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBlockRequest {
    pub new_block: Block,
}

/// A peer's verdict on a block it was sent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockReceipt {
    pub note: String,
    pub accepted: bool,
    pub new_block: Block,
}

// ============================================================================
// Peer registry
// ============================================================================

/// Deduplicated, insertion-ordered set of peer URLs, never containing the
/// local node's own URL. Peers are never removed.
#[derive(Debug)]
pub struct PeerRegistry {
    self_url: String,
    peers: RwLock<Vec<String>>,
}

impl PeerRegistry {
    pub fn new(self_url: impl Into<String>) -> Self {
        Self {
            self_url: normalize_url(&self_url.into()),
            peers: RwLock::new(Vec::new()),
        }
    }

    pub fn self_url(&self) -> &str {
        &self.self_url
    }

    /// Add `address`. Returns `false` if it is already known, is this node,
    /// or is blank.
    pub fn register(&self, address: &str) -> bool {
        let address = normalize_url(address);
        if address.is_empty() || address == self.self_url {
            return false;
        }

        let mut peers = self.peers.write();
        if peers.contains(&address) {
            return false;
        }
        peers.push(address);
        true
    }

    /// Register each address under the same rules; returns how many were new.
    pub fn register_bulk<I, S>(&self, addresses: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        addresses
            .into_iter()
            .filter(|address| self.register(address.as_ref()))
            .count()
    }

    pub fn contains(&self, address: &str) -> bool {
        self.peers.read().contains(&normalize_url(address))
    }

    pub fn list(&self) -> Vec<String> {
        self.peers.read().clone()
    }

    pub fn len(&self) -> usize {
        self.peers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.read().is_empty()
    }
}

fn normalize_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

// ============================================================================
// Transport
// ============================================================================

/// The calls one node makes against another.
pub trait PeerTransport: Send + Sync {
    fn fetch_ledger<'a>(&'a self, peer: &'a str) -> BoxFuture<'a, Result<LedgerSnapshot>>;

    fn send_transaction<'a>(&'a self, peer: &'a str, tx: &'a Transaction) -> BoxFuture<'a, Result<()>>;

    /// Returns whether the peer accepted the block.
    fn send_block<'a>(&'a self, peer: &'a str, block: &'a Block) -> BoxFuture<'a, Result<bool>>;

    fn register_peer<'a>(&'a self, peer: &'a str, new_peer: &'a str) -> BoxFuture<'a, Result<()>>;

    fn register_peers_bulk<'a>(&'a self, peer: &'a str, peers: &'a [String]) -> BoxFuture<'a, Result<()>>;

    /// Ask `peer` to register `new_peer` and announce it to its network.
    fn request_announcement<'a>(&'a self, peer: &'a str, new_peer: &'a str) -> BoxFuture<'a, Result<()>>;
}

/// JSON-over-HTTP transport speaking to the routes served by [`crate::api`].
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http_client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout.min(Duration::from_secs(5)))
            .build()?;
        Ok(Self { http_client })
    }

    async fn post_json<B: Serialize + ?Sized>(&self, url: String, body: &B) -> Result<reqwest::Response> {
        let response = self.http_client.post(&url).json(body).send().await?;
        Ok(response.error_for_status()?)
    }
}

fn endpoint(peer: &str, path: &str) -> String {
    format!("{}{}", peer.trim_end_matches('/'), path)
}

impl PeerTransport for HttpTransport {
    fn fetch_ledger<'a>(&'a self, peer: &'a str) -> BoxFuture<'a, Result<LedgerSnapshot>> {
        Box::pin(async move {
            let response = self
                .http_client
                .get(endpoint(peer, "/blockchain"))
                .send()
                .await?
                .error_for_status()?;
            Ok(response.json::<LedgerSnapshot>().await?)
        })
    }

    fn send_transaction<'a>(&'a self, peer: &'a str, tx: &'a Transaction) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.post_json(endpoint(peer, "/transaction"), tx).await?;
            Ok(())
        })
    }

    fn send_block<'a>(&'a self, peer: &'a str, block: &'a Block) -> BoxFuture<'a, Result<bool>> {
        Box::pin(async move {
            let body = NewBlockRequest {
                new_block: block.clone(),
            };
            let receipt = self
                .post_json(endpoint(peer, "/receive-new-block"), &body)
                .await?
                .json::<BlockReceipt>()
                .await?;
            Ok(receipt.accepted)
        })
    }

    fn register_peer<'a>(&'a self, peer: &'a str, new_peer: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let body = RegisterNodeRequest {
                new_node_url: new_peer.to_string(),
            };
            self.post_json(endpoint(peer, "/register-node"), &body).await?;
            Ok(())
        })
    }

    fn register_peers_bulk<'a>(&'a self, peer: &'a str, peers: &'a [String]) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let body = BulkRegisterRequest {
                all_network_nodes: peers.to_vec(),
            };
            self.post_json(endpoint(peer, "/register-nodes-bulk"), &body).await?;
            Ok(())
        })
    }

    fn request_announcement<'a>(&'a self, peer: &'a str, new_peer: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let body = RegisterNodeRequest {
                new_node_url: new_peer.to_string(),
            };
            self.post_json(endpoint(peer, "/register-and-broadcast-node"), &body)
                .await?;
            Ok(())
        })
    }
}

// ============================================================================
// Broadcast dispatcher
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerFailure {
    pub peer: String,
    pub error: String,
}

/// Per-peer result of one fan-out.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastOutcome {
    /// Peers that took the payload.
    pub delivered: Vec<String>,
    /// Peers that answered but refused the payload.
    pub rejected: Vec<String>,
    /// Peers that could not be reached or answered with an error.
    pub failed: Vec<PeerFailure>,
}

impl BroadcastOutcome {
    /// `true` only when every peer took the payload.
    pub fn is_complete(&self) -> bool {
        self.rejected.is_empty() && self.failed.is_empty()
    }

    pub fn attempted(&self) -> usize {
        self.delivered.len() + self.rejected.len() + self.failed.len()
    }
}

/// Outcome of the two-phase peer announcement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerAnnouncement {
    pub new_peer: String,
    /// Phase one: existing peers told to register the new one.
    pub registered: BroadcastOutcome,
    /// Phase two: the new peer told about the whole network.
    pub bulk_registered: bool,
    pub bulk_error: Option<String>,
}

impl PeerAnnouncement {
    pub fn is_complete(&self) -> bool {
        self.registered.is_complete() && self.bulk_registered
    }
}

/// Fans payloads out to every registered peer.
pub struct NetworkNode {
    registry: PeerRegistry,
    transport: Arc<dyn PeerTransport>,
    peer_timeout: Duration,
}

impl NetworkNode {
    pub fn new(self_url: impl Into<String>, transport: Arc<dyn PeerTransport>, peer_timeout: Duration) -> Self {
        Self {
            registry: PeerRegistry::new(self_url),
            transport,
            peer_timeout,
        }
    }

    pub fn registry(&self) -> &PeerRegistry {
        &self.registry
    }

    pub fn self_url(&self) -> &str {
        self.registry.self_url()
    }

    pub fn list_peers(&self) -> Vec<String> {
        self.registry.list()
    }

    /// Run one call per peer concurrently, each bounded by the peer timeout.
    async fn fan_out<'a, T, F>(&'a self, peers: &'a [String], call: F) -> Vec<(&'a str, Result<T>)>
    where
        F: Fn(&'a str) -> BoxFuture<'a, Result<T>>,
    {
        join_all(peers.iter().map(|peer| {
            let request = self.bounded(call(peer.as_str()));
            async move { (peer.as_str(), request.await) }
        }))
        .await
    }

    async fn bounded<T>(&self, request: BoxFuture<'_, Result<T>>) -> Result<T> {
        match tokio::time::timeout(self.peer_timeout, request).await {
            Ok(result) => result,
            Err(_) => Err(ChainError::NetworkError(format!(
                "no answer within {} ms",
                self.peer_timeout.as_millis()
            ))),
        }
    }

    pub async fn broadcast_transaction(&self, tx: &Transaction) -> BroadcastOutcome {
        let peers = self.registry.list();
        let results = self
            .fan_out(&peers, |peer| self.transport.send_transaction(peer, tx))
            .await;

        let outcome = collect_outcome(results.into_iter().map(|(peer, r)| (peer, r.map(|_| true))));
        tracing::info!(
            transaction_id = %tx.transaction_id,
            delivered = outcome.delivered.len(),
            failed = outcome.failed.len(),
            "transaction broadcast"
        );
        outcome
    }

    pub async fn broadcast_block(&self, block: &Block) -> BroadcastOutcome {
        let peers = self.registry.list();
        let results = self
            .fan_out(&peers, |peer| self.transport.send_block(peer, block))
            .await;

        let outcome = collect_outcome(results);
        tracing::info!(
            index = block.index,
            hash = %block.hash,
            delivered = outcome.delivered.len(),
            rejected = outcome.rejected.len(),
            failed = outcome.failed.len(),
            "block broadcast"
        );
        outcome
    }

    /// Two phases: register `new_peer` here and at every existing peer, then,
    /// only once all of them acknowledged, hand `new_peer` the full peer set
    /// (including this node).
    pub async fn announce_new_peer(&self, new_peer: &str) -> Result<PeerAnnouncement> {
        let new_peer = normalize_url(new_peer);
        if new_peer.is_empty() {
            return Err(ChainError::InvalidPeer("peer address is empty".to_string()));
        }
        if new_peer == self.self_url() {
            return Err(ChainError::InvalidPeer(format!(
                "{} is this node's own address",
                new_peer
            )));
        }

        self.registry.register(&new_peer);

        let existing: Vec<String> = self
            .registry
            .list()
            .into_iter()
            .filter(|peer| *peer != new_peer)
            .collect();
        let results = self
            .fan_out(&existing, |peer| self.transport.register_peer(peer, &new_peer))
            .await;
        let registered = collect_outcome(results.into_iter().map(|(peer, r)| (peer, r.map(|_| true))));

        let mut announcement = PeerAnnouncement {
            new_peer: new_peer.clone(),
            registered,
            bulk_registered: false,
            bulk_error: None,
        };

        if !announcement.registered.is_complete() {
            tracing::warn!(
                new_peer = %new_peer,
                failed = announcement.registered.failed.len(),
                "not every peer registered the new node; skipping bulk registration"
            );
            return Ok(announcement);
        }

        let mut all_nodes = self.registry.list();
        all_nodes.push(self.self_url().to_string());
        match self
            .bounded(self.transport.register_peers_bulk(&new_peer, &all_nodes))
            .await
        {
            Ok(()) => announcement.bulk_registered = true,
            Err(e) => {
                tracing::warn!(new_peer = %new_peer, error = %e, "bulk registration failed");
                announcement.bulk_error = Some(e.to_string());
            }
        }

        tracing::info!(
            new_peer = %new_peer,
            peers = all_nodes.len() - 1,
            complete = announcement.is_complete(),
            "peer announced"
        );
        Ok(announcement)
    }

    /// Ask `bootstrap_peer` to announce this node to its network.
    pub async fn join_via(&self, bootstrap_peer: &str) -> Result<()> {
        self.bounded(
            self.transport
                .request_announcement(bootstrap_peer, self.self_url()),
        )
        .await
    }

    /// Fetch every peer's ledger. Peers that fail are logged and left out.
    pub async fn fetch_ledgers(&self) -> Vec<(String, LedgerSnapshot)> {
        let peers = self.registry.list();
        let results = self
            .fan_out(&peers, |peer| self.transport.fetch_ledger(peer))
            .await;

        results
            .into_iter()
            .filter_map(|(peer, result)| match result {
                Ok(snapshot) => Some((peer.to_string(), snapshot)),
                Err(e) => {
                    tracing::warn!(peer = %peer, error = %e, "could not fetch peer ledger");
                    None
                }
            })
            .collect()
    }
}

fn collect_outcome<'a, I>(results: I) -> BroadcastOutcome
where
    I: IntoIterator<Item = (&'a str, Result<bool>)>,
{
    let mut outcome = BroadcastOutcome::default();
    for (peer, result) in results {
        match result {
            Ok(true) => outcome.delivered.push(peer.to_string()),
            Ok(false) => outcome.rejected.push(peer.to_string()),
            Err(e) => {
                tracing::warn!(peer = %peer, error = %e, "peer call failed");
                outcome.failed.push(PeerFailure {
                    peer: peer.to_string(),
                    error: e.to_string(),
                });
            }
        }
    }
    outcome
}
