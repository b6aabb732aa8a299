//! The node orchestrator.
//!
//! A `Node` owns exactly one ledger and one peer registry and exposes every
//! operation the HTTP layer serves. Block commits, block reception and chain
//! replacement all go through a single writer lock, so a block is never
//! committed onto a chain that was swapped out underneath it. Reads only take
//! the ledger's read lock and never see a half-replaced chain.

use crate::blockchain::{AddressActivity, Block, Blockchain, LedgerSnapshot};
use crate::config::Config;
use crate::consensus::{select_longest_valid, ConsensusDecision, ConsensusOutcome};
use crate::crypto::{generate_node_address, Address};
use crate::error::{ChainError, Result};
use crate::miner::MiningJob;
use crate::network::{BlockReceipt, BroadcastOutcome, HttpTransport, NetworkNode, PeerAnnouncement, PeerTransport};
use crate::transaction::Transaction;
use serde::Serialize;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

/// A transaction accepted into the local pool.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedTransaction {
    pub transaction: Transaction,
    /// Advisory index of the block expected to confirm it.
    pub block_index: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionBroadcast {
    pub transaction: Transaction,
    pub block_index: u64,
    pub broadcast: BroadcastOutcome,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MinedBlock {
    pub block: Block,
    pub broadcast: BroadcastOutcome,
}

pub struct Node {
    config: Config,
    node_address: Address,
    reward_address: Address,
    blockchain: RwLock<Blockchain>,
    writer: Mutex<()>,
    network: NetworkNode,
    current_job: parking_lot::Mutex<Option<MiningJob>>,
    blocks_mined: AtomicU64,
}

impl Node {
    pub fn new(config: Config, transport: Arc<dyn PeerTransport>) -> Self {
        let node_address = generate_node_address();
        let reward_address = if config.miner.reward_address.trim().is_empty() {
            node_address.clone()
        } else {
            config.miner.reward_address.trim().to_string()
        };
        let network = NetworkNode::new(
            config.network.node_url(),
            transport,
            config.network.peer_timeout(),
        );

        Self {
            config,
            node_address,
            reward_address,
            blockchain: RwLock::new(Blockchain::new()),
            writer: Mutex::new(()),
            network,
            current_job: parking_lot::Mutex::new(None),
            blocks_mined: AtomicU64::new(0),
        }
    }

    /// A node that talks to its peers over HTTP.
    pub fn with_http_transport(config: Config) -> Result<Self> {
        let transport = HttpTransport::new(config.network.peer_timeout())?;
        Ok(Self::new(config, Arc::new(transport)))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn node_address(&self) -> &str {
        &self.node_address
    }

    pub fn reward_address(&self) -> &str {
        &self.reward_address
    }

    pub fn node_url(&self) -> &str {
        self.network.self_url()
    }

    pub fn network(&self) -> &NetworkNode {
        &self.network
    }

    pub fn blocks_mined(&self) -> u64 {
        self.blocks_mined.load(Ordering::Relaxed)
    }

    // ========================================================================
    // Ledger reads
    // ========================================================================

    pub async fn snapshot(&self) -> LedgerSnapshot {
        let mut snapshot = self.blockchain.read().await.snapshot();
        snapshot.current_node_url = self.node_url().to_string();
        snapshot.network_nodes = self.network.list_peers();
        snapshot
    }

    pub async fn chain_length(&self) -> usize {
        self.blockchain.read().await.len()
    }

    pub async fn pending_count(&self) -> usize {
        self.blockchain.read().await.pending().len()
    }

    pub async fn block_by_hash(&self, hash: &str) -> Option<Block> {
        self.blockchain.read().await.find_block_by_hash(hash).cloned()
    }

    pub async fn transaction_by_id(&self, transaction_id: &str) -> Option<(Transaction, Block)> {
        self.blockchain
            .read()
            .await
            .find_transaction_by_id(transaction_id)
            .map(|(tx, block)| (tx.clone(), block.clone()))
    }

    pub async fn address_activity(&self, address: &str) -> AddressActivity {
        self.blockchain.read().await.address_activity(address)
    }

    // ========================================================================
    // Transactions
    // ========================================================================

    /// Create a transaction and enqueue it locally.
    pub async fn submit_transaction(&self, amount: f64, sender: &str, receiver: &str) -> Result<SubmittedTransaction> {
        let transaction = Blockchain::new_transaction(amount, sender, receiver);
        let block_index = self.relay_transaction(transaction.clone()).await?;
        Ok(SubmittedTransaction {
            transaction,
            block_index,
        })
    }

    /// Enqueue a transaction built elsewhere.
    pub async fn relay_transaction(&self, transaction: Transaction) -> Result<u64> {
        transaction.validate()?;
        self.blockchain.write().await.enqueue_transaction(transaction)
    }

    /// Create, enqueue and send a transaction to every peer.
    pub async fn broadcast_transaction(&self, amount: f64, sender: &str, receiver: &str) -> Result<TransactionBroadcast> {
        let submitted = self.submit_transaction(amount, sender, receiver).await?;
        let broadcast = self.network.broadcast_transaction(&submitted.transaction).await;
        Ok(TransactionBroadcast {
            transaction: submitted.transaction,
            block_index: submitted.block_index,
            broadcast,
        })
    }

    // ========================================================================
    // Mining
    // ========================================================================

    /// Mine the pending pool plus this node's reward into a new block, commit
    /// it, and announce it to every peer.
    ///
    /// The search runs on the blocking pool while this node holds its writer
    /// lock. Transactions that arrive during the search stay pending for the
    /// next block.
    pub async fn mine(&self) -> Result<MinedBlock> {
        let writer = self.writer.lock().await;

        let (previous_hash, mut data) = {
            let chain = self.blockchain.read().await;
            (chain.last_block()?.hash.clone(), chain.next_block_data()?)
        };
        let pending_len = data.transactions.len();
        let reward = Transaction::reward(self.reward_address.clone());
        data.transactions.push(reward.clone());

        let job = MiningJob::new();
        *self.current_job.lock() = Some(job.clone());
        let solved = job.solve(previous_hash.clone(), data).await;
        self.current_job.lock().take();
        let proof = solved?;

        let block = {
            let mut chain = self.blockchain.write().await;
            let late = chain.split_pending_after(pending_len);
            let committed = chain
                .enqueue_transaction(reward)
                .and_then(|_| chain.commit_block(proof.nonce, &previous_hash, &proof.hash));
            chain.restore_pending(late);
            committed?
        };
        self.blocks_mined.fetch_add(1, Ordering::SeqCst);
        drop(writer);

        info!(
            index = block.index,
            hash = %block.hash,
            nonce = block.nonce,
            transactions = block.transactions.len(),
            "mined new block"
        );

        let broadcast = self.network.broadcast_block(&block).await;
        Ok(MinedBlock { block, broadcast })
    }

    /// Whether a proof-of-work search is running. Once this reports `true` the
    /// pool for the block being mined has already been captured.
    pub fn is_mining(&self) -> bool {
        self.current_job.lock().is_some()
    }

    /// Stop an in-flight proof-of-work search, if there is one.
    pub fn cancel_mining(&self) {
        if let Some(job) = self.current_job.lock().as_ref() {
            info!("cancelling mining job");
            job.cancel();
        }
    }

    // ========================================================================
    // Blocks from peers
    // ========================================================================

    /// Append a block announced by a peer if it extends our tip. A rejection
    /// leaves the ledger untouched.
    pub async fn receive_block(&self, block: Block) -> BlockReceipt {
        let _writer = self.writer.lock().await;
        let result = self.blockchain.write().await.append_block(block.clone());

        match result {
            Ok(()) => {
                info!(index = block.index, hash = %block.hash, "accepted block from peer");
                BlockReceipt {
                    note: "New block received and accepted.".to_string(),
                    accepted: true,
                    new_block: block,
                }
            }
            Err(e) => {
                warn!(index = block.index, hash = %block.hash, error = %e, "rejected block from peer");
                BlockReceipt {
                    note: format!("New block rejected: {}", e),
                    accepted: false,
                    new_block: block,
                }
            }
        }
    }

    // ========================================================================
    // Peers
    // ========================================================================

    pub async fn register_and_broadcast_peer(&self, new_peer: &str) -> Result<PeerAnnouncement> {
        self.network.announce_new_peer(new_peer).await
    }

    pub fn register_peer(&self, address: &str) -> bool {
        self.network.registry().register(address)
    }

    pub fn register_peers_bulk(&self, addresses: &[String]) -> usize {
        self.network.registry().register_bulk(addresses)
    }

    /// Ask every configured bootstrap peer to announce this node, then catch
    /// up with one consensus round.
    pub async fn join_network(&self) {
        let bootstrap_peers = self.config.network.bootstrap_peers.clone();
        if bootstrap_peers.is_empty() {
            return;
        }

        for peer in &bootstrap_peers {
            match self.network.join_via(peer).await {
                Ok(()) => info!(peer = %peer, "joined network via bootstrap peer"),
                Err(e) => warn!(peer = %peer, error = %e, "bootstrap peer unreachable"),
            }
        }

        self.resolve_consensus().await;
    }

    // ========================================================================
    // Consensus
    // ========================================================================

    /// Fetch every peer's ledger and adopt the longest valid chain if it is
    /// strictly longer than ours.
    pub async fn resolve_consensus(&self) -> ConsensusDecision {
        let candidates = self.network.fetch_ledgers().await;

        let _writer = self.writer.lock().await;
        let mut chain = self.blockchain.write().await;
        let local_length = chain.len();

        if let Some(adoption) = select_longest_valid(local_length, candidates) {
            let adopted = adoption.chain.clone();
            match chain.replace(adoption.chain, adoption.pending_transactions) {
                Ok(()) => {
                    info!(
                        source = %adoption.source,
                        from = local_length,
                        to = adopted.len(),
                        "replaced local chain"
                    );
                    return ConsensusDecision {
                        outcome: ConsensusOutcome::Replaced,
                        source: Some(adoption.source),
                        chain: adopted,
                    };
                }
                Err(e) => warn!(source = %adoption.source, error = %e, "could not adopt peer chain"),
            }
        }

        info!(length = local_length, "kept local chain");
        ConsensusDecision {
            outcome: ConsensusOutcome::Kept,
            source: None,
            chain: chain.blocks().to_vec(),
        }
    }

    fn spawn_consensus_loop(self: &Arc<Self>) -> Option<tokio::task::JoinHandle<()>> {
        let period = self.config.network.consensus_interval()?;
        let node = self.clone();
        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                node.resolve_consensus().await;
            }
        }))
    }

    // ========================================================================
    // Serving
    // ========================================================================

    /// Serve the HTTP API on `listener` until `shutdown` resolves. Joins the
    /// network through the bootstrap peers once the listener is up, and runs
    /// periodic consensus when configured.
    pub async fn serve<F>(self: Arc<Self>, listener: tokio::net::TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let app = crate::api::build_api_router(self.clone());
        info!(
            url = %self.node_url(),
            address = %self.node_address,
            "node listening"
        );

        let joiner = {
            let node = self.clone();
            tokio::spawn(async move { node.join_network().await })
        };
        let consensus_loop = self.spawn_consensus_loop();

        let served = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await;

        self.cancel_mining();
        joiner.abort();
        if let Some(task) = consensus_loop {
            task.abort();
        }
        served.map_err(ChainError::from)
    }

    /// Resolve once `signal` fires, after cancelling any running mine.
    ///
    /// If the signal cannot be listened for, the returned future never
    /// resolves, so the server keeps running instead of shutting down.
    pub async fn shutdown_on<S>(self: Arc<Self>, signal: S)
    where
        S: Future<Output = std::io::Result<()>>,
    {
        if let Err(e) = signal.await {
            tracing::error!(error = %e, "failed to listen for shutdown signal; graceful shutdown disabled");
            std::future::pending::<()>().await;
        }
        info!("shutdown requested");
        self.cancel_mining();
    }
}
