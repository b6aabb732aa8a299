//! HTTP surface of a PeerChain node.
//!
//! Thin axum handlers over [`Node`]: every route decodes its JSON body, calls
//! one node operation and encodes the result. Peers talk to each other through
//! these same routes (see [`crate::network::HttpTransport`]).

use axum::{
    extract::{Path, Request, State},
    http::{self, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::blockchain::WIRE_VERSION;
use crate::error::ChainError;
use crate::network::{BulkRegisterRequest, NewBlockRequest, RegisterNodeRequest};
use crate::node::Node;
use crate::transaction::Transaction;

// ============================================================================
// API Error Handling
// ============================================================================

#[derive(Debug)]
pub enum ApiError {
    BlockchainError(ChainError),
    NotFound(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BlockchainError(e) => {
                let status = match &e {
                    ChainError::InvalidTransaction(_)
                    | ChainError::InvalidBlock(_)
                    | ChainError::InvalidBlockLinkage
                    | ChainError::InvalidProofOfWork
                    | ChainError::InvalidChain(_)
                    | ChainError::InvalidPeer(_)
                    | ChainError::EmptyChain => StatusCode::BAD_REQUEST,
                    ChainError::MiningCancelled => StatusCode::SERVICE_UNAVAILABLE,
                    ChainError::NetworkError(_) => StatusCode::BAD_GATEWAY,
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, e.to_string())
            }
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<ChainError> for ApiError {
    fn from(err: ChainError) -> Self {
        ApiError::BlockchainError(err)
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

// ============================================================================
// Request Types
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTransactionRequest {
    pub amount: f64,
    pub sender: String,
    pub receiver: String,
}

/// Body of `POST /transaction`: either a finished transaction relayed by a
/// peer, or the fields of a new one to create here.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TransactionSubmission {
    Relayed(Transaction),
    Local(NewTransactionRequest),
}

/// 200 when every peer took the payload, 502 otherwise. The body is the same.
fn peer_status(complete: bool) -> StatusCode {
    if complete {
        StatusCode::OK
    } else {
        StatusCode::BAD_GATEWAY
    }
}

// ============================================================================
// Middleware
// ============================================================================

async fn logging_middleware(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let response = next.run(req).await;

    tracing::info!(
        method = %method,
        path = %path,
        status = %response.status().as_u16(),
        duration_ms = %start.elapsed().as_millis(),
        "api.request"
    );

    response
}

// ============================================================================
// API Server
// ============================================================================

pub fn build_api_router(node: Arc<Node>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_methods(vec![
            http::Method::GET,
            http::Method::POST,
            http::Method::OPTIONS,
        ])
        .allow_headers(vec![http::header::CONTENT_TYPE])
        .allow_credentials(true);

    Router::new()
        // Ledger
        .route("/blockchain", get(get_blockchain))
        .route("/block/:hash", get(get_block))
        .route("/address/:address", get(get_address))
        // Transactions
        .route("/transaction", post(submit_transaction))
        .route("/transaction/broadcast", post(broadcast_transaction))
        .route("/transaction/:id", get(get_transaction))
        // Mining and blocks
        .route("/mine", get(mine))
        .route("/receive-new-block", post(receive_new_block))
        // Peers
        .route("/register-and-broadcast-node", post(register_and_broadcast_node))
        .route("/register-node", post(register_node))
        .route("/register-nodes-bulk", post(register_nodes_bulk))
        .route("/consensus", get(consensus))
        // System
        .route("/health", get(health_check))
        .layer(middleware::from_fn(logging_middleware))
        .with_state(node)
        .layer(cors)
}

// ============================================================================
// Route Handlers
// ============================================================================

async fn health_check(State(node): State<Arc<Node>>) -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "wireVersion": WIRE_VERSION,
        "chainLength": node.chain_length().await,
        "pendingTransactions": node.pending_count().await,
        "peers": node.network().list_peers().len(),
        "nodeUrl": node.node_url(),
        "nodeAddress": node.node_address(),
        "blocksMined": node.blocks_mined(),
        "isMining": node.is_mining(),
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn get_blockchain(State(node): State<Arc<Node>>) -> impl IntoResponse {
    Json(node.snapshot().await)
}

async fn get_block(
    State(node): State<Arc<Node>>,
    Path(hash): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let block = node
        .block_by_hash(&hash)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("Block {} not found", hash)))?;
    Ok(Json(json!({ "block": block })))
}

async fn get_transaction(
    State(node): State<Arc<Node>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let (transaction, block) = node
        .transaction_by_id(&id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("Transaction {} not found", id)))?;
    Ok(Json(json!({ "transaction": transaction, "block": block })))
}

async fn get_address(
    State(node): State<Arc<Node>>,
    Path(address): Path<String>,
) -> impl IntoResponse {
    Json(node.address_activity(&address).await)
}

async fn submit_transaction(
    State(node): State<Arc<Node>>,
    Json(submission): Json<TransactionSubmission>,
) -> Result<impl IntoResponse, ApiError> {
    let body = match submission {
        TransactionSubmission::Relayed(transaction) => {
            let block_index = node.relay_transaction(transaction).await?;
            json!({
                "note": format!("Transaction will be added in block {}.", block_index),
                "blockIndex": block_index
            })
        }
        TransactionSubmission::Local(request) => {
            let submitted = node
                .submit_transaction(request.amount, &request.sender, &request.receiver)
                .await?;
            json!({
                "note": format!("Transaction will be added in block {}.", submitted.block_index),
                "transaction": submitted.transaction,
                "blockIndex": submitted.block_index
            })
        }
    };
    Ok(Json(body))
}

async fn broadcast_transaction(
    State(node): State<Arc<Node>>,
    Json(request): Json<NewTransactionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let result = node
        .broadcast_transaction(request.amount, &request.sender, &request.receiver)
        .await?;
    let complete = result.broadcast.is_complete();
    let note = if complete {
        "Transaction created and broadcast successfully."
    } else {
        "Transaction created, but not every peer received it."
    };
    Ok((
        peer_status(complete),
        Json(json!({
            "note": note,
            "transaction": result.transaction,
            "blockIndex": result.block_index,
            "broadcast": result.broadcast
        })),
    ))
}

async fn mine(State(node): State<Arc<Node>>) -> Result<impl IntoResponse, ApiError> {
    let mined = node.mine().await?;
    let complete = mined.broadcast.is_complete();
    let note = if complete {
        "New block mined & broadcast successfully"
    } else {
        "New block mined, but not every peer accepted it"
    };
    Ok((
        peer_status(complete),
        Json(json!({
            "note": note,
            "block": mined.block,
            "broadcast": mined.broadcast
        })),
    ))
}

async fn receive_new_block(
    State(node): State<Arc<Node>>,
    Json(request): Json<NewBlockRequest>,
) -> impl IntoResponse {
    Json(node.receive_block(request.new_block).await)
}

async fn register_and_broadcast_node(
    State(node): State<Arc<Node>>,
    Json(request): Json<RegisterNodeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let announcement = node.register_and_broadcast_peer(&request.new_node_url).await?;
    let complete = announcement.is_complete();
    let note = if complete {
        "New node registered with network successfully."
    } else {
        "New node registered, but not every peer acknowledged it."
    };
    Ok((
        peer_status(complete),
        Json(json!({ "note": note, "announcement": announcement })),
    ))
}

async fn register_node(
    State(node): State<Arc<Node>>,
    Json(request): Json<RegisterNodeRequest>,
) -> impl IntoResponse {
    let registered = node.register_peer(&request.new_node_url);
    let note = if registered {
        "New node registered successfully."
    } else {
        "Node already known or is this node."
    };
    Json(json!({ "note": note, "registered": registered }))
}

async fn register_nodes_bulk(
    State(node): State<Arc<Node>>,
    Json(request): Json<BulkRegisterRequest>,
) -> impl IntoResponse {
    let added = node.register_peers_bulk(&request.all_network_nodes);
    Json(json!({ "note": "Bulk registration successful.", "added": added }))
}

async fn consensus(State(node): State<Arc<Node>>) -> impl IntoResponse {
    let decision = node.resolve_consensus().await;
    let note = if decision.replaced() {
        "This chain has been replaced."
    } else {
        "Current chain has not been replaced."
    };
    Json(json!({
        "note": note,
        "outcome": decision.outcome,
        "source": decision.source,
        "chain": decision.chain
    }))
}
