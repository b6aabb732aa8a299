//! Integration tests for PeerChain API endpoints
//!
//! These tests drive a single node through its HTTP routes and check the JSON
//! shapes peers and clients rely on.

use axum_test::TestServer;
use peerchain::api::build_api_router;
use peerchain::blockchain::{Block, LedgerSnapshot, GENESIS_HASH, WIRE_VERSION};
use peerchain::config::Config;
use peerchain::node::Node;
use peerchain::transaction::Transaction;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

const TEST_TIMEOUT: Duration = Duration::from_secs(120);

fn test_node() -> Arc<Node> {
    let mut config = Config::default();
    config.network.public_url = Some("http://127.0.0.1:3001".to_string());
    config.network.peer_timeout_ms = 1_000;
    Arc::new(Node::with_http_transport(config).expect("Failed to create node"))
}

fn test_server(node: Arc<Node>) -> TestServer {
    TestServer::new(build_api_router(node)).expect("Failed to create test server")
}

#[tokio::test]
async fn test_health_and_genesis_snapshot() {
    let server = test_server(test_node());

    let response = server.get("/health").await;
    assert_eq!(response.status_code(), 200);
    let json: Value = response.json();
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["wireVersion"], WIRE_VERSION);
    assert_eq!(json["chainLength"], 1);
    assert_eq!(json["isMining"], false);
    assert!(json["timestamp"].is_string());

    let response = server.get("/blockchain").await;
    assert_eq!(response.status_code(), 200);
    let snapshot: LedgerSnapshot = response.json();
    assert_eq!(snapshot.chain.len(), 1);
    assert_eq!(snapshot.chain[0].index, 1);
    assert_eq!(snapshot.chain[0].hash, GENESIS_HASH);
    assert!(snapshot.pending_transactions.is_empty());
    assert_eq!(snapshot.current_node_url, "http://127.0.0.1:3001");
    assert!(snapshot.network_nodes.is_empty());

    let json: Value = server.get("/blockchain").await.json();
    assert!(json["chain"][0]["previousBlockHash"].is_string());
    assert!(json["pendingTransactions"].is_array());
    assert!(json["networkNodes"].is_array());
}

#[tokio::test]
async fn test_local_and_relayed_transactions() {
    let server = test_server(test_node());

    let response = server
        .post("/transaction")
        .json(&json!({ "amount": 10, "sender": "A", "receiver": "B" }))
        .await;
    assert_eq!(response.status_code(), 200);
    let json: Value = response.json();
    assert_eq!(json["blockIndex"], 2);
    assert_eq!(json["transaction"]["amount"], 10);
    assert_eq!(json["transaction"]["transactionId"].as_str().unwrap().len(), 32);

    let relayed = Transaction::new(2.5, "C", "D");
    let response = server.post("/transaction").json(&relayed).await;
    assert_eq!(response.status_code(), 200);
    let json: Value = response.json();
    assert_eq!(json["note"], "Transaction will be added in block 2.");

    // Relaying the same transaction twice keeps one copy.
    server.post("/transaction").json(&relayed).await;

    let snapshot: LedgerSnapshot = server.get("/blockchain").await.json();
    assert_eq!(snapshot.pending_transactions.len(), 2);
    assert_eq!(snapshot.pending_transactions[1], relayed);
}

#[tokio::test]
async fn test_invalid_transaction_is_rejected() {
    let server = test_server(test_node());

    let response = server
        .post("/transaction")
        .json(&json!({ "amount": 1, "sender": "", "receiver": "B", "transactionId": "x" }))
        .expect_failure()
        .await;
    assert_eq!(response.status_code(), 400);
    let json: Value = response.json();
    assert!(json["error"].as_str().unwrap().contains("Sender"));
}

#[tokio::test]
async fn test_mine_then_look_up_block_transaction_and_address() {
    tokio::time::timeout(TEST_TIMEOUT, async {
        let node = test_node();
        let server = test_server(node.clone());

        let response = server
            .post("/transaction/broadcast")
            .json(&json!({ "amount": 10, "sender": "A", "receiver": "B" }))
            .await;
        assert_eq!(response.status_code(), 200);
        let json: Value = response.json();
        let tx_id = json["transaction"]["transactionId"].as_str().unwrap().to_string();
        assert!(json["broadcast"]["delivered"].as_array().unwrap().is_empty());

        let response = server.get("/mine").await;
        assert_eq!(response.status_code(), 200);
        let json: Value = response.json();
        let block: Block = serde_json::from_value(json["block"].clone()).unwrap();
        assert_eq!(block.index, 2);
        assert!(block.hash.starts_with("0000"));
        assert_eq!(block.transactions.len(), 2);
        assert_eq!(block.transactions[1].sender, "00");
        assert_eq!(block.transactions[1].receiver, node.node_address());

        let response = server.get(&format!("/block/{}", block.hash)).await;
        assert_eq!(response.status_code(), 200);
        let json: Value = response.json();
        assert_eq!(json["block"]["nonce"], block.nonce);

        let response = server.get(&format!("/transaction/{}", tx_id)).await;
        assert_eq!(response.status_code(), 200);
        let json: Value = response.json();
        assert_eq!(json["transaction"]["receiver"], "B");
        assert_eq!(json["block"]["hash"], block.hash.as_str());

        let json: Value = server.get("/address/B").await.json();
        assert_eq!(json["addressBalance"], 10.0);
        assert_eq!(json["addressTransactions"].as_array().unwrap().len(), 1);

        let json: Value = server.get(&format!("/address/{}", node.node_address())).await.json();
        assert_eq!(json["addressBalance"], 12.5);

        let json: Value = server.get("/health").await.json();
        assert_eq!(json["chainLength"], 2);
        assert_eq!(json["blocksMined"], 1);
    })
    .await
    .expect("test_mine_then_look_up_block_transaction_and_address timed out");
}

#[tokio::test]
async fn test_lookups_answer_not_found() {
    let server = test_server(test_node());

    let response = server.get("/block/deadbeef").expect_failure().await;
    assert_eq!(response.status_code(), 404);
    let json: Value = response.json();
    assert!(json["error"].is_string());

    let response = server.get("/transaction/nope").expect_failure().await;
    assert_eq!(response.status_code(), 404);

    let json: Value = server.get("/address/nobody").await.json();
    assert_eq!(json["addressBalance"], 0.0);
    assert!(json["addressTransactions"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_rejected_block_answers_with_receipt() {
    let server = test_server(test_node());
    let snapshot: LedgerSnapshot = server.get("/blockchain").await.json();

    let mut block = snapshot.chain[0].clone();
    block.index = 2;
    block.hash = "0000abc".to_string();
    block.previous_block_hash = "wrong".to_string();

    let response = server
        .post("/receive-new-block")
        .json(&json!({ "newBlock": block }))
        .await;
    assert_eq!(response.status_code(), 200);
    let json: Value = response.json();
    assert_eq!(json["accepted"], false);
    assert_eq!(json["newBlock"]["hash"], "0000abc");

    let snapshot: LedgerSnapshot = server.get("/blockchain").await.json();
    assert_eq!(snapshot.chain.len(), 1);
}

#[tokio::test]
async fn test_peer_registration_routes() {
    let server = test_server(test_node());

    let json: Value = server
        .post("/register-node")
        .json(&json!({ "newNodeUrl": "http://127.0.0.1:3002" }))
        .await
        .json();
    assert_eq!(json["registered"], true);

    let json: Value = server
        .post("/register-node")
        .json(&json!({ "newNodeUrl": "http://127.0.0.1:3001" }))
        .await
        .json();
    assert_eq!(json["registered"], false);

    let json: Value = server
        .post("/register-nodes-bulk")
        .json(&json!({
            "allNetworkNodes": ["http://127.0.0.1:3002", "http://127.0.0.1:3003", "http://127.0.0.1:3001"]
        }))
        .await
        .json();
    assert_eq!(json["added"], 1);

    let snapshot: LedgerSnapshot = server.get("/blockchain").await.json();
    assert_eq!(
        snapshot.network_nodes,
        vec!["http://127.0.0.1:3002".to_string(), "http://127.0.0.1:3003".to_string()]
    );

    let response = server
        .post("/register-and-broadcast-node")
        .json(&json!({ "newNodeUrl": "http://127.0.0.1:3001" }))
        .expect_failure()
        .await;
    assert_eq!(response.status_code(), 400);
}

#[tokio::test]
async fn test_unreachable_peer_surfaces_as_bad_gateway() {
    tokio::time::timeout(TEST_TIMEOUT, async {
        let node = test_node();
        node.register_peer("http://127.0.0.1:1");
        let server = test_server(node.clone());

        let response = server
            .post("/transaction/broadcast")
            .json(&json!({ "amount": 3, "sender": "A", "receiver": "B" }))
            .expect_failure()
            .await;
        assert_eq!(response.status_code(), 502);
        let json: Value = response.json();
        assert_eq!(json["broadcast"]["failed"][0]["peer"], "http://127.0.0.1:1");
        // The transaction still landed locally.
        assert_eq!(node.pending_count().await, 1);
    })
    .await
    .expect("test_unreachable_peer_surfaces_as_bad_gateway timed out");
}

#[tokio::test]
async fn test_consensus_without_peers_keeps_chain() {
    let server = test_server(test_node());

    let response = server.get("/consensus").await;
    assert_eq!(response.status_code(), 200);
    let json: Value = response.json();
    assert_eq!(json["outcome"], "kept");
    assert_eq!(json["note"], "Current chain has not been replaced.");
    assert_eq!(json["chain"].as_array().unwrap().len(), 1);
}
