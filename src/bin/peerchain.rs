#![forbid(unsafe_code)]
//! Command-line client for a running PeerChain node.

use clap::{Parser, Subcommand};
use colored::*;
use comfy_table::presets::UTF8_FULL;
use comfy_table::Color as TableColor;
use comfy_table::{Attribute, Cell, ContentArrangement, Table};
use peerchain::blockchain::{AddressActivity, Block, LedgerSnapshot};
use peerchain::network::BroadcastOutcome;
use serde_json::{json, Value};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Node to talk to
    #[arg(long, global = true, default_value = "http://localhost:3001")]
    node: String,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Shows the node's chain, pending pool and peers
    Chain,
    /// Creates a transaction and broadcasts it to the network
    Send {
        amount: f64,
        sender: String,
        receiver: String,
    },
    /// Mines the pending transactions into a new block
    Mine,
    /// Introduces another node to this node's network
    Connect {
        /// URL of the node joining the network
        peer: String,
    },
    /// Runs a longest-chain consensus round on the node
    Consensus,
    /// Shows the confirmed balance and history of an address
    Balance { address: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let node = cli.node.trim_end_matches('/').to_string();

    match cli.command {
        Commands::Chain => {
            let snapshot: LedgerSnapshot = client
                .get(format!("{}/blockchain", node))
                .send()
                .await?
                .json()
                .await?;
            print_chain(&snapshot);
        }
        Commands::Send {
            amount,
            sender,
            receiver,
        } => {
            let body = json!({ "amount": amount, "sender": sender, "receiver": receiver });
            let response = client
                .post(format!("{}/transaction/broadcast", node))
                .json(&body)
                .send()
                .await?;
            let reply = read_reply(response).await?;
            println!("{}", note(&reply).bright_green());
            if let Some(id) = reply["transaction"]["transactionId"].as_str() {
                println!("  {} {}", "id:".bright_white(), id);
            }
            print_broadcast(&reply["broadcast"]);
        }
        Commands::Mine => {
            println!("{}", "⛏️  Mining...".bright_cyan());
            let response = client.get(format!("{}/mine", node)).send().await?;
            let reply = read_reply(response).await?;
            println!("{}", note(&reply).bright_green());
            let block: Block = serde_json::from_value(reply["block"].clone())?;
            println!(
                "  {} #{}  {} {}  {} {}",
                "block".bright_white(),
                block.index,
                "nonce".bright_white(),
                block.nonce,
                "hash".bright_white(),
                block.hash
            );
            print_broadcast(&reply["broadcast"]);
        }
        Commands::Connect { peer } => {
            let response = client
                .post(format!("{}/register-and-broadcast-node", node))
                .json(&json!({ "newNodeUrl": peer }))
                .send()
                .await?;
            let reply = read_reply(response).await?;
            println!("{}", note(&reply).bright_green());
            print_broadcast(&reply["announcement"]["registered"]);
        }
        Commands::Consensus => {
            let reply: Value = client
                .get(format!("{}/consensus", node))
                .send()
                .await?
                .json()
                .await?;
            println!("{}", note(&reply).bright_green());
            let length = reply["chain"].as_array().map(Vec::len).unwrap_or_default();
            println!("  {} {}", "chain length:".bright_white(), length);
            if let Some(source) = reply["source"].as_str() {
                println!("  {} {}", "adopted from:".bright_white(), source);
            }
        }
        Commands::Balance { address } => {
            let activity: AddressActivity = client
                .get(format!("{}/address/{}", node, address))
                .send()
                .await?
                .json()
                .await?;
            print_activity(&address, &activity);
        }
    }

    Ok(())
}

/// Decode a JSON reply; 502 still carries a useful body.
async fn read_reply(response: reqwest::Response) -> Result<Value, Box<dyn std::error::Error>> {
    let status = response.status();
    let reply: Value = response.json().await?;
    if status.is_success() || status == reqwest::StatusCode::BAD_GATEWAY {
        return Ok(reply);
    }
    let message = reply["error"].as_str().unwrap_or("request failed").to_string();
    Err(format!("{} ({})", message, status).into())
}

fn note(reply: &Value) -> String {
    reply["note"].as_str().unwrap_or_default().to_string()
}

fn header(labels: &[&str]) -> Vec<Cell> {
    labels
        .iter()
        .map(|label| {
            Cell::new(label)
                .fg(TableColor::Cyan)
                .add_attribute(Attribute::Bold)
        })
        .collect()
}

fn print_broadcast(value: &Value) {
    let Ok(outcome) = serde_json::from_value::<BroadcastOutcome>(value.clone()) else {
        return;
    };
    if outcome.attempted() == 0 {
        println!("  {}", "no peers to notify".dimmed());
        return;
    }
    for peer in &outcome.delivered {
        println!("  {} {}", "✔".green(), peer);
    }
    for peer in &outcome.rejected {
        println!("  {} {} {}", "✘".yellow(), peer, "(rejected)".yellow());
    }
    for failure in &outcome.failed {
        println!("  {} {} {}", "✘".red(), failure.peer, failure.error.red());
    }
}

fn print_chain(snapshot: &LedgerSnapshot) {
    println!(
        "{} {}",
        "📦 Chain of".bright_cyan().bold(),
        snapshot.current_node_url.bright_white()
    );

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header(&["Index", "Hash", "Previous", "Nonce", "Txs"]));
    for block in &snapshot.chain {
        table.add_row(vec![
            Cell::new(block.index),
            Cell::new(&block.hash),
            Cell::new(&block.previous_block_hash),
            Cell::new(block.nonce),
            Cell::new(block.transactions.len()),
        ]);
    }
    println!("{table}");

    println!(
        "{} {}",
        "pending transactions:".bright_white(),
        snapshot.pending_transactions.len()
    );
    if snapshot.network_nodes.is_empty() {
        println!("{}", "no peers".dimmed());
    } else {
        println!("{}", "peers:".bright_white());
        for peer in &snapshot.network_nodes {
            println!("  - {}", peer);
        }
    }
}

fn print_activity(address: &str, activity: &AddressActivity) {
    println!("{} {}", "📍 Address:".cyan(), address);
    println!(
        "{} {}",
        "💰 Balance:".bright_green().bold(),
        activity.address_balance
    );

    if activity.address_transactions.is_empty() {
        println!("{}", "no confirmed transactions".dimmed());
        return;
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header(&["Id", "From", "To", "Amount"]));
    for tx in &activity.address_transactions {
        let amount = if tx.receiver == address {
            Cell::new(format!("+{}", tx.amount)).fg(TableColor::Green)
        } else {
            Cell::new(format!("-{}", tx.amount)).fg(TableColor::Red)
        };
        table.add_row(vec![
            Cell::new(&tx.transaction_id),
            Cell::new(&tx.sender),
            Cell::new(&tx.receiver),
            amount,
        ]);
    }
    println!("{table}");
}
