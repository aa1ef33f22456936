use std::{path::PathBuf, time::Duration};

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;
use yc_blockchain::{ChainParams, DEFAULT_BLOCK_REWARD, DEFAULT_DIFFICULTY};
use yc_node::{Node, NodeConfig};

/// Yeetcoin node daemon.
#[derive(Parser, Debug)]
#[command(
    name = "yc-node",
    version,
    about = "Yeetcoin single-node ledger and proof-of-work miner",
    long_about = "Loads (or creates) the Yeetcoin chain and wallet from the data \
                  directory, optionally mines, and saves everything on Ctrl-C."
)]
struct Cli {
    /// Directory holding blockchain.json and key.hex.
    #[arg(short, long, default_value = "data", env = "YC_DATA_DIR")]
    data_dir: PathBuf,

    /// Mining difficulty in leading zero bits; also the chain minimum.
    #[arg(short = 'D', long, default_value_t = DEFAULT_DIFFICULTY, env = "YC_DIFFICULTY")]
    difficulty: u32,

    /// Coinbase reward per mined block.
    #[arg(short, long, default_value_t = DEFAULT_BLOCK_REWARD, env = "YC_REWARD")]
    reward: u64,

    /// Most pool transactions per block.
    #[arg(long, default_value_t = 16, env = "YC_MAX_BLOCK_TXS")]
    max_block_txs: usize,

    /// Genesis allocation as ADDRESS=AMOUNT; repeatable.  Only used when a
    /// new chain is created.
    #[arg(long = "allocate", value_parser = parse_allocation)]
    allocations: Vec<(String, u64)>,

    /// Start mining immediately.
    #[arg(short, long, default_value_t = false, env = "YC_MINE")]
    mine: bool,

    /// How often (in seconds) to log a status line. 0 disables it.
    #[arg(long, default_value_t = 60, env = "YC_STATUS_INTERVAL")]
    status_interval: u64,

    /// Suppress log output to stderr (run silently).
    #[arg(short, long, default_value_t = false, env = "YC_QUIET")]
    quiet: bool,
}

fn parse_allocation(raw: &str) -> Result<(String, u64), String> {
    let (address, amount) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected ADDRESS=AMOUNT, got `{raw}`"))?;
    let amount = amount
        .parse()
        .map_err(|e| format!("invalid amount `{amount}`: {e}"))?;
    Ok((address.to_string(), amount))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_filter = if cli.quiet {
        EnvFilter::new("off")
    } else {
        EnvFilter::from_default_env()
            .add_directive("yc_node=info".parse()?)
            .add_directive("yc_blockchain=info".parse()?)
    };
    tracing_subscriber::fmt().with_env_filter(log_filter).init();

    let chain = ChainParams {
        min_difficulty: cli.difficulty,
        block_reward: cli.reward,
        genesis_allocations: cli.allocations,
    };
    let config = NodeConfig {
        data_dir: cli.data_dir,
        chain,
        difficulty: cli.difficulty,
        max_block_transactions: cli.max_block_txs,
        mine_on_start: cli.mine,
        quiet: cli.quiet,
    };

    info!(
        data_dir = %config.data_dir.display(),
        difficulty = config.difficulty,
        reward = config.chain.block_reward,
        "Starting Yeetcoin node"
    );

    let (mut node, mut events) =
        Node::load_or_generate(config).context("failed to load node state")?;

    info!(address = %node.address(), length = node.chain_length(), balance = node.balance(), "Node ready");

    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            info!("NodeEvent: {event:?}");
        }
    });

    if node.config().mine_on_start {
        node.set_mining(true).await?;
    }

    if cli.status_interval == 0 {
        tokio::signal::ctrl_c().await?;
    } else {
        let mut ticker = tokio::time::interval(Duration::from_secs(cli.status_interval));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // Consume the first (immediate) tick so the next fires after the interval.
        ticker.tick().await;

        loop {
            tokio::select! {
                result = tokio::signal::ctrl_c() => {
                    result?;
                    break;
                }
                _ = ticker.tick() => {
                    info!(
                        length = node.chain_length(),
                        tip = %node.tip_hash(),
                        balance = node.balance(),
                        pending = node.pending_transactions().len(),
                        mining = node.is_mining(),
                        "Status"
                    );
                }
            }
        }
    }

    info!("Shutting down");
    node.set_mining(false).await?;
    node.save().context("failed to save node state")?;
    Ok(())
}
