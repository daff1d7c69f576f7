//! CLI entry point: parses node arguments, builds the selected chain
//! spec, wires an [`execution_node::ExecutionNode`] and runs it until
//! `Ctrl-C`. No JSON-RPC, devp2p or storage-engine integration lives
//! here — those surfaces stay external per the node crate's own scope.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use execution_chainspec::{ChainSpec, DEV, MAINNET, SEPOLIA};
use execution_node::{ExecutionNode, NodeConfig};

/// Which built-in chain this node should run. Loading an arbitrary
/// genesis file is a natural extension but isn't implemented here —
/// the three named specs cover every test fixture this exercise needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Chain {
    Mainnet,
    Sepolia,
    Dev,
}

impl Chain {
    fn spec(self) -> ChainSpec {
        match self {
            Self::Mainnet => MAINNET.clone(),
            Self::Sepolia => SEPOLIA.clone(),
            Self::Dev => DEV.clone(),
        }
    }
}

/// `execution-core [OPTIONS]`
#[derive(Debug, Parser)]
#[command(author, version, about = "A minimal execution-layer node core")]
struct Args {
    /// Which chain to run.
    #[arg(long, value_enum, default_value_t = Chain::Dev)]
    chain: Chain,

    /// Directory holding node state: the JWT secret file lives here.
    #[arg(long, default_value = "data")]
    datadir: PathBuf,

    /// Path to the Engine API JWT secret, generated on first run if
    /// absent (§6). Defaults to `<datadir>/jwt.hex`.
    #[arg(long)]
    jwt_secret: Option<PathBuf>,
}

fn main() -> eyre::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    std::fs::create_dir_all(&args.datadir)?;
    let jwt_secret_path = args.jwt_secret.unwrap_or_else(|| args.datadir.join("jwt.hex"));

    let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
    runtime.block_on(run(args.chain, jwt_secret_path))
}

async fn run(chain: Chain, jwt_secret_path: PathBuf) -> eyre::Result<()> {
    let config = NodeConfig {
        chain_spec: Arc::new(chain.spec()),
        jwt_secret_path,
        cache_limits: Default::default(),
        pool_config: Default::default(),
        beacon_config: Default::default(),
        miner_config: Default::default(),
    };

    let node = ExecutionNode::build(config)?;
    tracing::info!(chain = ?chain, "starting execution-core");

    let running = node.run();
    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown requested, waiting for the in-flight block to finish");
    running.shutdown().await;

    Ok(())
}
