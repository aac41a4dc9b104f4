//! Distance-vector routing node binary.
//!
//! Loads and validates the topology file, constructs the single node
//! for this process, and hands control to the event loop. Only
//! configuration problems and a duplicate node construction are fatal;
//! everything after startup is contained within the loop.

use anyhow::Context;
use clap::Parser;
use dvr_session::{Node, NodeConfig};
use dvr_topology::Topology;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Distance-vector routing node
#[derive(Parser, Debug)]
#[command(name = "dvr", version, about = "Distance-vector routing node")]
struct Args {
    /// Topology file declaring the network and this node's links
    #[arg(short, long)]
    topology: PathBuf,

    /// Interval between periodic routing updates, e.g. 10s
    #[arg(short, long)]
    interval: humantime::Duration,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let env_filter = EnvFilter::new("info")
        .add_directive(format!("dvr={}", args.log_level).parse()?)
        .add_directive(format!("dvr_session={}", args.log_level).parse()?)
        .add_directive(format!("dvr_routing={}", args.log_level).parse()?)
        .add_directive(format!("dvr_wire={}", args.log_level).parse()?)
        .add_directive(format!("dvr_topology={}", args.log_level).parse()?);

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();

    info!("Starting dvr v{}", env!("CARGO_PKG_VERSION"));

    let contents = tokio::fs::read_to_string(&args.topology)
        .await
        .with_context(|| format!("failed to read topology file {:?}", args.topology))?;
    let topology = Topology::parse(&contents).context("error processing topology file")?;
    info!(
        "Validated topology: {} servers, {} neighbor links",
        topology.servers.len(),
        topology.links.len()
    );

    let config = NodeConfig::from_topology(topology, args.interval.into())?;
    let node = Node::bind(config).await?;
    node.display();

    node.run().await
}
