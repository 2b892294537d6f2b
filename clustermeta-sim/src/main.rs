//! clustermeta simulator
//!
//! Boots an in-memory cluster, renames and retags a server through
//! `server_config`, creates a table through `table_config`, and prints both
//! tables once every node agrees.
//!
//! Usage:
//!   clustermeta-sim --servers 3 --format name

use anyhow::Result;
use clap::Parser;
use clustermeta_admin::IdentifierFormat;
use clustermeta_sim::{SimOptions, run};
use std::time::Duration;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "clustermeta-sim")]
#[command(about = "Simulate a clustermeta cluster in memory")]
struct Args {
    /// Number of servers to start
    #[arg(short, long, default_value = "3")]
    servers: usize,

    /// How rows refer to databases and servers (`name` or `uuid`)
    #[arg(short, long, default_value = "name")]
    format: IdentifierFormat,

    /// Seconds to wait for each step to settle
    #[arg(long, default_value = "10")]
    timeout_secs: u64,

    /// Enable verbose debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .compact()
        .init();

    info!(servers = args.servers, format = %args.format, "starting simulation");
    let options = SimOptions {
        servers: args.servers,
        format: args.format,
        timeout: Duration::from_secs(args.timeout_secs),
    };
    let report = run(&options).await?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
