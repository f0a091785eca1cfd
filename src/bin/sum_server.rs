use anyhow::Context;
use clap::Parser;
use mill_frame::cli::{init_logging, ServerArgs};
use mill_frame::prelude::*;

/// Answers each `[i32][i32]` request with the wrapping sum of both integers.
#[derive(Parser)]
#[command(version)]
struct Cli {
    #[command(flatten)]
    server: ServerArgs,
}

fn main() -> anyhow::Result<()> {
    init_logging();
    let cli = Cli::parse();

    let config = cli.server.server_config()?;
    let mut server = TcpServer::bind(config, Sum).context("failed to start sum server")?;
    tracing::info!(addr = %server.local_addr(), "sum server ready");

    server.run()?;
    Ok(())
}
