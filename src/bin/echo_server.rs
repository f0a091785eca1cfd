use anyhow::Context;
use clap::Parser;
use mill_frame::cli::{init_logging, ServerArgs};
use mill_frame::prelude::*;

/// Sends every chat message back to the connection it came from.
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
    let mut server =
        TcpServer::bind(config, Echo::<Message>::new()).context("failed to start echo server")?;
    tracing::info!(addr = %server.local_addr(), "echo server ready");

    server.run()?;
    Ok(())
}
