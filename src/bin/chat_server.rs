use anyhow::Context;
use clap::Parser;
use mill_frame::cli::{init_logging, ServerArgs};
use mill_frame::prelude::*;

/// Relays every chat message to all connected clients.
#[derive(Parser)]
#[command(version)]
struct Cli {
    #[command(flatten)]
    server: ServerArgs,

    /// Do not send a message back to its author
    #[arg(long)]
    exclude_source: bool,
}

fn main() -> anyhow::Result<()> {
    init_logging();
    let cli = Cli::parse();

    let config = cli.server.server_config()?;
    let policy = Broadcast::<Message>::new(!cli.exclude_source);
    let mut server = TcpServer::bind(config, policy).context("failed to start chat server")?;
    tracing::info!(
        addr = %server.local_addr(),
        include_source = !cli.exclude_source,
        "chat server ready"
    );

    server.run()?;
    Ok(())
}
