use std::io::{self, BufRead};
use std::net::ToSocketAddrs;
use std::thread;

use anyhow::Context;
use clap::Parser;
use mill_frame::cli::init_logging;
use mill_frame::prelude::*;

/// Sends each line read from stdin as a chat message and prints what the
/// server relays back.
#[derive(Parser)]
#[command(version)]
struct Cli {
    /// Name attached to every message
    login: String,
    host: String,
    port: u16,

    /// Largest string length accepted from the server
    #[arg(long, value_name = "BYTES")]
    max_string_len: Option<usize>,
}

fn main() -> anyhow::Result<()> {
    init_logging();
    let cli = Cli::parse();

    let addr = (cli.host.as_str(), cli.port)
        .to_socket_addrs()
        .with_context(|| format!("cannot resolve {}", cli.host))?
        .next()
        .with_context(|| format!("no address for {}", cli.host))?;

    let mut config = ClientConfig::new(addr);
    if let Some(len) = cli.max_string_len {
        config.max_string_len = len;
    }

    let mut client = TcpClient::<Message, Message>::connect(config, |message| {
        println!("{message}");
    })
    .with_context(|| format!("failed to connect to {addr}"))?;

    let handle = client.handle();
    let login = cli.login;
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if handle.send(Message::new(login.as_str(), line)).is_err() {
                return;
            }
        }
        // stdin closed: flush what is queued and hang up
        let _ = handle.close();
    });

    client.run()?;
    Ok(())
}
