//! Command-line plumbing shared by the bundled binaries.

use std::path::PathBuf;

use clap::Args;
use tracing_subscriber::EnvFilter;

use crate::error::Result;
use crate::net::tcp::config::{ServerConfig, ServerSettings};

/// Arguments common to every server binary.
#[derive(Debug, Clone, Args)]
pub struct ServerArgs {
    /// Port to listen on
    pub port: u16,

    /// JSON settings file; command-line values take precedence
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Largest string length a peer may declare
    #[arg(long, value_name = "BYTES")]
    pub max_string_len: Option<usize>,
}

impl ServerArgs {
    pub fn server_config(&self) -> Result<ServerConfig> {
        let mut builder = ServerConfig::builder();
        if let Some(path) = &self.config {
            builder = builder.settings(&ServerSettings::from_file(path)?);
        }
        builder = builder.port(self.port);
        if let Some(len) = self.max_string_len {
            builder = builder.max_string_len(len);
        }
        let config = builder.build();
        config.validate()?;
        Ok(config)
    }
}

/// Installs a `fmt` subscriber filtered by `RUST_LOG`, `info` by default.
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
}
