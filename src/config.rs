//! Server configuration.
//!
//! Every setting can come from a command-line flag or an environment
//! variable; flags win.

use crate::connection::ConnectionConfig;
use crate::storage::StorageConfig;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "ledgerline",
    version,
    about = "Ledgerline - personal finance ledger server"
)]
pub struct Cli {
    /// Host to bind to
    #[arg(long, env = "LEDGER_HOST", default_value = crate::DEFAULT_HOST)]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, env = "LEDGER_PORT", default_value_t = crate::DEFAULT_PORT)]
    pub port: u16,

    /// Path of the SQLite database file
    #[arg(long, env = "LEDGER_DB", default_value = "ledger.db")]
    pub db: PathBuf,

    /// Seconds a connection may stay silent before it is closed
    #[arg(long, env = "LEDGER_IDLE_TIMEOUT", default_value_t = 30)]
    pub idle_timeout: u64,

    /// Log filter, e.g. `info` or `ledgerline=debug`
    #[arg(short, long, env = "LEDGER_LOG", default_value = "info")]
    pub log_level: String,
}

/// Resolved server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub storage: StorageConfig,
    pub connection: ConnectionConfig,
}

impl Config {
    /// Returns the bind address as a string
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl From<Cli> for Config {
    fn from(cli: Cli) -> Self {
        Self {
            host: cli.host,
            port: cli.port,
            log_level: cli.log_level,
            storage: StorageConfig::new(cli.db),
            connection: ConnectionConfig {
                idle_timeout: Duration::from_secs(cli.idle_timeout),
                ..ConnectionConfig::default()
            },
        }
    }
}
