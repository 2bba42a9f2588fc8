//! Command-line configuration for the chain mirror.

use crate::config::{
    Config,
    DEFAULT_BACKFILL_CONCURRENCY,
    DEFAULT_POLL_INTERVAL_MS,
    DEFAULT_RETRY_DELAY_SECS,
};
use clap::{
    ArgAction,
    Parser,
};
use std::{
    path::PathBuf,
    time::Duration,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Node endpoint, `ws(s)://` or `http(s)://`.
    #[arg(long, env = "CHAIN_MIRROR_RPC_SERVER")]
    pub rpc_server: String,

    /// Network id used to pick deployed addresses out of artifacts.
    #[arg(long, env = "CHAIN_MIRROR_NETWORK_ID")]
    pub network_id: u64,

    #[arg(long, env = "CHAIN_MIRROR_WORKSPACE", default_value = "default")]
    pub workspace: String,

    #[arg(long, env = "CHAIN_MIRROR_DB_PATH")]
    pub db_path: Option<PathBuf>,

    /// Truffle or Brownie project whose build artifacts are indexed.
    #[arg(long, env = "CHAIN_MIRROR_PROJECT_ROOT")]
    pub project_root: Option<PathBuf>,

    #[arg(
        long,
        env = "CHAIN_MIRROR_LISTEN_TRANSACTIONS",
        default_value_t = true,
        action = ArgAction::Set
    )]
    pub listen_transactions: bool,

    #[arg(long, env = "CHAIN_MIRROR_RETRY_DELAY_SECS", default_value_t = DEFAULT_RETRY_DELAY_SECS)]
    pub retry_delay_secs: u64,

    #[arg(long, env = "CHAIN_MIRROR_BACKFILL_CONCURRENCY", default_value_t = DEFAULT_BACKFILL_CONCURRENCY)]
    pub backfill_concurrency: usize,

    /// Head polling interval for `http(s)://` endpoints.
    #[arg(long, env = "CHAIN_MIRROR_POLL_INTERVAL_MS", default_value_t = DEFAULT_POLL_INTERVAL_MS)]
    pub poll_interval_ms: u64,
}

impl Args {
    pub fn into_config(self) -> Config {
        Config {
            rpc_server: self.rpc_server,
            network_id: self.network_id,
            workspace: self.workspace,
            db_path: self.db_path,
            project_root: self.project_root,
            listen_transactions: self.listen_transactions,
            retry_delay: Duration::from_secs(self.retry_delay_secs),
            backfill_concurrency: self.backfill_concurrency,
            poll_interval: Duration::from_millis(self.poll_interval_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from([
            "chain-mirror",
            "--rpc-server",
            "ws://127.0.0.1:8546",
            "--network-id",
            "5777",
        ])
        .unwrap();
        let config = args.into_config();

        assert_eq!(config.workspace, "default");
        assert!(config.listen_transactions);
        assert!(config.project_root.is_none());
        assert_eq!(config.retry_delay, Duration::from_secs(5));
        assert_eq!(config.backfill_concurrency, 16);
        assert_eq!(config.poll_interval, Duration::from_secs(1));
    }

    #[test]
    fn test_artifact_watching_only() {
        let args = Args::try_parse_from([
            "chain-mirror",
            "--rpc-server",
            "http://127.0.0.1:8545",
            "--network-id",
            "1",
            "--project-root",
            "/work/token",
            "--listen-transactions",
            "false",
            "--retry-delay-secs",
            "1",
        ])
        .unwrap();
        let config = args.into_config();

        assert!(!config.listen_transactions);
        assert_eq!(config.project_root, Some(PathBuf::from("/work/token")));
        assert_eq!(config.retry_delay, Duration::from_secs(1));
    }

    #[test]
    fn test_rpc_server_is_required() {
        assert!(Args::try_parse_from(["chain-mirror", "--network-id", "1"]).is_err());
    }
}
