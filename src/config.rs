//! Process configuration: CLI flags routed into the core, plus the
//! `SOLANA_METRICS_CONFIG` env passthrough (spec §6, "CLI / env").

use std::path::PathBuf;

use clap::Parser;

/// Core-relevant startup configuration. Flag strings are not part of the
/// wire contract; only the fields they populate are.
#[derive(Debug, Clone, Parser)]
#[command(name = "vexor-validator", about = "Solana-compatible validator core")]
pub struct Config {
    /// Directory holding the ledger (PoH entries, tower file, account stores).
    #[arg(long, value_name = "DIR")]
    pub ledger_path: PathBuf,

    /// Directory snapshots are downloaded into and bootstrapped from.
    #[arg(long, value_name = "DIR")]
    pub snapshot_dir: PathBuf,

    /// Path to the validator identity keypair file.
    #[arg(long, value_name = "FILE")]
    pub identity_path: PathBuf,

    /// Vote account pubkey, base58-encoded.
    #[arg(long, value_name = "PUBKEY")]
    pub vote_account: String,

    /// Gossip entrypoint addresses, repeatable.
    #[arg(long = "entrypoint", value_name = "HOST:PORT")]
    pub entrypoints: Vec<String>,

    /// Number of incremental snapshots to retain alongside the newest full one.
    #[arg(long, default_value_t = 2)]
    pub keep_incremental_snapshots: usize,
}

impl Config {
    /// Parses from `std::env::args`, same as any other clap `Parser`. Kept as
    /// a named entry point so callers (and tests) don't need to import
    /// `clap::Parser` themselves.
    pub fn parse_args() -> Self {
        Config::parse()
    }
}

/// Reads the `SOLANA_METRICS_CONFIG` env var. The core only threads this
/// through to the out-of-scope metrics exporter; it doesn't parse the value.
pub fn metrics_config_env() -> Option<String> {
    std::env::var("SOLANA_METRICS_CONFIG").ok()
}
