//! Node-local runtime configuration (spec.md §6 "Configuration"). Separate
//! from `ledger_common::config`, which holds protocol-wide constants that
//! every node must agree on; this module holds per-node operational knobs
//! that do not affect consensus determinism.

use std::time::Duration;

use serde::{Deserialize, Serialize};

// Millis per second, kept as a named constant so it's never a mystery 1000
// literal scattered through duration math (mirrors the teacher's
// `MILLIS_PER_SECOND` convention in `tos_daemon::config`).
pub const MILLIS_PER_SECOND: u64 = 1000;

/// Solver round timing (spec.md §5).
pub const ROUND_DELAY_MS: u64 = 1000;
pub const TIME_TO_AWAIT_ACTIVITY_MS: u64 = 300;
pub const TIME_TO_AWAIT_SS_ROUND_MS: u64 = 5000;

pub fn round_delay() -> Duration {
    Duration::from_millis(ROUND_DELAY_MS)
}

pub fn time_to_await_activity() -> Duration {
    Duration::from_millis(TIME_TO_AWAIT_ACTIVITY_MS)
}

pub fn time_to_await_ss_round() -> Duration {
    Duration::from_millis(TIME_TO_AWAIT_SS_ROUND_MS)
}

/// Executor RPC endpoint settings (spec.md §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    pub host: String,
    pub port: u16,
    pub send_timeout_ms: u64,
    pub receive_timeout_ms: u64,
    pub cmd_line: String,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        ExecutorConfig {
            host: "localhost".into(),
            port: 9080,
            send_timeout_ms: ledger_common::config::DEFAULT_EXECUTOR_SEND_TIMEOUT_MS,
            receive_timeout_ms: ledger_common::config::DEFAULT_EXECUTOR_RECEIVE_TIMEOUT_MS,
            cmd_line: String::new(),
        }
    }
}

/// API/transport bind ports (spec.md §6). No handler logic lives behind
/// these — binding/serving an API surface is explicitly out of scope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub api_port: u16,
    pub ajax_port: u16,
    pub apiexec_port: u16,
    pub server_send_timeout_ms: u64,
    pub server_receive_timeout_ms: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        ApiConfig {
            api_port: 9090,
            ajax_port: 8081,
            apiexec_port: 9070,
            server_send_timeout_ms: 30_000,
            server_receive_timeout_ms: 30_000,
        }
    }
}

/// Pool-sync tuning (spec.md §6 "pool-sync").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolSyncConfig {
    pub one_reply_block: bool,
    pub is_fast_mode: bool,
    pub block_pools_count: u8,
    pub request_repeat_round_count: u8,
    pub neighbour_packets_count: u8,
    pub sequences_verification_frequency: u16,
}

impl Default for PoolSyncConfig {
    fn default() -> Self {
        PoolSyncConfig {
            one_reply_block: true,
            is_fast_mode: false,
            block_pools_count: 25,
            request_repeat_round_count: 20,
            neighbour_packets_count: 10,
            sequences_verification_frequency: 350,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub executor: ExecutorConfig,
    pub api: ApiConfig,
    pub pool_sync: PoolSyncConfig,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),
}

impl Config {
    /// Loads a JSON config file, matching `Cli::config`'s opt-in path
    /// (falls back to `Config::default()` when no path is given).
    pub fn load_from_file(path: &str) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }
}

/// Thin CLI surface kept for process entry; no subcommand wiring lives here
/// (CLI orchestration is out of scope — see SPEC_FULL.md §2).
#[derive(Debug, clap::Parser)]
#[command(name = "ledger-node", about = "Consensus/ledger engine node")]
pub struct Cli {
    /// Path to a JSON config file; falls back to `Config::default()`.
    #[arg(long)]
    pub config: Option<String>,

    /// Database directory for the sled-backed store.
    #[arg(long, default_value = "ledger-db")]
    pub data_dir: String,
}
