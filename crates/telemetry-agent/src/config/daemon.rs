use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use super::connection::ConnectionArgs;

#[derive(Parser, Debug, Clone)]
pub struct DaemonArgs {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    #[arg(
        long,
        env = "POLL_INTERVAL_SECS",
        default_value = "60",
        value_parser = clap::value_parser!(u64).range(1..),
        help = "Seconds between two poll cycles"
    )]
    pub poll_interval_secs: u64,

    #[arg(
        long,
        env = "RETENTION_MINUTES",
        default_value = "60",
        value_parser = clap::value_parser!(u32).range(1..),
        help = "Minutes of history kept per instance"
    )]
    pub retention_minutes: u32,

    #[arg(
        long,
        env = "API_LISTEN_ADDR",
        default_value = "0.0.0.0:8000",
        help = "HTTP API server listen address"
    )]
    pub api_listen_addr: String,

    #[arg(
        long,
        env = "AGENT_LOG_FILE",
        value_hint = clap::ValueHint::FilePath,
        help = "Also write logs to this file, rotated daily, e.g. /logs/telemetry-agent.log"
    )]
    pub log_file: Option<PathBuf>,
}

impl DaemonArgs {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn retention(&self) -> chrono::Duration {
        chrono::Duration::minutes(i64::from(self.retention_minutes))
    }
}

#[derive(Parser, Debug, Clone)]
pub struct ProbeArgs {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    #[arg(
        long,
        env = "PROBE_GAP_SECS",
        default_value = "5",
        value_parser = clap::value_parser!(u64).range(1..),
        help = "Seconds between the two probe cycles, so CPU usage has a delta"
    )]
    pub probe_gap_secs: u64,
}

impl ProbeArgs {
    pub fn gap(&self) -> Duration {
        Duration::from_secs(self.probe_gap_secs)
    }
}
