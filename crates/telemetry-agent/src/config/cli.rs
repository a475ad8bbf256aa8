use clap::{Parser, Subcommand};
use utils::version;

use crate::config::daemon::{DaemonArgs, ProbeArgs};

#[derive(Parser)]
#[command(about, long_about, version = &**version::VERSION)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the telemetry daemon: poll hypervisors and serve the metrics API
    Daemon(Box<DaemonArgs>),
    /// Sample every configured host twice, print the latest records and exit
    Probe(ProbeArgs),
}
