use std::path::PathBuf;
use std::time::Duration;

use clap::Args;

/// Hypervisor connection settings shared by every subcommand
#[derive(Args, Debug, Clone)]
pub struct ConnectionArgs {
    #[arg(
        long,
        env = "HYPERVISOR_HOSTS",
        value_delimiter = ',',
        required = true,
        value_parser = parse_host,
        help = "Comma separated hypervisor host addresses, e.g. 10.0.0.1,10.0.0.2"
    )]
    pub hypervisor_hosts: Vec<String>,

    #[arg(
        long,
        env = "HYPERVISOR_URI_TEMPLATE",
        default_value = "qemu+tcp://root@{host}/system",
        help = "Connection URI per host, {host} is replaced by the host address"
    )]
    pub connection_uri_template: String,

    #[arg(
        long,
        env = "VIRSH_PATH",
        default_value = "virsh",
        value_hint = clap::ValueHint::ExecutablePath,
        help = "virsh executable used to talk to the hypervisors"
    )]
    pub virsh_path: PathBuf,

    #[arg(
        long,
        env = "HYPERVISOR_CALL_TIMEOUT_SECS",
        default_value = "10",
        value_parser = clap::value_parser!(u64).range(1..),
        help = "Timeout in seconds of every hypervisor call"
    )]
    pub call_timeout_secs: u64,

    #[arg(
        long,
        env = "WORKLOAD_MAP_PATH",
        value_hint = clap::ValueHint::FilePath,
        help = "YAML file mapping instance ids to workload ids, e.g. /etc/telemetry-agent/workloads.yaml"
    )]
    pub workload_map_path: Option<PathBuf>,
}

impl ConnectionArgs {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }
}

fn parse_host(value: &str) -> Result<String, String> {
    let host = value.trim();
    if host.is_empty() {
        return Err("host address must not be empty".to_string());
    }
    Ok(host.to_string())
}
