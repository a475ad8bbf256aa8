//! Builds immutable instance records from sampled counters

use api_types::CpuMetrics;
use api_types::DiskMetrics;
use api_types::InstanceMetricRecord;
use api_types::MemoryMetrics;
use api_types::NetworkInterfaceMetrics;
use chrono::DateTime;
use chrono::Utc;

use super::types::DiskSample;
use super::types::DomainRef;
use super::types::InterfaceSample;
use super::types::MemoryStats;

const KB_PER_GB: f64 = 1024.0 * 1024.0;

/// Identity of the record being assembled
#[derive(Debug, Clone, Copy)]
pub struct RecordIdentity<'a> {
    pub domain: &'a DomainRef,
    pub server_id: &'a str,
    pub host: &'a str,
    pub timestamp: DateTime<Utc>,
}

/// Assemble a record; any absent section stays `None`.
pub fn assemble(
    identity: RecordIdentity<'_>,
    cpu: Option<CpuMetrics>,
    memory: Option<MemoryStats>,
    disks: Option<Vec<DiskSample>>,
    network: Option<Vec<InterfaceSample>>,
) -> InstanceMetricRecord {
    InstanceMetricRecord {
        instance_id: identity.domain.instance_id.clone(),
        instance_name: identity.domain.name.clone(),
        server_id: identity.server_id.to_string(),
        host: identity.host.to_string(),
        timestamp: identity.timestamp,
        cpu,
        memory: memory.map(memory_metrics),
        disk: disks.map(|disks| disks.iter().map(disk_metrics).collect()),
        network: network.map(|interfaces| interfaces.iter().map(interface_metrics).collect()),
    }
}

pub fn memory_metrics(stats: MemoryStats) -> MemoryMetrics {
    let used_kb = stats.actual_kb as f64 - stats.unused_kb as f64;
    let memory_usage_percent = if stats.actual_kb > 0 {
        used_kb / stats.actual_kb as f64 * 100.0
    } else {
        0.0
    };

    MemoryMetrics {
        total_memory_gb: stats.actual_kb as f64 / KB_PER_GB,
        used_memory_gb: used_kb / KB_PER_GB,
        available_memory_gb: stats.unused_kb as f64 / KB_PER_GB,
        memory_usage_percent,
    }
}

pub fn disk_metrics(sample: &DiskSample) -> DiskMetrics {
    DiskMetrics {
        device: sample.device.clone(),
        read_bytes: sample.stats.read_bytes,
        write_bytes: sample.stats.write_bytes,
        read_requests: sample.stats.read_requests,
        write_requests: sample.stats.write_requests,
        total_size: sample.info.capacity,
        used_size: sample.info.allocation,
        usage_percent: disk_usage_percent(sample.info.allocation, sample.info.capacity),
    }
}

/// Allocation over capacity, clamped to [0, 100] and rounded to two decimals
pub fn disk_usage_percent(allocation: u64, capacity: u64) -> f64 {
    if capacity == 0 {
        return 0.0;
    }
    let percent = (allocation as f64 / capacity as f64 * 100.0).clamp(0.0, 100.0);
    (percent * 100.0).round() / 100.0
}

pub fn interface_metrics(sample: &InterfaceSample) -> NetworkInterfaceMetrics {
    NetworkInterfaceMetrics {
        interface: sample.device.clone(),
        rx_bytes: sample.stats.rx_bytes,
        tx_bytes: sample.stats.tx_bytes,
        rx_packets: sample.stats.rx_packets,
        tx_packets: sample.stats.tx_packets,
        rx_errors: sample.stats.rx_errors,
        tx_errors: sample.stats.tx_errors,
    }
}
