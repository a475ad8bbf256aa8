//! Shared API type definitions
//!
//! This crate contains the metric record types served by the telemetry agent
//! and the response envelopes wrapping them, so that API clients can
//! deserialize exactly what the agent serializes.

use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

/// CPU time split, each value a percentage of the instance's vCPU capacity
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CpuBreakdown {
    pub idle: f64,
    /// Residual of total CPU time not attributed to system or user time
    pub iowait: f64,
    pub system: f64,
    pub user: f64,
}

/// CPU section of an instance record
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CpuMetrics {
    pub cpu_breakdown: CpuBreakdown,
    /// Number of virtual CPUs the percentages are relative to
    pub vcpus: u32,
    /// Aggregate usage across all vCPUs
    pub total_usage: f64,
}

impl CpuMetrics {
    /// Usage reported when there is no previous sample to delta against
    pub const fn idle(vcpus: u32) -> Self {
        Self {
            cpu_breakdown: CpuBreakdown {
                idle: 100.0,
                iowait: 0.0,
                system: 0.0,
                user: 0.0,
            },
            vcpus,
            total_usage: 0.0,
        }
    }
}

/// Memory section of an instance record
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MemoryMetrics {
    pub total_memory_gb: f64,
    pub used_memory_gb: f64,
    pub available_memory_gb: f64,
    pub memory_usage_percent: f64,
}

/// One attached block device of class "disk"
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiskMetrics {
    /// Target device name, e.g. `vda`
    pub device: String,
    pub read_bytes: u64,
    pub write_bytes: u64,
    pub read_requests: u64,
    pub write_requests: u64,
    /// Capacity in bytes
    pub total_size: u64,
    /// Allocated bytes
    pub used_size: u64,
    /// Always within [0, 100]
    pub usage_percent: f64,
}

/// One network interface of an instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkInterfaceMetrics {
    pub interface: String,
    pub rx_bytes: u64,
    pub tx_bytes: u64,
    pub rx_packets: u64,
    pub tx_packets: u64,
    pub rx_errors: u64,
    pub tx_errors: u64,
}

/// Snapshot of one instance at one point in time
///
/// A section is `None` when the instance was inactive or that counter
/// category could not be read during the cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceMetricRecord {
    /// Hypervisor UUID of the domain
    pub instance_id: String,
    /// Hypervisor domain name
    pub instance_name: String,
    /// Workload identifier resolved for this instance
    pub server_id: String,
    /// Address of the hypervisor host the instance was sampled on
    pub host: String,
    pub timestamp: DateTime<Utc>,
    pub cpu: Option<CpuMetrics>,
    pub memory: Option<MemoryMetrics>,
    pub disk: Option<Vec<DiskMetrics>>,
    pub network: Option<Vec<NetworkInterfaceMetrics>>,
}

/// Response envelope for metric queries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsEnvelope<T> {
    /// `true` for latest snapshots, `false` for windowed history
    pub latest: bool,
    /// Time the response was produced
    pub timestamp: DateTime<Utc>,
    pub metrics: T,
}

/// Body of every error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Response for the health endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    /// Number of hypervisor sessions currently open
    pub sessions: usize,
}
