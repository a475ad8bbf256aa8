//! Raw counter types read from a hypervisor
//!
//! All byte/time/request counters are cumulative for the lifetime of the
//! domain. Resets (restart, migration, reconnect) are not corrected for.

use chrono::DateTime;
use chrono::Utc;

/// A domain known to a hypervisor session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainRef {
    /// Domain name, used to address the domain on its host
    pub name: String,
    /// Domain UUID, used as the instance identifier
    pub instance_id: String,
}

impl DomainRef {
    pub fn new(name: impl Into<String>, instance_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            instance_id: instance_id.into(),
        }
    }
}

/// Cumulative CPU time of a domain, nanoseconds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuTimes {
    pub cpu_time: u64,
    pub system_time: u64,
    pub user_time: u64,
}

/// CPU counters together with the capacity they are measured against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuSample {
    pub times: CpuTimes,
    pub vcpus: u32,
    /// Wall-clock time right after the counters were read
    pub sampled_at: DateTime<Utc>,
}

/// Balloon memory statistics, KiB
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryStats {
    pub actual_kb: u64,
    pub unused_kb: u64,
}

/// Device class of an attached block device as declared in the domain topology
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockDeviceClass {
    Disk,
    Cdrom,
    Floppy,
    Lun,
    Other(String),
}

impl BlockDeviceClass {
    pub fn parse(value: &str) -> Self {
        match value {
            "disk" => Self::Disk,
            "cdrom" => Self::Cdrom,
            "floppy" => Self::Floppy,
            "lun" => Self::Lun,
            other => Self::Other(other.to_string()),
        }
    }
}

/// Block device entry of the domain topology
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockDevice {
    /// Target name, e.g. `vda`
    pub target: String,
    pub class: BlockDeviceClass,
}

/// Cumulative I/O counters of one block device
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlockStats {
    pub read_requests: u64,
    pub read_bytes: u64,
    pub write_requests: u64,
    pub write_bytes: u64,
}

/// Size information of one block device, bytes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlockInfo {
    pub capacity: u64,
    pub allocation: u64,
}

/// Cumulative counters of one network interface
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InterfaceStats {
    pub rx_bytes: u64,
    pub rx_packets: u64,
    pub rx_errors: u64,
    pub tx_bytes: u64,
    pub tx_packets: u64,
    pub tx_errors: u64,
}

/// Raw disk counters joined with their topology entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskSample {
    pub device: String,
    pub stats: BlockStats,
    pub info: BlockInfo,
}

/// Raw interface counters joined with their topology entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceSample {
    pub device: String,
    pub stats: InterfaceStats,
}

/// Counter category, used to attribute partial sampling failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display)]
pub enum CounterCategory {
    #[display("cpu")]
    Cpu,
    #[display("memory")]
    Memory,
    #[display("disk")]
    Disk,
    #[display("network")]
    Network,
}
