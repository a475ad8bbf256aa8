//! Traits at the seams of the sampling core

use std::sync::Arc;

use chrono::DateTime;
use chrono::Utc;

use super::error::SessionError;
use super::types::BlockDevice;
use super::types::BlockInfo;
use super::types::BlockStats;
use super::types::CpuTimes;
use super::types::DomainRef;
use super::types::InterfaceStats;
use super::types::MemoryStats;

/// A live administrative connection to one hypervisor host
///
/// Implementations expose primitive reads only; joining topology with
/// statistics is done by the counter sampler.
#[async_trait::async_trait]
pub trait HypervisorSession: Send + Sync {
    /// Address of the host this session is connected to
    fn host(&self) -> &str;

    fn is_open(&self) -> bool;

    /// Release the underlying handle. Further calls fail as unreachable.
    async fn close(&self);

    /// Running domains on this host
    async fn list_domains(&self) -> Result<Vec<DomainRef>, SessionError>;

    async fn is_active(&self, domain: &str) -> Result<bool, SessionError>;

    async fn max_vcpus(&self, domain: &str) -> Result<u32, SessionError>;

    async fn cpu_times(&self, domain: &str) -> Result<CpuTimes, SessionError>;

    async fn memory_stats(&self, domain: &str) -> Result<MemoryStats, SessionError>;

    /// Block devices declared in the domain topology
    async fn block_devices(&self, domain: &str) -> Result<Vec<BlockDevice>, SessionError>;

    async fn block_stats(&self, domain: &str, target: &str) -> Result<BlockStats, SessionError>;

    async fn block_info(&self, domain: &str, target: &str) -> Result<BlockInfo, SessionError>;

    /// Network interface targets declared in the domain topology
    async fn interfaces(&self, domain: &str) -> Result<Vec<String>, SessionError>;

    async fn interface_stats(
        &self,
        domain: &str,
        target: &str,
    ) -> Result<InterfaceStats, SessionError>;
}

/// Opens sessions against discovered hosts
#[async_trait::async_trait]
pub trait HypervisorConnector: Send + Sync {
    async fn open(&self, host: &str) -> Result<Arc<dyn HypervisorSession>, SessionError>;
}

/// Maps an instance identifier to the workload it belongs to
pub trait WorkloadResolver: Send + Sync {
    fn resolve(&self, instance_id: &str) -> Option<String>;

    /// Resolve, falling back to the instance identifier itself
    fn resolve_or_identity(&self, instance_id: &str) -> String {
        self.resolve(instance_id)
            .unwrap_or_else(|| instance_id.to_string())
    }
}

/// Trait for getting current time
pub trait TimeSource: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}
