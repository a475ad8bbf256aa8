//! Raw counter reads for one domain
//!
//! Every read first checks that the domain is active and returns `Ok(None)`
//! when it is not. Disk and network reads join the device list of the domain
//! topology with per-device statistics; a device whose statistics cannot be
//! read is logged and left out.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;
use tracing::warn;

use super::error::SessionError;
use super::traits::HypervisorSession;
use super::traits::TimeSource;
use super::types::BlockDeviceClass;
use super::types::CpuSample;
use super::types::DiskSample;
use super::types::InterfaceSample;
use super::types::MemoryStats;

pub type SampleResult<T> = Result<Option<T>, SessionError>;

/// Outcome of the four counter reads of one domain
#[derive(Debug)]
pub struct RawInstanceSample {
    pub cpu: Result<CpuSample, SessionError>,
    pub memory: Result<MemoryStats, SessionError>,
    pub disks: Result<Vec<DiskSample>, SessionError>,
    pub network: Result<Vec<InterfaceSample>, SessionError>,
}

/// Reads raw counters through a session, bounding every call by a timeout
#[derive(Clone)]
pub struct CounterSampler {
    call_timeout: Duration,
    clock: Arc<dyn TimeSource>,
}

impl CounterSampler {
    pub fn new(call_timeout: Duration, clock: Arc<dyn TimeSource>) -> Self {
        Self {
            call_timeout,
            clock,
        }
    }

    async fn call<T, F>(
        &self,
        session: &dyn HypervisorSession,
        operation: &str,
        fut: F,
    ) -> Result<T, SessionError>
    where
        F: Future<Output = Result<T, SessionError>>,
    {
        match tokio::time::timeout(self.call_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(SessionError::Timeout {
                host: session.host().to_string(),
                operation: operation.to_string(),
                timeout: self.call_timeout,
            }),
        }
    }

    async fn is_active(
        &self,
        session: &dyn HypervisorSession,
        domain: &str,
    ) -> Result<bool, SessionError> {
        let active = self
            .call(session, "domstate", session.is_active(domain))
            .await?;
        if !active {
            debug!(host = session.host(), domain = domain, "Domain inactive");
        }
        Ok(active)
    }

    /// Read all four counter categories, checking activity once. Each
    /// category settles independently.
    pub async fn sample_all(
        &self,
        session: &dyn HypervisorSession,
        domain: &str,
    ) -> SampleResult<RawInstanceSample> {
        if !self.is_active(session, domain).await? {
            return Ok(None);
        }

        Ok(Some(RawInstanceSample {
            cpu: self.read_cpu(session, domain).await,
            memory: self.read_memory(session, domain).await,
            disks: self.read_disks(session, domain).await,
            network: self.read_network(session, domain).await,
        }))
    }

    pub async fn sample_cpu(
        &self,
        session: &dyn HypervisorSession,
        domain: &str,
    ) -> SampleResult<CpuSample> {
        if !self.is_active(session, domain).await? {
            return Ok(None);
        }
        self.read_cpu(session, domain).await.map(Some)
    }

    pub async fn sample_memory(
        &self,
        session: &dyn HypervisorSession,
        domain: &str,
    ) -> SampleResult<MemoryStats> {
        if !self.is_active(session, domain).await? {
            return Ok(None);
        }
        self.read_memory(session, domain).await.map(Some)
    }

    pub async fn sample_disks(
        &self,
        session: &dyn HypervisorSession,
        domain: &str,
    ) -> SampleResult<Vec<DiskSample>> {
        if !self.is_active(session, domain).await? {
            return Ok(None);
        }
        self.read_disks(session, domain).await.map(Some)
    }

    pub async fn sample_network(
        &self,
        session: &dyn HypervisorSession,
        domain: &str,
    ) -> SampleResult<Vec<InterfaceSample>> {
        if !self.is_active(session, domain).await? {
            return Ok(None);
        }
        self.read_network(session, domain).await.map(Some)
    }

    async fn read_cpu(
        &self,
        session: &dyn HypervisorSession,
        domain: &str,
    ) -> Result<CpuSample, SessionError> {
        let vcpus = self
            .call(session, "vcpucount", session.max_vcpus(domain))
            .await?;
        let times = self
            .call(session, "domstats", session.cpu_times(domain))
            .await?;
        Ok(CpuSample {
            times,
            vcpus,
            sampled_at: self.clock.now(),
        })
    }

    async fn read_memory(
        &self,
        session: &dyn HypervisorSession,
        domain: &str,
    ) -> Result<MemoryStats, SessionError> {
        self.call(session, "dommemstat", session.memory_stats(domain))
            .await
    }

    async fn read_disks(
        &self,
        session: &dyn HypervisorSession,
        domain: &str,
    ) -> Result<Vec<DiskSample>, SessionError> {
        let devices = self
            .call(session, "domblklist", session.block_devices(domain))
            .await?;

        let mut disks = Vec::new();
        for device in devices
            .into_iter()
            .filter(|device| device.class == BlockDeviceClass::Disk)
        {
            let target = device.target;
            let stats = self
                .call(session, "domblkstat", session.block_stats(domain, &target))
                .await;
            let info = self
                .call(session, "domblkinfo", session.block_info(domain, &target))
                .await;
            match (stats, info) {
                (Ok(stats), Ok(info)) => disks.push(DiskSample {
                    device: target,
                    stats,
                    info,
                }),
                (Err(e), _) | (_, Err(e)) => {
                    warn!(
                        host = session.host(),
                        domain = domain,
                        device = %target,
                        error = %e,
                        "Failed to read disk statistics, skipping device"
                    );
                }
            }
        }
        Ok(disks)
    }

    async fn read_network(
        &self,
        session: &dyn HypervisorSession,
        domain: &str,
    ) -> Result<Vec<InterfaceSample>, SessionError> {
        let targets = self
            .call(session, "domiflist", session.interfaces(domain))
            .await?;

        let mut interfaces = Vec::new();
        for target in targets {
            match self
                .call(session, "domifstat", session.interface_stats(domain, &target))
                .await
            {
                Ok(stats) => interfaces.push(InterfaceSample {
                    device: target,
                    stats,
                }),
                Err(e) => {
                    warn!(
                        host = session.host(),
                        domain = domain,
                        device = %target,
                        error = %e,
                        "Failed to read interface statistics, skipping device"
                    );
                }
            }
        }
        Ok(interfaces)
    }
}

#[cfg(test)]
mod tests {
    use chrono::DateTime;
    use chrono::TimeZone;
    use chrono::Utc;
    use similar_asserts::assert_eq;

    use super::*;
    use crate::domain::metrics::mock::FakeDomain;
    use crate::domain::metrics::mock::FakeSession;
    use crate::domain::metrics::mock::ManualClock;
    use crate::domain::metrics::types::BlockDevice;
    use crate::domain::metrics::types::BlockInfo;
    use crate::domain::metrics::types::BlockStats;
    use crate::domain::metrics::types::InterfaceStats;

    fn start() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    fn sampler() -> CounterSampler {
        CounterSampler::new(Duration::from_secs(5), Arc::new(ManualClock::new(start())))
    }

    #[tokio::test]
    async fn disks_come_from_topology_joined_with_stats() {
        let session = FakeSession::new("10.0.0.1");
        session.add_domain(
            FakeDomain::new("instance-1", "vm-1")
                .with_block_device(BlockDevice {
                    target: "vda".to_string(),
                    class: BlockDeviceClass::Disk,
                })
                .with_block_device(BlockDevice {
                    target: "hda".to_string(),
                    class: BlockDeviceClass::Cdrom,
                })
                .with_block_counters(
                    "vda",
                    BlockStats {
                        read_requests: 10,
                        read_bytes: 4096,
                        write_requests: 5,
                        write_bytes: 2048,
                    },
                    BlockInfo {
                        capacity: 100,
                        allocation: 40,
                    },
                ),
        );

        let disks = sampler()
            .sample_disks(&session, "instance-1")
            .await
            .expect("sampled")
            .expect("active");

        assert_eq!(disks.len(), 1);
        assert_eq!(disks[0].device, "vda");
        assert_eq!(disks[0].stats.read_bytes, 4096);
        assert_eq!(disks[0].info.allocation, 40);
    }

    #[tokio::test]
    async fn device_without_stats_is_skipped() {
        let session = FakeSession::new("10.0.0.1");
        session.add_domain(
            FakeDomain::new("instance-1", "vm-1")
                .with_interface("vnet0", InterfaceStats::default())
                .with_interface_without_stats("vnet1"),
        );

        let interfaces = sampler()
            .sample_network(&session, "instance-1")
            .await
            .expect("sampled")
            .expect("active");

        assert_eq!(interfaces.len(), 1);
        assert_eq!(interfaces[0].device, "vnet0");
    }

    #[tokio::test]
    async fn inactive_domain_yields_no_data() {
        let session = FakeSession::new("10.0.0.1");
        session.add_domain(FakeDomain::new("instance-1", "vm-1").inactive());

        let sample = sampler()
            .sample_all(&session, "instance-1")
            .await
            .expect("sampled");

        assert!(sample.is_none());
        assert!(matches!(
            sampler().sample_cpu(&session, "instance-1").await,
            Ok(None)
        ));
        assert!(matches!(
            sampler().sample_memory(&session, "instance-1").await,
            Ok(None)
        ));
    }

    #[tokio::test]
    async fn one_failing_category_leaves_the_others() {
        let session = FakeSession::new("10.0.0.1");
        session.add_domain(
            FakeDomain::new("instance-1", "vm-1")
                .with_cpu(2, 1_000, 100, 200)
                .with_memory(2048, 1024)
                .failing_memory(),
        );

        let sample = sampler()
            .sample_all(&session, "instance-1")
            .await
            .expect("sampled")
            .expect("active");

        assert!(sample.memory.is_err());
        let cpu = sample.cpu.expect("cpu ok");
        assert_eq!(cpu.vcpus, 2);
        assert_eq!(cpu.times.cpu_time, 1_000);
        assert_eq!(cpu.sampled_at, start());
        assert!(matches!(sample.disks, Ok(ref d) if d.is_empty()));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_call_times_out() {
        let session = FakeSession::new("10.0.0.1");
        session.add_domain(FakeDomain::new("instance-1", "vm-1").with_memory(2048, 1024));
        session.set_delay(Duration::from_secs(60));

        let result = sampler().sample_memory(&session, "instance-1").await;

        match result {
            Err(e @ SessionError::Timeout { .. }) => assert!(e.is_transient()),
            other => panic!("expected timeout, got {other:?}"),
        }
    }
}
