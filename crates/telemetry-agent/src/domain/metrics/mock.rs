//! Test adapters implementing the hypervisor traits
//!
//! The fake session serves scripted counters per domain and can inject
//! failures and latency.

use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use chrono::DateTime;
use chrono::Utc;

use super::error::SessionError;
use super::traits::HypervisorConnector;
use super::traits::HypervisorSession;
use super::traits::TimeSource;
use super::types::BlockDevice;
use super::types::BlockInfo;
use super::types::BlockStats;
use super::types::CpuTimes;
use super::types::DomainRef;
use super::types::InterfaceStats;
use super::types::MemoryStats;

/// Scripted state of one domain
#[derive(Debug, Clone)]
pub struct FakeDomain {
    pub name: String,
    pub instance_id: String,
    pub active: bool,
    pub vcpus: u32,
    pub cpu: CpuTimes,
    pub memory: MemoryStats,
    pub fail_cpu: bool,
    pub fail_memory: bool,
    pub block_devices: Vec<BlockDevice>,
    pub block_counters: HashMap<String, (BlockStats, BlockInfo)>,
    pub interfaces: Vec<String>,
    pub interface_counters: HashMap<String, InterfaceStats>,
    /// Extra latency of every per-domain call
    pub delay: Option<Duration>,
}

impl FakeDomain {
    pub fn new(name: &str, instance_id: &str) -> Self {
        Self {
            name: name.to_string(),
            instance_id: instance_id.to_string(),
            active: true,
            vcpus: 1,
            cpu: CpuTimes::default(),
            memory: MemoryStats::default(),
            fail_cpu: false,
            fail_memory: false,
            block_devices: Vec::new(),
            block_counters: HashMap::new(),
            interfaces: Vec::new(),
            interface_counters: HashMap::new(),
            delay: None,
        }
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    pub fn with_cpu(mut self, vcpus: u32, cpu_time: u64, system_time: u64, user_time: u64) -> Self {
        self.vcpus = vcpus;
        self.cpu = CpuTimes {
            cpu_time,
            system_time,
            user_time,
        };
        self
    }

    pub fn with_memory(mut self, actual_kb: u64, unused_kb: u64) -> Self {
        self.memory = MemoryStats {
            actual_kb,
            unused_kb,
        };
        self
    }

    pub fn slow(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn failing_cpu(mut self) -> Self {
        self.fail_cpu = true;
        self
    }

    pub fn failing_memory(mut self) -> Self {
        self.fail_memory = true;
        self
    }

    pub fn with_block_device(mut self, device: BlockDevice) -> Self {
        self.block_devices.push(device);
        self
    }

    pub fn with_block_counters(mut self, target: &str, stats: BlockStats, info: BlockInfo) -> Self {
        self.block_counters
            .insert(target.to_string(), (stats, info));
        self
    }

    pub fn with_interface(mut self, target: &str, stats: InterfaceStats) -> Self {
        self.interfaces.push(target.to_string());
        self.interface_counters.insert(target.to_string(), stats);
        self
    }

    pub fn with_interface_without_stats(mut self, target: &str) -> Self {
        self.interfaces.push(target.to_string());
        self
    }
}

/// In-memory hypervisor session
#[derive(Debug)]
pub struct FakeSession {
    host: String,
    domains: Mutex<Vec<FakeDomain>>,
    delay: Mutex<Option<Duration>>,
    fail_listing: AtomicBool,
    open: AtomicBool,
    calls: AtomicUsize,
}

impl FakeSession {
    pub fn new(host: &str) -> Self {
        Self {
            host: host.to_string(),
            domains: Mutex::new(Vec::new()),
            delay: Mutex::new(None),
            fail_listing: AtomicBool::new(false),
            open: AtomicBool::new(true),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn add_domain(&self, domain: FakeDomain) {
        self.domains.lock().unwrap().push(domain);
    }

    /// Replace the scripted state of the domain named `name`
    pub fn update_domain(&self, name: &str, update: impl FnOnce(&mut FakeDomain)) {
        let mut domains = self.domains.lock().unwrap();
        if let Some(domain) = domains.iter_mut().find(|d| d.name == name) {
            update(domain);
        }
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn set_fail_listing(&self, fail: bool) {
        self.fail_listing.store(fail, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn enter(&self) -> Result<(), SessionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if !self.is_open() {
            return Err(SessionError::Unreachable {
                host: self.host.clone(),
                message: "session closed".to_string(),
            });
        }
        Ok(())
    }

    async fn domain(&self, name: &str) -> Result<FakeDomain, SessionError> {
        let domain = self
            .domains
            .lock()
            .unwrap()
            .iter()
            .find(|d| d.name == name)
            .cloned()
            .ok_or_else(|| SessionError::DomainNotFound {
                host: self.host.clone(),
                domain: name.to_string(),
            })?;
        if let Some(delay) = domain.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(domain)
    }

    fn failed(&self, operation: &str) -> SessionError {
        SessionError::CommandFailed {
            host: self.host.clone(),
            operation: operation.to_string(),
            message: "injected failure".to_string(),
        }
    }
}

#[async_trait::async_trait]
impl HypervisorSession for FakeSession {
    fn host(&self) -> &str {
        &self.host
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    async fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
    }

    async fn list_domains(&self) -> Result<Vec<DomainRef>, SessionError> {
        self.enter().await?;
        if self.fail_listing.load(Ordering::SeqCst) {
            return Err(self.failed("list"));
        }
        Ok(self
            .domains
            .lock()
            .unwrap()
            .iter()
            .map(|d| DomainRef::new(d.name.clone(), d.instance_id.clone()))
            .collect())
    }

    async fn is_active(&self, domain: &str) -> Result<bool, SessionError> {
        self.enter().await?;
        Ok(self.domain(domain).await?.active)
    }

    async fn max_vcpus(&self, domain: &str) -> Result<u32, SessionError> {
        self.enter().await?;
        Ok(self.domain(domain).await?.vcpus)
    }

    async fn cpu_times(&self, domain: &str) -> Result<CpuTimes, SessionError> {
        self.enter().await?;
        let domain = self.domain(domain).await?;
        if domain.fail_cpu {
            return Err(self.failed("domstats"));
        }
        Ok(domain.cpu)
    }

    async fn memory_stats(&self, domain: &str) -> Result<MemoryStats, SessionError> {
        self.enter().await?;
        let domain = self.domain(domain).await?;
        if domain.fail_memory {
            return Err(self.failed("dommemstat"));
        }
        Ok(domain.memory)
    }

    async fn block_devices(&self, domain: &str) -> Result<Vec<BlockDevice>, SessionError> {
        self.enter().await?;
        Ok(self.domain(domain).await?.block_devices)
    }

    async fn block_stats(&self, domain: &str, target: &str) -> Result<BlockStats, SessionError> {
        self.enter().await?;
        self.domain(domain).await?
            .block_counters
            .get(target)
            .map(|(stats, _)| *stats)
            .ok_or_else(|| self.failed("domblkstat"))
    }

    async fn block_info(&self, domain: &str, target: &str) -> Result<BlockInfo, SessionError> {
        self.enter().await?;
        self.domain(domain).await?
            .block_counters
            .get(target)
            .map(|(_, info)| *info)
            .ok_or_else(|| self.failed("domblkinfo"))
    }

    async fn interfaces(&self, domain: &str) -> Result<Vec<String>, SessionError> {
        self.enter().await?;
        Ok(self.domain(domain).await?.interfaces)
    }

    async fn interface_stats(
        &self,
        domain: &str,
        target: &str,
    ) -> Result<InterfaceStats, SessionError> {
        self.enter().await?;
        self.domain(domain).await?
            .interface_counters
            .get(target)
            .copied()
            .ok_or_else(|| self.failed("domifstat"))
    }
}

/// Connector handing out pre-built fake sessions; unknown hosts fail
#[derive(Default)]
pub struct FakeConnector {
    sessions: Mutex<HashMap<String, Arc<FakeSession>>>,
    open_delay: Option<Duration>,
}

impl FakeConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(self, session: Arc<FakeSession>) -> Self {
        self.sessions
            .lock()
            .unwrap()
            .insert(session.host().to_string(), session);
        self
    }

    pub fn with_open_delay(mut self, delay: Duration) -> Self {
        self.open_delay = Some(delay);
        self
    }
}

#[async_trait::async_trait]
impl HypervisorConnector for FakeConnector {
    async fn open(&self, host: &str) -> Result<Arc<dyn HypervisorSession>, SessionError> {
        if let Some(delay) = self.open_delay {
            tokio::time::sleep(delay).await;
        }
        self.sessions
            .lock()
            .unwrap()
            .get(host)
            .map(|session| Arc::clone(session) as Arc<dyn HypervisorSession>)
            .ok_or_else(|| SessionError::Unreachable {
                host: host.to_string(),
                message: "connection refused".to_string(),
            })
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: chrono::Duration) {
        *self.now.lock().unwrap() += by;
    }
}

impl TimeSource for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// Clock following tokio time, so paused-time tests see call latency
#[derive(Debug)]
pub struct TokioClock {
    start: DateTime<Utc>,
    origin: tokio::time::Instant,
}

impl TokioClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            start,
            origin: tokio::time::Instant::now(),
        }
    }

    pub fn origin(&self) -> tokio::time::Instant {
        self.origin
    }
}

impl TimeSource for TokioClock {
    fn now(&self) -> DateTime<Utc> {
        let elapsed = chrono::Duration::from_std(self.origin.elapsed())
            .unwrap_or_else(|_| chrono::Duration::zero());
        self.start + elapsed
    }
}
