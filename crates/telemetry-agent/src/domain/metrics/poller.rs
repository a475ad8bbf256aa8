//! Scheduled single-flight poll cycle

use std::ops::AddAssign;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use futures::stream;
use futures::StreamExt;
use tokio::sync::Mutex;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::info;
use tracing::warn;

use super::assembler::assemble;
use super::assembler::RecordIdentity;
use super::error::SessionError;
use super::history::HistoryStore;
use super::registry::ConnectionRegistry;
use super::sampler::CounterSampler;
use super::traits::HypervisorSession;
use super::traits::TimeSource;
use super::traits::WorkloadResolver;
use super::types::CounterCategory;
use super::types::DomainRef;

/// Instances of one host sampled at the same time
const INSTANCE_CONCURRENCY: usize = 8;

/// Counts gathered over one poll cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub sessions_visited: usize,
    pub listing_failures: usize,
    pub instances_sampled: usize,
    /// Instances sampled with at least one absent category
    pub partial_failures: usize,
    /// Instances that could not be sampled at all
    pub instances_failed: usize,
    pub instances_inactive: usize,
    pub instances_evicted: usize,
}

impl AddAssign for CycleReport {
    fn add_assign(&mut self, other: Self) {
        self.sessions_visited += other.sessions_visited;
        self.listing_failures += other.listing_failures;
        self.instances_sampled += other.instances_sampled;
        self.partial_failures += other.partial_failures;
        self.instances_failed += other.instances_failed;
        self.instances_inactive += other.instances_inactive;
        self.instances_evicted += other.instances_evicted;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Another cycle was still in flight
    Skipped,
    Completed(CycleReport),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InstanceOutcome {
    Sampled { partial: bool },
    Inactive,
    Failed,
}

/// Drives sampling of every domain on every session into the history store
pub struct Poller {
    registry: Arc<ConnectionRegistry>,
    sampler: CounterSampler,
    store: Arc<HistoryStore>,
    resolver: Arc<dyn WorkloadResolver>,
    clock: Arc<dyn TimeSource>,
    interval: Duration,
    in_flight: Mutex<()>,
}

impl Poller {
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        sampler: CounterSampler,
        store: Arc<HistoryStore>,
        resolver: Arc<dyn WorkloadResolver>,
        clock: Arc<dyn TimeSource>,
        interval: Duration,
    ) -> Self {
        Self {
            registry,
            sampler,
            store,
            resolver,
            clock,
            interval,
            in_flight: Mutex::new(()),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Poll on a fixed interval until `token` is cancelled. Ticks that fall
    /// due while a cycle is running are dropped, not queued.
    pub async fn run(&self, token: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(interval = ?self.interval, "Poller started");

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => {}
            }

            // Shutdown abandons the cycle in flight
            tokio::select! {
                _ = token.cancelled() => break,
                outcome = self.poll_once() => {
                    if outcome == PollOutcome::Skipped {
                        debug!("Poll cycle still in flight, skipping tick");
                    }
                }
            }
        }

        info!("Poller stopped");
    }

    /// Run one poll cycle unless another one is in flight
    pub async fn poll_once(&self) -> PollOutcome {
        let Ok(_guard) = self.in_flight.try_lock() else {
            return PollOutcome::Skipped;
        };

        let mut report = CycleReport::default();
        let per_session = join_all(
            self.registry
                .sessions()
                .iter()
                .map(|session| self.poll_session(session.as_ref())),
        )
        .await;
        for session_report in per_session {
            report += session_report;
        }

        report.instances_evicted = self.store.evict_stale(self.clock.now()).len();

        info!(
            sessions = report.sessions_visited,
            listing_failures = report.listing_failures,
            instances = report.instances_sampled,
            partial_failures = report.partial_failures,
            failed = report.instances_failed,
            inactive = report.instances_inactive,
            evicted = report.instances_evicted,
            "Poll cycle completed"
        );
        PollOutcome::Completed(report)
    }

    async fn poll_session(&self, session: &dyn HypervisorSession) -> CycleReport {
        let mut report = CycleReport {
            sessions_visited: 1,
            ..Default::default()
        };

        let Some(domains) = self.registry.try_domains_of(session).await else {
            report.listing_failures = 1;
            return report;
        };

        let outcomes: Vec<InstanceOutcome> = stream::iter(domains)
            .map(|domain| self.poll_instance(session, domain))
            .buffer_unordered(INSTANCE_CONCURRENCY)
            .collect()
            .await;

        for outcome in outcomes {
            match outcome {
                InstanceOutcome::Sampled { partial } => {
                    report.instances_sampled += 1;
                    if partial {
                        report.partial_failures += 1;
                    }
                }
                InstanceOutcome::Inactive => report.instances_inactive += 1,
                InstanceOutcome::Failed => report.instances_failed += 1,
            }
        }
        report
    }

    async fn poll_instance(
        &self,
        session: &dyn HypervisorSession,
        domain: DomainRef,
    ) -> InstanceOutcome {
        let raw = match self.sampler.sample_all(session, &domain.name).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return InstanceOutcome::Inactive,
            Err(e) => {
                warn!(
                    host = session.host(),
                    instance_id = %domain.instance_id,
                    domain = %domain.name,
                    error = %e,
                    "Failed to sample instance"
                );
                return InstanceOutcome::Failed;
            }
        };

        let now = self.clock.now();
        let mut partial = false;
        let mut settle = |category: CounterCategory, error: SessionError| {
            partial = true;
            warn!(
                host = session.host(),
                instance_id = %domain.instance_id,
                domain = %domain.name,
                category = %category,
                error = %error,
                "Partial sample failure"
            );
        };

        let cpu = raw
            .cpu
            .map_err(|e| settle(CounterCategory::Cpu, e))
            .ok()
            .map(|sample| {
                self.store
                    .cpu_engine()
                    .compute(&domain.instance_id, sample)
            });
        let memory = raw
            .memory
            .map_err(|e| settle(CounterCategory::Memory, e))
            .ok();
        let disks = raw
            .disks
            .map_err(|e| settle(CounterCategory::Disk, e))
            .ok();
        let network = raw
            .network
            .map_err(|e| settle(CounterCategory::Network, e))
            .ok();

        let server_id = self.resolver.resolve_or_identity(&domain.instance_id);
        let record = assemble(
            RecordIdentity {
                domain: &domain,
                server_id: &server_id,
                host: session.host(),
                timestamp: now,
            },
            cpu,
            memory,
            disks,
            network,
        );
        self.store.append(&domain.instance_id, record, now);

        InstanceOutcome::Sampled { partial }
    }
}
