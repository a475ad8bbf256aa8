use std::sync::Arc;
use std::time::Duration;

use crate::domain::metrics::ConnectionRegistry;
use crate::domain::metrics::CounterSampler;
use crate::domain::metrics::HistoryStore;
use crate::domain::metrics::MetricsQuery;
use crate::domain::metrics::Poller;
use crate::domain::metrics::TimeSource;
use crate::domain::metrics::WorkloadResolver;

/// Timing parameters of the sampling core
#[derive(Debug, Clone, Copy)]
pub struct SamplingSettings {
    pub retention: chrono::Duration,
    pub call_timeout: Duration,
    pub poll_interval: Duration,
}

/// Application dependencies - simple struct with Arc-wrapped services
pub struct ApplicationServices {
    pub registry: Arc<ConnectionRegistry>,
    pub store: Arc<HistoryStore>,
    pub poller: Arc<Poller>,
    pub query: MetricsQuery,
    pub clock: Arc<dyn TimeSource>,
}

impl ApplicationServices {
    /// Wire the sampling core around an already connected registry
    pub fn new(
        registry: ConnectionRegistry,
        resolver: Arc<dyn WorkloadResolver>,
        clock: Arc<dyn TimeSource>,
        settings: SamplingSettings,
    ) -> Self {
        let registry = Arc::new(registry);
        let store = Arc::new(HistoryStore::new(settings.retention));
        let poller = Arc::new(Poller::new(
            registry.clone(),
            CounterSampler::new(settings.call_timeout, clock.clone()),
            store.clone(),
            resolver,
            clock.clone(),
            settings.poll_interval,
        ));
        let query = MetricsQuery::new(store.clone());

        Self {
            registry,
            store,
            poller,
            query,
            clock,
        }
    }
}
