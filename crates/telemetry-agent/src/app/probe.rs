//! One-shot diagnostic run against the configured hypervisors

use std::collections::BTreeMap;
use std::time::Duration;

use api_types::InstanceMetricRecord;

use crate::app::ApplicationServices;
use crate::domain::metrics::PollOutcome;

/// Run two poll cycles `gap` apart and return the latest record per
/// instance. The first cycle only primes the CPU baselines.
pub async fn probe(
    services: &ApplicationServices,
    gap: Duration,
) -> BTreeMap<String, InstanceMetricRecord> {
    for cycle in 1..=2 {
        if cycle > 1 {
            tokio::time::sleep(gap).await;
        }
        match services.poller.poll_once().await {
            PollOutcome::Completed(report) => {
                tracing::info!(cycle, ?report, "Probe cycle finished");
            }
            PollOutcome::Skipped => {
                tracing::warn!(cycle, "Probe cycle skipped");
            }
        }
    }

    services.query.latest_all()
}
