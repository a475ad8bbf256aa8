//! Time-bounded history of assembled records
//!
//! The store owns every per-instance series together with the CPU delta
//! state. Each series lives behind its own map entry, so appends for one
//! instance exclude other writers of that instance while readers clone a
//! consistent view under the entry's read lock.

use std::collections::BTreeMap;
use std::collections::VecDeque;

use api_types::InstanceMetricRecord;
use chrono::DateTime;
use chrono::Duration;
use chrono::Utc;
use dashmap::DashMap;
use tracing::debug;
use tracing::info;

use super::cpu_delta::CpuDeltaEngine;

/// Per-instance record history pruned to a retention window
#[derive(Debug)]
pub struct HistoryStore {
    /// Records ordered by timestamp, keyed by instance identifier
    series: DashMap<String, VecDeque<InstanceMetricRecord>>,
    cpu: CpuDeltaEngine,
    retention: Duration,
}

impl HistoryStore {
    pub fn new(retention: Duration) -> Self {
        Self {
            series: DashMap::new(),
            cpu: CpuDeltaEngine::new(),
            retention,
        }
    }

    pub fn retention(&self) -> Duration {
        self.retention
    }

    /// CPU delta state of the instances held by this store
    pub fn cpu_engine(&self) -> &CpuDeltaEngine {
        &self.cpu
    }

    /// Insert `record` in timestamp order, then drop every record of the
    /// instance older than `now - retention`.
    pub fn append(&self, instance_id: &str, record: InstanceMetricRecord, now: DateTime<Utc>) {
        let cutoff = now - self.retention;
        let mut series = self.series.entry(instance_id.to_string()).or_default();

        // Equal timestamps keep arrival order
        let position = series.partition_point(|existing| existing.timestamp <= record.timestamp);
        series.insert(position, record);

        let expired = series.partition_point(|existing| existing.timestamp < cutoff);
        if expired > 0 {
            series.drain(..expired);
            debug!(
                instance_id = instance_id,
                pruned = expired,
                "Pruned records outside retention window"
            );
        }
    }

    /// Most recent record of every instance
    pub fn latest_all(&self) -> BTreeMap<String, InstanceMetricRecord> {
        self.series
            .iter()
            .filter_map(|entry| {
                entry
                    .value()
                    .back()
                    .map(|record| (entry.key().clone(), record.clone()))
            })
            .collect()
    }

    pub fn latest_one(&self, instance_id: &str) -> Option<InstanceMetricRecord> {
        self.series
            .get(instance_id)
            .and_then(|series| series.back().cloned())
    }

    /// Records with `start <= timestamp <= end`, oldest first. Unknown
    /// instances yield an empty sequence.
    pub fn range(
        &self,
        instance_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Vec<InstanceMetricRecord> {
        let Some(series) = self.series.get(instance_id) else {
            return Vec::new();
        };
        let from = series.partition_point(|record| record.timestamp < start);
        let to = series.partition_point(|record| record.timestamp <= end);
        if from >= to {
            return Vec::new();
        }
        series.range(from..to).cloned().collect()
    }

    /// Drop instances whose newest record fell out of the retention window,
    /// along with their CPU delta state. Returns the evicted identifiers.
    pub fn evict_stale(&self, now: DateTime<Utc>) -> Vec<String> {
        let cutoff = now - self.retention;
        let mut evicted = Vec::new();
        self.series.retain(|instance_id, series| {
            let fresh = series
                .back()
                .is_some_and(|record| record.timestamp >= cutoff);
            if !fresh {
                evicted.push(instance_id.clone());
            }
            fresh
        });

        for instance_id in &evicted {
            self.cpu.forget(instance_id);
            info!(instance_id = %instance_id, "Evicted stale instance");
        }
        evicted
    }

    pub fn instance_count(&self) -> usize {
        self.series.len()
    }
}
