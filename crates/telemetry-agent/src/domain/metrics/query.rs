//! Read-only view of the history store for the API layer

use std::collections::BTreeMap;
use std::sync::Arc;

use api_types::InstanceMetricRecord;
use chrono::DateTime;
use chrono::Utc;

use super::history::HistoryStore;

#[derive(Debug, Clone)]
pub struct MetricsQuery {
    store: Arc<HistoryStore>,
}

impl MetricsQuery {
    pub fn new(store: Arc<HistoryStore>) -> Self {
        Self { store }
    }

    pub fn latest_all(&self) -> BTreeMap<String, InstanceMetricRecord> {
        self.store.latest_all()
    }

    pub fn latest_one(&self, instance_id: &str) -> Option<InstanceMetricRecord> {
        self.store.latest_one(instance_id)
    }

    pub fn range(
        &self,
        instance_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Vec<InstanceMetricRecord> {
        self.store.range(instance_id, start, end)
    }
}
