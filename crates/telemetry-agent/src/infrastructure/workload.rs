//! Workload identifier lookup

use std::collections::HashMap;
use std::path::Path;

use anyhow::Context;
use anyhow::Result;
use tracing::info;

use crate::domain::metrics::traits::WorkloadResolver;

/// Every instance is its own workload
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityResolver;

impl WorkloadResolver for IdentityResolver {
    fn resolve(&self, instance_id: &str) -> Option<String> {
        Some(instance_id.to_string())
    }
}

/// Workload identifiers read from a YAML mapping of `instance_id: workload_id`
#[derive(Debug, Clone, Default)]
pub struct StaticWorkloadResolver {
    workloads: HashMap<String, String>,
}

impl StaticWorkloadResolver {
    pub fn new(workloads: HashMap<String, String>) -> Self {
        Self { workloads }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read workload map {}", path.display()))?;
        let workloads: HashMap<String, String> = serde_yaml::from_str(&content)
            .with_context(|| format!("failed to parse workload map {}", path.display()))?;
        info!(
            path = %path.display(),
            entries = workloads.len(),
            "Loaded workload map"
        );
        Ok(Self::new(workloads))
    }
}

impl WorkloadResolver for StaticWorkloadResolver {
    fn resolve(&self, instance_id: &str) -> Option<String> {
        self.workloads.get(instance_id).cloned()
    }
}
