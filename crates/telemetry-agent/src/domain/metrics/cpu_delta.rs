//! Conversion of cumulative CPU time counters into percentages

use api_types::CpuBreakdown;
use api_types::CpuMetrics;
use chrono::DateTime;
use chrono::Utc;
use dashmap::DashMap;

use super::types::CpuSample;
use super::types::CpuTimes;

const NANOS_PER_SEC: f64 = 1e9;

/// Last CPU observation of one instance
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CpuDeltaState {
    pub times: CpuTimes,
    pub timestamp: DateTime<Utc>,
}

/// Derives CPU percentages from successive samples, keeping one previous
/// observation per instance.
#[derive(Debug, Default)]
pub struct CpuDeltaEngine {
    states: DashMap<String, CpuDeltaState>,
}

impl CpuDeltaEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compute usage for `sample` and record it as the new previous
    /// observation, whatever the outcome of the computation.
    pub fn compute(&self, instance_id: &str, sample: CpuSample) -> CpuMetrics {
        let current = CpuDeltaState {
            times: sample.times,
            timestamp: sample.sampled_at,
        };
        let previous = self.states.insert(instance_id.to_string(), current);
        cpu_usage(previous.as_ref(), &current, sample.vcpus)
    }

    pub fn previous(&self, instance_id: &str) -> Option<CpuDeltaState> {
        self.states.get(instance_id).map(|entry| *entry)
    }

    pub fn forget(&self, instance_id: &str) {
        self.states.remove(instance_id);
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

/// Percentages of the vCPU capacity consumed between two observations.
///
/// iowait is the part of total CPU time attributed to neither system nor
/// user time, which approximates but does not measure I/O wait.
pub fn cpu_usage(
    previous: Option<&CpuDeltaState>,
    current: &CpuDeltaState,
    vcpus: u32,
) -> CpuMetrics {
    let (time_delta_seconds, total_delta, system_delta, user_delta) = match previous {
        Some(previous) => (
            (current.timestamp - previous.timestamp)
                .to_std()
                .map(|elapsed| elapsed.as_secs_f64())
                .unwrap_or(0.0),
            counter_delta(current.times.cpu_time, previous.times.cpu_time),
            counter_delta(current.times.system_time, previous.times.system_time),
            counter_delta(current.times.user_time, previous.times.user_time),
        ),
        None => (0.0, 0.0, 0.0, 0.0),
    };

    let max_possible = f64::from(vcpus) * time_delta_seconds * NANOS_PER_SEC;
    if max_possible <= 0.0 {
        return CpuMetrics::idle(vcpus);
    }

    let total_usage = total_delta / max_possible * 100.0;
    let system = system_delta / max_possible * 100.0;
    let user = user_delta / max_possible * 100.0;
    let iowait = (total_delta - system_delta - user_delta) / max_possible * 100.0;
    let idle = (100.0 - (system + user + iowait)).max(0.0);

    CpuMetrics {
        cpu_breakdown: CpuBreakdown {
            idle,
            iowait,
            system,
            user,
        },
        vcpus,
        total_usage,
    }
}

// Signed so that a counter reset shows up as a negative delta instead of
// wrapping around.
fn counter_delta(current: u64, previous: u64) -> f64 {
    current as f64 - previous as f64
}
