//! Sampling, CPU delta and retention core

pub mod assembler;
pub mod cpu_delta;
pub mod error;
pub mod history;
pub mod poller;
pub mod query;
pub mod registry;
pub mod sampler;
pub mod traits;
pub mod types;

#[cfg(test)]
pub mod mock;

pub use error::SessionError;
pub use history::HistoryStore;
pub use poller::CycleReport;
pub use poller::PollOutcome;
pub use poller::Poller;
pub use query::MetricsQuery;
pub use registry::ConnectionRegistry;
pub use sampler::CounterSampler;
pub use traits::HypervisorConnector;
pub use traits::HypervisorSession;
pub use traits::TimeSource;
pub use traits::WorkloadResolver;
