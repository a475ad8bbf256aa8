pub mod api;
pub mod app;
pub mod config;
pub mod domain;
pub mod infrastructure;

// Re-export main modules
pub use domain::metrics;
pub use infrastructure::logging;
