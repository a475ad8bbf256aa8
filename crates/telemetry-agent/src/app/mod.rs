//! Application module
//!
//! Composition root and lifecycle of the agent: services are built once by
//! [`ApplicationBuilder`], background tasks share one cancellation token.

pub mod builder;
pub mod core;
pub mod probe;
pub mod services;
pub mod tasks;

// Re-export main types
pub use builder::ApplicationBuilder;
pub use core::Application;
pub use services::ApplicationServices;
