use std::time::Duration;

use thiserror::Error;

/// Errors raised at the hypervisor boundary.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("hypervisor {host} is unreachable: {message}")]
    Unreachable { host: String, message: String },
    #[error("{operation} against {host} timed out after {timeout:?}")]
    Timeout {
        host: String,
        operation: String,
        timeout: Duration,
    },
    #[error("domain {domain} not found on {host}")]
    DomainNotFound { host: String, domain: String },
    #[error("{operation} against {host} failed: {message}")]
    CommandFailed {
        host: String,
        operation: String,
        message: String,
    },
    #[error("failed to parse {what}: {message}")]
    Parse { what: String, message: String },
}

impl SessionError {
    /// Whether the failure is a transient connection problem rather than
    /// something wrong with the addressed domain or its output.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Unreachable { .. } | Self::Timeout { .. } | Self::CommandFailed { .. }
        )
    }

    pub(crate) fn parse(what: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            what: what.into(),
            message: message.into(),
        }
    }
}
