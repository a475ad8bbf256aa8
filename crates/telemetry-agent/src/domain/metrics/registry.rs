//! Sessions opened against the configured hypervisor hosts

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tracing::info;
use tracing::warn;

use super::error::SessionError;
use super::traits::HypervisorConnector;
use super::traits::HypervisorSession;
use super::types::DomainRef;

/// Set of open hypervisor sessions, fixed after startup
///
/// Opening a session and listing its domains are each bounded by the call
/// timeout; an elapsed bound counts as a transient failure of that host.
pub struct ConnectionRegistry {
    sessions: Vec<Arc<dyn HypervisorSession>>,
    call_timeout: Duration,
}

impl std::fmt::Debug for ConnectionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionRegistry")
            .field(
                "hosts",
                &self.sessions.iter().map(|s| s.host()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl ConnectionRegistry {
    pub fn from_sessions(
        sessions: Vec<Arc<dyn HypervisorSession>>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            sessions,
            call_timeout,
        }
    }

    /// Open one session per host concurrently. Hosts that fail to open are
    /// logged and skipped.
    pub async fn connect(
        connector: &dyn HypervisorConnector,
        hosts: &[String],
        call_timeout: Duration,
    ) -> Self {
        let attempts = join_all(hosts.iter().map(|host| async move {
            let result = tokio::time::timeout(call_timeout, connector.open(host))
                .await
                .unwrap_or_else(|_| Err(timed_out(host, "open", call_timeout)));
            (host.as_str(), result)
        }))
        .await;

        let mut sessions = Vec::with_capacity(hosts.len());
        for (host, result) in attempts {
            match result {
                Ok(session) => {
                    info!(host = host, "Opened hypervisor session");
                    sessions.push(session);
                }
                Err(e) => {
                    warn!(host = host, error = %e, "Failed to open hypervisor session, skipping host");
                }
            }
        }

        if sessions.is_empty() {
            warn!(
                configured_hosts = hosts.len(),
                "No hypervisor session could be opened, serving empty results"
            );
        }

        Self {
            sessions,
            call_timeout,
        }
    }

    pub fn sessions(&self) -> &[Arc<dyn HypervisorSession>] {
        &self.sessions
    }

    /// Domains of `session`; a session that cannot be queried is treated as
    /// having none for now.
    pub async fn domains_of(&self, session: &dyn HypervisorSession) -> Vec<DomainRef> {
        self.try_domains_of(session).await.unwrap_or_default()
    }

    /// Like [`Self::domains_of`] but tells a failed listing apart from an
    /// empty host.
    pub async fn try_domains_of(&self, session: &dyn HypervisorSession) -> Option<Vec<DomainRef>> {
        let listing = tokio::time::timeout(self.call_timeout, session.list_domains())
            .await
            .unwrap_or_else(|_| Err(timed_out(session.host(), "list_domains", self.call_timeout)));
        match listing {
            Ok(domains) => Some(domains),
            Err(e) => {
                warn!(host = session.host(), error = %e, "Failed to list domains");
                None
            }
        }
    }

    pub fn open_count(&self) -> usize {
        self.sessions.iter().filter(|s| s.is_open()).count()
    }

    pub async fn close_all(&self) {
        join_all(self.sessions.iter().map(|session| session.close())).await;
        info!(sessions = self.sessions.len(), "Closed hypervisor sessions");
    }
}

fn timed_out(host: &str, operation: &str, timeout: Duration) -> SessionError {
    SessionError::Timeout {
        host: host.to_string(),
        operation: operation.to_string(),
        timeout,
    }
}

#[cfg(test)]
mod tests {
    use similar_asserts::assert_eq;

    use super::*;
    use crate::domain::metrics::mock::FakeConnector;
    use crate::domain::metrics::mock::FakeDomain;
    use crate::domain::metrics::mock::FakeSession;

    const CALL_TIMEOUT: Duration = Duration::from_secs(5);

    #[test_log::test(tokio::test)]
    async fn unreachable_hosts_are_skipped() {
        let session = Arc::new(FakeSession::new("10.0.0.1"));
        let connector = FakeConnector::new().with_session(session);

        let registry = ConnectionRegistry::connect(
            &connector,
            &["10.0.0.1".into(), "10.0.0.2".into()],
            CALL_TIMEOUT,
        )
        .await;

        assert_eq!(registry.sessions().len(), 1);
        assert_eq!(registry.sessions()[0].host(), "10.0.0.1");
        assert_eq!(registry.open_count(), 1);
    }

    #[tokio::test]
    async fn failing_listing_reads_as_empty() {
        let session = Arc::new(FakeSession::new("10.0.0.1"));
        session.add_domain(FakeDomain::new("instance-1", "vm-1"));
        session.set_fail_listing(true);
        let registry = ConnectionRegistry::from_sessions(
            vec![session.clone() as Arc<dyn HypervisorSession>],
            CALL_TIMEOUT,
        );

        assert!(registry.domains_of(session.as_ref()).await.is_empty());
        assert!(registry.try_domains_of(session.as_ref()).await.is_none());

        session.set_fail_listing(false);
        let domains = registry.domains_of(session.as_ref()).await;
        assert_eq!(domains, vec![DomainRef::new("instance-1", "vm-1")]);
    }

    #[tokio::test]
    async fn close_all_closes_every_session() {
        let a = Arc::new(FakeSession::new("10.0.0.1"));
        let b = Arc::new(FakeSession::new("10.0.0.2"));
        let registry = ConnectionRegistry::from_sessions(
            vec![
                a.clone() as Arc<dyn HypervisorSession>,
                b.clone() as Arc<dyn HypervisorSession>,
            ],
            CALL_TIMEOUT,
        );

        registry.close_all().await;

        assert_eq!(registry.open_count(), 0);
        assert!(!a.is_open());
        assert!(!b.is_open());
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_open_is_bounded_by_the_call_timeout() {
        let session = Arc::new(FakeSession::new("10.0.0.1"));
        let connector = FakeConnector::new()
            .with_session(session)
            .with_open_delay(Duration::from_secs(3600));
        let started = tokio::time::Instant::now();

        let registry =
            ConnectionRegistry::connect(&connector, &["10.0.0.1".into()], CALL_TIMEOUT).await;

        assert!(registry.sessions().is_empty());
        assert!(started.elapsed() < CALL_TIMEOUT + Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_listing_is_bounded_by_the_call_timeout() {
        let session = Arc::new(FakeSession::new("10.0.0.1"));
        session.add_domain(FakeDomain::new("instance-1", "vm-1"));
        session.set_delay(Duration::from_secs(3600));
        let registry = ConnectionRegistry::from_sessions(
            vec![session.clone() as Arc<dyn HypervisorSession>],
            CALL_TIMEOUT,
        );
        let started = tokio::time::Instant::now();

        assert!(registry.try_domains_of(session.as_ref()).await.is_none());
        assert!(started.elapsed() < CALL_TIMEOUT + Duration::from_secs(1));
        assert_eq!(session.calls(), 1);
    }
}
