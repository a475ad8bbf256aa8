//! Hypervisor sessions backed by the `virsh` command line client
//!
//! Every primitive runs one `virsh --connect <uri> <command>` process,
//! bounded by the call timeout and killed when the call is abandoned.

pub mod parse;

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tokio::process::Command;
use tracing::debug;
use tracing::warn;

use crate::domain::metrics::error::SessionError;
use crate::domain::metrics::traits::HypervisorConnector;
use crate::domain::metrics::traits::HypervisorSession;
use crate::domain::metrics::types::BlockDevice;
use crate::domain::metrics::types::BlockInfo;
use crate::domain::metrics::types::BlockStats;
use crate::domain::metrics::types::CpuTimes;
use crate::domain::metrics::types::DomainRef;
use crate::domain::metrics::types::InterfaceStats;
use crate::domain::metrics::types::MemoryStats;

const HOST_PLACEHOLDER: &str = "{host}";

/// Opens [`VirshSession`]s, deriving each connection URI from a template
#[derive(Debug, Clone)]
pub struct VirshConnector {
    virsh_path: PathBuf,
    uri_template: String,
    call_timeout: Duration,
}

impl VirshConnector {
    pub fn new(virsh_path: PathBuf, uri_template: String, call_timeout: Duration) -> Self {
        Self {
            virsh_path,
            uri_template,
            call_timeout,
        }
    }

    pub fn uri_for(&self, host: &str) -> String {
        self.uri_template.replace(HOST_PLACEHOLDER, host)
    }
}

#[async_trait::async_trait]
impl HypervisorConnector for VirshConnector {
    async fn open(&self, host: &str) -> Result<Arc<dyn HypervisorSession>, SessionError> {
        let session = VirshSession {
            host: host.to_string(),
            uri: self.uri_for(host),
            virsh_path: self.virsh_path.clone(),
            call_timeout: self.call_timeout,
            open: AtomicBool::new(true),
        };

        // A session that cannot answer `version` never reached the daemon
        session
            .run("version", &[])
            .await
            .map_err(|e| match e {
                SessionError::CommandFailed { host, message, .. } => {
                    SessionError::Unreachable { host, message }
                }
                other => other,
            })?;
        debug!(host = host, uri = %session.uri, "virsh session ready");

        Ok(Arc::new(session))
    }
}

/// Session against one host through the `virsh` client
#[derive(Debug)]
pub struct VirshSession {
    host: String,
    uri: String,
    virsh_path: PathBuf,
    call_timeout: Duration,
    open: AtomicBool,
}

impl VirshSession {
    async fn run(&self, command: &str, args: &[&str]) -> Result<String, SessionError> {
        if !self.is_open() {
            return Err(SessionError::Unreachable {
                host: self.host.clone(),
                message: "session closed".to_string(),
            });
        }

        let mut child = Command::new(&self.virsh_path);
        child
            .arg("--connect")
            .arg(&self.uri)
            .arg(command)
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let output = match tokio::time::timeout(self.call_timeout, child.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(SessionError::CommandFailed {
                    host: self.host.clone(),
                    operation: command.to_string(),
                    message: format!("failed to run {}: {e}", self.virsh_path.display()),
                })
            }
            Err(_) => {
                return Err(SessionError::Timeout {
                    host: self.host.clone(),
                    operation: command.to_string(),
                    timeout: self.call_timeout,
                })
            }
        };

        if !output.status.success() {
            let message = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(self.classify_failure(command, args, message));
        }

        String::from_utf8(output.stdout)
            .map_err(|e| SessionError::parse(command, format!("output is not UTF-8: {e}")))
    }

    fn classify_failure(&self, command: &str, args: &[&str], message: String) -> SessionError {
        if message.contains("failed to get domain") || message.contains("Domain not found") {
            return SessionError::DomainNotFound {
                host: self.host.clone(),
                domain: args.first().copied().unwrap_or_default().to_string(),
            };
        }
        if message.contains("failed to connect to the hypervisor") {
            return SessionError::Unreachable {
                host: self.host.clone(),
                message,
            };
        }
        SessionError::CommandFailed {
            host: self.host.clone(),
            operation: command.to_string(),
            message,
        }
    }
}

#[async_trait::async_trait]
impl HypervisorSession for VirshSession {
    fn host(&self) -> &str {
        &self.host
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    async fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
    }

    async fn list_domains(&self) -> Result<Vec<DomainRef>, SessionError> {
        let names = parse::domain_names(&self.run("list", &["--name"]).await?);

        // Only the name listing can fail the host; a domain whose UUID
        // cannot be read is left out of this cycle.
        let mut domains = Vec::with_capacity(names.len());
        for name in names {
            let uuid = match self.run("domuuid", &[name.as_str()]).await {
                Ok(output) => parse::domain_uuid(&output),
                Err(e) => Err(e),
            };
            match uuid {
                Ok(uuid) => domains.push(DomainRef::new(name, uuid)),
                Err(SessionError::DomainNotFound { .. }) => {
                    warn!(host = %self.host, domain = %name, "Domain vanished while listing");
                }
                Err(e) => {
                    warn!(
                        host = %self.host,
                        domain = %name,
                        error = %e,
                        "Failed to resolve domain UUID, skipping domain"
                    );
                }
            }
        }
        Ok(domains)
    }

    async fn is_active(&self, domain: &str) -> Result<bool, SessionError> {
        parse::domain_active(&self.run("domstate", &[domain]).await?)
    }

    async fn max_vcpus(&self, domain: &str) -> Result<u32, SessionError> {
        parse::vcpu_count(
            &self
                .run("vcpucount", &[domain, "--maximum", "--live"])
                .await?,
        )
    }

    async fn cpu_times(&self, domain: &str) -> Result<CpuTimes, SessionError> {
        parse::cpu_times(
            &self
                .run("domstats", &[domain, "--cpu-total", "--raw"])
                .await?,
        )
    }

    async fn memory_stats(&self, domain: &str) -> Result<MemoryStats, SessionError> {
        parse::memory_stats(&self.run("dommemstat", &[domain]).await?)
    }

    async fn block_devices(&self, domain: &str) -> Result<Vec<BlockDevice>, SessionError> {
        Ok(parse::block_devices(
            &self.run("domblklist", &[domain, "--details"]).await?,
        ))
    }

    async fn block_stats(&self, domain: &str, target: &str) -> Result<BlockStats, SessionError> {
        parse::block_stats(&self.run("domblkstat", &[domain, target]).await?)
    }

    async fn block_info(&self, domain: &str, target: &str) -> Result<BlockInfo, SessionError> {
        parse::block_info(&self.run("domblkinfo", &[domain, target]).await?)
    }

    async fn interfaces(&self, domain: &str) -> Result<Vec<String>, SessionError> {
        Ok(parse::interfaces(&self.run("domiflist", &[domain]).await?))
    }

    async fn interface_stats(
        &self,
        domain: &str,
        target: &str,
    ) -> Result<InterfaceStats, SessionError> {
        parse::interface_stats(&self.run("domifstat", &[domain, target]).await?)
    }
}

#[cfg(test)]
mod tests {
    use std::os::unix::fs::PermissionsExt;
    use std::path::Path;

    use similar_asserts::assert_eq;

    use super::*;

    const FAKE_VIRSH: &str = r#"#!/bin/sh
# --connect <uri> <command> [args...]
shift 2
case "$1" in
  version) echo "Compiled against library: libvirt 9.0.0" ;;
  list) printf 'instance-1\ninstance-2\n\n' ;;
  domuuid)
    if [ "$2" = "instance-2" ]; then
      echo "error: failed to get domain '$2'" >&2
      exit 1
    fi
    printf '6f1c2a3e-0d55-4a5b-9f4a-0e6a2f3b7c11\n\n' ;;
  domstate) printf 'running\n\n' ;;
  dommemstat) printf 'actual 2097152\nunused 1048576\n' ;;
  domblkstat) echo "error: invalid argument: invalid path $3 not assigned to domain" >&2; exit 1 ;;
  vcpucount) sleep 5 ;;
  *) echo "error: unknown command '$1'" >&2; exit 1 ;;
esac
"#;

    const FLAKY_LOOKUP_VIRSH: &str = r#"#!/bin/sh
shift 2
case "$1" in
  version) echo "Compiled against library: libvirt 9.0.0" ;;
  list) printf 'instance-1\ninstance-2\ninstance-3\n\n' ;;
  domuuid)
    case "$2" in
      instance-2) echo "error: internal error: monitor busy" >&2; exit 1 ;;
      instance-3) printf '\n' ;;
      *) printf '6f1c2a3e-0d55-4a5b-9f4a-0e6a2f3b7c11\n\n' ;;
    esac ;;
  *) echo "error: unknown command '$1'" >&2; exit 1 ;;
esac
"#;

    const FAILING_LIST_VIRSH: &str = r#"#!/bin/sh
shift 2
case "$1" in
  version) echo "Compiled against library: libvirt 9.0.0" ;;
  list) echo "error: internal error: monitor busy" >&2; exit 1 ;;
  *) echo "error: unknown command '$1'" >&2; exit 1 ;;
esac
"#;

    fn install(dir: &Path, script: &str) -> PathBuf {
        let path = dir.join("virsh");
        std::fs::write(&path, script).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn connector(virsh: PathBuf) -> VirshConnector {
        VirshConnector::new(
            virsh,
            "qemu+tcp://root@{host}/system".to_string(),
            Duration::from_millis(500),
        )
    }

    #[test]
    fn uri_substitutes_host() {
        let connector = connector(PathBuf::from("virsh"));
        assert_eq!(
            connector.uri_for("10.0.0.1"),
            "qemu+tcp://root@10.0.0.1/system"
        );
    }

    #[tokio::test]
    async fn session_runs_virsh_commands() {
        let dir = tempfile::tempdir().unwrap();
        let session = connector(install(dir.path(), FAKE_VIRSH))
            .open("10.0.0.1")
            .await
            .expect("session opens");

        let domains = session.list_domains().await.expect("domains");
        assert_eq!(
            domains,
            vec![DomainRef::new(
                "instance-1",
                "6f1c2a3e-0d55-4a5b-9f4a-0e6a2f3b7c11"
            )]
        );
        assert!(session.is_active("instance-1").await.unwrap());
        assert_eq!(
            session.memory_stats("instance-1").await.unwrap(),
            MemoryStats {
                actual_kb: 2_097_152,
                unused_kb: 1_048_576,
            }
        );

        match session.block_stats("instance-1", "vdz").await {
            Err(SessionError::CommandFailed { operation, .. }) => {
                assert_eq!(operation, "domblkstat")
            }
            other => panic!("expected command failure, got {other:?}"),
        }
        match session.max_vcpus("instance-1").await {
            Err(e @ SessionError::Timeout { .. }) => assert!(e.is_transient()),
            other => panic!("expected timeout, got {other:?}"),
        }

        session.close().await;
        assert!(matches!(
            session.memory_stats("instance-1").await,
            Err(SessionError::Unreachable { .. })
        ));
    }

    #[tokio::test]
    async fn failed_uuid_lookup_skips_only_that_domain() {
        let dir = tempfile::tempdir().unwrap();
        let session = connector(install(dir.path(), FLAKY_LOOKUP_VIRSH))
            .open("10.0.0.1")
            .await
            .expect("session opens");

        let domains = session.list_domains().await.expect("listing succeeds");
        assert_eq!(
            domains,
            vec![DomainRef::new(
                "instance-1",
                "6f1c2a3e-0d55-4a5b-9f4a-0e6a2f3b7c11"
            )]
        );
    }

    #[tokio::test]
    async fn failed_name_listing_fails_the_host() {
        let dir = tempfile::tempdir().unwrap();
        let session = connector(install(dir.path(), FAILING_LIST_VIRSH))
            .open("10.0.0.1")
            .await
            .expect("session opens");

        match session.list_domains().await {
            Err(SessionError::CommandFailed { operation, .. }) => assert_eq!(operation, "list"),
            other => panic!("expected listing failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unreachable_daemon_fails_open() {
        let dir = tempfile::tempdir().unwrap();
        let virsh = install(
            dir.path(),
            "#!/bin/sh\necho 'error: failed to connect to the hypervisor' >&2\nexit 1\n",
        );

        match connector(virsh).open("10.0.0.9").await {
            Err(SessionError::Unreachable { host, .. }) => assert_eq!(host, "10.0.0.9"),
            Err(other) => panic!("expected unreachable, got {other:?}"),
            Ok(_) => panic!("session should not open"),
        }
    }

    #[tokio::test]
    async fn missing_binary_fails_open() {
        let result = connector(PathBuf::from("/nonexistent/virsh"))
            .open("10.0.0.1")
            .await;
        assert!(matches!(result, Err(SessionError::Unreachable { .. })));
    }
}
