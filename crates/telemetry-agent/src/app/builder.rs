use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use crate::app::services::SamplingSettings;
use crate::app::Application;
use crate::app::ApplicationServices;
use crate::config::ConnectionArgs;
use crate::config::DaemonArgs;
use crate::domain::metrics::ConnectionRegistry;
use crate::domain::metrics::WorkloadResolver;
use crate::infrastructure::clock::SystemClock;
use crate::infrastructure::virsh::VirshConnector;
use crate::infrastructure::workload::IdentityResolver;
use crate::infrastructure::workload::StaticWorkloadResolver;

/// Application builder
pub struct ApplicationBuilder {
    daemon_args: DaemonArgs,
}

impl ApplicationBuilder {
    /// Create new application builder
    pub fn new(daemon_args: DaemonArgs) -> Self {
        Self { daemon_args }
    }

    /// Build complete application
    pub async fn build(self) -> Result<Application> {
        tracing::info!("Building application components...");

        let services = build_services(
            &self.daemon_args.connection,
            self.daemon_args.retention(),
            self.daemon_args.poll_interval(),
        )
        .await?;

        Ok(Application::new(services, self.daemon_args))
    }
}

/// Resolve workloads, connect to every configured host and wire the
/// sampling core.
pub async fn build_services(
    connection: &ConnectionArgs,
    retention: chrono::Duration,
    poll_interval: Duration,
) -> Result<ApplicationServices> {
    let resolver = create_resolver(connection)?;

    let connector = VirshConnector::new(
        connection.virsh_path.clone(),
        connection.connection_uri_template.clone(),
        connection.call_timeout(),
    );
    let registry = ConnectionRegistry::connect(
        &connector,
        &connection.hypervisor_hosts,
        connection.call_timeout(),
    )
    .await;
    tracing::info!(
        configured = connection.hypervisor_hosts.len(),
        connected = registry.sessions().len(),
        "Hypervisor sessions established"
    );

    Ok(ApplicationServices::new(
        registry,
        resolver,
        Arc::new(SystemClock),
        SamplingSettings {
            retention,
            call_timeout: connection.call_timeout(),
            poll_interval,
        },
    ))
}

fn create_resolver(connection: &ConnectionArgs) -> Result<Arc<dyn WorkloadResolver>> {
    Ok(match &connection.workload_map_path {
        Some(path) => Arc::new(StaticWorkloadResolver::load(path)?),
        None => Arc::new(IdentityResolver),
    })
}
