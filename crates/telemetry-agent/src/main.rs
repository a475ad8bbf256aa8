use std::time::Duration;

use anyhow::Context;
use anyhow::Result;
use clap::Parser;
use telemetry_agent::app::builder::build_services;
use telemetry_agent::app::probe::probe;
use telemetry_agent::app::ApplicationBuilder;
use telemetry_agent::config::Cli;
use telemetry_agent::config::Commands;
use telemetry_agent::config::DaemonArgs;
use telemetry_agent::config::ProbeArgs;
use telemetry_agent::logging;
use utils::version;

// A probe only ever holds two cycles of history.
const PROBE_RETENTION_MINUTES: i64 = 60;

/// Sets up global panic hooks.
fn setup_global_hooks() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        default_hook(panic_info);
        tracing::error!("Thread panicked: {}", panic_info);
    }));
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_global_hooks();

    let cli = Cli::parse();

    match cli.command {
        Commands::Daemon(daemon_args) => run_daemon(*daemon_args).await,
        Commands::Probe(probe_args) => run_probe(probe_args).await,
    }
}

async fn run_daemon(daemon_args: DaemonArgs) -> Result<()> {
    let _guard =
        logging::init(daemon_args.log_file.as_deref()).context("failed to initialize logging")?;

    tracing::info!("Starting telemetry agent {}", &**version::VERSION);

    let app = ApplicationBuilder::new(daemon_args).build().await?;

    let result = app.run().await;
    app.shutdown().await?;

    result
}

async fn run_probe(probe_args: ProbeArgs) -> Result<()> {
    logging::init(None).context("failed to initialize logging")?;

    let services = build_services(
        &probe_args.connection,
        chrono::Duration::minutes(PROBE_RETENTION_MINUTES),
        Duration::from_secs(probe_args.probe_gap_secs),
    )
    .await?;

    let latest = probe(&services, probe_args.gap()).await;
    services.registry.close_all().await;

    let output = serde_json::to_string_pretty(&latest).context("failed to serialize records")?;
    println!("{output}");

    Ok(())
}
