//! gpumond: the GPU metrics exporter daemon.
//!
//! Loads metric declarations, registers them, polls every GPU on a timer,
//! and serves the result for Prometheus to scrape.
//!
//! # Usage
//!
//! ```text
//! gpumond --config config/metrics.toml serve --port 9500 --interval 5
//! gpumond --config config/metrics.toml check
//! gpumond serve --simulate 2
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use gpumon_device::{DeviceProvider, SimulatedProvider};
use gpumon_registry::MetricRegistry;
use gpumond::{Exporter, load_schemas};

#[derive(Parser)]
#[command(name = "gpumond", about = "GPU metrics exporter", version)]
struct Cli {
    /// Metric declarations file (TOML, or JSON by extension).
    #[arg(long, global = true, env = "CONFIG_FILE", default_value = "config/metrics.toml")]
    config: PathBuf,

    /// Default log level; RUST_LOG overrides it.
    #[arg(long, global = true, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Run the exporter.
    Serve(ServeArgs),
    /// Load and register the declarations, print them, and exit.
    Check,
}

#[derive(Args)]
struct ServeArgs {
    /// Address to listen on.
    #[arg(long, env = "HOST", default_value = "localhost")]
    host: String,

    /// Port to listen on.
    #[arg(long, env = "PORT", default_value = "9500")]
    port: u16,

    /// Collection interval in seconds.
    #[arg(long, env = "INTERVAL", default_value = "5", value_parser = clap::value_parser!(u64).range(1..))]
    interval: u64,

    /// Per-pass deadline in seconds. Defaults to the interval.
    #[arg(long)]
    pass_timeout: Option<u64>,

    /// Serve N simulated devices instead of real hardware.
    #[arg(long, value_name = "N")]
    simulate: Option<u32>,
}

fn init_tracing(level: &str, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    match format {
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
        LogFormat::Json => tracing_subscriber::fmt().json().with_env_filter(filter).init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level, cli.log_format);

    match cli.command {
        Command::Serve(args) => run_serve(cli.config, args).await,
        Command::Check => run_check(cli.config),
    }
}

fn run_check(config: PathBuf) -> anyhow::Result<()> {
    let schemas = load_schemas(&config)?;
    let registry = MetricRegistry::new();
    registry
        .load_all(&schemas)
        .context("registering metric declarations")?;

    for observable in registry.declared() {
        let schema = observable.schema();
        println!(
            "{:<32} {:<6} [{}] {}",
            schema.name,
            schema.kind,
            schema.label_names().join(", "),
            schema.help
        );
    }
    println!("{} metrics declared in {}", registry.len(), config.display());
    Ok(())
}

fn device_provider(simulate: Option<u32>) -> anyhow::Result<Arc<dyn DeviceProvider>> {
    match simulate {
        Some(count) => {
            info!(count, "using simulated devices");
            Ok(Arc::new(SimulatedProvider::uniform(count, "Simulated GPU")))
        }
        None => hardware_provider(),
    }
}

#[cfg(feature = "nvml")]
fn hardware_provider() -> anyhow::Result<Arc<dyn DeviceProvider>> {
    let provider = gpumon_device::NvmlProvider::init().context("initialising NVML")?;
    Ok(Arc::new(provider))
}

#[cfg(not(feature = "nvml"))]
fn hardware_provider() -> anyhow::Result<Arc<dyn DeviceProvider>> {
    anyhow::bail!("no device backend available: build with --features nvml or pass --simulate <N>")
}

async fn run_serve(config: PathBuf, args: ServeArgs) -> anyhow::Result<()> {
    info!("gpumond starting");

    let schemas = load_schemas(&config)?;
    let provider = device_provider(args.simulate)?;
    let device_count = provider
        .device_count()
        .context("enumerating devices")?;
    info!(backend = provider.backend(), devices = device_count, "device backend ready");

    let interval = Duration::from_secs(args.interval);
    let pass_timeout = args.pass_timeout.map(Duration::from_secs);
    let exporter = Exporter::new(&schemas, provider, interval, pass_timeout)?;

    // ── Shutdown signal ────────────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let collector_handle = exporter.spawn_collector(shutdown_rx);

    // ── Start HTTP server ──────────────────────────────────────

    let router = exporter.router();
    let listener = tokio::net::TcpListener::bind((args.host.as_str(), args.port))
        .await
        .with_context(|| format!("binding {}:{}", args.host, args.port))?;
    info!(addr = %listener.local_addr()?, "metrics server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "failed to listen for shutdown signal");
            }
            info!("shutdown signal received");
            let _ = shutdown_tx.send(true);
        })
        .await?;

    let _ = collector_handle.await;

    info!("gpumond stopped");
    Ok(())
}
