use anyhow::Result;
use clap::Parser;
use docvault::config::{Config, ObservabilityConfig, DEFAULT_CONFIG_FILE};
use docvault::source::MongoSource;
use docvault::{Exporter, Scheduler, Uploader};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "docvault")]
#[command(about = "Scheduled MongoDB backups uploaded to remote storage")]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long, env = "DOCVAULT_CONFIG", default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Run a single backup cycle and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();
    let config = Config::load_or_default(&args.config)?;
    init_tracing(&config.observability);

    info!("{}", describe_config(&args.config));
    let scheduler = build_scheduler(&config)?;

    if args.once {
        return Ok(match scheduler.run_once().await {
            Ok((artifact, id)) => {
                info!(artifact = %artifact.name, remote_id = %id, "Backup finished");
                ExitCode::SUCCESS
            }
            Err(e) => {
                error!("Backup failed: {}", e);
                ExitCode::FAILURE
            }
        });
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    });

    scheduler.run(shutdown_rx).await;
    Ok(ExitCode::SUCCESS)
}

fn init_tracing(observability: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&observability.log_level));
    let json = match std::env::var("LOG_FORMAT") {
        Ok(format) => format.eq_ignore_ascii_case("json"),
        Err(_) => observability.log_format == "json",
    };

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Startup line naming where settings came from. Only meaningful once
/// tracing is up, so it is logged after `init_tracing`.
fn describe_config(path: &Path) -> String {
    if path.exists() {
        format!("Config file: {}", path.display())
    } else {
        format!(
            "No config at {}, using defaults and DOCVAULT_* overrides",
            path.display()
        )
    }
}

fn build_scheduler(config: &Config) -> Result<Scheduler> {
    let source = Arc::new(MongoSource::new(&config.source.uri));
    let store = docvault_storage::create_store(&config.destination.to_store_config()?)?;

    info!(
        database = %config.source.database,
        output_dir = %config.backup.output_dir.display(),
        destination = %config.destination.kind,
        backend = store.backend_name(),
        "Backup pipeline configured"
    );

    let exporter = Exporter::new(source, &config.source.database, &config.backup.output_dir);
    let uploader = Uploader::new(store);
    Ok(Scheduler::new(exporter, uploader, &config.destination.folder)
        .with_interval(config.backup.interval()))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, finishing current cycle before exit"),
        _ = terminate => info!("Received SIGTERM, finishing current cycle before exit"),
    }
}
