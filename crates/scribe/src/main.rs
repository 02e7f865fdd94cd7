//! # scribe
//!
//! Scribe server binary: loads settings, wires the scheduler to a
//! transcriber, and serves HTTP until Ctrl-C.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use scribe_scheduler::{Scheduler, SystemResourceMonitor};
use scribe_server::{ScribeServer, ServerConfig};
use scribe_settings::{LoggingSettings, ScribeSettings};
use scribe_transcription::{MockTranscriber, SidecarTranscriber, Transcriber};
use tracing_subscriber::EnvFilter;

/// Scribe transcription server.
#[derive(Parser, Debug)]
#[command(name = "scribe", about = "Admission-controlled transcription server")]
struct Cli {
    /// Settings file (defaults to `$SCRIBE_CONFIG` or `~/.scribe/settings.json`).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind (overrides settings).
    #[arg(long)]
    port: Option<u16>,

    /// Processing slots (overrides settings).
    #[arg(long)]
    max_concurrent_jobs: Option<usize>,

    /// Emit JSON log lines.
    #[arg(long)]
    log_json: bool,

    /// Answer with the built-in deterministic transcriber instead of the sidecar.
    #[arg(long)]
    mock_transcriber: bool,
}

impl Cli {
    /// Layer command-line values over loaded settings.
    fn apply(&self, settings: &mut ScribeSettings) {
        if let Some(ref host) = self.host {
            settings.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        if let Some(jobs) = self.max_concurrent_jobs {
            settings.scheduler.max_concurrent_jobs = jobs;
        }
        if self.log_json {
            settings.logging.json = true;
        }
    }
}

/// Load the settings file, apply env then CLI overrides, and validate.
fn resolve_settings(cli: &Cli) -> Result<ScribeSettings> {
    let path = cli
        .config
        .clone()
        .unwrap_or_else(scribe_settings::settings_path);
    let mut settings = scribe_settings::load_settings_from_path(&path)
        .with_context(|| format!("Failed to load settings from {}", path.display()))?;
    cli.apply(&mut settings);
    settings
        .validate()
        .context("Invalid command-line override")?;
    Ok(settings)
}

fn init_logging(logging: &LoggingSettings) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(logging.level.as_filter_str()));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn build_transcriber(settings: &ScribeSettings, mock: bool) -> Result<Arc<dyn Transcriber>> {
    if mock {
        tracing::warn!("using mock transcriber, responses are synthetic");
        return Ok(Arc::new(MockTranscriber::new()));
    }
    let t = &settings.transcription;
    let sidecar = SidecarTranscriber::new(
        t.base_url.clone(),
        t.model.clone(),
        Duration::from_millis(t.timeout_ms),
    )
    .context("Failed to create sidecar client")?;
    tracing::info!(url = %t.base_url, model = %t.model, "sidecar transcriber configured");
    Ok(Arc::new(sidecar))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    let settings = resolve_settings(&args)?;
    init_logging(&settings.logging);

    let prometheus = scribe_server::metrics::install_recorder()
        .context("Failed to install metrics recorder")?;

    let transcriber = build_transcriber(&settings, args.mock_transcriber)?;
    let scheduler = Arc::new(Scheduler::from_settings(
        &settings.scheduler,
        Arc::new(SystemResourceMonitor::new()),
        transcriber,
    ));

    let server = ScribeServer::new(ServerConfig::from_settings(&settings), scheduler)
        .with_prometheus(prometheus);
    let (addr, handle) = server.listen().await.context("Failed to bind server")?;
    tracing::info!("scribe listening on http://{addr}");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("Shutting down...");
    let _ = server
        .shutdown()
        .stop_listener(handle, scribe_server::shutdown::LISTENER_GRACE)
        .await;
    tracing::info!("Shutdown complete");
    Ok(())
}
