//! fastscaled — the fastscale daemon.
//!
//! Loads the service list, then runs one autoscaling loop per service
//! until SIGTERM or Ctrl-C:
//! - Status probe (HTTP, certificate checks off)
//! - ECS orchestrator client
//! - Webhook notifier
//! - Supervisor + service loops
//!
//! # Usage
//!
//! ```text
//! fastscaled run --param-key /ecs/fast-autoscaler/config.json --region ap-northeast-1
//! fastscaled validate --config ./fastscale.json
//! ```

mod params;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use fastscale_autoscale::Supervisor;
use fastscale_ecs::EcsOrchestrator;
use fastscale_notify::WebhookNotifier;
use fastscale_probe::HttpStatusProbe;

use params::{load_specs, ConfigSource, DEFAULT_PARAM_KEY, DEFAULT_REGION};

#[derive(Parser)]
#[command(name = "fastscaled", about = "Reactive ECS scale-out daemon")]
struct Cli {
    /// Log output format.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Json)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the autoscaling loops until terminated.
    Run {
        #[command(flatten)]
        config: ConfigArgs,

        /// Timeout for each ECS call, in seconds.
        #[arg(long, default_value = "10")]
        orchestrator_timeout: u64,
    },
    /// Load and validate the configuration, print the resolved services.
    Validate {
        #[command(flatten)]
        config: ConfigArgs,
    },
}

#[derive(Args)]
struct ConfigArgs {
    /// Read the configuration from a local JSON or TOML file instead of
    /// Parameter Store.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Parameter Store key holding the configuration document.
    #[arg(long, env = "AUTOSCALER_PARAMKEY", default_value = DEFAULT_PARAM_KEY)]
    param_key: String,

    /// AWS region for Parameter Store and ECS.
    #[arg(long, env = "AUTOSCALER_REGION", default_value = DEFAULT_REGION)]
    region: String,
}

impl ConfigArgs {
    fn source(&self) -> ConfigSource {
        ConfigSource::select(self.config.clone(), self.param_key.clone())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Json,
    Text,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    match cli.command {
        Command::Run {
            config,
            orchestrator_timeout,
        } => run(config, Duration::from_secs(orchestrator_timeout)).await,
        Command::Validate { config } => validate(config).await,
    }
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,fastscale=debug,fastscaled=debug"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Json => builder.json().with_current_span(true).init(),
        LogFormat::Text => builder.init(),
    }
}

async fn load_aws(region: &str) -> aws_config::SdkConfig {
    aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(aws_config::Region::new(region.to_string()))
        .load()
        .await
}

async fn run(args: ConfigArgs, orchestrator_timeout: Duration) -> anyhow::Result<()> {
    info!("fastscale daemon starting");

    let aws = load_aws(&args.region).await;
    info!(region = %args.region, "aws configuration loaded");

    // ── Configuration (fatal on error) ─────────────────────────

    let source = args.source();
    let specs = match load_specs(&source, Some(&aws)).await {
        Ok(specs) => specs,
        Err(e) => {
            error!(%source, error = %e, "invalid configuration");
            return Err(e.into());
        }
    };

    // ── External collaborators ─────────────────────────────────

    let probe = Arc::new(HttpStatusProbe::new()?);
    let orchestrator = Arc::new(EcsOrchestrator::new(&aws));
    let notifier = Arc::new(WebhookNotifier::new()?);

    // ── Shutdown signal ────────────────────────────────────────

    let cancel = CancellationToken::new();
    let cancel_on_signal = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("shutdown signal received, stopping timers");
        cancel_on_signal.cancel();
    });

    // ── Service loops ──────────────────────────────────────────

    let supervisor = Supervisor::new(probe, orchestrator, notifier)
        .with_call_timeout(orchestrator_timeout);
    let reports = supervisor.run(specs, cancel).await;

    let failed = reports.iter().filter(|r| r.state.is_none()).count();
    if failed > 0 {
        warn!(failed, "some service loops ended abnormally");
    }

    info!("fastscale daemon stopped");
    Ok(())
}

async fn validate(args: ConfigArgs) -> anyhow::Result<()> {
    let source = args.source();
    let aws = if source.needs_aws() {
        Some(load_aws(&args.region).await)
    } else {
        None
    };

    let specs = load_specs(&source, aws.as_ref()).await?;
    println!("{}", serde_json::to_string_pretty(&specs)?);
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("received Ctrl+C"),
        () = terminate => info!("received SIGTERM"),
    }
}
