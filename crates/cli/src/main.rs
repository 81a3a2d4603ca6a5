mod config_commands;

use std::path::PathBuf;

use {
    anyhow::bail,
    clap::{Parser, Subcommand},
    msgsync_config::Severity,
    tracing::{info, warn},
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(name = "msgsync", about = "msgsync: Discord message sync and DM relay")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Config file to load instead of searching the standard locations.
    #[arg(long, global = true, env = "MSGSYNC_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect to Discord and serve commands (default when no subcommand is provided).
    Run,
    /// Validate the configuration and report errors/warnings.
    Check {
        /// Show informational diagnostics in addition to errors and warnings.
        #[arg(long)]
        verbose: bool,
    },
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .init();
    }
}

#[cfg(feature = "metrics")]
fn init_metrics(config: &msgsync_config::MetricsConfig) -> anyhow::Result<()> {
    msgsync_metrics::init_metrics(&msgsync_metrics::MetricsRecorderConfig {
        listen: config.listen.parse()?,
        global_labels: config.labels.clone().into_iter().collect(),
    })
}

#[cfg(not(feature = "metrics"))]
fn init_metrics(_config: &msgsync_config::MetricsConfig) -> anyhow::Result<()> {
    warn!("metrics.enabled is set but this build has no metrics support");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    init_telemetry(&cli);

    let (config, validation) = msgsync_config::load_and_validate(cli.config.as_deref());

    match cli.command {
        // Default: run the bot when no subcommand is provided
        None | Some(Commands::Run) => {
            info!(version = env!("CARGO_PKG_VERSION"), "msgsync starting");
            if let Some(ref path) = validation.config_path {
                info!(path = %path.display(), "loaded config");
            }
            for d in &validation.diagnostics {
                match d.severity {
                    Severity::Warning => warn!(path = d.path, "{}", d.message),
                    Severity::Info => info!(path = d.path, "{}", d.message),
                    Severity::Error => {},
                }
            }
            if validation.has_errors() {
                bail!("invalid configuration: {}", validation.error_summary());
            }
            if config.metrics.enabled {
                init_metrics(&config.metrics)?;
            }
            msgsync_discord::run(config).await?;
            Ok(())
        },
        Some(Commands::Check { verbose }) => {
            if !config_commands::check(&validation, verbose) {
                std::process::exit(1);
            }
            Ok(())
        },
    }
}
