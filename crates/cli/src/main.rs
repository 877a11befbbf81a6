//! gotify-relay entry point.
//!
//! This binary is the composition root for the entire system. Responsibilities:
//!
//! 1. **Parse configuration** — load the TOML file and validate it.
//! 2. **Wire observability** — configure `tracing-subscriber` (human-readable
//!    or JSON) and, when an endpoint is given, an OpenTelemetry OTLP exporter.
//!    All `tracing` spans and events from every crate flow through this layer.
//! 3. **Construct infrastructure** — create the websocket connector and the
//!    HTTP webhook client and inject them into a [`dispatch::Relay`].
//! 4. **Host the relay** — enable it, translate SIGINT/SIGTERM into
//!    `disable`, and apply the restart policy when the stream closes.

mod config;
mod host;
mod telemetry;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "gotify-relay", version, about = "Forward gotify messages to webhooks (Discord, Slack, ...)")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Configuration file.
    #[arg(long, global = true, env = "GOTIFY_RELAY_CONFIG", default_value = "gotify-relay.toml")]
    config: PathBuf,

    /// Client token for the gotify stream (overrides the file value).
    #[arg(long, global = true, env = "GOTIFY_CLIENT_TOKEN", hide_env_values = true)]
    client_token: Option<String>,

    /// Log level (trace, debug, info, warn, error). `RUST_LOG` wins if set.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// OTLP gRPC endpoint to export traces to.
    #[arg(long, global = true, env = "OTEL_EXPORTER_OTLP_ENDPOINT")]
    otlp_endpoint: Option<String>,
}

#[derive(Clone, Copy, Subcommand)]
enum Command {
    /// Connect to gotify and relay messages (default).
    Run,
    /// Validate the configuration file and exit.
    Check,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    stream::install_crypto_provider();

    let telemetry = match telemetry::init(&cli.log_level, cli.json_logs, cli.otlp_endpoint.as_deref()) {
        Ok(telemetry) => telemetry,
        Err(e) => {
            eprintln!("gotify-relay: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    let result = match cli.command.unwrap_or(Command::Run) {
        Command::Run => run(&cli).await,
        Command::Check => check(&cli),
    };
    let code = match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %format!("{e:#}"), "gotify-relay stopped");
            ExitCode::FAILURE
        }
    };
    telemetry.shutdown();
    code
}

async fn run(cli: &Cli) -> anyhow::Result<()> {
    let config = config::load(&cli.config, cli.client_token.clone())?;
    info!(config = %cli.config.display(), "starting gotify-relay");
    host::run(config).await
}

fn check(cli: &Cli) -> anyhow::Result<()> {
    let config = config::load(&cli.config, cli.client_token.clone())?;
    let table = config.relay.validate()?;

    println!("configuration OK: {}", cli.config.display());
    println!("stream: {}", config.relay.stream_endpoint());
    for rule in table.rules() {
        println!(
            "  app {} -> {} ({})",
            rule.application_id, rule.target.host(), rule.display_name
        );
    }
    Ok(())
}
