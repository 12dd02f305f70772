//! Route controller - compiles Route intents into Istio routing configuration

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use kube::{Client, CustomResourceExt};

use routecontroller::controller::RouteContext;
use routecontroller::runner::build_route_controllers;
use routecontroller::{offline, ControllerConfig, RouteArgs};
use routecontroller_common::crd::Route;
use routecontroller_common::telemetry::{init_telemetry, LogFormat, TelemetryConfig};
use routecontroller_compiler::RouteCompiler;

/// Route controller - keeps VirtualServices and Services in sync with Routes
#[derive(Parser, Debug)]
#[command(name = "routecontroller", version, about, long_about = None)]
struct Cli {
    /// Print the Route CRD manifest and exit
    #[arg(long)]
    crd: bool,

    /// Log output format (json or text)
    #[arg(long, env = "LOG_FORMAT", default_value = "json")]
    log_format: LogFormat,

    #[command(flatten)]
    routes: RouteArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run as controller (default mode)
    Controller,

    /// Compile Routes from a YAML file and print the generated resources
    Compile {
        /// File holding Route documents or a RouteList
        #[arg(long)]
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // The kube client's TLS stack needs a process-wide crypto provider
    if let Err(e) = rustls::crypto::aws_lc_rs::default_provider().install_default() {
        eprintln!("CRITICAL: Failed to install aws-lc-rs crypto provider: {:?}", e);
        std::process::exit(1);
    }

    let cli = Cli::parse();

    if cli.crd {
        let crd = serde_yaml::to_string(&Route::crd())
            .map_err(|e| anyhow::anyhow!("Failed to serialize CRD: {}", e))?;
        println!("{crd}");
        return Ok(());
    }

    init_telemetry(TelemetryConfig {
        format: cli.log_format,
        filter: None,
    })?;

    let config = ControllerConfig::try_from(cli.routes)?;

    match cli.command {
        Some(Commands::Compile { file }) => compile_file(&file, &config),
        Some(Commands::Controller) | None => run_controller(config).await,
    }
}

/// Compile a route manifest without touching a cluster
fn compile_file(path: &std::path::Path, config: &ControllerConfig) -> anyhow::Result<()> {
    let yaml = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path.display(), e))?;

    let routes = offline::load_routes(&yaml)?;
    let compiled = RouteCompiler::new(config.istio_gateways.iter().cloned()).compile(&routes);

    for skipped in &compiled.skipped_fqdns {
        tracing::warn!(fqdn = %skipped.fqdn, error = %skipped.error, "fqdn not compiled");
    }
    for skipped in &compiled.skipped_destinations {
        tracing::warn!(destination = %skipped.destination, error = %skipped.error, "destination not compiled");
    }

    print!("{}", offline::render(&compiled)?);
    Ok(())
}

async fn run_controller(config: ControllerConfig) -> anyhow::Result<()> {
    let client = Client::try_default()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create Kubernetes client: {}", e))?;

    tracing::info!("Starting route controller");

    let ctx = Arc::new(RouteContext::from_client(client.clone(), &config));
    let controllers = build_route_controllers(client, ctx);

    // The watch loop ends on SIGTERM/SIGINT; the resync loop never does
    futures::future::select_all(controllers).await;

    tracing::info!("Route controller shut down");
    Ok(())
}
