use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use tokio::signal;
use tracing::info;

use schemadoc::config::{load_settings, validate_settings};
use schemadoc::logging::{self, LogFormat};
use schemadoc::reader::{Connector, DefaultConnector};
use schemadoc::report::{LogProgress, ReportAssembler};
use schemadoc::sanitize::redact_connection_string;
use schemadoc::{ConnectionParams, ReportError, Settings};
use schemadoc_server::{build_router, AppState};

#[derive(Parser)]
#[command(name = "schemadoc", version, about = "Database schema documentation generator")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the web front end
    Serve(ServeArgs),
    /// Document a database once and exit
    Generate(GenerateArgs),
}

#[derive(Args)]
struct ServeArgs {
    /// JSON settings file
    #[arg(long, env = "SCHEMADOC_CONFIG")]
    config: Option<PathBuf>,

    #[arg(long)]
    host: Option<String>,

    #[arg(long)]
    port: Option<u16>,
}

#[derive(Args)]
struct GenerateArgs {
    /// username/password@host:port/service_name
    #[arg(long, conflicts_with = "sqlite", required_unless_present = "sqlite")]
    connection_string: Option<String>,

    /// SQLite database file to document
    #[arg(long)]
    sqlite: Option<PathBuf>,

    /// Comma-separated table names; all tables when omitted
    #[arg(long, value_delimiter = ',')]
    tables: Vec<String>,

    #[arg(long)]
    output_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init(LogFormat::from_env())?;

    let cli = Cli::parse();
    match cli.command {
        Command::Serve(args) => serve(args).await,
        Command::Generate(args) => generate(args).await,
    }
}

fn resolve_settings(args: &ServeArgs) -> Result<Settings, Box<dyn std::error::Error>> {
    let base = match &args.config {
        Some(path) => load_settings(path)?,
        None => Settings::default(),
    };
    let mut settings = base.with_env()?;
    if let Some(host) = &args.host {
        settings.host = host.clone();
    }
    if let Some(port) = args.port {
        settings.port = port;
    }
    validate_settings(&settings)?;
    Ok(settings)
}

async fn serve(args: ServeArgs) -> Result<(), Box<dyn std::error::Error>> {
    let settings = resolve_settings(&args)?;
    tokio::fs::create_dir_all(&settings.output_directory).await?;

    let state = Arc::new(AppState::from_settings(&settings)?);
    let app = build_router(state);

    let addr = settings.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("schemadoc listening on http://{}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server shutdown complete");
    Ok(())
}

async fn generate(args: GenerateArgs) -> Result<(), Box<dyn std::error::Error>> {
    let params = match (&args.connection_string, &args.sqlite) {
        (Some(value), _) => {
            info!("Connecting with {}", redact_connection_string(value));
            ConnectionParams::parse_connection_string(value)?
        }
        (None, Some(path)) => ConnectionParams::Sqlite { path: path.clone() },
        (None, None) => return Err("either --connection-string or --sqlite is required".into()),
    };
    let output_dir = match args.output_dir {
        Some(dir) => dir,
        None => Settings::from_env()?.output_directory,
    };
    let selected = (!args.tables.is_empty()).then_some(args.tables);

    let output = tokio::task::spawn_blocking(move || -> Result<_, ReportError> {
        let reader = DefaultConnector.connect(&params)?;
        ReportAssembler::new(reader.as_ref(), &LogProgress).generate(
            &params.service_label(),
            &output_dir,
            selected.as_deref(),
        )
    })
    .await??;

    println!("{}", output.path.display());
    Ok(())
}

/// Wait for SIGTERM or SIGINT (Ctrl+C) for graceful shutdown
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
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
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT, initiating graceful shutdown"),
        _ = terminate => info!("Received SIGTERM, initiating graceful shutdown"),
    }
}
