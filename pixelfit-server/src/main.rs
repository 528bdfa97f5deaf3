//! `pixelfit` binary: serve the API, or print the decay schedule.

use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;

use pixelfit_core::{report, PixelfitConfig, Store};
use pixelfit_server::{build_router, telemetry, AppState};

#[derive(Parser, Debug)]
#[command(name = "pixelfit", version, about = "PixelFit backend")]
struct Cli {
    /// TOML configuration file. Defaults apply when omitted.
    #[arg(long, short, env = "PIXELFIT_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server (default).
    Serve(ServeArgs),
    /// Print the happiness decay schedule.
    DecayReport {
        /// Happiness points per table row.
        #[arg(long, default_value = "10")]
        block: NonZeroU32,
        /// Starting happiness for the step-by-step trace.
        #[arg(long, default_value_t = 2)]
        from: i32,
    },
}

#[derive(clap::Args, Debug, Default)]
struct ServeArgs {
    /// Port to listen on.
    #[arg(long, short, env = "PIXELFIT_PORT")]
    port: Option<u16>,
    /// SQLite database file.
    #[arg(long, env = "PIXELFIT_DB")]
    db: Option<PathBuf>,
    /// Directory of front-end files served at `/`.
    #[arg(long)]
    static_dir: Option<PathBuf>,
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<PixelfitConfig> {
    match path {
        Some(path) => PixelfitConfig::from_file(path)
            .with_context(|| format!("loading config from {}", path.display())),
        None => Ok(PixelfitConfig::default()),
    }
}

fn decay_report(block: NonZeroU32, from: i32) -> anyhow::Result<()> {
    let table = report::decay_table(block)?;
    println!("{}", report::render_table(&table));
    let trace = report::decay_trace(from)?;
    println!("{}", report::render_trace(&trace));
    Ok(())
}

async fn serve(mut config: PixelfitConfig, args: ServeArgs) -> anyhow::Result<()> {
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(db) = args.db {
        config.persistence.db_path = db.display().to_string();
    }
    if let Some(dir) = args.static_dir {
        config.server.static_dir = dir.display().to_string();
    }

    telemetry::init(&config.general)?;

    let store = Store::open(&config.persistence.db_path, &config.persistence)
        .with_context(|| format!("opening {}", config.persistence.db_path))?;
    if store.seed_defaults()? {
        info!("Seeded default settings");
    }

    let state = AppState::new(store, config.pet.clone());
    let app = build_router(state, &config.server);

    let addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port)
        .parse()
        .context("invalid bind address")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, static_dir = %config.server.static_dir, "PixelFit server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref())?;

    match cli.command.unwrap_or_else(|| Command::Serve(ServeArgs::default())) {
        Command::Serve(args) => serve(config, args).await,
        Command::DecayReport { block, from } => decay_report(block, from),
    }
}
