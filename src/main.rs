use std::fs::File;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};

use medinteract::api::start_api_server;
use medinteract::config::{Settings, APP_NAME, APP_VERSION};
use medinteract::core_state::CoreState;
use medinteract::db;

#[derive(Parser)]
#[command(name = "medinteract", version)]
#[command(about = "Medication interaction checker")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP service (default)
    Serve {
        /// Bind address, overrides MEDINTERACT_ADDR
        #[arg(long)]
        addr: Option<SocketAddr>,
    },
    /// Load the side-effect dataset from a CSV file
    ImportCsv {
        /// Path to the comma-separated dataset
        path: PathBuf,
        /// Remove existing rows first
        #[arg(long)]
        replace: bool,
    },
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    medinteract::init_tracing();

    let cli = Cli::parse();
    let settings = Settings::from_env().context("invalid configuration")?;

    match cli.command.unwrap_or(Commands::Serve { addr: None }) {
        Commands::Serve { addr } => serve(settings, addr),
        Commands::ImportCsv { path, replace } => import_csv(&settings, &path, replace),
    }
}

/// Clients are built outside the async runtime: the blocking HTTP clients
/// must not be created or dropped on a runtime thread.
fn serve(mut settings: Settings, addr: Option<SocketAddr>) -> anyhow::Result<()> {
    if let Some(addr) = addr {
        settings.bind_addr = addr;
    }
    let bind_addr = settings.bind_addr;

    tracing::info!("{APP_NAME} starting v{APP_VERSION}");
    let core = Arc::new(CoreState::from_settings(settings).context("startup failed")?);

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        let mut server = start_api_server(Arc::clone(&core), bind_addr)
            .await
            .with_context(|| format!("failed to bind {bind_addr}"))?;
        tracing::info!(addr = %server.session.server_addr, "Listening");

        tokio::signal::ctrl_c().await?;
        server.shutdown();
        server.wait().await;
        Ok::<_, anyhow::Error>(())
    })?;

    drop(runtime);
    drop(core);
    Ok(())
}

fn import_csv(settings: &Settings, path: &Path, replace: bool) -> anyhow::Result<()> {
    let file = File::open(path).with_context(|| format!("cannot open {}", path.display()))?;
    let mut conn = db::open_database(&settings.database_path)?;
    let report = db::import_side_effects_csv(&mut conn, file, replace)
        .with_context(|| format!("import of {} failed", path.display()))?;

    tracing::info!(
        database = %settings.database_path.display(),
        inserted = report.rows_inserted,
        removed = report.rows_removed,
        "Import complete"
    );
    Ok(())
}
