mod config;
mod error;
mod models;
mod routes;
mod services;
mod state;
mod utils;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use config::Config;
use models::upload::UploadedFile;
use routes::create_routes;
use services::cleanup::CleanupService;
use services::status_store::StatusStore;
use state::{build_pipeline, AppState};

#[derive(Parser)]
#[command(name = "daysong")]
#[command(about = "Describe an audio or video recording and turn it into a song", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server (default)
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Run the pipeline once on a local file and print the final status
    Process { file: PathBuf },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("daysong=info,tower_http=info")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = Config::from_env().context("Failed to load configuration")?;

    match cli.command.unwrap_or(Command::Serve {
        host: None,
        port: None,
    }) {
        Command::Serve { host, port } => {
            if let Some(host) = host {
                config.host = host;
            }
            if let Some(port) = port {
                config.port = port;
            }
            serve(config).await
        }
        Command::Process { file } => process(config, &file).await,
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(&config.upload_dir).await?;
    tokio::fs::create_dir_all(&config.song_dir).await?;

    let store = StatusStore::new();
    if let Some(ttl) = config.status_ttl {
        let cleanup = CleanupService::new(store.clone(), ttl, config.cleanup_interval);
        tokio::spawn(cleanup.run_scheduler());
    }

    let pipeline = build_pipeline(&config, store);
    let addr = format!("{}:{}", config.host, config.port);
    let app = create_routes(AppState::new(config, pipeline));

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!(address = %listener.local_addr()?, "Listening");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn process(config: Config, file: &Path) -> anyhow::Result<()> {
    let original_name = file
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow::anyhow!("Invalid path: {}", file.display()))?
        .to_string();

    tokio::fs::create_dir_all(&config.upload_dir).await?;
    let filename = utils::generate_stored_name(&original_name);
    let path = config.upload_dir.join(&filename);
    let size = tokio::fs::copy(file, &path)
        .await
        .with_context(|| format!("Failed to copy {}", file.display()))?;

    let pipeline = Arc::new(build_pipeline(&config, StatusStore::new()));
    pipeline.store().begin(&filename, &original_name);
    Arc::clone(&pipeline)
        .run(UploadedFile {
            filename: filename.clone(),
            original_name,
            size,
            path,
        })
        .await;

    let status = pipeline
        .store()
        .get(&filename)
        .context("Status record disappeared")?;
    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}
