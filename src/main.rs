mod config;
mod error;
mod model;
mod remote;
mod store;
mod sync;

use clap::{Parser, Subcommand};
use config::Config;
use error::SyncError;
use remote::RemoteClient;
use store::LibraryStore;
use sync::{ProgressSender, SyncEngine, SyncEvent};
use tracing::{info, warn, Level};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "photo-mirror")]
#[command(about = "Mirror a remote photo library into a local directory tree")]
struct Cli {
    /// Path to config file (optional if using environment variables)
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile the local tree with the remote library
    Sync,

    /// Verify that the remote session can be established
    Ping,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(Level::INFO.into())
                .from_env_lossy(),
        )
        .init();

    std::process::exit(run().await);
}

async fn run() -> i32 {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => Config::load(path),
        None => Config::from_env(),
    };
    let config = match config {
        Ok(config) => config,
        Err(err) => {
            eprintln!("configuration error: {err}");
            return 1;
        }
    };

    let client = match RemoteClient::new(&config.remote.url, &config.remote.api_key) {
        Ok(client) => client,
        Err(err) => {
            eprintln!("failed to build remote client: {err}");
            return 1;
        }
    };

    match cli.command {
        Commands::Ping => match client.refresh_session().await {
            Ok(()) => {
                println!("Remote session established");
                0
            }
            Err(err) => {
                eprintln!("ping failed: {err}");
                1
            }
        },

        Commands::Sync => {
            let store = LibraryStore::new(&config.storage.data_dir);
            let (progress, mut events) = ProgressSender::channel();
            let reporter = tokio::spawn(async move {
                while let Some(event) = events.recv().await {
                    report(event);
                }
            });

            let engine = SyncEngine::new(client, store, &config.sync, progress);
            let result = engine.sync().await;
            let _ = reporter.await;

            match result {
                Ok(outcome) => {
                    println!(
                        "Sync complete in {} attempt(s): {} assets ({} downloaded, {} deleted), {} albums ({} created, {} removed)",
                        outcome.report.attempts,
                        outcome.assets.len(),
                        outcome.report.assets_downloaded,
                        outcome.report.assets_deleted,
                        outcome.albums.len(),
                        outcome.report.albums_created,
                        outcome.report.albums_removed,
                    );
                    0
                }
                Err(err @ SyncError::RetriesExhausted { .. }) => {
                    eprintln!("sync failed: {err}");
                    2
                }
                Err(err) => {
                    eprintln!("sync failed: {err}");
                    1
                }
            }
        }
    }
}

fn report(event: SyncEvent) {
    match event {
        SyncEvent::AttemptStarted { attempt } => info!("starting sync attempt {attempt}"),
        SyncEvent::Fetched {
            remote_assets,
            remote_albums,
            local_assets,
            local_albums,
        } => info!(
            "remote: {remote_assets} assets / {remote_albums} albums, local: {local_assets} assets / {local_albums} albums"
        ),
        SyncEvent::Diffed {
            assets_to_add,
            assets_to_delete,
            albums_to_add,
            albums_to_delete,
        } => info!(
            "plan: {assets_to_add} asset adds, {assets_to_delete} asset deletes, {albums_to_add} album adds, {albums_to_delete} album deletes"
        ),
        SyncEvent::AssetAdded { uuid } => info!("downloaded asset {uuid}"),
        SyncEvent::AssetDeleted { uuid } => info!("deleted asset {uuid}"),
        SyncEvent::AlbumCreated { uuid } => info!("created album {uuid}"),
        SyncEvent::AlbumRemoved { uuid } => info!("removed album {uuid}"),
        SyncEvent::AttemptFailed { attempt, error } => {
            warn!("attempt {attempt} failed: {error}")
        }
        SyncEvent::Completed { assets, albums } => {
            info!("library now mirrors {assets} assets in {albums} albums")
        }
    }
}
