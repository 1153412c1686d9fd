//! Music Spot server binary.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use musicspot_core::config::AppConfig;
use musicspot_server::{AppState, Library, OrphanReport, PurgeStats, create_router};
use musicspot_storage::ChunkStore;
use serde::Serialize;
use std::net::SocketAddr;
use std::path::Path;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Music Spot - audio asset storage and streaming
#[derive(Parser, Debug)]
#[command(name = "musicspotd")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(
        short,
        long,
        env = "MUSICSPOT_CONFIG",
        default_value = "config/server.toml"
    )]
    config: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Compare the chunk store with song metadata and report orphans
    Reconcile {
        /// Delete orphaned and incomplete assets instead of only reporting them
        #[arg(long)]
        purge: bool,
    },
}

/// Load configuration from an optional TOML file, overridden by `MUSICSPOT_` variables.
fn load_config(path: &Path) -> Result<AppConfig> {
    let mut figment = Figment::new();

    if path.exists() {
        tracing::info!(config_path = %path.display(), "Loading configuration from file");
        figment = figment.merge(Toml::file(path));
    } else {
        tracing::info!(
            config_path = %path.display(),
            "No config file found, using defaults and environment"
        );
    }

    let config: AppConfig = figment
        .merge(Env::prefixed("MUSICSPOT_").split("__"))
        .extract()
        .context("failed to load configuration")?;
    Ok(config)
}

async fn build_state(config: AppConfig) -> Result<AppState> {
    let storage = musicspot_storage::from_config(&config.storage)
        .await
        .context("failed to initialize storage")?;

    // Fail before accepting requests if storage is unreachable.
    storage
        .health_check()
        .await
        .context("storage health check failed")?;
    tracing::info!(backend = storage.backend_name(), "Storage backend initialized");

    let metadata = musicspot_metadata::from_config(&config.metadata)
        .await
        .context("failed to initialize metadata store")?;
    tracing::info!("Metadata store initialized");

    AppState::new(config, ChunkStore::new(storage), metadata)
        .map_err(|e| anyhow::anyhow!("invalid configuration: {e}"))
}

/// Result of one reconciliation pass, printed by `musicspotd reconcile`.
#[derive(Debug, Serialize)]
struct ReconcileSummary {
    report: OrphanReport,
    /// Present only when the pass purged.
    purge: Option<PurgeStats>,
}

impl ReconcileSummary {
    /// Fails when songs point at missing assets or the purge hit errors.
    fn ensure_clean(&self) -> Result<()> {
        let dangling = self.report.dangling_songs.len();
        if dangling > 0 {
            anyhow::bail!("{dangling} song(s) reference missing assets");
        }
        if let Some(stats) = self.purge
            && stats.errors > 0
        {
            anyhow::bail!("purge finished with {} error(s)", stats.errors);
        }
        Ok(())
    }
}

/// One reconciliation pass, purging when asked.
async fn reconcile_once(
    library: &Library,
    grace: time::Duration,
    purge: bool,
) -> Result<ReconcileSummary> {
    let report = library
        .find_orphans(grace)
        .await
        .context("reconciliation scan failed")?;

    for asset_id in &report.orphaned_assets {
        tracing::info!(asset_id = %asset_id, "orphaned asset");
    }
    for asset_id in &report.incomplete_assets {
        tracing::info!(asset_id = %asset_id, "incomplete asset");
    }

    let purge = if purge && !report.is_empty() {
        Some(library.purge_orphans(&report).await)
    } else {
        None
    };
    Ok(ReconcileSummary { report, purge })
}

/// `musicspotd reconcile`: print the summary as JSON, exit non-zero if unclean.
async fn run_reconcile(library: &Library, grace: time::Duration, purge: bool) -> Result<()> {
    let summary = reconcile_once(library, grace, purge).await?;
    let json =
        serde_json::to_string_pretty(&summary).context("failed to encode reconcile summary")?;
    println!("{json}");
    summary.ensure_clean()
}

async fn serve(state: AppState) -> Result<()> {
    let config = state.config.clone();

    if let Some(interval) = config.maintenance.reconcile_interval() {
        let library = state.library();
        let grace = config.maintenance.orphan_grace();
        let purge = config.maintenance.purge;
        tokio::spawn(async move {
            tracing::info!(
                interval_secs = interval.as_secs(),
                purge,
                "Periodic reconciliation enabled"
            );
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match reconcile_once(&library, grace, purge).await {
                    Ok(summary) => {
                        if let Err(e) = summary.ensure_clean() {
                            tracing::warn!(error = %e, "Periodic reconciliation found problems");
                        }
                    }
                    Err(e) => tracing::error!(error = %e, "Periodic reconciliation failed"),
                }
            }
        });
    }

    let app = create_router(state);

    let addr: SocketAddr = config.server.bind.parse().context("invalid bind address")?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Music Spot v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config(Path::new(&args.config))?;

    musicspot_server::metrics::register_metrics();

    let state = build_state(config).await?;

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(state).await,
        Command::Reconcile { purge } => {
            let grace = state.config.maintenance.orphan_grace();
            run_reconcile(&state.library(), grace, purge).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use musicspot_core::config::{MetadataConfig, StorageConfig};
    use musicspot_core::{UploadRequest, UploadedFile, UserId};
    use musicspot_server::UploadOutcome;
    use tempfile::tempdir;

    async fn fresh_state(temp: &tempfile::TempDir) -> AppState {
        let config = AppConfig {
            storage: StorageConfig::Filesystem {
                path: temp.path().join("assets"),
            },
            metadata: MetadataConfig::Sqlite {
                path: temp.path().join("metadata.db"),
                query_timeout_secs: None,
            },
            ..AppConfig::for_testing()
        };
        build_state(config).await.unwrap()
    }

    #[test]
    fn load_config_reads_toml_file() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("server.toml");
        std::fs::write(
            &path,
            r#"
[server]
bind = "0.0.0.0:9000"
metrics_enabled = false

[storage]
type = "filesystem"
path = "/srv/musicspot/assets"

[maintenance]
orphan_grace_secs = 60
reconcile_interval_secs = 300
"#,
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.server.bind, "0.0.0.0:9000");
        assert!(!config.server.metrics_enabled);
        let StorageConfig::Filesystem { path } = &config.storage;
        assert_eq!(path, Path::new("/srv/musicspot/assets"));
        assert!(matches!(config.metadata, MetadataConfig::Sqlite { .. }));
        assert_eq!(config.maintenance.orphan_grace_secs, 60);
        assert_eq!(config.maintenance.reconcile_interval_secs, Some(300));
    }

    #[test]
    fn load_config_defaults_without_file() {
        let temp = tempdir().unwrap();
        let config = load_config(&temp.path().join("missing.toml")).unwrap();
        assert!(config.server.metrics_enabled);
        assert_eq!(config.maintenance.reconcile_interval_secs, None);
    }

    #[tokio::test]
    async fn build_state_and_reconcile_on_fresh_stores() {
        let temp = tempdir().unwrap();
        let state = fresh_state(&temp).await;

        let summary = reconcile_once(&state.library(), time::Duration::ZERO, true)
            .await
            .unwrap();
        assert!(summary.report.is_empty());
        assert!(summary.purge.is_none());
        summary.ensure_clean().unwrap();
    }

    #[tokio::test]
    async fn reconcile_summary_reports_purges_and_flags_dangling_songs() {
        let temp = tempdir().unwrap();
        let state = fresh_state(&temp).await;
        let library = state.library();

        let orphan = state
            .chunks
            .write(Bytes::from_static(b"orphan"), "o.mp3", "audio/mpeg")
            .await
            .unwrap();

        // Report only: orphans alone are not a failure.
        let summary = reconcile_once(&library, time::Duration::ZERO, false)
            .await
            .unwrap();
        assert_eq!(summary.report.orphaned_assets, vec![orphan.asset_id]);
        assert!(summary.purge.is_none());
        summary.ensure_clean().unwrap();

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(
            json["report"]["orphaned_assets"][0],
            orphan.asset_id.to_string()
        );
        assert!(json["purge"].is_null());

        let summary = reconcile_once(&library, time::Duration::ZERO, true)
            .await
            .unwrap();
        let stats = summary.purge.unwrap();
        assert_eq!(stats.assets_deleted, 1);
        assert_eq!(stats.errors, 0);
        summary.ensure_clean().unwrap();

        // A song whose asset vanished makes the pass unclean.
        let request = UploadRequest {
            file: Some(UploadedFile::new(vec![1, 2, 3], "song.mp3")),
            title: "t".to_string(),
            artist: "a".to_string(),
            ..Default::default()
        };
        let UploadOutcome::Committed(song) = library.upload(request, UserId::new()).await.unwrap()
        else {
            panic!("upload did not commit");
        };
        state.chunks.delete(&song.asset_id).await.unwrap();

        let summary = reconcile_once(&library, time::Duration::ZERO, true)
            .await
            .unwrap();
        assert_eq!(summary.report.dangling_songs, vec![song.id]);
        assert!(summary.ensure_clean().is_err());
        assert!(run_reconcile(&library, time::Duration::ZERO, false)
            .await
            .is_err());
    }
}
