use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use huddle_core::sweeper::run_sweeper;
use huddle_core::{CoreConfig, RoomCoordinator};
use huddle_db::{Database, StoreError, backfill};
use huddle_types::Permissions;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| {
                    "huddle_server=debug,huddle_api=debug,huddle_core=debug,huddle_db=info,tower_http=debug"
                        .into()
                }),
        )
        .init();

    // Config
    let db_path = std::env::var("HUDDLE_DB_PATH").unwrap_or_else(|_| "huddle.db".into());
    let host = std::env::var("HUDDLE_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("HUDDLE_PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()?;
    let run_backfills = std::env::var("HUDDLE_RUN_BACKFILLS")
        .map(|v| matches!(v.trim(), "1" | "true" | "yes"))
        .unwrap_or(false);
    let config = CoreConfig::from_env();

    let db = Arc::new(Database::open(&PathBuf::from(&db_path))?);
    if run_backfills {
        apply_backfills(&db)?;
    }

    let coordinator = RoomCoordinator::new(db, config.clone());
    tokio::spawn(run_sweeper(coordinator.clone(), config.sweep_interval));

    let app = huddle_api::router(coordinator);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Huddle server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Data corrections for rows written by older releases. Safe to repeat.
fn apply_backfills(db: &Database) -> Result<(), StoreError> {
    let split = db.with_conn_mut(|conn| {
        backfill::split_permission_bit(conn, Permissions::CHAT, Permissions::REACT)
    })?;
    let markers = db.with_conn_mut(backfill::fix_read_marker_sentinel)?;
    info!(
        permissions = split.total(),
        read_markers = markers,
        "backfills complete"
    );
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
