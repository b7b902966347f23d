use anyhow::{Context, Result};
use facekeep_store::{ProfileStore, SqliteStore};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

mod config;
mod dbus_interface;
mod engine;
mod enroll;
mod identify;
mod locks;
#[cfg(test)]
mod testing;

use dbus_interface::{FaceKeepService, BUS_NAME, OBJECT_PATH};
use enroll::EnrollmentService;
use identify::MatchingService;
use locks::IdentityLocks;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::info!("facekeepd starting");

    let config = config::Config::load()?;
    config.policy.validate().context("invalid match policy")?;
    tracing::info!(
        max_window = config.policy.max_window,
        match_threshold = config.policy.match_threshold,
        update_threshold = config.policy.update_threshold,
        embedding_dim = config.policy.embedding_dim,
        "policy"
    );

    if let Some(parent) = config.db_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create data dir {}", parent.display()))?;
    }
    let store: Arc<dyn ProfileStore> = Arc::new(
        SqliteStore::open(&config.db_path)
            .await
            .with_context(|| format!("open profile db {}", config.db_path.display()))?,
    );
    tracing::info!(path = %config.db_path.display(), "profile store opened");

    let engine = Arc::new(engine::spawn_engine(&config.model_dir, config.extract_timeout())?);

    let locks = IdentityLocks::default();
    let enrollment = EnrollmentService::new(engine.clone(), store.clone(), locks.clone(), config.policy);
    let matching = MatchingService::new(engine, store.clone(), locks, config.policy);

    let bus = if config.session_bus { "session" } else { "system" };
    let service = FaceKeepService::new(
        enrollment,
        matching,
        store,
        config.policy,
        config.model_dir.clone(),
        bus,
    );

    let builder = if config.session_bus {
        zbus::connection::Builder::session()?
    } else {
        zbus::connection::Builder::system()?
    };
    let _conn = builder
        .name(BUS_NAME)?
        .serve_at(OBJECT_PATH, service)?
        .build()
        .await
        .with_context(|| format!("claim {BUS_NAME} on the {bus} bus"))?;

    tracing::info!(bus, name = BUS_NAME, "facekeepd ready");

    tokio::signal::ctrl_c().await?;
    tracing::info!("facekeepd shutting down");

    Ok(())
}
