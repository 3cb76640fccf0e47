use chrono::Utc;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

use super::config::{self, DatabaseConfig};
use super::cursor::Cursor;
use super::driver::{
    create_connection, ConnectionConfig, ConnectionInfo, DatabaseConnection, DriverRegistry,
    Statement,
};
use super::error::Result;
use super::release::release_quietly;

/// Hands out database connections built from one set of settings.
///
/// Every [`acquire`](Self::acquire) makes a single fresh connection attempt.
/// There is no pool, no retry and no timeout; the returned handle belongs to
/// the caller.
#[derive(Debug, Clone)]
pub struct ConnectionManager {
    settings: DatabaseConfig,
    registry: DriverRegistry,
}

impl ConnectionManager {
    pub fn new(settings: DatabaseConfig) -> Self {
        Self::with_registry(settings, DriverRegistry::with_builtin_drivers())
    }

    pub fn with_registry(settings: DatabaseConfig, registry: DriverRegistry) -> Self {
        Self { settings, registry }
    }

    /// Loads settings from `path`, using defaults when the file is unusable
    pub fn from_config_file(path: impl AsRef<Path>) -> Self {
        let loaded = config::load(path);
        info!(origin = ?loaded.origin, principal = %loaded.config.principal, "database settings loaded");
        Self::new(loaded.config)
    }

    pub fn settings(&self) -> &DatabaseConfig {
        &self.settings
    }

    pub fn registry(&self) -> &DriverRegistry {
        &self.registry
    }

    pub async fn acquire(&self) -> Result<Box<dyn DatabaseConnection>> {
        let config = ConnectionConfig::from_settings(&self.settings)?;
        let conn = create_connection(&self.registry, &config).await?;
        debug!(
            connection = %conn.id(),
            driver = %conn.database_type(),
            "connection acquired"
        );
        Ok(conn)
    }

    /// Opens a connection, asks for the server version and closes it again
    pub async fn probe(&self) -> Result<ConnectionInfo> {
        let start = Instant::now();
        let conn = self.acquire().await?;
        let database_type = conn.database_type();
        let version = conn.server_version().await;
        let latency_ms = start.elapsed().as_millis() as u64;
        Self::release_connection(Some(conn)).await;

        Ok(ConnectionInfo {
            database_type,
            server_version: Some(version?),
            latency_ms,
            checked_at: Utc::now(),
        })
    }

    pub async fn release_connection(conn: Option<Box<dyn DatabaseConnection>>) {
        release_quietly(conn).await;
    }

    pub async fn release_statement(stmt: Option<Box<dyn Statement>>) {
        release_quietly(stmt).await;
    }

    pub async fn release_cursor(cursor: Option<Cursor>) {
        release_quietly(cursor).await;
    }
}
