use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use super::config::DatabaseConfig;
use super::connection::{Address, DatabaseType};
use super::cursor::{Cursor, SqlValue};
use super::error::{ConnectionError, ReleaseError, Result};

/// Information returned from a successful connection probe
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionInfo {
    pub database_type: DatabaseType,
    pub server_version: Option<String>,
    pub latency_ms: u64,
    pub checked_at: DateTime<Utc>,
}

/// A live connection owned by the caller.
///
/// Nothing tracks connections after they are handed out; the owner closes
/// them, usually through [`crate::db::release::release_quietly`].
#[async_trait]
pub trait DatabaseConnection: Send + Sync {
    /// Identifier used to correlate log lines for this connection
    fn id(&self) -> Uuid;

    fn database_type(&self) -> DatabaseType;

    async fn server_version(&self) -> Result<String>;

    /// Runs a statement and returns the number of affected rows
    async fn execute(&self, sql: &str) -> Result<u64>;

    async fn query(&self, sql: &str) -> Result<Cursor>;

    async fn prepare(&self, sql: &str) -> Result<Box<dyn Statement>>;

    async fn close(self: Box<Self>) -> std::result::Result<(), ReleaseError>;
}

/// A prepared statement bound to the connection that created it
#[async_trait]
pub trait Statement: Send + Sync {
    fn sql(&self) -> &str;

    fn param_count(&self) -> usize;

    async fn execute(&self, params: &[SqlValue]) -> Result<u64>;

    async fn query(&self, params: &[SqlValue]) -> Result<Cursor>;

    async fn close(self: Box<Self>) -> std::result::Result<(), ReleaseError>;
}

/// Opens connections for one database type
#[async_trait]
pub trait Driver: Send + Sync {
    fn database_type(&self) -> DatabaseType;

    /// Makes exactly one connection attempt
    async fn connect(&self, config: &ConnectionConfig) -> Result<Box<dyn DatabaseConnection>>;
}

/// Everything a driver needs to open a connection
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub address: Address,
    pub principal: String,
    pub credential: SecretString,
}

impl ConnectionConfig {
    pub fn new(address: Address, principal: String, credential: SecretString) -> Self {
        Self {
            address,
            principal,
            credential,
        }
    }

    pub fn from_settings(settings: &DatabaseConfig) -> Result<Self> {
        Ok(Self {
            address: Address::parse(&settings.address)?,
            principal: settings.principal.clone(),
            credential: settings.credential.clone(),
        })
    }

    pub fn driver(&self) -> DatabaseType {
        self.address.db_type()
    }
}

/// Resolves drivers by database type
#[derive(Clone, Default)]
pub struct DriverRegistry {
    drivers: HashMap<DatabaseType, Arc<dyn Driver>>,
}

impl DriverRegistry {
    /// A registry with no drivers at all
    pub fn empty() -> Self {
        Self::default()
    }

    /// A registry holding every driver compiled into this build
    pub fn with_builtin_drivers() -> Self {
        #[allow(unused_mut)]
        let mut registry = Self::empty();

        #[cfg(feature = "mysql")]
        registry.register(Arc::new(super::drivers::mysql::MySqlDriver));

        #[cfg(feature = "postgres")]
        registry.register(Arc::new(super::drivers::postgres::PostgresDriver));

        #[cfg(feature = "sqlite-driver")]
        registry.register(Arc::new(super::drivers::sqlite::SqliteDriver));

        registry
    }

    /// Adds a driver, replacing any previous driver for the same type
    pub fn register(&mut self, driver: Arc<dyn Driver>) -> &mut Self {
        self.drivers.insert(driver.database_type(), driver);
        self
    }

    pub fn resolve(&self, db_type: DatabaseType) -> Result<Arc<dyn Driver>> {
        self.drivers
            .get(&db_type)
            .cloned()
            .ok_or_else(|| ConnectionError::DriverUnavailable {
                driver: db_type.name().to_string(),
                hint: format!(
                    "Rebuild with `--features {}` to add the {} driver to this binary.",
                    db_type.feature_name(),
                    db_type.name()
                ),
            })
    }

    pub fn contains(&self, db_type: DatabaseType) -> bool {
        self.drivers.contains_key(&db_type)
    }
}

impl std::fmt::Debug for DriverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut types: Vec<_> = self.drivers.keys().map(DatabaseType::name).collect();
        types.sort_unstable();
        f.debug_struct("DriverRegistry").field("drivers", &types).finish()
    }
}

/// Factory function - opens a connection with the right driver for the address
pub async fn create_connection(
    registry: &DriverRegistry,
    config: &ConnectionConfig,
) -> Result<Box<dyn DatabaseConnection>> {
    let driver = registry.resolve(config.driver())?;
    driver.connect(config).await
}
