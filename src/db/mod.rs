pub mod config;
pub mod connection;
pub mod cursor;
pub mod driver;
pub mod drivers;
pub mod error;
pub mod manager;
pub mod release;

pub use config::{DatabaseConfig, LoadedConfig, CONFIG_FILE};
pub use connection::{Address, DatabaseType, Transport};
pub use cursor::{Cursor, SqlValue};
pub use driver::{
    ConnectionConfig, ConnectionInfo, DatabaseConnection, Driver, DriverRegistry, Statement,
};
pub use error::{ConfigError, ConnectionError, ReleaseError, ResourceKind};
pub use manager::ConnectionManager;
pub use release::{release, release_quietly, Release, ReleaseOutcome};
