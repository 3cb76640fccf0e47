//! Database driver implementations
//! Each driver is conditionally compiled based on features

#[cfg(feature = "postgres")]
pub mod postgres;

#[cfg(feature = "mysql")]
pub mod mysql;

#[cfg(feature = "sqlite-driver")]
pub mod sqlite;
