//! Failed closes are visible only as warnings on the log stream

mod common;

use chambers_db::db::{
    release_quietly, ConnectionManager, DatabaseConfig, DatabaseType, DriverRegistry,
};
use common::{CapturedLogs, RecordingDriver, StuckCursor};
use std::sync::Arc;
use tracing::Level;

fn capture() -> (CapturedLogs, tracing::subscriber::DefaultGuard) {
    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_max_level(Level::WARN)
        .with_ansi(false)
        .finish();
    (logs, tracing::subscriber::set_default(subscriber))
}

fn failing_manager() -> ConnectionManager {
    let mut registry = DriverRegistry::empty();
    registry.register(Arc::new(
        RecordingDriver::new(DatabaseType::MySQL).with_failing_close(),
    ));
    ConnectionManager::with_registry(DatabaseConfig::default(), registry)
}

fn warning_lines(logs: &CapturedLogs) -> Vec<String> {
    logs.contents()
        .lines()
        .filter(|line| line.contains("WARN"))
        .map(String::from)
        .collect()
}

#[tokio::test]
async fn failed_connection_close_is_logged_as_warning() {
    let (logs, _guard) = capture();
    let conn = failing_manager().acquire().await.unwrap();

    ConnectionManager::release_connection(Some(conn)).await;

    let warnings = warning_lines(&logs);
    assert_eq!(warnings.len(), 1, "{warnings:?}");
    assert!(warnings[0].contains("Error closing connection: broken pipe"));
}

#[tokio::test]
async fn failed_statement_close_is_logged_as_warning() {
    let (logs, _guard) = capture();
    let conn = failing_manager().acquire().await.unwrap();
    let stmt = conn.prepare("SELECT 1").await.unwrap();

    ConnectionManager::release_statement(Some(stmt)).await;

    let warnings = warning_lines(&logs);
    assert_eq!(warnings.len(), 1, "{warnings:?}");
    assert!(warnings[0].contains("Error closing statement: statement already gone"));
    drop(conn);
}

#[tokio::test]
async fn failed_cursor_close_is_logged_as_warning() {
    let (logs, _guard) = capture();

    release_quietly(Some(StuckCursor)).await;

    let warnings = warning_lines(&logs);
    assert_eq!(warnings.len(), 1, "{warnings:?}");
    assert!(warnings[0].contains("Error closing cursor: result set already consumed"));
}

#[tokio::test]
async fn successful_and_skipped_releases_log_nothing() {
    let (logs, _guard) = capture();
    let mut registry = DriverRegistry::empty();
    registry.register(Arc::new(RecordingDriver::new(DatabaseType::MySQL)));
    let manager = ConnectionManager::with_registry(DatabaseConfig::default(), registry);
    let conn = manager.acquire().await.unwrap();
    let cursor = conn.query("SELECT 1").await.unwrap();

    ConnectionManager::release_cursor(Some(cursor)).await;
    ConnectionManager::release_connection(Some(conn)).await;
    ConnectionManager::release_statement(None).await;

    assert!(warning_lines(&logs).is_empty(), "{}", logs.contents());
}
