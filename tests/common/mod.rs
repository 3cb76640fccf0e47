//! Test doubles shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use chambers_db::db::{
    ConnectionConfig, ConnectionError, Cursor, DatabaseConnection, DatabaseType, Driver,
    Release, ReleaseError, ResourceKind, SqlValue, Statement,
};
use secrecy::ExposeSecret;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// What a driver was asked to connect with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectRequest {
    pub address: String,
    pub principal: String,
    pub credential: String,
}

/// Records every connect call; optionally rejects them
pub struct RecordingDriver {
    pub db_type: DatabaseType,
    pub requests: Arc<Mutex<Vec<ConnectRequest>>>,
    pub reject_with: Option<String>,
    pub closes: Arc<AtomicUsize>,
    pub fail_close: bool,
}

impl RecordingDriver {
    pub fn new(db_type: DatabaseType) -> Self {
        Self {
            db_type,
            requests: Arc::new(Mutex::new(Vec::new())),
            reject_with: None,
            closes: Arc::new(AtomicUsize::new(0)),
            fail_close: false,
        }
    }

    pub fn rejecting(db_type: DatabaseType, message: &str) -> Self {
        Self {
            reject_with: Some(message.to_string()),
            ..Self::new(db_type)
        }
    }

    pub fn with_failing_close(mut self) -> Self {
        self.fail_close = true;
        self
    }

    pub fn requests(&self) -> Vec<ConnectRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Driver for RecordingDriver {
    fn database_type(&self) -> DatabaseType {
        self.db_type
    }

    async fn connect(
        &self,
        config: &ConnectionConfig,
    ) -> Result<Box<dyn DatabaseConnection>, ConnectionError> {
        self.requests.lock().unwrap().push(ConnectRequest {
            address: config.address.as_str().to_string(),
            principal: config.principal.clone(),
            credential: config.credential.expose_secret().to_string(),
        });
        if let Some(message) = &self.reject_with {
            return Err(ConnectionError::failed(message.clone()));
        }
        Ok(Box::new(FakeConnection {
            id: Uuid::new_v4(),
            db_type: self.db_type,
            closes: self.closes.clone(),
            fail_close: self.fail_close,
        }))
    }
}

pub struct FakeConnection {
    id: Uuid,
    db_type: DatabaseType,
    closes: Arc<AtomicUsize>,
    fail_close: bool,
}

#[async_trait]
impl DatabaseConnection for FakeConnection {
    fn id(&self) -> Uuid {
        self.id
    }

    fn database_type(&self) -> DatabaseType {
        self.db_type
    }

    async fn server_version(&self) -> Result<String, ConnectionError> {
        Ok("fake 1.0".to_string())
    }

    async fn execute(&self, _sql: &str) -> Result<u64, ConnectionError> {
        Ok(0)
    }

    async fn query(&self, _sql: &str) -> Result<Cursor, ConnectionError> {
        Ok(Cursor::new(vec!["one".into()], vec![vec![SqlValue::Int(1)]]))
    }

    async fn prepare(&self, sql: &str) -> Result<Box<dyn Statement>, ConnectionError> {
        Ok(Box::new(FakeStatement {
            sql: sql.to_string(),
            closes: self.closes.clone(),
            fail_close: self.fail_close,
        }))
    }

    async fn close(self: Box<Self>) -> Result<(), ReleaseError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        if self.fail_close {
            Err(ReleaseError::new(ResourceKind::Connection, "broken pipe"))
        } else {
            Ok(())
        }
    }
}

pub struct FakeStatement {
    sql: String,
    closes: Arc<AtomicUsize>,
    fail_close: bool,
}

#[async_trait]
impl Statement for FakeStatement {
    fn sql(&self) -> &str {
        &self.sql
    }

    fn param_count(&self) -> usize {
        0
    }

    async fn execute(&self, _params: &[SqlValue]) -> Result<u64, ConnectionError> {
        Ok(0)
    }

    async fn query(&self, _params: &[SqlValue]) -> Result<Cursor, ConnectionError> {
        Ok(Cursor::default())
    }

    async fn close(self: Box<Self>) -> Result<(), ReleaseError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        if self.fail_close {
            Err(ReleaseError::new(ResourceKind::Statement, "statement already gone"))
        } else {
            Ok(())
        }
    }
}

/// A releasable handle that always fails to close, reporting as a cursor
pub struct StuckCursor;

#[async_trait]
impl Release for StuckCursor {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Cursor
    }

    async fn release(self) -> Result<(), ReleaseError> {
        Err(ReleaseError::new(ResourceKind::Cursor, "result set already consumed"))
    }
}

/// In-memory sink for a `tracing_subscriber::fmt` subscriber
#[derive(Clone, Default)]
pub struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl std::io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
