//! SQLite driver implementation

use async_trait::async_trait;
use rusqlite::types::{Value, ValueRef};
use std::path::Path;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::db::connection::{DatabaseType, Endpoint};
use crate::db::cursor::{Cursor, Row, SqlValue};
use crate::db::driver::{ConnectionConfig, DatabaseConnection, Driver, Statement};
use crate::db::error::{ConnectionError, ReleaseError, ResourceKind, Result};

type SharedConn = Arc<Mutex<Option<rusqlite::Connection>>>;

const LOCK_POISONED: &str = "SQLite connection lock poisoned";

pub struct SqliteDriver;

#[async_trait]
impl Driver for SqliteDriver {
    fn database_type(&self) -> DatabaseType {
        DatabaseType::SQLite
    }

    async fn connect(&self, config: &ConnectionConfig) -> Result<Box<dyn DatabaseConnection>> {
        let Endpoint::File(path) = config.address.endpoint() else {
            return Err(ConnectionError::InvalidConnectionString(
                "SQLite address must name a file or :memory:".into(),
            ));
        };

        // For SQLite, the address is just a file path or :memory:
        if path != ":memory:" {
            if let Some(parent) = Path::new(path).parent() {
                if !parent.as_os_str().is_empty() && !parent.exists() {
                    return Err(ConnectionError::failed(format!(
                        "Parent directory does not exist: {}",
                        parent.display()
                    )));
                }
            }
        }

        let path = path.clone();
        // SQLite is synchronous, so we run it in a blocking task
        let conn = tokio::task::spawn_blocking(move || rusqlite::Connection::open(&path))
            .await
            .map_err(ConnectionError::failed)?
            .map_err(ConnectionError::failed)?;

        Ok(Box::new(SqliteConnection {
            id: Uuid::new_v4(),
            conn: Arc::new(Mutex::new(Some(conn))),
        }))
    }
}

/// Runs `f` against the open connection on the blocking pool
async fn with_conn<T, F>(conn: &SharedConn, f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&rusqlite::Connection) -> rusqlite::Result<T> + Send + 'static,
{
    let conn = conn.clone();
    tokio::task::spawn_blocking(move || {
        let guard = conn
            .lock()
            .map_err(|_| ConnectionError::Query(LOCK_POISONED.into()))?;
        let conn = guard.as_ref().ok_or(ConnectionError::Closed)?;
        f(conn).map_err(ConnectionError::query)
    })
    .await
    .map_err(ConnectionError::query)?
}

pub struct SqliteConnection {
    id: Uuid,
    conn: SharedConn,
}

#[async_trait]
impl DatabaseConnection for SqliteConnection {
    fn id(&self) -> Uuid {
        self.id
    }

    fn database_type(&self) -> DatabaseType {
        DatabaseType::SQLite
    }

    async fn server_version(&self) -> Result<String> {
        let version: String = with_conn(&self.conn, |conn| {
            conn.query_row("SELECT sqlite_version()", [], |row| row.get(0))
        })
        .await?;
        Ok(format!("SQLite {}", version))
    }

    async fn execute(&self, sql: &str) -> Result<u64> {
        let sql = sql.to_string();
        with_conn(&self.conn, move |conn| {
            conn.execute_batch(&sql)?;
            Ok(conn.changes() as u64)
        })
        .await
    }

    async fn query(&self, sql: &str) -> Result<Cursor> {
        let sql = sql.to_string();
        with_conn(&self.conn, move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            collect_rows(&mut stmt, Vec::new())
        })
        .await
    }

    async fn prepare(&self, sql: &str) -> Result<Box<dyn Statement>> {
        let owned = sql.to_string();
        let param_count = with_conn(&self.conn, move |conn| {
            Ok(conn.prepare_cached(&owned)?.parameter_count())
        })
        .await?;
        Ok(Box::new(SqliteStatement {
            sql: sql.to_string(),
            param_count,
            conn: self.conn.clone(),
        }))
    }

    async fn close(self: Box<Self>) -> std::result::Result<(), ReleaseError> {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let taken = conn
                .lock()
                .map_err(|_| ReleaseError::new(ResourceKind::Connection, LOCK_POISONED))?
                .take();
            match taken {
                Some(conn) => conn
                    .close()
                    .map_err(|(_, e)| ReleaseError::new(ResourceKind::Connection, e)),
                None => Ok(()),
            }
        })
        .await
        .map_err(|e| ReleaseError::new(ResourceKind::Connection, e))?
    }
}

/// Re-prepared through the connection's statement cache on every run, since
/// a rusqlite statement cannot outlive a borrow of its connection.
pub struct SqliteStatement {
    sql: String,
    param_count: usize,
    conn: SharedConn,
}

#[async_trait]
impl Statement for SqliteStatement {
    fn sql(&self) -> &str {
        &self.sql
    }

    fn param_count(&self) -> usize {
        self.param_count
    }

    async fn execute(&self, params: &[SqlValue]) -> Result<u64> {
        let sql = self.sql.clone();
        let params = to_values(params);
        with_conn(&self.conn, move |conn| {
            let mut stmt = conn.prepare_cached(&sql)?;
            let changed = stmt.execute(rusqlite::params_from_iter(params))?;
            Ok(changed as u64)
        })
        .await
    }

    async fn query(&self, params: &[SqlValue]) -> Result<Cursor> {
        let sql = self.sql.clone();
        let params = to_values(params);
        with_conn(&self.conn, move |conn| {
            let mut stmt = conn.prepare_cached(&sql)?;
            collect_rows(&mut stmt, params)
        })
        .await
    }

    async fn close(self: Box<Self>) -> std::result::Result<(), ReleaseError> {
        let SqliteStatement { sql, conn, .. } = *self;
        tokio::task::spawn_blocking(move || -> std::result::Result<(), ReleaseError> {
            let guard = conn
                .lock()
                .map_err(|_| ReleaseError::new(ResourceKind::Statement, LOCK_POISONED))?;
            // Evict only this statement from the cache. If it no longer
            // prepares, there is nothing cached to evict.
            if let Some(Ok(stmt)) = guard.as_ref().map(|conn| conn.prepare_cached(&sql)) {
                stmt.discard();
            }
            Ok(())
        })
        .await
        .map_err(|e| ReleaseError::new(ResourceKind::Statement, e))?
    }
}

fn to_values(params: &[SqlValue]) -> Vec<Value> {
    params
        .iter()
        .map(|p| match p {
            SqlValue::Null => Value::Null,
            SqlValue::Bool(b) => Value::Integer(i64::from(*b)),
            SqlValue::Int(v) => Value::Integer(*v),
            SqlValue::Float(v) => Value::Real(*v),
            SqlValue::Text(s) => Value::Text(s.clone()),
            SqlValue::Bytes(b) => Value::Blob(b.clone()),
        })
        .collect()
}

fn from_value_ref(value: ValueRef<'_>) -> SqlValue {
    match value {
        ValueRef::Null => SqlValue::Null,
        ValueRef::Integer(v) => SqlValue::Int(v),
        ValueRef::Real(v) => SqlValue::Float(v),
        ValueRef::Text(t) => SqlValue::Text(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => SqlValue::Bytes(b.to_vec()),
    }
}

fn collect_rows(stmt: &mut rusqlite::Statement<'_>, params: Vec<Value>) -> rusqlite::Result<Cursor> {
    let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let width = columns.len();
    let mut rows = stmt.query(rusqlite::params_from_iter(params))?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        let mut values: Row = Vec::with_capacity(width);
        for i in 0..width {
            values.push(from_value_ref(row.get_ref(i)?));
        }
        out.push(values);
    }
    Ok(Cursor::new(columns, out))
}
