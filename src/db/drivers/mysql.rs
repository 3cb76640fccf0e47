//! MySQL driver implementation

use async_trait::async_trait;
use mysql_async::prelude::*;
use mysql_async::{Conn, OptsBuilder, Params, SslOpts, Value};
use secrecy::ExposeSecret;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::db::connection::{DatabaseType, Endpoint, Transport};
use crate::db::cursor::{Cursor, Row, SqlValue};
use crate::db::driver::{ConnectionConfig, DatabaseConnection, Driver, Statement};
use crate::db::error::{ConnectionError, ReleaseError, ResourceKind, Result};

/// Shared by a connection and the statements it prepared. `None` once closed.
type SharedConn = Arc<Mutex<Option<Conn>>>;

pub struct MySqlDriver;

#[async_trait]
impl Driver for MySqlDriver {
    fn database_type(&self) -> DatabaseType {
        DatabaseType::MySQL
    }

    async fn connect(&self, config: &ConnectionConfig) -> Result<Box<dyn DatabaseConnection>> {
        let Endpoint::Network {
            host,
            port,
            database,
        } = config.address.endpoint()
        else {
            return Err(ConnectionError::InvalidConnectionString(
                "MySQL address must include a host".into(),
            ));
        };

        let ssl_opts = match config.address.transport() {
            Transport::Tls => Some(SslOpts::default()),
            Transport::Plain => None,
        };
        let opts = OptsBuilder::default()
            .ip_or_hostname(host.clone())
            .tcp_port(*port)
            .db_name(database.clone())
            .user(Some(config.principal.clone()))
            .pass(Some(config.credential.expose_secret().to_string()))
            .ssl_opts(ssl_opts);

        let conn = Conn::new(opts).await.map_err(ConnectionError::failed)?;

        Ok(Box::new(MySqlConnection {
            id: Uuid::new_v4(),
            conn: Arc::new(Mutex::new(Some(conn))),
        }))
    }
}

pub struct MySqlConnection {
    id: Uuid,
    conn: SharedConn,
}

#[async_trait]
impl DatabaseConnection for MySqlConnection {
    fn id(&self) -> Uuid {
        self.id
    }

    fn database_type(&self) -> DatabaseType {
        DatabaseType::MySQL
    }

    async fn server_version(&self) -> Result<String> {
        let mut guard = self.conn.lock().await;
        let conn = guard.as_mut().ok_or(ConnectionError::Closed)?;
        let version: Option<String> = conn
            .query_first("SELECT VERSION()")
            .await
            .map_err(ConnectionError::query)?;
        Ok(format!("MySQL {}", version.unwrap_or_default()))
    }

    async fn execute(&self, sql: &str) -> Result<u64> {
        let mut guard = self.conn.lock().await;
        let conn = guard.as_mut().ok_or(ConnectionError::Closed)?;
        conn.query_drop(sql).await.map_err(ConnectionError::query)?;
        Ok(conn.affected_rows())
    }

    async fn query(&self, sql: &str) -> Result<Cursor> {
        let mut guard = self.conn.lock().await;
        let conn = guard.as_mut().ok_or(ConnectionError::Closed)?;
        let rows: Vec<mysql_async::Row> = conn.query(sql).await.map_err(ConnectionError::query)?;
        Ok(into_cursor(rows))
    }

    async fn prepare(&self, sql: &str) -> Result<Box<dyn Statement>> {
        let mut guard = self.conn.lock().await;
        let conn = guard.as_mut().ok_or(ConnectionError::Closed)?;
        let stmt = conn.prep(sql).await.map_err(ConnectionError::query)?;
        Ok(Box::new(MySqlStatement {
            sql: sql.to_string(),
            stmt,
            conn: self.conn.clone(),
        }))
    }

    async fn close(self: Box<Self>) -> std::result::Result<(), ReleaseError> {
        let conn = self.conn.lock().await.take();
        match conn {
            Some(conn) => conn
                .disconnect()
                .await
                .map_err(|e| ReleaseError::new(ResourceKind::Connection, e)),
            None => Ok(()),
        }
    }
}

pub struct MySqlStatement {
    sql: String,
    stmt: mysql_async::Statement,
    conn: SharedConn,
}

#[async_trait]
impl Statement for MySqlStatement {
    fn sql(&self) -> &str {
        &self.sql
    }

    fn param_count(&self) -> usize {
        usize::from(self.stmt.num_params())
    }

    async fn execute(&self, params: &[SqlValue]) -> Result<u64> {
        let mut guard = self.conn.lock().await;
        let conn = guard.as_mut().ok_or(ConnectionError::Closed)?;
        conn.exec_drop(&self.stmt, to_params(params))
            .await
            .map_err(ConnectionError::query)?;
        Ok(conn.affected_rows())
    }

    async fn query(&self, params: &[SqlValue]) -> Result<Cursor> {
        let mut guard = self.conn.lock().await;
        let conn = guard.as_mut().ok_or(ConnectionError::Closed)?;
        let rows: Vec<mysql_async::Row> = conn
            .exec(&self.stmt, to_params(params))
            .await
            .map_err(ConnectionError::query)?;
        Ok(into_cursor(rows))
    }

    async fn close(self: Box<Self>) -> std::result::Result<(), ReleaseError> {
        let MySqlStatement { stmt, conn, .. } = *self;
        let mut guard = conn.lock().await;
        match guard.as_mut() {
            Some(conn) => conn
                .close(stmt)
                .await
                .map_err(|e| ReleaseError::new(ResourceKind::Statement, e)),
            // The server dropped the statement together with the connection
            None => Ok(()),
        }
    }
}

fn to_params(params: &[SqlValue]) -> Params {
    if params.is_empty() {
        return Params::Empty;
    }
    Params::Positional(params.iter().map(to_value).collect())
}

fn to_value(value: &SqlValue) -> Value {
    match value {
        SqlValue::Null => Value::NULL,
        SqlValue::Bool(b) => Value::Int(i64::from(*b)),
        SqlValue::Int(v) => Value::Int(*v),
        SqlValue::Float(v) => Value::Double(*v),
        SqlValue::Text(s) => Value::Bytes(s.clone().into_bytes()),
        SqlValue::Bytes(b) => Value::Bytes(b.clone()),
    }
}

fn from_value(value: Value) -> SqlValue {
    match value {
        Value::NULL => SqlValue::Null,
        Value::Int(v) => SqlValue::Int(v),
        Value::UInt(v) => i64::try_from(v)
            .map(SqlValue::Int)
            .unwrap_or_else(|_| SqlValue::Text(v.to_string())),
        Value::Float(v) => SqlValue::Float(f64::from(v)),
        Value::Double(v) => SqlValue::Float(v),
        Value::Bytes(bytes) => match String::from_utf8(bytes) {
            Ok(text) => SqlValue::Text(text),
            Err(err) => SqlValue::Bytes(err.into_bytes()),
        },
        Value::Date(y, mo, d, h, mi, s, us) => SqlValue::Text(format!(
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}.{:06}",
            y, mo, d, h, mi, s, us
        )),
        Value::Time(neg, days, h, mi, s, us) => {
            let hours = u32::from(h) + days * 24;
            let sign = if neg { "-" } else { "" };
            SqlValue::Text(format!("{}{:02}:{:02}:{:02}.{:06}", sign, hours, mi, s, us))
        }
    }
}

fn into_cursor(rows: Vec<mysql_async::Row>) -> Cursor {
    let columns = rows
        .first()
        .map(|row| {
            row.columns_ref()
                .iter()
                .map(|c| c.name_str().into_owned())
                .collect()
        })
        .unwrap_or_default();
    let rows = rows
        .into_iter()
        .map(|row| row.unwrap().into_iter().map(from_value).collect::<Row>())
        .collect();
    Cursor::new(columns, rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_values_both_ways() {
        assert_eq!(to_value(&SqlValue::Bool(true)), Value::Int(1));
        assert_eq!(from_value(Value::Bytes(b"abc".to_vec())), SqlValue::Text("abc".into()));
        assert_eq!(from_value(Value::Bytes(vec![0xff, 0xfe])), SqlValue::Bytes(vec![0xff, 0xfe]));
        assert_eq!(
            from_value(Value::UInt(u64::MAX)),
            SqlValue::Text(u64::MAX.to_string())
        );
        assert_eq!(
            from_value(Value::Date(2024, 2, 29, 13, 5, 9, 0)),
            SqlValue::Text("2024-02-29 13:05:09.000000".into())
        );
    }

    #[test]
    fn empty_params_are_empty() {
        assert!(matches!(to_params(&[]), Params::Empty));
    }
}
