//! PostgreSQL driver implementation

use async_trait::async_trait;
use bytes::BytesMut;
use secrecy::ExposeSecret;
use std::error::Error as StdError;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_postgres::config::SslMode;
use tokio_postgres::types::{to_sql_checked, IsNull, ToSql, Type};
use tokio_postgres::{Client, NoTls, SimpleQueryMessage};
use uuid::Uuid;

use crate::db::connection::{DatabaseType, Endpoint, Transport};
use crate::db::cursor::{Cursor, Row, SqlValue};
use crate::db::driver::{ConnectionConfig, DatabaseConnection, Driver, Statement};
use crate::db::error::{ConnectionError, ReleaseError, ResourceKind, Result};

type SharedClient = Arc<Mutex<Option<Client>>>;

pub struct PostgresDriver;

#[async_trait]
impl Driver for PostgresDriver {
    fn database_type(&self) -> DatabaseType {
        DatabaseType::PostgreSQL
    }

    async fn connect(&self, config: &ConnectionConfig) -> Result<Box<dyn DatabaseConnection>> {
        let Endpoint::Network {
            host,
            port,
            database,
        } = config.address.endpoint()
        else {
            return Err(ConnectionError::InvalidConnectionString(
                "PostgreSQL address must include a host".into(),
            ));
        };

        let mut pg = tokio_postgres::Config::new();
        pg.host(host)
            .port(*port)
            .user(&config.principal)
            .password(config.credential.expose_secret());
        if let Some(database) = database {
            pg.dbname(database);
        }

        let (client, task) = match config.address.transport() {
            Transport::Plain => {
                pg.ssl_mode(SslMode::Disable);
                let (client, connection) = pg.connect(NoTls).await.map_err(ConnectionError::failed)?;
                (client, tokio::spawn(connection))
            }
            Transport::Tls => {
                pg.ssl_mode(SslMode::Require);
                let connector = native_tls::TlsConnector::new().map_err(ConnectionError::failed)?;
                let tls = postgres_native_tls::MakeTlsConnector::new(connector);
                let (client, connection) = pg.connect(tls).await.map_err(ConnectionError::failed)?;
                (client, tokio::spawn(connection))
            }
        };

        Ok(Box::new(PostgresConnection {
            id: Uuid::new_v4(),
            client: Arc::new(Mutex::new(Some(client))),
            task,
        }))
    }
}

pub struct PostgresConnection {
    id: Uuid,
    client: SharedClient,
    // Drives the socket; finishes once the client is dropped
    task: JoinHandle<std::result::Result<(), tokio_postgres::Error>>,
}

#[async_trait]
impl DatabaseConnection for PostgresConnection {
    fn id(&self) -> Uuid {
        self.id
    }

    fn database_type(&self) -> DatabaseType {
        DatabaseType::PostgreSQL
    }

    async fn server_version(&self) -> Result<String> {
        let guard = self.client.lock().await;
        let client = guard.as_ref().ok_or(ConnectionError::Closed)?;
        let row = client
            .query_one("SELECT version()", &[])
            .await
            .map_err(ConnectionError::query)?;
        row.try_get(0).map_err(ConnectionError::query)
    }

    async fn execute(&self, sql: &str) -> Result<u64> {
        let guard = self.client.lock().await;
        let client = guard.as_ref().ok_or(ConnectionError::Closed)?;
        let messages = client
            .simple_query(sql)
            .await
            .map_err(ConnectionError::query)?;
        Ok(messages
            .iter()
            .filter_map(|m| match m {
                SimpleQueryMessage::CommandComplete(n) => Some(*n),
                _ => None,
            })
            .sum())
    }

    async fn query(&self, sql: &str) -> Result<Cursor> {
        let guard = self.client.lock().await;
        let client = guard.as_ref().ok_or(ConnectionError::Closed)?;
        let messages = client
            .simple_query(sql)
            .await
            .map_err(ConnectionError::query)?;

        let mut columns = Vec::new();
        let mut rows = Vec::new();
        for message in messages {
            if let SimpleQueryMessage::Row(row) = message {
                if columns.is_empty() {
                    columns = row.columns().iter().map(|c| c.name().to_string()).collect();
                }
                let values: Row = (0..row.len())
                    .map(|i| row.get(i).map_or(SqlValue::Null, |v| SqlValue::Text(v.to_string())))
                    .collect();
                rows.push(values);
            }
        }
        Ok(Cursor::new(columns, rows))
    }

    async fn prepare(&self, sql: &str) -> Result<Box<dyn Statement>> {
        let guard = self.client.lock().await;
        let client = guard.as_ref().ok_or(ConnectionError::Closed)?;
        let stmt = client.prepare(sql).await.map_err(ConnectionError::query)?;
        Ok(Box::new(PostgresStatement {
            sql: sql.to_string(),
            stmt,
            client: self.client.clone(),
        }))
    }

    async fn close(self: Box<Self>) -> std::result::Result<(), ReleaseError> {
        drop(self.client.lock().await.take());
        match self.task.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(ReleaseError::new(ResourceKind::Connection, e)),
            Err(e) => Err(ReleaseError::new(ResourceKind::Connection, e)),
        }
    }
}

pub struct PostgresStatement {
    sql: String,
    stmt: tokio_postgres::Statement,
    client: SharedClient,
}

impl PostgresStatement {
    fn bind<'a>(params: &'a [SqlValue]) -> Vec<&'a (dyn ToSql + Sync)> {
        params.iter().map(|p| p as &(dyn ToSql + Sync)).collect()
    }
}

#[async_trait]
impl Statement for PostgresStatement {
    fn sql(&self) -> &str {
        &self.sql
    }

    fn param_count(&self) -> usize {
        self.stmt.params().len()
    }

    async fn execute(&self, params: &[SqlValue]) -> Result<u64> {
        let guard = self.client.lock().await;
        let client = guard.as_ref().ok_or(ConnectionError::Closed)?;
        client
            .execute(&self.stmt, &Self::bind(params))
            .await
            .map_err(ConnectionError::query)
    }

    async fn query(&self, params: &[SqlValue]) -> Result<Cursor> {
        let guard = self.client.lock().await;
        let client = guard.as_ref().ok_or(ConnectionError::Closed)?;
        let rows = client
            .query(&self.stmt, &Self::bind(params))
            .await
            .map_err(ConnectionError::query)?;

        let columns = self
            .stmt
            .columns()
            .iter()
            .map(|c| c.name().to_string())
            .collect();
        let rows = rows
            .iter()
            .map(|row| (0..row.len()).map(|i| column_value(row, i)).collect::<Row>())
            .collect();
        Ok(Cursor::new(columns, rows))
    }

    async fn close(self: Box<Self>) -> std::result::Result<(), ReleaseError> {
        // Dropping the statement sends Close to the server
        drop(self.stmt);
        Ok(())
    }
}

fn column_value(row: &tokio_postgres::Row, idx: usize) -> SqlValue {
    let ty = row.columns()[idx].type_();
    let value = if *ty == Type::BOOL {
        row.try_get::<_, Option<bool>>(idx).ok().flatten().map(SqlValue::Bool)
    } else if *ty == Type::INT2 {
        row.try_get::<_, Option<i16>>(idx)
            .ok()
            .flatten()
            .map(|v| SqlValue::Int(i64::from(v)))
    } else if *ty == Type::INT4 {
        row.try_get::<_, Option<i32>>(idx)
            .ok()
            .flatten()
            .map(|v| SqlValue::Int(i64::from(v)))
    } else if *ty == Type::INT8 {
        row.try_get::<_, Option<i64>>(idx).ok().flatten().map(SqlValue::Int)
    } else if *ty == Type::FLOAT4 {
        row.try_get::<_, Option<f32>>(idx)
            .ok()
            .flatten()
            .map(|v| SqlValue::Float(f64::from(v)))
    } else if *ty == Type::FLOAT8 {
        row.try_get::<_, Option<f64>>(idx).ok().flatten().map(SqlValue::Float)
    } else if *ty == Type::BYTEA {
        row.try_get::<_, Option<Vec<u8>>>(idx).ok().flatten().map(SqlValue::Bytes)
    } else {
        row.try_get::<_, Option<String>>(idx).ok().flatten().map(SqlValue::Text)
    };
    value.unwrap_or(SqlValue::Null)
}

impl ToSql for SqlValue {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> std::result::Result<IsNull, Box<dyn StdError + Sync + Send>> {
        match self {
            SqlValue::Null => Ok(IsNull::Yes),
            SqlValue::Bool(b) => b.to_sql(ty, out),
            SqlValue::Int(v) if *ty == Type::INT2 => i16::try_from(*v)?.to_sql(ty, out),
            SqlValue::Int(v) if *ty == Type::INT4 => i32::try_from(*v)?.to_sql(ty, out),
            SqlValue::Int(v) if *ty == Type::FLOAT8 => (*v as f64).to_sql(ty, out),
            SqlValue::Int(v) => v.to_sql(ty, out),
            SqlValue::Float(v) if *ty == Type::FLOAT4 => (*v as f32).to_sql(ty, out),
            SqlValue::Float(v) => v.to_sql(ty, out),
            SqlValue::Text(s) => s.to_sql(ty, out),
            SqlValue::Bytes(b) => b.to_sql(ty, out),
        }
    }

    // The wrapped value decides; mismatches surface as query errors
    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}
