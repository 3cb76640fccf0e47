use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::{ConnectionError, Result};

/// Supported database types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DatabaseType {
    MySQL,
    PostgreSQL,
    SQLite,
}

impl DatabaseType {
    pub fn name(&self) -> &'static str {
        match self {
            DatabaseType::MySQL => "MySQL",
            DatabaseType::PostgreSQL => "PostgreSQL",
            DatabaseType::SQLite => "SQLite",
        }
    }

    pub fn default_port(&self) -> Option<u16> {
        match self {
            DatabaseType::MySQL => Some(3306),
            DatabaseType::PostgreSQL => Some(5432),
            DatabaseType::SQLite => None,
        }
    }

    /// Cargo feature that compiles the driver in
    pub fn feature_name(&self) -> &'static str {
        match self {
            DatabaseType::MySQL => "mysql",
            DatabaseType::PostgreSQL => "postgres",
            DatabaseType::SQLite => "sqlite-driver",
        }
    }

    pub fn is_available(&self) -> bool {
        match self {
            DatabaseType::MySQL => cfg!(feature = "mysql"),
            DatabaseType::PostgreSQL => cfg!(feature = "postgres"),
            DatabaseType::SQLite => cfg!(feature = "sqlite-driver"),
        }
    }

    pub fn from_scheme(scheme: &str) -> Option<Self> {
        match scheme.to_ascii_lowercase().as_str() {
            "mysql" | "mariadb" => Some(DatabaseType::MySQL),
            "postgres" | "postgresql" => Some(DatabaseType::PostgreSQL),
            "sqlite" => Some(DatabaseType::SQLite),
            _ => None,
        }
    }

    pub fn all() -> &'static [DatabaseType] {
        &[
            DatabaseType::MySQL,
            DatabaseType::PostgreSQL,
            DatabaseType::SQLite,
        ]
    }
}

impl fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Whether the connection should negotiate transport encryption
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Transport {
    #[default]
    Plain,
    Tls,
}

/// Where a network database lives, or which file an SQLite database uses
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Network {
        host: String,
        port: u16,
        database: Option<String>,
    },
    File(String),
}

/// A parsed database address such as `jdbc:mysql://localhost:3306/hello?useSSL=false`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    raw: String,
    db_type: DatabaseType,
    endpoint: Endpoint,
    transport: Transport,
}

impl Address {
    pub fn parse(raw: &str) -> Result<Self> {
        let body = raw.strip_prefix("jdbc:").unwrap_or(raw);

        let (scheme, rest) = body.split_once(':').ok_or_else(|| {
            ConnectionError::InvalidConnectionString(format!("missing scheme in `{}`", raw))
        })?;

        let db_type = DatabaseType::from_scheme(scheme).ok_or_else(|| {
            ConnectionError::DriverUnavailable {
                driver: scheme.to_string(),
                hint: format!(
                    "No driver handles `{}` addresses; supported schemes are mysql, postgres and sqlite.",
                    scheme
                ),
            }
        })?;

        if db_type == DatabaseType::SQLite {
            let path = rest.strip_prefix("//").unwrap_or(rest);
            if path.is_empty() {
                return Err(ConnectionError::InvalidConnectionString(
                    "SQLite address must name a file or :memory:".into(),
                ));
            }
            return Ok(Self {
                raw: raw.to_string(),
                db_type,
                endpoint: Endpoint::File(path.to_string()),
                transport: Transport::Plain,
            });
        }

        let url = url::Url::parse(body)
            .map_err(|e| ConnectionError::InvalidConnectionString(e.to_string()))?;

        let host = match url.host_str() {
            Some(host) if !host.is_empty() => host.to_string(),
            _ => "localhost".to_string(),
        };
        let port = url
            .port()
            .or_else(|| db_type.default_port())
            .unwrap_or_default();
        let database = Some(url.path().trim_start_matches('/'))
            .filter(|db| !db.is_empty())
            .map(String::from);

        let mut transport = Transport::Plain;
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "useSSL" | "requireSSL" if value.eq_ignore_ascii_case("true") => {
                    transport = Transport::Tls
                }
                "useSSL" | "requireSSL" => transport = Transport::Plain,
                "sslmode" => {
                    transport = match value.as_ref() {
                        "require" | "verify-ca" | "verify-full" => Transport::Tls,
                        _ => Transport::Plain,
                    }
                }
                _ => {}
            }
        }

        Ok(Self {
            raw: raw.to_string(),
            db_type,
            endpoint: Endpoint::Network {
                host,
                port,
                database,
            },
            transport,
        })
    }

    /// The address exactly as configured
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn db_type(&self) -> DatabaseType {
        self.db_type
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn transport(&self) -> Transport {
        self.transport
    }

    pub fn database_name(&self) -> Option<&str> {
        match &self.endpoint {
            Endpoint::Network { database, .. } => database.as_deref(),
            Endpoint::File(path) => Some(path),
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
