//! Database settings and the loader for `config.properties`.
//!
//! Settings are read once at startup and handed to [`ConnectionManager`]
//! by value; nothing here is global.
//!
//! [`ConnectionManager`]: crate::db::manager::ConnectionManager

use encoding_rs::UTF_8;
use java_properties::PropertiesIter;
use secrecy::{ExposeSecret, SecretString};
use std::borrow::Cow;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::error::ConfigError;

/// Fixed location of the settings file, relative to the working directory
pub const CONFIG_FILE: &str = "config.properties";

pub const KEY_URL: &str = "db.url";
pub const KEY_USERNAME: &str = "db.username";
pub const KEY_PASSWORD: &str = "db.password";

pub const DEFAULT_URL: &str = "jdbc:mysql://localhost:3306/hello?useSSL=false";
pub const DEFAULT_USERNAME: &str = "root";

/// Key/value pairs as read from the settings file
pub type Properties = HashMap<String, String>;

/// Address, principal and credential used for every connection
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub address: String,
    pub principal: String,
    pub credential: SecretString,
}

impl DatabaseConfig {
    pub fn new(
        address: impl Into<String>,
        principal: impl Into<String>,
        credential: SecretString,
    ) -> Self {
        Self {
            address: address.into(),
            principal: principal.into(),
            credential,
        }
    }

    /// Looks each key up directly; a missing key keeps its default.
    pub fn from_properties(props: &Properties) -> Self {
        let defaults = Self::default();
        Self {
            address: props.get(KEY_URL).cloned().unwrap_or(defaults.address),
            principal: props
                .get(KEY_USERNAME)
                .cloned()
                .unwrap_or(defaults.principal),
            credential: props
                .get(KEY_PASSWORD)
                .map_or(defaults.credential, |p| SecretString::from(p.clone())),
        }
    }

    pub fn has_credential(&self) -> bool {
        !self.credential.expose_secret().is_empty()
    }
}

impl Default for DatabaseConfig {
    /// Local development defaults. No password ships with the binary, so
    /// servers that require one reject the connection.
    fn default() -> Self {
        Self {
            address: DEFAULT_URL.to_string(),
            principal: DEFAULT_USERNAME.to_string(),
            credential: SecretString::from(String::new()),
        }
    }
}

/// Where the active settings came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigOrigin {
    File(PathBuf),
    Defaults { reason: String },
}

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: DatabaseConfig,
    pub origin: ConfigOrigin,
}

/// Parses the raw bytes of a settings file.
///
/// The file is ISO-8859-1. Anything outside that range is written as a
/// `\uXXXX` escape, with supplementary characters as a UTF-16 surrogate pair.
pub fn parse_properties(bytes: &[u8]) -> Result<Properties, ConfigError> {
    let latin1: String = bytes.iter().map(|&b| char::from(b)).collect();
    let text = join_surrogate_escapes(&latin1);

    let mut props = Properties::new();
    let mut reader = PropertiesIter::new_with_encoding(text.as_bytes(), UTF_8);
    reader
        .read_into(|key, value| {
            props.insert(key, value);
        })
        .map_err(|source| ConfigError::Parse { source })?;
    Ok(props)
}

/// Replaces each escaped surrogate pair (`\uD83D\uDE00`) with the character
/// it encodes. `java_properties` decodes escapes one unit at a time and
/// rejects a lone surrogate.
fn join_surrogate_escapes(text: &str) -> Cow<'_, str> {
    if !text.contains("\\u") {
        return Cow::Borrowed(text);
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find('\\') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        if let Some(c) = surrogate_pair(tail) {
            out.push(c);
            rest = &tail[12..];
        } else {
            // Copy the backslash together with the character it escapes
            let escaped = tail[1..].chars().next().map_or(0, char::len_utf8);
            out.push_str(&tail[..1 + escaped]);
            rest = &tail[1 + escaped..];
        }
    }
    out.push_str(rest);
    Cow::Owned(out)
}

fn surrogate_pair(s: &str) -> Option<char> {
    let high = escaped_unit(s.get(..6)?)?;
    let low = escaped_unit(s.get(6..12)?)?;
    if !(0xD800..=0xDBFF).contains(&high) || !(0xDC00..=0xDFFF).contains(&low) {
        return None;
    }
    char::decode_utf16([high, low]).next()?.ok()
}

fn escaped_unit(s: &str) -> Option<u16> {
    let hex = s.strip_prefix("\\u")?;
    if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    u16::from_str_radix(hex, 16).ok()
}

/// Reads the settings file, failing on any problem.
pub fn try_load(path: impl AsRef<Path>) -> Result<DatabaseConfig, ConfigError> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|source| {
        if source.kind() == io::ErrorKind::NotFound {
            ConfigError::NotFound(path.to_path_buf())
        } else {
            ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;
    let props = parse_properties(&bytes)?;
    Ok(DatabaseConfig::from_properties(&props))
}

/// Reads the settings file, falling back to defaults when it cannot be used.
///
/// A missing file is expected and only noted at info level. A file that
/// exists but cannot be read or parsed is logged as a warning.
pub fn load(path: impl AsRef<Path>) -> LoadedConfig {
    let path = path.as_ref();
    match try_load(path) {
        Ok(config) => LoadedConfig {
            config,
            origin: ConfigOrigin::File(path.to_path_buf()),
        },
        Err(err) => {
            match &err {
                ConfigError::NotFound(_) => {
                    info!("Config file not found. Using default database settings.")
                }
                _ => warn!(error = %err, "Unusable config file. Using default database settings."),
            }
            LoadedConfig {
                config: DatabaseConfig::default(),
                origin: ConfigOrigin::Defaults {
                    reason: err.to_string(),
                },
            }
        }
    }
}
