//! Universal data types for the execution engine.
//!
//! These give a normalized representation of a reachable database target and
//! of query output, independent of the backing driver.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::observability::Sensitive;

/// Correlation id for one fan-out dispatch, carried in tracing spans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DispatchId(pub Uuid);

impl DispatchId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for DispatchId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for DispatchId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// One reachable database target, optionally behind an SSH tunnel.
///
/// Deserializes from the legacy connections-file layout, so the original
/// field names (`engine`, `server`, `base`) are accepted as aliases:
///
/// ```json
/// {
///     "ssh": { "host": "ssh.local", "login": "root", "key": "private.key" },
///     "engine": "mysql",
///     "server": "127.0.0.1",
///     "port": 3306,
///     "user": "admin",
///     "password": "",
///     "base": "mysql"
/// }
/// ```
///
/// Constructed once by the config layer, read-only afterwards. The password
/// is wrapped in [`Sensitive`] and never appears in Debug output, tracing
/// fields, or serialized diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    #[serde(alias = "engine", default = "default_driver")]
    pub driver: String,
    #[serde(alias = "server")]
    pub host: String,
    #[serde(default = "default_db_port")]
    pub port: u16,
    #[serde(alias = "user", default = "default_login")]
    pub username: String,
    #[serde(default)]
    pub password: Sensitive<String>,
    #[serde(alias = "base")]
    pub database: String,
    #[serde(alias = "ssh", default)]
    pub ssh_tunnel: Option<SshTunnelConfig>,
}

fn default_driver() -> String {
    "mysql".to_string()
}

fn default_db_port() -> u16 {
    3306
}

fn default_login() -> String {
    "root".to_string()
}

fn default_ssh_port() -> u16 {
    22
}

/// SSH tunnel configuration for a target that is not directly reachable.
///
/// `private_key_path` and `password` are both optional in the legacy format;
/// [`SshTunnelConfig::auth`] derives the effective method (key wins).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SshTunnelConfig {
    pub host: String,
    #[serde(default = "default_ssh_port")]
    pub port: u16,
    #[serde(alias = "login", default = "default_login")]
    pub username: String,
    #[serde(alias = "key", default)]
    pub private_key_path: Option<String>,
    #[serde(default)]
    pub password: Option<Sensitive<String>>,
}

/// Effective SSH authentication method, derived from the optional fields.
#[derive(Debug)]
pub enum SshAuth<'a> {
    Key { private_key_path: &'a str },
    Password { password: &'a Sensitive<String> },
}

impl SshTunnelConfig {
    /// The effective authentication method, or `None` when the config
    /// carries neither a key nor a password. Key wins over password.
    /// Agent auth is not supported; auth-less configs are rejected when
    /// the tunnel is opened.
    pub fn auth(&self) -> Option<SshAuth<'_>> {
        if let Some(ref path) = self.private_key_path {
            Some(SshAuth::Key { private_key_path: path })
        } else if let Some(ref password) = self.password {
            Some(SshAuth::Password { password })
        } else {
            None
        }
    }
}

/// Universal value representation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(#[serde(with = "base64_bytes")] Vec<u8>),
    Json(serde_json::Value),
}

mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &Vec<u8>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        STANDARD.decode(&s).map_err(serde::de::Error::custom)
    }
}

/// Column metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
}

impl ColumnInfo {
    pub fn text(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: "TEXT".to_string(),
            nullable: false,
        }
    }
}

/// A single row of data, indexed by column order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub values: Vec<Value>,
}

/// A materialized result set: ordered column names plus row tuples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowSet {
    pub columns: Vec<ColumnInfo>,
    pub rows: Vec<Row>,
}

impl RowSet {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Column index by name, for assertions and consumers that address
    /// columns symbolically.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }
}

/// Outcome of executing one statement on one target.
///
/// Row-returning statements materialize into `Rows`; everything else reports
/// the driver's affected-row count. The count is not reported for
/// row-returning statements — drivers do not define it reliably there.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum QueryOutcome {
    Rows(RowSet),
    Affected { count: u64 },
}

impl QueryOutcome {
    pub fn rows(&self) -> Option<&RowSet> {
        match self {
            Self::Rows(rs) => Some(rs),
            Self::Affected { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_config_accepts_legacy_field_names() {
        let json = r#"{
            "ssh": { "host": "ssh.local", "login": "deploy", "key": "private.key" },
            "engine": "mysql",
            "server": "10.0.0.5",
            "user": "admin",
            "password": "s3cret",
            "base": "orders"
        }"#;
        let config: TargetConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.driver, "mysql");
        assert_eq!(config.host, "10.0.0.5");
        assert_eq!(config.port, 3306);
        assert_eq!(config.username, "admin");
        assert_eq!(config.database, "orders");

        let ssh = config.ssh_tunnel.expect("ssh section");
        assert_eq!(ssh.port, 22);
        assert_eq!(ssh.username, "deploy");
        assert!(matches!(ssh.auth(), Some(SshAuth::Key { private_key_path }) if private_key_path == "private.key"));
    }

    #[test]
    fn target_config_debug_never_shows_password() {
        let json = r#"{"server": "db", "user": "u", "password": "topsecret", "base": "b"}"#;
        let config: TargetConfig = serde_json::from_str(json).unwrap();

        let debug = format!("{config:?}");
        assert!(!debug.contains("topsecret"));
        assert!(debug.contains("[REDACTED]"));

        let serialized = serde_json::to_string(&config).unwrap();
        assert!(!serialized.contains("topsecret"));
    }

    #[test]
    fn ssh_auth_prefers_key_over_password() {
        let json = r#"{"host": "h", "login": "l", "key": "k", "password": "p"}"#;
        let ssh: SshTunnelConfig = serde_json::from_str(json).unwrap();
        assert!(matches!(ssh.auth(), Some(SshAuth::Key { .. })));
    }

    #[test]
    fn ssh_auth_is_none_without_key_or_password() {
        let json = r#"{"host": "h", "login": "l"}"#;
        let ssh: SshTunnelConfig = serde_json::from_str(json).unwrap();
        assert!(ssh.auth().is_none());
    }

    #[test]
    fn row_set_column_index() {
        let rs = RowSet {
            columns: vec![ColumnInfo::text("base"), ColumnInfo::text("id")],
            rows: vec![],
        };
        assert_eq!(rs.column_index("id"), Some(1));
        assert_eq!(rs.column_index("missing"), None);
    }
}
