//! Configuration schema (dwh.toml)
//!
//! The file keeps the section and key names of the classic `dwh.cfg`
//! layout so existing cluster settings can be carried over unchanged:
//!
//! ```toml
//! [CLUSTER]
//! HOST = "sparkify.abc123.us-west-2.redshift.amazonaws.com"
//! DB_NAME = "dev"
//! DB_USER = "awsuser"
//! DB_PASSWORD = "secret"
//! DB_PORT = 5439
//!
//! [IAM_ROLE]
//! ARN = "arn:aws:iam::123456789012:role/dwhRole"
//!
//! [S3]
//! LOG_DATA = "s3://udacity-dend/log_data"
//! LOG_JSONPATH = "s3://udacity-dend/log_json_path.json"
//! SONG_DATA = "s3://udacity-dend/song_data"
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Default Redshift port
pub const DEFAULT_PORT: u16 = 5439;

/// Region the source buckets live in unless configured otherwise
pub const DEFAULT_REGION: &str = "us-west-2";

/// Environment variable overriding `CLUSTER.DB_PASSWORD`
pub const ENV_DB_PASSWORD: &str = "SPARKIFY_DB_PASSWORD";

/// Environment variable overriding `CLUSTER.HOST`
pub const ENV_HOST: &str = "SPARKIFY_HOST";

/// Environment variable overriding `IAM_ROLE.ARN`
pub const ENV_IAM_ROLE_ARN: &str = "SPARKIFY_IAM_ROLE_ARN";

/// How a group of statements maps onto warehouse transactions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CommitPolicy {
    /// Commit after every statement; a failing statement is rolled back alone
    #[default]
    PerStatement,

    /// Run the whole group in one transaction; any failure rolls back the group
    SingleTransaction,
}

impl fmt::Display for CommitPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PerStatement => write!(f, "per-statement"),
            Self::SingleTransaction => write!(f, "single-transaction"),
        }
    }
}

/// AWS access keys (`[AWS]`)
///
/// Not needed by the COPY statements, which authenticate through the IAM role,
/// but accepted so a full `dwh.cfg` translates without edits.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AwsConfig {
    #[serde(rename = "key", alias = "KEY", default)]
    pub key: String,

    #[serde(rename = "secret", alias = "SECRET", default)]
    pub secret: String,
}

impl fmt::Debug for AwsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AwsConfig")
            .field("key", &self.key)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Cluster connection settings (`[CLUSTER]`)
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterConfig {
    #[serde(rename = "HOST")]
    pub host: String,

    #[serde(rename = "DB_NAME")]
    pub db_name: String,

    #[serde(rename = "DB_USER")]
    pub db_user: String,

    #[serde(rename = "DB_PASSWORD", default)]
    pub db_password: String,

    #[serde(rename = "DB_PORT", default = "default_port")]
    pub db_port: u16,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

impl ClusterConfig {
    /// `host:port/dbname`, safe to log
    pub fn endpoint(&self) -> String {
        format!("{}:{}/{}", self.host, self.db_port, self.db_name)
    }
}

impl fmt::Debug for ClusterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClusterConfig")
            .field("host", &self.host)
            .field("db_name", &self.db_name)
            .field("db_user", &self.db_user)
            .field("db_password", &"<redacted>")
            .field("db_port", &self.db_port)
            .finish()
    }
}

/// Role the warehouse assumes to read object storage (`[IAM_ROLE]`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IamRoleConfig {
    #[serde(rename = "ARN")]
    pub arn: String,
}

/// Object storage locations of the source data (`[S3]`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct S3Config {
    /// Prefix of the event log files
    #[serde(rename = "LOG_DATA")]
    pub log_data: String,

    /// JSONPaths file mapping log records to `staging_events` columns,
    /// or `auto`
    #[serde(rename = "LOG_JSONPATH")]
    pub log_jsonpath: String,

    /// Prefix of the song metadata files
    #[serde(rename = "SONG_DATA")]
    pub song_data: String,

    #[serde(rename = "REGION", default = "default_region")]
    pub region: String,
}

fn default_region() -> String {
    DEFAULT_REGION.to_string()
}

/// Run behaviour (`[ETL]`, optional)
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EtlConfig {
    #[serde(default)]
    pub commit_policy: CommitPolicy,

    /// Empty the staging tables before loading so reruns do not stack copies
    #[serde(default)]
    pub truncate_staging: bool,

    /// Connect over TLS
    #[serde(default)]
    pub tls: bool,
}

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(rename = "AWS", default, skip_serializing_if = "Option::is_none")]
    pub aws: Option<AwsConfig>,

    #[serde(rename = "CLUSTER")]
    pub cluster: ClusterConfig,

    #[serde(rename = "IAM_ROLE")]
    pub iam_role: IamRoleConfig,

    #[serde(rename = "S3")]
    pub s3: S3Config,

    #[serde(rename = "ETL", default)]
    pub etl: EtlConfig,
}

impl Config {
    /// Load config from TOML file
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(format!("{}: {}", path.display(), e)))?;

        Self::from_toml(&contents)
    }

    /// Load config from TOML string
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml)
            .map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Save config to TOML file
    pub fn save_to_file(&self, path: &std::path::Path) -> Result<(), ConfigError> {
        let toml = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, toml)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Apply `SPARKIFY_*` overrides from the process environment
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary lookup (empty values are ignored)
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(password) = get(ENV_DB_PASSWORD) {
            self.cluster.db_password = password;
        }
        if let Some(host) = get(ENV_HOST) {
            self.cluster.host = host;
        }
        if let Some(arn) = get(ENV_IAM_ROLE_ARN) {
            self.iam_role.arn = arn;
        }
    }

    /// Check required values and storage URIs
    pub fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            ("CLUSTER.HOST", &self.cluster.host),
            ("CLUSTER.DB_NAME", &self.cluster.db_name),
            ("CLUSTER.DB_USER", &self.cluster.db_user),
            ("IAM_ROLE.ARN", &self.iam_role.arn),
            ("S3.LOG_DATA", &self.s3.log_data),
            ("S3.LOG_JSONPATH", &self.s3.log_jsonpath),
            ("S3.SONG_DATA", &self.s3.song_data),
            ("S3.REGION", &self.s3.region),
        ];

        for (key, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::MissingValue(key.to_string()));
            }
        }

        if self.cluster.db_port == 0 {
            return Err(ConfigError::InvalidValue {
                key: "CLUSTER.DB_PORT".to_string(),
                reason: "port must be non-zero".to_string(),
            });
        }

        let storage = [
            ("S3.LOG_DATA", &self.s3.log_data),
            ("S3.SONG_DATA", &self.s3.song_data),
        ];
        for (key, value) in storage {
            check_storage_uri(key, value)?;
        }

        if !self.s3.log_jsonpath.eq_ignore_ascii_case("auto") {
            check_storage_uri("S3.LOG_JSONPATH", &self.s3.log_jsonpath)?;
        }

        Ok(())
    }
}

fn check_storage_uri(key: &str, value: &str) -> Result<(), ConfigError> {
    match value.strip_prefix("s3://") {
        Some(rest) if !rest.is_empty() && !rest.starts_with('/') => Ok(()),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            reason: format!("expected an s3://bucket/prefix URI, got '{}'", value),
        }),
    }
}

/// Config error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),

    #[error("Missing required value: {0}")]
    MissingValue(String),

    #[error("Invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },
}
