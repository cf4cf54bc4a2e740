use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::tracker::RetryPolicy;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// SQLite file holding the job table.
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
    /// Where generated documents are written and served from.
    #[serde(default = "default_output_directory")]
    pub output_directory: PathBuf,
    /// Documents older than this are removed after each successful job.
    #[serde(default = "default_file_max_age_secs")]
    pub file_max_age_secs: u64,
    /// How long submitted connection details are kept waiting for
    /// `/generate` before they are dropped.
    #[serde(default = "default_credential_ttl_secs")]
    pub credential_ttl_secs: u64,
    /// Directory the web form may name SQLite sources in. `None` disables
    /// SQLite sources over HTTP; the command line is not restricted.
    #[serde(default)]
    pub sqlite_root: Option<PathBuf>,
    #[serde(default)]
    pub retry: RetrySettings,
    #[serde(default = "default_true")]
    pub cors_allow_any_origin: bool,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_database_path() -> PathBuf {
    crate::db::default_database_path().unwrap_or_else(|| PathBuf::from("data").join("jobs.db"))
}

fn default_output_directory() -> PathBuf {
    PathBuf::from("generated_docs")
}

fn default_file_max_age_secs() -> u64 {
    600
}

fn default_credential_ttl_secs() -> u64 {
    900
}

fn default_true() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            database_path: default_database_path(),
            output_directory: default_output_directory(),
            file_max_age_secs: default_file_max_age_secs(),
            credential_ttl_secs: default_credential_ttl_secs(),
            sqlite_root: None,
            retry: RetrySettings::default(),
            cors_allow_any_origin: true,
        }
    }
}

impl Settings {
    pub fn file_max_age(&self) -> Duration {
        Duration::from_secs(self.file_max_age_secs)
    }

    pub fn credential_ttl(&self) -> Duration {
        Duration::from_secs(self.credential_ttl_secs)
    }

    /// `host:port` for binding the HTTP listener.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Job store contention handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrySettings {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_ms() -> u64 {
    100
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_ms: default_backoff_ms(),
        }
    }
}

impl RetrySettings {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, Duration::from_millis(self.backoff_ms))
    }
}
