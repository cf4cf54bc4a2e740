use std::path::PathBuf;
use thiserror::Error;

use crate::report::ProgressError;
use crate::tracker::TrackerError;

#[derive(Error, Debug)]
pub enum SchemadocError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),

    #[error("Metadata error: {0}")]
    Reader(#[from] ReaderError),

    #[error("Report error: {0}")]
    Report(#[from] ReportError),

    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("Job tracker error: {0}")]
    Tracker(#[from] TrackerError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Invalid value '{value}' for {name}")]
    InvalidEnv { name: &'static str, value: String },

    #[error("Config validation failed: {message}")]
    Validation { message: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    #[error("Unsupported connection type '{0}'")]
    UnsupportedType(String),

    #[error("{field} is required for {kind} connection")]
    MissingField {
        field: &'static str,
        kind: &'static str,
    },

    #[error("Invalid port '{0}': expected a number between 1 and 65535")]
    InvalidPort(String),

    #[error("Invalid connection string format: {0}")]
    InvalidConnectionString(String),

    #[error("Invalid TNS configuration: {0}")]
    InvalidTns(String),
}

#[derive(Error, Debug)]
pub enum ReaderError {
    #[error("Source database not found: {0}")]
    SourceMissing(PathBuf),

    #[error("Failed to open source database '{path}': {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Metadata query failed: {0}")]
    Query(#[from] rusqlite::Error),

    #[error("Table not found: {0}")]
    TableNotFound(String),

    #[error("No driver available for {0} connections (build with the `oracle` feature)")]
    DriverUnavailable(&'static str),

    #[cfg(feature = "oracle")]
    #[error("Oracle error: {0}")]
    Oracle(#[from] oracle::Error),
}

#[derive(Error, Debug)]
pub enum ReportError {
    #[error(transparent)]
    Reader(#[from] ReaderError),

    #[error("No tables selected for documentation")]
    NoTables,

    #[error("Failed to create output directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write document '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write document XML: {0}")]
    Xml(String),

    #[error("Failed to package document: {0}")]
    Package(#[from] zip::result::ZipError),

    #[error(transparent)]
    Progress(#[from] ProgressError),
}

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Failed to spawn worker: {0}")]
    SpawnFailed(#[source] std::io::Error),

    #[error(transparent)]
    Reader(#[from] ReaderError),

    #[error(transparent)]
    Report(#[from] ReportError),

    #[error(transparent)]
    Tracker(#[from] TrackerError),
}

pub type Result<T> = std::result::Result<T, SchemadocError>;
