pub mod config;
pub mod connection;
pub mod db;
pub mod error;
pub mod logging;
pub mod reader;
pub mod report;
pub mod sanitize;
pub mod tracker;
pub mod worker;

pub use config::{load_settings, RetrySettings, Settings};
pub use connection::{ConnectionForm, ConnectionKind, ConnectionParams, ConnectionSnapshot};
pub use db::{Database, DatabaseError};
pub use error::{
    ConfigError, ConnectionError, ReaderError, ReportError, Result, SchemadocError, WorkerError,
};
pub use reader::{Connector, DefaultConnector, MetadataReader};
pub use report::{ProgressReporter, ReportAssembler, ReportOutput};
pub use tracker::{
    Job, JobStatus, JobStore, JobTracker, JobUpdate, RequestContext, RetryPolicy, SqliteJobStore,
    TrackerError,
};
pub use worker::Generator;
