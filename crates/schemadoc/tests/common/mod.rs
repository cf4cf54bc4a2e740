//! Shared test utilities for schemadoc integration tests.
//!
//! - `TestHarness`: temp directories, a fixture SQLite source database and
//!   a file-backed job store
//! - `RecordingProgress`: captures progress events in order
//! - `document_texts`: reads the text runs back out of a generated `.docx`

#![allow(dead_code)]

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock, Mutex};
use std::time::Duration;

use regex::Regex;
use tempfile::TempDir;

use schemadoc::report::{ProgressError, ProgressReporter};
use schemadoc::tracker::{JobTracker, RetryPolicy, SqliteJobStore};
use schemadoc::{ConnectionParams, Database, DefaultConnector, Generator};

/// Source schema documented by the integration tests.
pub const FIXTURE_SCHEMA: &str = r#"
CREATE TABLE customers (
    -- People who place orders
    id INTEGER PRIMARY KEY, -- Customer number
    email VARCHAR(120) NOT NULL UNIQUE, -- Login address
    name TEXT NOT NULL,
    created_at TEXT DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE orders (
    -- One row per checkout
    id INTEGER PRIMARY KEY,
    customer_id INTEGER NOT NULL REFERENCES customers(id), -- Buyer
    status VARCHAR(20) DEFAULT 'new',
    CONSTRAINT status_known CHECK (status IN ('new', 'paid', 'shipped'))
);

CREATE TABLE order_items (
    order_id INTEGER NOT NULL REFERENCES orders(id),
    line_no INTEGER NOT NULL,
    quantity INTEGER NOT NULL CHECK (quantity > 0),
    PRIMARY KEY (order_id, line_no)
);
"#;

static RE_TEXT_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<w:t(?:\s[^>]*)?>([^<]*)</w:t>").unwrap());

pub struct TestHarness {
    temp_dir: TempDir,
    pub source_db: PathBuf,
    pub output_dir: PathBuf,
    pub jobs_db: PathBuf,
}

impl TestHarness {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base = temp_dir.path();

        let source_db = base.join("shop.db");
        let conn = rusqlite::Connection::open(&source_db).expect("Failed to create source db");
        conn.execute_batch(FIXTURE_SCHEMA)
            .expect("Failed to create fixture schema");

        Self {
            source_db,
            output_dir: base.join("generated_docs"),
            jobs_db: base.join("data").join("jobs.db"),
            temp_dir,
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn source_params(&self) -> ConnectionParams {
        ConnectionParams::Sqlite {
            path: self.source_db.clone(),
        }
    }

    /// Opens the file-backed job store.
    pub fn database(&self) -> Database {
        Database::open(&self.jobs_db).expect("Failed to open job database")
    }

    pub fn tracker(&self, policy: RetryPolicy) -> JobTracker {
        JobTracker::with_policy(Arc::new(SqliteJobStore::new(self.database())), policy)
    }

    pub fn generator(&self, tracker: JobTracker) -> Generator {
        Generator::new(
            tracker,
            Arc::new(DefaultConnector),
            self.output_dir.clone(),
            Duration::from_secs(600),
        )
    }
}

#[derive(Default)]
pub struct RecordingProgress {
    events: Mutex<Vec<(String, u64, u64)>>,
}

impl RecordingProgress {
    pub fn events(&self) -> Vec<(String, u64, u64)> {
        self.events.lock().unwrap().clone()
    }
}

impl ProgressReporter for RecordingProgress {
    fn report(&self, message: &str, current: u64, total: u64) -> Result<(), ProgressError> {
        self.events
            .lock()
            .unwrap()
            .push((message.to_string(), current, total));
        Ok(())
    }
}

fn unescape(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Text runs of `word/document.xml`, in document order.
pub fn document_texts(path: &Path) -> Vec<String> {
    let file = std::fs::File::open(path).expect("Failed to open document");
    let mut archive = zip::ZipArchive::new(file).expect("Not a zip package");
    let mut part = archive
        .by_name("word/document.xml")
        .expect("Missing word/document.xml");
    let mut xml = String::new();
    part.read_to_string(&mut xml).expect("document.xml is not UTF-8");

    RE_TEXT_RUN
        .captures_iter(&xml)
        .map(|caps| unescape(&caps[1]))
        .collect()
}

/// Index of `needle` in `texts`, panicking with context when absent.
pub fn position_of(texts: &[String], needle: &str) -> usize {
    texts
        .iter()
        .position(|t| t == needle)
        .unwrap_or_else(|| panic!("'{}' not found in document", needle))
}
