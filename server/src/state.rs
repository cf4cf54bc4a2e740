use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use schemadoc::reader::{Connector, DefaultConnector};
use schemadoc::tracker::{JobTracker, SqliteJobStore};
use schemadoc::{ConnectionParams, Database, Generator, SchemadocError, Settings};

use crate::error::ApiError;

/// Shared by all handlers.
pub struct AppState {
    pub tracker: JobTracker,
    pub generator: Generator,
    pub connector: Arc<dyn Connector>,
    pub output_dir: PathBuf,
    pub cors_allow_any_origin: bool,
    /// Directory SQLite sources must live in; `None` disables them.
    pub sqlite_root: Option<PathBuf>,
    pending: PendingConnections,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    /// Opens the job database named in `settings`.
    pub fn from_settings(settings: &Settings) -> Result<Self, SchemadocError> {
        let db = Database::open(&settings.database_path)?;
        let tracker = JobTracker::with_policy(
            Arc::new(SqliteJobStore::new(db)),
            settings.retry.policy(),
        );
        Ok(Self::new(tracker, Arc::new(DefaultConnector), settings))
    }

    pub fn new(tracker: JobTracker, connector: Arc<dyn Connector>, settings: &Settings) -> Self {
        let generator = Generator::new(
            tracker.clone(),
            Arc::clone(&connector),
            settings.output_directory.clone(),
            settings.file_max_age(),
        );
        Self {
            tracker,
            generator,
            connector,
            output_dir: settings.output_directory.clone(),
            cors_allow_any_origin: settings.cors_allow_any_origin,
            sqlite_root: settings.sqlite_root.clone(),
            pending: PendingConnections::new(settings.credential_ttl()),
        }
    }

    pub fn remember(&self, job_id: &str, params: Arc<ConnectionParams>) -> Result<(), ApiError> {
        self.pending.insert(job_id, params)
    }

    pub fn params_for(&self, job_id: &str) -> Result<Option<Arc<ConnectionParams>>, ApiError> {
        self.pending.get(job_id)
    }

    /// Removes and returns the parameters for `job_id`. Only one caller
    /// ever receives them.
    pub fn take(&self, job_id: &str) -> Result<Option<Arc<ConnectionParams>>, ApiError> {
        self.pending.take(job_id)
    }
}

/// Connection parameters of submitted jobs, kept in memory only until
/// generation starts or `ttl` passes. Expired entries are dropped on every
/// access.
struct PendingConnections {
    ttl: Duration,
    entries: Mutex<Entries>,
}

type Entries = HashMap<String, (Instant, Arc<ConnectionParams>)>;

impl PendingConnections {
    fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn live(&self) -> Result<MutexGuard<'_, Entries>, ApiError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| ApiError::Internal("Connection cache is unavailable".to_string()))?;
        let before = entries.len();
        entries.retain(|_, (stored_at, _)| stored_at.elapsed() < self.ttl);
        let dropped = before - entries.len();
        if dropped > 0 {
            log::debug!("Dropped {} expired connection entries", dropped);
        }
        Ok(entries)
    }

    fn insert(&self, job_id: &str, params: Arc<ConnectionParams>) -> Result<(), ApiError> {
        self.live()?.insert(job_id.to_string(), (Instant::now(), params));
        Ok(())
    }

    fn get(&self, job_id: &str) -> Result<Option<Arc<ConnectionParams>>, ApiError> {
        Ok(self.live()?.get(job_id).map(|(_, params)| Arc::clone(params)))
    }

    fn take(&self, job_id: &str) -> Result<Option<Arc<ConnectionParams>>, ApiError> {
        Ok(self.live()?.remove(job_id).map(|(_, params)| params))
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.live().map(|entries| entries.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sqlite_params(name: &str) -> Arc<ConnectionParams> {
        Arc::new(ConnectionParams::Sqlite {
            path: PathBuf::from(name),
        })
    }

    #[test]
    fn test_take_hands_out_params_once() {
        let pending = PendingConnections::new(Duration::from_secs(60));
        pending.insert("job-1", sqlite_params("shop.db")).unwrap();

        assert!(pending.get("job-1").unwrap().is_some());
        assert!(pending.take("job-1").unwrap().is_some());
        assert!(pending.take("job-1").unwrap().is_none());
        assert!(pending.get("job-1").unwrap().is_none());
    }

    #[test]
    fn test_take_from_many_threads_has_one_winner() {
        let pending = PendingConnections::new(Duration::from_secs(60));
        pending.insert("job-1", sqlite_params("shop.db")).unwrap();

        let barrier = std::sync::Barrier::new(8);
        let winners = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    scope.spawn(|| {
                        barrier.wait();
                        pending.take("job-1").unwrap().is_some()
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join())
                .filter(|r| matches!(r, Ok(true)))
                .count()
        });
        assert_eq!(winners, 1);
    }

    #[test]
    fn test_entries_expire_after_ttl() {
        let pending = PendingConnections::new(Duration::from_millis(50));
        pending.insert("old", sqlite_params("old.db")).unwrap();
        std::thread::sleep(Duration::from_millis(100));

        assert!(pending.get("old").unwrap().is_none());
        assert!(pending.take("old").unwrap().is_none());
        assert_eq!(pending.len(), 0);
    }

    #[test]
    fn test_expired_entries_are_dropped_on_unrelated_access() {
        let pending = PendingConnections::new(Duration::from_millis(50));
        for i in 0..5 {
            pending
                .insert(&format!("abandoned-{i}"), sqlite_params("shop.db"))
                .unwrap();
        }
        std::thread::sleep(Duration::from_millis(100));

        pending.insert("fresh", sqlite_params("shop.db")).unwrap();
        assert_eq!(pending.len(), 1);
        assert!(pending.get("fresh").unwrap().is_some());
    }
}
