//! Background documentation runs.
//!
//! Each submitted job gets its own named OS thread. Threads are never
//! joined; their results are observed only through the job tracker and
//! the produced file.

pub mod cleanup;
pub mod progress;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::info_span;

use crate::connection::ConnectionParams;
use crate::error::{ReportError, WorkerError};
use crate::reader::Connector;
use crate::report::{ReportAssembler, ReportOutput};
use crate::tracker::{JobStatus, JobTracker, JobUpdate, StoreError, TrackerError};

pub use cleanup::{sweep_older_than, SweepReport};
pub use progress::TrackerProgress;

pub const CONNECTED_MESSAGE: &str = "Connected to database";
pub const COMPLETED_MESSAGE: &str = "Documentation generated successfully";

/// Runs the reader and report assembler for jobs, recording progress in
/// the tracker.
#[derive(Clone)]
pub struct Generator {
    tracker: JobTracker,
    connector: Arc<dyn Connector>,
    output_dir: PathBuf,
    max_file_age: Duration,
}

impl Generator {
    pub fn new(
        tracker: JobTracker,
        connector: Arc<dyn Connector>,
        output_dir: impl Into<PathBuf>,
        max_file_age: Duration,
    ) -> Self {
        Self {
            tracker,
            connector,
            output_dir: output_dir.into(),
            max_file_age,
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn tracker(&self) -> &JobTracker {
        &self.tracker
    }

    /// Starts the run on a new thread and returns immediately.
    pub fn spawn(
        &self,
        job_id: String,
        params: Arc<ConnectionParams>,
        selected: Option<Vec<String>>,
    ) -> Result<(), WorkerError> {
        let generator = self.clone();
        let name = format!("schemadoc-{}", job_id.chars().take(8).collect::<String>());

        thread::Builder::new()
            .name(name)
            .spawn(move || generator.run(&job_id, &params, selected.as_deref()))
            .map_err(WorkerError::SpawnFailed)?;

        log::debug!("Spawned documentation worker");
        Ok(())
    }

    /// Runs one job to a terminal state. Failures end up in the job record,
    /// not in the return value.
    pub fn run(&self, job_id: &str, params: &ConnectionParams, selected: Option<&[String]>) {
        let _span = info_span!("generate", job_id = %job_id, kind = %params.kind()).entered();

        match self.execute(job_id, params, selected) {
            Ok(output) => {
                log::info!(
                    "Job {} completed: {} tables in {}",
                    job_id,
                    output.tables,
                    output.filename
                );
                let swept = sweep_older_than(&self.output_dir, self.max_file_age);
                if !swept.removed.is_empty() {
                    log::info!("Removed {} old documents", swept.removed.len());
                }
            }
            Err(e) if job_already_finished(&e) => {
                log::warn!("Job {} finished elsewhere, stopping: {}", job_id, e);
            }
            Err(e) => {
                log::error!("Job {} failed: {}", job_id, e);
                let update = JobUpdate::new()
                    .status(JobStatus::Error)
                    .message(format!("Error: {}", e))
                    .current(0);
                if let Err(update_err) = self.tracker.update(job_id, update) {
                    log::error!(
                        "Could not record failure of job {}: {}",
                        job_id,
                        update_err
                    );
                }
            }
        }
    }

    fn execute(
        &self,
        job_id: &str,
        params: &ConnectionParams,
        selected: Option<&[String]>,
    ) -> Result<ReportOutput, WorkerError> {
        let reader = {
            let _step = info_span!("connect").entered();
            self.connector.connect(params)?
        };
        self.tracker.update(
            job_id,
            JobUpdate::new()
                .status(JobStatus::Running)
                .message(CONNECTED_MESSAGE),
        )?;

        let progress = TrackerProgress::new(self.tracker.clone(), job_id);
        let output = ReportAssembler::new(reader.as_ref(), &progress).generate(
            &params.service_label(),
            &self.output_dir,
            selected,
        )?;

        self.tracker.update(
            job_id,
            JobUpdate::new()
                .status(JobStatus::Completed)
                .message(COMPLETED_MESSAGE)
                .progress(output.tables, output.tables)
                .filename(output.filename.clone()),
        )?;
        Ok(output)
    }
}

/// Whether the failure is the store refusing to touch a terminal job, in
/// which case no further update may be issued.
fn job_already_finished(err: &WorkerError) -> bool {
    let tracker_err = match err {
        WorkerError::Tracker(e) => Some(e),
        WorkerError::Report(ReportError::Progress(e)) => e.downcast_ref::<TrackerError>(),
        _ => None,
    };
    tracker_err.is_some_and(|e| matches!(e.store_error(), StoreError::Terminal { .. }))
}
