use crate::report::{ProgressError, ProgressReporter};
use crate::tracker::{JobStatus, JobTracker, JobUpdate};

/// Forwards report milestones to a job as `running` updates.
pub struct TrackerProgress {
    tracker: JobTracker,
    job_id: String,
}

impl TrackerProgress {
    pub fn new(tracker: JobTracker, job_id: impl Into<String>) -> Self {
        Self {
            tracker,
            job_id: job_id.into(),
        }
    }
}

impl ProgressReporter for TrackerProgress {
    fn report(&self, message: &str, current: u64, total: u64) -> Result<(), ProgressError> {
        self.tracker
            .update(
                &self.job_id,
                JobUpdate::new()
                    .status(JobStatus::Running)
                    .message(message)
                    .progress(current, total),
            )
            .map_err(ProgressError::new)
    }
}
