use std::error::Error as StdError;

use thiserror::Error;

/// A progress sink refused an event. Aborts the report run.
#[derive(Error, Debug)]
#[error("Progress update rejected: {source}")]
pub struct ProgressError {
    #[source]
    source: Box<dyn StdError + Send + Sync>,
}

impl ProgressError {
    pub fn new(source: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        Self {
            source: source.into(),
        }
    }

    /// The reporter's own error, if it is a `T`.
    pub fn downcast_ref<T: StdError + 'static>(&self) -> Option<&T> {
        self.source.downcast_ref::<T>()
    }
}

/// Receives `(message, current, total)` events in order, synchronously,
/// from the report assembler.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, message: &str, current: u64, total: u64) -> Result<(), ProgressError>;
}

/// No-op reporter for unit tests.
pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn report(&self, _message: &str, _current: u64, _total: u64) -> Result<(), ProgressError> {
        Ok(())
    }
}

/// Writes each event to the log. Used by the command line generator.
pub struct LogProgress;

impl ProgressReporter for LogProgress {
    fn report(&self, message: &str, current: u64, total: u64) -> Result<(), ProgressError> {
        log::info!("[{}/{}] {}", current, total, message);
        Ok(())
    }
}
