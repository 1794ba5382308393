use thiserror::Error;

/// Errors that can occur within the `thread_orchestra` pool.
///
/// Task outcomes are shared by every clone of a `ResultHandle`, so the enum is
/// `Clone` and carries failure details as owned strings.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
  #[error("Worker count must be at least 1")]
  InvalidWorkerCount,

  #[error("Failed to spawn pool worker thread: {0}")]
  WorkerSpawnFailed(String),

  #[error("Pool is shutting down or already shut down, cannot accept new tasks")]
  PoolShuttingDown,

  #[error("Submitted task panicked: {0}")]
  TaskPanicked(String),

  #[error("Submitted task failed: {0}")]
  TaskFailed(String),

  #[error("Task was discarded before producing a result")]
  ResultAbandoned,
}

impl PoolError {
  /// Returns `true` for outcomes produced by the task itself, as opposed to
  /// misuse of the pool.
  pub fn is_task_failure(&self) -> bool {
    matches!(self, PoolError::TaskPanicked(_) | PoolError::TaskFailed(_))
  }
}
