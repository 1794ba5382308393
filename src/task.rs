use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_TASK_ID: AtomicU64 = AtomicU64::new(0);

/// Process-unique identifier assigned to every submitted task.
pub type TaskId = u64;

pub(crate) fn next_task_id() -> TaskId {
  NEXT_TASK_ID.fetch_add(1, Ordering::Relaxed)
}

/// The type-erased unit of work a worker runs. The closure already owns the
/// producer side of the task's result slot.
pub(crate) type Job = Box<dyn FnOnce() + Send + 'static>;

/// Internal representation of a task sitting in the queue.
pub(crate) struct ManagedTask {
  pub(crate) task_id: TaskId,
  pub(crate) job: Job,
}

impl ManagedTask {
  pub(crate) fn new(task_id: TaskId, job: Job) -> Self {
    Self { task_id, job }
  }

  pub(crate) fn run(self) {
    (self.job)()
  }
}

impl fmt::Debug for ManagedTask {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ManagedTask")
      .field("task_id", &self.task_id)
      .finish_non_exhaustive()
  }
}

/// Extracts a readable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
  if let Some(s) = payload.downcast_ref::<&'static str>() {
    (*s).to_string()
  } else if let Some(s) = payload.downcast_ref::<String>() {
    s.clone()
  } else {
    "non-string panic payload".to_string()
  }
}
