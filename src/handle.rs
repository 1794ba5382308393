use crate::error::PoolError;
use crate::task::TaskId;

use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};
use std::time::{Duration, Instant};
use tracing::{trace, warn};

struct SlotState<T> {
  outcome: Option<Result<T, PoolError>>,
  wakers: Vec<Waker>,
}

/// Write-once cell shared by one `ResultSender` and any number of handles.
struct ResultSlot<T> {
  state: Mutex<SlotState<T>>,
  ready: Condvar,
}

impl<T> ResultSlot<T> {
  fn new() -> Self {
    Self {
      state: Mutex::new(SlotState {
        outcome: None,
        wakers: Vec::new(),
      }),
      ready: Condvar::new(),
    }
  }

  /// Stores the outcome and releases all blocked and pending readers.
  /// Returns `false` if an outcome was already present.
  fn write(&self, outcome: Result<T, PoolError>) -> bool {
    let wakers = {
      let mut state = self.state.lock();
      if state.outcome.is_some() {
        return false;
      }
      state.outcome = Some(outcome);
      std::mem::take(&mut state.wakers)
    };
    self.ready.notify_all();
    for waker in wakers {
      waker.wake();
    }
    true
  }
}

/// Creates the producer and consumer halves of a task's result slot.
pub(crate) fn result_channel<T>(task_id: TaskId) -> (ResultSender<T>, ResultHandle<T>) {
  let slot = Arc::new(ResultSlot::new());
  (
    ResultSender {
      task_id,
      slot: Some(slot.clone()),
    },
    ResultHandle { task_id, slot },
  )
}

/// The single producer of a task outcome.
///
/// `complete` consumes the sender, so an outcome can be written at most once.
/// Dropping a sender that never completed records `PoolError::ResultAbandoned`
/// so that readers do not wait forever.
pub(crate) struct ResultSender<T> {
  task_id: TaskId,
  slot: Option<Arc<ResultSlot<T>>>,
}

impl<T> ResultSender<T> {
  pub(crate) fn complete(mut self, outcome: Result<T, PoolError>) {
    if let Some(slot) = self.slot.take() {
      slot.write(outcome);
      trace!(task_id = %self.task_id, "Task outcome stored.");
    }
  }
}

impl<T> Drop for ResultSender<T> {
  fn drop(&mut self) {
    if let Some(slot) = self.slot.take() {
      if slot.write(Err(PoolError::ResultAbandoned)) {
        warn!(task_id = %self.task_id, "Task was dropped without running. Result marked abandoned.");
      }
    }
  }
}

/// A handle to the eventual outcome of a task submitted to the `ThreadPoolManager`.
///
/// Handles are cheap to clone; every clone observes the same outcome. Reading
/// never re-runs the task.
pub struct ResultHandle<T> {
  task_id: TaskId,
  slot: Arc<ResultSlot<T>>,
}

impl<T> Clone for ResultHandle<T> {
  fn clone(&self) -> Self {
    Self {
      task_id: self.task_id,
      slot: self.slot.clone(),
    }
  }
}

impl<T> fmt::Debug for ResultHandle<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ResultHandle")
      .field("task_id", &self.task_id)
      .field("ready", &self.is_ready())
      .finish()
  }
}

impl<T> ResultHandle<T> {
  /// Returns the unique ID of this task.
  pub fn id(&self) -> TaskId {
    self.task_id
  }

  /// Returns `true` once the task outcome has been written.
  pub fn is_ready(&self) -> bool {
    self.slot.state.lock().outcome.is_some()
  }

  /// Blocks the calling thread until the task outcome has been written.
  pub fn wait(&self) {
    let mut state = self.slot.state.lock();
    while state.outcome.is_none() {
      self.slot.ready.wait(&mut state);
    }
  }

  /// Blocks until the outcome is written or `timeout` elapses.
  ///
  /// Returns `true` if the outcome is available. Timing out has no effect on
  /// the task itself.
  pub fn wait_timeout(&self, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    let mut state = self.slot.state.lock();
    while state.outcome.is_none() {
      if self.slot.ready.wait_until(&mut state, deadline).timed_out() {
        break;
      }
    }
    state.outcome.is_some()
  }
}

impl<T: Clone> ResultHandle<T> {
  /// Blocks until the task finishes and returns its value.
  ///
  /// # Errors
  /// Returns `PoolError::TaskPanicked` if the task panicked.
  /// Returns `PoolError::TaskFailed` if a fallible task returned an error.
  /// Returns `PoolError::ResultAbandoned` if the task was discarded unexecuted.
  pub fn get(&self) -> Result<T, PoolError> {
    let mut state = self.slot.state.lock();
    loop {
      if let Some(outcome) = state.outcome.as_ref() {
        return outcome.clone();
      }
      self.slot.ready.wait(&mut state);
    }
  }

  /// Like `get`, but gives up after `timeout` and returns `None`.
  pub fn get_timeout(&self, timeout: Duration) -> Option<Result<T, PoolError>> {
    let deadline = Instant::now() + timeout;
    let mut state = self.slot.state.lock();
    while state.outcome.is_none() {
      if self.slot.ready.wait_until(&mut state, deadline).timed_out() {
        break;
      }
    }
    state.outcome.clone()
  }

  /// Returns the outcome if it has already been written, without blocking.
  pub fn try_get(&self) -> Option<Result<T, PoolError>> {
    self.slot.state.lock().outcome.clone()
  }
}

impl<T: Clone> Future for ResultHandle<T> {
  type Output = Result<T, PoolError>;

  fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
    let mut state = self.slot.state.lock();
    if let Some(outcome) = state.outcome.as_ref() {
      return Poll::Ready(outcome.clone());
    }
    if !state.wakers.iter().any(|w| w.will_wake(cx.waker())) {
      state.wakers.push(cx.waker().clone());
    }
    Poll::Pending
  }
}
