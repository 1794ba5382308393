use crate::error::PoolError;
use crate::handle::{result_channel, ResultHandle};
use crate::task::{next_task_id, panic_message, ManagedTask};
use crate::task_queue::TaskQueue;

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};

use parking_lot::Mutex;
use tracing::{debug, error, info, info_span, trace, warn};

/// State shared between the manager and its worker threads.
struct PoolShared {
  pool_name: Arc<String>,
  queue: TaskQueue,
  active_tasks: AtomicUsize,
}

/// A fixed-size pool of OS worker threads consuming tasks from a shared FIFO queue.
///
/// Tasks are submitted with [`submit`](Self::submit) and friends, each returning a
/// [`ResultHandle`] for the eventual outcome. Shutdown (explicit, or on drop)
/// stops accepting new tasks, lets the workers drain everything already queued,
/// and blocks until every worker thread has exited.
pub struct ThreadPoolManager {
  pool_name: Arc<String>,
  shared: Arc<PoolShared>,
  worker_count: usize,
  worker_thread_ids: Vec<ThreadId>,
  worker_join_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl fmt::Debug for ThreadPoolManager {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ThreadPoolManager")
      .field("pool_name", &self.pool_name)
      .field("worker_count", &self.worker_count)
      .field("queue", &self.shared.queue)
      .field("active_tasks", &self.active_task_count())
      .finish()
  }
}

impl ThreadPoolManager {
  /// Starts a pool with exactly `worker_count` worker threads.
  ///
  /// Worker threads are named `"{pool_name}-worker-{index}"`.
  ///
  /// # Errors
  /// Returns `PoolError::InvalidWorkerCount` if `worker_count` is zero.
  /// Returns `PoolError::WorkerSpawnFailed` if a worker thread could not be
  /// started; workers started before the failure are shut down first.
  pub fn new(worker_count: usize, pool_name: &str) -> Result<Self, PoolError> {
    if worker_count == 0 {
      warn!(%pool_name, "Refusing to create a pool with zero workers.");
      return Err(PoolError::InvalidWorkerCount);
    }

    let pool_name = Arc::new(pool_name.to_string());
    let shared = Arc::new(PoolShared {
      pool_name: pool_name.clone(),
      queue: TaskQueue::new(),
      active_tasks: AtomicUsize::new(0),
    });

    let mut join_handles = Vec::with_capacity(worker_count);
    for worker_index in 0..worker_count {
      let worker_shared = shared.clone();
      let spawn_result = thread::Builder::new()
        .name(format!("{}-worker-{}", pool_name, worker_index))
        .spawn(move || Self::run_worker_loop(worker_shared, worker_index));

      match spawn_result {
        Ok(handle) => join_handles.push(handle),
        Err(spawn_error) => {
          error!(pool_name = %*pool_name, worker = worker_index, "Failed to spawn worker thread: {}", spawn_error);
          shared.queue.close();
          for handle in join_handles {
            let _ = handle.join();
          }
          return Err(PoolError::WorkerSpawnFailed(spawn_error.to_string()));
        }
      }
    }

    let worker_thread_ids = join_handles.iter().map(|h| h.thread().id()).collect();
    info!(pool_name = %*pool_name, worker_count, "Thread pool started.");

    Ok(Self {
      pool_name,
      shared,
      worker_count,
      worker_thread_ids,
      worker_join_handles: Mutex::new(join_handles),
    })
  }

  pub fn name(&self) -> &str {
    &self.pool_name
  }

  pub fn worker_count(&self) -> usize {
    self.worker_count
  }

  /// Returns the number of tasks currently executing on a worker.
  pub fn active_task_count(&self) -> usize {
    self.shared.active_tasks.load(Ordering::SeqCst)
  }

  /// Returns the current number of tasks in the pending queue.
  pub fn queued_task_count(&self) -> usize {
    self.shared.queue.len()
  }

  pub fn is_shutting_down(&self) -> bool {
    self.shared.queue.is_closed()
  }

  /// Submits a closure for execution and returns a handle to its result.
  ///
  /// A panic inside `task` is captured and reported through the handle as
  /// `PoolError::TaskPanicked`; the worker keeps running.
  ///
  /// # Errors
  /// Returns `PoolError::PoolShuttingDown` once shutdown has begun.
  pub fn submit<F, T>(&self, task: F) -> Result<ResultHandle<T>, PoolError>
  where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
  {
    self.enqueue(move || Ok(task()))
  }

  /// Binds `args` to `task` and submits the resulting zero-argument job.
  pub fn submit_with<F, A, T>(&self, task: F, args: A) -> Result<ResultHandle<T>, PoolError>
  where
    F: FnOnce(A) -> T + Send + 'static,
    A: Send + 'static,
    T: Send + 'static,
  {
    self.enqueue(move || Ok(task(args)))
  }

  /// Submits a fallible closure. An `Err(e)` it returns is reported through
  /// the handle as `PoolError::TaskFailed(e.to_string())`.
  pub fn submit_fallible<F, T, E>(&self, task: F) -> Result<ResultHandle<T>, PoolError>
  where
    F: FnOnce() -> Result<T, E> + Send + 'static,
    T: Send + 'static,
    E: fmt::Display,
  {
    self.enqueue(move || task().map_err(|e| PoolError::TaskFailed(e.to_string())))
  }

  fn enqueue<P, T>(&self, produce: P) -> Result<ResultHandle<T>, PoolError>
  where
    P: FnOnce() -> Result<T, PoolError> + Send + 'static,
    T: Send + 'static,
  {
    if self.shared.queue.is_closed() {
      warn!(pool_name = %*self.pool_name, "Submit: Attempted to submit task to a pool that is shutting down.");
      return Err(PoolError::PoolShuttingDown);
    }

    let task_id = next_task_id();
    let (result_sender, handle) = result_channel::<T>(task_id);
    let pool_name = self.pool_name.clone();

    let job = Box::new(move || {
      let outcome = match panic::catch_unwind(AssertUnwindSafe(produce)) {
        Ok(outcome) => {
          trace!(pool_name = %*pool_name, %task_id, "Task executed.");
          outcome
        }
        Err(payload) => {
          let message = panic_message(&*payload);
          error!(pool_name = %*pool_name, %task_id, "Task panicked during execution: {}", message);
          Err(PoolError::TaskPanicked(message))
        }
      };
      result_sender.complete(outcome);
    });

    match self.shared.queue.push(ManagedTask::new(task_id, job)) {
      Ok(()) => {
        debug!(pool_name = %*self.pool_name, %task_id, "Task submitted to queue.");
        Ok(handle)
      }
      Err(rejected) => {
        warn!(
          pool_name = %*self.pool_name,
          task_id = rejected.task_id,
          "Submit: Pool began shutting down before the task was queued."
        );
        Err(PoolError::PoolShuttingDown)
      }
    }
  }

  /// Stops accepting tasks, drains the queue and joins every worker.
  ///
  /// Safe to call more than once and from several threads; every caller
  /// returns only after all workers have terminated. When called from one of
  /// this pool's own workers, the queue is closed but no join is attempted.
  pub fn shutdown(&self) {
    let current = thread::current().id();
    if self.worker_thread_ids.contains(&current) {
      if self.shared.queue.close() {
        warn!(pool_name = %*self.pool_name, "Shutdown requested from a pool worker. Workers will exit after draining but are not joined.");
      }
      return;
    }

    let mut join_handles = self.worker_join_handles.lock();
    if self.shared.queue.close() {
      info!(
        pool_name = %*self.pool_name,
        queued = self.shared.queue.len(),
        "Initiating pool shutdown. Draining queued tasks."
      );
    }

    if join_handles.is_empty() {
      trace!(pool_name = %*self.pool_name, "Shutdown: workers already joined.");
      return;
    }

    for handle in join_handles.drain(..) {
      let worker_name = handle.thread().name().map(str::to_string);
      if let Err(payload) = handle.join() {
        error!(
          pool_name = %*self.pool_name,
          worker = ?worker_name,
          "Worker thread panicked: {}",
          panic_message(&*payload)
        );
      }
    }
    info!(pool_name = %*self.pool_name, "Pool shutdown completed. All workers joined.");
  }

  fn run_worker_loop(shared: Arc<PoolShared>, worker_index: usize) {
    let worker_span = info_span!("pool_worker", pool_name = %*shared.pool_name, worker = worker_index);
    let _entered = worker_span.enter();
    debug!("Worker loop started.");

    while let Some(task) = shared.queue.pop_blocking() {
      let task_id = task.task_id;
      shared.active_tasks.fetch_add(1, Ordering::SeqCst);
      debug!(%task_id, "Dequeued task.");

      let run_result = info_span!("pool_task", %task_id).in_scope(|| panic::catch_unwind(AssertUnwindSafe(|| task.run())));
      shared.active_tasks.fetch_sub(1, Ordering::SeqCst);

      if let Err(payload) = run_result {
        error!(%task_id, "Task job panicked outside its result capture: {}", panic_message(&*payload));
      }
    }

    debug!("Queue closed and drained. Worker loop terminating.");
  }
}

impl Drop for ThreadPoolManager {
  fn drop(&mut self) {
    if !self.shared.queue.is_closed() {
      info!(pool_name = %*self.pool_name, "ThreadPoolManager dropped. Initiating implicit shutdown.");
    }
    self.shutdown();
  }
}
