use crate::task::ManagedTask;

use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::fmt;

/// State guarded by the queue lock. The shutdown flag lives next to the tasks
/// so that "closed and empty" is observed atomically by consumers.
struct QueueState {
  tasks: VecDeque<ManagedTask>,
  closed: bool,
}

/// An unbounded, lock-protected FIFO of pending tasks shared by all workers.
///
/// Producers append with `push`, consumers block in `pop_blocking`. Once
/// `close` has been called, new pushes are handed back to the caller while the
/// tasks already queued remain available until drained.
pub(crate) struct TaskQueue {
  state: Mutex<QueueState>,
  available: Condvar,
}

impl fmt::Debug for TaskQueue {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let state = self.state.lock();
    f.debug_struct("TaskQueue")
      .field("len", &state.tasks.len())
      .field("closed", &state.closed)
      .finish()
  }
}

impl TaskQueue {
  pub(crate) fn new() -> Self {
    Self {
      state: Mutex::new(QueueState {
        tasks: VecDeque::new(),
        closed: false,
      }),
      available: Condvar::new(),
    }
  }

  /// Appends a task to the tail and wakes one waiting consumer.
  ///
  /// The open check and the append happen under one lock acquisition, so a
  /// task is either accepted before `close` or returned here untouched.
  pub(crate) fn push(&self, task: ManagedTask) -> Result<(), ManagedTask> {
    {
      let mut state = self.state.lock();
      if state.closed {
        return Err(task);
      }
      state.tasks.push_back(task);
    }
    self.available.notify_one();
    Ok(())
  }

  /// Removes the head task, blocking while the queue is empty and open.
  ///
  /// Returns `None` only once the queue is closed and fully drained.
  pub(crate) fn pop_blocking(&self) -> Option<ManagedTask> {
    let mut state = self.state.lock();
    loop {
      if let Some(task) = state.tasks.pop_front() {
        return Some(task);
      }
      if state.closed {
        return None;
      }
      self.available.wait(&mut state);
    }
  }

  /// Marks the queue closed and wakes every waiting consumer.
  ///
  /// Returns `true` if this call performed the transition.
  pub(crate) fn close(&self) -> bool {
    let newly_closed = {
      let mut state = self.state.lock();
      !std::mem::replace(&mut state.closed, true)
    };
    self.available.notify_all();
    newly_closed
  }

  pub(crate) fn is_closed(&self) -> bool {
    self.state.lock().closed
  }

  pub(crate) fn len(&self) -> usize {
    self.state.lock().tasks.len()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::task::next_task_id;
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::sync::Arc;
  use std::thread;
  use std::time::Duration;

  fn dummy_task(id: u64) -> ManagedTask {
    ManagedTask::new(id, Box::new(|| {}))
  }

  #[test]
  fn test_queue_push_pop_fifo() {
    let queue = TaskQueue::new();
    for id in 0..5 {
      queue.push(dummy_task(id)).unwrap();
    }
    assert_eq!(queue.len(), 5);

    let order: Vec<u64> = (0..5).map(|_| queue.pop_blocking().unwrap().task_id).collect();
    assert_eq!(order, vec![0, 1, 2, 3, 4]);
    assert_eq!(queue.len(), 0);
  }

  #[test]
  fn test_pop_blocks_until_push() {
    let queue = Arc::new(TaskQueue::new());
    let consumer = {
      let queue = queue.clone();
      thread::spawn(move || queue.pop_blocking().map(|t| t.task_id))
    };

    thread::sleep(Duration::from_millis(50));
    assert!(!consumer.is_finished(), "Consumer should be waiting on an empty queue.");

    queue.push(dummy_task(9)).unwrap();
    assert_eq!(consumer.join().unwrap(), Some(9));
  }

  #[test]
  fn test_close_wakes_idle_consumers() {
    let queue = Arc::new(TaskQueue::new());
    let consumers: Vec<_> = (0..3)
      .map(|_| {
        let queue = queue.clone();
        thread::spawn(move || queue.pop_blocking().is_none())
      })
      .collect();

    thread::sleep(Duration::from_millis(30));
    assert!(queue.close());

    for consumer in consumers {
      assert!(consumer.join().unwrap(), "Closed empty queue should signal no more work.");
    }
  }

  #[test]
  fn test_close_drains_remaining_tasks_first() {
    let queue = TaskQueue::new();
    queue.push(dummy_task(1)).unwrap();
    queue.push(dummy_task(2)).unwrap();
    queue.close();

    assert_eq!(queue.pop_blocking().map(|t| t.task_id), Some(1));
    assert_eq!(queue.pop_blocking().map(|t| t.task_id), Some(2));
    assert!(queue.pop_blocking().is_none());
  }

  #[test]
  fn test_push_after_close_returns_task() {
    let queue = TaskQueue::new();
    assert!(queue.close());
    assert!(!queue.close(), "Second close should report no transition.");
    assert!(queue.is_closed());

    let rejected = queue.push(dummy_task(5)).unwrap_err();
    assert_eq!(rejected.task_id, 5);
    assert_eq!(queue.len(), 0);
  }

  #[test]
  fn test_queue_concurrent_producers_and_consumers() {
    let queue = Arc::new(TaskQueue::new());
    let executed = Arc::new(AtomicUsize::new(0));
    let num_producers = 4;
    let per_producer = 50;

    let consumers: Vec<_> = (0..3)
      .map(|_| {
        let queue = queue.clone();
        thread::spawn(move || {
          while let Some(task) = queue.pop_blocking() {
            task.run();
          }
        })
      })
      .collect();

    let producers: Vec<_> = (0..num_producers)
      .map(|_| {
        let queue = queue.clone();
        let executed = executed.clone();
        thread::spawn(move || {
          for _ in 0..per_producer {
            let executed = executed.clone();
            let job = Box::new(move || {
              executed.fetch_add(1, Ordering::SeqCst);
            });
            queue.push(ManagedTask::new(next_task_id(), job)).unwrap();
          }
        })
      })
      .collect();

    for producer in producers {
      producer.join().unwrap();
    }
    queue.close();
    for consumer in consumers {
      consumer.join().unwrap();
    }

    assert_eq!(executed.load(Ordering::SeqCst), num_producers * per_producer);
  }
}
