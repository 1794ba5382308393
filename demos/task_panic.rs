use thread_orchestra::{PoolError, ThreadPoolManager};
use tracing::info;

fn main() {
  tracing_subscriber::fmt()
    .with_max_level(tracing::Level::DEBUG)
    .with_target(false)
    .init();
  info!("--- Task Panic Example ---");

  let manager = ThreadPoolManager::new(1, "panic_pool").expect("Failed to start pool");

  let panicking = manager
    .submit(|| -> u32 {
      info!("Panicking Task: About to panic!");
      panic!("This task is designed to panic!");
    })
    .expect("Failed to submit panicking task");
  let answer = manager.submit(|| 42u32).expect("Failed to submit follow-up task");

  match panicking.get() {
    Ok(result) => info!("Task {} completed with UNEXPECTED result: {}", panicking.id(), result),
    Err(PoolError::TaskPanicked(message)) => {
      info!("Task {} correctly reported a panic: {}", panicking.id(), message);
    }
    Err(e) => info!("Task {} resulted in unexpected error: {:?}", panicking.id(), e),
  }
  info!("Follow-up task on the same worker returned {:?}", answer.get());

  // Dropping the manager drains the queue and joins the worker.
  drop(manager);
  info!("--- Task Panic Example End ---");
}
