use std::thread;
use std::time::Duration;
use thread_orchestra::{ResultHandle, ThreadPoolManager};
use tracing::info;

fn square(x: i64) -> i64 {
  x * x
}

fn slow_label(id: usize, delay_ms: u64) -> String {
  info!("Task {} starting, will sleep for {}ms", id, delay_ms);
  thread::sleep(Duration::from_millis(delay_ms));
  format!("Task {} finished successfully after {}ms", id, delay_ms)
}

fn main() {
  tracing_subscriber::fmt()
    .with_max_level(tracing::Level::DEBUG)
    .with_target(false) // Disable module paths for cleaner example output
    .init();

  info!("--- Basic Usage Example ---");

  let manager = ThreadPoolManager::new(4, "basic_pool").expect("Failed to start pool");

  let squared = manager.submit_with(square, 7).expect("Failed to submit square task");
  let greeting = manager
    .submit_with(|s: String| s + " world", "hello".to_string())
    .expect("Failed to submit concat task");

  let mut handles: Vec<ResultHandle<String>> = Vec::new();
  for i in 0..5 {
    let delay_ms = 200 + (i as u64 % 3 * 100);
    match manager.submit(move || slow_label(i, delay_ms)) {
      Ok(handle) => {
        info!("Submitted task {} with handle id {}", i, handle.id());
        handles.push(handle);
      }
      Err(e) => tracing::error!("Failed to submit task {}: {:?}", i, e),
    }
  }

  match squared.get() {
    Ok(value) => info!("7*7 = {}", value),
    Err(e) => info!("Square task failed: {}", e),
  }
  match greeting.get() {
    Ok(value) => info!("{}", value),
    Err(e) => info!("Concat task failed: {}", e),
  }

  for handle in handles {
    match handle.get() {
      Ok(result) => info!("Result for task {}: {}", handle.id(), result),
      Err(e) => info!("Error for task {}: {:?}", handle.id(), e),
    }
  }

  info!("All task results processed. Shutting down pool.");
  manager.shutdown();
  info!("--- Basic Usage Example End ---");
}
