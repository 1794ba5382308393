//! A fixed-size pool of OS threads that executes submitted closures from a
//! shared FIFO queue and hands each outcome back through a write-once,
//! many-reader result handle.

mod error;
mod handle;
mod manager;
mod task;
mod task_queue;

pub use error::PoolError;
pub use handle::ResultHandle;
pub use manager::ThreadPoolManager;
pub use task::TaskId;
