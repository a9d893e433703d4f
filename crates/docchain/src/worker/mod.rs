pub mod pool;
pub mod queue;
mod registry;
pub mod stats;
pub mod task;

pub use pool::{PoolConfig, WorkerPool};
pub use stats::PoolStats;
pub use task::{ProcessingTask, TaskResult, TaskStatus};
