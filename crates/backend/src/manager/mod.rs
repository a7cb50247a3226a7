//! Scheduling core: the project part registry, task generation and the
//! two-tier PCH task queue.

pub mod progress;
pub mod project_parts;
pub mod task_generator;
pub mod task_queue;
pub mod tasks_merger;
pub mod toolchain_cache;

pub use progress::{ProgressCounter, ProgressReporter};
pub use project_parts::{ProjectPartsManager, UpToDateProjectParts};
pub use task_generator::PchTaskGenerator;
pub use task_queue::{DispatchCounts, PchTaskQueue, QueueContext};
pub use toolchain_cache::{ArgumentsEntry, ToolChainArgumentsCache};
