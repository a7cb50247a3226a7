//! Actor layer
//!
//! - [`PchManagerActor`]: the dispatch facade, single writer of the registry
//!   and the task queue
//! - [`TaskScheduler`]: bounded pool of worker slots running PCH builds
//! - [`NotifyPathWatcher`]: file watcher feeding dependency changes back to the
//!   actor through its [`PchManagerHandle`]
//!
//! Components talk over `mpsc` channels; the actor owns its state.

pub mod handle;
pub mod message;
pub mod scheduler;
pub mod server;
pub mod watcher;

#[cfg(test)]
mod __tests__;

pub use handle::{PchManagerHandle, SendError};
pub use message::{PchManagerEvent, PchManagerMessage, PchManagerStatus};
pub use scheduler::TaskScheduler;
pub use server::{PchManagerActor, PchManagerActorConfig};
pub use watcher::{NotifyPathWatcher, WatcherError};
