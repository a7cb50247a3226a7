//! Precompiled header scheduling engine.
//!
//! Tracks the project parts (compilation units) of a C/C++ project, decides
//! which of them need their precompiled headers rebuilt, and drives the
//! rebuilds through two bounded worker pools: shared system PCHs first,
//! per-part project PCHs after. PCH files nothing references any more are
//! removed whenever the engine is idle.
//!
//! Start with [`PchManager::spawn`] and talk to it through its
//! [`PchManagerHandle`](actor::PchManagerHandle).

pub mod actor;
pub mod capability;
pub mod dirs;
pub mod manager;
pub mod store;

mod domain;
pub use domain::{config, dependency, file_path, pch, project_part, sorted};

mod runtime;
pub use runtime::{Collaborators, PchManager, PchManagerError};

#[cfg(test)]
mod testing;
