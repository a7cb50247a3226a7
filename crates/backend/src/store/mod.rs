//! Concrete collaborator implementations.
//!
//! - [`MemoryFilePathCache`]: lock-free path interner
//! - [`LocalFileSystem`]: PCH directory listing and removal on the local disk
//! - [`HeaderCacheStore`]: PCH records and project parts, optionally persisted
//!   as a JSON snapshot
//! - [`GeneratedFileSet`]: sorted set of generated files

pub mod file_path_cache;
pub mod file_system;
pub mod generated_files;
pub mod header_cache;

pub use file_path_cache::MemoryFilePathCache;
pub use file_system::LocalFileSystem;
pub use generated_files::{GeneratedFile, GeneratedFileSet};
pub use header_cache::HeaderCacheStore;

/// Errors raised by storage collaborators
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
  #[error("IO error: {0}")]
  Io(#[from] std::io::Error),
  #[error("Serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
  #[error("Store lock poisoned")]
  Poisoned,
}
