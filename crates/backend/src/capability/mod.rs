//! Collaborator capabilities consumed by the scheduling core.
//!
//! Each external concern (compiling a PCH, persisting results, the file
//! system, path interning, dependency discovery, file watching, generated
//! files) is a trait injected at construction time. Concrete implementations
//! live in [`crate::store`] and [`crate::actor::watcher`]; tests substitute
//! doubles.
//!
//! Every trait except [`PchCreator`] and [`GeneratedFiles`] is `Send + Sync`:
//! worker slots call them concurrently, so implementations bring their own
//! locking.

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use crate::{
  domain::{
    dependency::{BuildDependency, IdPaths, ProjectChunkId},
    file_path::{FilePathId, FilePathIds},
    pch::{PchTask, PchTaskKind, ProjectPartPch, SlotUsage},
    project_part::{ProjectPartContainer, ProjectPartId, ProjectPartIds},
  },
  store::{StoreError, generated_files::GeneratedFile},
};

// ============================================================================
// PCH Creation
// ============================================================================

/// Builds one precompiled header at a time.
///
/// A creator is owned by exactly one worker slot while a task runs, so it may
/// keep per-build state between `generate_pch` and `project_part_pch`.
pub trait PchCreator: Send {
  /// Build the PCH for `task`. Failures are reported through
  /// [`project_part_pch`](Self::project_part_pch), never by panicking.
  fn generate_pch(&mut self, task: PchTask);

  /// Result of the last `generate_pch` call.
  fn project_part_pch(&self) -> ProjectPartPch;

  /// Reset per-build state before the creator is handed to the next task.
  fn clear(&mut self) {}
}

/// Produces creators for worker slots.
pub trait PchCreatorFactory: Send + Sync {
  fn create(&self) -> Box<dyn PchCreator>;
}

// ============================================================================
// Scheduling
// ============================================================================

/// Work run on a worker slot with the slot's creator.
pub type PchJob = Box<dyn FnOnce(&mut dyn PchCreator) -> ProjectPartPch + Send>;

/// A dispatched PCH build.
pub struct SchedulerTask {
  pub kind: PchTaskKind,
  pub project_part_ids: ProjectPartIds,
  pub job: PchJob,
}

/// Bounded pool of worker slots.
///
/// Callers must never add more tasks than [`SlotUsage::free`] reports.
pub trait TaskScheduling: Send {
  fn slot_usage(&self) -> SlotUsage;

  fn add_tasks(&mut self, tasks: Vec<SchedulerTask>);
}

// ============================================================================
// Storage
// ============================================================================

/// Persistent PCH records.
///
/// Project PCHs are keyed by one project part id, system PCHs by the set of
/// ids sharing them; deletion is keyed the same way as insertion.
pub trait PrecompiledHeaderStorage: Send + Sync {
  fn insert_project_precompiled_header(
    &self,
    project_part_id: &ProjectPartId,
    pch_path: &Path,
    last_modified: i64,
  ) -> Result<(), StoreError>;

  fn delete_project_precompiled_header(
    &self,
    project_part_id: &ProjectPartId,
    last_modified: i64,
  ) -> Result<(), StoreError>;

  fn delete_project_precompiled_headers(&self, project_part_ids: &[ProjectPartId]) -> Result<(), StoreError>;

  fn insert_system_precompiled_headers(
    &self,
    project_part_ids: &[ProjectPartId],
    pch_path: &Path,
    last_modified: i64,
  ) -> Result<(), StoreError>;

  fn delete_system_precompiled_headers(&self, project_part_ids: &[ProjectPartId]) -> Result<(), StoreError>;

  fn fetch_system_precompiled_header_path(
    &self,
    project_part_id: &ProjectPartId,
  ) -> Result<Option<PathBuf>, StoreError>;

  /// Every PCH path a stored record still references.
  fn fetch_all_pch_paths(&self) -> Result<Vec<PathBuf>, StoreError>;
}

/// Persistent project part configurations.
pub trait ProjectPartsStorage: Send + Sync {
  /// Stored containers for `project_part_ids`, sorted by id. Unknown ids are skipped.
  fn fetch_project_parts(&self, project_part_ids: &[ProjectPartId]) -> Result<Vec<ProjectPartContainer>, StoreError>;

  fn update_project_parts(&self, project_parts: &[ProjectPartContainer]) -> Result<(), StoreError>;

  /// Forget when the parts were last indexed so they are indexed again.
  fn reset_indexing_time_stamps(&self, project_parts: &[ProjectPartContainer]) -> Result<(), StoreError>;
}

// ============================================================================
// File System
// ============================================================================

pub trait FileSystem: Send + Sync {
  /// Ids of the regular files directly inside `directory`, sorted.
  fn directory_entries(&self, directory: &Path) -> FilePathIds;

  /// Delete the files behind `file_path_ids`. Missing files are skipped.
  fn remove(&self, file_path_ids: &[FilePathId]);
}

/// Interns file paths as [`FilePathId`]s.
pub trait FilePathCache: Send + Sync {
  /// Id for `path`, interning it on first use.
  fn file_path_id(&self, path: &Path) -> FilePathId;

  /// Id for `path` only if it was interned before.
  fn find_file_path_id(&self, path: &Path) -> Option<FilePathId>;

  fn file_path(&self, file_path_id: FilePathId) -> Option<PathBuf>;

  /// Ids for `paths`, sorted and deduplicated.
  fn file_path_ids(&self, paths: &[PathBuf]) -> FilePathIds {
    let mut ids: FilePathIds = paths.iter().map(|path| self.file_path_id(path)).collect();
    crate::domain::sorted::sort_unique(&mut ids);
    ids
  }
}

// ============================================================================
// Dependencies and Watching
// ============================================================================

/// Discovers which files a project part transitively includes.
pub trait BuildDependenciesProvider: Send + Sync {
  fn create(&self, project_part: &ProjectPartContainer) -> BuildDependency;
}

/// Receives change notifications from a [`PathWatcher`].
pub trait PathWatcherNotifier: Send + Sync {
  fn paths_with_ids_changed(&self, ids: Vec<ProjectChunkId>);

  fn paths_changed(&self, _file_path_ids: FilePathIds) {}
}

/// Watches dependency files on behalf of project parts.
pub trait PathWatcher: Send + Sync {
  /// Replace the watched files of each listed chunk.
  fn update_id_paths(&self, id_paths: Vec<IdPaths>);

  /// Stop watching every chunk of the listed project parts.
  fn remove_ids(&self, project_part_ids: &[ProjectPartId]);

  fn set_notifier(&self, notifier: Arc<dyn PathWatcherNotifier>);
}

// ============================================================================
// Generated Files
// ============================================================================

/// Files produced by the build system (e.g. moc or uic output) that project
/// parts may include before they exist on disk.
pub trait GeneratedFiles: Send {
  fn update(&mut self, files: Vec<GeneratedFile>);

  fn remove(&mut self, paths: &[PathBuf]);

  /// True once every announced file has content.
  fn is_valid(&self) -> bool;

  fn files(&self) -> &[GeneratedFile];
}
