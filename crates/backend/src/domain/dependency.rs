//! Build dependency types produced by a
//! [`BuildDependenciesProvider`](crate::capability::BuildDependenciesProvider)
//! and consumed by the task generator and the path watcher.

use serde::{Deserialize, Serialize};

use super::{
  file_path::{FilePathId, FilePathIds},
  project_part::ProjectPartId,
};

/// How a file participates in a project part's build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
  /// Project header included directly by a source file
  TopProjectInclude,
  /// System header included directly by a source file
  TopSystemInclude,
  /// Header reached through a user include path
  UserInclude,
  /// Project header reached transitively
  ProjectInclude,
  /// System header reached transitively
  SystemInclude,
  /// Translation unit source file
  Source,
}

impl SourceType {
  /// Changes to system headers invalidate the system PCH as well.
  pub fn is_system(self) -> bool {
    matches!(self, Self::TopSystemInclude | Self::SystemInclude)
  }
}

/// One file a project part depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SourceEntry {
  pub source_path_id: FilePathId,
  pub source_type: SourceType,
}

impl SourceEntry {
  pub fn new(source_path_id: FilePathId, source_type: SourceType) -> Self {
    Self {
      source_path_id,
      source_type,
    }
  }
}

/// Transitive include information for one project part.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildDependency {
  pub includes: Vec<SourceEntry>,
  pub sources: FilePathIds,
}

/// A project part id together with the category of file that changed for it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProjectChunkId {
  pub id: ProjectPartId,
  pub source_type: SourceType,
}

impl ProjectChunkId {
  pub fn new(id: ProjectPartId, source_type: SourceType) -> Self {
    Self { id, source_type }
  }
}

/// Files watched on behalf of one project part chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdPaths {
  pub id: ProjectPartId,
  pub source_type: SourceType,
  pub file_path_ids: FilePathIds,
}

impl IdPaths {
  pub fn new(id: ProjectPartId, source_type: SourceType, file_path_ids: FilePathIds) -> Self {
    Self {
      id,
      source_type,
      file_path_ids,
    }
  }

  pub fn chunk_id(&self) -> ProjectChunkId {
    ProjectChunkId::new(self.id.clone(), self.source_type)
  }
}
