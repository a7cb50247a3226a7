//! Precompiled header tasks and their results.

use std::{cmp::Ordering, path::PathBuf};

use serde::{Deserialize, Serialize};

use super::{
  file_path::FilePathIds,
  project_part::{CompilerMacros, Language, ProjectPartContainer, ProjectPartId, ProjectPartIds},
};

/// Which of the two task streams a task belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PchTaskKind {
  /// Shared PCH built from system headers, keyed by a set of project parts
  System,
  /// Per project part PCH built on top of the system PCH
  Project,
}

/// Unit of work for compiling one precompiled header.
///
/// System tasks carry every project part id that shares the header; project
/// tasks carry exactly one. Collections of tasks are sorted by
/// `project_part_ids`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PchTask {
  pub project_part_ids: ProjectPartIds,
  /// Headers compiled into the PCH
  pub includes: FilePathIds,
  pub sources: FilePathIds,
  pub compiler_macros: CompilerMacros,
  pub system_include_search_paths: Vec<PathBuf>,
  pub project_include_search_paths: Vec<PathBuf>,
  /// Tool chain level arguments shared by every part of one update
  pub tool_chain_arguments: Vec<String>,
  pub compiler_arguments: Vec<String>,
  pub language: Language,
  pub language_version: String,
  /// System PCH the project PCH builds on, resolved just before dispatch
  pub system_pch_path: Option<PathBuf>,
  pub pre_include_search_path: Option<PathBuf>,
}

impl PchTask {
  /// Create a task for `project_part` with its configuration copied over.
  pub fn from_project_part(project_part: &ProjectPartContainer, tool_chain_arguments: &[String]) -> Self {
    Self {
      project_part_ids: vec![project_part.project_part_id.clone()],
      includes: Vec::new(),
      sources: Vec::new(),
      compiler_macros: project_part.compiler_macros.clone(),
      system_include_search_paths: project_part.system_include_search_paths.clone(),
      project_include_search_paths: project_part.project_include_search_paths.clone(),
      tool_chain_arguments: tool_chain_arguments.to_vec(),
      compiler_arguments: project_part.compiler_arguments.clone(),
      language: project_part.language,
      language_version: project_part.language_version.clone(),
      system_pch_path: None,
      pre_include_search_path: None,
    }
  }

  /// The identifying project part of a project task.
  pub fn project_part_id(&self) -> Option<&ProjectPartId> {
    self.project_part_ids.first()
  }

  /// Order by identity key.
  pub fn compare_ids(first: &Self, second: &Self) -> Ordering {
    first.project_part_ids.cmp(&second.project_part_ids)
  }
}

/// Tasks generated for one project part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PchTaskSet {
  /// Absent when the part includes no system headers
  pub system: Option<PchTask>,
  pub project: PchTask,
}

/// Result of one PCH build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectPartPch {
  pub project_part_ids: ProjectPartIds,
  /// `None` when the build failed or was skipped; the stored record is deleted
  pub pch_path: Option<PathBuf>,
  /// Modification time of the PCH in seconds since the Unix epoch
  pub last_modified: i64,
}

impl ProjectPartPch {
  pub fn built(project_part_ids: ProjectPartIds, pch_path: impl Into<PathBuf>, last_modified: i64) -> Self {
    Self {
      project_part_ids,
      pch_path: Some(pch_path.into()),
      last_modified,
    }
  }

  pub fn failed(project_part_ids: ProjectPartIds) -> Self {
    Self {
      project_part_ids,
      pch_path: None,
      last_modified: 0,
    }
  }
}

/// Result of a dispatched task as seen by the control loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskOutcome {
  pub kind: PchTaskKind,
  pub project_part_ids: ProjectPartIds,
  /// `None` when no PCH was produced
  pub pch_path: Option<PathBuf>,
}

impl TaskOutcome {
  pub fn is_built(&self) -> bool {
    self.pch_path.is_some()
  }
}

/// Free and occupied worker slots of one scheduler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SlotUsage {
  pub free: usize,
  pub used: usize,
}
