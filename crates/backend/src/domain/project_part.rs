//! Project parts - one compilation unit's build configuration.

use std::{cmp::Ordering, collections::BTreeMap, fmt, path::PathBuf};

use serde::{Deserialize, Serialize};

use super::file_path::FilePathIds;

/// Identity of a project part.
///
/// Opaque and totally ordered; it is the only sort key used by the registry
/// and the task queue.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectPartId(String);

impl ProjectPartId {
  pub fn new(id: impl Into<String>) -> Self {
    Self(id.into())
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for ProjectPartId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl From<&str> for ProjectPartId {
  fn from(id: &str) -> Self {
    Self::new(id)
  }
}

impl From<String> for ProjectPartId {
  fn from(id: String) -> Self {
    Self(id)
  }
}

/// Sorted, unique list of project part ids.
pub type ProjectPartIds = Vec<ProjectPartId>;

/// Compiler macro name to value.
pub type CompilerMacros = BTreeMap<String, String>;

/// Source language of a project part
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Language {
  C,
  #[default]
  Cxx,
}

/// Build configuration of one compilation unit.
///
/// Equality covers every configuration field but not `update_is_deferred`,
/// which is scheduling state owned by the registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectPartContainer {
  pub project_part_id: ProjectPartId,
  /// Compiler arguments specific to this part, in command line order
  pub compiler_arguments: Vec<String>,
  pub compiler_macros: CompilerMacros,
  pub system_include_search_paths: Vec<PathBuf>,
  pub project_include_search_paths: Vec<PathBuf>,
  pub header_path_ids: FilePathIds,
  pub source_path_ids: FilePathIds,
  pub language: Language,
  /// Language standard, e.g. `c++17`
  pub language_version: String,
  #[serde(skip)]
  pub update_is_deferred: bool,
}

impl ProjectPartContainer {
  pub fn new(project_part_id: impl Into<ProjectPartId>) -> Self {
    Self {
      project_part_id: project_part_id.into(),
      compiler_arguments: Vec::new(),
      compiler_macros: CompilerMacros::new(),
      system_include_search_paths: Vec::new(),
      project_include_search_paths: Vec::new(),
      header_path_ids: Vec::new(),
      source_path_ids: Vec::new(),
      language: Language::default(),
      language_version: String::new(),
      update_is_deferred: false,
    }
  }

  pub fn with_arguments<I, S>(mut self, arguments: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.compiler_arguments = arguments.into_iter().map(Into::into).collect();
    self
  }

  pub fn with_macro(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
    self.compiler_macros.insert(name.into(), value.into());
    self
  }

  pub fn with_system_include_search_paths<I: IntoIterator<Item = PathBuf>>(mut self, paths: I) -> Self {
    self.system_include_search_paths = paths.into_iter().collect();
    self
  }

  pub fn with_project_include_search_paths<I: IntoIterator<Item = PathBuf>>(mut self, paths: I) -> Self {
    self.project_include_search_paths = paths.into_iter().collect();
    self
  }

  pub fn with_header_path_ids(mut self, mut ids: FilePathIds) -> Self {
    super::sorted::sort_unique(&mut ids);
    self.header_path_ids = ids;
    self
  }

  pub fn with_source_path_ids(mut self, mut ids: FilePathIds) -> Self {
    super::sorted::sort_unique(&mut ids);
    self.source_path_ids = ids;
    self
  }

  pub fn with_language(mut self, language: Language, version: impl Into<String>) -> Self {
    self.language = language;
    self.language_version = version.into();
    self
  }

  /// Whether both parts would produce the same system PCH.
  ///
  /// Only project include paths and the header/source sets may differ.
  pub fn has_same_system_configuration(&self, other: &Self) -> bool {
    self.compiler_arguments == other.compiler_arguments
      && self.compiler_macros == other.compiler_macros
      && self.system_include_search_paths == other.system_include_search_paths
      && self.language == other.language
      && self.language_version == other.language_version
  }

  /// Order by identity only.
  pub fn compare_id(first: &Self, second: &Self) -> Ordering {
    first.project_part_id.cmp(&second.project_part_id)
  }
}

impl PartialEq for ProjectPartContainer {
  fn eq(&self, other: &Self) -> bool {
    self.project_part_id == other.project_part_id
      && self.has_same_system_configuration(other)
      && self.project_include_search_paths == other.project_include_search_paths
      && self.header_path_ids == other.header_path_ids
      && self.source_path_ids == other.source_path_ids
  }
}

impl Eq for ProjectPartContainer {}

/// Ids of a sorted container sequence, in the same order.
pub fn to_project_part_ids(project_parts: &[ProjectPartContainer]) -> ProjectPartIds {
  project_parts.iter().map(|part| part.project_part_id.clone()).collect()
}
