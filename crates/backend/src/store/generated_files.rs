use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::{capability::GeneratedFiles, domain::sorted};

/// A build-system generated file, keyed by path.
///
/// `content` stays `None` until the generator has produced the file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedFile {
  pub path: PathBuf,
  pub content: Option<String>,
}

impl GeneratedFile {
  pub fn new(path: impl Into<PathBuf>, content: Option<String>) -> Self {
    Self {
      path: path.into(),
      content,
    }
  }
}

/// Generated files sorted by path.
#[derive(Debug, Default)]
pub struct GeneratedFileSet {
  files: Vec<GeneratedFile>,
}

impl GeneratedFileSet {
  pub fn new() -> Self {
    Self::default()
  }
}

impl GeneratedFiles for GeneratedFileSet {
  fn update(&mut self, mut files: Vec<GeneratedFile>) {
    sorted::sort_unique_by(&mut files, |a, b| a.path.cmp(&b.path));
    let existing = std::mem::take(&mut self.files);
    self.files = sorted::union_by(files, existing, |a, b| a.path.cmp(&b.path));
  }

  fn remove(&mut self, paths: &[PathBuf]) {
    let mut paths = paths.to_vec();
    sorted::sort_unique(&mut paths);
    let existing = std::mem::take(&mut self.files);
    self.files = sorted::difference_by(existing, &paths, |file, path| file.path.cmp(path));
  }

  fn is_valid(&self) -> bool {
    self.files.iter().all(|file| file.content.is_some())
  }

  fn files(&self) -> &[GeneratedFile] {
    &self.files
  }
}
