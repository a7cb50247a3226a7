use std::fmt;

use serde::{Deserialize, Serialize};

/// Interned identifier of a file path.
///
/// Ids are handed out by a [`FilePathCache`](crate::capability::FilePathCache)
/// and are only meaningful within the cache that produced them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilePathId(u32);

impl FilePathId {
  pub fn new(id: u32) -> Self {
    Self(id)
  }

  pub fn value(self) -> u32 {
    self.0
  }
}

impl fmt::Display for FilePathId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// Sorted, unique list of file path ids.
pub type FilePathIds = Vec<FilePathId>;
