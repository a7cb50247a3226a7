use std::{
  path::{Path, PathBuf},
  sync::atomic::{AtomicU32, Ordering},
};

use dashmap::{DashMap, mapref::entry::Entry};

use crate::{capability::FilePathCache, domain::file_path::FilePathId};

/// In-memory path interner shared by the file system, the queue and the watcher.
///
/// Uses `DashMap` for both directions so worker slots can intern paths without
/// a global lock. Paths are stored as given, without canonicalization, because
/// PCH files may already be gone when they are looked up.
#[derive(Debug, Default)]
pub struct MemoryFilePathCache {
  ids: DashMap<PathBuf, FilePathId>,
  paths: DashMap<FilePathId, PathBuf>,
  next_id: AtomicU32,
}

impl MemoryFilePathCache {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn len(&self) -> usize {
    self.ids.len()
  }

  pub fn is_empty(&self) -> bool {
    self.ids.is_empty()
  }
}

impl FilePathCache for MemoryFilePathCache {
  fn file_path_id(&self, path: &Path) -> FilePathId {
    if let Some(id) = self.ids.get(path) {
      return *id.value();
    }

    // Entry API so concurrent interning of the same path yields one id
    match self.ids.entry(path.to_path_buf()) {
      Entry::Occupied(existing) => *existing.get(),
      Entry::Vacant(vacant) => {
        let id = FilePathId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.paths.insert(id, path.to_path_buf());
        vacant.insert(id);
        id
      }
    }
  }

  fn find_file_path_id(&self, path: &Path) -> Option<FilePathId> {
    self.ids.get(path).map(|id| *id.value())
  }

  fn file_path(&self, file_path_id: FilePathId) -> Option<PathBuf> {
    self.paths.get(&file_path_id).map(|path| path.value().clone())
  }
}
