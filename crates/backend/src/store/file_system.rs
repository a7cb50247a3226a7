use std::{path::Path, sync::Arc};

use tracing::{debug, warn};

use crate::{
  capability::{FilePathCache, FileSystem},
  domain::{
    file_path::{FilePathId, FilePathIds},
    sorted,
  },
};

/// Local disk access for the PCH build directory.
pub struct LocalFileSystem {
  file_path_cache: Arc<dyn FilePathCache>,
}

impl LocalFileSystem {
  pub fn new(file_path_cache: Arc<dyn FilePathCache>) -> Self {
    Self { file_path_cache }
  }
}

impl FileSystem for LocalFileSystem {
  fn directory_entries(&self, directory: &Path) -> FilePathIds {
    let entries = match std::fs::read_dir(directory) {
      Ok(entries) => entries,
      Err(e) => {
        debug!(directory = %directory.display(), error = %e, "Cannot list directory");
        return FilePathIds::new();
      }
    };

    let mut ids: FilePathIds = entries
      .flatten()
      .filter(|entry| entry.file_type().map(|kind| kind.is_file()).unwrap_or(false))
      .map(|entry| self.file_path_cache.file_path_id(&entry.path()))
      .collect();

    sorted::sort_unique(&mut ids);
    ids
  }

  fn remove(&self, file_path_ids: &[FilePathId]) {
    for &id in file_path_ids {
      let Some(path) = self.file_path_cache.file_path(id) else {
        warn!(file_path_id = %id, "Unknown file path id, cannot remove");
        continue;
      };

      match std::fs::remove_file(&path) {
        Ok(()) => debug!(path = %path.display(), "Removed file"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove file"),
      }
    }
  }
}
