//! PCH record and project part storage.
//!
//! [`HeaderCacheStore`] keeps everything in memory behind one mutex and, when
//! opened with a path, writes a JSON snapshot after every mutation. The
//! snapshot is written to a sibling temp file and renamed into place so a
//! crash never leaves a torn file behind.

use std::{
  collections::BTreeMap,
  path::{Path, PathBuf},
  sync::{Mutex, MutexGuard},
};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::StoreError;
use crate::{
  capability::{PrecompiledHeaderStorage, ProjectPartsStorage},
  domain::{
    project_part::{ProjectPartContainer, ProjectPartId},
    sorted,
  },
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct PchRecord {
  pch_path: PathBuf,
  last_modified: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredProjectPart {
  container: ProjectPartContainer,
  /// Seconds since the Unix epoch of the last indexing run, `None` once reset
  indexing_time_stamp: Option<i64>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct HeaderCacheState {
  project_pchs: BTreeMap<ProjectPartId, PchRecord>,
  /// One entry per project part sharing the system PCH
  system_pchs: BTreeMap<ProjectPartId, PchRecord>,
  project_parts: BTreeMap<ProjectPartId, StoredProjectPart>,
}

/// Storage for PCH records and project part configurations.
pub struct HeaderCacheStore {
  state: Mutex<HeaderCacheState>,
  snapshot_path: Option<PathBuf>,
}

impl HeaderCacheStore {
  /// Store without persistence.
  pub fn in_memory() -> Self {
    Self {
      state: Mutex::new(HeaderCacheState::default()),
      snapshot_path: None,
    }
  }

  /// Open the snapshot at `path`, starting empty if it does not exist yet.
  pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
    let path = path.into();

    let state = match std::fs::read(&path) {
      Ok(bytes) => {
        let state: HeaderCacheState = serde_json::from_slice(&bytes)?;
        info!(
          path = %path.display(),
          project_pchs = state.project_pchs.len(),
          system_pchs = state.system_pchs.len(),
          project_parts = state.project_parts.len(),
          "Loaded header cache"
        );
        state
      }
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
        debug!(path = %path.display(), "No header cache snapshot, starting empty");
        HeaderCacheState::default()
      }
      Err(e) => return Err(e.into()),
    };

    Ok(Self {
      state: Mutex::new(state),
      snapshot_path: Some(path),
    })
  }

  /// Last indexing time of a stored project part.
  pub fn indexing_time_stamp(&self, project_part_id: &ProjectPartId) -> Result<Option<i64>, StoreError> {
    let state = self.lock()?;
    Ok(
      state
        .project_parts
        .get(project_part_id)
        .and_then(|stored| stored.indexing_time_stamp),
    )
  }

  /// Record that a project part has been indexed at `time_stamp`.
  pub fn set_indexing_time_stamp(&self, project_part_id: &ProjectPartId, time_stamp: i64) -> Result<(), StoreError> {
    self.mutate(|state| {
      if let Some(stored) = state.project_parts.get_mut(project_part_id) {
        stored.indexing_time_stamp = Some(time_stamp);
      }
    })
  }

  fn lock(&self) -> Result<MutexGuard<'_, HeaderCacheState>, StoreError> {
    self.state.lock().map_err(|_| StoreError::Poisoned)
  }

  /// Apply `change` and persist the result while still holding the lock.
  fn mutate<R>(&self, change: impl FnOnce(&mut HeaderCacheState) -> R) -> Result<R, StoreError> {
    let mut state = self.lock()?;
    let result = change(&mut state);
    self.persist(&state)?;
    Ok(result)
  }

  fn persist(&self, state: &HeaderCacheState) -> Result<(), StoreError> {
    let Some(path) = &self.snapshot_path else {
      return Ok(());
    };

    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)?;
    }

    let bytes = serde_json::to_vec(state)?;
    let tmp_path = path.with_extension("json.tmp");
    std::fs::write(&tmp_path, bytes)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
  }
}

impl PrecompiledHeaderStorage for HeaderCacheStore {
  fn insert_project_precompiled_header(
    &self,
    project_part_id: &ProjectPartId,
    pch_path: &Path,
    last_modified: i64,
  ) -> Result<(), StoreError> {
    self.mutate(|state| {
      state.project_pchs.insert(
        project_part_id.clone(),
        PchRecord {
          pch_path: pch_path.to_path_buf(),
          last_modified,
        },
      );
    })
  }

  fn delete_project_precompiled_header(
    &self,
    project_part_id: &ProjectPartId,
    last_modified: i64,
  ) -> Result<(), StoreError> {
    self.mutate(|state| {
      if state.project_pchs.remove(project_part_id).is_some() {
        debug!(project_part_id = %project_part_id, last_modified, "Deleted project PCH record");
      }
    })
  }

  fn delete_project_precompiled_headers(&self, project_part_ids: &[ProjectPartId]) -> Result<(), StoreError> {
    self.mutate(|state| {
      for id in project_part_ids {
        state.project_pchs.remove(id);
      }
    })
  }

  fn insert_system_precompiled_headers(
    &self,
    project_part_ids: &[ProjectPartId],
    pch_path: &Path,
    last_modified: i64,
  ) -> Result<(), StoreError> {
    self.mutate(|state| {
      for id in project_part_ids {
        state.system_pchs.insert(
          id.clone(),
          PchRecord {
            pch_path: pch_path.to_path_buf(),
            last_modified,
          },
        );
      }
    })
  }

  fn delete_system_precompiled_headers(&self, project_part_ids: &[ProjectPartId]) -> Result<(), StoreError> {
    self.mutate(|state| {
      for id in project_part_ids {
        state.system_pchs.remove(id);
      }
    })
  }

  fn fetch_system_precompiled_header_path(
    &self,
    project_part_id: &ProjectPartId,
  ) -> Result<Option<PathBuf>, StoreError> {
    let state = self.lock()?;
    Ok(state.system_pchs.get(project_part_id).map(|record| record.pch_path.clone()))
  }

  fn fetch_all_pch_paths(&self) -> Result<Vec<PathBuf>, StoreError> {
    let state = self.lock()?;
    let mut paths: Vec<PathBuf> = state
      .project_pchs
      .values()
      .chain(state.system_pchs.values())
      .map(|record| record.pch_path.clone())
      .collect();
    sorted::sort_unique(&mut paths);
    Ok(paths)
  }
}

impl ProjectPartsStorage for HeaderCacheStore {
  fn fetch_project_parts(&self, project_part_ids: &[ProjectPartId]) -> Result<Vec<ProjectPartContainer>, StoreError> {
    let state = self.lock()?;
    let mut parts: Vec<ProjectPartContainer> = project_part_ids
      .iter()
      .filter_map(|id| state.project_parts.get(id))
      .map(|stored| stored.container.clone())
      .collect();
    sorted::sort_unique_by(&mut parts, ProjectPartContainer::compare_id);
    Ok(parts)
  }

  fn update_project_parts(&self, project_parts: &[ProjectPartContainer]) -> Result<(), StoreError> {
    self.mutate(|state| {
      for part in project_parts {
        let mut container = part.clone();
        container.update_is_deferred = false;

        let indexing_time_stamp = state
          .project_parts
          .get(&part.project_part_id)
          .and_then(|stored| stored.indexing_time_stamp);

        state.project_parts.insert(
          part.project_part_id.clone(),
          StoredProjectPart {
            container,
            indexing_time_stamp,
          },
        );
      }
    })
  }

  fn reset_indexing_time_stamps(&self, project_parts: &[ProjectPartContainer]) -> Result<(), StoreError> {
    self.mutate(|state| {
      for part in project_parts {
        if let Some(stored) = state.project_parts.get_mut(&part.project_part_id) {
          stored.indexing_time_stamp = None;
        }
      }
    })
  }
}
