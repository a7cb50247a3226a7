//! Registry of known project parts.
//!
//! The registry owns the authoritative, id-sorted set of
//! [`ProjectPartContainer`]s and classifies incoming batches against it.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::{
  capability::{PrecompiledHeaderStorage, ProjectPartsStorage},
  domain::{
    project_part::{ProjectPartContainer, ProjectPartId, to_project_part_ids},
    sorted,
  },
};

/// Classification of one update batch.
///
/// Each list is sorted by id; together they contain every submitted part once.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct UpToDateProjectParts {
  /// Identical to the registered or persisted version
  pub up_to_date: Vec<ProjectPartContainer>,
  /// New, or changed in a way that invalidates the system PCH
  pub update_system: Vec<ProjectPartContainer>,
  /// Changed in project-only configuration
  pub update_project: Vec<ProjectPartContainer>,
}

impl UpToDateProjectParts {
  /// Every part that needs a PCH rebuild.
  pub fn needs_rebuild(&self) -> Vec<ProjectPartContainer> {
    sorted::union_by(
      self.update_system.clone(),
      self.update_project.clone(),
      ProjectPartContainer::compare_id,
    )
  }
}

pub struct ProjectPartsManager {
  project_parts: Vec<ProjectPartContainer>,
  project_parts_storage: Arc<dyn ProjectPartsStorage>,
  pch_storage: Arc<dyn PrecompiledHeaderStorage>,
}

impl ProjectPartsManager {
  pub fn new(project_parts_storage: Arc<dyn ProjectPartsStorage>, pch_storage: Arc<dyn PrecompiledHeaderStorage>) -> Self {
    Self {
      project_parts: Vec::new(),
      project_parts_storage,
      pch_storage,
    }
  }

  /// Classify `new_parts` and merge them into the registry.
  ///
  /// Parts that still need a rebuild get their indexing time stamps reset,
  /// their project PCH records deleted and their new configuration persisted.
  pub fn update(&mut self, mut new_parts: Vec<ProjectPartContainer>) -> UpToDateProjectParts {
    sorted::sort_unique_by(&mut new_parts, ProjectPartContainer::compare_id);

    let mut result = UpToDateProjectParts::default();
    let mut changed: Vec<(ProjectPartContainer, Option<ProjectPartContainer>)> = Vec::new();

    for mut part in new_parts {
      match self.find(&part.project_part_id) {
        Some(known) if *known == part => {
          part.update_is_deferred = known.update_is_deferred;
          result.up_to_date.push(part);
        }
        known => {
          let known = known.cloned();
          changed.push((part, known));
        }
      }
    }

    let persisted = self.fetch_persisted(&changed);

    for (part, known) in changed {
      let stored = persisted
        .binary_search_by(|stored| stored.project_part_id.cmp(&part.project_part_id))
        .ok()
        .map(|index| &persisted[index]);

      if stored == Some(&part) {
        result.up_to_date.push(part);
        continue;
      }

      match known.as_ref().or(stored) {
        Some(previous) if previous.has_same_system_configuration(&part) => result.update_project.push(part),
        _ => result.update_system.push(part),
      }
    }

    sorted::sort_unique_by(&mut result.up_to_date, ProjectPartContainer::compare_id);

    let needs_rebuild = result.needs_rebuild();
    if !needs_rebuild.is_empty() {
      self.invalidate(&needs_rebuild);
    }

    debug!(
      up_to_date = result.up_to_date.len(),
      update_system = result.update_system.len(),
      update_project = result.update_project.len(),
      "Classified project parts"
    );

    let incoming = sorted::union_by(result.up_to_date.clone(), needs_rebuild, ProjectPartContainer::compare_id);
    let existing = std::mem::take(&mut self.project_parts);
    self.project_parts = sorted::union_by(incoming, existing, ProjectPartContainer::compare_id);

    result
  }

  /// Forget the listed parts. Unknown ids are ignored.
  pub fn remove(&mut self, project_part_ids: &[ProjectPartId]) {
    let ids = sorted_ids(project_part_ids);
    let existing = std::mem::take(&mut self.project_parts);
    self.project_parts = sorted::difference_by(existing, &ids, |part, id| part.project_part_id.cmp(id));
  }

  /// Registered containers for the listed ids, in registry order.
  pub fn projects(&self, project_part_ids: &[ProjectPartId]) -> Vec<ProjectPartContainer> {
    let ids = sorted_ids(project_part_ids);
    sorted::intersection_by(&self.project_parts, &ids, |part, id| part.project_part_id.cmp(id))
  }

  /// Flag the listed parts for a later rebuild.
  pub fn update_deferred(&mut self, project_part_ids: &[ProjectPartId]) {
    for id in project_part_ids {
      if let Some(part) = self.find_mut(id) {
        part.update_is_deferred = true;
      }
    }
  }

  /// Drain every deferred part, clearing the flags.
  pub fn deferred_updates(&mut self) -> Vec<ProjectPartContainer> {
    self
      .project_parts
      .iter_mut()
      .filter(|part| part.update_is_deferred)
      .map(|part| {
        part.update_is_deferred = false;
        part.clone()
      })
      .collect()
  }

  pub fn has_deferred_updates(&self) -> bool {
    self.project_parts.iter().any(|part| part.update_is_deferred)
  }

  pub fn project_parts(&self) -> &[ProjectPartContainer] {
    &self.project_parts
  }

  fn find(&self, id: &ProjectPartId) -> Option<&ProjectPartContainer> {
    self
      .project_parts
      .binary_search_by(|part| part.project_part_id.cmp(id))
      .ok()
      .map(|index| &self.project_parts[index])
  }

  fn find_mut(&mut self, id: &ProjectPartId) -> Option<&mut ProjectPartContainer> {
    self
      .project_parts
      .binary_search_by(|part| part.project_part_id.cmp(id))
      .ok()
      .map(|index| &mut self.project_parts[index])
  }

  fn fetch_persisted(&self, changed: &[(ProjectPartContainer, Option<ProjectPartContainer>)]) -> Vec<ProjectPartContainer> {
    if changed.is_empty() {
      return Vec::new();
    }

    let ids: Vec<ProjectPartId> = changed.iter().map(|(part, _)| part.project_part_id.clone()).collect();
    match self.project_parts_storage.fetch_project_parts(&ids) {
      Ok(mut parts) => {
        sorted::sort_unique_by(&mut parts, ProjectPartContainer::compare_id);
        parts
      }
      Err(e) => {
        warn!(error = %e, "Failed to fetch persisted project parts");
        Vec::new()
      }
    }
  }

  fn invalidate(&self, parts: &[ProjectPartContainer]) {
    if let Err(e) = self.project_parts_storage.reset_indexing_time_stamps(parts) {
      warn!(error = %e, "Failed to reset indexing time stamps");
    }

    if let Err(e) = self
      .pch_storage
      .delete_project_precompiled_headers(&to_project_part_ids(parts))
    {
      warn!(error = %e, "Failed to delete project precompiled headers");
    }

    if let Err(e) = self.project_parts_storage.update_project_parts(parts) {
      warn!(error = %e, "Failed to persist project parts");
    }
  }
}

fn sorted_ids(project_part_ids: &[ProjectPartId]) -> Vec<ProjectPartId> {
  let mut ids = project_part_ids.to_vec();
  sorted::sort_unique(&mut ids);
  ids
}
