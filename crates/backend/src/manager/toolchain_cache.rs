use crate::domain::{
  project_part::{ProjectPartContainer, ProjectPartId, ProjectPartIds, to_project_part_ids},
  sorted,
};

/// Project parts submitted with the same tool chain arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgumentsEntry {
  pub ids: ProjectPartIds,
  pub arguments: Vec<String>,
}

/// Remembers the tool chain arguments each project part was last submitted
/// with, so tasks can be regenerated without the original update message.
#[derive(Debug, Default)]
pub struct ToolChainArgumentsCache {
  entries: Vec<ArgumentsEntry>,
}

impl ToolChainArgumentsCache {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn update(&mut self, project_parts: &[ProjectPartContainer], arguments: Vec<String>) {
    let mut ids = to_project_part_ids(project_parts);
    sorted::sort_unique(&mut ids);
    self.remove(&ids);

    if ids.is_empty() {
      return;
    }

    match self.entries.iter().position(|entry| entry.arguments == arguments) {
      Some(index) => {
        let entry = &mut self.entries[index];
        entry.ids = sorted::union(&ids, &entry.ids);
      }
      None => self.entries.push(ArgumentsEntry { ids, arguments }),
    }
  }

  pub fn remove(&mut self, project_part_ids: &[ProjectPartId]) {
    let mut ids = project_part_ids.to_vec();
    sorted::sort_unique(&mut ids);

    for entry in &mut self.entries {
      entry.ids = sorted::difference(&entry.ids, &ids);
    }
    self.entries.retain(|entry| !entry.ids.is_empty());
  }

  /// Entries restricted to `project_part_ids`; ids never submitted are absent.
  pub fn arguments(&self, project_part_ids: &[ProjectPartId]) -> Vec<ArgumentsEntry> {
    let mut ids = project_part_ids.to_vec();
    sorted::sort_unique(&mut ids);

    self
      .entries
      .iter()
      .filter_map(|entry| {
        let matching = sorted::intersection(&entry.ids, &ids);
        (!matching.is_empty()).then(|| ArgumentsEntry {
          ids: matching,
          arguments: entry.arguments.clone(),
        })
      })
      .collect()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }
}
