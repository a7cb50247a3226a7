//! Turns project parts into PCH tasks.
//!
//! Dependencies come from the [`BuildDependenciesProvider`]. Directly included
//! system headers feed the system task, directly included project headers and
//! the sources feed the project task. Every dependency file is registered
//! with the [`PathWatcher`] so changes trigger a rebuild.

use std::sync::Arc;

use tracing::trace;

use crate::{
  capability::{BuildDependenciesProvider, PathWatcher},
  domain::{
    dependency::{BuildDependency, IdPaths, SourceType},
    file_path::FilePathIds,
    pch::{PchTask, PchTaskSet},
    project_part::ProjectPartContainer,
    sorted,
  },
};

pub struct PchTaskGenerator {
  build_dependencies: Arc<dyn BuildDependenciesProvider>,
  path_watcher: Arc<dyn PathWatcher>,
}

impl PchTaskGenerator {
  pub fn new(build_dependencies: Arc<dyn BuildDependenciesProvider>, path_watcher: Arc<dyn PathWatcher>) -> Self {
    Self {
      build_dependencies,
      path_watcher,
    }
  }

  /// System and project tasks for each part.
  pub fn create_task_sets(
    &self,
    project_parts: &[ProjectPartContainer],
    tool_chain_arguments: &[String],
  ) -> Vec<PchTaskSet> {
    let mut id_paths = Vec::new();

    let task_sets: Vec<PchTaskSet> = project_parts
      .iter()
      .map(|part| {
        let dependency = self.build_dependencies.create(part);
        id_paths.extend(watched_paths(part, &dependency));

        let system_includes = includes_of(&dependency, SourceType::TopSystemInclude);
        let system = (!system_includes.is_empty()).then(|| {
          let mut task = PchTask::from_project_part(part, tool_chain_arguments);
          task.includes = system_includes;
          task
        });

        PchTaskSet {
          system,
          project: project_task(part, &dependency, tool_chain_arguments),
        }
      })
      .collect();

    self.path_watcher.update_id_paths(id_paths);
    task_sets
  }

  /// Project tasks only, for parts whose system PCH is still valid.
  pub fn create_project_tasks(
    &self,
    project_parts: &[ProjectPartContainer],
    tool_chain_arguments: &[String],
  ) -> Vec<PchTask> {
    let mut id_paths = Vec::new();

    let tasks: Vec<PchTask> = project_parts
      .iter()
      .map(|part| {
        let dependency = self.build_dependencies.create(part);
        id_paths.extend(watched_paths(part, &dependency));
        project_task(part, &dependency, tool_chain_arguments)
      })
      .collect();

    self.path_watcher.update_id_paths(id_paths);
    tasks
  }
}

fn project_task(part: &ProjectPartContainer, dependency: &BuildDependency, tool_chain_arguments: &[String]) -> PchTask {
  let mut task = PchTask::from_project_part(part, tool_chain_arguments);
  task.includes = includes_of(dependency, SourceType::TopProjectInclude);
  task.sources = sorted_ids(dependency.sources.clone());
  task
}

fn includes_of(dependency: &BuildDependency, source_type: SourceType) -> FilePathIds {
  sorted_ids(
    dependency
      .includes
      .iter()
      .filter(|entry| entry.source_type == source_type)
      .map(|entry| entry.source_path_id)
      .collect(),
  )
}

/// One watched chunk per dependency category.
fn watched_paths(part: &ProjectPartContainer, dependency: &BuildDependency) -> Vec<IdPaths> {
  let mut system = Vec::new();
  let mut project = Vec::new();

  for entry in &dependency.includes {
    if entry.source_type.is_system() {
      system.push(entry.source_path_id);
    } else {
      project.push(entry.source_path_id);
    }
  }

  trace!(
    project_part_id = %part.project_part_id,
    system = system.len(),
    project = project.len(),
    sources = dependency.sources.len(),
    "Watching dependencies"
  );

  let id = &part.project_part_id;
  vec![
    IdPaths::new(id.clone(), SourceType::SystemInclude, sorted_ids(system)),
    IdPaths::new(id.clone(), SourceType::ProjectInclude, sorted_ids(project)),
    IdPaths::new(id.clone(), SourceType::Source, sorted_ids(dependency.sources.clone())),
  ]
}

fn sorted_ids(mut ids: FilePathIds) -> FilePathIds {
  sorted::sort_unique(&mut ids);
  ids
}
