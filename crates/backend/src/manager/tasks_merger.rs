//! Merging of system PCH tasks.
//!
//! Project parts that would compile the same system headers the same way
//! share one system PCH. Two system tasks merge when language, language
//! version, tool chain arguments and system include search paths are equal
//! and no macro is defined with different values.

use crate::domain::{
  pch::{PchTask, PchTaskSet},
  sorted,
};

/// Split task sets into merged system tasks and project tasks, each sorted by id.
pub fn merge_task_sets(task_sets: Vec<PchTaskSet>) -> (Vec<PchTask>, Vec<PchTask>) {
  let mut system_tasks: Vec<PchTask> = Vec::new();
  let mut project_tasks = Vec::with_capacity(task_sets.len());

  for set in task_sets {
    project_tasks.push(set.project);

    let Some(task) = set.system else {
      continue;
    };

    match system_tasks.iter_mut().find(|merged| is_mergeable(merged, &task)) {
      Some(merged) => merge_into(merged, task),
      None => system_tasks.push(task),
    }
  }

  sorted::sort_unique_by(&mut system_tasks, PchTask::compare_ids);
  sorted::sort_unique_by(&mut project_tasks, PchTask::compare_ids);
  (system_tasks, project_tasks)
}

fn is_mergeable(first: &PchTask, second: &PchTask) -> bool {
  first.language == second.language
    && first.language_version == second.language_version
    && first.tool_chain_arguments == second.tool_chain_arguments
    && first.system_include_search_paths == second.system_include_search_paths
    && first
      .compiler_macros
      .iter()
      .all(|(name, value)| second.compiler_macros.get(name).is_none_or(|other| other == value))
}

fn merge_into(merged: &mut PchTask, task: PchTask) {
  merged.project_part_ids = sorted::union(&merged.project_part_ids, &task.project_part_ids);
  merged.includes = sorted::union(&merged.includes, &task.includes);
  merged.sources = sorted::union(&merged.sources, &task.sources);
  merged.compiler_macros.extend(task.compiler_macros);
}
