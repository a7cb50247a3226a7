//! Pending PCH work and its dispatch to the worker slots.
//!
//! [`PchTaskQueue`] owns two sorted pending collections (system and project
//! tasks), each drained into its own [`TaskScheduling`] pool. One call to
//! [`process_entries`](PchTaskQueue::process_entries) is one processing cycle:
//!
//! 1. Dispatch up to `free` system tasks from the tail of the system queue.
//! 2. Only if no system task was dispatched, do the same for project tasks.
//! 3. If nothing was dispatched and no slot is busy, delete every PCH file in
//!    the build directory that storage no longer references.

use std::{
  collections::BTreeMap,
  panic::{AssertUnwindSafe, catch_unwind, resume_unwind},
  path::PathBuf,
  sync::Arc,
  thread,
};

use tracing::{debug, trace, warn};

use super::progress::ProgressCounter;
use crate::{
  capability::{FilePathCache, FileSystem, PchCreator, PrecompiledHeaderStorage, SchedulerTask, TaskScheduling},
  domain::{
    config::Environment,
    pch::{PchTask, PchTaskKind, ProjectPartPch, TaskOutcome},
    project_part::ProjectPartId,
    sorted,
  },
};

/// Number of tasks handed to each scheduler in one cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchCounts {
  pub system: usize,
  pub project: usize,
}

impl DispatchCounts {
  pub fn total(&self) -> usize {
    self.system + self.project
  }
}

/// Collaborators the queue and its dispatched jobs use.
#[derive(Clone)]
pub struct QueueContext {
  pub pch_storage: Arc<dyn PrecompiledHeaderStorage>,
  pub file_system: Arc<dyn FileSystem>,
  pub file_path_cache: Arc<dyn FilePathCache>,
  pub environment: Environment,
}

pub struct PchTaskQueue {
  system_tasks: Vec<PchTask>,
  project_tasks: Vec<PchTask>,
  system_scheduler: Box<dyn TaskScheduling>,
  project_scheduler: Box<dyn TaskScheduling>,
  progress: ProgressCounter,
  context: QueueContext,
  /// Dispatched but unfinished tasks per project part
  in_flight: BTreeMap<ProjectPartId, usize>,
}

impl PchTaskQueue {
  pub fn new(
    system_scheduler: Box<dyn TaskScheduling>,
    project_scheduler: Box<dyn TaskScheduling>,
    progress: ProgressCounter,
    context: QueueContext,
  ) -> Self {
    Self {
      system_tasks: Vec::new(),
      project_tasks: Vec::new(),
      system_scheduler,
      project_scheduler,
      progress,
      context,
      in_flight: BTreeMap::new(),
    }
  }

  // ==========================================================================
  // Pending collections
  // ==========================================================================

  pub fn add_system_pch_tasks(&mut self, tasks: Vec<PchTask>) {
    let added = add_tasks(&mut self.system_tasks, tasks);
    self.progress.add_total(added);
  }

  pub fn add_project_pch_tasks(&mut self, tasks: Vec<PchTask>) {
    let added = add_tasks(&mut self.project_tasks, tasks);
    self.progress.add_total(added);
  }

  /// Drop pending project tasks for the listed parts.
  ///
  /// System tasks are shared by several parts and stay queued; dispatched
  /// tasks run to completion.
  pub fn remove_pch_tasks(&mut self, project_part_ids: &[ProjectPartId]) {
    let mut ids = project_part_ids.to_vec();
    sorted::sort_unique(&mut ids);

    let before = self.project_tasks.len();
    let pending = std::mem::take(&mut self.project_tasks);
    self.project_tasks = sorted::difference_by(pending, &ids, |task, id| task.project_part_id().cmp(&Some(id)));

    self.progress.remove_total(before - self.project_tasks.len());
  }

  pub fn system_tasks(&self) -> &[PchTask] {
    &self.system_tasks
  }

  pub fn project_tasks(&self) -> &[PchTask] {
    &self.project_tasks
  }

  pub fn progress(&self) -> &ProgressCounter {
    &self.progress
  }

  pub fn is_in_flight(&self, project_part_id: &ProjectPartId) -> bool {
    self.in_flight.contains_key(project_part_id)
  }

  pub fn is_idle(&self) -> bool {
    self.system_tasks.is_empty() && self.project_tasks.is_empty() && self.in_flight.is_empty()
  }

  // ==========================================================================
  // Processing
  // ==========================================================================

  /// Run one processing cycle.
  pub fn process_entries(&mut self) -> DispatchCounts {
    let mut counts = DispatchCounts {
      system: self.process_system_tasks(),
      project: 0,
    };

    if counts.system == 0 {
      counts.project = self.process_project_tasks();
    }

    if counts.total() > 0 {
      debug!(system = counts.system, project = counts.project, "Dispatched PCH tasks");
    } else if self.system_scheduler.slot_usage().used == 0 && self.project_scheduler.slot_usage().used == 0 {
      self.delete_unused_pchs();
    }

    counts
  }

  /// Record a finished task and report progress.
  pub fn task_finished(&mut self, outcome: &TaskOutcome) {
    for id in &outcome.project_part_ids {
      if let Some(count) = self.in_flight.get_mut(id) {
        *count -= 1;
        if *count == 0 {
          self.in_flight.remove(id);
        }
      }
    }

    self.progress.add_progress(1);
  }

  fn process_system_tasks(&mut self) -> usize {
    let free = self.system_scheduler.slot_usage().free;
    let tasks = take_tail(&mut self.system_tasks, free);
    if tasks.is_empty() {
      return 0;
    }

    let jobs: Vec<SchedulerTask> = tasks
      .into_iter()
      .map(|task| {
        self.mark_in_flight(&task);
        system_job(task, Arc::clone(&self.context.pch_storage))
      })
      .collect();

    let count = jobs.len();
    self.system_scheduler.add_tasks(jobs);
    count
  }

  fn process_project_tasks(&mut self) -> usize {
    let free = self.project_scheduler.slot_usage().free;
    let tasks = take_tail(&mut self.project_tasks, free);
    if tasks.is_empty() {
      return 0;
    }

    let pre_include_search_path = self.context.environment.pre_include_search_path.clone();
    let jobs: Vec<SchedulerTask> = tasks
      .into_iter()
      .map(|task| {
        self.mark_in_flight(&task);
        project_job(
          task,
          Arc::clone(&self.context.pch_storage),
          pre_include_search_path.clone(),
        )
      })
      .collect();

    let count = jobs.len();
    self.project_scheduler.add_tasks(jobs);
    count
  }

  fn mark_in_flight(&mut self, task: &PchTask) {
    for id in &task.project_part_ids {
      *self.in_flight.entry(id.clone()).or_default() += 1;
    }
  }

  /// Remove PCH files no stored record references.
  fn delete_unused_pchs(&self) {
    let referenced = match self.context.pch_storage.fetch_all_pch_paths() {
      Ok(paths) => self.context.file_path_cache.file_path_ids(&paths),
      Err(e) => {
        warn!(error = %e, "Cannot fetch PCH paths, skipping cleanup");
        return;
      }
    };

    let existing = self
      .context
      .file_system
      .directory_entries(&self.context.environment.pch_build_directory);
    let unused = sorted::difference(&existing, &referenced);

    if !unused.is_empty() {
      debug!(count = unused.len(), "Removing unused PCH files");
      self.context.file_system.remove(&unused);
    }
  }
}

/// Merge `tasks` into `pending`, returning how much the collection grew.
fn add_tasks(pending: &mut Vec<PchTask>, mut tasks: Vec<PchTask>) -> usize {
  sorted::sort_unique_by(&mut tasks, PchTask::compare_ids);

  let before = pending.len();
  let existing = std::mem::take(pending);
  *pending = sorted::union_by(tasks, existing, PchTask::compare_ids);
  pending.len() - before
}

fn take_tail(tasks: &mut Vec<PchTask>, count: usize) -> Vec<PchTask> {
  let at = tasks.len().saturating_sub(count);
  tasks.split_off(at)
}

fn system_job(task: PchTask, pch_storage: Arc<dyn PrecompiledHeaderStorage>) -> SchedulerTask {
  let project_part_ids = task.project_part_ids.clone();
  let ids = project_part_ids.clone();

  SchedulerTask {
    kind: PchTaskKind::System,
    project_part_ids,
    job: Box::new(move |creator: &mut dyn PchCreator| {
      let built = build_guarded(creator, task);

      let stored = match &built {
        Ok(ProjectPartPch {
          pch_path: Some(path),
          last_modified,
          ..
        }) => pch_storage.insert_system_precompiled_headers(&ids, path, *last_modified),
        _ => pch_storage.delete_system_precompiled_headers(&ids),
      };
      if let Err(e) = stored {
        warn!(error = %e, ids = ?ids, "Failed to store system PCH");
      }

      finish(built)
    }),
  }
}

fn project_job(
  mut task: PchTask,
  pch_storage: Arc<dyn PrecompiledHeaderStorage>,
  pre_include_search_path: Option<PathBuf>,
) -> SchedulerTask {
  let project_part_ids = task.project_part_ids.clone();

  SchedulerTask {
    kind: PchTaskKind::Project,
    project_part_ids,
    job: Box::new(move |creator: &mut dyn PchCreator| {
      let Some(id) = task.project_part_id().cloned() else {
        return ProjectPartPch::failed(Vec::new());
      };

      // The system PCH may have been built after this task was queued
      match pch_storage.fetch_system_precompiled_header_path(&id) {
        Ok(path) => task.system_pch_path = path,
        Err(e) => warn!(project_part_id = %id, error = %e, "Cannot fetch system PCH path"),
      }
      task.pre_include_search_path = pre_include_search_path;

      trace!(project_part_id = %id, system_pch = ?task.system_pch_path, "Building project PCH");
      let built = build_guarded(creator, task);

      let stored = match &built {
        Ok(ProjectPartPch {
          pch_path: Some(path),
          last_modified,
          ..
        }) => pch_storage.insert_project_precompiled_header(&id, path, *last_modified),
        Ok(pch) => pch_storage.delete_project_precompiled_header(&id, pch.last_modified),
        Err(_) => pch_storage.delete_project_precompiled_header(&id, 0),
      };
      if let Err(e) = stored {
        warn!(project_part_id = %id, error = %e, "Failed to store project PCH");
      }

      finish(built)
    }),
  }
}

/// Run the creator, catching a panic so the stale record is still deleted.
fn build_guarded(creator: &mut dyn PchCreator, task: PchTask) -> thread::Result<ProjectPartPch> {
  catch_unwind(AssertUnwindSafe(|| {
    creator.generate_pch(task);
    creator.project_part_pch()
  }))
}

/// Hand a caught panic back to the scheduler, which discards the creator.
fn finish(built: thread::Result<ProjectPartPch>) -> ProjectPartPch {
  built.unwrap_or_else(|panic| resume_unwind(panic))
}
