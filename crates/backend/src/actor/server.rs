//! The dispatch facade.
//!
//! [`PchManagerActor`] is the single writer of the registry and the task
//! queue. It turns inbound notifications into registry and queue operations,
//! records finished tasks, and runs one queue processing cycle after every
//! message or outcome it handles.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::message::{PchManagerEvent, PchManagerMessage, PchManagerStatus};
use crate::{
  capability::{GeneratedFiles, PathWatcher},
  domain::{
    dependency::ProjectChunkId,
    pch::{PchTaskKind, TaskOutcome},
    project_part::{ProjectPartContainer, ProjectPartId, ProjectPartIds, to_project_part_ids},
    sorted,
  },
  manager::{
    PchTaskGenerator, PchTaskQueue, ProjectPartsManager, ToolChainArgumentsCache, tasks_merger::merge_task_sets,
  },
};

/// Owned state handed to the actor.
pub struct PchManagerActorConfig {
  pub registry: ProjectPartsManager,
  pub queue: PchTaskQueue,
  pub generator: PchTaskGenerator,
  pub generated_files: Box<dyn GeneratedFiles>,
  pub path_watcher: Arc<dyn PathWatcher>,
  pub events: mpsc::Sender<PchManagerEvent>,
}

pub struct PchManagerActor {
  registry: ProjectPartsManager,
  queue: PchTaskQueue,
  generator: PchTaskGenerator,
  tool_chain_arguments: ToolChainArgumentsCache,
  generated_files: Box<dyn GeneratedFiles>,
  path_watcher: Arc<dyn PathWatcher>,
  events: mpsc::Sender<PchManagerEvent>,
  receiver: mpsc::Receiver<PchManagerMessage>,
  outcomes: mpsc::Receiver<TaskOutcome>,
  cancel: CancellationToken,
}

impl PchManagerActor {
  pub fn new(
    config: PchManagerActorConfig,
    receiver: mpsc::Receiver<PchManagerMessage>,
    outcomes: mpsc::Receiver<TaskOutcome>,
    cancel: CancellationToken,
  ) -> Self {
    Self {
      registry: config.registry,
      queue: config.queue,
      generator: config.generator,
      tool_chain_arguments: ToolChainArgumentsCache::new(),
      generated_files: config.generated_files,
      path_watcher: config.path_watcher,
      events: config.events,
      receiver,
      outcomes,
      cancel,
    }
  }

  /// Run until cancelled or asked to shut down.
  pub async fn run(mut self) {
    info!("PchManagerActor started");

    loop {
      tokio::select! {
          biased;

          _ = self.cancel.cancelled() => {
              info!("PchManagerActor shutting down (cancelled)");
              break;
          }

          Some(outcome) = self.outcomes.recv() => {
              self.handle_task_finished(outcome);
          }

          message = self.receiver.recv() => {
              match message {
                  Some(PchManagerMessage::Shutdown) => {
                      info!("PchManagerActor shutting down (requested)");
                      break;
                  }
                  Some(message) => self.handle_message(message),
                  None => {
                      info!("PchManagerActor shutting down (channel closed)");
                      break;
                  }
              }
          }
      }

      self.queue.process_entries();
    }

    info!("PchManagerActor stopped");
  }

  fn handle_message(&mut self, message: PchManagerMessage) {
    match message {
      PchManagerMessage::UpdateProjectParts {
        project_parts,
        tool_chain_arguments,
      } => self.update_project_parts(project_parts, tool_chain_arguments),
      PchManagerMessage::RemoveProjectParts { project_part_ids } => self.remove_project_parts(&project_part_ids),
      PchManagerMessage::UpdateGeneratedFiles { files } => {
        self.generated_files.update(files);
        self.drain_deferred_updates();
      }
      PchManagerMessage::RemoveGeneratedFiles { paths } => {
        self.generated_files.remove(&paths);
        self.drain_deferred_updates();
      }
      PchManagerMessage::PathsWithIdsChanged { ids } => self.paths_with_ids_changed(ids),
      PchManagerMessage::Status { reply } => {
        let _ = reply.send(self.status());
      }
      PchManagerMessage::Shutdown => {} // Handled in main loop
    }
  }

  // ==========================================================================
  // Notifications
  // ==========================================================================

  fn update_project_parts(&mut self, project_parts: Vec<ProjectPartContainer>, tool_chain_arguments: Vec<String>) {
    debug!(count = project_parts.len(), "Updating project parts");
    self
      .tool_chain_arguments
      .update(&project_parts, tool_chain_arguments.clone());

    let result = self.registry.update(project_parts);
    self.notify_updated(to_project_part_ids(&result.up_to_date));

    if !self.generated_files.is_valid() {
      let deferred = to_project_part_ids(&result.needs_rebuild());
      debug!(count = deferred.len(), "Generated files incomplete, deferring");
      self.registry.update_deferred(&deferred);
      return;
    }

    let update_system = self.defer_in_flight(result.update_system);
    let update_project = self.defer_in_flight(result.update_project);
    self.enqueue(&update_system, &tool_chain_arguments, PchTaskKind::System);
    self.enqueue(&update_project, &tool_chain_arguments, PchTaskKind::Project);
  }

  fn remove_project_parts(&mut self, project_part_ids: &[ProjectPartId]) {
    debug!(count = project_part_ids.len(), "Removing project parts");
    self.registry.remove(project_part_ids);
    self.queue.remove_pch_tasks(project_part_ids);
    self.path_watcher.remove_ids(project_part_ids);
    self.tool_chain_arguments.remove(project_part_ids);
  }

  /// Forced rebuild of parts whose dependencies changed on disk.
  fn paths_with_ids_changed(&mut self, ids: Vec<ProjectChunkId>) {
    let (system, project): (Vec<ProjectChunkId>, Vec<ProjectChunkId>) =
      ids.into_iter().partition(|chunk| chunk.source_type.is_system());

    let system_ids = chunk_ids(system);
    // A system rebuild already rebuilds the project PCH
    let project_ids = sorted::difference(&chunk_ids(project), &system_ids);

    trace!(system = system_ids.len(), project = project_ids.len(), "Dependency paths changed");

    let system_parts = self.registry.projects(&system_ids);
    self.rebuild(system_parts, PchTaskKind::System);
    let project_parts = self.registry.projects(&project_ids);
    self.rebuild(project_parts, PchTaskKind::Project);
  }

  fn handle_task_finished(&mut self, outcome: TaskOutcome) {
    self.queue.task_finished(&outcome);

    // A failed build deleted the stored record, which the client sees as an update too
    if outcome.kind == PchTaskKind::Project {
      self.notify_updated(outcome.project_part_ids);
    }

    self.drain_deferred_updates();
  }

  // ==========================================================================
  // Rebuilding
  // ==========================================================================

  fn drain_deferred_updates(&mut self) {
    if !self.registry.has_deferred_updates() || !self.generated_files.is_valid() {
      return;
    }

    let deferred = self.registry.deferred_updates();
    debug!(count = deferred.len(), "Resubmitting deferred project parts");
    self.rebuild(deferred, PchTaskKind::System);
  }

  /// Requeue registered parts using the tool chain arguments they were submitted with.
  fn rebuild(&mut self, project_parts: Vec<ProjectPartContainer>, kind: PchTaskKind) {
    if project_parts.is_empty() {
      return;
    }

    if !self.generated_files.is_valid() {
      self.registry.update_deferred(&to_project_part_ids(&project_parts));
      return;
    }

    let project_parts = self.defer_in_flight(project_parts);
    let entries = self.tool_chain_arguments.arguments(&to_project_part_ids(&project_parts));

    for entry in entries {
      let group = sorted::intersection_by(&project_parts, &entry.ids, |part, id| part.project_part_id.cmp(id));
      self.enqueue(&group, &entry.arguments, kind);
    }
  }

  /// Defer parts whose task is still running and return the rest.
  fn defer_in_flight(&mut self, project_parts: Vec<ProjectPartContainer>) -> Vec<ProjectPartContainer> {
    let (running, ready): (Vec<_>, Vec<_>) = project_parts
      .into_iter()
      .partition(|part| self.queue.is_in_flight(&part.project_part_id));

    if !running.is_empty() {
      debug!(count = running.len(), "Deferring project parts with running tasks");
      self.registry.update_deferred(&to_project_part_ids(&running));
    }

    ready
  }

  fn enqueue(&mut self, project_parts: &[ProjectPartContainer], tool_chain_arguments: &[String], kind: PchTaskKind) {
    if project_parts.is_empty() {
      return;
    }

    match kind {
      PchTaskKind::System => {
        let task_sets = self.generator.create_task_sets(project_parts, tool_chain_arguments);
        let (system_tasks, project_tasks) = merge_task_sets(task_sets);
        self.queue.add_system_pch_tasks(system_tasks);
        self.queue.add_project_pch_tasks(project_tasks);
      }
      PchTaskKind::Project => {
        let project_tasks = self.generator.create_project_tasks(project_parts, tool_chain_arguments);
        self.queue.add_project_pch_tasks(project_tasks);
      }
    }
  }

  // ==========================================================================
  // Outbound
  // ==========================================================================

  fn notify_updated(&self, project_part_ids: ProjectPartIds) {
    if project_part_ids.is_empty() {
      return;
    }

    if let Err(e) = self
      .events
      .try_send(PchManagerEvent::PrecompiledHeadersUpdated { project_part_ids })
    {
      warn!(error = %e, "Dropping precompiled headers update event");
    }
  }

  fn status(&self) -> PchManagerStatus {
    PchManagerStatus {
      project_parts: self.registry.project_parts().len(),
      pending_system_tasks: self.queue.system_tasks().len(),
      pending_project_tasks: self.queue.project_tasks().len(),
      deferred: self.registry.has_deferred_updates(),
      generated_files_valid: self.generated_files.is_valid(),
      idle: self.queue.is_idle(),
    }
  }
}

fn chunk_ids(chunks: Vec<ProjectChunkId>) -> Vec<ProjectPartId> {
  let mut ids: Vec<ProjectPartId> = chunks.into_iter().map(|chunk| chunk.id).collect();
  sorted::sort_unique(&mut ids);
  ids
}
