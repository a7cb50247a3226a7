//! Application context: wires collaborators, schedulers, the registry and the
//! queue into a running [`PchManagerActor`].

use std::sync::Arc;

use tokio::{sync::mpsc, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{info, trace};

use crate::{
  actor::{
    NotifyPathWatcher, PchManagerActor, PchManagerActorConfig, PchManagerEvent, PchManagerHandle, TaskScheduler,
    WatcherError,
  },
  capability::{
    BuildDependenciesProvider, FilePathCache, FileSystem, GeneratedFiles, PathWatcher, PchCreatorFactory,
    PrecompiledHeaderStorage, ProjectPartsStorage,
  },
  domain::{
    config::{Config, Environment},
    pch::PchTaskKind,
  },
  manager::{PchTaskGenerator, PchTaskQueue, ProgressCounter, ProjectPartsManager, QueueContext},
  store::{GeneratedFileSet, HeaderCacheStore, LocalFileSystem, MemoryFilePathCache, StoreError},
};

#[derive(Debug, thiserror::Error)]
pub enum PchManagerError {
  #[error("Storage error: {0}")]
  Store(#[from] StoreError),
  #[error("Watcher error: {0}")]
  Watcher(#[from] WatcherError),
  #[error("IO error: {0}")]
  Io(#[from] std::io::Error),
}

/// Every capability the manager consumes.
pub struct Collaborators {
  pub pch_creator_factory: Arc<dyn PchCreatorFactory>,
  pub pch_storage: Arc<dyn PrecompiledHeaderStorage>,
  pub project_parts_storage: Arc<dyn ProjectPartsStorage>,
  pub file_system: Arc<dyn FileSystem>,
  pub file_path_cache: Arc<dyn FilePathCache>,
  pub build_dependencies: Arc<dyn BuildDependenciesProvider>,
  pub path_watcher: Arc<dyn PathWatcher>,
  pub generated_files: Box<dyn GeneratedFiles>,
}

impl Collaborators {
  /// Local disk, the header cache store and a notify watcher.
  ///
  /// The PCH creator and dependency scanner are compiler specific and always
  /// supplied by the caller. Must be called from within a tokio runtime.
  pub fn local(
    config: &Config,
    pch_creator_factory: Arc<dyn PchCreatorFactory>,
    build_dependencies: Arc<dyn BuildDependenciesProvider>,
    cancel: &CancellationToken,
  ) -> Result<Self, PchManagerError> {
    std::fs::create_dir_all(&config.pch.build_directory)?;

    let store = Arc::new(match &config.storage.path {
      Some(path) => HeaderCacheStore::open(path)?,
      None => HeaderCacheStore::in_memory(),
    });
    let file_path_cache: Arc<dyn FilePathCache> = Arc::new(MemoryFilePathCache::new());
    let path_watcher = NotifyPathWatcher::spawn(&config.watcher, Arc::clone(&file_path_cache), cancel.child_token())?;

    Ok(Self {
      pch_creator_factory,
      pch_storage: store.clone(),
      project_parts_storage: store,
      file_system: Arc::new(LocalFileSystem::new(Arc::clone(&file_path_cache))),
      file_path_cache,
      build_dependencies,
      path_watcher: Arc::new(path_watcher),
      generated_files: Box::new(GeneratedFileSet::new()),
    })
  }
}

/// A running PCH manager.
pub struct PchManager {
  pub handle: PchManagerHandle,
  pub events: mpsc::Receiver<PchManagerEvent>,
  task: JoinHandle<()>,
}

impl PchManager {
  /// Wire everything up and spawn the actor. Must be called from within a
  /// tokio runtime.
  pub fn spawn(config: &Config, collaborators: Collaborators, cancel: CancellationToken) -> Self {
    let environment = Environment::from_config(config);
    info!(
      build_directory = %environment.pch_build_directory.display(),
      system_slots = environment.system_slots,
      project_slots = environment.project_slots,
      "Starting PCH manager"
    );

    let (message_tx, message_rx) = mpsc::channel(config.queue.message_buffer.max(1));
    let (event_tx, event_rx) = mpsc::channel(config.queue.event_buffer.max(1));
    let (outcome_tx, outcome_rx) = mpsc::channel(environment.system_slots + environment.project_slots);

    let system_scheduler = TaskScheduler::new(
      PchTaskKind::System,
      environment.system_slots,
      Arc::clone(&collaborators.pch_creator_factory),
      outcome_tx.clone(),
    );
    let project_scheduler = TaskScheduler::new(
      PchTaskKind::Project,
      environment.project_slots,
      collaborators.pch_creator_factory,
      outcome_tx,
    );

    let progress_tx = event_tx.clone();
    let progress = ProgressCounter::new(Box::new(move |completed, total| {
      if progress_tx
        .try_send(PchManagerEvent::Progress { completed, total })
        .is_err()
      {
        trace!(completed, total, "Dropping progress event");
      }
    }));

    let queue = PchTaskQueue::new(
      Box::new(system_scheduler),
      Box::new(project_scheduler),
      progress,
      QueueContext {
        pch_storage: Arc::clone(&collaborators.pch_storage),
        file_system: collaborators.file_system,
        file_path_cache: collaborators.file_path_cache,
        environment,
      },
    );

    let actor = PchManagerActor::new(
      PchManagerActorConfig {
        registry: ProjectPartsManager::new(collaborators.project_parts_storage, collaborators.pch_storage),
        queue,
        generator: PchTaskGenerator::new(
          collaborators.build_dependencies,
          Arc::clone(&collaborators.path_watcher),
        ),
        generated_files: collaborators.generated_files,
        path_watcher: Arc::clone(&collaborators.path_watcher),
        events: event_tx,
      },
      message_rx,
      outcome_rx,
      cancel,
    );

    let handle = PchManagerHandle::new(message_tx);
    collaborators.path_watcher.set_notifier(Arc::new(handle.clone()));

    let task = tokio::spawn(actor.run());

    Self {
      handle,
      events: event_rx,
      task,
    }
  }

  /// Wait for the actor to stop.
  pub async fn join(self) {
    let _ = self.task.await;
  }
}
