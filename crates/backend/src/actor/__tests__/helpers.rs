//! Test helpers for actor integration tests.
//!
//! Provides `ManagerTestContext`, which spawns a full `PchManager` over
//! in-memory collaborators and offers polling helpers for its asynchronous
//! effects.

use std::{path::PathBuf, sync::Arc, time::Duration};

use tokio_util::sync::CancellationToken;

use crate::{
  actor::{PchManagerEvent, PchManagerStatus},
  capability::FilePathCache,
  config::Config,
  dependency::{BuildDependency, SourceEntry, SourceType},
  file_path::FilePathId,
  pch::PchTask,
  project_part::{ProjectPartContainer, ProjectPartId, ProjectPartIds},
  runtime::{Collaborators, PchManager},
  store::{GeneratedFileSet, HeaderCacheStore, MemoryFilePathCache},
  testing::{FakeBuildDependencies, FakeFileSystem, FakePchCreator, FakePchCreatorFactory, RecordingPathWatcher},
};

const WAIT: Duration = Duration::from_secs(5);

pub struct ManagerTestContext {
  pub manager: PchManager,
  pub cancel: CancellationToken,
  pub storage: Arc<HeaderCacheStore>,
  pub factory: Arc<FakePchCreatorFactory>,
  pub dependencies: Arc<FakeBuildDependencies>,
  pub watcher: Arc<RecordingPathWatcher>,
  pub file_system: Arc<FakeFileSystem>,
  pub file_path_cache: Arc<MemoryFilePathCache>,
}

impl ManagerTestContext {
  /// Manager with one slot per scheduler and creators building into `/pchs`.
  pub fn new() -> Self {
    Self::with_creator(FakePchCreator::building("/pchs"))
  }

  pub fn with_creator(creator: FakePchCreator) -> Self {
    let mut config = Config::default();
    config.pch.build_directory = PathBuf::from("/pchs");
    config.pch.system_slots = 1;
    config.pch.project_slots = 1;

    let storage = Arc::new(HeaderCacheStore::in_memory());
    let factory = Arc::new(FakePchCreatorFactory::new(creator));
    let dependencies = Arc::new(FakeBuildDependencies::default());
    let watcher = Arc::new(RecordingPathWatcher::default());
    let file_system = Arc::new(FakeFileSystem::default());
    let file_path_cache = Arc::new(MemoryFilePathCache::new());

    let collaborators = Collaborators {
      pch_creator_factory: factory.clone(),
      pch_storage: storage.clone(),
      project_parts_storage: storage.clone(),
      file_system: file_system.clone(),
      file_path_cache: file_path_cache.clone(),
      build_dependencies: dependencies.clone(),
      path_watcher: watcher.clone(),
      generated_files: Box::new(GeneratedFileSet::new()),
    };

    let cancel = CancellationToken::new();
    let manager = PchManager::spawn(&config, collaborators, cancel.clone());

    Self {
      manager,
      cancel,
      storage,
      factory,
      dependencies,
      watcher,
      file_system,
      file_path_cache,
    }
  }

  /// Give `id` one directly included system header and one project header.
  pub fn with_headers(&self, id: &str) -> (FilePathId, FilePathId) {
    let system = self.file_path_cache.file_path_id(&PathBuf::from(format!("/usr/include/{id}.h")));
    let project = self.file_path_cache.file_path_id(&PathBuf::from(format!("/src/{id}.h")));
    let source = self.file_path_cache.file_path_id(&PathBuf::from(format!("/src/{id}.cpp")));

    self.dependencies.set(
      &ProjectPartId::new(id),
      BuildDependency {
        includes: vec![
          SourceEntry::new(system, SourceType::TopSystemInclude),
          SourceEntry::new(project, SourceType::TopProjectInclude),
        ],
        sources: vec![source],
      },
    );
    (system, project)
  }

  pub async fn update(&self, parts: Vec<ProjectPartContainer>) {
    self
      .manager
      .handle
      .update_project_parts(parts, vec!["-m64".to_string()])
      .await
      .expect("send update");
  }

  pub async fn status(&self) -> PchManagerStatus {
    self.manager.handle.status().await.expect("status")
  }

  /// Poll until nothing is pending or running.
  pub async fn wait_idle(&self) -> PchManagerStatus {
    self.wait_status(|status| status.idle).await
  }

  pub async fn wait_status(&self, condition: impl Fn(&PchManagerStatus) -> bool) -> PchManagerStatus {
    tokio::time::timeout(WAIT, async {
      loop {
        let status = self.status().await;
        if condition(&status) {
          return status;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
      }
    })
    .await
    .expect("status condition not reached")
  }

  /// Poll until the creators have seen at least `count` tasks.
  pub async fn wait_tasks(&self, count: usize) -> Vec<PchTask> {
    tokio::time::timeout(WAIT, async {
      loop {
        let tasks = self.factory.tasks();
        if tasks.len() >= count {
          return tasks;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
      }
    })
    .await
    .expect("tasks not started")
  }

  /// Next `PrecompiledHeadersUpdated` event, skipping progress.
  pub async fn next_updated(&mut self) -> ProjectPartIds {
    tokio::time::timeout(WAIT, async {
      loop {
        match self.manager.events.recv().await {
          Some(PchManagerEvent::PrecompiledHeadersUpdated { project_part_ids }) => return project_part_ids,
          Some(PchManagerEvent::Progress { .. }) => continue,
          None => panic!("event channel closed"),
        }
      }
    })
    .await
    .expect("no update event")
  }

  /// Every event received so far, without waiting.
  pub fn drain_events(&mut self) -> Vec<PchManagerEvent> {
    let mut events = Vec::new();
    while let Ok(event) = self.manager.events.try_recv() {
      events.push(event);
    }
    events
  }
}

pub fn part(id: &str) -> ProjectPartContainer {
  ProjectPartContainer::new(id).with_arguments(["-std=c++17"])
}

pub fn ids(names: &[&str]) -> ProjectPartIds {
  names.iter().map(|name| ProjectPartId::new(*name)).collect()
}
