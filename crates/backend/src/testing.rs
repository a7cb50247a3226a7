//! In-memory doubles for every collaborator capability.

use std::{
  collections::HashMap,
  path::{Path, PathBuf},
  sync::{Arc, Condvar, Mutex},
};

use crate::{
  capability::{
    BuildDependenciesProvider, FileSystem, PathWatcher, PathWatcherNotifier, PchCreator, PchCreatorFactory,
    PrecompiledHeaderStorage, SchedulerTask, TaskScheduling,
  },
  domain::{
    dependency::{BuildDependency, IdPaths, ProjectChunkId},
    file_path::{FilePathId, FilePathIds},
    pch::{PchTask, ProjectPartPch, SlotUsage, TaskOutcome},
    project_part::{ProjectPartContainer, ProjectPartId, ProjectPartIds},
  },
  store::StoreError,
};

// ============================================================================
// Storage
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageCall {
  InsertProject(ProjectPartId, PathBuf),
  DeleteProject(ProjectPartId),
  DeleteProjects(ProjectPartIds),
  InsertSystem(ProjectPartIds, PathBuf),
  DeleteSystem(ProjectPartIds),
  FetchSystemPath(ProjectPartId),
  FetchAllPaths,
}

/// Records every call; optionally fails all of them.
#[derive(Default)]
pub struct RecordingStorage {
  calls: Mutex<Vec<StorageCall>>,
  fail: bool,
}

impl RecordingStorage {
  pub fn failing() -> Self {
    Self {
      calls: Mutex::new(Vec::new()),
      fail: true,
    }
  }

  pub fn calls(&self) -> Vec<StorageCall> {
    self.calls.lock().unwrap().clone()
  }

  fn record(&self, call: StorageCall) -> Result<(), StoreError> {
    self.calls.lock().unwrap().push(call);
    if self.fail {
      Err(StoreError::Io(std::io::Error::other("storage offline")))
    } else {
      Ok(())
    }
  }
}

impl PrecompiledHeaderStorage for RecordingStorage {
  fn insert_project_precompiled_header(
    &self,
    project_part_id: &ProjectPartId,
    pch_path: &Path,
    _last_modified: i64,
  ) -> Result<(), StoreError> {
    self.record(StorageCall::InsertProject(project_part_id.clone(), pch_path.to_path_buf()))
  }

  fn delete_project_precompiled_header(
    &self,
    project_part_id: &ProjectPartId,
    _last_modified: i64,
  ) -> Result<(), StoreError> {
    self.record(StorageCall::DeleteProject(project_part_id.clone()))
  }

  fn delete_project_precompiled_headers(&self, project_part_ids: &[ProjectPartId]) -> Result<(), StoreError> {
    self.record(StorageCall::DeleteProjects(project_part_ids.to_vec()))
  }

  fn insert_system_precompiled_headers(
    &self,
    project_part_ids: &[ProjectPartId],
    pch_path: &Path,
    _last_modified: i64,
  ) -> Result<(), StoreError> {
    self.record(StorageCall::InsertSystem(project_part_ids.to_vec(), pch_path.to_path_buf()))
  }

  fn delete_system_precompiled_headers(&self, project_part_ids: &[ProjectPartId]) -> Result<(), StoreError> {
    self.record(StorageCall::DeleteSystem(project_part_ids.to_vec()))
  }

  fn fetch_system_precompiled_header_path(
    &self,
    project_part_id: &ProjectPartId,
  ) -> Result<Option<PathBuf>, StoreError> {
    self.record(StorageCall::FetchSystemPath(project_part_id.clone()))?;
    Ok(None)
  }

  fn fetch_all_pch_paths(&self) -> Result<Vec<PathBuf>, StoreError> {
    self.record(StorageCall::FetchAllPaths)?;
    Ok(Vec::new())
  }
}

// ============================================================================
// PCH Creation
// ============================================================================

/// Blocks creators until opened.
#[derive(Clone, Default)]
pub struct Gate {
  inner: Arc<(Mutex<bool>, Condvar)>,
}

impl Gate {
  pub fn open(&self) {
    let (open, condvar) = &*self.inner;
    *open.lock().unwrap() = true;
    condvar.notify_all();
  }

  fn wait(&self) {
    let (open, condvar) = &*self.inner;
    let mut guard = open.lock().unwrap();
    while !*guard {
      guard = condvar.wait(guard).unwrap();
    }
  }
}

#[derive(Clone)]
enum CreatorMode {
  Build(PathBuf),
  Fail,
  Panic,
}

/// Produces `<dir>/<ids joined by +>.pch`, fails every build, or panics.
#[derive(Clone)]
pub struct FakePchCreator {
  mode: CreatorMode,
  tasks: Arc<Mutex<Vec<PchTask>>>,
  gate: Option<Gate>,
  last: Option<ProjectPartPch>,
}

impl FakePchCreator {
  pub fn building(directory: impl Into<PathBuf>) -> Self {
    Self {
      mode: CreatorMode::Build(directory.into()),
      tasks: Arc::default(),
      gate: None,
      last: None,
    }
  }

  pub fn failing() -> Self {
    Self {
      mode: CreatorMode::Fail,
      tasks: Arc::default(),
      gate: None,
      last: None,
    }
  }

  /// Crash inside `generate_pch`, like a compiler wrapper that aborts.
  pub fn panicking() -> Self {
    Self {
      mode: CreatorMode::Panic,
      tasks: Arc::default(),
      gate: None,
      last: None,
    }
  }

  /// Hold every build until `gate` opens.
  pub fn gated(mut self, gate: Gate) -> Self {
    self.gate = Some(gate);
    self
  }

  pub fn tasks(&self) -> Vec<PchTask> {
    self.tasks.lock().unwrap().clone()
  }

  pub fn last_task(&self) -> Option<PchTask> {
    self.tasks.lock().unwrap().last().cloned()
  }
}

impl PchCreator for FakePchCreator {
  fn generate_pch(&mut self, task: PchTask) {
    self.tasks.lock().unwrap().push(task.clone());
    if let Some(gate) = &self.gate {
      gate.wait();
    }

    let ids = task.project_part_ids;
    self.last = Some(match &self.mode {
      CreatorMode::Build(directory) => {
        let name: Vec<&str> = ids.iter().map(ProjectPartId::as_str).collect();
        let path = directory.join(format!("{}.pch", name.join("+")));
        ProjectPartPch::built(ids, path, 1)
      }
      CreatorMode::Fail => ProjectPartPch::failed(ids),
      CreatorMode::Panic => panic!("PCH creator crashed"),
    });
  }

  fn project_part_pch(&self) -> ProjectPartPch {
    self.last.clone().unwrap_or_else(|| ProjectPartPch::failed(Vec::new()))
  }

  fn clear(&mut self) {
    self.last = None;
  }
}

/// Hands out clones of one creator, so all of them share the task log.
pub struct FakePchCreatorFactory {
  prototype: FakePchCreator,
}

impl FakePchCreatorFactory {
  pub fn new(prototype: FakePchCreator) -> Self {
    Self { prototype }
  }

  pub fn tasks(&self) -> Vec<PchTask> {
    self.prototype.tasks()
  }
}

impl PchCreatorFactory for FakePchCreatorFactory {
  fn create(&self) -> Box<dyn PchCreator> {
    Box::new(self.prototype.clone())
  }
}

// ============================================================================
// Scheduling
// ============================================================================

struct FakeSchedulerState {
  slots: usize,
  pending: Vec<SchedulerTask>,
  dispatched: Vec<ProjectPartIds>,
}

/// Keeps dispatched tasks until `run_all`; each one holds a slot until then.
#[derive(Clone)]
pub struct FakeScheduler {
  state: Arc<Mutex<FakeSchedulerState>>,
}

impl FakeScheduler {
  pub fn new(slots: usize) -> Self {
    Self {
      state: Arc::new(Mutex::new(FakeSchedulerState {
        slots,
        pending: Vec::new(),
        dispatched: Vec::new(),
      })),
    }
  }

  pub fn dispatched_ids(&self) -> Vec<ProjectPartIds> {
    self.state.lock().unwrap().dispatched.clone()
  }

  pub fn pending_len(&self) -> usize {
    self.state.lock().unwrap().pending.len()
  }

  pub fn run_all(&self, creator: &mut dyn PchCreator) -> Vec<TaskOutcome> {
    let tasks = std::mem::take(&mut self.state.lock().unwrap().pending);

    tasks
      .into_iter()
      .map(|task| {
        let pch = (task.job)(&mut *creator);
        TaskOutcome {
          kind: task.kind,
          project_part_ids: task.project_part_ids,
          pch_path: pch.pch_path,
        }
      })
      .collect()
  }
}

impl TaskScheduling for FakeScheduler {
  fn slot_usage(&self) -> SlotUsage {
    let state = self.state.lock().unwrap();
    SlotUsage {
      free: state.slots.saturating_sub(state.pending.len()),
      used: state.pending.len(),
    }
  }

  fn add_tasks(&mut self, tasks: Vec<SchedulerTask>) {
    let mut state = self.state.lock().unwrap();
    for task in tasks {
      state.dispatched.push(task.project_part_ids.clone());
      state.pending.push(task);
    }
  }
}

// ============================================================================
// File System
// ============================================================================

#[derive(Default)]
pub struct FakeFileSystem {
  entries: Mutex<HashMap<PathBuf, FilePathIds>>,
  removed: Mutex<Vec<FilePathId>>,
}

impl FakeFileSystem {
  pub fn set_entries(&self, directory: &Path, ids: FilePathIds) {
    self.entries.lock().unwrap().insert(directory.to_path_buf(), ids);
  }

  pub fn removed(&self) -> Vec<FilePathId> {
    self.removed.lock().unwrap().clone()
  }
}

impl FileSystem for FakeFileSystem {
  fn directory_entries(&self, directory: &Path) -> FilePathIds {
    let mut ids = self.entries.lock().unwrap().get(directory).cloned().unwrap_or_default();
    ids.sort();
    ids
  }

  fn remove(&self, file_path_ids: &[FilePathId]) {
    let mut entries = self.entries.lock().unwrap();
    for ids in entries.values_mut() {
      ids.retain(|id| !file_path_ids.contains(id));
    }
    self.removed.lock().unwrap().extend_from_slice(file_path_ids);
  }
}

// ============================================================================
// Dependencies and Watching
// ============================================================================

#[derive(Default)]
pub struct FakeBuildDependencies {
  dependencies: Mutex<HashMap<ProjectPartId, BuildDependency>>,
}

impl FakeBuildDependencies {
  pub fn set(&self, project_part_id: &ProjectPartId, dependency: BuildDependency) {
    self
      .dependencies
      .lock()
      .unwrap()
      .insert(project_part_id.clone(), dependency);
  }
}

impl BuildDependenciesProvider for FakeBuildDependencies {
  fn create(&self, project_part: &ProjectPartContainer) -> BuildDependency {
    self
      .dependencies
      .lock()
      .unwrap()
      .get(&project_part.project_part_id)
      .cloned()
      .unwrap_or_default()
  }
}

#[derive(Default)]
pub struct RecordingPathWatcher {
  id_paths: Mutex<Vec<IdPaths>>,
  removed: Mutex<Vec<ProjectPartId>>,
  notifier: Mutex<Option<Arc<dyn PathWatcherNotifier>>>,
}

impl RecordingPathWatcher {
  pub fn id_paths(&self) -> Vec<IdPaths> {
    self.id_paths.lock().unwrap().clone()
  }

  pub fn removed_ids(&self) -> Vec<ProjectPartId> {
    self.removed.lock().unwrap().clone()
  }

  pub fn has_notifier(&self) -> bool {
    self.notifier.lock().unwrap().is_some()
  }

  /// Simulate a file change reported by the watcher.
  pub fn notify(&self, chunks: Vec<ProjectChunkId>) {
    let notifier = self.notifier.lock().unwrap().clone();
    if let Some(notifier) = notifier {
      notifier.paths_with_ids_changed(chunks);
    }
  }
}

impl PathWatcher for RecordingPathWatcher {
  fn update_id_paths(&self, id_paths: Vec<IdPaths>) {
    self.id_paths.lock().unwrap().extend(id_paths);
  }

  fn remove_ids(&self, project_part_ids: &[ProjectPartId]) {
    self.removed.lock().unwrap().extend_from_slice(project_part_ids);
  }

  fn set_notifier(&self, notifier: Arc<dyn PathWatcherNotifier>) {
    *self.notifier.lock().unwrap() = Some(notifier);
  }
}
