//! Notify-backed [`PathWatcher`].
//!
//! Dependency files are registered per [`ProjectChunkId`]. The watcher
//! watches the parent directory of every registered file non-recursively,
//! debounces raw notify events, and reports the chunks whose files changed
//! to the [`PathWatcherNotifier`].
//!
//! # Design
//!
//! Same bridge as any sync-callback watcher in an async system:
//! 1. notify's callback uses `blocking_send` to forward events to a channel
//! 2. a tokio task collects changed paths until they have been quiet for the
//!    debounce period
//! 3. settled paths are mapped to file path ids, then to chunk ids

use std::{
  collections::{BTreeMap, BTreeSet, HashMap},
  path::PathBuf,
  sync::{Arc, Mutex},
  time::{Duration, Instant},
};

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::{
  capability::{FilePathCache, PathWatcher, PathWatcherNotifier},
  domain::{
    config::WatcherConfig,
    dependency::{IdPaths, ProjectChunkId},
    file_path::{FilePathId, FilePathIds},
    project_part::ProjectPartId,
    sorted,
  },
};

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum WatcherError {
  #[error("Failed to initialize watcher: {0}")]
  Init(#[source] notify::Error),
}

// ============================================================================
// Shared State
// ============================================================================

#[derive(Default)]
struct WatchState {
  chunks: BTreeMap<ProjectChunkId, FilePathIds>,
  directories: BTreeSet<PathBuf>,
  notifier: Option<Arc<dyn PathWatcherNotifier>>,
}

struct Shared {
  state: Mutex<WatchState>,
  watcher: Mutex<RecommendedWatcher>,
  file_path_cache: Arc<dyn FilePathCache>,
}

impl Shared {
  /// Bring the watched directories in line with the registered files.
  fn sync_directories(&self, state: &mut WatchState) {
    let wanted: BTreeSet<PathBuf> = state
      .chunks
      .values()
      .flatten()
      .filter_map(|&id| self.file_path_cache.file_path(id))
      .filter_map(|path| path.parent().map(PathBuf::from))
      .collect();

    let Ok(mut watcher) = self.watcher.lock() else {
      warn!("Watcher lock poisoned");
      return;
    };

    for directory in state.directories.difference(&wanted) {
      if let Err(e) = watcher.unwatch(directory) {
        trace!(directory = %directory.display(), error = %e, "Failed to unwatch directory");
      }
    }

    for directory in wanted.difference(&state.directories) {
      if let Err(e) = watcher.watch(directory, RecursiveMode::NonRecursive) {
        warn!(directory = %directory.display(), error = %e, "Failed to watch directory");
      }
    }

    debug!(directories = wanted.len(), chunks = state.chunks.len(), "Watched directories updated");
    state.directories = wanted;
  }

  /// Report settled paths to the notifier.
  fn report(&self, paths: Vec<PathBuf>) {
    let mut changed: FilePathIds = paths
      .iter()
      .filter_map(|path| self.file_path_cache.find_file_path_id(path))
      .collect();
    sorted::sort_unique(&mut changed);
    if changed.is_empty() {
      return;
    }

    let (chunks, notifier) = match self.state.lock() {
      Ok(state) => (changed_chunks(&state.chunks, &changed), state.notifier.clone()),
      Err(_) => {
        warn!("Watcher state lock poisoned");
        return;
      }
    };

    let Some(notifier) = notifier else {
      trace!("No notifier set, dropping changes");
      return;
    };

    if !chunks.is_empty() {
      debug!(files = changed.len(), chunks = chunks.len(), "Dependency files changed");
      notifier.paths_with_ids_changed(chunks);
    }
    notifier.paths_changed(changed);
  }
}

/// Chunks watching at least one of `changed` (sorted).
fn changed_chunks(chunks: &BTreeMap<ProjectChunkId, FilePathIds>, changed: &[FilePathId]) -> Vec<ProjectChunkId> {
  chunks
    .iter()
    .filter(|(_, file_path_ids)| !sorted::intersection(file_path_ids, changed).is_empty())
    .map(|(chunk, _)| chunk.clone())
    .collect()
}

// ============================================================================
// Watcher
// ============================================================================

/// File watcher for project part dependencies.
///
/// Cheap to clone; the debounce task stops when `cancel` fires.
#[derive(Clone)]
pub struct NotifyPathWatcher {
  shared: Arc<Shared>,
}

impl NotifyPathWatcher {
  /// Create the watcher and spawn its debounce task. Must be called from
  /// within a tokio runtime.
  pub fn spawn(
    config: &WatcherConfig,
    file_path_cache: Arc<dyn FilePathCache>,
    cancel: CancellationToken,
  ) -> Result<Self, WatcherError> {
    let (event_tx, event_rx) = mpsc::channel::<Result<Event, notify::Error>>(256);

    let notify_config = Config::default().with_poll_interval(Duration::from_secs(config.poll_secs));
    let watcher = RecommendedWatcher::new(
      move |res| {
        // Runs on notify's thread
        let _ = event_tx.blocking_send(res);
      },
      notify_config,
    )
    .map_err(WatcherError::Init)?;

    let shared = Arc::new(Shared {
      state: Mutex::new(WatchState::default()),
      watcher: Mutex::new(watcher),
      file_path_cache,
    });

    let debounce = Duration::from_millis(config.debounce_ms.max(1));
    tokio::spawn(run_debounce(Arc::clone(&shared), event_rx, debounce, cancel));

    info!(debounce_ms = config.debounce_ms, "Path watcher initialized");
    Ok(Self { shared })
  }

  /// Every registered chunk and its files.
  pub fn id_paths(&self) -> Vec<IdPaths> {
    match self.shared.state.lock() {
      Ok(state) => state
        .chunks
        .iter()
        .map(|(chunk, ids)| IdPaths::new(chunk.id.clone(), chunk.source_type, ids.clone()))
        .collect(),
      Err(_) => Vec::new(),
    }
  }
}

impl PathWatcher for NotifyPathWatcher {
  fn update_id_paths(&self, id_paths: Vec<IdPaths>) {
    let Ok(mut state) = self.shared.state.lock() else {
      warn!("Watcher state lock poisoned");
      return;
    };

    for mut entry in id_paths {
      let chunk = entry.chunk_id();
      if entry.file_path_ids.is_empty() {
        state.chunks.remove(&chunk);
      } else {
        sorted::sort_unique(&mut entry.file_path_ids);
        state.chunks.insert(chunk, entry.file_path_ids);
      }
    }

    self.shared.sync_directories(&mut state);
  }

  fn remove_ids(&self, project_part_ids: &[ProjectPartId]) {
    let Ok(mut state) = self.shared.state.lock() else {
      warn!("Watcher state lock poisoned");
      return;
    };

    let ids: BTreeSet<&ProjectPartId> = project_part_ids.iter().collect();
    state.chunks.retain(|chunk, _| !ids.contains(&chunk.id));
    self.shared.sync_directories(&mut state);
  }

  fn set_notifier(&self, notifier: Arc<dyn PathWatcherNotifier>) {
    if let Ok(mut state) = self.shared.state.lock() {
      state.notifier = Some(notifier);
    }
  }
}

async fn run_debounce(
  shared: Arc<Shared>,
  mut event_rx: mpsc::Receiver<Result<Event, notify::Error>>,
  debounce: Duration,
  cancel: CancellationToken,
) {
  info!("Path watcher started");

  let mut pending: HashMap<PathBuf, Instant> = HashMap::new();
  let mut debounce_interval = tokio::time::interval(debounce);

  loop {
    tokio::select! {
        biased;

        _ = cancel.cancelled() => {
            info!("Path watcher shutting down (cancelled)");
            break;
        }

        event = event_rx.recv() => {
            match event {
                Some(Ok(event)) => collect_event(&mut pending, event),
                Some(Err(e)) => warn!(error = %e, "Watcher error"),
                None => {
                    info!("Path watcher shutting down (channel closed)");
                    break;
                }
            }
        }

        _ = debounce_interval.tick() => {
            let settled = take_settled(&mut pending, debounce, Instant::now());
            if !settled.is_empty() {
                shared.report(settled);
            }
        }
    }
  }

  info!("Path watcher stopped");
}

fn collect_event(pending: &mut HashMap<PathBuf, Instant>, event: Event) {
  if matches!(event.kind, EventKind::Access(_)) {
    return;
  }

  let now = Instant::now();
  for path in event.paths {
    trace!(path = %path.display(), kind = ?event.kind, "File event");
    pending.insert(path, now);
  }
}

/// Remove and return paths with no event for at least `debounce`.
fn take_settled(pending: &mut HashMap<PathBuf, Instant>, debounce: Duration, now: Instant) -> Vec<PathBuf> {
  let mut settled = Vec::new();
  pending.retain(|path, last_event| {
    if now.duration_since(*last_event) >= debounce {
      settled.push(path.clone());
      false
    } else {
      true
    }
  });
  settled.sort();
  settled
}
