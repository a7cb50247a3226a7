//! Bounded-slot task scheduler.
//!
//! Each dispatched task runs on tokio's blocking pool (compiling a PCH is
//! CPU and process bound) and holds one slot until it finishes. Finished
//! tasks report a [`TaskOutcome`] back to the control loop over an `mpsc`
//! channel; the slot is released before the outcome is sent, so the next
//! cycle triggered by that outcome already sees the free slot.

use std::{
  panic::{AssertUnwindSafe, catch_unwind},
  sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
  },
};

use tokio::{runtime::Handle, sync::mpsc};
use tracing::{debug, error, warn};

use crate::{
  capability::{PchCreator, PchCreatorFactory, SchedulerTask, TaskScheduling},
  domain::pch::{PchTaskKind, SlotUsage, TaskOutcome},
};

pub struct TaskScheduler {
  kind: PchTaskKind,
  slots: usize,
  used: Arc<AtomicUsize>,
  /// Idle creators, reused across tasks
  creators: Arc<Mutex<Vec<Box<dyn PchCreator>>>>,
  factory: Arc<dyn PchCreatorFactory>,
  outcomes: mpsc::Sender<TaskOutcome>,
  runtime: Handle,
}

impl TaskScheduler {
  /// Must be called from within a tokio runtime.
  pub fn new(
    kind: PchTaskKind,
    slots: usize,
    factory: Arc<dyn PchCreatorFactory>,
    outcomes: mpsc::Sender<TaskOutcome>,
  ) -> Self {
    Self {
      kind,
      slots,
      used: Arc::new(AtomicUsize::new(0)),
      creators: Arc::new(Mutex::new(Vec::new())),
      factory,
      outcomes,
      runtime: Handle::current(),
    }
  }
}

impl TaskScheduling for TaskScheduler {
  fn slot_usage(&self) -> SlotUsage {
    let used = self.used.load(Ordering::Acquire);
    SlotUsage {
      free: self.slots.saturating_sub(used),
      used,
    }
  }

  fn add_tasks(&mut self, tasks: Vec<SchedulerTask>) {
    let free = self.slot_usage().free;
    if tasks.len() > free {
      // Queue bug; run them anyway rather than drop work
      error!(kind = ?self.kind, tasks = tasks.len(), free, "More tasks than free slots");
    }

    for task in tasks {
      self.used.fetch_add(1, Ordering::AcqRel);

      let used = Arc::clone(&self.used);
      let creators = Arc::clone(&self.creators);
      let factory = Arc::clone(&self.factory);
      let outcomes = self.outcomes.clone();

      self.runtime.spawn_blocking(move || {
        let SchedulerTask {
          kind,
          project_part_ids,
          job,
        } = task;

        let mut creator = take_creator(&creators).unwrap_or_else(|| factory.create());
        let result = catch_unwind(AssertUnwindSafe(|| job(creator.as_mut())));

        let pch_path = match result {
          Ok(pch) => {
            creator.clear();
            return_creator(&creators, creator);
            pch.pch_path
          }
          Err(_) => {
            // The creator may be in any state, drop it
            error!(kind = ?kind, ids = ?project_part_ids, "PCH creator panicked");
            None
          }
        };

        used.fetch_sub(1, Ordering::AcqRel);

        let outcome = TaskOutcome {
          kind,
          project_part_ids,
          pch_path,
        };
        debug!(kind = ?outcome.kind, ids = ?outcome.project_part_ids, built = outcome.is_built(), "PCH task finished");

        if outcomes.blocking_send(outcome).is_err() {
          warn!("Control loop gone, dropping task outcome");
        }
      });
    }
  }
}

fn take_creator(creators: &Mutex<Vec<Box<dyn PchCreator>>>) -> Option<Box<dyn PchCreator>> {
  creators.lock().ok().and_then(|mut pool| pool.pop())
}

fn return_creator(creators: &Mutex<Vec<Box<dyn PchCreator>>>, creator: Box<dyn PchCreator>) {
  if let Ok(mut pool) = creators.lock() {
    pool.push(creator);
  }
}
