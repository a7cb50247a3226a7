use std::fmt;

/// Callback receiving `(completed, total)` after every change.
pub type ProgressReporter = Box<dyn FnMut(usize, usize) + Send>;

/// Tracks how much queued PCH work is done.
///
/// Purely observational: nothing in the queue reads these numbers back.
/// `total` never goes below zero, and both counters reset once every queued
/// task has been reported done.
pub struct ProgressCounter {
  total: usize,
  completed: usize,
  reporter: ProgressReporter,
}

impl ProgressCounter {
  pub fn new(reporter: ProgressReporter) -> Self {
    Self {
      total: 0,
      completed: 0,
      reporter,
    }
  }

  /// Counter that reports nowhere.
  pub fn silent() -> Self {
    Self::new(Box::new(|_, _| {}))
  }

  pub fn add_total(&mut self, count: usize) {
    if count == 0 {
      return;
    }
    self.total += count;
    self.report();
  }

  pub fn remove_total(&mut self, count: usize) {
    if count == 0 {
      return;
    }
    self.total = self.total.saturating_sub(count);
    self.completed = self.completed.min(self.total);
    self.report();
  }

  pub fn add_progress(&mut self, count: usize) {
    if count == 0 {
      return;
    }
    self.completed = (self.completed + count).min(self.total);
    self.report();
  }

  pub fn total(&self) -> usize {
    self.total
  }

  pub fn completed(&self) -> usize {
    self.completed
  }

  fn report(&mut self) {
    (self.reporter)(self.completed, self.total);

    if self.completed >= self.total {
      self.completed = 0;
      self.total = 0;
    }
  }
}

impl fmt::Debug for ProgressCounter {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ProgressCounter")
      .field("total", &self.total)
      .field("completed", &self.completed)
      .finish_non_exhaustive()
  }
}
