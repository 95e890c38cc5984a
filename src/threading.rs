//! Cross-platform worker pool built on `rayon::spawn`.
//!
//! Jobs are fire-and-forget: `spawn` returns a [`TaskId`] immediately, and
//! the scheduler polls for completions each tick rather than blocking on
//! them. This keeps the owning thread free to keep enumerating and
//! prioritizing work while jobs run (spec §4.5).

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Unique identifier for a spawned job.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TaskId(u64);

impl TaskId {
  fn next() -> Self {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    Self(COUNTER.fetch_add(1, Ordering::Relaxed))
  }
}

struct TaskResult {
  data: Box<dyn std::any::Any + Send>,
}

/// Worker pool for CPU-bound, run-to-completion extraction jobs.
///
/// `rayon::spawn` manages the actual OS threads; this type only tracks
/// which jobs are in flight and stashes their results for the scheduler to
/// collect. Cloning shares the same underlying pool and result tables.
pub struct TaskExecutor {
  results: Arc<Mutex<HashMap<TaskId, TaskResult>>>,
  pending: Arc<Mutex<HashSet<TaskId>>>,
  capacity: usize,
}

impl TaskExecutor {
  /// `capacity` bounds how many jobs the scheduler is allowed to have in
  /// flight at once; it does not configure rayon's thread count (rayon
  /// manages its own pool, use `rayon::ThreadPoolBuilder` for that).
  pub fn new(capacity: usize) -> Self {
    Self {
      results: Arc::new(Mutex::new(HashMap::new())),
      pending: Arc::new(Mutex::new(HashSet::new())),
      capacity,
    }
  }

  /// Spawn a job. Panics-in-job are not caught; a job that unwinds simply
  /// never reports a result, which the scheduler's job-timeout handling
  /// (none currently implemented) would need to cover — for now a stuck
  /// job occupies a capacity slot until the process restarts.
  pub fn spawn<F, T>(&self, work: F) -> TaskId
  where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
  {
    let task_id = TaskId::next();
    self.pending.lock().unwrap().insert(task_id);

    let results = Arc::clone(&self.results);
    let pending = Arc::clone(&self.pending);

    rayon::spawn(move || {
      let result = work();
      results.lock().unwrap().insert(task_id, TaskResult { data: Box::new(result) });
      pending.lock().unwrap().remove(&task_id);
    });

    task_id
  }

  pub fn poll<T: 'static>(&self, task_id: TaskId) -> Option<T> {
    let mut results = self.results.lock().unwrap();
    results.remove(&task_id).and_then(|r| r.data.downcast::<T>().ok()).map(|b| *b)
  }

  pub fn is_pending(&self, task_id: TaskId) -> bool {
    self.pending.lock().unwrap().contains(&task_id)
  }

  pub fn pending_count(&self) -> usize {
    self.pending.lock().unwrap().len()
  }

  pub fn is_idle(&self) -> bool {
    self.pending_count() == 0
  }

  pub fn capacity(&self) -> usize {
    self.capacity
  }

  pub fn has_free_slot(&self) -> bool {
    self.pending_count() < self.capacity
  }
}

impl Clone for TaskExecutor {
  fn clone(&self) -> Self {
    Self {
      results: Arc::clone(&self.results),
      pending: Arc::clone(&self.pending),
      capacity: self.capacity,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::time::{Duration, Instant};

  fn poll_until<T: 'static>(executor: &TaskExecutor, id: TaskId) -> T {
    let start = Instant::now();
    loop {
      if let Some(v) = executor.poll::<T>(id) {
        return v;
      }
      assert!(start.elapsed() < Duration::from_secs(5), "task never completed");
      std::thread::sleep(Duration::from_millis(1));
    }
  }

  #[test]
  fn spawn_and_poll_roundtrips_result() {
    let executor = TaskExecutor::new(4);
    let id = executor.spawn(|| 42i32);
    assert_eq!(poll_until::<i32>(&executor, id), 42);
  }

  #[test]
  fn free_slot_tracks_pending_count_against_capacity() {
    let executor = TaskExecutor::new(1);
    assert!(executor.has_free_slot());
    let (tx, rx) = std::sync::mpsc::channel::<()>();
    let id = executor.spawn(move || {
      rx.recv().ok();
      1u8
    });
    assert!(executor.is_pending(id));
    assert!(!executor.has_free_slot());
    tx.send(()).unwrap();
    let _ = poll_until::<u8>(&executor, id);
    assert!(executor.has_free_slot());
  }
}
