//! Engine-agnostic scheduler/extraction metrics, feature-gated and
//! runtime-toggled so they cost nothing when unused (spec §2.1 ambient
//! stack, supplemented per SPEC_FULL §3).

use std::collections::VecDeque;
use std::sync::atomic::AtomicBool;
#[cfg(feature = "metrics")]
use std::sync::atomic::Ordering;

/// Runtime toggle for metrics collection.
pub static COLLECT_METRICS: AtomicBool = AtomicBool::new(true);

#[inline]
pub fn is_enabled() -> bool {
  #[cfg(feature = "metrics")]
  {
    COLLECT_METRICS.load(Ordering::Relaxed)
  }
  #[cfg(not(feature = "metrics"))]
  {
    false
  }
}

/// Fixed-capacity ring buffer over recent samples.
#[derive(Debug, Clone)]
pub struct RollingWindow<T> {
  buffer: VecDeque<T>,
  capacity: usize,
}

impl<T> RollingWindow<T> {
  pub fn new(capacity: usize) -> Self {
    Self {
      buffer: VecDeque::with_capacity(capacity),
      capacity,
    }
  }

  pub fn push(&mut self, value: T) {
    if self.buffer.len() >= self.capacity {
      self.buffer.pop_front();
    }
    self.buffer.push_back(value);
  }

  pub fn len(&self) -> usize {
    self.buffer.len()
  }

  pub fn is_empty(&self) -> bool {
    self.buffer.is_empty()
  }

  pub fn clear(&mut self) {
    self.buffer.clear();
  }

  pub fn iter(&self) -> impl Iterator<Item = &T> {
    self.buffer.iter()
  }

  pub fn last(&self) -> Option<&T> {
    self.buffer.back()
  }
}

impl RollingWindow<u64> {
  pub fn average(&self) -> f64 {
    if self.buffer.is_empty() {
      0.0
    } else {
      self.buffer.iter().sum::<u64>() as f64 / self.buffer.len() as f64
    }
  }

  pub fn min_max(&self) -> Option<(u64, u64)> {
    if self.buffer.is_empty() {
      None
    } else {
      Some((*self.buffer.iter().min().unwrap(), *self.buffer.iter().max().unwrap()))
    }
  }
}

impl Default for RollingWindow<u64> {
  fn default() -> Self {
    Self::new(128)
  }
}

/// Per-tick scheduler statistics (spec §7 "equilibrium reached" tracking,
/// plus dispatch/steal counters from §4.5).
#[derive(Debug, Clone)]
pub struct SchedulerMetrics {
  pub jobs_dispatched: u64,
  pub jobs_completed: u64,
  pub jobs_stolen: u64,
  pub dirty_chunks_enqueued: u64,
  pub extraction_timings_us: RollingWindow<u64>,
  pub last_tick_jobs_completed: u32,
}

impl Default for SchedulerMetrics {
  fn default() -> Self {
    Self {
      jobs_dispatched: 0,
      jobs_completed: 0,
      jobs_stolen: 0,
      dirty_chunks_enqueued: 0,
      extraction_timings_us: RollingWindow::new(128),
      last_tick_jobs_completed: 0,
    }
  }
}

impl SchedulerMetrics {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn record_dispatch(&mut self) {
    if is_enabled() {
      self.jobs_dispatched += 1;
    }
  }

  pub fn record_steal(&mut self) {
    if is_enabled() {
      self.jobs_stolen += 1;
    }
  }

  pub fn record_completion(&mut self, timing_us: u64) {
    if is_enabled() {
      self.jobs_completed += 1;
      self.last_tick_jobs_completed += 1;
      self.extraction_timings_us.push(timing_us);
    }
  }

  pub fn record_dirty_enqueue(&mut self, count: u64) {
    if is_enabled() {
      self.dirty_chunks_enqueued += count;
    }
  }

  /// Call once per scheduler tick so the "completed this tick" counter
  /// resets, matching the spec's "equilibrium reached when zero jobs
  /// complete in a tick" signal.
  pub fn begin_tick(&mut self) {
    self.last_tick_jobs_completed = 0;
  }

  pub fn avg_extraction_us(&self) -> f64 {
    self.extraction_timings_us.average()
  }
}
