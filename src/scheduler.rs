//! Chunk lifecycle scheduler: dirty propagation, view-window enumeration,
//! priority dispatch, completion collection, and safe SDF-edit commits
//! (spec §4.5).
//!
//! Six phases run every [`Scheduler::tick`]:
//!
//! A. Propagate any primitive AABB deltas committed since the last tick
//!    into dirty chunk marks, so phase C's dispatch list already reflects
//!    them.
//! B. Enumerate the chunk coordinates inside the current view window.
//! C. Score and sort the chunks that need a job (new or dirty, and not
//!    already in flight) by distance to the view center.
//! D. Collect any jobs the worker pool finished since the last tick and
//!    publish their meshes.
//! E. Commit pending SDF edits, but only once the pool is fully idle —
//!    mid-flight jobs must never observe a half-applied edit. The deltas
//!    this produces are propagated by the *next* tick's phase A, since
//!    that's the next point the pool is guaranteed idle enough to touch
//!    the shared field again.
//! F. Dispatch new jobs up to the pool's free capacity.

use std::collections::HashMap;
use std::sync::Arc;

use glam::Vec3;

use crate::cache::SdfCache;
use crate::chunk::ChunkStore;
use crate::constants::CHUNK_SIZE;
use crate::job::{ExtractionJob, JobOutput};
use crate::metrics::SchedulerMetrics;
use crate::render::Renderer;
use crate::sdf::SdfField;
use crate::threading::TaskExecutor;
use crate::types::{chunk_origin, ChunkCoord};

/// Construction-time and runtime-tunable scheduler configuration.
pub struct SchedulerConfig {
  pub worker_capacity: usize,
  pub chunk_pool_capacity: usize,
  pub view_radius_chunks: i32,
  pub voxel_size: f32,
  /// When `false`, [`Scheduler::render`] is a no-op (spec §6 `renderEnabled`
  /// — headless/testing).
  pub render_enabled: bool,
}

impl Default for SchedulerConfig {
  fn default() -> Self {
    Self {
      worker_capacity: 4,
      chunk_pool_capacity: 512,
      view_radius_chunks: 8,
      voxel_size: 1.0,
      render_enabled: true,
    }
  }
}

pub struct Scheduler {
  field: Arc<SdfField>,
  store: ChunkStore,
  executor: TaskExecutor,
  in_flight: Vec<(ChunkCoord, crate::threading::TaskId)>,
  scratch_pool: Vec<SdfCache>,
  view_radius: i32,
  voxel_size: f32,
  view_center: ChunkCoord,
  metrics: SchedulerMetrics,
  render_enabled: bool,
  /// Generation last handed to the renderer for each uploaded coordinate,
  /// so `render` re-uploads a chunk only once its mesh actually changed.
  render_uploaded: HashMap<ChunkCoord, u32>,
}

impl Scheduler {
  pub fn new(field: SdfField, config: SchedulerConfig) -> Self {
    Self {
      field: Arc::new(field),
      store: ChunkStore::new(config.chunk_pool_capacity, config.voxel_size),
      executor: TaskExecutor::new(config.worker_capacity),
      in_flight: Vec::new(),
      scratch_pool: Vec::new(),
      view_radius: config.view_radius_chunks,
      voxel_size: config.voxel_size,
      view_center: ChunkCoord::ZERO,
      metrics: SchedulerMetrics::new(),
      render_enabled: config.render_enabled,
      render_uploaded: HashMap::new(),
    }
  }

  pub fn set_view_center(&mut self, world_position: Vec3) {
    let voxel = (world_position / self.voxel_size).floor().as_ivec3();
    self.view_center = crate::types::voxel_to_chunk(voxel);
  }

  /// Queue an edit against the live field. Safe to call any time; the edit
  /// only becomes visible once phase E commits it with the pool idle.
  pub fn queue_edit(&mut self, edit: impl FnOnce(&mut SdfField)) {
    match Arc::get_mut(&mut self.field) {
      Some(field) => edit(field),
      None => {
        // Workers are mid-flight and hold their own Arc clone of the
        // pre-edit field; this should not happen because edits only run
        // from the owner thread between ticks, but if it does, the edit is
        // dropped rather than corrupting shared state. Scheduling a
        // touch on the next tick (once workers drain) is the caller's
        // responsibility if this matters.
        debug_assert!(false, "queue_edit called while jobs are in flight");
      }
    }
  }

  pub fn metrics(&self) -> &SchedulerMetrics {
    &self.metrics
  }

  pub fn store(&self) -> &ChunkStore {
    &self.store
  }

  pub fn field(&self) -> &SdfField {
    &self.field
  }

  #[cfg_attr(feature = "tracing", tracing::instrument(skip(self)))]
  pub fn tick(&mut self) {
    self.metrics.begin_tick();
    self.phase_a_propagate_dirty();
    let wanted = self.phase_b_enumerate_view();
    let ordered = self.phase_c_prioritize(wanted);
    self.phase_d_collect_completions();
    self.phase_e_commit_pending();
    self.phase_f_dispatch(ordered);

    #[cfg(feature = "tracing")]
    if self.at_equilibrium() {
      tracing::debug!(
        resident = self.store.len(),
        "scheduler reached equilibrium: no jobs in flight, nothing completed this tick"
      );
    }
  }

  /// True once a tick produced no completions and no dispatches — the
  /// steady-state signal callers can poll to know meshing has caught up
  /// with the current view and edit queue (spec §7).
  pub fn at_equilibrium(&self) -> bool {
    self.in_flight.is_empty() && self.metrics.last_tick_jobs_completed == 0
  }

  /// Propagate primitive AABB deltas committed by a previous tick's phase E
  /// into dirty chunk marks (spec §4.5 Phase A). Only safe to touch the
  /// shared field via `Arc::get_mut` when no job holds its own clone — the
  /// same idle-pool precondition phase E itself requires.
  fn phase_a_propagate_dirty(&mut self) {
    if !self.executor.is_idle() {
      return;
    }
    let Some(field) = Arc::get_mut(&mut self.field) else {
      return;
    };
    let regions = field.drain_dirty_regions();
    if regions.is_empty() {
      return;
    }
    let halo_margin = self.voxel_size * (CHUNK_SIZE as f32);
    for (previous, current) in regions {
      let affected = previous.expanded(halo_margin).union(&current.expanded(halo_margin));
      self.mark_region_dirty(affected);
    }
  }

  fn phase_b_enumerate_view(&self) -> Vec<ChunkCoord> {
    let r = self.view_radius;
    let mut coords = Vec::with_capacity(((2 * r + 1).pow(3)) as usize);
    for z in -r..=r {
      for y in -r..=r {
        for x in -r..=r {
          coords.push(self.view_center + ChunkCoord::new(x, y, z));
        }
      }
    }
    coords
  }

  fn phase_c_prioritize(&self, candidates: Vec<ChunkCoord>) -> Vec<ChunkCoord> {
    let mut needing_job: Vec<ChunkCoord> = candidates
      .into_iter()
      .filter(|c| self.store.needs_job(*c) && !self.is_in_flight(*c))
      .collect();

    let center = self.view_center.as_vec3();
    needing_job.sort_by(|a, b| {
      let pa = self.priority_score(*a, center);
      let pb = self.priority_score(*b, center);
      pa.partial_cmp(&pb).unwrap_or(std::cmp::Ordering::Equal)
    });
    needing_job
  }

  fn is_in_flight(&self, coord: ChunkCoord) -> bool {
    self.in_flight.iter().any(|(c, _)| *c == coord)
  }

  /// Linear distance to the view center if any of this chunk's six
  /// axis-aligned neighbors is already resident (it borders meshed
  /// terrain, so close it quickly to avoid visible holes); squared
  /// distance otherwise, so chunks deep in unexplored space fall back
  /// in the queue relative to ones adjoining what's already there.
  fn priority_score(&self, coord: ChunkCoord, center: Vec3) -> f32 {
    const NEIGHBORS: [ChunkCoord; 6] = [
      ChunkCoord::new(1, 0, 0),
      ChunkCoord::new(-1, 0, 0),
      ChunkCoord::new(0, 1, 0),
      ChunkCoord::new(0, -1, 0),
      ChunkCoord::new(0, 0, 1),
      ChunkCoord::new(0, 0, -1),
    ];
    let dist_sq = (coord.as_vec3() - center).length_squared();
    let has_neighbor = NEIGHBORS.iter().any(|offset| self.store.contains(coord + *offset));
    if has_neighbor {
      dist_sq.sqrt()
    } else {
      dist_sq
    }
  }

  fn phase_d_collect_completions(&mut self) {
    let mut still_pending = Vec::with_capacity(self.in_flight.len());
    for (coord, task_id) in self.in_flight.drain(..) {
      match self.executor.poll::<JobOutput>(task_id) {
        Some(output) => {
          let JobOutput { extraction, cache, duration_us, .. } = output;
          // Only a genuinely new, non-empty mesh needs a pool slot; steal
          // one from the coldest resident chunk if the pool is already at
          // capacity. Empty/Interior results never reach here (spec §3,
          // §4.4): `ChunkStore::publish` routes them into the unbounded
          // sentinel map instead.
          if !extraction.mesh.is_empty()
            && !self.store.contains_meshed(coord)
            && self.store.len() >= self.store.capacity()
          {
            if self.store.evict_coldest().is_some() {
              self.metrics.record_steal();
            }
          }
          self.store.publish(coord, extraction.mesh, extraction.classification);
          self.scratch_pool.push(cache);
          self.metrics.record_completion(duration_us);
        }
        None => still_pending.push((coord, task_id)),
      }
    }
    self.in_flight = still_pending;
  }

  fn phase_e_commit_pending(&mut self) {
    if !self.executor.is_idle() {
      return;
    }
    let Some(field) = Arc::get_mut(&mut self.field) else {
      return;
    };
    if !field.has_pending() {
      return;
    }
    // The AABB deltas this produces aren't marked dirty here — that's
    // phase A's job, on whichever tick next finds the pool idle enough to
    // drain them (spec §4.5).
    field.commit_pending();
  }

  fn mark_region_dirty(&mut self, region: crate::types::Aabb) {
    if !region.is_valid() {
      return;
    }
    let min_chunk = crate::types::voxel_to_chunk((region.min / self.voxel_size).floor().as_ivec3());
    let max_chunk = crate::types::voxel_to_chunk((region.max / self.voxel_size).ceil().as_ivec3());
    let mut count = 0u64;
    for z in min_chunk.z..=max_chunk.z {
      for y in min_chunk.y..=max_chunk.y {
        for x in min_chunk.x..=max_chunk.x {
          let coord = ChunkCoord::new(x, y, z);
          // A coordinate the store has never seen (and that isn't
          // currently out at a worker) already reports `needs_job`
          // unconditionally; only tracked or in-flight coordinates need an
          // explicit mark — the latter so a job racing this edit still
          // gets its `dirty` signal recorded for `publish` to preserve.
          if self.store.contains(coord) || self.is_in_flight(coord) {
            self.store.mark_dirty(coord);
            count += 1;
          }
        }
      }
    }
    self.metrics.record_dirty_enqueue(count);
  }

  fn phase_f_dispatch(&mut self, ordered: Vec<ChunkCoord>) {
    for coord in ordered {
      if !self.executor.has_free_slot() {
        break;
      }

      self.store.touch(coord);
      self.store.clear_dirty_for_dispatch(coord);

      let cache = self.scratch_pool.pop().unwrap_or_default();
      let job = ExtractionJob::new(coord, cache);
      let field = Arc::clone(&self.field);
      let origin = chunk_origin(coord);
      let voxel_size = self.voxel_size;

      let task_id = self.executor.spawn(move || job.run(field, origin, voxel_size));
      self.in_flight.push((coord, task_id));
      self.metrics.record_dispatch();
    }
  }

  /// Hand freshly meshed (and not-yet-uploaded) chunks to a renderer
  /// collaborator, then ask it to draw the current frame (spec §6).
  /// A no-op when `render_enabled` is `false`.
  pub fn render<R: Renderer>(&mut self, renderer: &mut R, view_projection: [[f32; 4]; 4]) {
    if !self.render_enabled {
      return;
    }
    self.render_uploaded.retain(|coord, _| self.store.contains_meshed(*coord));
    for (coord, chunk) in self.store.iter() {
      if chunk.dirty {
        continue;
      }
      if self.render_uploaded.get(coord) == Some(&chunk.generation) {
        continue;
      }
      renderer.upload_chunk(*coord, &chunk.mesh.vertex_bytes(), &chunk.mesh.index_bytes());
      self.render_uploaded.insert(*coord, chunk.generation);
    }
    renderer.draw_chunks(view_projection);
  }
}

#[cfg(test)]
#[path = "scheduler_test.rs"]
mod scheduler_test;
