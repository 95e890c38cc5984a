//! voxel_terrain - engine-agnostic dual-contouring voxel terrain core
//!
//! This crate turns a composed signed distance field into chunked,
//! Surface-Nets-style meshes and keeps them in sync with a moving view
//! window and live edits. The primary pipeline is:
//!
//! - [`sdf`]: tagged SDF primitives folded through blend operators into one
//!   composed field, with edits buffered until a safe commit point.
//! - [`cache`]: a per-chunk, halo-padded cache of field samples the
//!   extractor reads from instead of re-evaluating the field per edge.
//! - [`extractor`]: dual contouring over a cached chunk — one QEF-solved
//!   vertex per voxel with a sign-changing edge.
//! - [`scheduler`]: drives the chunk lifecycle — dirty propagation, view
//!   enumeration, priority dispatch to a worker pool, and safe edit commits.
//! - [`query`]: voxel-grid DDA raycasts plus sphere sweep/push-out queries
//!   against resident chunks and the live field.
//!
//! # Example
//!
//! ```ignore
//! use voxel_terrain::{EngineConfig, Scheduler, SchedulerConfig};
//! use voxel_terrain::sdf::SdfField;
//!
//! let field = SdfField::new(1.0);
//! let mut scheduler = Scheduler::new(field, SchedulerConfig::default());
//! scheduler.tick();
//! ```

pub mod cache;
pub mod chunk;
pub mod constants;
pub mod edge_table;
pub mod extractor;
pub mod job;
pub mod metrics;
pub mod query;
pub mod render;
pub mod scheduler;
pub mod sdf;
pub mod threading;
pub mod types;

pub use chunk::{Chunk, ChunkStore};
pub use query::{get_collision, get_voxel, raycast_fast, raycast_precise, sphere_push_out, sphere_sweep, SweepHit};
pub use render::Renderer;
pub use scheduler::{Scheduler, SchedulerConfig};
pub use sdf::{BlendOp, Primitive, SdfField, Shape, ShapeHandle};
pub use types::{Aabb, BlockType, ChunkCoord, ChunkMesh, RaycastResult, Vertex, VertexCount, VoxelCoord};

/// Construction-time engine options, mirroring the teacher's builder-style
/// configs: every field has a sensible default, and `with_*` methods chain.
#[derive(Clone, Copy, Debug)]
pub struct EngineConfig {
  pub voxel_size: f32,
  pub worker_thread_count: usize,
  pub chunk_pool_capacity: usize,
  pub view_radius_chunks: i32,
  /// When `false`, [`Scheduler::render`] is a no-op (spec §6 `renderEnabled`
  /// — headless/testing).
  pub render_enabled: bool,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      voxel_size: 1.0,
      worker_thread_count: 0,
      chunk_pool_capacity: 512,
      view_radius_chunks: 8,
      render_enabled: true,
    }
  }
}

impl EngineConfig {
  pub fn with_voxel_size(mut self, voxel_size: f32) -> Self {
    self.voxel_size = voxel_size;
    self
  }

  /// `0` lets rayon size its own pool from available parallelism.
  pub fn with_worker_thread_count(mut self, count: usize) -> Self {
    self.worker_thread_count = count;
    self
  }

  pub fn with_chunk_pool_capacity(mut self, capacity: usize) -> Self {
    self.chunk_pool_capacity = capacity;
    self
  }

  pub fn with_view_radius_chunks(mut self, radius: i32) -> Self {
    self.view_radius_chunks = radius;
    self
  }

  pub fn with_render_enabled(mut self, render_enabled: bool) -> Self {
    self.render_enabled = render_enabled;
    self
  }

  fn into_scheduler_config(self) -> scheduler::SchedulerConfig {
    scheduler::SchedulerConfig {
      worker_capacity: if self.worker_thread_count == 0 {
        rayon::current_num_threads() * 2
      } else {
        self.worker_thread_count
      },
      chunk_pool_capacity: self.chunk_pool_capacity,
      view_radius_chunks: self.view_radius_chunks,
      voxel_size: self.voxel_size,
      render_enabled: self.render_enabled,
    }
  }
}

impl Scheduler {
  /// Build a scheduler from an [`EngineConfig`] instead of a raw
  /// [`SchedulerConfig`], for callers who only care about the public
  /// surface.
  pub fn with_engine_config(field: SdfField, config: EngineConfig) -> Self {
    Scheduler::new(field, config.into_scheduler_config())
  }
}
