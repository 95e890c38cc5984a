//! One extraction job's working set: the chunk it targets and the scratch
//! SDF cache it fills and reads from (spec §4.2, §4.5).
//!
//! Scratch caches are recycled across dispatches by the scheduler rather
//! than reallocated per job — the cache cube is a fixed size
//! (`CACHE_DIM^3` floats) so reuse just means clearing and refilling it.

use std::sync::Arc;

use web_time::Instant;

use crate::cache::SdfCache;
use crate::extractor::{self, ChunkExtraction};
use crate::sdf::SdfField;
use crate::types::ChunkCoord;

/// Everything one worker-pool job needs to run to completion without
/// touching anything outside its own scratch state.
pub struct ExtractionJob {
  pub coord: ChunkCoord,
  pub cache: SdfCache,
}

impl ExtractionJob {
  pub fn new(coord: ChunkCoord, cache: SdfCache) -> Self {
    Self { coord, cache }
  }

  /// Fill the scratch cache from `field` and run the extractor. Returns
  /// the result plus the cache, so the scheduler can hand the cache back
  /// to its scratch pool.
  pub fn run(mut self, field: Arc<SdfField>, chunk_origin: ChunkCoord, voxel_size: f32) -> JobOutput {
    self.cache.fill(&field, chunk_origin, voxel_size);
    let started = Instant::now();
    let extraction = extractor::extract(&self.cache, &field);
    let duration_us = started.elapsed().as_micros().min(u64::MAX as u128) as u64;
    JobOutput {
      coord: self.coord,
      extraction,
      cache: self.cache,
      duration_us,
    }
  }
}

/// Result of a completed job, carrying the scratch cache back for reuse.
pub struct JobOutput {
  pub coord: ChunkCoord,
  pub extraction: ChunkExtraction,
  pub cache: SdfCache,
  /// Wall-clock time the extraction step itself took, for
  /// [`crate::metrics::SchedulerMetrics::record_completion`].
  pub duration_us: u64,
}
