//! Compile-time layout constants shared by the cache, extractor and chunk
//! store.
//!
//! # Coordinate system
//!
//! World coordinates are floating point; voxel coordinates are signed
//! integers; chunk coordinates are signed integers with [`CHUNK_SIZE`]
//! voxels on a side. A voxel at integer `(x, y, z)` belongs to chunk
//! `floor((x, y, z) / CHUNK_SIZE)`.

/// Number of voxels per chunk axis.
pub const CHUNK_SIZE: i32 = 32;

/// `CHUNK_SIZE` widened to `usize` for buffer sizing.
pub const CHUNK_SIZE_USIZE: usize = CHUNK_SIZE as usize;

/// Halo padding (in voxels) around a chunk's SDF cache so trilinear
/// interpolation near the boundary is valid.
pub const CACHE_HALO: i32 = 1;

/// Side length of the SDF cache cube: `CHUNK_SIZE + 2 * CACHE_HALO`.
pub const CACHE_DIM: i32 = CHUNK_SIZE + 2 * CACHE_HALO;

/// `CACHE_DIM` widened to `usize`.
pub const CACHE_DIM_USIZE: usize = CACHE_DIM as usize;

/// Upper bound on vertices a single chunk mesh may hold. Vertex count must
/// fit in the 16-bit index type, so this is kept comfortably under
/// `u16::MAX`.
pub const MAX_CHUNK_VERTS: usize = 1 << 15;

/// Upper bound on triangle indices a single chunk mesh may hold.
pub const MAX_CHUNK_INDICES: usize = MAX_CHUNK_VERTS * 3;

/// Gradient finite-difference epsilon, in voxel units (spec §4.1).
pub const DERIVATIVE_EPSILON_VOXELS: f32 = 0.2;

/// Midpoint search convergence threshold on `|value(p)|` (spec §4.3).
pub const EDGE_CONVERGENCE_EPSILON: f32 = 1e-3;

/// Maximum number of midpoint-search steps along a sign-changing edge.
pub const EDGE_SEARCH_STEPS: u32 = 16;

/// Number of QEF gradient-descent iterations (spec §4.3).
pub const QEF_ITERATIONS: u32 = 10;

/// Damping factor applied to each QEF correction step.
pub const QEF_STEP: f32 = 0.5;

/// Tiny positive nudge applied to exact-zero field samples so coincident
/// vertices cannot be produced for the same point (spec §4.3).
pub const ZERO_NUDGE: f32 = 1e-6;

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn cache_covers_chunk_plus_halo() {
    assert_eq!(CACHE_DIM, CHUNK_SIZE + 2);
    assert_eq!(CACHE_DIM_USIZE, CACHE_DIM as usize);
  }

  #[test]
  fn index_type_bound_respected() {
    assert!(MAX_CHUNK_VERTS < u16::MAX as usize);
  }
}
