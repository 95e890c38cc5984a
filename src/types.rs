//! Core data types shared across the cache, extractor, store and scheduler.

use glam::{IVec3, Vec3};

use crate::constants::CHUNK_SIZE;

/// World-space chunk coordinate: `floor(voxel / CHUNK_SIZE)` on each axis.
pub type ChunkCoord = IVec3;

/// World-space voxel coordinate.
pub type VoxelCoord = IVec3;

/// Convert a voxel coordinate to the chunk coordinate that owns it.
#[inline]
pub fn voxel_to_chunk(voxel: VoxelCoord) -> ChunkCoord {
  IVec3::new(
    voxel.x.div_euclid(CHUNK_SIZE),
    voxel.y.div_euclid(CHUNK_SIZE),
    voxel.z.div_euclid(CHUNK_SIZE),
  )
}

/// Convert a chunk coordinate to the world-space position of its `(0,0,0)`
/// corner.
#[inline]
pub fn chunk_origin(chunk: ChunkCoord) -> VoxelCoord {
  chunk * CHUNK_SIZE
}

/// Per-voxel classification produced by the extractor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockType {
  /// Field value positive at the voxel center: outside any solid.
  Exterior,
  /// Field value non-positive and no edge crossing: fully inside a solid.
  Interior,
  /// At least one of the voxel's edges carried a sign change; has a vertex.
  Surface,
  /// No chunk has been generated for this voxel's coordinate yet.
  Unloaded,
}

/// Sentinel states for the chunk-coordinate → vertex-count map, distinct
/// from any real vertex count (spec §3).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VertexCount {
  /// Chunk has no surface: entirely outside every primitive.
  Empty,
  /// Chunk is entirely inside a solid.
  Interior,
  /// Chunk is known to need generation but has no current mesh.
  Dirty,
  /// Chunk has a real mesh with this many vertices, `1 <= n < MAX_CHUNK_VERTS`.
  Count(u16),
}

impl VertexCount {
  /// `true` for the two sentinels meaning "no mesh and none needed right
  /// now" (as opposed to `Dirty`, which wants a mesh).
  pub fn is_resolved_empty(&self) -> bool {
    matches!(self, VertexCount::Empty | VertexCount::Interior)
  }

  pub fn as_count(&self) -> Option<u16> {
    match self {
      VertexCount::Count(n) => Some(*n),
      _ => None,
    }
  }
}

/// One dual-contouring mesh vertex.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Vertex {
  /// Position in world coordinates.
  pub position: [f32; 3],
  /// Smoothed, safe-normalized surface normal.
  pub normal: [f32; 3],
  /// Packed per-vertex flags (implementation-defined use by collaborators).
  pub info: [u8; 4],
  /// One-hot material weights (0 or 255), one channel per dominant
  /// material candidate.
  pub material_weights: [u8; 4],
}

impl Default for Vertex {
  fn default() -> Self {
    Self {
      position: [0.0; 3],
      normal: [0.0, 1.0, 0.0],
      info: [0; 4],
      material_weights: [255, 0, 0, 0],
    }
  }
}

/// Axis-aligned bounding box, world units.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
  pub min: Vec3,
  pub max: Vec3,
}

impl Aabb {
  pub fn empty() -> Self {
    Self {
      min: Vec3::splat(f32::INFINITY),
      max: Vec3::splat(f32::NEG_INFINITY),
    }
  }

  pub fn new(min: Vec3, max: Vec3) -> Self {
    Self { min, max }
  }

  /// Build an AABB from a chunk coordinate, at a given voxel size.
  pub fn from_chunk(chunk: ChunkCoord, voxel_size: f32) -> Self {
    let origin = chunk_origin(chunk).as_vec3() * voxel_size;
    let size = Vec3::splat(CHUNK_SIZE as f32 * voxel_size);
    Self {
      min: origin,
      max: origin + size,
    }
  }

  #[inline]
  pub fn encapsulate(&mut self, point: Vec3) {
    self.min = self.min.min(point);
    self.max = self.max.max(point);
  }

  #[inline]
  pub fn expanded(&self, margin: f32) -> Self {
    Self {
      min: self.min - Vec3::splat(margin),
      max: self.max + Vec3::splat(margin),
    }
  }

  #[inline]
  pub fn union(&self, other: &Aabb) -> Self {
    Self {
      min: self.min.min(other.min),
      max: self.max.max(other.max),
    }
  }

  #[inline]
  pub fn intersects(&self, other: &Aabb) -> bool {
    self.min.x <= other.max.x
      && self.max.x >= other.min.x
      && self.min.y <= other.max.y
      && self.max.y >= other.min.y
      && self.min.z <= other.max.z
      && self.max.z >= other.min.z
  }

  #[inline]
  pub fn contains_point(&self, p: Vec3) -> bool {
    p.x >= self.min.x
      && p.x <= self.max.x
      && p.y >= self.min.y
      && p.y <= self.max.y
      && p.z >= self.min.z
      && p.z <= self.max.z
  }

  pub fn is_valid(&self) -> bool {
    self.min.x <= self.max.x && self.min.y <= self.max.y && self.min.z <= self.max.z
  }
}

impl Default for Aabb {
  fn default() -> Self {
    Self::empty()
  }
}

/// Output mesh for one chunk: a flat vertex/index pair, ready for upload.
#[derive(Default, Clone)]
pub struct ChunkMesh {
  pub vertices: Vec<Vertex>,
  pub indices: Vec<u16>,
}

impl ChunkMesh {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn is_empty(&self) -> bool {
    self.vertices.is_empty()
  }

  pub fn triangle_count(&self) -> usize {
    self.indices.len() / 3
  }

  /// Serialize to the wire layout of spec §6:
  /// `[position: f32x3, normal: f32x3, info: u8x4, materials: u8x4]` packed
  /// vertices, `u16` indices.
  pub fn vertex_bytes(&self) -> Vec<u8> {
    let mut out = Vec::with_capacity(self.vertices.len() * 32);
    for v in &self.vertices {
      out.extend_from_slice(bytemuck_f32x3(&v.position));
      out.extend_from_slice(bytemuck_f32x3(&v.normal));
      out.extend_from_slice(&v.info);
      out.extend_from_slice(&v.material_weights);
    }
    out
  }

  pub fn index_bytes(&self) -> Vec<u8> {
    let mut out = Vec::with_capacity(self.indices.len() * 2);
    for i in &self.indices {
      out.extend_from_slice(&i.to_le_bytes());
    }
    out
  }
}

fn bytemuck_f32x3(v: &[f32; 3]) -> [u8; 12] {
  let mut out = [0u8; 12];
  out[0..4].copy_from_slice(&v[0].to_le_bytes());
  out[4..8].copy_from_slice(&v[1].to_le_bytes());
  out[8..12].copy_from_slice(&v[2].to_le_bytes());
  out
}

/// Result of a raycast query (spec §6).
#[derive(Clone, Copy, Debug)]
pub struct RaycastResult {
  pub hit: bool,
  pub block_type: BlockType,
  pub distance: f32,
  pub posi: VoxelCoord,
  pub posf: Vec3,
  pub normal: Vec3,
  pub touched_unloaded: bool,
}

impl RaycastResult {
  pub fn miss() -> Self {
    Self {
      hit: false,
      block_type: BlockType::Exterior,
      distance: f32::INFINITY,
      posi: IVec3::ZERO,
      posf: Vec3::splat(f32::INFINITY),
      normal: Vec3::splat(f32::INFINITY),
      touched_unloaded: false,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn voxel_to_chunk_handles_negative_coords() {
    assert_eq!(voxel_to_chunk(IVec3::new(-1, -1, -1)), IVec3::new(-1, -1, -1));
    assert_eq!(voxel_to_chunk(IVec3::new(-32, 0, 31)), IVec3::new(-1, 0, 0));
    assert_eq!(voxel_to_chunk(IVec3::new(32, 0, 0)), IVec3::new(1, 0, 0));
  }

  #[test]
  fn aabb_union_and_intersect() {
    let a = Aabb::new(Vec3::ZERO, Vec3::ONE);
    let b = Aabb::new(Vec3::splat(0.5), Vec3::splat(2.0));
    assert!(a.intersects(&b));
    let u = a.union(&b);
    assert_eq!(u.min, Vec3::ZERO);
    assert_eq!(u.max, Vec3::splat(2.0));
  }

  #[test]
  fn vertex_count_sentinels_distinct_from_counts() {
    assert!(VertexCount::Empty.is_resolved_empty());
    assert!(VertexCount::Interior.is_resolved_empty());
    assert!(!VertexCount::Dirty.is_resolved_empty());
    assert!(!VertexCount::Count(5).is_resolved_empty());
  }
}
