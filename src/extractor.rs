//! Dual-contouring surface extraction from a cached SDF chunk (spec §4.3).
//!
//! One vertex per voxel with at least one sign-changing edge, positioned by
//! an iterative QEF solve over that voxel's edge crossings, connected into
//! quads wherever the crossing axis edge is shared by four neighboring
//! owner cells — the classic Surface Nets topology.
//!
//! Crossing voxels at local offset `-1` along any axis are generated too:
//! they never emit geometry of their own (quad emission only walks owner
//! voxels in `0..CHUNK_SIZE`) but their vertices are referenced by quads
//! whose shared edge sits on the chunk's negative boundary.

use glam::{IVec3, Vec3};
use smallvec::SmallVec;

use crate::cache::SdfCache;
use crate::constants::{
  CHUNK_SIZE, CHUNK_SIZE_USIZE, EDGE_CONVERGENCE_EPSILON, EDGE_SEARCH_STEPS, QEF_ITERATIONS,
  QEF_STEP, ZERO_NUDGE,
};
use crate::edge_table::{EDGE_CORNERS, EDGE_TABLE};
use crate::sdf::SdfField;
use crate::types::{BlockType, ChunkMesh, Vertex};

/// Side length of the extended voxel range the extractor walks internally:
/// `CHUNK_SIZE` owner voxels plus one negative-side neighbor per axis.
const EXT_DIM: i32 = CHUNK_SIZE + 1;
const EXT_DIM_USIZE: usize = EXT_DIM as usize;

/// Result of extracting one chunk.
pub struct ChunkExtraction {
  pub mesh: ChunkMesh,
  /// Classification for every owner voxel in `[0, CHUNK_SIZE)^3`, in
  /// x-major, then y, then z order.
  pub classification: Vec<BlockType>,
}

#[derive(Clone, Copy)]
struct VoxelRecord {
  block_type: BlockType,
  vertex_index: Option<u16>,
  /// This voxel's own 8-corner sign mask, kept around so quad emission can
  /// test for a crossing on one of its corner-0 edges without re-sampling
  /// the cache.
  corner_mask: u8,
}

impl Default for VoxelRecord {
  fn default() -> Self {
    Self {
      block_type: BlockType::Exterior,
      vertex_index: None,
      corner_mask: 0,
    }
  }
}

#[inline]
fn ext_index(local: IVec3) -> usize {
  let shifted = local + IVec3::ONE;
  (shifted.z as usize * EXT_DIM_USIZE + shifted.y as usize) * EXT_DIM_USIZE + shifted.x as usize
}

/// Extract one chunk's surface from `cache`, consulting `field` only for
/// per-vertex material lookup (everything else reads the cache).
pub fn extract(cache: &SdfCache, field: &SdfField) -> ChunkExtraction {
  let mut records = vec![VoxelRecord::default(); EXT_DIM_USIZE * EXT_DIM_USIZE * EXT_DIM_USIZE];
  let mut mesh = ChunkMesh::new();

  for z in -1..CHUNK_SIZE {
    for y in -1..CHUNK_SIZE {
      for x in -1..CHUNK_SIZE {
        let local = IVec3::new(x, y, z);
        let corners = sample_corners(cache, local);
        let mask = corner_mask(&corners);
        let edge_mask = EDGE_TABLE[mask as usize];

        let record = if edge_mask == 0 {
          VoxelRecord {
            block_type: if mask == 0xFF {
              BlockType::Interior
            } else {
              BlockType::Exterior
            },
            vertex_index: None,
            corner_mask: mask,
          }
        } else {
          let vertex = solve_vertex(cache, field, local, &corners, edge_mask);
          if mesh.vertices.len() >= crate::constants::MAX_CHUNK_VERTS {
            // Capacity exceeded: degrade this voxel to unmeshed rather than
            // overflow the u16 index type (spec §7).
            #[cfg(feature = "tracing")]
            tracing::warn!(chunk_verts = mesh.vertices.len(), "chunk vertex capacity exceeded, degrading voxel");
            VoxelRecord {
              block_type: BlockType::Exterior,
              vertex_index: None,
              corner_mask: mask,
            }
          } else {
            let index = mesh.vertices.len() as u16;
            mesh.vertices.push(vertex);
            VoxelRecord {
              block_type: BlockType::Surface,
              vertex_index: Some(index),
              corner_mask: mask,
            }
          }
        };

        records[ext_index(local)] = record;
      }
    }
  }

  emit_quads(&records, &mut mesh);

  let mut classification = Vec::with_capacity(CHUNK_SIZE_USIZE * CHUNK_SIZE_USIZE * CHUNK_SIZE_USIZE);
  for z in 0..CHUNK_SIZE {
    for y in 0..CHUNK_SIZE {
      for x in 0..CHUNK_SIZE {
        classification.push(records[ext_index(IVec3::new(x, y, z))].block_type);
      }
    }
  }

  ChunkExtraction { mesh, classification }
}

/// The 8 corner field values for the voxel whose minimum corner sits at
/// `local` (cache-local voxel coordinates).
fn sample_corners(cache: &SdfCache, local: IVec3) -> [f32; 8] {
  let mut values = [0.0f32; 8];
  for (corner, value) in values.iter_mut().enumerate() {
    let offset = IVec3::new(
      (corner & 1) as i32,
      ((corner >> 1) & 1) as i32,
      ((corner >> 2) & 1) as i32,
    );
    let mut v = cache.value(local + offset);
    if v == 0.0 {
      v = ZERO_NUDGE;
    }
    *value = v;
  }
  values
}

/// Bit `c` set when corner `c`'s field value is non-positive (solid).
fn corner_mask(corners: &[f32; 8]) -> u8 {
  let mut mask = 0u8;
  for (c, value) in corners.iter().enumerate() {
    if *value <= 0.0 {
      mask |= 1 << c;
    }
  }
  mask
}

/// Solve the QEF-positioned vertex for a voxel with at least one sign
/// change among its 12 edges.
fn solve_vertex(
  cache: &SdfCache,
  field: &SdfField,
  local: IVec3,
  corners: &[f32; 8],
  edge_mask: u16,
) -> Vertex {
  // At most 12 edges per voxel; SmallVec keeps every crossing list for a
  // typical (non-full-crossing) voxel on the stack.
  let mut crossings: SmallVec<[(Vec3, Vec3); 12]> = SmallVec::new();

  for (edge, pair) in EDGE_CORNERS.iter().enumerate() {
    if edge_mask & (1 << edge) == 0 {
      continue;
    }
    let a = corner_local_pos(pair[0]);
    let b = corner_local_pos(pair[1]);
    let va = corners[pair[0] as usize];
    let vb = corners[pair[1] as usize];
    let t = midpoint_search(cache, local, a, b, va, vb);
    let point = local.as_vec3() + a + (b - a) * t;
    let normal = trilinear_gradient(cache, point);
    crossings.push((point, normal));
  }

  let mut position = crossings.iter().map(|(p, _)| *p).sum::<Vec3>() / crossings.len() as f32;

  // Dual-contouring QEF minimizer: seed at the crossing centroid, then
  // repeat `c <- c + QEF_STEP * sum_j n_j (n_j . (p_j - c))`. Positions may
  // legitimately land outside the emitting voxel when all eight corners
  // share a sign yet some edge still crosses — clamping here would
  // introduce visible seams, so the result is left unclamped.
  for _ in 0..QEF_ITERATIONS {
    let mut correction = Vec3::ZERO;
    for (point, normal) in &crossings {
      correction += *normal * normal.dot(*point - position);
    }
    position += correction * QEF_STEP;
  }

  let normal = crossings
    .iter()
    .map(|(_, n)| *n)
    .sum::<Vec3>()
    .normalize_or_zero();

  let world_size = cache.voxel_size();
  let world_pos = (cache.origin().as_vec3() + position) * world_size;
  let material = field.material(world_pos);

  let mut material_weights = [0u8; 4];
  material_weights[(material as usize).min(3)] = 255;

  Vertex {
    position: world_pos.to_array(),
    normal: normal.to_array(),
    info: [0; 4],
    material_weights,
  }
}

#[inline]
fn corner_local_pos(corner: u8) -> Vec3 {
  let p = crate::edge_table::corner_position(corner);
  Vec3::new(p[0], p[1], p[2])
}

/// Binary-search the zero crossing along an edge using the cache's
/// trilinear field, returning the interpolation parameter `t` in `[0, 1]`.
fn midpoint_search(cache: &SdfCache, local: IVec3, a: Vec3, b: Vec3, va: f32, vb: f32) -> f32 {
  let (mut lo, mut hi) = (0.0f32, 1.0f32);
  let (mut lo_val, mut hi_val) = (va, vb);

  for _ in 0..EDGE_SEARCH_STEPS {
    let mid = 0.5 * (lo + hi);
    let point = local.as_vec3() + a + (b - a) * mid;
    let mid_val = cache.trilinear(point);

    if mid_val.abs() < EDGE_CONVERGENCE_EPSILON {
      return mid;
    }

    if (mid_val <= 0.0) == (lo_val <= 0.0) {
      lo = mid;
      lo_val = mid_val;
    } else {
      hi = mid;
      hi_val = mid_val;
    }
  }

  // Neither endpoint converged within the step budget: fall back to a
  // linear estimate between the last bracket.
  if (hi_val - lo_val).abs() < ZERO_NUDGE {
    0.5 * (lo + hi)
  } else {
    lo + (hi - lo) * (-lo_val / (hi_val - lo_val))
  }
}

/// Central-difference gradient of the cache's trilinear field at a
/// fractional voxel-local point.
fn trilinear_gradient(cache: &SdfCache, point: Vec3) -> Vec3 {
  let eps = 0.25;
  let dx = cache.trilinear(point + Vec3::X * eps) - cache.trilinear(point - Vec3::X * eps);
  let dy = cache.trilinear(point + Vec3::Y * eps) - cache.trilinear(point - Vec3::Y * eps);
  let dz = cache.trilinear(point + Vec3::Z * eps) - cache.trilinear(point - Vec3::Z * eps);
  Vec3::new(dx, dy, dz).normalize_or_zero()
}

/// Walk every owner voxel in `[0, CHUNK_SIZE)` and emit a quad for each
/// axis-aligned edge (from that voxel's corner `0`) with a sign change,
/// connecting the four neighboring cells that share the edge.
fn emit_quads(records: &[VoxelRecord], mesh: &mut ChunkMesh) {
  for z in 0..CHUNK_SIZE {
    for y in 0..CHUNK_SIZE {
      for x in 0..CHUNK_SIZE {
        let local = IVec3::new(x, y, z);
        emit_axis_quad(records, local, 0, mesh); // X edge: corners 0,1
        emit_axis_quad(records, local, 1, mesh); // Y edge: corners 0,2
        emit_axis_quad(records, local, 2, mesh); // Z edge: corners 0,4
      }
    }
  }
}

fn emit_axis_quad(records: &[VoxelRecord], local: IVec3, axis: usize, mesh: &mut ChunkMesh) {
  let this = &records[ext_index(local)];

  // The edge from this voxel's corner 0 to its corner along `axis` is
  // entirely local to this voxel's own 8 corner samples — no need to
  // consult the neighboring owner cell to know whether it crosses.
  let far_corner = match axis {
    0 => 1u8,
    1 => 2u8,
    _ => 4u8,
  };
  let solid0 = this.corner_mask & 1 != 0;
  let solid1 = this.corner_mask & (1 << far_corner) != 0;
  if solid0 == solid1 {
    return;
  }

  // The four owner cells sharing this edge, offset within the plane
  // perpendicular to `axis`.
  let (perp_a, perp_b) = match axis {
    0 => (IVec3::Y, IVec3::Z),
    1 => (IVec3::X, IVec3::Z),
    _ => (IVec3::X, IVec3::Y),
  };

  let quad_cells = [
    local,
    local - perp_a,
    local - perp_a - perp_b,
    local - perp_b,
  ];

  let mut indices = [0u16; 4];
  for (slot, cell) in quad_cells.iter().enumerate() {
    match records[ext_index(*cell)].vertex_index {
      Some(idx) => indices[slot] = idx,
      None => return,
    }
  }

  // Winding: point the quad toward the exterior side (outward from the
  // solid endpoint).
  if solid0 {
    mesh.indices.extend_from_slice(&[
      indices[0], indices[1], indices[2], indices[0], indices[2], indices[3],
    ]);
  } else {
    mesh.indices.extend_from_slice(&[
      indices[0], indices[2], indices[1], indices[0], indices[3], indices[2],
    ]);
  }
}

#[cfg(test)]
#[path = "extractor_test.rs"]
mod extractor_test;
