//! Spatial queries against the resident chunk store: voxel classification,
//! collision lookup, voxel-grid DDA raycasts (a fast classification pass
//! and a precise SDF-refined pass), and sphere sweep/push-out collision
//! queries (spec §4.6, §6).

use glam::{IVec3, Vec3};

use crate::chunk::ChunkStore;
use crate::constants::EDGE_SEARCH_STEPS;
use crate::sdf::SdfField;
use crate::types::{voxel_to_chunk, BlockType, RaycastResult};

const MAX_DDA_STEPS: u32 = 4096;

/// Look up a voxel's classification from the chunk store. Voxels whose
/// owning chunk has no resolved mesh yet report [`BlockType::Unloaded`]
/// (spec §6 `getVoxel`).
pub fn get_voxel(store: &ChunkStore, voxel: IVec3) -> BlockType {
  classify(store, voxel)
}

/// `true` if a voxel's block type is solid enough to collide with (spec §6
/// `getCollision`: "configured per block type"). `Surface` and `Interior`
/// collide; `Exterior` and `Unloaded` do not.
pub fn get_collision(store: &ChunkStore, voxel: IVec3) -> bool {
  matches!(classify(store, voxel), BlockType::Surface | BlockType::Interior)
}

fn classify(store: &ChunkStore, voxel: IVec3) -> BlockType {
  let chunk_coord = voxel_to_chunk(voxel);
  let Some(chunk) = store.get(chunk_coord) else {
    return BlockType::Unloaded;
  };
  if chunk.dirty || chunk.classification.is_empty() {
    return BlockType::Unloaded;
  }
  let local = voxel - crate::types::chunk_origin(chunk_coord);
  let size = crate::constants::CHUNK_SIZE;
  if local.x < 0 || local.y < 0 || local.z < 0 || local.x >= size || local.y >= size || local.z >= size {
    return BlockType::Unloaded;
  }
  let idx = (local.z as usize * size as usize + local.y as usize) * size as usize + local.x as usize;
  chunk.classification[idx]
}

/// A fast raycast that walks the voxel grid via DDA (Amanatides & Woo) and
/// reports the first non-`Exterior` voxel, without refining the hit point
/// against the SDF. When `allow_source_collision` is `false` (the usual
/// case — casting away from the ray's own origin), the origin voxel itself
/// is skipped even if it's solid, so a ray cast from inside a collider
/// doesn't immediately report a zero-distance hit against its own source.
pub fn raycast_fast(
  store: &ChunkStore,
  origin: Vec3,
  direction: Vec3,
  max_distance: f32,
  allow_source_collision: bool,
) -> RaycastResult {
  let direction = direction.normalize_or_zero();
  if direction == Vec3::ZERO {
    return RaycastResult::miss();
  }

  let source_voxel = origin.floor().as_ivec3();
  let mut voxel = source_voxel;
  let step = IVec3::new(sign_step(direction.x), sign_step(direction.y), sign_step(direction.z));
  let delta = Vec3::new(axis_delta(direction.x), axis_delta(direction.y), axis_delta(direction.z));
  let mut t_max = Vec3::new(
    axis_t_max(origin.x, voxel.x, direction.x),
    axis_t_max(origin.y, voxel.y, direction.y),
    axis_t_max(origin.z, voxel.z, direction.z),
  );

  let mut normal = IVec3::ZERO;
  let mut distance = 0.0f32;
  let mut touched_unloaded = false;

  for _ in 0..MAX_DDA_STEPS {
    let block_type = classify(store, voxel);
    if block_type == BlockType::Unloaded {
      touched_unloaded = true;
    }
    let is_source = !allow_source_collision && voxel == source_voxel;
    if !is_source && matches!(block_type, BlockType::Interior | BlockType::Surface) {
      return RaycastResult {
        hit: true,
        block_type,
        distance,
        posi: voxel,
        posf: origin + direction * distance,
        normal: normal.as_vec3(),
        touched_unloaded,
      };
    }

    if distance > max_distance {
      break;
    }

    step_dda(&mut voxel, &mut t_max, &mut distance, &mut normal, step, delta);
  }

  RaycastResult {
    touched_unloaded,
    ..RaycastResult::miss()
  }
}

/// A raycast that, after the fast DDA pass finds a candidate voxel, walks a
/// short midpoint search along the ray against the live SDF to refine the
/// hit point and a true surface normal, rather than reporting the voxel
/// grid's axis-aligned face normal.
pub fn raycast_precise(
  store: &ChunkStore,
  field: &SdfField,
  origin: Vec3,
  direction: Vec3,
  max_distance: f32,
  allow_source_collision: bool,
) -> RaycastResult {
  let coarse = raycast_fast(store, origin, direction, max_distance, allow_source_collision);
  if !coarse.hit {
    return coarse;
  }

  let direction = direction.normalize_or_zero();
  let mut lo = (coarse.distance - 1.5).max(0.0);
  let mut hi = coarse.distance;
  let mut lo_val = field.value(origin + direction * lo);

  for _ in 0..EDGE_SEARCH_STEPS {
    let mid = 0.5 * (lo + hi);
    let mid_val = field.value(origin + direction * mid);
    if (mid_val <= 0.0) == (lo_val <= 0.0) {
      lo = mid;
      lo_val = mid_val;
    } else {
      hi = mid;
    }
  }

  let refined_distance = 0.5 * (lo + hi);
  let hit_point = origin + direction * refined_distance;
  let normal = field.derivative(hit_point);

  RaycastResult {
    distance: refined_distance,
    posf: hit_point,
    normal,
    ..coarse
  }
}

#[inline]
fn sign_step(d: f32) -> i32 {
  if d > 0.0 {
    1
  } else {
    -1
  }
}

#[inline]
fn axis_delta(d: f32) -> f32 {
  if d.abs() < 1e-10 {
    f32::INFINITY
  } else {
    (1.0 / d).abs()
  }
}

#[inline]
fn axis_t_max(origin: f32, voxel: i32, d: f32) -> f32 {
  if d > 0.0 {
    (voxel as f32 + 1.0 - origin) / d
  } else if d < 0.0 {
    (origin - voxel as f32) / -d
  } else {
    f32::INFINITY
  }
}

#[inline]
#[allow(clippy::too_many_arguments)]
fn step_dda(voxel: &mut IVec3, t_max: &mut Vec3, distance: &mut f32, normal: &mut IVec3, step: IVec3, delta: Vec3) {
  if t_max.x < t_max.y {
    if t_max.x < t_max.z {
      voxel.x += step.x;
      *distance = t_max.x;
      t_max.x += delta.x;
      *normal = IVec3::new(-step.x, 0, 0);
    } else {
      voxel.z += step.z;
      *distance = t_max.z;
      t_max.z += delta.z;
      *normal = IVec3::new(0, 0, -step.z);
    }
  } else if t_max.y < t_max.z {
    voxel.y += step.y;
    *distance = t_max.y;
    t_max.y += delta.y;
    *normal = IVec3::new(0, -step.y, 0);
  } else {
    voxel.z += step.z;
    *distance = t_max.z;
    t_max.z += delta.z;
    *normal = IVec3::new(0, 0, -step.z);
  }
}

/// Result of a successful [`sphere_sweep`] (spec §6 `sweepSphere`).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SweepHit {
  /// Fraction of the requested sweep (`0..=1`) the sphere could travel
  /// before its surface touched a solid.
  pub distance: f32,
  /// SDF gradient at the stopping point.
  pub normal: Vec3,
  /// World-space sphere center at the stopping point.
  pub position: Vec3,
}

/// Sweep a sphere of `radius` from `start` to `end` against the SDF.
/// Returns `None` if the sweep completes with no obstruction (the sphere's
/// surface never comes within `radius` of a solid), `Some` with the
/// stopping fraction/normal/position otherwise.
pub fn sphere_sweep(field: &SdfField, start: Vec3, end: Vec3, radius: f32) -> Option<SweepHit> {
  let delta = end - start;
  let len = delta.length();
  if len < 1e-8 {
    return if field.value(start) <= radius {
      Some(SweepHit {
        distance: 0.0,
        normal: field.derivative(start),
        position: start,
      })
    } else {
      None
    };
  }
  let dir = delta / len;

  let mut traveled = 0.0f32;
  while traveled < len {
    let p = start + dir * traveled;
    let clearance = field.value(p) - radius;
    if clearance <= 0.0 {
      let t = (traveled / len).min(1.0);
      return Some(SweepHit {
        distance: t,
        normal: field.derivative(p),
        position: p,
      });
    }
    let step = clearance.max(1e-3);
    traveled += step;
  }
  None
}

/// Push a sphere center out of any solid it currently overlaps, by
/// stepping along the SDF gradient until its surface clears `radius`
/// (spec §4.6, §6 `pushOutSphere`). Returns `None` if the sphere doesn't
/// penetrate anything to begin with; otherwise the world-space offset to
/// add to `center` to clear the penetration.
pub fn sphere_push_out(field: &SdfField, center: Vec3, radius: f32, max_iterations: u32) -> Option<Vec3> {
  if field.value(center) - radius >= 0.0 {
    return None;
  }

  let mut p = center;
  for _ in 0..max_iterations {
    let value = field.value(p);
    let penetration = radius - value;
    if penetration <= 0.0 {
      break;
    }
    let normal = field.derivative(p);
    if normal == Vec3::ZERO {
      break;
    }
    p += normal * penetration;
  }
  Some(p - center)
}

#[cfg(test)]
#[path = "query_test.rs"]
mod query_test;
