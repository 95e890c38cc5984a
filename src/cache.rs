//! Per-chunk SDF cache: a fill-once, halo-padded grid of field samples that
//! the extractor reads from instead of re-evaluating the field per edge
//! (spec §4.2).

use glam::{IVec3, Vec3};

use crate::constants::{CACHE_DIM, CACHE_DIM_USIZE, CACHE_HALO, CHUNK_SIZE};
use crate::sdf::SdfField;
use crate::types::VoxelCoord;

/// A `CACHE_DIM^3` cube of field samples covering one chunk plus a
/// one-voxel halo on every side, so both trilinear interpolation and
/// cached-neighbor gradients stay valid for every voxel the extractor
/// actually visits.
pub struct SdfCache {
  origin: VoxelCoord,
  voxel_size: f32,
  values: Vec<f32>,
}

impl SdfCache {
  /// Allocate an empty cache; call [`Self::fill`] before sampling.
  pub fn new() -> Self {
    Self {
      origin: IVec3::ZERO,
      voxel_size: 1.0,
      values: vec![0.0; CACHE_DIM_USIZE * CACHE_DIM_USIZE * CACHE_DIM_USIZE],
    }
  }

  /// Populate every sample in the cube from `field`, evaluated once per
  /// integer voxel corner. `chunk_origin` is the voxel-space `(0,0,0)`
  /// corner of the owning chunk.
  pub fn fill(&mut self, field: &SdfField, chunk_origin: VoxelCoord, voxel_size: f32) {
    self.origin = chunk_origin;
    self.voxel_size = voxel_size;

    for z in 0..CACHE_DIM {
      for y in 0..CACHE_DIM {
        for x in 0..CACHE_DIM {
          let local = IVec3::new(x, y, z) - IVec3::splat(CACHE_HALO);
          let world = (chunk_origin + local).as_vec3() * voxel_size;
          self.values[Self::index(local)] = field.value(world);
        }
      }
    }
  }

  #[inline]
  fn index(local: IVec3) -> usize {
    let shifted = local + IVec3::splat(CACHE_HALO);
    debug_assert!(shifted.x >= 0 && shifted.x < CACHE_DIM);
    debug_assert!(shifted.y >= 0 && shifted.y < CACHE_DIM);
    debug_assert!(shifted.z >= 0 && shifted.z < CACHE_DIM);
    (shifted.z as usize * CACHE_DIM_USIZE + shifted.y as usize) * CACHE_DIM_USIZE + shifted.x as usize
  }

  /// Exact field value at an integer voxel corner, relative to the chunk
  /// origin. `local` may range over `-CACHE_HALO..CHUNK_SIZE + CACHE_HALO`
  /// on each axis.
  #[inline]
  pub fn value(&self, local: IVec3) -> f32 {
    self.values[Self::index(local)]
  }

  /// Trilinearly interpolated value at a fractional voxel-space position
  /// relative to the chunk origin. Used by the QEF solver's midpoint
  /// search, which walks along edges at sub-voxel resolution.
  pub fn trilinear(&self, local: Vec3) -> f32 {
    let base = local.floor();
    let frac = local - base;
    let base = IVec3::new(base.x as i32, base.y as i32, base.z as i32);

    let c000 = self.value(base + IVec3::new(0, 0, 0));
    let c100 = self.value(base + IVec3::new(1, 0, 0));
    let c010 = self.value(base + IVec3::new(0, 1, 0));
    let c110 = self.value(base + IVec3::new(1, 1, 0));
    let c001 = self.value(base + IVec3::new(0, 0, 1));
    let c101 = self.value(base + IVec3::new(1, 0, 1));
    let c011 = self.value(base + IVec3::new(0, 1, 1));
    let c111 = self.value(base + IVec3::new(1, 1, 1));

    let c00 = c000 + (c100 - c000) * frac.x;
    let c10 = c010 + (c110 - c010) * frac.x;
    let c01 = c001 + (c101 - c001) * frac.x;
    let c11 = c011 + (c111 - c011) * frac.x;

    let c0 = c00 + (c10 - c00) * frac.y;
    let c1 = c01 + (c11 - c01) * frac.y;

    c0 + (c1 - c0) * frac.z
  }

  /// Gradient at an integer voxel corner estimated from cached neighbor
  /// samples (central difference, one voxel spacing) rather than a fresh
  /// field evaluation — the halo exists precisely so this never reads out
  /// of bounds for any corner the extractor visits within
  /// `0..=CHUNK_SIZE`.
  pub fn cached_derivative(&self, local: IVec3) -> Vec3 {
    let dx = self.value(local + IVec3::X) - self.value(local - IVec3::X);
    let dy = self.value(local + IVec3::Y) - self.value(local - IVec3::Y);
    let dz = self.value(local + IVec3::Z) - self.value(local - IVec3::Z);
    let g = Vec3::new(dx, dy, dz);
    let len_sq = g.length_squared();
    if len_sq < 1e-12 {
      Vec3::ZERO
    } else {
      g * len_sq.sqrt().recip()
    }
  }

  pub fn origin(&self) -> VoxelCoord {
    self.origin
  }

  pub fn voxel_size(&self) -> f32 {
    self.voxel_size
  }

  pub fn chunk_size(&self) -> i32 {
    CHUNK_SIZE
  }
}

impl Default for SdfCache {
  fn default() -> Self {
    Self::new()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::sdf::{BlendOp, Shape};
  use glam::Affine3A;

  #[test]
  fn fill_then_value_matches_direct_field_eval() {
    let mut field = SdfField::new(1.0);
    field.add_shape(Shape::Sphere { radius: 5.0 }, Affine3A::IDENTITY, 1, BlendOp::Union);
    field.commit_pending();

    let mut cache = SdfCache::new();
    cache.fill(&field, IVec3::ZERO, 1.0);

    let local = IVec3::new(3, 4, 5);
    let world = local.as_vec3();
    assert!((cache.value(local) - field.value(world)).abs() < 1e-4);
  }

  #[test]
  fn trilinear_matches_corner_at_integer_points() {
    let mut field = SdfField::new(1.0);
    field.add_shape(Shape::Sphere { radius: 5.0 }, Affine3A::IDENTITY, 1, BlendOp::Union);
    field.commit_pending();

    let mut cache = SdfCache::new();
    cache.fill(&field, IVec3::ZERO, 1.0);

    let local = IVec3::new(2, 2, 2);
    let exact = cache.value(local);
    let interp = cache.trilinear(local.as_vec3());
    assert!((exact - interp).abs() < 1e-5);
  }

  #[test]
  fn cached_derivative_points_outward_from_sphere_center() {
    let mut field = SdfField::new(1.0);
    field.add_shape(
      Shape::Sphere { radius: 10.0 },
      Affine3A::from_translation(Vec3::new(16.0, 16.0, 16.0)),
      1,
      BlendOp::Union,
    );
    field.commit_pending();

    let mut cache = SdfCache::new();
    cache.fill(&field, IVec3::ZERO, 1.0);

    // A point to the +X side of the sphere center should have a gradient
    // pointing predominantly in +X.
    let g = cache.cached_derivative(IVec3::new(28, 16, 16));
    assert!(g.x > 0.5);
  }
}
