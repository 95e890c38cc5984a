//! SDF composition, default test field, and pending-edit commit model
//! (spec §3, §4.1, §9).

use glam::{Affine3A, Vec3};

use crate::constants::DERIVATIVE_EPSILON_VOXELS;
use crate::sdf::primitive::{BlendOp, Primitive, Shape, ShapeHandle};
use crate::types::Aabb;

/// A caller-submitted but not-yet-committed SDF change. Buffered so
/// in-flight extraction jobs never observe a half-applied edit (spec §3,
/// §5).
enum PendingEdit {
  Add {
    handle: ShapeHandle,
    shape: Shape,
    transform: Affine3A,
    material: u8,
    blend: BlendOp,
  },
  Update {
    handle: ShapeHandle,
    transform: Option<Affine3A>,
    material: Option<u8>,
    blend: Option<BlendOp>,
  },
  Remove {
    handle: ShapeHandle,
  },
}

/// The composed signed distance field: an ordered list of primitives folded
/// through their blend operators, plus a write-only queue of edits waiting
/// for a safe commit point.
pub struct SdfField {
  primitives: Vec<(ShapeHandle, Primitive)>,
  next_handle: u64,
  pending: Vec<PendingEdit>,
  /// Previous AABBs of primitives removed by a commit, awaiting Phase A
  /// dirty propagation (the primitive itself is gone, so it can't carry
  /// its own `dirty` flag for this).
  removed_aabbs: Vec<Aabb>,
  voxel_size: f32,
}

impl SdfField {
  pub fn new(voxel_size: f32) -> Self {
    Self {
      primitives: Vec::new(),
      next_handle: 1,
      pending: Vec::new(),
      removed_aabbs: Vec::new(),
      voxel_size,
    }
  }

  /// Queue a new shape. Returns the handle immediately; the shape is not
  /// visible to `value`/`derivative`/`material` until `commit_pending`
  /// runs (spec §3 "Pending edits").
  pub fn add_shape(
    &mut self,
    shape: Shape,
    transform: Affine3A,
    material: u8,
    blend: BlendOp,
  ) -> ShapeHandle {
    let handle = ShapeHandle(self.next_handle);
    self.next_handle += 1;
    self.pending.push(PendingEdit::Add {
      handle,
      shape,
      transform,
      material,
      blend,
    });
    handle
  }

  pub fn update_shape(
    &mut self,
    handle: ShapeHandle,
    transform: Option<Affine3A>,
    material: Option<u8>,
    blend: Option<BlendOp>,
  ) {
    self.pending.push(PendingEdit::Update {
      handle,
      transform,
      material,
      blend,
    });
  }

  pub fn remove_shape(&mut self, handle: ShapeHandle) {
    self.pending.push(PendingEdit::Remove { handle });
  }

  pub fn get_shape_aabb(&self, handle: ShapeHandle) -> Option<Aabb> {
    self
      .primitives
      .iter()
      .find(|(h, _)| *h == handle)
      .map(|(_, p)| p.current_aabb)
  }

  pub fn has_pending(&self) -> bool {
    !self.pending.is_empty()
  }

  /// Apply every queued edit. Caller (the scheduler) guarantees this only
  /// runs when the worker pool is fully idle (spec §4.5 Phase E).
  ///
  /// Returns the list of `(previous_aabb, current_aabb)` pairs for every
  /// primitive whose AABB actually changed this commit, expanded by the
  /// cache halo margin the caller supplies — dirty propagation uses these
  /// to redirty chunks.
  pub fn commit_pending(&mut self) -> Vec<(Aabb, Aabb)> {
    let mut changed = Vec::new();

    for edit in std::mem::take(&mut self.pending) {
      match edit {
        PendingEdit::Add {
          handle,
          shape,
          transform,
          material,
          blend,
        } => {
          let prim = Primitive::new(shape, transform, material, blend);
          let aabb = prim.current_aabb;
          changed.push((Aabb::empty(), aabb));
          self.primitives.push((handle, prim));
        }
        PendingEdit::Update {
          handle,
          transform,
          material,
          blend,
        } => {
          if let Some((_, prim)) = self.primitives.iter_mut().find(|(h, _)| *h == handle) {
            let previous = prim.current_aabb;
            if let Some(t) = transform {
              prim.transform = t;
              prim.recompute_aabb();
            }
            if let Some(m) = material {
              prim.material = m;
            }
            if let Some(b) = blend {
              prim.blend = b;
            }
            prim.previous_aabb = previous;
            // Marked dirty rather than cleared: Phase A reads this flag to
            // propagate the AABB delta into chunk dirtying, then clears it
            // itself once that propagation has happened.
            prim.dirty = true;
            changed.push((previous, prim.current_aabb));
          }
        }
        PendingEdit::Remove { handle } => {
          if let Some(pos) = self.primitives.iter().position(|(h, _)| *h == handle) {
            let (_, prim) = self.primitives.remove(pos);
            self.removed_aabbs.push(prim.current_aabb);
            changed.push((prim.current_aabb, Aabb::empty()));
          }
        }
      }
    }

    changed
  }

  /// Evaluate the composed field at a world point. Default (no primitives
  /// registered) is a ground plane at `z = 0` with a small sphere carved
  /// out of it, used for testing (spec §4.1).
  pub fn value(&self, p: Vec3) -> f32 {
    let v = if self.primitives.is_empty() {
      Self::default_field(p)
    } else {
      let mut accum = f32::INFINITY;
      for (_, prim) in &self.primitives {
        accum = prim.fold(accum, p);
      }
      accum
    };
    debug_assert!(!v.is_nan(), "SDF value must never be NaN");
    v
  }

  fn default_field(p: Vec3) -> f32 {
    let ground = p.z - 6.0;
    let sphere = (p - Vec3::new(0.0, 0.0, 0.0)).length() - 1.5;
    ground.max(-sphere)
  }

  /// Two-sided central-difference gradient estimate, re-normalized (spec
  /// §4.1): average the `+e_i`-sided and `-e_i`-sided one-sided gradients,
  /// each safe-normalized on its own, to reduce single-sided bias near the
  /// surface.
  pub fn derivative(&self, p: Vec3) -> Vec3 {
    let eps = DERIVATIVE_EPSILON_VOXELS * self.voxel_size;
    let v0 = self.value(p);

    let forward = Vec3::new(
      self.value(p + Vec3::X * eps) - v0,
      self.value(p + Vec3::Y * eps) - v0,
      self.value(p + Vec3::Z * eps) - v0,
    );
    let backward = Vec3::new(
      v0 - self.value(p - Vec3::X * eps),
      v0 - self.value(p - Vec3::Y * eps),
      v0 - self.value(p - Vec3::Z * eps),
    );

    let g_fwd = safe_normalize(forward);
    let g_back = safe_normalize(backward);
    safe_normalize(g_fwd + g_back)
  }

  /// Material of the primitive whose signed contribution dominated the
  /// final folded value at `p` (spec §4.1): the primitive whose own
  /// contribution equals the accumulated result after its fold step wins;
  /// the last such primitive in registration order is reported, matching
  /// the fold being a strict left-to-right reduction.
  pub fn material(&self, p: Vec3) -> u8 {
    if self.primitives.is_empty() {
      return 0;
    }
    let mut accum = f32::INFINITY;
    let mut dominant = self.primitives[0].1.material;
    for (_, prim) in &self.primitives {
      let shape_value = prim.value(p);
      let next = prim.blend.fold(accum, shape_value);
      if (next - shape_value).abs() <= (next - accum).abs() {
        dominant = prim.material;
      }
      accum = next;
    }
    dominant
  }

  /// Drain every primitive AABB delta that hasn't yet been propagated into
  /// chunk dirtying: committed-but-unread `Add`/`Update` deltas (read off
  /// each primitive's own `dirty`/`previous_aabb`/`current_aabb` state) and
  /// any `Remove` deltas queued separately, since a removed primitive has
  /// no object left to carry that state. Called from the scheduler's Phase
  /// A (spec §4.5) before Phase C builds this tick's dispatch order.
  pub fn drain_dirty_regions(&mut self) -> Vec<(Aabb, Aabb)> {
    let mut regions = Vec::new();
    for (_, prim) in &mut self.primitives {
      if prim.dirty {
        regions.push((prim.previous_aabb, prim.current_aabb));
        prim.dirty = false;
      }
    }
    for aabb in self.removed_aabbs.drain(..) {
      regions.push((aabb, Aabb::empty()));
    }
    regions
  }

  pub fn primitive_count(&self) -> usize {
    self.primitives.len()
  }

  pub fn primitive_aabbs(&self) -> impl Iterator<Item = (Aabb, Aabb)> + '_ {
    self.primitives.iter().map(|(_, p)| (p.previous_aabb, p.current_aabb))
  }
}

#[inline]
fn safe_normalize(v: Vec3) -> Vec3 {
  let len_sq = v.length_squared();
  if len_sq < 1e-12 {
    Vec3::ZERO
  } else {
    v * len_sq.sqrt().recip()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn default_field_has_both_signs() {
    let field = SdfField::new(1.0);
    assert!(field.value(Vec3::new(0.0, 0.0, 20.0)) > 0.0);
    assert!(field.value(Vec3::new(10.0, 10.0, -5.0)) < 0.0);
  }

  #[test]
  fn derivative_never_nan_and_unit_length_or_zero() {
    let field = SdfField::new(1.0);
    let d = field.derivative(Vec3::new(0.0, 0.0, 6.0));
    assert!(!d.x.is_nan() && !d.y.is_nan() && !d.z.is_nan());
  }

  #[test]
  fn add_then_commit_makes_primitive_visible() {
    let mut field = SdfField::new(1.0);
    field.add_shape(
      Shape::Sphere { radius: 3.0 },
      Affine3A::from_translation(Vec3::new(100.0, 100.0, 100.0)),
      1,
      BlendOp::Union,
    );
    // Not yet committed: still reads the default field far from the sphere.
    assert!(field.value(Vec3::new(100.0, 100.0, 100.0)) > 0.0 || field.primitive_count() == 0);
    field.commit_pending();
    assert_eq!(field.primitive_count(), 1);
    assert!(field.value(Vec3::new(100.0, 100.0, 100.0)) < 0.0);
  }

  #[test]
  fn remove_clears_primitive() {
    let mut field = SdfField::new(1.0);
    let h = field.add_shape(Shape::Sphere { radius: 1.0 }, Affine3A::IDENTITY, 0, BlendOp::Union);
    field.commit_pending();
    assert_eq!(field.primitive_count(), 1);
    field.remove_shape(h);
    field.commit_pending();
    assert_eq!(field.primitive_count(), 0);
  }

  #[test]
  fn drain_dirty_regions_reports_add_update_and_remove_deltas() {
    let mut field = SdfField::new(1.0);
    let h = field.add_shape(Shape::Sphere { radius: 1.0 }, Affine3A::IDENTITY, 0, BlendOp::Union);
    field.commit_pending();

    // The fresh Add is still unread: one region pending.
    let after_add = field.drain_dirty_regions();
    assert_eq!(after_add.len(), 1);
    // Already drained: nothing left until the next edit.
    assert!(field.drain_dirty_regions().is_empty());

    field.update_shape(h, Some(Affine3A::from_translation(Vec3::new(5.0, 0.0, 0.0))), None, None);
    field.commit_pending();
    let after_update = field.drain_dirty_regions();
    assert_eq!(after_update.len(), 1);

    field.remove_shape(h);
    field.commit_pending();
    let after_remove = field.drain_dirty_regions();
    assert_eq!(after_remove.len(), 1);
    assert!(!after_remove[0].1.is_valid() || after_remove[0].1 == Aabb::empty());
  }
}
