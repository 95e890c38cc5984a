use glam::{Affine3A, IVec3, Vec3};

use crate::cache::SdfCache;
use crate::sdf::{BlendOp, Shape};
use crate::types::BlockType;

use super::extract;

fn sphere_field(radius: f32, center: Vec3) -> crate::sdf::SdfField {
  let mut field = crate::sdf::SdfField::new(1.0);
  field.add_shape(
    Shape::Sphere { radius },
    Affine3A::from_translation(center),
    2,
    BlendOp::Union,
  );
  field.commit_pending();
  field
}

#[test]
fn sphere_centered_in_chunk_produces_surface_voxels() {
  let field = sphere_field(10.0, Vec3::splat(16.0));
  let mut cache = SdfCache::new();
  cache.fill(&field, IVec3::ZERO, 1.0);

  let extraction = extract(&cache, &field);
  let surface_count = extraction
    .classification
    .iter()
    .filter(|b| **b == BlockType::Surface)
    .count();
  assert!(surface_count > 0, "expected some Surface voxels for a sphere through the chunk");

  let interior_count = extraction
    .classification
    .iter()
    .filter(|b| **b == BlockType::Interior)
    .count();
  assert!(interior_count > 0, "expected some Interior voxels inside the sphere");

  assert!(!extraction.mesh.is_empty());
  assert_eq!(extraction.mesh.indices.len() % 3, 0);
}

#[test]
fn chunk_entirely_outside_every_primitive_has_no_geometry() {
  let field = sphere_field(2.0, Vec3::splat(1000.0));
  let mut cache = SdfCache::new();
  cache.fill(&field, IVec3::ZERO, 1.0);

  let extraction = extract(&cache, &field);
  assert!(extraction.mesh.is_empty());
  assert!(extraction
    .classification
    .iter()
    .all(|b| *b == BlockType::Exterior));
}

#[test]
fn chunk_entirely_inside_a_solid_has_no_geometry_but_is_interior() {
  // A huge sphere whose surface is far outside this chunk, with the chunk
  // fully inside it.
  let field = sphere_field(1000.0, Vec3::splat(16.0));
  let mut cache = SdfCache::new();
  cache.fill(&field, IVec3::ZERO, 1.0);

  let extraction = extract(&cache, &field);
  assert!(extraction.mesh.is_empty());
  assert!(extraction
    .classification
    .iter()
    .all(|b| *b == BlockType::Interior));
}

#[test]
fn vertex_indices_stay_within_vertex_buffer_bounds() {
  let field = sphere_field(10.0, Vec3::splat(16.0));
  let mut cache = SdfCache::new();
  cache.fill(&field, IVec3::ZERO, 1.0);

  let extraction = extract(&cache, &field);
  for idx in &extraction.mesh.indices {
    assert!((*idx as usize) < extraction.mesh.vertices.len());
  }
}

#[test]
fn vertex_normals_are_unit_length_or_zero() {
  let field = sphere_field(10.0, Vec3::splat(16.0));
  let mut cache = SdfCache::new();
  cache.fill(&field, IVec3::ZERO, 1.0);

  let extraction = extract(&cache, &field);
  for v in &extraction.mesh.vertices {
    let n = Vec3::from_array(v.normal);
    let len = n.length();
    assert!(len < 1e-4 || (len - 1.0).abs() < 1e-3, "normal length {len}");
  }
}
