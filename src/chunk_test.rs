use glam::IVec3;

use crate::types::{BlockType, ChunkMesh, Vertex, VertexCount};

use super::ChunkStore;

fn meshed(vertex_count: usize) -> ChunkMesh {
  ChunkMesh {
    vertices: vec![Vertex::default(); vertex_count],
    indices: Vec::new(),
  }
}

#[test]
fn fresh_coordinate_needs_a_job_and_has_no_pool_footprint() {
  let store = ChunkStore::new(16, 1.0);
  assert!(store.needs_job(IVec3::ZERO));
  assert!(!store.contains(IVec3::ZERO));
  assert_eq!(store.len(), 0);
}

#[test]
fn publish_empty_mesh_with_interior_classification_sets_interior_sentinel_without_a_pool_slot() {
  let mut store = ChunkStore::new(16, 1.0);
  store.publish(IVec3::ZERO, ChunkMesh::new(), vec![BlockType::Interior; 8]);
  assert_eq!(store.vertex_count(IVec3::ZERO), VertexCount::Interior);
  assert!(!store.needs_job(IVec3::ZERO));
  assert_eq!(store.len(), 0, "a sentinel result must not occupy a meshed pool slot");
}

#[test]
fn publish_empty_mesh_with_exterior_classification_sets_empty_sentinel_without_a_pool_slot() {
  let mut store = ChunkStore::new(16, 1.0);
  store.publish(IVec3::ZERO, ChunkMesh::new(), vec![BlockType::Exterior; 8]);
  assert_eq!(store.vertex_count(IVec3::ZERO), VertexCount::Empty);
  assert_eq!(store.len(), 0);
}

#[test]
fn publish_with_vertices_occupies_a_pool_slot_and_participates_in_lru() {
  let mut store = ChunkStore::new(16, 1.0);
  store.publish(IVec3::ZERO, meshed(4), vec![BlockType::Surface; 8]);
  assert_eq!(store.len(), 1);
  assert!(matches!(store.vertex_count(IVec3::ZERO), VertexCount::Count(4)));
  assert!(store.contains_meshed(IVec3::ZERO));
}

#[test]
fn many_sentinel_chunks_never_exhaust_a_small_pool() {
  let mut store = ChunkStore::new(1, 1.0);
  for i in 0..500 {
    store.publish(IVec3::new(i, 0, 0), ChunkMesh::new(), vec![BlockType::Exterior; 8]);
  }
  assert_eq!(store.len(), 0, "500 sentinel publishes must not touch the 1-slot meshed pool");
  for i in 0..500 {
    assert!(!store.needs_job(IVec3::new(i, 0, 0)));
  }
}

#[test]
fn lru_eviction_removes_least_recently_touched_meshed_chunk() {
  let mut store = ChunkStore::new(16, 1.0);
  store.publish(IVec3::new(0, 0, 0), meshed(1), vec![]);
  store.publish(IVec3::new(1, 0, 0), meshed(1), vec![]);
  store.publish(IVec3::new(2, 0, 0), meshed(1), vec![]);
  // Re-touch the first so it's no longer coldest.
  store.touch(IVec3::new(0, 0, 0));

  let evicted = store.evict_coldest();
  assert_eq!(evicted, Some(IVec3::new(1, 0, 0)));
  assert_eq!(store.len(), 2);
  assert!(store.contains(IVec3::new(0, 0, 0)));
  assert!(store.contains(IVec3::new(2, 0, 0)));
}

#[test]
fn mark_dirty_keeps_meshed_chunk_resident_but_flags_it() {
  let mut store = ChunkStore::new(16, 1.0);
  store.publish(IVec3::ZERO, meshed(4), vec![BlockType::Surface; 8]);
  store.mark_dirty(IVec3::ZERO);
  assert!(store.needs_job(IVec3::ZERO));
  // Still resident — the last-good mesh is kept until a fresh one lands.
  assert_eq!(store.len(), 1);
  assert!(matches!(store.vertex_count(IVec3::ZERO), VertexCount::Count(4)));
}

#[test]
fn mark_dirty_on_sentinel_falls_back_to_needing_a_job() {
  let mut store = ChunkStore::new(16, 1.0);
  store.publish(IVec3::ZERO, ChunkMesh::new(), vec![BlockType::Interior; 8]);
  store.mark_dirty(IVec3::ZERO);
  assert!(store.needs_job(IVec3::ZERO));
  assert_eq!(store.vertex_count(IVec3::ZERO), VertexCount::Dirty);
}

#[test]
fn publish_preserves_a_dirty_mark_that_arrived_after_dispatch() {
  let mut store = ChunkStore::new(16, 1.0);
  store.publish(IVec3::ZERO, meshed(4), vec![BlockType::Surface; 8]);

  // A job gets dispatched for a refresh: the scheduler clears the dirty
  // signal that triggered it right before spawning.
  store.clear_dirty_for_dispatch(IVec3::ZERO);
  assert!(!store.needs_job(IVec3::ZERO));

  // ...but an edit lands while that job is still in flight.
  store.mark_dirty(IVec3::ZERO);

  // The job completes and publishes a fresh (still nonempty) mesh. The
  // mid-flight redirty must survive, not be clobbered by the publish.
  store.publish(IVec3::ZERO, meshed(6), vec![BlockType::Surface; 8]);
  assert!(store.needs_job(IVec3::ZERO), "a redirty signal during the job must survive publish");
}
