//! Chunk records and the sparse chunk store (spec §3, §4.2, §4.5).
//!
//! Chunks that resolve to `Empty`/`Interior` carry no mesh and no per-voxel
//! classification (spec §3: "neither holds a mesh"), so they're kept in a
//! lightweight sentinel map that never competes for a pool slot. Only
//! chunks with a real mesh (`VertexCount::Count(_)`) occupy the bounded
//! `ChunkMap` and participate in LRU eviction — an Empty/Interior result
//! frees the slot its coordinate may have held from a previous, different
//! classification.
//!
//! The meshed map is keyed by a Cantor-pairing-derived hash (good spatial
//! locality for the small-integer coordinates a view window actually
//! touches, and cheap — no multiplication-heavy finalizer needed). An
//! intrusive doubly linked list threaded through the same slots gives O(1)
//! "touch" and "steal the coldest chunk" operations for the scheduler's
//! memory-pressure path.

use std::collections::HashMap;
use std::hash::{BuildHasherDefault, Hasher};

use crate::types::{Aabb, BlockType, ChunkCoord, ChunkMesh, VertexCount};

/// One resident, fully meshed chunk.
pub struct Chunk {
  pub coord: ChunkCoord,
  pub vertex_count: VertexCount,
  pub mesh: ChunkMesh,
  pub classification: Vec<BlockType>,
  pub bounds: Aabb,
  /// Set when an edit lands while this chunk's last-good mesh is still
  /// resident; cleared by [`ChunkStore::clear_dirty_for_dispatch`] right
  /// before a regeneration job is dispatched, so a further `mark_dirty`
  /// that lands mid-flight is distinguishable from the one that triggered
  /// the dispatch (spec §4.5 Phase D: "propagate `geoDirty` from the old
  /// chunk — it may have been dirtied again during the job").
  pub dirty: bool,
  pub generation: u32,
  lru_prev: Option<ChunkCoord>,
  lru_next: Option<ChunkCoord>,
}

impl Chunk {
  fn new(coord: ChunkCoord, voxel_size: f32) -> Self {
    Self {
      coord,
      vertex_count: VertexCount::Dirty,
      mesh: ChunkMesh::new(),
      classification: Vec::new(),
      bounds: Aabb::from_chunk(coord, voxel_size),
      dirty: false,
      generation: 0,
      lru_prev: None,
      lru_next: None,
    }
  }
}

/// Cantor-pairing-derived hash over `ChunkCoord` (`glam::IVec3`). Folds
/// `x, y, z` pairwise through the standard Cantor pairing function, which
/// keeps nearby chunk coordinates in nearby hash buckets — the access
/// pattern a view-window scan actually produces.
#[derive(Default)]
pub struct CantorHasher(u64);

impl Hasher for CantorHasher {
  fn write(&mut self, bytes: &[u8]) {
    // Only ever fed the 12 bytes of an IVec3 via write_i32 below; this
    // fallback keeps the Hasher contract total without pulling in a
    // generic byte-mixing step we don't need.
    for chunk in bytes.chunks(4) {
      let mut buf = [0u8; 4];
      buf[..chunk.len()].copy_from_slice(chunk);
      self.write_i32(i32::from_le_bytes(buf));
    }
  }

  fn write_i32(&mut self, i: i32) {
    // Map to a non-negative domain before pairing (Cantor pairing is
    // defined over naturals).
    let zig = ((i << 1) ^ (i >> 31)) as u64;
    self.0 = cantor_pair(self.0, zig);
  }

  fn finish(&self) -> u64 {
    self.0
  }
}

#[inline]
fn cantor_pair(a: u64, b: u64) -> u64 {
  ((a.wrapping_add(b)).wrapping_mul(a.wrapping_add(b).wrapping_add(1))) / 2 + b
}

type ChunkMap = HashMap<ChunkCoord, Chunk, BuildHasherDefault<CantorHasher>>;
type LightMap = HashMap<ChunkCoord, VertexCount, BuildHasherDefault<CantorHasher>>;

/// A coordinate's current representation, as seen by a query.
pub enum ChunkLookup<'a> {
  /// Never generated, or generated but currently marked dirty: no usable
  /// data.
  Unresolved,
  /// Entirely outside every primitive; no mesh, no per-voxel data.
  Empty,
  /// Entirely inside a solid; no mesh, no per-voxel data.
  Interior,
  /// A real mesh with per-voxel classification data.
  Meshed(&'a Chunk),
}

/// Sparse store of resident chunks. Meshed chunks live in a bounded,
/// LRU-tracked map; `Empty`/`Interior` sentinels live in a separate,
/// unbounded-but-tiny map that never competes for a pool slot (spec §3,
/// §8 scenario 4).
pub struct ChunkStore {
  meshed: ChunkMap,
  light: LightMap,
  lru_head: Option<ChunkCoord>,
  lru_tail: Option<ChunkCoord>,
  voxel_size: f32,
  capacity: usize,
}

impl ChunkStore {
  pub fn new(capacity: usize, voxel_size: f32) -> Self {
    Self {
      meshed: ChunkMap::with_capacity_and_hasher(capacity, BuildHasherDefault::default()),
      light: LightMap::default(),
      lru_head: None,
      lru_tail: None,
      voxel_size,
      capacity,
    }
  }

  /// Number of chunks holding a real mesh — the figure `capacity` bounds.
  pub fn len(&self) -> usize {
    self.meshed.len()
  }

  pub fn is_empty(&self) -> bool {
    self.meshed.is_empty()
  }

  pub fn capacity(&self) -> usize {
    self.capacity
  }

  pub fn contains(&self, coord: ChunkCoord) -> bool {
    self.meshed.contains_key(&coord) || self.light.contains_key(&coord)
  }

  /// `true` only if `coord` currently holds a pool slot (a real mesh).
  pub fn contains_meshed(&self, coord: ChunkCoord) -> bool {
    self.meshed.contains_key(&coord)
  }

  /// The meshed chunk at `coord`, if any. Returns `None` for sentinel or
  /// unresolved coordinates — use [`Self::lookup`] to distinguish those.
  pub fn get(&self, coord: ChunkCoord) -> Option<&Chunk> {
    self.meshed.get(&coord)
  }

  pub fn get_mut(&mut self, coord: ChunkCoord) -> Option<&mut Chunk> {
    self.meshed.get_mut(&coord)
  }

  pub fn lookup(&self, coord: ChunkCoord) -> ChunkLookup<'_> {
    if let Some(chunk) = self.meshed.get(&coord) {
      return if chunk.dirty {
        ChunkLookup::Unresolved
      } else {
        ChunkLookup::Meshed(chunk)
      };
    }
    match self.light.get(&coord) {
      Some(VertexCount::Empty) => ChunkLookup::Empty,
      Some(VertexCount::Interior) => ChunkLookup::Interior,
      _ => ChunkLookup::Unresolved,
    }
  }

  pub fn vertex_count(&self, coord: ChunkCoord) -> VertexCount {
    if let Some(chunk) = self.meshed.get(&coord) {
      return chunk.vertex_count;
    }
    self.light.get(&coord).copied().unwrap_or(VertexCount::Dirty)
  }

  /// `true` if `coord` has no usable, up-to-date result yet: never
  /// generated, resolved `Dirty`, or a meshed chunk whose stale mesh is
  /// marked dirty.
  pub fn needs_job(&self, coord: ChunkCoord) -> bool {
    if let Some(chunk) = self.meshed.get(&coord) {
      return chunk.dirty;
    }
    !matches!(self.light.get(&coord), Some(VertexCount::Empty) | Some(VertexCount::Interior))
  }

  /// Bump `coord`'s LRU recency if it holds a meshed entry. Returns
  /// `false` for sentinel or unresolved coordinates — there's no pool slot
  /// to re-link for those.
  pub fn touch(&mut self, coord: ChunkCoord) -> bool {
    if !self.meshed.contains_key(&coord) {
      return false;
    }
    self.unlink(coord);
    self.link_front(coord);
    true
  }

  /// Clear whatever dirty marker `coord` carries right before a job is
  /// dispatched for it, so a `mark_dirty` landing during the job's flight
  /// is distinguishable from the one that triggered this dispatch.
  pub fn clear_dirty_for_dispatch(&mut self, coord: ChunkCoord) {
    if let Some(chunk) = self.meshed.get_mut(&coord) {
      chunk.dirty = false;
    } else if matches!(self.light.get(&coord), Some(VertexCount::Dirty)) {
      self.light.remove(&coord);
    }
  }

  pub fn mark_dirty(&mut self, coord: ChunkCoord) {
    if let Some(chunk) = self.meshed.get_mut(&coord) {
      chunk.dirty = true;
    } else {
      self.light.insert(coord, VertexCount::Dirty);
    }
  }

  /// Apply a freshly completed extraction result. An empty mesh frees any
  /// pool slot `coord` held and records a lightweight sentinel instead; a
  /// non-empty mesh occupies (or keeps occupying) a pool slot. Either way,
  /// a dirty mark that arrived after the job was dispatched is preserved
  /// rather than clobbered, per spec §4.5 Phase D.
  pub fn publish(&mut self, coord: ChunkCoord, mesh: ChunkMesh, classification: Vec<BlockType>) {
    let redirtied_mid_flight = match self.meshed.get(&coord) {
      Some(chunk) => chunk.dirty,
      None => matches!(self.light.get(&coord), Some(VertexCount::Dirty)),
    };

    if mesh.vertices.is_empty() {
      self.remove_meshed(coord);
      if redirtied_mid_flight {
        self.light.insert(coord, VertexCount::Dirty);
      } else {
        let all_interior = classification.iter().all(|b| *b == BlockType::Interior);
        let sentinel = if all_interior { VertexCount::Interior } else { VertexCount::Empty };
        self.light.insert(coord, sentinel);
      }
      return;
    }

    self.light.remove(&coord);
    let is_new = !self.meshed.contains_key(&coord);
    {
      let chunk = self.meshed.entry(coord).or_insert_with(|| Chunk::new(coord, self.voxel_size));
      chunk.vertex_count = VertexCount::Count(mesh.vertices.len() as u16);
      chunk.mesh = mesh;
      chunk.classification = classification;
      chunk.dirty = redirtied_mid_flight;
      chunk.generation += 1;
    }
    if is_new {
      self.link_front(coord);
    } else {
      self.unlink(coord);
      self.link_front(coord);
    }
  }

  fn remove_meshed(&mut self, coord: ChunkCoord) {
    if self.meshed.contains_key(&coord) {
      self.unlink(coord);
      self.meshed.remove(&coord);
    }
  }

  /// Evict the least-recently-touched meshed chunk, returning its
  /// coordinate. Used under memory pressure before stealing a worker slot
  /// from it. Sentinel entries are never eviction candidates — they don't
  /// hold a pool slot to free.
  pub fn evict_coldest(&mut self) -> Option<ChunkCoord> {
    let coord = self.lru_tail?;
    self.unlink(coord);
    self.meshed.remove(&coord);
    Some(coord)
  }

  pub fn coldest(&self) -> Option<ChunkCoord> {
    self.lru_tail
  }

  pub fn iter(&self) -> impl Iterator<Item = (&ChunkCoord, &Chunk)> {
    self.meshed.iter()
  }

  fn link_front(&mut self, coord: ChunkCoord) {
    let old_head = self.lru_head;
    if let Some(chunk) = self.meshed.get_mut(&coord) {
      chunk.lru_prev = None;
      chunk.lru_next = old_head;
    }
    if let Some(head) = old_head {
      if let Some(head_chunk) = self.meshed.get_mut(&head) {
        head_chunk.lru_prev = Some(coord);
      }
    }
    self.lru_head = Some(coord);
    if self.lru_tail.is_none() {
      self.lru_tail = Some(coord);
    }
  }

  fn unlink(&mut self, coord: ChunkCoord) {
    let (prev, next) = match self.meshed.get(&coord) {
      Some(c) => (c.lru_prev, c.lru_next),
      None => return,
    };
    match prev {
      Some(p) => {
        if let Some(pc) = self.meshed.get_mut(&p) {
          pc.lru_next = next;
        }
      }
      None => self.lru_head = next,
    }
    match next {
      Some(n) => {
        if let Some(nc) = self.meshed.get_mut(&n) {
          nc.lru_prev = prev;
        }
      }
      None => self.lru_tail = prev,
    }
  }
}

#[cfg(test)]
#[path = "chunk_test.rs"]
mod chunk_test;
