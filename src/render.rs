//! Renderer collaborator contract (spec §6). The core only ever calls these
//! two methods; everything about turning bytes into GPU resources and
//! issuing draw calls is the collaborator's concern, not this crate's.

use crate::types::ChunkCoord;

/// Implemented by a host renderer and driven by [`crate::Scheduler::render`].
pub trait Renderer {
  /// A newly meshed (or re-meshed) chunk is ready. `vertex_bytes`/
  /// `index_bytes` are the wire layout from [`crate::types::ChunkMesh`]:
  /// `[position: f32x3, normal: f32x3, info: u8x4, materials: u8x4]` packed
  /// vertices, `u16` indices.
  fn upload_chunk(&mut self, coord: ChunkCoord, vertex_bytes: &[u8], index_bytes: &[u8]);

  /// Draw every chunk uploaded so far that's visible under
  /// `view_projection` (a row-major 4x4 matrix).
  fn draw_chunks(&mut self, view_projection: [[f32; 4]; 4]);
}

#[cfg(test)]
mod tests {
  use super::*;

  #[derive(Default)]
  struct RecordingRenderer {
    uploads: Vec<(ChunkCoord, usize, usize)>,
    draw_calls: u32,
  }

  impl Renderer for RecordingRenderer {
    fn upload_chunk(&mut self, coord: ChunkCoord, vertex_bytes: &[u8], index_bytes: &[u8]) {
      self.uploads.push((coord, vertex_bytes.len(), index_bytes.len()));
    }

    fn draw_chunks(&mut self, _view_projection: [[f32; 4]; 4]) {
      self.draw_calls += 1;
    }
  }

  #[test]
  fn recording_renderer_counts_uploads_and_draws() {
    let mut renderer = RecordingRenderer::default();
    renderer.upload_chunk(ChunkCoord::ZERO, &[0; 32], &[0; 6]);
    renderer.draw_chunks([[0.0; 4]; 4]);
    assert_eq!(renderer.uploads, vec![(ChunkCoord::ZERO, 32, 6)]);
    assert_eq!(renderer.draw_calls, 1);
  }
}
