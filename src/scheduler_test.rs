use std::time::{Duration, Instant};

use glam::{Affine3A, Vec3};

use crate::render::Renderer;
use crate::sdf::{BlendOp, Shape};
use crate::sdf::SdfField;
use crate::types::{ChunkCoord, VertexCount};

use super::{Scheduler, SchedulerConfig};

fn tick_until<F: Fn(&Scheduler) -> bool>(scheduler: &mut Scheduler, condition: F) {
  let start = Instant::now();
  loop {
    scheduler.tick();
    if condition(scheduler) {
      return;
    }
    assert!(start.elapsed() < Duration::from_secs(10), "scheduler never reached the expected state");
    std::thread::sleep(Duration::from_millis(1));
  }
}

fn test_config() -> SchedulerConfig {
  SchedulerConfig {
    worker_capacity: 2,
    chunk_pool_capacity: 8,
    view_radius_chunks: 0,
    voxel_size: 1.0,
    render_enabled: true,
  }
}

#[test]
fn dispatches_and_publishes_the_origin_chunk() {
  let mut field = SdfField::new(1.0);
  field.add_shape(Shape::Sphere { radius: 12.0 }, Affine3A::from_translation(Vec3::splat(16.0)), 1, BlendOp::Union);
  field.commit_pending();

  let mut scheduler = Scheduler::new(field, test_config());

  tick_until(&mut scheduler, |s| {
    matches!(s.store().vertex_count(glam::IVec3::ZERO), VertexCount::Count(_))
  });

  assert!(scheduler.metrics().jobs_completed >= 1);
}

#[test]
fn reaches_equilibrium_once_view_is_fully_meshed() {
  let field = SdfField::new(1.0);
  let mut scheduler = Scheduler::new(field, test_config());

  tick_until(&mut scheduler, |s| s.at_equilibrium());
  assert!(scheduler.at_equilibrium());
}

#[test]
fn queued_edit_redirties_affected_chunk_after_commit() {
  let field = SdfField::new(1.0);
  let mut scheduler = Scheduler::new(field, test_config());

  tick_until(&mut scheduler, |s| s.at_equilibrium());

  scheduler.queue_edit(|field| {
    field.add_shape(Shape::Sphere { radius: 12.0 }, Affine3A::from_translation(Vec3::splat(16.0)), 1, BlendOp::Union);
  });

  tick_until(&mut scheduler, |s| {
    matches!(s.store().vertex_count(glam::IVec3::ZERO), VertexCount::Count(_))
  });
}

#[test]
fn empty_and_interior_chunks_never_occupy_a_pool_slot() {
  // Default field: a ground plane crossing exactly one chunk in this view
  // window, every other chunk resolving cleanly to Empty or Interior. A
  // pool capacity of 1 would thrash if those sentinel chunks competed for
  // slots; they must not.
  let field = SdfField::new(1.0);
  let config = SchedulerConfig {
    chunk_pool_capacity: 1,
    view_radius_chunks: 2,
    ..test_config()
  };
  let mut scheduler = Scheduler::new(field, config);

  tick_until(&mut scheduler, |s| s.at_equilibrium());

  let mut resolved = 0;
  for z in -2..=2 {
    for y in -2..=2 {
      for x in -2..=2 {
        let coord = glam::IVec3::new(x, y, z);
        if !matches!(scheduler.store().vertex_count(coord), VertexCount::Dirty) {
          resolved += 1;
        }
      }
    }
  }

  assert_eq!(resolved, 125, "every chunk in the view window should have resolved");
  assert!(scheduler.store().len() <= 1, "sentinel chunks must not consume the bounded meshed pool");
}

#[derive(Default)]
struct RecordingRenderer {
  uploads: Vec<ChunkCoord>,
  draws: u32,
}

impl Renderer for RecordingRenderer {
  fn upload_chunk(&mut self, coord: ChunkCoord, _vertex_bytes: &[u8], _index_bytes: &[u8]) {
    self.uploads.push(coord);
  }

  fn draw_chunks(&mut self, _view_projection: [[f32; 4]; 4]) {
    self.draws += 1;
  }
}

#[test]
fn render_uploads_meshed_chunks_once_and_skips_unchanged_on_repeat() {
  let mut field = SdfField::new(1.0);
  field.add_shape(Shape::Sphere { radius: 12.0 }, Affine3A::from_translation(Vec3::splat(16.0)), 1, BlendOp::Union);
  field.commit_pending();

  let mut scheduler = Scheduler::new(field, test_config());
  tick_until(&mut scheduler, |s| {
    matches!(s.store().vertex_count(glam::IVec3::ZERO), VertexCount::Count(_))
  });

  let mut renderer = RecordingRenderer::default();
  let identity = [
    [1.0, 0.0, 0.0, 0.0],
    [0.0, 1.0, 0.0, 0.0],
    [0.0, 0.0, 1.0, 0.0],
    [0.0, 0.0, 0.0, 1.0],
  ];
  scheduler.render(&mut renderer, identity);
  assert_eq!(renderer.uploads, vec![ChunkCoord::ZERO]);
  assert_eq!(renderer.draws, 1);

  // Nothing changed: a second render call should draw again but not
  // re-upload the same, unchanged mesh.
  scheduler.render(&mut renderer, identity);
  assert_eq!(renderer.uploads, vec![ChunkCoord::ZERO]);
  assert_eq!(renderer.draws, 2);
}

#[test]
fn render_is_a_no_op_when_disabled() {
  let mut field = SdfField::new(1.0);
  field.add_shape(Shape::Sphere { radius: 12.0 }, Affine3A::from_translation(Vec3::splat(16.0)), 1, BlendOp::Union);
  field.commit_pending();

  let config = SchedulerConfig {
    render_enabled: false,
    ..test_config()
  };
  let mut scheduler = Scheduler::new(field, config);
  tick_until(&mut scheduler, |s| {
    matches!(s.store().vertex_count(glam::IVec3::ZERO), VertexCount::Count(_))
  });

  let mut renderer = RecordingRenderer::default();
  scheduler.render(&mut renderer, [[0.0; 4]; 4]);
  assert!(renderer.uploads.is_empty());
  assert_eq!(renderer.draws, 0);
}
