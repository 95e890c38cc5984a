//! Signed distance field composition: tagged primitives, blend operators,
//! and the pending-edit commit model (spec §3, §4.1, §9).

mod field;
mod primitive;

pub use field::SdfField;
pub use primitive::{BlendOp, Primitive, Shape, ShapeHandle};
