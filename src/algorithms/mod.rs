//! Path geometry algorithms

pub mod compression;
pub mod geodesy;
pub mod path_index;

pub use compression::compress_points;
pub use path_index::{IndexedPoint, PathIndex, PathProjection, TriggerWindow};
