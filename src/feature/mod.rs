mod collection;
mod geometry;

pub use collection::{Feature, FeatureCollection, Properties};
pub use geometry::Geometry;
