//! Point-in-polygon membership: boundary clipping and isochrone zone classification.

mod clip;
mod zone;

pub use clip::{clip_to_polygon, contains};
pub use zone::{classify, ContourSource, IsochroneContour, ReachedNetwork, Zone, ZoneCounts, ZonedFeatures};
