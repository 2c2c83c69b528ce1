use geo::{Intersects, MultiPolygon, Point};
use rayon::prelude::*;

use crate::feature::{Feature, FeatureCollection};

/// Boundary-inclusive point-in-polygon test.
#[inline]
pub fn contains(boundary: &MultiPolygon<f64>, point: &Point<f64>) -> bool {
    boundary.intersects(point)
}

/// Keep the features whose representative point (the point itself, or the centroid)
/// lies inside `boundary`. Membership is all-or-nothing; nothing is cut.
/// Features with invalid geometry are excluded.
pub fn clip_to_polygon(features: &FeatureCollection, boundary: &MultiPolygon<f64>) -> FeatureCollection {
    let kept: Vec<Feature> = features.features().par_iter()
        .filter(|feature| {
            feature.geometry.representative_point()
                .is_some_and(|point| contains(boundary, &point))
        })
        .cloned()
        .collect();

    tracing::debug!(input = features.len(), kept = kept.len(), "clipped to boundary");
    FeatureCollection::new(kept)
}
