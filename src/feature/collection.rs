use std::path::Path;

use geo::{BoundingRect, Coord, Rect};
use serde_json::Value;

use crate::{Error, Result};
use super::Geometry;

/// Ordered string-to-scalar attribute mapping; insertion order follows the source.
pub type Properties = serde_json::Map<String, Value>;

/// A canonical feature. Geometry is never absent.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub geometry: Geometry,
    pub properties: Properties,
}

impl Feature {
    pub fn new(geometry: impl Into<Geometry>, properties: Properties) -> Self {
        Self { geometry: geometry.into(), properties }
    }
}

/// Ordered sequence of canonical features; source order is preserved.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureCollection {
    features: Vec<Feature>,
}

impl FeatureCollection {
    pub fn new(features: Vec<Feature>) -> Self { Self { features } }

    #[inline] pub fn len(&self) -> usize { self.features.len() }

    #[inline] pub fn is_empty(&self) -> bool { self.features.is_empty() }

    #[inline] pub fn features(&self) -> &[Feature] { &self.features }

    #[inline] pub fn iter(&self) -> std::slice::Iter<'_, Feature> { self.features.iter() }

    pub fn push(&mut self, feature: Feature) { self.features.push(feature) }

    /// Bounding rectangle of all feature geometries.
    pub fn bounds(&self) -> Option<Rect<f64>> {
        self.features.iter()
            .filter_map(|f| f.geometry.to_geo().bounding_rect())
            .reduce(|a, b| Rect::new(
                Coord { x: a.min().x.min(b.min().x), y: a.min().y.min(b.min().y) },
                Coord { x: a.max().x.max(b.max().x), y: a.max().y.max(b.max().y) },
            ))
    }

    /// Build from a GeoJSON FeatureCollection. Features without a representable
    /// geometry are dropped.
    pub fn from_geojson(collection: geojson::FeatureCollection) -> Self {
        let total = collection.features.len();
        let features: Vec<Feature> = collection.features.into_iter()
            .filter_map(|feature| {
                let geometry = Geometry::from_geojson(&feature.geometry?.value)?;
                Some(Feature { geometry, properties: feature.properties.unwrap_or_default() })
            })
            .collect();
        if features.len() < total {
            tracing::warn!(dropped = total - features.len(), "dropped GeoJSON features without usable geometry");
        }
        Self { features }
    }

    /// Export as a GeoJSON FeatureCollection.
    pub fn to_geojson(&self) -> geojson::FeatureCollection {
        geojson::FeatureCollection {
            bbox: None,
            features: self.features.iter()
                .map(|feature| geojson::Feature {
                    bbox: None,
                    geometry: Some(geojson::Geometry::new(feature.geometry.to_geojson())),
                    id: None,
                    properties: Some(feature.properties.clone()),
                    foreign_members: None,
                })
                .collect(),
            foreign_members: None,
        }
    }

    /// Write as GeoJSON to `path`.
    pub fn write_geojson(&self, path: &Path) -> Result<()> {
        let bytes = serde_json::to_vec(&self.to_geojson())
            .map_err(|source| Error::Json { file: path.display().to_string(), source })?;
        std::fs::write(path, bytes).map_err(|e| Error::io(path, e))
    }
}

impl FromIterator<Feature> for FeatureCollection {
    fn from_iter<I: IntoIterator<Item = Feature>>(iter: I) -> Self {
        Self { features: iter.into_iter().collect() }
    }
}

impl IntoIterator for FeatureCollection {
    type Item = Feature;
    type IntoIter = std::vec::IntoIter<Feature>;

    fn into_iter(self) -> Self::IntoIter { self.features.into_iter() }
}

impl<'a> IntoIterator for &'a FeatureCollection {
    type Item = &'a Feature;
    type IntoIter = std::slice::Iter<'a, Feature>;

    fn into_iter(self) -> Self::IntoIter { self.features.iter() }
}
