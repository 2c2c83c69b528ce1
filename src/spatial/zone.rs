use std::fmt;

use geo::MultiPolygon;
use rayon::prelude::*;
use serde::Serialize;

use super::contains;
use crate::feature::{Feature, FeatureCollection};

/// Walking-distance band around a sample point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Zone {
    /// Within 5 minutes.
    A,
    /// More than 5, up to 10 minutes.
    B,
    /// More than 10, up to 15 minutes.
    C,
}

impl Zone {
    pub const ALL: [Zone; 3] = [Zone::A, Zone::B, Zone::C];

    /// Zone for a contour threshold; thresholds outside `[0, 15]` have none.
    pub fn from_minutes(minutes: f64) -> Option<Self> {
        match minutes {
            m if (0.0..=5.0).contains(&m) => Some(Self::A),
            m if m > 5.0 && m <= 10.0 => Some(Self::B),
            m if m > 10.0 && m <= 15.0 => Some(Self::C),
            _ => None,
        }
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self { Self::A => "A", Self::B => "B", Self::C => "C" })
    }
}

/// Size of the street network reached within a contour's time budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReachedNetwork {
    pub nodes: usize,
    pub edges: usize,
}

/// Where a contour polygon came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "source", rename_all = "kebab-case")]
pub enum ContourSource {
    /// Walking-network reachability from a provider. `reached` is known only for
    /// providers that traverse the network themselves.
    NetworkIsochrone {
        provider: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        reached: Option<ReachedNetwork>,
    },
    /// Circular approximation used when no network contour was available.
    BufferFallback { reason: String },
}

impl ContourSource {
    pub fn label(&self) -> &'static str {
        match self {
            Self::NetworkIsochrone { .. } => "network-isochrone",
            Self::BufferFallback { .. } => "buffer-fallback",
        }
    }

    pub fn is_fallback(&self) -> bool { matches!(self, Self::BufferFallback { .. }) }

    pub fn reached(&self) -> Option<ReachedNetwork> {
        match self {
            Self::NetworkIsochrone { reached, .. } => *reached,
            Self::BufferFallback { .. } => None,
        }
    }
}

/// One reachability polygon for a minute threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct IsochroneContour {
    pub polygon: MultiPolygon<f64>,
    pub minutes: f64,
    pub source: ContourSource,
    /// Geodesic area in square kilometres, rounded to three decimals.
    pub area_km2: f64,
}

impl IsochroneContour {
    #[inline]
    pub fn zone(&self) -> Option<Zone> { Zone::from_minutes(self.minutes) }
}

/// Feature counts per zone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ZoneCounts {
    pub a: usize,
    pub b: usize,
    pub c: usize,
}

impl ZoneCounts {
    pub fn get(&self, zone: Zone) -> usize {
        match zone { Zone::A => self.a, Zone::B => self.b, Zone::C => self.c }
    }

    pub fn total(&self) -> usize { self.a + self.b + self.c }
}

impl std::ops::AddAssign for ZoneCounts {
    fn add_assign(&mut self, rhs: Self) {
        self.a += rhs.a;
        self.b += rhs.b;
        self.c += rhs.c;
    }
}

/// Features partitioned by zone. Every input feature lands in exactly one bucket;
/// features without a representative point are `outside`.
#[derive(Debug, Default)]
pub struct ZonedFeatures<'a> {
    pub a: Vec<&'a Feature>,
    pub b: Vec<&'a Feature>,
    pub c: Vec<&'a Feature>,
    pub outside: Vec<&'a Feature>,
}

impl<'a> ZonedFeatures<'a> {
    pub fn zone(&self, zone: Zone) -> &[&'a Feature] {
        match zone { Zone::A => &self.a, Zone::B => &self.b, Zone::C => &self.c }
    }

    pub fn counts(&self) -> ZoneCounts {
        ZoneCounts { a: self.a.len(), b: self.b.len(), c: self.c.len() }
    }
}

/// Assign each feature to the tightest contour containing its representative point.
///
/// Contours are tested in ascending `minutes` regardless of input order, and the
/// first containing contour wins. Contours with no zone (over 15 minutes) are ignored.
pub fn classify<'a>(features: &'a FeatureCollection, contours: &[IsochroneContour]) -> ZonedFeatures<'a> {
    let mut ordered: Vec<(&IsochroneContour, Zone)> = contours.iter()
        .filter_map(|c| match c.zone() {
            Some(zone) => Some((c, zone)),
            None => {
                tracing::warn!(minutes = c.minutes, "contour outside zone range, ignored");
                None
            }
        })
        .collect();
    ordered.sort_by(|(a, _), (b, _)| a.minutes.total_cmp(&b.minutes));

    let assignments: Vec<Option<Zone>> = features.features().par_iter()
        .map(|feature| {
            let point = feature.geometry.representative_point()?;
            ordered.iter()
                .find(|(contour, _)| contains(&contour.polygon, &point))
                .map(|(_, zone)| *zone)
        })
        .collect();

    let mut zoned = ZonedFeatures::default();
    for (feature, zone) in features.iter().zip(assignments) {
        match zone {
            Some(Zone::A) => zoned.a.push(feature),
            Some(Zone::B) => zoned.b.push(feature),
            Some(Zone::C) => zoned.c.push(feature),
            None => zoned.outside.push(feature),
        }
    }
    zoned
}
