#![doc = "Walkzone public API"]
//! Geospatial file ingestion into canonical feature collections, and
//! zone-weighted walkability scoring around a sample point.

pub mod config;
mod error;
pub mod feature;
pub mod io;
pub mod isochrone;
pub mod normalize;
pub mod palette;
pub mod scoring;
pub mod spatial;

#[doc(inline)]
pub use error::{Error, Result};

#[doc(inline)]
pub use feature::{Feature, FeatureCollection, Geometry, Properties};

#[doc(inline)]
pub use io::{decode, decode_file, decode_with_report, Decoded, Format};

#[doc(inline)]
pub use config::AnalysisConfig;

#[doc(inline)]
pub use scoring::{Analysis, AnalysisResult, Category, CategoryWeights};
