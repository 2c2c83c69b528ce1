//! Decoding of uploaded files into canonical feature collections.
//!
//! The file extension is the sole format selector; content is never sniffed.
//!
//! - `archive` - zip EOCD repair and member selection
//! - `shp` - shapefile geometry/attribute join
//! - `prj` - `.prj` well-known-text reprojection
//! - `kml` - KML placemarks
//! - `tabular` - CSV, spreadsheet and JSON rows

pub mod archive;
pub(crate) mod kml;
pub(crate) mod prj;
pub(crate) mod shp;
pub(crate) mod tabular;

use std::path::Path;

use serde_json::Value;

use crate::{
    feature::{FeatureCollection, Geometry},
    normalize::{normalize_dates, normalize_with_outcome, Row, TabularOutcome},
    Error, Result,
};

use archive::Member;

/// Supported input formats, keyed by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Zip,
    Shp,
    Kml,
    Spreadsheet,
    Csv,
    GeoJson,
}

impl Format {
    /// Select a format from the file name's extension, case-insensitively.
    pub fn from_filename(filename: &str) -> Result<Self> {
        let extension = Path::new(filename).extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        match extension.as_str() {
            "zip" => Ok(Self::Zip),
            "shp" => Ok(Self::Shp),
            "kml" => Ok(Self::Kml),
            "xlsx" | "xls" => Ok(Self::Spreadsheet),
            "csv" => Ok(Self::Csv),
            "geojson" | "json" => Ok(Self::GeoJson),
            _ => Err(Error::UnsupportedFormat { file: filename.to_string(), extension }),
        }
    }
}

/// A decoded file together with how its tabular rows (if any) resolved to points.
#[derive(Debug)]
pub struct Decoded {
    pub collection: FeatureCollection,
    /// `None` when the source carried geometry natively.
    pub tabular: Option<TabularOutcome>,
}

impl Decoded {
    fn native(collection: FeatureCollection) -> Self {
        Self { collection, tabular: None }
    }

    fn from_rows(rows: Vec<Row>) -> Self {
        let (collection, outcome) = normalize_with_outcome(rows);
        Self { collection, tabular: Some(outcome) }
    }

    /// Rows read from CSV or a spreadsheet: rewrite serial deal dates first.
    fn from_sheet_rows(mut rows: Vec<Row>) -> Self {
        normalize_dates(&mut rows);
        Self::from_rows(rows)
    }
}

/// Decode `bytes` according to the extension of `filename`.
pub fn decode(filename: &str, bytes: &[u8]) -> Result<FeatureCollection> {
    Ok(decode_with_report(filename, bytes)?.collection)
}

/// Decode a file on disk, using its file name for dispatch.
pub fn decode_file(path: &Path) -> Result<Decoded> {
    let bytes = std::fs::read(path).map_err(|e| Error::io(path, e))?;
    let filename = path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    decode_with_report(&filename, &bytes)
}

/// Decode and also report the tabular resolution, so that "no coordinate columns"
/// can be told apart from "no rows".
pub fn decode_with_report(filename: &str, bytes: &[u8]) -> Result<Decoded> {
    let format = Format::from_filename(filename)?;
    tracing::debug!(file = filename, ?format, size = bytes.len(), "decoding");

    let decoded = match format {
        Format::Zip => decode_zip(filename, bytes)?,
        Format::Shp => Decoded::native(shp::read_bare_shp(filename, bytes)?),
        Format::Kml => Decoded::native(kml::read_kml(filename, bytes)?),
        Format::Spreadsheet => Decoded::from_sheet_rows(tabular::read_spreadsheet_rows(filename, bytes)?),
        Format::Csv => Decoded::from_sheet_rows(tabular::read_csv_rows(filename, bytes)?),
        Format::GeoJson => decode_json(filename, bytes)?,
    };

    tracing::info!(file = filename, features = decoded.collection.len(), "decoded");
    Ok(decoded)
}

fn decode_zip(filename: &str, bytes: &[u8]) -> Result<Decoded> {
    let mut zip = archive::open(filename, bytes)?;

    match archive::select_member(filename, &mut zip)? {
        Member::Shapefile { name, shp, dbf, prj } => {
            match shp::read_shapefile(filename, &shp, &dbf, prj.as_deref()) {
                Ok(collection) => Ok(Decoded::native(collection)),
                Err(e @ Error::GeometryAttributeMismatch { .. }) => Err(e),
                Err(e) => {
                    tracing::warn!(file = filename, member = %name, error = %e, "shapefile parse failed, retrying from extracted archive");
                    shp::read_extracted_archive(filename, bytes)
                        .map(Decoded::native)
                        .map_err(|fallback| {
                            tracing::debug!(file = filename, error = %fallback, "extracted-archive reader also failed");
                            e
                        })
                }
            }
        }
        Member::Kml { bytes, .. } => Ok(Decoded::native(kml::read_kml(filename, &bytes)?)),
        Member::Spreadsheet { bytes, .. } => Ok(Decoded::from_sheet_rows(tabular::read_spreadsheet_rows(filename, &bytes)?)),
        Member::Csv { bytes, .. } => Ok(Decoded::from_sheet_rows(tabular::read_csv_rows(filename, &bytes)?)),
    }
}

fn decode_json(filename: &str, bytes: &[u8]) -> Result<Decoded> {
    let value: Value = serde_json::from_slice(bytes)
        .map_err(|source| Error::Json { file: filename.to_string(), source })?;

    match value.get("type").and_then(Value::as_str) {
        Some("FeatureCollection") => {
            let collection: geojson::FeatureCollection = serde_json::from_value(value)
                .map_err(|source| Error::Json { file: filename.to_string(), source })?;
            Ok(Decoded::native(FeatureCollection::from_geojson(collection)))
        }
        Some("Feature") => {
            let feature: geojson::Feature = serde_json::from_value(value)
                .map_err(|source| Error::Json { file: filename.to_string(), source })?;
            Ok(Decoded::native(FeatureCollection::from_geojson(geojson::FeatureCollection {
                bbox: None,
                features: vec![feature],
                foreign_members: None,
            })))
        }
        _ => Ok(Decoded::from_rows(tabular::json_rows(value))),
    }
}

/// The first polygonal geometry of a collection, used as a clipping boundary.
pub fn first_polygon(collection: &FeatureCollection) -> Option<geo::MultiPolygon<f64>> {
    collection.iter().find_map(|f| match &f.geometry {
        Geometry::Polygon(_) | Geometry::MultiPolygon(_) => f.geometry.as_multipolygon(),
        _ => None,
    })
}
