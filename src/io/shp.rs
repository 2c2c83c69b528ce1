//! Shapefile decoding: `.shp` geometry, `.dbf` attributes and `.prj` reprojection.

use std::{io::Cursor, path::Path};

use geo::{Coord, LineString, MultiLineString, MultiPoint, MultiPolygon, Point, Polygon};
use serde_json::{json, Value};
use shapefile::{dbase, PolygonRing, Shape, ShapeReader};

use crate::{
    feature::{Feature, FeatureCollection, Geometry, Properties},
    Error, Result,
};
use super::prj::Reprojection;

/// Signed area of a ring (negative for clockwise, which shapefiles use for exteriors).
fn signed_area(pts: &[Coord<f64>]) -> f64 {
    pts.windows(2).map(|w| w[0].x * w[1].y - w[1].x * w[0].y).sum::<f64>() / 2.0
}

/// Group shapefile rings into polygons: each outer ring owns the inner rings that follow it.
fn rings_to_multipolygon(rings: Vec<(Vec<Coord<f64>>, Option<bool>)>) -> MultiPolygon<f64> {
    let mut polys: Vec<Polygon<f64>> = Vec::new();
    let mut current_exterior: Option<LineString<f64>> = None;
    let mut current_holes: Vec<LineString<f64>> = Vec::new();

    for (coords, outer) in rings {
        let is_exterior = outer.unwrap_or_else(|| signed_area(&coords) < 0.0);
        let ring = LineString::new(coords);
        if is_exterior {
            if let Some(ext) = current_exterior.take() {
                polys.push(Polygon::new(ext, std::mem::take(&mut current_holes)));
            }
            current_exterior = Some(ring);
        } else {
            current_holes.push(ring);
        }
    }
    if let Some(ext) = current_exterior {
        polys.push(Polygon::new(ext, current_holes));
    }

    MultiPolygon::new(polys)
}

macro_rules! coords {
    ($points:expr) => { $points.iter().map(|p| Coord { x: p.x, y: p.y }).collect::<Vec<_>>() };
}

macro_rules! polygon_rings {
    ($polygon:expr) => {
        $polygon.rings().iter()
            .map(|ring| match ring {
                PolygonRing::Outer(points) => (coords!(points), Some(true)),
                PolygonRing::Inner(points) => (coords!(points), Some(false)),
            })
            .collect::<Vec<_>>()
    };
}

macro_rules! polyline_parts {
    ($polyline:expr) => {
        $polyline.parts().iter().map(|part| LineString::new(coords!(part))).collect::<Vec<_>>()
    };
}

/// Convert one shapefile record geometry. Null shapes and multipatches have no canonical form.
pub(crate) fn shape_to_geometry(shape: Shape) -> Option<Geometry> {
    fn lines(mut parts: Vec<LineString<f64>>) -> Option<Geometry> {
        match parts.len() {
            0 => None,
            1 => parts.pop().map(Geometry::LineString),
            _ => Some(Geometry::MultiLineString(MultiLineString::new(parts))),
        }
    }
    fn polygons(mp: MultiPolygon<f64>) -> Option<Geometry> {
        match mp.0.len() {
            0 => None,
            1 => mp.0.into_iter().next().map(Geometry::Polygon),
            _ => Some(Geometry::MultiPolygon(mp)),
        }
    }
    fn points(coords: Vec<Coord<f64>>) -> Option<Geometry> {
        (!coords.is_empty()).then(|| Geometry::MultiPoint(MultiPoint::new(coords.into_iter().map(Point).collect())))
    }

    match shape {
        Shape::NullShape | Shape::Multipatch(_) => None,
        Shape::Point(p) => Some(Geometry::Point(Point::new(p.x, p.y))),
        Shape::PointM(p) => Some(Geometry::Point(Point::new(p.x, p.y))),
        Shape::PointZ(p) => Some(Geometry::Point(Point::new(p.x, p.y))),
        Shape::Polyline(l) => lines(polyline_parts!(l)),
        Shape::PolylineM(l) => lines(polyline_parts!(l)),
        Shape::PolylineZ(l) => lines(polyline_parts!(l)),
        Shape::Polygon(p) => polygons(rings_to_multipolygon(polygon_rings!(p))),
        Shape::PolygonM(p) => polygons(rings_to_multipolygon(polygon_rings!(p))),
        Shape::PolygonZ(p) => polygons(rings_to_multipolygon(polygon_rings!(p))),
        Shape::Multipoint(m) => points(coords!(m.points())),
        Shape::MultipointM(m) => points(coords!(m.points())),
        Shape::MultipointZ(m) => points(coords!(m.points())),
    }
}

/// Convert a dBASE field value to a JSON scalar.
fn field_to_json(value: &dbase::FieldValue) -> Value {
    use dbase::FieldValue as F;
    match value {
        F::Character(s) => s.as_deref().map_or(Value::Null, |s| json!(s.trim_end())),
        F::Memo(s) => json!(s),
        F::Numeric(n) => n.map_or(Value::Null, |n| json!(n)),
        F::Float(n) => n.map_or(Value::Null, |n| json!(n)),
        F::Integer(n) => json!(n),
        F::Double(n) => json!(n),
        F::Currency(n) => json!(n),
        F::Logical(b) => b.map_or(Value::Null, |b| json!(b)),
        F::Date(d) => d.map_or(Value::Null, |d| json!(format!("{:04}-{:02}-{:02}", d.year(), d.month(), d.day()))),
        F::DateTime(dt) => {
            let d = dt.date();
            json!(format!("{:04}-{:02}-{:02}", d.year(), d.month(), d.day()))
        }
        #[allow(unreachable_patterns)]
        _ => Value::Null,
    }
}

/// Read every `.dbf` record as an ordered property map, in field declaration order.
fn read_attributes(file: &str, dbf: &[u8]) -> Result<Vec<Properties>> {
    let err = |e: dbase::Error| Error::Shapefile { file: file.to_string(), reason: format!("dbf: {e}") };

    let mut reader = dbase::Reader::new(Cursor::new(dbf)).map_err(err)?;
    let fields: Vec<String> = reader.fields().iter()
        .map(|f| f.name().to_string())
        .filter(|name| name != "DeletionFlag")
        .collect();

    let records = reader.read().map_err(err)?;
    Ok(records.into_iter()
        .map(|record| {
            fields.iter()
                .map(|name| (name.clone(), record.get(name).map_or(Value::Null, field_to_json)))
                .collect()
        })
        .collect())
}

fn read_shapes(file: &str, shp: &[u8]) -> Result<Vec<Shape>> {
    let err = |e: shapefile::Error| Error::Shapefile { file: file.to_string(), reason: format!("shp: {e}") };
    ShapeReader::new(Cursor::new(shp)).map_err(err)?.read().map_err(err)
}

/// Pair geometries with attributes by record index, failing on any count mismatch.
pub(crate) fn join_records(
    file: &str,
    shapes: Vec<Shape>,
    attributes: Vec<Properties>,
    reprojection: &Reprojection,
) -> Result<FeatureCollection> {
    if shapes.len() != attributes.len() {
        return Err(Error::GeometryAttributeMismatch {
            file: file.to_string(),
            geometries: shapes.len(),
            attributes: attributes.len(),
        });
    }

    let total = shapes.len();
    let collection: FeatureCollection = shapes.into_iter()
        .zip(attributes)
        .filter_map(|(shape, properties)| {
            let geometry = reprojection.apply(shape_to_geometry(shape)?)?;
            Some(Feature { geometry, properties })
        })
        .collect();

    if collection.len() < total {
        tracing::warn!(file, dropped = total - collection.len(), "dropped records with null or untransformable geometry");
    }
    Ok(collection)
}

fn reprojection(file: &str, prj: Option<&str>) -> Result<Reprojection> {
    Reprojection::from_wkt(prj.unwrap_or_default())
        .map_err(|reason| Error::Projection { file: file.to_string(), reason })
}

/// Decode a shapefile from its component payloads.
pub(crate) fn read_shapefile(file: &str, shp: &[u8], dbf: &[u8], prj: Option<&str>) -> Result<FeatureCollection> {
    let reprojection = reprojection(file, prj)?;
    let shapes = read_shapes(file, shp)?;
    let attributes = read_attributes(file, dbf)?;
    join_records(file, shapes, attributes, &reprojection)
}

/// Decode a bare `.shp`: geometry only, with empty property maps.
pub(crate) fn read_bare_shp(file: &str, shp: &[u8]) -> Result<FeatureCollection> {
    let shapes = read_shapes(file, shp)?;
    let total = shapes.len();
    let collection: FeatureCollection = shapes.into_iter()
        .filter_map(shape_to_geometry)
        .map(|geometry| Feature { geometry, properties: Properties::new() })
        .collect();
    if collection.len() < total {
        tracing::warn!(file, dropped = total - collection.len(), "dropped null shapes");
    }
    Ok(collection)
}

/// Whole-archive reader: extract to a scratch directory and read the first shapefile found on disk.
pub(crate) fn read_extracted_archive(file: &str, archive_bytes: &[u8]) -> Result<FeatureCollection> {
    let dir = tempfile::tempdir().map_err(|e| Error::io(std::env::temp_dir(), e))?;
    super::archive::open(file, archive_bytes)?
        .extract(dir.path())
        .map_err(|e| Error::CorruptArchive { file: file.to_string(), reason: e.to_string() })?;

    let shp_path = walkdir::WalkDir::new(dir.path()).sort_by_file_name().into_iter()
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.into_path())
        .find(|path| path.extension().is_some_and(|e| e.eq_ignore_ascii_case("shp")))
        .ok_or_else(|| Error::Shapefile { file: file.to_string(), reason: "no .shp member".to_string() })?;

    read_shapefile_path(file, &shp_path)
}

/// Read a shapefile (with sibling `.dbf` and optional `.prj`) from disk.
///
/// Both sides are read in full before joining; a paired iteration would stop at the
/// shorter one and hide extra records.
pub(crate) fn read_shapefile_path(file: &str, shp_path: &Path) -> Result<FeatureCollection> {
    let err = |e: shapefile::Error| Error::Shapefile { file: file.to_string(), reason: e.to_string() };
    let dbf_err = |e: dbase::Error| Error::Shapefile { file: file.to_string(), reason: format!("dbf: {e}") };

    let prj = std::fs::read_to_string(shp_path.with_extension("prj")).ok();
    let reprojection = reprojection(file, prj.as_deref())?;

    let mut table = dbase::Reader::from_path(shp_path.with_extension("dbf")).map_err(dbf_err)?;
    // The record maps are unordered; recover declaration order from the table header.
    let field_order: Vec<String> = table.fields().iter()
        .map(|f| f.name().to_string())
        .filter(|name| name != "DeletionFlag")
        .collect();
    let attributes: Vec<Properties> = table.read().map_err(dbf_err)?
        .into_iter()
        .map(|mut record| field_order.iter()
            .filter_map(|name| record.remove(name).map(|value| (name.clone(), field_to_json(&value))))
            .collect())
        .collect();

    let shapes = ShapeReader::from_path(shp_path).map_err(err)?.read().map_err(err)?;
    join_records(file, shapes, attributes, &reprojection)
}

#[cfg(test)]
pub(crate) mod tests {
    use shapefile::dbase::{FieldName, Record, TableWriterBuilder};

    use super::*;

    /// Write a point shapefile with a NAME attribute into `dir`, returning the `.shp` path.
    pub(crate) fn write_points(dir: &Path, stem: &str, points: &[(f64, f64, &str)]) -> std::path::PathBuf {
        let path = dir.join(format!("{stem}.shp"));
        let table = TableWriterBuilder::new()
            .add_character_field(FieldName::try_from("NAME").unwrap(), 32);
        let mut writer = shapefile::Writer::from_path(&path, table).unwrap();
        for (x, y, name) in points {
            let mut record = Record::default();
            record.insert("NAME".to_string(), dbase::FieldValue::Character(Some(name.to_string())));
            writer.write_shape_and_record(&shapefile::Point::new(*x, *y), &record).unwrap();
        }
        drop(writer);
        path
    }

    #[test]
    fn rings_group_holes_under_their_exterior() {
        let square = |x0: f64, cw: bool| {
            let mut pts = vec![
                Coord { x: x0, y: 0.0 }, Coord { x: x0 + 1.0, y: 0.0 },
                Coord { x: x0 + 1.0, y: 1.0 }, Coord { x: x0, y: 1.0 }, Coord { x: x0, y: 0.0 },
            ];
            if cw { pts.reverse() }
            pts
        };
        let mp = rings_to_multipolygon(vec![
            (square(0.0, true), None),
            (square(0.25, false), None),
            (square(5.0, true), None),
        ]);
        assert_eq!(mp.0.len(), 2);
        assert_eq!(mp.0[0].interiors().len(), 1);
        assert!(mp.0[1].interiors().is_empty());
    }

    #[test]
    fn null_shapes_have_no_geometry() {
        assert!(shape_to_geometry(Shape::NullShape).is_none());
        let p = shape_to_geometry(Shape::Point(shapefile::Point::new(1.0, 2.0))).unwrap();
        assert_eq!(p, Geometry::Point(Point::new(1.0, 2.0)));
    }

    #[test]
    fn mismatched_counts_fail_loudly() {
        let shapes: Vec<Shape> = (0..3).map(|_| Shape::Point(shapefile::Point::new(0.0, 0.0))).collect();
        let attributes = vec![Properties::new(); 2];
        let err = join_records("parcels.zip", shapes, attributes, &Reprojection::Identity).unwrap_err();
        assert_eq!(err.to_string(), "parcels.zip: geometry count (3) does not match attribute count (2)");
    }

    #[test]
    fn shapefile_from_disk_joins_attributes_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_points(dir.path(), "stops", &[(12.49, 41.89, "Colosseo"), (12.48, 41.90, "Barberini")]);

        let collection = read_shapefile_path("stops.shp", &path).unwrap();
        assert_eq!(collection.len(), 2);
        assert_eq!(collection.features()[1].properties["NAME"], json!("Barberini"));
        assert_eq!(collection.features()[0].geometry, Geometry::Point(Point::new(12.49, 41.89)));
    }

    #[test]
    fn disk_reader_catches_extra_dbf_records() {
        let dir = tempfile::tempdir().unwrap();
        let three = write_points(dir.path(), "three", &[(1.0, 2.0, "a"), (3.0, 4.0, "b"), (5.0, 6.0, "c")]);
        let two = write_points(dir.path(), "two", &[(1.0, 2.0, "a"), (3.0, 4.0, "b")]);
        // Two shapes against three attribute records.
        std::fs::copy(three.with_extension("dbf"), two.with_extension("dbf")).unwrap();

        let err = read_shapefile_path("two.shp", &two).unwrap_err();
        assert!(matches!(err, Error::GeometryAttributeMismatch { geometries: 2, attributes: 3, .. }), "{err}");
    }

    #[test]
    fn in_memory_payloads_match_disk_reader() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_points(dir.path(), "stops", &[(1.0, 2.0, "a"), (3.0, 4.0, "b"), (5.0, 6.0, "c")]);
        let shp = std::fs::read(&path).unwrap();
        let dbf = std::fs::read(path.with_extension("dbf")).unwrap();

        let from_memory = read_shapefile("stops.zip", &shp, &dbf, None).unwrap();
        let from_disk = read_shapefile_path("stops.shp", &path).unwrap();
        assert_eq!(from_memory, from_disk);

        let bare = read_bare_shp("stops.shp", &shp).unwrap();
        assert_eq!(bare.len(), 3);
        assert!(bare.features().iter().all(|f| f.properties.is_empty()));
    }
}
