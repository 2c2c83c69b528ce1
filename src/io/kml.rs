//! KML placemarks to canonical features.

use geo::{Coord, LineString, MultiLineString, MultiPoint, MultiPolygon, Point, Polygon};
use quick_xml::{events::Event, Reader};
use serde_json::Value;

use crate::{
    feature::{Feature, FeatureCollection, Geometry, Properties},
    Error, Result,
};

/// Parse a KML `<coordinates>` body: whitespace-separated `lon,lat[,alt]` tuples.
fn parse_coordinates(text: &str) -> Vec<Coord<f64>> {
    text.split_whitespace()
        .filter_map(|tuple| {
            let mut parts = tuple.split(',');
            let x = parts.next()?.trim().parse::<f64>().ok()?;
            let y = parts.next()?.trim().parse::<f64>().ok()?;
            Some(Coord { x, y })
        })
        .collect()
}

/// Merge the geometries of one placemark. Homogeneous multi-geometries collapse to
/// their multi type; mixed ones are returned unchanged and become one feature each.
fn merge_geometries(mut geometries: Vec<Geometry>) -> Vec<Geometry> {
    if geometries.len() < 2 { return geometries }

    if geometries.iter().all(|g| matches!(g, Geometry::Polygon(_) | Geometry::MultiPolygon(_))) {
        let polygons = geometries.drain(..).flat_map(|g| match g {
            Geometry::Polygon(p) => vec![p],
            Geometry::MultiPolygon(mp) => mp.0,
            _ => vec![],
        });
        return vec![Geometry::MultiPolygon(MultiPolygon::new(polygons.collect()))];
    }
    if geometries.iter().all(|g| matches!(g, Geometry::Point(_))) {
        let points = geometries.drain(..).filter_map(|g| match g { Geometry::Point(p) => Some(p), _ => None });
        return vec![Geometry::MultiPoint(MultiPoint::new(points.collect()))];
    }
    if geometries.iter().all(|g| matches!(g, Geometry::LineString(_))) {
        let lines = geometries.drain(..).filter_map(|g| match g { Geometry::LineString(l) => Some(l), _ => None });
        return vec![Geometry::MultiLineString(MultiLineString::new(lines.collect()))];
    }
    geometries
}

#[derive(Default)]
struct Placemark {
    properties: Properties,
    geometries: Vec<Geometry>,
    data_name: Option<String>,
}

#[derive(Default)]
struct PolygonBuilder {
    exterior: Option<LineString<f64>>,
    holes: Vec<LineString<f64>>,
}

/// Decode a KML document into features, one per placemark geometry.
pub(crate) fn read_kml(file: &str, bytes: &[u8]) -> Result<FeatureCollection> {
    let err = |e: &dyn std::fmt::Display| Error::Kml { file: file.to_string(), reason: e.to_string() };

    let mut reader = Reader::from_reader(bytes);
    reader.config_mut().trim_text(true);

    let mut collection = FeatureCollection::default();
    let mut stack: Vec<String> = Vec::new();
    let mut text = String::new();
    let mut placemark: Option<Placemark> = None;
    let mut polygon: Option<PolygonBuilder> = None;
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match reader.read_event_into(&mut buf).map_err(|e| err(&e))? {
            Event::Start(e) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                text.clear();
                match name.as_str() {
                    "Placemark" => placemark = Some(Placemark::default()),
                    "Polygon" => polygon = Some(PolygonBuilder::default()),
                    "Data" | "SimpleData" => {
                        if let Some(pm) = placemark.as_mut() {
                            pm.data_name = e.try_get_attribute("name").map_err(|e| err(&e))?
                                .map(|a| a.unescape_value().map(|v| v.into_owned()))
                                .transpose()
                                .map_err(|e| err(&e))?;
                        }
                    }
                    _ => {}
                }
                stack.push(name);
            }
            Event::Text(t) => text.push_str(&t.unescape().map_err(|e| err(&e))?),
            Event::CData(c) => text.push_str(&String::from_utf8_lossy(&c.into_inner())),
            Event::End(_) => {
                let Some(name) = stack.pop() else { continue };
                let parent = stack.last().map(String::as_str);
                let Some(pm) = placemark.as_mut() else { continue };

                match name.as_str() {
                    "name" | "description" | "styleUrl" if parent == Some("Placemark") => {
                        pm.properties.insert(name.clone(), Value::String(text.trim().to_string()));
                    }
                    "value" if parent == Some("Data") => {
                        if let Some(key) = pm.data_name.clone() {
                            pm.properties.insert(key, Value::String(text.trim().to_string()));
                        }
                    }
                    "SimpleData" => {
                        if let Some(key) = pm.data_name.take() {
                            pm.properties.insert(key, Value::String(text.trim().to_string()));
                        }
                    }
                    "coordinates" => {
                        let coords = parse_coordinates(&text);
                        let in_outer = stack.iter().any(|s| s == "outerBoundaryIs");
                        let in_inner = stack.iter().any(|s| s == "innerBoundaryIs");
                        match parent {
                            Some("Point") => {
                                if let Some(c) = coords.first() { pm.geometries.push(Geometry::Point(Point(*c))) }
                            }
                            Some("LineString") => pm.geometries.push(Geometry::LineString(LineString::new(coords))),
                            Some("LinearRing") => if let Some(pb) = polygon.as_mut() {
                                if in_outer { pb.exterior = Some(LineString::new(coords)) }
                                else if in_inner { pb.holes.push(LineString::new(coords)) }
                            },
                            _ => {}
                        }
                    }
                    "Polygon" => {
                        if let Some(PolygonBuilder { exterior: Some(exterior), holes }) = polygon.take() {
                            pm.geometries.push(Geometry::Polygon(Polygon::new(exterior, holes)));
                        }
                    }
                    "Placemark" => {
                        if let Some(done) = placemark.take() {
                            let geometries = merge_geometries(done.geometries);
                            if geometries.is_empty() {
                                tracing::warn!(file, "dropped placemark without geometry");
                            }
                            for geometry in geometries {
                                collection.push(Feature { geometry, properties: done.properties.clone() });
                            }
                        }
                    }
                    _ => {}
                }
                text.clear();
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(collection)
}
