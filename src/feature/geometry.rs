use geo::{Centroid, Coord, LineString, MultiLineString, MultiPoint, MultiPolygon, Point, Polygon, Validation};
use geojson::Value;

/// Geometry carried by a canonical feature. Coordinates are `[lon, lat]` in WGS84.
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Point(Point<f64>),
    LineString(LineString<f64>),
    Polygon(Polygon<f64>),
    MultiPolygon(MultiPolygon<f64>),
    MultiPoint(MultiPoint<f64>),
    MultiLineString(MultiLineString<f64>),
}

impl Geometry {
    /// GeoJSON type name.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Point(_) => "Point",
            Self::LineString(_) => "LineString",
            Self::Polygon(_) => "Polygon",
            Self::MultiPolygon(_) => "MultiPolygon",
            Self::MultiPoint(_) => "MultiPoint",
            Self::MultiLineString(_) => "MultiLineString",
        }
    }

    /// Borrow as a `geo` geometry for use with `geo` algorithms.
    pub fn to_geo(&self) -> geo::Geometry<f64> {
        match self {
            Self::Point(p) => geo::Geometry::Point(*p),
            Self::LineString(ls) => geo::Geometry::LineString(ls.clone()),
            Self::Polygon(p) => geo::Geometry::Polygon(p.clone()),
            Self::MultiPolygon(mp) => geo::Geometry::MultiPolygon(mp.clone()),
            Self::MultiPoint(mp) => geo::Geometry::MultiPoint(mp.clone()),
            Self::MultiLineString(mls) => geo::Geometry::MultiLineString(mls.clone()),
        }
    }

    /// Convert from a `geo` geometry. Types outside the canonical union yield `None`.
    pub fn from_geo(geometry: geo::Geometry<f64>) -> Option<Self> {
        match geometry {
            geo::Geometry::Point(p) => Some(Self::Point(p)),
            geo::Geometry::LineString(ls) => Some(Self::LineString(ls)),
            geo::Geometry::Polygon(p) => Some(Self::Polygon(p)),
            geo::Geometry::MultiPolygon(mp) => Some(Self::MultiPolygon(mp)),
            geo::Geometry::MultiPoint(mp) => Some(Self::MultiPoint(mp)),
            geo::Geometry::MultiLineString(mls) => Some(Self::MultiLineString(mls)),
            geo::Geometry::Rect(r) => Some(Self::Polygon(r.to_polygon())),
            geo::Geometry::Triangle(t) => Some(Self::Polygon(t.to_polygon())),
            geo::Geometry::Line(l) => Some(Self::LineString(LineString::new(vec![l.start, l.end]))),
            geo::Geometry::GeometryCollection(_) => None,
        }
    }

    /// Structural validity: finite coordinates, non-degenerate lines, simple rings.
    pub fn is_valid(&self) -> bool {
        match self {
            Self::Point(p) => p.x().is_finite() && p.y().is_finite(),
            Self::LineString(ls) => ls.is_valid(),
            Self::Polygon(p) => p.is_valid(),
            Self::MultiPolygon(mp) => !mp.0.is_empty() && mp.is_valid(),
            Self::MultiPoint(mp) => !mp.0.is_empty() && mp.is_valid(),
            Self::MultiLineString(mls) => !mls.0.is_empty() && mls.is_valid(),
        }
    }

    /// The single point used for containment tests: the point itself, or the centroid.
    /// Invalid geometries have no representative point.
    pub fn representative_point(&self) -> Option<Point<f64>> {
        if !self.is_valid() { return None }
        let point = match self {
            Self::Point(p) => Some(*p),
            Self::LineString(ls) => ls.centroid(),
            Self::Polygon(p) => p.centroid(),
            Self::MultiPolygon(mp) => mp.centroid(),
            Self::MultiPoint(mp) => mp.centroid(),
            Self::MultiLineString(mls) => mls.centroid(),
        }?;
        (point.x().is_finite() && point.y().is_finite()).then_some(point)
    }

    /// Convert to a GeoJSON geometry value.
    pub fn to_geojson(&self) -> Value {
        fn position(c: Coord<f64>) -> Vec<f64> { vec![c.x, c.y] }
        fn line(ls: &LineString<f64>) -> Vec<Vec<f64>> { ls.coords().map(|c| position(*c)).collect() }
        fn polygon(p: &Polygon<f64>) -> Vec<Vec<Vec<f64>>> {
            std::iter::once(p.exterior()).chain(p.interiors()).map(line).collect()
        }

        match self {
            Self::Point(p) => Value::Point(position(p.0)),
            Self::LineString(ls) => Value::LineString(line(ls)),
            Self::Polygon(p) => Value::Polygon(polygon(p)),
            Self::MultiPolygon(mp) => Value::MultiPolygon(mp.iter().map(polygon).collect()),
            Self::MultiPoint(mp) => Value::MultiPoint(mp.iter().map(|p| position(p.0)).collect()),
            Self::MultiLineString(mls) => Value::MultiLineString(mls.iter().map(line).collect()),
        }
    }

    /// Convert from a GeoJSON geometry value. Malformed positions and geometry
    /// collections yield `None`.
    pub fn from_geojson(value: &Value) -> Option<Self> {
        fn coord(position: &[f64]) -> Option<Coord<f64>> {
            match position {
                [x, y, ..] => Some(Coord { x: *x, y: *y }),
                _ => None,
            }
        }
        fn line(positions: &[Vec<f64>]) -> Option<LineString<f64>> {
            positions.iter().map(|p| coord(p)).collect::<Option<Vec<_>>>().map(LineString::new)
        }
        fn polygon(rings: &[Vec<Vec<f64>>]) -> Option<Polygon<f64>> {
            let (exterior, interiors) = rings.split_first()?;
            let interiors = interiors.iter().map(|r| line(r)).collect::<Option<Vec<_>>>()?;
            Some(Polygon::new(line(exterior)?, interiors))
        }

        match value {
            Value::Point(p) => coord(p).map(|c| Self::Point(Point(c))),
            Value::LineString(ls) => line(ls).map(Self::LineString),
            Value::Polygon(p) => polygon(p).map(Self::Polygon),
            Value::MultiPolygon(mp) => mp.iter().map(|p| polygon(p)).collect::<Option<Vec<_>>>()
                .map(|polys| Self::MultiPolygon(MultiPolygon::new(polys))),
            Value::MultiPoint(mp) => mp.iter().map(|p| coord(p).map(Point)).collect::<Option<Vec<_>>>()
                .map(|points| Self::MultiPoint(MultiPoint::new(points))),
            Value::MultiLineString(mls) => mls.iter().map(|l| line(l)).collect::<Option<Vec<_>>>()
                .map(|lines| Self::MultiLineString(MultiLineString::new(lines))),
            Value::GeometryCollection(_) => None,
        }
    }

    /// Polygonal geometries usable as a clipping boundary or isochrone contour.
    pub fn as_multipolygon(&self) -> Option<MultiPolygon<f64>> {
        match self {
            Self::Polygon(p) => Some(MultiPolygon::new(vec![p.clone()])),
            Self::MultiPolygon(mp) => Some(mp.clone()),
            _ => None,
        }
    }
}

impl From<Point<f64>> for Geometry {
    fn from(point: Point<f64>) -> Self { Self::Point(point) }
}

impl From<Polygon<f64>> for Geometry {
    fn from(polygon: Polygon<f64>) -> Self { Self::Polygon(polygon) }
}

impl From<MultiPolygon<f64>> for Geometry {
    fn from(mp: MultiPolygon<f64>) -> Self { Self::MultiPolygon(mp) }
}

impl From<LineString<f64>> for Geometry {
    fn from(ls: LineString<f64>) -> Self { Self::LineString(ls) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{line_string, point, polygon};

    #[test]
    fn point_is_its_own_representative() {
        let g = Geometry::Point(point!(x: 12.5, y: 41.9));
        assert_eq!(g.representative_point(), Some(point!(x: 12.5, y: 41.9)));
    }

    #[test]
    fn polygon_representative_is_centroid() {
        let g = Geometry::Polygon(polygon![
            (x: 0.0, y: 0.0), (x: 2.0, y: 0.0), (x: 2.0, y: 2.0), (x: 0.0, y: 2.0), (x: 0.0, y: 0.0),
        ]);
        let c = g.representative_point().unwrap();
        assert!((c.x() - 1.0).abs() < 1e-12 && (c.y() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn degenerate_geometries_have_no_representative() {
        let bowtie = Geometry::Polygon(polygon![
            (x: 0.0, y: 0.0), (x: 2.0, y: 2.0), (x: 2.0, y: 0.0), (x: 0.0, y: 2.0), (x: 0.0, y: 0.0),
        ]);
        assert!(bowtie.representative_point().is_none());

        let zero_length = Geometry::LineString(line_string![(x: 1.0, y: 1.0), (x: 1.0, y: 1.0)]);
        assert!(zero_length.representative_point().is_none());

        let nan = Geometry::Point(point!(x: f64::NAN, y: 0.0));
        assert!(nan.representative_point().is_none());
    }

    #[test]
    fn geojson_conversion_keeps_rings() {
        let value = Value::Polygon(vec![
            vec![vec![0.0, 0.0], vec![1.0, 0.0], vec![1.0, 1.0], vec![0.0, 0.0]],
            vec![vec![0.2, 0.1], vec![0.8, 0.1], vec![0.8, 0.7], vec![0.2, 0.1]],
        ]);
        let g = Geometry::from_geojson(&value).unwrap();
        match &g {
            Geometry::Polygon(p) => assert_eq!(p.interiors().len(), 1),
            other => panic!("unexpected {}", other.kind()),
        }
        assert_eq!(g.to_geojson(), value);
    }

    #[test]
    fn geometry_collection_is_outside_the_union() {
        assert!(Geometry::from_geojson(&Value::GeometryCollection(vec![])).is_none());
        assert!(Geometry::from_geojson(&Value::Point(vec![1.0])).is_none());
    }
}
