//! Reprojection of shapefile coordinates described by a `.prj` well-known-text.

use std::sync::LazyLock;

use geo::{Coord, CoordsIter, MapCoords};
use proj4rs::{proj::Proj as Proj4, transform::transform};
use regex::Regex;

use crate::feature::Geometry;

static PARAMETER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)PARAMETER\s*\[\s*"([^"]+)"\s*,\s*([-+0-9.eE]+)\s*\]"#).expect("valid regex")
});
static PROJECTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)PROJECTION\s*\[\s*"([^"]+)""#).expect("valid regex")
});
static SPHEROID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)(?:SPHEROID|ELLIPSOID)\s*\[\s*"[^"]*"\s*,\s*([0-9.eE+]+)\s*,\s*([0-9.eE+]+)"#).expect("valid regex")
});
static UNIT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)UNIT\s*\[\s*"[^"]*"\s*,\s*([0-9.eE+]+)"#).expect("valid regex")
});

const WGS84: &str = "+proj=longlat +datum=WGS84 +no_defs +type=crs";

/// A coordinate transform from a shapefile's native CRS to WGS84 lon/lat.
pub(crate) enum Reprojection {
    /// Geographic source; coordinates are already lon/lat degrees.
    Identity,
    Projected { from: Proj4, to: Proj4 },
}

impl Reprojection {
    /// Build from `.prj` text.
    pub(crate) fn from_wkt(wkt: &str) -> Result<Self, String> {
        let wkt = wkt.trim();
        if wkt.is_empty() || !wkt.to_ascii_uppercase().starts_with("PROJCS") {
            return Ok(Self::Identity);
        }

        let proj_string = wkt_to_proj4(wkt)?;
        tracing::debug!(%proj_string, "reprojecting shapefile to WGS84");
        let from = Proj4::from_proj_string(&proj_string)
            .map_err(|e| format!("failed to build PROJ.4 '{proj_string}': {e:?}"))?;
        let to = Proj4::from_proj_string(WGS84)
            .map_err(|e| format!("failed to build PROJ.4 '{WGS84}': {e:?}"))?;
        Ok(Self::Projected { from, to })
    }

    /// Transform a geometry to lon/lat degrees. Returns `None` if any coordinate
    /// fails to transform.
    pub(crate) fn apply(&self, geometry: Geometry) -> Option<Geometry> {
        let Self::Projected { from, to } = self else { return Some(geometry) };

        let projected = geometry.to_geo().map_coords(|coord: Coord<f64>| {
            let mut point = (coord.x, coord.y, 0.0);
            match transform(from, to, &mut point) {
                Ok(()) => Coord { x: point.0.to_degrees(), y: point.1.to_degrees() },
                Err(_) => Coord { x: f64::NAN, y: f64::NAN },
            }
        });
        if !projected.coords_iter().all(|c| c.x.is_finite() && c.y.is_finite()) { return None }
        Geometry::from_geo(projected)
    }
}

/// Look up a named PARAMETER, matching case-insensitively.
fn parameter(params: &[(String, f64)], names: &[&str]) -> Option<f64> {
    params.iter()
        .find(|(name, _)| names.iter().any(|n| name.eq_ignore_ascii_case(n)))
        .map(|(_, value)| *value)
}

/// Translate a projected WKT descriptor into a PROJ.4 string.
fn wkt_to_proj4(wkt: &str) -> Result<String, String> {
    let projection = PROJECTION.captures(wkt)
        .map(|c| c[1].to_ascii_lowercase())
        .ok_or_else(|| "projection descriptor has no PROJECTION".to_string())?;

    let params: Vec<(String, f64)> = PARAMETER.captures_iter(wkt)
        .filter_map(|c| c[2].parse().ok().map(|v| (c[1].to_string(), v)))
        .collect();

    let lat_0 = parameter(&params, &["latitude_of_origin", "latitude_of_center", "latitude_of_natural_origin"]).unwrap_or(0.0);
    let lon_0 = parameter(&params, &["central_meridian", "longitude_of_center", "longitude_of_origin", "longitude_of_natural_origin"]).unwrap_or(0.0);
    let k_0 = parameter(&params, &["scale_factor", "scale_factor_at_natural_origin"]).unwrap_or(1.0);
    let x_0 = parameter(&params, &["false_easting"]).unwrap_or(0.0);
    let y_0 = parameter(&params, &["false_northing"]).unwrap_or(0.0);
    let lat_1 = parameter(&params, &["standard_parallel_1"]);
    let lat_2 = parameter(&params, &["standard_parallel_2"]);

    let mut parts = match projection.as_str() {
        "transverse_mercator" | "gauss_kruger" => vec![
            "+proj=tmerc".to_string(),
            format!("+lat_0={lat_0}"), format!("+lon_0={lon_0}"), format!("+k_0={k_0}"),
        ],
        "lambert_conformal_conic" | "lambert_conformal_conic_2sp" => vec![
            "+proj=lcc".to_string(),
            format!("+lat_1={}", lat_1.unwrap_or(lat_0)), format!("+lat_2={}", lat_2.or(lat_1).unwrap_or(lat_0)),
            format!("+lat_0={lat_0}"), format!("+lon_0={lon_0}"),
        ],
        "lambert_conformal_conic_1sp" => vec![
            "+proj=lcc".to_string(),
            format!("+lat_1={lat_0}"), format!("+lat_0={lat_0}"), format!("+lon_0={lon_0}"), format!("+k_0={k_0}"),
        ],
        "mercator" | "mercator_1sp" | "mercator_2sp" => {
            let mut parts = vec!["+proj=merc".to_string(), format!("+lon_0={lon_0}")];
            match lat_1 {
                Some(lat_ts) => parts.push(format!("+lat_ts={lat_ts}")),
                None => parts.push(format!("+k_0={k_0}")),
            }
            parts
        }
        "mercator_auxiliary_sphere" | "popular_visualisation_pseudo_mercator" => {
            return Ok(format!(
                "+proj=merc +a=6378137 +b=6378137 +lat_ts=0 +lon_0={lon_0} +x_0={x_0} +y_0={y_0} +k=1 +units=m +no_defs +type=crs"
            ));
        }
        "albers" | "albers_conic_equal_area" => vec![
            "+proj=aea".to_string(),
            format!("+lat_1={}", lat_1.unwrap_or(lat_0)), format!("+lat_2={}", lat_2.or(lat_1).unwrap_or(lat_0)),
            format!("+lat_0={lat_0}"), format!("+lon_0={lon_0}"),
        ],
        "lambert_azimuthal_equal_area" => vec![
            "+proj=laea".to_string(), format!("+lat_0={lat_0}"), format!("+lon_0={lon_0}"),
        ],
        "oblique_stereographic" | "double_stereographic" => vec![
            "+proj=sterea".to_string(), format!("+lat_0={lat_0}"), format!("+lon_0={lon_0}"), format!("+k_0={k_0}"),
        ],
        "polar_stereographic" | "stereographic" => vec![
            "+proj=stere".to_string(), format!("+lat_0={lat_0}"), format!("+lon_0={lon_0}"), format!("+k_0={k_0}"),
        ],
        other => return Err(format!("unsupported projection '{other}'")),
    };

    parts.push(format!("+x_0={x_0}"));
    parts.push(format!("+y_0={y_0}"));

    match SPHEROID.captures(wkt).and_then(|c| Some((c[1].parse::<f64>().ok()?, c[2].parse::<f64>().ok()?))) {
        Some((a, rf)) if rf > 0.0 => parts.push(format!("+a={a} +rf={rf}")),
        Some((a, _)) => parts.push(format!("+a={a} +b={a}")),
        None => parts.push("+ellps=WGS84".to_string()),
    }

    // The last UNIT in a PROJCS is the linear unit; earlier ones belong to GEOGCS.
    let to_meter = UNIT.captures_iter(wkt).last()
        .and_then(|c| c[1].parse::<f64>().ok())
        .unwrap_or(1.0);
    parts.push(format!("+to_meter={to_meter}"));
    parts.push("+no_defs +type=crs".to_string());

    Ok(parts.join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::point;

    const UTM_33N: &str = r#"PROJCS["WGS_1984_UTM_Zone_33N",GEOGCS["GCS_WGS_1984",DATUM["D_WGS_1984",SPHEROID["WGS_1984",6378137.0,298.257223563]],PRIMEM["Greenwich",0.0],UNIT["Degree",0.0174532925199433]],PROJECTION["Transverse_Mercator"],PARAMETER["False_Easting",500000.0],PARAMETER["False_Northing",0.0],PARAMETER["Central_Meridian",15.0],PARAMETER["Scale_Factor",0.9996],PARAMETER["Latitude_Of_Origin",0.0],UNIT["Meter",1.0]]"#;

    #[test]
    fn geographic_descriptor_is_identity() {
        let wkt = r#"GEOGCS["GCS_WGS_1984",DATUM["D_WGS_1984",SPHEROID["WGS_1984",6378137.0,298.257223563]],PRIMEM["Greenwich",0.0],UNIT["Degree",0.0174532925199433]]"#;
        assert!(matches!(Reprojection::from_wkt(wkt), Ok(Reprojection::Identity)));
        assert!(matches!(Reprojection::from_wkt(""), Ok(Reprojection::Identity)));
    }

    #[test]
    fn utm_wkt_translates_to_tmerc() {
        let proj = wkt_to_proj4(UTM_33N).unwrap();
        assert!(proj.starts_with("+proj=tmerc"));
        assert!(proj.contains("+lon_0=15"));
        assert!(proj.contains("+k_0=0.9996"));
        assert!(proj.contains("+x_0=500000"));
        assert!(proj.contains("+to_meter=1"));
    }

    #[test]
    fn utm_central_meridian_maps_back_to_lon_lat() {
        let reprojection = Reprojection::from_wkt(UTM_33N).unwrap();
        // On the central meridian, easting equals the false easting.
        let out = reprojection.apply(Geometry::Point(point!(x: 500000.0, y: 4_649_776.0))).unwrap();
        let Geometry::Point(p) = out else { panic!("expected point") };
        assert!((p.x() - 15.0).abs() < 1e-6, "lon was {}", p.x());
        assert!((p.y() - 42.0).abs() < 0.01, "lat was {}", p.y());
    }

    #[test]
    fn unknown_projection_is_rejected() {
        let wkt = r#"PROJCS["x",GEOGCS["g"],PROJECTION["Hotine_Oblique_Mercator_Two_Point_Natural_Origin"]]"#;
        let err = Reprojection::from_wkt(wkt).err().unwrap();
        assert!(err.contains("hotine_oblique_mercator_two_point_natural_origin"));
    }
}
