//! Tabular rows to point features: coordinate-column inference and spreadsheet date repair.

use chrono::DateTime;
use geo::Point;
use serde_json::Value;

use crate::feature::{Feature, FeatureCollection, Properties};

/// One attribute-only record from a spreadsheet, CSV or JSON array.
pub type Row = Properties;

/// Longitude-like column names, in priority order.
pub const X_KEYS: [&str; 5] = ["x", "lng", "longitude", "long", "lon"];

/// Latitude-like column names, in priority order.
pub const Y_KEYS: [&str; 3] = ["y", "lat", "latitude"];

/// Days between the spreadsheet serial epoch and the Unix epoch.
const SERIAL_EPOCH_OFFSET_DAYS: f64 = 25569.0;

const MS_PER_DAY: f64 = 86_400_000.0;

/// How a tabular batch resolved to geometry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TabularOutcome {
    /// The source had no rows.
    Empty,
    /// Rows exist but no longitude/latitude column pair was recognised.
    NoCoordinateColumns,
    /// Coordinates were read from `x_key`/`y_key`; `dropped` rows had unparseable values.
    Resolved { x_key: String, y_key: String, dropped: usize },
}

/// Find the longitude and latitude keys of a row, matching names case-insensitively
/// and honouring the priority order of [`X_KEYS`] and [`Y_KEYS`].
pub fn infer_coordinate_keys(row: &Row) -> Option<(String, String)> {
    let find = |candidates: &[&str]| candidates.iter()
        .find_map(|c| row.keys().find(|k| k.eq_ignore_ascii_case(c)).cloned());
    Some((find(&X_KEYS)?, find(&Y_KEYS)?))
}

/// Leading-decimal parse: whitespace is skipped and trailing garbage ignored,
/// so `"12.5 km"` reads as `12.5` and `"abc"` does not parse.
pub fn parse_float_prefix(text: &str) -> Option<f64> {
    let s = text.trim_start();
    let bytes = s.as_bytes();
    let digits_from = |mut i: usize| {
        while i < bytes.len() && bytes[i].is_ascii_digit() { i += 1 }
        i
    };

    let mut end = if matches!(bytes.first(), Some(b'+' | b'-')) { 1 } else { 0 };
    let int_end = digits_from(end);
    let mut mantissa_digits = int_end - end;
    end = int_end;

    if bytes.get(end) == Some(&b'.') {
        let frac_end = digits_from(end + 1);
        mantissa_digits += frac_end - (end + 1);
        if mantissa_digits > 0 { end = frac_end }
    }
    if mantissa_digits == 0 { return None }

    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let sign = usize::from(matches!(bytes.get(end + 1), Some(b'+' | b'-')));
        let exp_end = digits_from(end + 1 + sign);
        if exp_end > end + 1 + sign { end = exp_end }
    }

    s[..end].parse().ok()
}

/// Read a coordinate cell as a finite number.
pub fn coordinate_value(value: &Value) -> Option<f64> {
    let v = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_float_prefix(s),
        _ => None,
    }?;
    v.is_finite().then_some(v)
}

/// Map rows to point features, reporting how the batch was resolved.
pub fn normalize_with_outcome(rows: Vec<Row>) -> (FeatureCollection, TabularOutcome) {
    let Some(first) = rows.first() else { return (FeatureCollection::default(), TabularOutcome::Empty) };
    let Some((x_key, y_key)) = infer_coordinate_keys(first) else {
        tracing::warn!(columns = ?first.keys().collect::<Vec<_>>(), "no coordinate columns recognised");
        return (FeatureCollection::default(), TabularOutcome::NoCoordinateColumns);
    };

    let total = rows.len();
    let collection: FeatureCollection = rows.into_iter()
        .filter_map(|row| {
            let x = row.get(&x_key).and_then(coordinate_value)?;
            let y = row.get(&y_key).and_then(coordinate_value)?;
            Some(Feature::new(Point::new(x, y), row))
        })
        .collect();

    let dropped = total - collection.len();
    if dropped > 0 {
        tracing::warn!(dropped, %x_key, %y_key, "dropped rows with non-numeric coordinates");
    }
    (collection, TabularOutcome::Resolved { x_key, y_key, dropped })
}

/// Map rows to point features. Rows without recognisable coordinate columns yield
/// an empty collection rather than an error.
pub fn normalize(rows: Vec<Row>) -> FeatureCollection {
    normalize_with_outcome(rows).0
}

/// Convert a spreadsheet serial day number to a `YYYY-MM-DD` string (UTC).
pub fn serial_to_iso_date(serial: f64) -> Option<String> {
    let millis = ((serial - SERIAL_EPOCH_OFFSET_DAYS) * MS_PER_DAY).floor();
    let timestamp = DateTime::from_timestamp_millis(millis as i64)?;
    Some(timestamp.date_naive().format("%Y-%m-%d").to_string())
}

/// Rewrite serial-number dates in `*DEALDATE*` columns as ISO calendar dates.
/// Only numeric values strictly between 0 and 100000 are converted.
pub fn normalize_dates(rows: &mut [Row]) {
    for row in rows.iter_mut() {
        for (key, value) in row.iter_mut() {
            if !key.to_ascii_uppercase().contains("DEALDATE") { continue }
            let Some(serial) = value.as_f64() else { continue };
            if serial > 0.0 && serial < 100_000.0 {
                if let Some(date) = serial_to_iso_date(serial) {
                    *value = Value::String(date);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::Geometry;
    use serde_json::json;

    fn rows(value: Value) -> Vec<Row> {
        value.as_array().unwrap().iter().map(|v| v.as_object().unwrap().clone()).collect()
    }

    #[test]
    fn coordinates_follow_priority_not_column_order() {
        let row = rows(json!([{ "LAT": 1, "lon": 2, "X": 3, "Latitude": 4 }])).remove(0);
        assert_eq!(infer_coordinate_keys(&row), Some(("X".to_string(), "LAT".to_string())));
    }

    #[test]
    fn rows_become_points_carrying_all_keys() {
        let (collection, outcome) = normalize_with_outcome(rows(json!([
            { "name": "a", "Lng": "12.5", "Lat": 41.9 },
            { "name": "b", "Lng": "n/a", "Lat": 41.9 },
            { "name": "c", "Lng": " 13.25east", "Lat": "42" },
        ])));

        assert_eq!(collection.len(), 2);
        assert_eq!(outcome, TabularOutcome::Resolved { x_key: "Lng".into(), y_key: "Lat".into(), dropped: 1 });

        let first = &collection.features()[0];
        assert_eq!(first.geometry, Geometry::Point(Point::new(12.5, 41.9)));
        assert_eq!(first.properties["name"], json!("a"));
        assert_eq!(first.properties["Lng"], json!("12.5"));
        assert_eq!(collection.features()[1].geometry, Geometry::Point(Point::new(13.25, 42.0)));
    }

    #[test]
    fn missing_coordinate_columns_is_not_an_error() {
        let (collection, outcome) = normalize_with_outcome(rows(json!([{ "east": 1, "north": 2 }])));
        assert!(collection.is_empty());
        assert_eq!(outcome, TabularOutcome::NoCoordinateColumns);

        let (collection, outcome) = normalize_with_outcome(Vec::new());
        assert!(collection.is_empty());
        assert_eq!(outcome, TabularOutcome::Empty);
    }

    #[test]
    fn float_prefix_parsing() {
        assert_eq!(parse_float_prefix("  -7.5e2xyz"), Some(-750.0));
        assert_eq!(parse_float_prefix("5."), Some(5.0));
        assert_eq!(parse_float_prefix(".25"), Some(0.25));
        assert_eq!(parse_float_prefix("1e"), Some(1.0));
        assert_eq!(parse_float_prefix("-"), None);
        assert_eq!(parse_float_prefix("."), None);
        assert_eq!(parse_float_prefix("abc"), None);
        assert_eq!(coordinate_value(&json!(true)), None);
        assert_eq!(coordinate_value(&Value::Null), None);
    }

    #[test]
    fn serial_dates_are_converted_in_utc() {
        assert_eq!(serial_to_iso_date(25569.0).as_deref(), Some("1970-01-01"));
        assert_eq!(serial_to_iso_date(44927.0).as_deref(), Some("2023-01-01"));
        assert_eq!(serial_to_iso_date(44927.99).as_deref(), Some("2023-01-01"));
        assert_eq!(serial_to_iso_date(1.0).as_deref(), Some("1899-12-31"));
    }

    #[test]
    fn only_dealdate_columns_in_range_are_rewritten() {
        let mut data = rows(json!([{
            "DealDate": 44927,
            "last_dealdate_q": 44927.5,
            "DEALDATE_RAW": 150000,
            "dealdate_text": "44927",
            "other": 44927,
            "DEALDATE_ZERO": 0,
        }]));
        normalize_dates(&mut data);

        let row = &data[0];
        assert_eq!(row["DealDate"], json!("2023-01-01"));
        assert_eq!(row["last_dealdate_q"], json!("2023-01-01"));
        assert_eq!(row["DEALDATE_RAW"], json!(150000));
        assert_eq!(row["dealdate_text"], json!("44927"));
        assert_eq!(row["other"], json!(44927));
        assert_eq!(row["DEALDATE_ZERO"], json!(0));
    }
}
