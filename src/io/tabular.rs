//! Attribute-only row readers: CSV, spreadsheets and JSON arrays.

use std::io::Cursor;

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use polars::{
    frame::DataFrame,
    io::SerReader,
    prelude::{AnyValue, CsvReadOptions},
};
use serde_json::{json, Value};

use crate::{normalize::Row, Error, Result};

/// Type one CSV field: finite numbers become JSON numbers, everything else stays text.
/// Integers keep integer form; zero-padded codes such as `007` stay text.
fn typed_cell(text: &str) -> Value {
    let trimmed = text.trim();
    if let Ok(i) = trimmed.parse::<i64>() {
        return if i.to_string() == trimmed { json!(i) } else { Value::String(text.to_string()) };
    }
    match trimmed.parse::<f64>() {
        Ok(f) if f.is_finite() => json!(f),
        _ => Value::String(text.to_string()),
    }
}

/// Flatten a string-typed DataFrame into rows keyed by column name, in column order.
fn dataframe_rows(file: &str, df: &DataFrame) -> Result<Vec<Row>> {
    let columns = df.get_columns();
    (0..df.height())
        .map(|idx| {
            columns.iter()
                .map(|col| {
                    let value = match col.get(idx)
                        .map_err(|e| Error::Tabular { file: file.to_string(), reason: e.to_string() })?
                    {
                        AnyValue::Null => Value::Null,
                        AnyValue::String(s) => typed_cell(s),
                        AnyValue::StringOwned(s) => typed_cell(s.as_str()),
                        other => typed_cell(&other.to_string()),
                    };
                    Ok((col.name().to_string(), value))
                })
                .collect::<Result<Row>>()
        })
        .collect()
}

/// Read CSV bytes (header row required). Columns are read as text and typed per cell,
/// so one odd value never fails the batch or retypes its column.
pub(crate) fn read_csv_rows(file: &str, bytes: &[u8]) -> Result<Vec<Row>> {
    if bytes.iter().all(u8::is_ascii_whitespace) { return Ok(Vec::new()) }

    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .into_reader_with_file_handle(Cursor::new(bytes))
        .finish()
        .map_err(|e| Error::Tabular { file: file.to_string(), reason: e.to_string() })?;
    dataframe_rows(file, &df)
}

/// Header names for a spreadsheet's first row; blank headers get `__EMPTY`, `__EMPTY_1`, ...
fn header_names(cells: &[Data]) -> Vec<String> {
    let mut blanks = 0;
    cells.iter()
        .map(|cell| match cell {
            Data::Empty => {
                let name = if blanks == 0 { "__EMPTY".to_string() } else { format!("__EMPTY_{blanks}") };
                blanks += 1;
                name
            }
            Data::String(s) => s.trim().to_string(),
            other => other.to_string(),
        })
        .collect()
}

/// Convert a spreadsheet cell. Empty cells have no value; dates become serial numbers.
fn cell_to_json(cell: &Data) -> Option<Value> {
    match cell {
        Data::Empty => None,
        Data::Int(v) => Some(json!(v)),
        Data::Float(v) => Some(json!(v)),
        Data::Bool(v) => Some(json!(v)),
        Data::String(s) => Some(json!(s)),
        Data::DateTime(dt) => Some(json!(dt.as_f64())),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Some(json!(s)),
        Data::Error(e) => Some(json!(e.to_string())),
    }
}

/// Read the first sheet of an `.xlsx`/`.xls` workbook; the first row is the header.
/// Empty cells are omitted from their row, and blank rows are skipped.
pub(crate) fn read_spreadsheet_rows(file: &str, bytes: &[u8]) -> Result<Vec<Row>> {
    let err = |reason: String| Error::Spreadsheet { file: file.to_string(), reason };

    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| err(e.to_string()))?;
    let range = match workbook.worksheet_range_at(0) {
        Some(range) => range.map_err(|e| err(e.to_string()))?,
        None => return Ok(Vec::new()),
    };

    let mut rows = range.rows();
    let Some(header) = rows.next() else { return Ok(Vec::new()) };
    let header = header_names(header);

    Ok(rows
        .map(|cells| {
            header.iter().zip(cells)
                .filter_map(|(name, cell)| cell_to_json(cell).map(|v| (name.clone(), v)))
                .collect::<Row>()
        })
        .filter(|row| !row.is_empty())
        .collect())
}

/// Rows from a JSON array of objects; non-object elements are skipped.
pub(crate) fn json_rows(value: Value) -> Vec<Row> {
    match value {
        Value::Array(items) => items.into_iter()
            .filter_map(|item| match item {
                Value::Object(map) => Some(map),
                _ => None,
            })
            .collect(),
        Value::Object(map) => vec![map],
        _ => Vec::new(),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    const SPREADSHEET_NS: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";

    /// Cell style 1 carries the built-in date format.
    const STYLES: &str = r#"<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><cellXfs count="2"><xf numFmtId="0"/><xf numFmtId="14"/></cellXfs></styleSheet>"#;

    /// A minimal `.xlsx`: one worksheet per `(name, sheetData rows)` entry, in order.
    pub(crate) fn build_xlsx(sheets: &[(&str, &str)]) -> Vec<u8> {
        let mut workbook = format!(
            r#"<workbook xmlns="{SPREADSHEET_NS}" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets>"#
        );
        let mut rels = String::from(r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#);
        let mut parts = Vec::new();
        for (i, (name, rows)) in sheets.iter().enumerate() {
            let n = i + 1;
            workbook.push_str(&format!(r#"<sheet name="{name}" sheetId="{n}" r:id="rId{n}"/>"#));
            rels.push_str(&format!(r#"<Relationship Id="rId{n}" Target="worksheets/sheet{n}.xml"/>"#));
            parts.push((
                format!("xl/worksheets/sheet{n}.xml"),
                format!(r#"<worksheet xmlns="{SPREADSHEET_NS}"><sheetData>{rows}</sheetData></worksheet>"#),
            ));
        }
        workbook.push_str("</sheets></workbook>");
        rels.push_str("</Relationships>");
        parts.push(("xl/workbook.xml".to_string(), workbook));
        parts.push(("xl/_rels/workbook.xml.rels".to_string(), rels));
        parts.push(("xl/styles.xml".to_string(), STYLES.to_string()));

        let entries: Vec<(&str, &[u8])> = parts.iter().map(|(n, c)| (n.as_str(), c.as_bytes())).collect();
        crate::io::archive::tests::build_zip(&entries)
    }

    /// Deals sheet: a blank header at E1, a date-formatted DEALDATE, one bad longitude.
    pub(crate) fn deals_workbook() -> Vec<u8> {
        let text = |r: &str, t: &str| format!(r#"<c r="{r}" t="inlineStr"><is><t>{t}</t></is></c>"#);
        let num = |r: &str, v: &str| format!(r#"<c r="{r}"><v>{v}</v></c>"#);
        let deals = [
            format!(r#"<row r="1">{}{}{}{}{}</row>"#, text("A1", "name"), text("B1", "lon"), text("C1", "lat"), text("D1", "DEALDATE"), text("F1", "note")),
            format!(r#"<row r="2">{}{}{}<c r="D2" s="1"><v>44927</v></c>{}{}</row>"#,
                text("A2", "Termini"), num("B2", "12.5019"), num("C2", "41.9010"), text("E2", "kiosk"), text("F2", "ok")),
            format!(r#"<row r="3">{}{}{}</row>"#, text("A3", "Ghost"), text("B3", "n/a"), num("C3", "41.9")),
        ].concat();
        let other = format!(r#"<row r="1">{}{}</row><row r="2">{}{}</row>"#, text("A1", "x"), text("B1", "y"), num("A2", "0"), num("B2", "0"));
        build_xlsx(&[("Deals", deals.as_str()), ("Other", other.as_str())])
    }

    #[test]
    fn first_sheet_rows_with_header_names() {
        let rows = read_spreadsheet_rows("deals.xlsx", &deals_workbook()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].keys().cloned().collect::<Vec<_>>(), vec!["name", "lon", "lat", "DEALDATE", "__EMPTY", "note"]);
        assert_eq!(rows[0]["name"], json!("Termini"));
        assert_eq!(rows[0]["lat"], json!(41.901));
        // Date-formatted cells come back as their serial number.
        assert_eq!(rows[0]["DEALDATE"], json!(44927.0));
        assert_eq!(rows[0]["__EMPTY"], json!("kiosk"));
        assert_eq!(rows[1]["lon"], json!("n/a"));
        assert!(!rows[1].contains_key("DEALDATE"));
    }

    #[test]
    fn csv_keeps_column_order_and_numeric_types() {
        let rows = read_csv_rows("stops.csv", b"name,lon,lat\nTermini,12.5019,41.9010\nFlaminio,12.4761,41.9110\n").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].keys().cloned().collect::<Vec<_>>(), vec!["name", "lon", "lat"]);
        assert_eq!(rows[0]["name"], json!("Termini"));
        assert_eq!(rows[1]["lat"], json!(41.911));
    }

    #[test]
    fn late_bad_cell_drops_only_its_row() {
        let mut csv = String::from("name,lon,lat\n");
        for i in 0..150 { csv.push_str(&format!("p{i},12.{i},41.9\n")) }
        csv.push_str("bad,n/a,41.9\n");

        let rows = read_csv_rows("late.csv", csv.as_bytes()).unwrap();
        assert_eq!(rows.len(), 151);
        assert_eq!(rows[150]["lon"], json!("n/a"));
        assert_eq!(crate::normalize::normalize(rows).len(), 150);
    }

    #[test]
    fn late_float_after_integer_rows() {
        let mut csv = String::from("x,y\n");
        for _ in 0..150 { csv.push_str("12,41\n") }
        csv.push_str("12.5,41.5\n");

        let rows = read_csv_rows("mixed.csv", csv.as_bytes()).unwrap();
        assert_eq!(rows.len(), 151);
        assert_eq!(rows[0]["x"], json!(12));
        assert_eq!(rows[150]["x"], json!(12.5));
    }

    #[test]
    fn serial_dates_convert_per_cell() {
        let mut rows = read_csv_rows("deals.csv", b"lon,lat,DEALDATE\n12.5,41.9,44927\n12.6,42.0,unknown\n").unwrap();
        crate::normalize::normalize_dates(&mut rows);
        assert_eq!(rows[0]["DEALDATE"], json!("2023-01-01"));
        assert_eq!(rows[1]["DEALDATE"], json!("unknown"));
    }

    #[test]
    fn cells_are_typed_individually() {
        assert_eq!(typed_cell("150000"), json!(150000));
        assert_eq!(typed_cell(" 41.9 "), json!(41.9));
        assert_eq!(typed_cell("007"), json!("007"));
        assert_eq!(typed_cell("NaN"), json!("NaN"));
        assert_eq!(typed_cell("Termini"), json!("Termini"));
    }

    #[test]
    fn blank_csv_has_no_rows() {
        assert!(read_csv_rows("empty.csv", b"  \n").unwrap().is_empty());
    }

    #[test]
    fn blank_headers_are_named_like_sheet_exports() {
        let names = header_names(&[Data::String("id".into()), Data::Empty, Data::Empty, Data::Float(2.0)]);
        assert_eq!(names, vec!["id", "__EMPTY", "__EMPTY_1", "2"]);
    }

    #[test]
    fn garbage_workbook_is_a_spreadsheet_error() {
        let err = read_spreadsheet_rows("book.xlsx", b"not a workbook").unwrap_err();
        assert!(matches!(err, Error::Spreadsheet { .. }));
    }

    #[test]
    fn json_arrays_skip_non_objects() {
        let rows = json_rows(json!([{ "x": 1 }, 5, "s", { "y": 2 }]));
        assert_eq!(rows.len(), 2);
        assert_eq!(json_rows(json!({ "x": 1 })).len(), 1);
        assert!(json_rows(json!(3)).is_empty());
    }
}
