//! Zip container handling: trailing-garbage repair and member selection.

use std::io::{Cursor, Read};

use zip::ZipArchive;

use crate::{Error, Result};

/// End-of-central-directory signature, little-endian `PK\x05\x06`.
const EOCD_SIGNATURE: [u8; 4] = [0x50, 0x4B, 0x05, 0x06];

/// Fixed EOCD record size, excluding the trailing comment.
const EOCD_LEN: usize = 22;

/// Largest distance from the end of the buffer at which an EOCD can start.
const EOCD_SEARCH_WINDOW: usize = EOCD_LEN + u16::MAX as usize;

/// Strip bytes trailing the end-of-central-directory record.
///
/// Scans backward for the EOCD signature; the first record whose declared comment
/// fits inside the buffer marks the true end of the archive. Buffers without a
/// usable EOCD are returned unchanged.
pub fn repair(bytes: &[u8]) -> &[u8] {
    if bytes.len() < EOCD_LEN { return bytes }

    let lowest = bytes.len().saturating_sub(EOCD_SEARCH_WINDOW);
    for start in (lowest..=bytes.len() - 4).rev() {
        if bytes[start..start + 4] != EOCD_SIGNATURE { continue }
        let Some(len_bytes) = bytes.get(start + 20..start + 22) else { continue };

        let comment_len = u16::from_le_bytes([len_bytes[0], len_bytes[1]]) as usize;
        let expected_end = start + EOCD_LEN + comment_len;
        if expected_end <= bytes.len() {
            if expected_end < bytes.len() {
                tracing::debug!(trailing = bytes.len() - expected_end, "trimmed bytes after EOCD");
            }
            return &bytes[..expected_end];
        }
    }

    tracing::debug!("no EOCD signature found, archive left unchanged");
    bytes
}

/// Repair and open an in-memory archive.
pub(crate) fn open<'a>(file: &str, bytes: &'a [u8]) -> Result<ZipArchive<Cursor<&'a [u8]>>> {
    ZipArchive::new(Cursor::new(repair(bytes)))
        .map_err(|e| Error::CorruptArchive { file: file.to_string(), reason: e.to_string() })
}

/// The content chosen from an archive, in decoding priority order.
#[derive(Debug)]
pub(crate) enum Member {
    Shapefile { name: String, shp: Vec<u8>, dbf: Vec<u8>, prj: Option<String> },
    Kml { name: String, bytes: Vec<u8> },
    Spreadsheet { name: String, bytes: Vec<u8> },
    Csv { name: String, bytes: Vec<u8> },
}

/// Lower-cased extension and the lower-cased path without it.
fn split_name(name: &str) -> Option<(String, String)> {
    let lower = name.to_ascii_lowercase();
    let (stem, ext) = lower.rsplit_once('.')?;
    Some((stem.to_string(), ext.to_string()))
}

fn read_member(archive: &mut ZipArchive<Cursor<&[u8]>>, file: &str, name: &str) -> Result<Vec<u8>> {
    let corrupt = |e: &dyn std::fmt::Display| Error::CorruptArchive {
        file: file.to_string(),
        reason: format!("{name}: {e}"),
    };
    let mut entry = archive.by_name(name).map_err(|e| corrupt(&e))?;
    let mut bytes = Vec::with_capacity(entry.size() as usize);
    entry.read_to_end(&mut bytes).map_err(|e| corrupt(&e))?;
    Ok(bytes)
}

/// Select the member to decode: shapefile triple > KML > spreadsheet > CSV.
pub(crate) fn select_member(file: &str, archive: &mut ZipArchive<Cursor<&[u8]>>) -> Result<Member> {
    let names: Vec<String> = archive.file_names()
        .filter(|name| !name.ends_with('/') && !name.starts_with("__MACOSX/"))
        .map(str::to_string)
        .collect();

    let find = |stem: &str, ext: &str| names.iter()
        .find(|n| split_name(n).is_some_and(|(s, e)| s == stem && e == ext))
        .cloned();
    let first_with = |exts: &[&str]| names.iter()
        .find(|n| split_name(n).is_some_and(|(_, e)| exts.contains(&e.as_str())))
        .cloned();

    let triple = names.iter()
        .filter_map(|n| split_name(n).filter(|(_, e)| e == "shp").map(|(stem, _)| (n, stem)))
        .find_map(|(shp, stem)| find(&stem, "dbf").map(|dbf| (shp.clone(), dbf, find(&stem, "prj"))));

    if let Some((shp, dbf, prj)) = triple {
        tracing::debug!(%shp, %dbf, prj = prj.as_deref().unwrap_or("-"), "selected shapefile triple");
        let prj = match prj {
            Some(name) => Some(String::from_utf8_lossy(&read_member(archive, file, &name)?).into_owned()),
            None => None,
        };
        return Ok(Member::Shapefile {
            shp: read_member(archive, file, &shp)?,
            dbf: read_member(archive, file, &dbf)?,
            name: shp,
            prj,
        });
    }

    if let Some(name) = first_with(&["kml"]) {
        tracing::debug!(%name, "selected KML member");
        return Ok(Member::Kml { bytes: read_member(archive, file, &name)?, name });
    }
    if let Some(name) = first_with(&["xlsx", "xls"]) {
        tracing::debug!(%name, "selected spreadsheet member");
        return Ok(Member::Spreadsheet { bytes: read_member(archive, file, &name)?, name });
    }
    if let Some(name) = first_with(&["csv"]) {
        tracing::debug!(%name, "selected CSV member");
        return Ok(Member::Csv { bytes: read_member(archive, file, &name)?, name });
    }

    Err(Error::EmptyArchive { file: file.to_string() })
}

#[cfg(test)]
pub(crate) mod tests {
    use std::io::Write;

    use zip::{write::SimpleFileOptions, ZipWriter};

    use super::*;

    /// Build an in-memory zip from `(name, contents)` pairs.
    pub(crate) fn build_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, contents) in entries {
            writer.start_file(*name, SimpleFileOptions::default()).unwrap();
            writer.write_all(contents).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn repair_is_noop_on_valid_archive() {
        let bytes = build_zip(&[("a.csv", b"x,y\n1,2\n")]);
        assert_eq!(repair(&bytes), &bytes[..]);
    }

    #[test]
    fn repair_strips_exactly_the_trailing_garbage() {
        let valid = build_zip(&[("a.csv", b"x,y\n1,2\n")]);
        for n in [1usize, 7, 300] {
            let mut dirty = valid.clone();
            dirty.extend(std::iter::repeat_n(0xAB, n));

            let repaired = repair(&dirty);
            assert_eq!(dirty.len() - repaired.len(), n);
            assert!(ZipArchive::new(Cursor::new(repaired)).is_ok());
        }
    }

    #[test]
    fn repair_keeps_declared_comment() {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        writer.set_comment("exported by a desktop GIS");
        writer.start_file("a.csv", SimpleFileOptions::default()).unwrap();
        writer.write_all(b"x,y\n").unwrap();
        let valid = writer.finish().unwrap().into_inner();

        let mut dirty = valid.clone();
        dirty.extend_from_slice(b"garbage");
        assert_eq!(repair(&dirty), &valid[..]);
    }

    #[test]
    fn repair_without_signature_returns_input() {
        let bytes = vec![0u8; 100];
        assert_eq!(repair(&bytes), &bytes[..]);
        assert_eq!(repair(b"PK"), b"PK");
    }

    #[test]
    fn corrupt_archive_is_reported_by_name() {
        let err = open("broken.zip", b"definitely not a zip archive").unwrap_err();
        assert!(matches!(err, Error::CorruptArchive { ref file, .. } if file == "broken.zip"));
    }

    #[test]
    fn shapefile_triple_outranks_other_members() {
        let bytes = build_zip(&[
            ("points.csv", b"x,y\n"),
            ("doc.kml", b"<kml/>"),
            ("Data/Roads.SHP", b"shp"),
            ("data/roads.dbf", b"dbf"),
            ("data/roads.prj", b"GEOGCS[\"WGS 84\"]"),
        ]);
        let mut archive = open("a.zip", &bytes).unwrap();
        match select_member("a.zip", &mut archive).unwrap() {
            Member::Shapefile { shp, dbf, prj, .. } => {
                assert_eq!(shp, b"shp");
                assert_eq!(dbf, b"dbf");
                assert_eq!(prj.as_deref(), Some("GEOGCS[\"WGS 84\"]"));
            }
            other => panic!("unexpected member {other:?}"),
        }
    }

    #[test]
    fn lone_shp_falls_through_to_kml_then_sheet_then_csv() {
        let bytes = build_zip(&[("a.shp", b"shp"), ("a.csv", b"x,y\n"), ("b.xlsx", b"xlsx"), ("c.kml", b"<kml/>")]);
        let mut archive = open("a.zip", &bytes).unwrap();
        assert!(matches!(select_member("a.zip", &mut archive).unwrap(), Member::Kml { .. }));

        let bytes = build_zip(&[("a.csv", b"x,y\n"), ("b.XLS", b"xls")]);
        let mut archive = open("a.zip", &bytes).unwrap();
        assert!(matches!(select_member("a.zip", &mut archive).unwrap(), Member::Spreadsheet { .. }));

        let bytes = build_zip(&[("readme.txt", b"hi")]);
        let mut archive = open("a.zip", &bytes).unwrap();
        assert!(matches!(select_member("a.zip", &mut archive), Err(Error::EmptyArchive { .. })));
    }
}
