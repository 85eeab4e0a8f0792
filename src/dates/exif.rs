//! EXIF capture dates for images

use super::{DateFact, DateFactSource, DateOrigin};
use crate::config::MediaKind;
use crate::error::{Error, Result};
use chrono::NaiveDateTime;
use exif::{In, Reader, Tag};
use std::fs::{File, Metadata};
use std::io::BufReader;
use std::path::Path;
use tracing::trace;

/// EXIF tags that carry a date, with the origin each one maps to
const DATE_TAGS: &[(Tag, DateOrigin)] = &[
    (Tag::DateTimeOriginal, DateOrigin::CaptureOriginal),
    (Tag::DateTime, DateOrigin::CaptureDateTime),
    (Tag::DateTimeDigitized, DateOrigin::CaptureDigitized),
];

/// Reads capture tags from the primary EXIF IFD
pub struct ExifSource;

impl DateFactSource for ExifSource {
    fn name(&self) -> &'static str {
        "exif"
    }

    fn applies_to(&self, kind: MediaKind) -> bool {
        kind == MediaKind::Image
    }

    fn collect(&self, path: &Path, _metadata: &Metadata) -> Result<Vec<DateFact>> {
        extract_exif_facts(path)
    }
}

/// Extract every parseable date tag from a file's EXIF block
pub fn extract_exif_facts(path: &Path) -> Result<Vec<DateFact>> {
    let file = File::open(path).map_err(|e| Error::from_io(path, e))?;
    let mut reader = BufReader::new(file);

    let exif = Reader::new()
        .read_from_container(&mut reader)
        .map_err(|e| Error::ExifRead {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

    let facts: Vec<DateFact> = DATE_TAGS
        .iter()
        .filter_map(|(tag, origin)| {
            let field = exif.get_field(*tag, In::PRIMARY)?;
            let datetime = parse_exif_datetime(&field.display_value().to_string())?;
            trace!(?path, ?tag, %datetime, "Found EXIF date");
            Some(DateFact::new(datetime, *origin))
        })
        .collect();

    Ok(facts)
}

/// Parse EXIF datetime strings: raw "YYYY:MM:DD HH:MM:SS" or the
/// dash-separated form the display formatter produces
fn parse_exif_datetime(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim().trim_matches('"');

    let formats = [
        "%Y:%m:%d %H:%M:%S",
        "%Y:%m:%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y/%m/%d %H:%M:%S",
    ];

    formats
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(s, format).ok())
}
