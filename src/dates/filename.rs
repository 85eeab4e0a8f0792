//! Timestamps embedded in camera-style file names

use super::{DateFact, DateFactSource, DateOrigin};
use crate::config::MediaKind;
use crate::error::Result;
use chrono::NaiveDateTime;
use regex::Regex;
use std::fs::Metadata;
use std::path::Path;
use std::sync::OnceLock;
use tracing::trace;

/// Name patterns, tried in order; every pattern captures six groups
/// (year, month, day, hour, minute, second)
static PATTERNS: OnceLock<Vec<(&'static str, Regex)>> = OnceLock::new();

fn get_patterns() -> &'static Vec<(&'static str, Regex)> {
    PATTERNS.get_or_init(|| {
        vec![
            // IMG_20240115_143000, VID-20240115-143000, DJI_20240115143000
            (
                "camera",
                Regex::new(
                    r"(?:IMG|VID|DSC|MOV|MVI|DJI|PXL|GOPR)[-_]?(\d{4})(\d{2})(\d{2})[-_]?(\d{2})(\d{2})(\d{2})",
                )
                .unwrap(),
            ),
            // 20240115_143000, 20240115-143000
            (
                "compact",
                Regex::new(r"(?:^|\D)(\d{4})(\d{2})(\d{2})[_\-T](\d{2})(\d{2})(\d{2})(?:\D|$)").unwrap(),
            ),
            // Screenshot 2024-01-15 at 14.30.00
            (
                "screenshot",
                Regex::new(
                    r"(?i)(?:Screenshot|Screen Shot|Capture)[-_\s]*(\d{4})[-_]?(\d{2})[-_]?(\d{2})[-_\s]*(?:at[-_\s]*)?(\d{1,2})[-_.]?(\d{2})[-_.]?(\d{2})",
                )
                .unwrap(),
            ),
            // 2024-01-15_14-30-00, 2024.01.15 14.30.00
            (
                "separated",
                Regex::new(r"(\d{4})[-_.](\d{2})[-_.](\d{2})[-_\sT](\d{2})[-_.:](\d{2})[-_.:](\d{2})").unwrap(),
            ),
        ]
    })
}

/// Parses the file name for an embedded timestamp
pub struct FilenameSource;

impl DateFactSource for FilenameSource {
    fn name(&self) -> &'static str {
        "filename"
    }

    fn applies_to(&self, _kind: MediaKind) -> bool {
        true
    }

    fn collect(&self, path: &Path, _metadata: &Metadata) -> Result<Vec<DateFact>> {
        let facts = path
            .file_stem()
            .and_then(|s| s.to_str())
            .and_then(parse_filename_time)
            .map(|dt| DateFact::new(dt, DateOrigin::FilenamePattern))
            .into_iter()
            .collect();
        Ok(facts)
    }
}

/// Parse a timestamp from a file name (extension already stripped or not)
pub fn parse_filename_time(name: &str) -> Option<NaiveDateTime> {
    get_patterns().iter().find_map(|(label, pattern)| {
        let caps = pattern.captures(name)?;
        let dt = build_datetime(
            caps.get(1)?.as_str(),
            caps.get(2)?.as_str(),
            caps.get(3)?.as_str(),
            caps.get(4)?.as_str(),
            caps.get(5)?.as_str(),
            caps.get(6)?.as_str(),
        )?;
        trace!(name, pattern = label, "Matched filename pattern");
        Some(dt)
    })
}

fn build_datetime(
    year: &str,
    month: &str,
    day: &str,
    hour: &str,
    minute: &str,
    second: &str,
) -> Option<NaiveDateTime> {
    let year: i32 = year.parse().ok()?;
    let month: u32 = month.parse().ok()?;
    let day: u32 = day.parse().ok()?;
    let hour: u32 = hour.parse().ok()?;
    let minute: u32 = minute.parse().ok()?;
    let second: u32 = second.parse().ok()?;

    // Digit runs outside this window are serial numbers, not dates
    if !(1990..=2100).contains(&year) {
        return None;
    }

    chrono::NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, minute, second)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_compact_format() {
        let dt = parse_filename_time("20240115_143000").unwrap();
        assert_eq!(dt.year(), 2024);
        assert_eq!(dt.month(), 1);
        assert_eq!(dt.day(), 15);
        assert_eq!(dt.hour(), 14);
        assert_eq!(dt.minute(), 30);
        assert_eq!(dt.second(), 0);

        assert!(parse_filename_time("20240115-143000").is_some());
    }

    #[test]
    fn test_camera_format() {
        assert_eq!(parse_filename_time("IMG_20240115_143000").unwrap().year(), 2024);
        assert_eq!(parse_filename_time("VID_20231231_235959").unwrap().month(), 12);
        assert_eq!(parse_filename_time("PXL_20220704_101010123").unwrap().day(), 4);
    }

    #[test]
    fn test_separated_and_screenshot_formats() {
        let dt = parse_filename_time("2024-01-15_14-30-00").unwrap();
        assert_eq!(dt.hour(), 14);

        let dt = parse_filename_time("Screenshot 2023-06-02 at 09.05.07").unwrap();
        assert_eq!(dt.month(), 6);
        assert_eq!(dt.minute(), 5);
    }

    #[test]
    fn test_invalid_formats() {
        assert!(parse_filename_time("vacation").is_none());
        assert!(parse_filename_time("DSC01234").is_none());
        assert!(parse_filename_time("19800101_000000").is_none()); // Too old
        assert!(parse_filename_time("20241345_143000").is_none()); // No such day
    }

    #[test]
    fn test_source_uses_stem() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("IMG_20240115_143000.jpg");
        std::fs::write(&path, b"jpeg").unwrap();
        let metadata = std::fs::metadata(&path).unwrap();

        let facts = FilenameSource.collect(&path, &metadata).unwrap();
        assert_eq!(facts.len(), 1);
        assert_eq!(facts[0].source, DateOrigin::FilenamePattern);
        assert!(!facts[0].is_placeholder);
    }
}
