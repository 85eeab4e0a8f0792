//! Effective date selection
//!
//! Capture metadata is trusted over file system clocks: copied or restored
//! files often carry file system dates that are wrong by years, while EXIF
//! and container headers travel with the content.

use super::{DateCategory, DateFact};
use chrono::{NaiveDateTime, TimeDelta};

/// Maximum lead of the oldest capture date over the oldest file system date
/// before the file system dates are discarded
const MAX_CAPTURE_LEAD_DAYS: i64 = 365;

/// Pick the single date used for bucketing a file.
///
/// - Placeholder facts only count when nothing else is available; then the
///   earliest placeholder wins, and an empty list yields `fallback`.
/// - When both capture and file system facts exist and the earliest capture
///   date is more than a year after the earliest file system date, the file
///   system facts are ignored.
/// - Otherwise the earliest valid fact wins.
pub fn select_effective_date(facts: &[DateFact], fallback: NaiveDateTime) -> NaiveDateTime {
    let (valid, placeholders): (Vec<&DateFact>, Vec<&DateFact>) =
        facts.iter().partition(|f| !f.is_placeholder);

    if valid.is_empty() {
        return placeholders
            .iter()
            .map(|f| f.date)
            .min()
            .unwrap_or(fallback);
    }

    let earliest_in = |category: DateCategory| {
        valid
            .iter()
            .filter(|f| f.source.category() == category)
            .map(|f| f.date)
            .min()
    };

    if let (Some(best_capture), Some(oldest_filesystem)) = (
        earliest_in(DateCategory::Capture),
        earliest_in(DateCategory::Filesystem),
    ) && best_capture - oldest_filesystem > TimeDelta::days(MAX_CAPTURE_LEAD_DAYS)
    {
        return valid
            .iter()
            .filter(|f| f.source.category() != DateCategory::Filesystem)
            .map(|f| f.date)
            .min()
            .unwrap_or(best_capture);
    }

    valid.iter().map(|f| f.date).min().unwrap_or(fallback)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dates::DateOrigin;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn fact(y: i32, m: u32, d: u32, source: DateOrigin) -> DateFact {
        DateFact::new(date(y, m, d), source)
    }

    #[test]
    fn test_capture_date_beats_newer_filesystem_date() {
        let facts = vec![
            fact(2025, 9, 10, DateOrigin::FilesystemCreated),
            fact(2006, 4, 27, DateOrigin::CaptureOriginal),
            fact(2001, 1, 1, DateOrigin::CaptureDateTime),
        ];
        assert!(facts[2].is_placeholder);

        let selected = select_effective_date(&facts, date(2030, 1, 1));
        assert_eq!(selected, date(2006, 4, 27));
    }

    #[test]
    fn test_placeholder_only_returns_earliest() {
        let facts = vec![
            fact(2001, 1, 1, DateOrigin::CaptureOriginal),
            fact(1970, 1, 1, DateOrigin::FilesystemModified),
        ];
        let selected = select_effective_date(&facts, date(2030, 1, 1));
        assert_eq!(selected, date(1970, 1, 1));
    }

    #[test]
    fn test_empty_uses_fallback() {
        let fallback = date(2019, 3, 14);
        assert_eq!(select_effective_date(&[], fallback), fallback);
    }

    #[test]
    fn test_old_filesystem_date_is_discarded() {
        // File system clock far behind the camera: trust the camera
        let facts = vec![
            fact(2003, 5, 1, DateOrigin::FilesystemModified),
            fact(2018, 8, 20, DateOrigin::CaptureOriginal),
            fact(2018, 8, 21, DateOrigin::CaptureDigitized),
        ];
        let selected = select_effective_date(&facts, date(2030, 1, 1));
        assert_eq!(selected, date(2018, 8, 20));
    }

    #[test]
    fn test_other_sources_survive_filesystem_exclusion() {
        let facts = vec![
            fact(2003, 5, 1, DateOrigin::FilesystemCreated),
            fact(2018, 8, 20, DateOrigin::ContainerCreation),
            fact(2018, 8, 19, DateOrigin::FilenamePattern),
        ];
        let selected = select_effective_date(&facts, date(2030, 1, 1));
        assert_eq!(selected, date(2018, 8, 19));
    }

    #[test]
    fn test_close_filesystem_date_can_win() {
        // Within a year: plain earliest-wins
        let facts = vec![
            fact(2018, 2, 1, DateOrigin::FilesystemModified),
            fact(2018, 8, 20, DateOrigin::CaptureOriginal),
        ];
        let selected = select_effective_date(&facts, date(2030, 1, 1));
        assert_eq!(selected, date(2018, 2, 1));
    }

    #[test]
    fn test_filesystem_only() {
        let facts = vec![
            fact(2021, 6, 2, DateOrigin::FilesystemModified),
            fact(2021, 6, 1, DateOrigin::FilesystemCreated),
        ];
        let selected = select_effective_date(&facts, date(2030, 1, 1));
        assert_eq!(selected, date(2021, 6, 1));
    }
}
