//! Date fact collection
//!
//! Every file contributes a handful of dated facts, each tagged with where it
//! came from:
//! - file system creation and last-write times
//! - EXIF capture tags in images
//! - ISO-BMFF container headers in videos
//! - camera-style timestamps embedded in the file name
//!
//! Sources are independent and non-fatal. A source that cannot read a file
//! contributes nothing; [`select::select_effective_date`] then picks the one
//! date used for bucketing.

pub mod exif;
pub mod filename;
pub mod select;
pub mod video;

use crate::config::MediaKind;
use crate::error::{Error, Result};
use chrono::{DateTime, Datelike, Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fs::Metadata;
use std::path::Path;
use std::time::SystemTime;
use tracing::debug;

pub use select::select_effective_date;

/// Known sentinel dates written by devices that never had a clock set
const PLACEHOLDER_DATES: &[(i32, u32, u32)] = &[
    (1900, 1, 1),
    (1904, 1, 1), // QuickTime epoch
    (1970, 1, 1), // Unix epoch
    (1980, 1, 1), // FAT epoch
    (2000, 1, 1),
    (2001, 1, 1),
];

/// Origin tag of a date fact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DateOrigin {
    #[serde(rename = "filesystem.created")]
    FilesystemCreated,
    #[serde(rename = "filesystem.modified")]
    FilesystemModified,
    #[serde(rename = "capture.original")]
    CaptureOriginal,
    #[serde(rename = "capture.dateTime")]
    CaptureDateTime,
    #[serde(rename = "capture.digitized")]
    CaptureDigitized,
    #[serde(rename = "container.creation")]
    ContainerCreation,
    #[serde(rename = "container.modification")]
    ContainerModification,
    #[serde(rename = "filename.pattern")]
    FilenamePattern,
}

/// Coarse grouping used by the effective date rules
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateCategory {
    /// Embedded capture metadata (EXIF, container headers)
    Capture,
    /// File system timestamps
    Filesystem,
    /// Anything else
    Other,
}

impl DateOrigin {
    pub fn category(&self) -> DateCategory {
        match self {
            DateOrigin::CaptureOriginal
            | DateOrigin::CaptureDateTime
            | DateOrigin::CaptureDigitized
            | DateOrigin::ContainerCreation
            | DateOrigin::ContainerModification => DateCategory::Capture,
            DateOrigin::FilesystemCreated | DateOrigin::FilesystemModified => {
                DateCategory::Filesystem
            }
            DateOrigin::FilenamePattern => DateCategory::Other,
        }
    }
}

/// One timestamp candidate for a file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateFact {
    pub date: NaiveDateTime,
    pub source: DateOrigin,
    pub is_placeholder: bool,
}

impl DateFact {
    /// Build a fact, flagging known sentinel dates
    pub fn new(date: NaiveDateTime, source: DateOrigin) -> Self {
        Self {
            date,
            source,
            is_placeholder: is_placeholder_date(&date),
        }
    }
}

/// Whether the calendar date (time ignored) is a known sentinel
pub fn is_placeholder_date(date: &NaiveDateTime) -> bool {
    PLACEHOLDER_DATES
        .iter()
        .any(|&(y, m, d)| date.year() == y && date.month() == m && date.day() == d)
}

/// A capability that turns a file into zero or more date facts
pub trait DateFactSource: Send + Sync {
    /// Short name for logging
    fn name(&self) -> &'static str;

    /// Whether this source understands files of the given kind
    fn applies_to(&self, kind: MediaKind) -> bool;

    /// Extract facts; errors are reported but never fatal to the caller
    fn collect(&self, path: &Path, metadata: &Metadata) -> Result<Vec<DateFact>>;
}

/// File system creation and last-write times
pub struct FilesystemSource;

impl DateFactSource for FilesystemSource {
    fn name(&self) -> &'static str {
        "filesystem"
    }

    fn applies_to(&self, _kind: MediaKind) -> bool {
        true
    }

    fn collect(&self, path: &Path, metadata: &Metadata) -> Result<Vec<DateFact>> {
        let mut facts = Vec::with_capacity(2);

        // Not every platform/file system reports a birth time
        if let Ok(created) = metadata.created() {
            facts.push(DateFact::new(
                system_time_to_local(created),
                DateOrigin::FilesystemCreated,
            ));
        }

        let modified = metadata.modified().map_err(|e| Error::from_io(path, e))?;
        facts.push(DateFact::new(
            system_time_to_local(modified),
            DateOrigin::FilesystemModified,
        ));

        Ok(facts)
    }
}

/// Runs every applicable [`DateFactSource`] against a file
pub struct DateCollector {
    sources: Vec<Box<dyn DateFactSource>>,
}

impl Default for DateCollector {
    fn default() -> Self {
        Self::new(vec![
            Box::new(FilesystemSource),
            Box::new(exif::ExifSource),
            Box::new(video::ContainerSource),
            Box::new(filename::FilenameSource),
        ])
    }
}

impl DateCollector {
    pub fn new(sources: Vec<Box<dyn DateFactSource>>) -> Self {
        Self { sources }
    }

    /// Collect facts from every source that applies to `kind`
    pub fn collect(&self, path: &Path, metadata: &Metadata, kind: MediaKind) -> Vec<DateFact> {
        let mut facts = Vec::new();

        for source in self.sources.iter().filter(|s| s.applies_to(kind)) {
            match source.collect(path, metadata) {
                Ok(found) => facts.extend(found),
                Err(e) => {
                    debug!(?path, source = source.name(), error = %e, "Date source yielded nothing");
                }
            }
        }

        facts
    }
}

/// File system (creation, modification) times; creation falls back to
/// modification where the platform has no birth time
pub fn filesystem_times(path: &Path, metadata: &Metadata) -> Result<(NaiveDateTime, NaiveDateTime)> {
    let modified = metadata
        .modified()
        .map(system_time_to_local)
        .map_err(|e| Error::from_io(path, e))?;
    let created = metadata
        .created()
        .map(system_time_to_local)
        .unwrap_or(modified);
    Ok((created, modified))
}

/// Convert a system time into local wall-clock time
pub fn system_time_to_local(time: SystemTime) -> NaiveDateTime {
    let datetime: DateTime<Local> = time.into();
    datetime.naive_local()
}
