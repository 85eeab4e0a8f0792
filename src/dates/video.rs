//! Container creation/modification times from ISO-BMFF (MP4/MOV) headers

use super::{DateFact, DateFactSource, DateOrigin};
use crate::config::MediaKind;
use crate::error::{Error, Result};
use chrono::{Local, NaiveDate, NaiveDateTime, TimeDelta, TimeZone, Utc};
use std::fs::{File, Metadata};
use std::io::BufReader;
use std::path::Path;
use tracing::trace;

/// Reads the movie header (`mvhd`) timestamps
pub struct ContainerSource;

impl DateFactSource for ContainerSource {
    fn name(&self) -> &'static str {
        "container"
    }

    fn applies_to(&self, kind: MediaKind) -> bool {
        kind == MediaKind::Video
    }

    fn collect(&self, path: &Path, metadata: &Metadata) -> Result<Vec<DateFact>> {
        extract_container_facts(path, metadata.len())
    }
}

/// Extract creation and modification facts from the movie header
pub fn extract_container_facts(path: &Path, size: u64) -> Result<Vec<DateFact>> {
    let file = File::open(path).map_err(|e| Error::from_io(path, e))?;
    let reader = BufReader::new(file);

    let mp4 = mp4::Mp4Reader::read_header(reader, size).map_err(|e| Error::VideoMetadata {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let mvhd = &mp4.moov.mvhd;
    let facts: Vec<DateFact> = [
        (mvhd.creation_time, DateOrigin::ContainerCreation),
        (mvhd.modification_time, DateOrigin::ContainerModification),
    ]
    .into_iter()
    .filter_map(|(seconds, origin)| {
        let datetime = mp4_time_to_local(seconds)?;
        trace!(?path, ?origin, %datetime, "Found container date");
        Some(DateFact::new(datetime, origin))
    })
    .collect();

    if facts.is_empty() {
        return Err(Error::VideoMetadata {
            path: path.to_path_buf(),
            message: "Movie header carries no timestamps".to_string(),
        });
    }

    Ok(facts)
}

/// Convert seconds since 1904-01-01 UTC into local wall-clock time.
/// Zero means the muxer never set the field.
fn mp4_time_to_local(seconds: u64) -> Option<NaiveDateTime> {
    if seconds == 0 {
        return None;
    }

    let epoch = NaiveDate::from_ymd_opt(1904, 1, 1)?.and_hms_opt(0, 0, 0)?;
    let utc = epoch.checked_add_signed(TimeDelta::try_seconds(i64::try_from(seconds).ok()?)?)?;
    Some(Utc.from_utc_datetime(&utc).with_timezone(&Local).naive_local())
}
