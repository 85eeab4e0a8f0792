//! Persistent data model: media records, the index, scan checkpoints and the
//! base path registry

use crate::dates::DateFact;
use crate::error::{Error, Result};
use crate::period::Period;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Catalogued facts about one media file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaRecord {
    /// Absolute source path, unique within an index
    pub file_path: PathBuf,
    pub file_name: String,
    /// Lower-cased extension without the dot
    pub extension: String,
    pub file_size: u64,
    /// Hex content digest
    pub hash: String,
    pub creation_date: NaiveDateTime,
    pub modification_date: NaiveDateTime,
    /// Date used for bucketing into a [`Period`]
    pub effective_date: NaiveDateTime,
    pub all_dates: Vec<DateFact>,
    pub is_transferred: bool,
    #[serde(default)]
    pub transferred_to: Option<PathBuf>,
}

impl MediaRecord {
    pub fn period(&self) -> Period {
        Period::of(&self.effective_date)
    }

    /// Whether only placeholder dates were found for this file
    pub fn has_only_placeholder_dates(&self) -> bool {
        !self.all_dates.is_empty() && self.all_dates.iter().all(|f| f.is_placeholder)
    }

    /// Whether the file on disk still looks like the one that was indexed
    pub fn matches_file(&self, size: u64, modified: NaiveDateTime) -> bool {
        self.file_size == size && self.modification_date == modified
    }
}

/// A full catalog of one directory tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaIndex {
    pub created_at: DateTime<Utc>,
    pub working_directory: PathBuf,
    pub version: u32,
    total_count: usize,
    pub supported_extensions: BTreeSet<String>,
    records: Vec<MediaRecord>,
}

impl MediaIndex {
    /// Current index format version
    pub const VERSION: u32 = 1;

    pub fn new(working_directory: PathBuf, supported_extensions: BTreeSet<String>) -> Self {
        Self {
            created_at: Utc::now(),
            working_directory,
            version: Self::VERSION,
            total_count: 0,
            supported_extensions,
            records: Vec::new(),
        }
    }

    pub fn records(&self) -> &[MediaRecord] {
        &self.records
    }

    pub fn total_count(&self) -> usize {
        self.total_count
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn find(&self, path: &Path) -> Option<&MediaRecord> {
        self.records.iter().find(|r| r.file_path == path)
    }

    /// Append records known not to be present yet
    pub fn extend_new(&mut self, records: impl IntoIterator<Item = MediaRecord>) {
        self.records.extend(records);
        self.total_count = self.records.len();
    }

    /// Keep only records whose path satisfies `keep`
    pub fn retain(&mut self, mut keep: impl FnMut(&MediaRecord) -> bool) {
        self.records.retain(|r| keep(r));
        self.total_count = self.records.len();
    }

    /// Canonical record order (by source path)
    pub fn sort_records(&mut self) {
        self.records.sort_by(|a, b| a.file_path.cmp(&b.file_path));
    }

    /// Records bucketed into `period`, in index order
    pub fn records_in_period(&self, period: Period) -> Vec<&MediaRecord> {
        self.records
            .iter()
            .filter(|r| period.contains(&r.effective_date))
            .collect()
    }

    /// Set `is_transferred`/`transferred_to` for each (source, destination)
    /// pair. Unknown sources are logged and skipped. Returns how many records
    /// were updated.
    pub fn mark_transferred<'a>(
        &mut self,
        updates: impl IntoIterator<Item = (&'a Path, &'a Path)>,
    ) -> usize {
        let positions: HashMap<PathBuf, usize> = self
            .records
            .iter()
            .enumerate()
            .map(|(i, r)| (r.file_path.clone(), i))
            .collect();

        let mut updated = 0;
        for (source, destination) in updates {
            match positions.get(source) {
                Some(&i) => {
                    let record = &mut self.records[i];
                    record.is_transferred = true;
                    record.transferred_to = Some(destination.to_path_buf());
                    updated += 1;
                }
                None => {
                    warn!(?source, "Transferred file has no record in the index");
                }
            }
        }
        updated
    }

    /// Structural checks applied after loading
    pub fn validate(&self, path: &Path) -> Result<()> {
        if self.version != Self::VERSION {
            return Err(Error::corrupt(
                path,
                format!(
                    "unsupported index version {} (expected {})",
                    self.version,
                    Self::VERSION
                ),
            ));
        }
        if self.total_count != self.records.len() {
            return Err(Error::corrupt(
                path,
                format!(
                    "totalCount {} does not match {} records",
                    self.total_count,
                    self.records.len()
                ),
            ));
        }
        let mut seen = HashSet::with_capacity(self.records.len());
        if let Some(dup) = self.records.iter().find(|r| !seen.insert(r.file_path.as_path())) {
            return Err(Error::corrupt(
                path,
                format!("duplicate record for {}", dup.file_path.display()),
            ));
        }
        Ok(())
    }
}

/// Progress of an interrupted or running scan
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanCheckpoint {
    pub working_directory: PathBuf,
    pub started_at: DateTime<Utc>,
    pub last_saved_at: DateTime<Utc>,
    pub total_files: usize,
    pub processed_files: usize,
    all_file_paths: Vec<PathBuf>,
    processed_file_paths: BTreeSet<PathBuf>,
    /// Snapshot file the scan is writing to
    pub current_output_file: PathBuf,
    /// Membership lookup over `all_file_paths`, rebuilt on demand
    #[serde(skip)]
    discoverable: HashSet<PathBuf>,
}

impl ScanCheckpoint {
    pub fn new(working_directory: PathBuf, all_file_paths: Vec<PathBuf>, output: PathBuf) -> Self {
        let now = Utc::now();
        Self {
            working_directory,
            started_at: now,
            last_saved_at: now,
            total_files: all_file_paths.len(),
            processed_files: 0,
            all_file_paths,
            processed_file_paths: BTreeSet::new(),
            current_output_file: output,
            discoverable: HashSet::new(),
        }
    }

    pub fn all_paths(&self) -> &[PathBuf] {
        &self.all_file_paths
    }

    pub fn is_processed(&self, path: &Path) -> bool {
        self.processed_file_paths.contains(path)
    }

    /// Mark a discoverable path processed; unknown paths are ignored
    pub fn mark_processed(&mut self, path: &Path) -> bool {
        if self.processed_file_paths.contains(path) {
            return false;
        }
        if self.discoverable.len() != self.all_file_paths.len() {
            self.discoverable = self.all_file_paths.iter().cloned().collect();
        }
        if !self.discoverable.contains(path) {
            return false;
        }
        self.processed_file_paths.insert(path.to_path_buf());
        self.processed_files = self.processed_file_paths.len();
        true
    }

    /// Discoverable paths not yet processed, in discovery order
    pub fn pending(&self) -> Vec<PathBuf> {
        self.all_file_paths
            .iter()
            .filter(|p| !self.processed_file_paths.contains(*p))
            .cloned()
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.processed_file_paths.len() == self.all_file_paths.len()
    }

    /// Swap in a fresh discoverable list, keeping processed marks for paths
    /// that are still discoverable plus any listed in `also_processed`
    pub fn rebase(&mut self, all_file_paths: Vec<PathBuf>, also_processed: &BTreeSet<PathBuf>) {
        let discoverable: BTreeSet<&PathBuf> = all_file_paths.iter().collect();
        let processed: BTreeSet<PathBuf> = self
            .processed_file_paths
            .iter()
            .chain(also_processed.iter())
            .filter(|p| discoverable.contains(p))
            .cloned()
            .collect();

        self.total_files = all_file_paths.len();
        self.all_file_paths = all_file_paths;
        self.discoverable.clear();
        self.processed_file_paths = processed;
        self.processed_files = self.processed_file_paths.len();
    }

    /// Structural checks applied after loading
    pub fn validate(&self, path: &Path) -> Result<()> {
        if self.total_files != self.all_file_paths.len() {
            return Err(Error::corrupt(
                path,
                format!(
                    "totalFiles {} does not match {} paths",
                    self.total_files,
                    self.all_file_paths.len()
                ),
            ));
        }
        let all: BTreeSet<&PathBuf> = self.all_file_paths.iter().collect();
        if let Some(stray) = self.processed_file_paths.iter().find(|p| !all.contains(p)) {
            return Err(Error::corrupt(
                path,
                format!("processed path {} is not discoverable", stray.display()),
            ));
        }
        Ok(())
    }
}

/// Cached result of walking a tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BasePathRegistry {
    pub created_at: DateTime<Utc>,
    pub working_directory: PathBuf,
    pub total_files: usize,
    pub file_paths: Vec<PathBuf>,
}

impl BasePathRegistry {
    pub fn new(working_directory: PathBuf, file_paths: Vec<PathBuf>) -> Self {
        Self {
            created_at: Utc::now(),
            working_directory,
            total_files: file_paths.len(),
            file_paths,
        }
    }

    pub fn validate(&self, path: &Path) -> Result<()> {
        if self.total_files != self.file_paths.len() {
            return Err(Error::corrupt(
                path,
                format!(
                    "totalFiles {} does not match {} paths",
                    self.total_files,
                    self.file_paths.len()
                ),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::dates::DateOrigin;
    use chrono::NaiveDate;

    pub(crate) fn sample_record(path: &str, size: u64, date: (i32, u32, u32)) -> MediaRecord {
        let when = NaiveDate::from_ymd_opt(date.0, date.1, date.2)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();
        let path = PathBuf::from(path);
        MediaRecord {
            file_name: path.file_name().unwrap().to_string_lossy().into_owned(),
            extension: path
                .extension()
                .map(|e| e.to_string_lossy().to_lowercase())
                .unwrap_or_default(),
            file_path: path,
            file_size: size,
            hash: format!("{:032x}", size),
            creation_date: when,
            modification_date: when,
            effective_date: when,
            all_dates: vec![DateFact::new(when, DateOrigin::FilesystemCreated)],
            is_transferred: false,
            transferred_to: None,
        }
    }

    #[test]
    fn test_extend_and_retain_keep_count_in_sync() {
        let mut index = MediaIndex::new(PathBuf::from("/photos"), BTreeSet::new());
        index.extend_new([
            sample_record("/photos/a.jpg", 10, (2023, 6, 1)),
            sample_record("/photos/b.jpg", 20, (2023, 6, 2)),
            sample_record("/photos/c.jpg", 30, (2023, 6, 3)),
        ]);
        assert_eq!(index.total_count(), 3);

        index.retain(|r| r.file_size != 20);
        assert_eq!(index.total_count(), 2);
        assert_eq!(index.find(Path::new("/photos/c.jpg")).unwrap().file_size, 30);
        assert!(index.validate(Path::new("index.json")).is_ok());
    }

    #[test]
    fn test_validate_rejects_duplicate_paths() {
        let mut index = MediaIndex::new(PathBuf::from("/photos"), BTreeSet::new());
        index.extend_new([
            sample_record("/photos/a.jpg", 10, (2023, 6, 1)),
            sample_record("/photos/b.jpg", 20, (2023, 6, 2)),
            sample_record("/photos/a.jpg", 10, (2023, 6, 1)),
        ]);

        let err = index.validate(Path::new("index.json")).unwrap_err();
        assert!(matches!(err, Error::CorruptData { .. }));
        assert!(err.to_string().contains("duplicate record"));
    }

    #[test]
    fn test_records_in_period() {
        let mut index = MediaIndex::new(PathBuf::from("/photos"), BTreeSet::new());
        index.extend_new([sample_record("/photos/a.jpg", 10, (2023, 6, 1))]);
        index.extend_new([sample_record("/photos/b.jpg", 20, (2023, 7, 2))]);
        index.extend_new([sample_record("/photos/c.jpg", 30, (2023, 6, 30))]);

        let june = index.records_in_period(Period::new(2023, 6).unwrap());
        let names: Vec<&str> = june.iter().map(|r| r.file_name.as_str()).collect();
        assert_eq!(names, vec!["a.jpg", "c.jpg"]);
    }

    #[test]
    fn test_mark_transferred_skips_unknown() {
        let mut index = MediaIndex::new(PathBuf::from("/photos"), BTreeSet::new());
        index.extend_new([sample_record("/photos/a.jpg", 10, (2023, 6, 1))]);

        let updated = index.mark_transferred([
            (Path::new("/photos/a.jpg"), Path::new("/sorted/2023-06/a.jpg")),
            (Path::new("/photos/ghost.jpg"), Path::new("/sorted/2023-06/ghost.jpg")),
        ]);

        assert_eq!(updated, 1);
        let record = index.find(Path::new("/photos/a.jpg")).unwrap();
        assert!(record.is_transferred);
        assert_eq!(
            record.transferred_to.as_deref(),
            Some(Path::new("/sorted/2023-06/a.jpg"))
        );
    }

    #[test]
    fn test_index_json_field_names() {
        let mut index = MediaIndex::new(PathBuf::from("/photos"), BTreeSet::from(["jpg".to_string()]));
        index.extend_new([sample_record("/photos/a.jpg", 10, (2023, 6, 1))]);

        let json: serde_json::Value = serde_json::to_value(&index).unwrap();
        for key in [
            "createdAt",
            "workingDirectory",
            "version",
            "totalCount",
            "supportedExtensions",
            "records",
        ] {
            assert!(json.get(key).is_some(), "missing {}", key);
        }
        let record = &json["records"][0];
        for key in [
            "filePath",
            "fileName",
            "extension",
            "fileSize",
            "hash",
            "creationDate",
            "modificationDate",
            "effectiveDate",
            "allDates",
            "isTransferred",
            "transferredTo",
        ] {
            assert!(record.get(key).is_some(), "missing record.{}", key);
        }
        assert_eq!(record["allDates"][0]["source"], "filesystem.created");
        assert_eq!(record["allDates"][0]["isPlaceholder"], false);
    }

    #[test]
    fn test_validate_rejects_count_mismatch() {
        let mut index = MediaIndex::new(PathBuf::from("/photos"), BTreeSet::new());
        index.extend_new([sample_record("/photos/a.jpg", 10, (2023, 6, 1))]);
        index.total_count = 5;
        let err = index.validate(Path::new("index.json")).unwrap_err();
        assert!(matches!(err, Error::CorruptData { .. }));
    }

    #[test]
    fn test_checkpoint_processed_subset() {
        let paths = vec![PathBuf::from("/p/a.jpg"), PathBuf::from("/p/b.jpg")];
        let mut checkpoint = ScanCheckpoint::new(PathBuf::from("/p"), paths, PathBuf::from("i_0001.json"));

        assert!(checkpoint.mark_processed(Path::new("/p/a.jpg")));
        assert!(!checkpoint.mark_processed(Path::new("/p/a.jpg")));
        assert!(!checkpoint.mark_processed(Path::new("/elsewhere/c.jpg")));

        assert_eq!(checkpoint.processed_files, 1);
        assert_eq!(checkpoint.pending(), vec![PathBuf::from("/p/b.jpg")]);
        assert!(!checkpoint.is_complete());
        assert!(checkpoint.validate(Path::new("cp.json")).is_ok());
    }

    #[test]
    fn test_checkpoint_rebase_preserves_processed() {
        let mut checkpoint = ScanCheckpoint::new(
            PathBuf::from("/p"),
            vec![PathBuf::from("/p/a.jpg"), PathBuf::from("/p/gone.jpg")],
            PathBuf::from("i_0001.json"),
        );
        checkpoint.mark_processed(Path::new("/p/a.jpg"));
        checkpoint.mark_processed(Path::new("/p/gone.jpg"));

        let indexed = BTreeSet::from([PathBuf::from("/p/b.heic")]);
        checkpoint.rebase(
            vec![
                PathBuf::from("/p/a.jpg"),
                PathBuf::from("/p/b.heic"),
                PathBuf::from("/p/c.heic"),
            ],
            &indexed,
        );

        assert_eq!(checkpoint.total_files, 3);
        assert_eq!(checkpoint.processed_files, 2);
        assert_eq!(checkpoint.pending(), vec![PathBuf::from("/p/c.heic")]);
        assert!(checkpoint.validate(Path::new("cp.json")).is_ok());
    }
}
