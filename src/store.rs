//! Durable storage for indexes, scan checkpoints and the base path registry
//!
//! Given a base file such as `catalog/media_index.json`, the store owns:
//! - numbered snapshots `media_index_0001.json`, `media_index_0002.json`, ...
//! - the checkpoint `media_index.checkpoint.json`
//! - the base path registry `media_index.paths.json`
//!
//! Every document is written to a temporary sibling first and then renamed
//! over its destination, so readers never observe a half-written file.

use crate::error::{Error, Result};
use crate::index::{BasePathRegistry, MediaIndex, ScanCheckpoint};
use chrono::Utc;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Width of the zero-padded sequence number in snapshot names
const SEQUENCE_WIDTH: usize = 4;

/// Monotonically numbered snapshot files sharing a base name
#[derive(Debug, Clone)]
pub struct SnapshotSequence {
    dir: PathBuf,
    stem: String,
    extension: String,
}

impl SnapshotSequence {
    /// Derive the sequence from a base file path
    pub fn from_base(base: &Path) -> Self {
        let dir = match base.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let stem = base
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "media_index".to_string());
        let extension = base
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_else(|| "json".to_string());
        Self {
            dir,
            stem,
            extension,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Snapshot path for a sequence number
    pub fn path_for(&self, sequence: u32) -> PathBuf {
        self.dir.join(format!(
            "{}_{:0width$}.{}",
            self.stem,
            sequence,
            self.extension,
            width = SEQUENCE_WIDTH
        ))
    }

    /// Sequence number encoded in a file name belonging to this sequence
    pub fn parse(&self, file_name: &str) -> Option<u32> {
        let digits = file_name
            .strip_prefix(&self.stem)?
            .strip_prefix('_')?
            .strip_suffix(&self.extension)?
            .strip_suffix('.')?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.parse().ok()
    }

    /// Every existing snapshot, ascending by sequence number
    pub fn all(&self) -> Result<Vec<(u32, PathBuf)>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::from_io(&self.dir, e)),
        };

        let mut found: Vec<(u32, PathBuf)> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let name = entry.file_name();
                let sequence = self.parse(name.to_str()?)?;
                Some((sequence, entry.path()))
            })
            .collect();
        found.sort_by_key(|(sequence, _)| *sequence);
        Ok(found)
    }

    /// Highest numbered snapshot, if any
    pub fn latest(&self) -> Result<Option<(u32, PathBuf)>> {
        Ok(self.all()?.pop())
    }

    /// Path for the snapshot after the latest one
    pub fn next(&self) -> Result<PathBuf> {
        let next = match self.latest()? {
            Some((sequence, _)) => sequence + 1,
            None => 1,
        };
        Ok(self.path_for(next))
    }
}

/// Loads and persists catalog documents next to a base file
#[derive(Debug, Clone)]
pub struct IndexStore {
    base: PathBuf,
    snapshots: SnapshotSequence,
}

impl IndexStore {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        let base = base.into();
        let snapshots = SnapshotSequence::from_base(&base);
        Self { base, snapshots }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    pub fn snapshots(&self) -> &SnapshotSequence {
        &self.snapshots
    }

    pub fn checkpoint_path(&self) -> PathBuf {
        self.companion_path("checkpoint")
    }

    pub fn registry_path(&self) -> PathBuf {
        self.companion_path("paths")
    }

    fn companion_path(&self, kind: &str) -> PathBuf {
        self.snapshots.dir.join(format!(
            "{}.{}.{}",
            self.snapshots.stem, kind, self.snapshots.extension
        ))
    }

    /// Load and validate an index snapshot
    pub fn load_index(&self, path: &Path) -> Result<MediaIndex> {
        let index: MediaIndex = read_document(path)?;
        index.validate(path)?;
        debug!(?path, records = index.total_count(), "Loaded index snapshot");
        Ok(index)
    }

    /// Write an index snapshot to an explicit path
    pub fn save_index(&self, index: &MediaIndex, path: &Path) -> Result<()> {
        write_document(path, index)?;
        debug!(?path, records = index.total_count(), "Saved index snapshot");
        Ok(())
    }

    /// Persist an index as the next numbered snapshot
    pub fn write_next_snapshot(&self, index: &MediaIndex) -> Result<PathBuf> {
        let path = self.snapshots.next()?;
        self.save_index(index, &path)?;
        info!(snapshot = %path.display(), records = index.total_count(), "Wrote index snapshot");
        Ok(path)
    }

    /// Latest complete snapshot. A snapshot still being written by an
    /// unfinished scan is skipped.
    pub fn load_latest_index(&self) -> Result<Option<(PathBuf, MediaIndex)>> {
        let in_progress = self
            .load_checkpoint()?
            .map(|checkpoint| checkpoint.current_output_file);

        let latest = self
            .snapshots
            .all()?
            .into_iter()
            .rev()
            .find(|(_, path)| in_progress.as_deref() != Some(path.as_path()));

        match latest {
            Some((_, path)) => {
                let index = self.load_index(&path)?;
                Ok(Some((path, index)))
            }
            None => Ok(None),
        }
    }

    /// Load the scan checkpoint; `None` when no scan is in flight
    pub fn load_checkpoint(&self) -> Result<Option<ScanCheckpoint>> {
        let path = self.checkpoint_path();
        match read_document::<ScanCheckpoint>(&path) {
            Ok(checkpoint) => {
                checkpoint.validate(&path)?;
                Ok(Some(checkpoint))
            }
            Err(Error::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Persist the checkpoint, stamping its save time
    pub fn save_checkpoint(&self, checkpoint: &mut ScanCheckpoint) -> Result<()> {
        checkpoint.last_saved_at = Utc::now();
        write_document(&self.checkpoint_path(), checkpoint)?;
        debug!(
            processed = checkpoint.processed_files,
            total = checkpoint.total_files,
            "Saved scan checkpoint"
        );
        Ok(())
    }

    pub fn delete_checkpoint(&self) -> Result<()> {
        let path = self.checkpoint_path();
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::from_io(&path, e)),
        }
    }

    /// Load the base path registry; `None` when it was never written
    pub fn load_registry(&self) -> Result<Option<BasePathRegistry>> {
        let path = self.registry_path();
        match read_document::<BasePathRegistry>(&path) {
            Ok(registry) => {
                registry.validate(&path)?;
                Ok(Some(registry))
            }
            Err(Error::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn save_registry(&self, registry: &BasePathRegistry) -> Result<()> {
        write_document(&self.registry_path(), registry)
    }
}

/// Read a JSON document; missing file is `NotFound`, anything unparsable is
/// `CorruptData`
fn read_document<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path).map_err(|e| Error::from_io(path, e))?;
    let reader = BufReader::new(file);
    serde_json::from_reader(reader).map_err(|e| Error::corrupt(path, e.to_string()))
}

/// Write a JSON document through a temporary sibling and an atomic rename
fn write_document<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|e| Error::from_io(parent, e))?;
    }

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| Error::Config(format!("not a file path: {}", path.display())))?;
    let temp_path = path.with_file_name(format!("{}.tmp", file_name));

    let file = File::create(&temp_path).map_err(|e| Error::from_io(&temp_path, e))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.flush().map_err(|e| Error::from_io(&temp_path, e))?;
    writer
        .get_ref()
        .sync_all()
        .map_err(|e| Error::from_io(&temp_path, e))?;
    drop(writer);

    fs::rename(&temp_path, path).map_err(|e| Error::from_io(path, e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::tests::sample_record;
    use std::collections::BTreeSet;
    use tempfile::tempdir;

    fn sample_index() -> MediaIndex {
        let mut index = MediaIndex::new(
            PathBuf::from("/photos"),
            BTreeSet::from(["jpg".to_string(), "mp4".to_string()]),
        );
        index.extend_new([sample_record("/photos/b.jpg", 20, (2023, 6, 2))]);
        index.extend_new([sample_record("/photos/a.jpg", 10, (2023, 6, 1))]);
        index
    }

    #[test]
    fn test_sequence_naming() {
        let sequence = SnapshotSequence::from_base(Path::new("/data/media_index.json"));
        assert_eq!(sequence.path_for(7), PathBuf::from("/data/media_index_0007.json"));
        assert_eq!(sequence.parse("media_index_0007.json"), Some(7));
        assert_eq!(sequence.parse("media_index_12345.json"), Some(12345));
        assert_eq!(sequence.parse("media_index.json"), None);
        assert_eq!(sequence.parse("media_index.checkpoint.json"), None);
        assert_eq!(sequence.parse("media_index_0007.json.tmp"), None);
        assert_eq!(sequence.parse("other_0007.json"), None);
        assert_eq!(sequence.parse("media_index_00x7.json"), None);
    }

    #[test]
    fn test_latest_and_next() {
        let dir = tempdir().unwrap();
        let sequence = SnapshotSequence::from_base(&dir.path().join("media_index.json"));

        assert!(sequence.latest().unwrap().is_none());
        assert_eq!(sequence.next().unwrap(), dir.path().join("media_index_0001.json"));

        fs::write(dir.path().join("media_index_0002.json"), "{}").unwrap();
        fs::write(dir.path().join("media_index_0010.json"), "{}").unwrap();
        fs::write(dir.path().join("media_index_0009.json"), "{}").unwrap();
        fs::write(dir.path().join("unrelated_0099.json"), "{}").unwrap();

        let (latest, _) = sequence.latest().unwrap().unwrap();
        assert_eq!(latest, 10);
        assert_eq!(sequence.next().unwrap(), dir.path().join("media_index_0011.json"));
    }

    #[test]
    fn test_index_roundtrip_preserves_order() {
        let dir = tempdir().unwrap();
        let store = IndexStore::new(dir.path().join("media_index.json"));
        let index = sample_index();

        let path = store.write_next_snapshot(&index).unwrap();
        assert_eq!(path, dir.path().join("media_index_0001.json"));

        let loaded = store.load_index(&path).unwrap();
        assert_eq!(loaded, index);
        let names: Vec<&str> = loaded.records().iter().map(|r| r.file_name.as_str()).collect();
        assert_eq!(names, vec!["b.jpg", "a.jpg"]);
        assert!(!dir.path().join("media_index_0001.json.tmp").exists());
    }

    #[test]
    fn test_missing_index_is_not_found() {
        let dir = tempdir().unwrap();
        let store = IndexStore::new(dir.path().join("media_index.json"));
        let err = store.load_index(&dir.path().join("media_index_0001.json")).unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[test]
    fn test_corrupt_index_detected() {
        let dir = tempdir().unwrap();
        let store = IndexStore::new(dir.path().join("media_index.json"));

        let garbage = dir.path().join("media_index_0001.json");
        fs::write(&garbage, "{ not json").unwrap();
        assert!(matches!(
            store.load_index(&garbage).unwrap_err(),
            Error::CorruptData { .. }
        ));

        // Valid JSON, missing required fields
        let partial = dir.path().join("media_index_0002.json");
        fs::write(&partial, r#"{"createdAt": "2024-01-01T00:00:00Z", "version": 1}"#).unwrap();
        assert!(matches!(
            store.load_index(&partial).unwrap_err(),
            Error::CorruptData { .. }
        ));
    }

    #[test]
    fn test_checkpoint_lifecycle() {
        let dir = tempdir().unwrap();
        let store = IndexStore::new(dir.path().join("media_index.json"));
        assert!(store.load_checkpoint().unwrap().is_none());

        let mut checkpoint = ScanCheckpoint::new(
            PathBuf::from("/photos"),
            vec![PathBuf::from("/photos/a.jpg"), PathBuf::from("/photos/b.jpg")],
            store.snapshots().path_for(1),
        );
        checkpoint.mark_processed(Path::new("/photos/a.jpg"));
        store.save_checkpoint(&mut checkpoint).unwrap();
        assert!(store.checkpoint_path().ends_with("media_index.checkpoint.json"));

        let loaded = store.load_checkpoint().unwrap().unwrap();
        assert_eq!(loaded.processed_files, 1);
        assert!(loaded.is_processed(Path::new("/photos/a.jpg")));
        assert_eq!(loaded.pending(), vec![PathBuf::from("/photos/b.jpg")]);
        assert_eq!(loaded.current_output_file, checkpoint.current_output_file);

        store.delete_checkpoint().unwrap();
        assert!(store.load_checkpoint().unwrap().is_none());
        // Deleting twice is fine
        store.delete_checkpoint().unwrap();
    }

    #[test]
    fn test_corrupt_checkpoint_is_error() {
        let dir = tempdir().unwrap();
        let store = IndexStore::new(dir.path().join("media_index.json"));
        fs::write(
            store.checkpoint_path(),
            r#"{"workingDirectory": "/p", "startedAt": "2024-01-01T00:00:00Z",
                "lastSavedAt": "2024-01-01T00:00:00Z", "totalFiles": 1, "processedFiles": 1,
                "allFilePaths": ["/p/a.jpg"], "processedFilePaths": ["/p/zzz.jpg"],
                "currentOutputFile": "media_index_0001.json"}"#,
        )
        .unwrap();

        assert!(matches!(
            store.load_checkpoint().unwrap_err(),
            Error::CorruptData { .. }
        ));
    }

    #[test]
    fn test_latest_index_skips_in_progress_snapshot() {
        let dir = tempdir().unwrap();
        let store = IndexStore::new(dir.path().join("media_index.json"));

        let complete = store.write_next_snapshot(&sample_index()).unwrap();
        let partial_path = store.snapshots().next().unwrap();
        store
            .save_index(&MediaIndex::new(PathBuf::from("/photos"), BTreeSet::new()), &partial_path)
            .unwrap();
        let mut checkpoint = ScanCheckpoint::new(PathBuf::from("/photos"), vec![], partial_path);
        store.save_checkpoint(&mut checkpoint).unwrap();

        let (path, index) = store.load_latest_index().unwrap().unwrap();
        assert_eq!(path, complete);
        assert_eq!(index.total_count(), 2);
    }

    #[test]
    fn test_registry_roundtrip() {
        let dir = tempdir().unwrap();
        let store = IndexStore::new(dir.path().join("media_index.json"));
        assert!(store.load_registry().unwrap().is_none());

        let registry = BasePathRegistry::new(
            PathBuf::from("/photos"),
            vec![PathBuf::from("/photos/a.jpg")],
        );
        store.save_registry(&registry).unwrap();
        assert_eq!(store.load_registry().unwrap().unwrap(), registry);
        assert!(store.registry_path().ends_with("media_index.paths.json"));
    }
}
