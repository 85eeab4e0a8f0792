use super::TransferOperation;
use crate::config::TransferMode;
use crate::error::{Error, Result};
use crate::index::MediaRecord;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Plan the transfer of `records` into `target_dir`.
///
/// Records sharing a file name (compared case-insensitively) collapse to the
/// largest one; on equal size the first one wins. A candidate whose name is
/// already taken in `target_dir` is only planned when it is larger than the
/// existing file, in which case the operation overwrites that file.
/// Operations come out in the input order of the surviving records.
pub fn plan_transfer<'a>(
    records: impl IntoIterator<Item = &'a MediaRecord>,
    target_dir: &Path,
    mode: TransferMode,
) -> Result<Vec<TransferOperation>> {
    let winners = resolve_batch_collisions(records);
    let existing = existing_files(target_dir)?;

    let mut operations = Vec::with_capacity(winners.len());
    for record in winners {
        let key = record.file_name.to_lowercase();
        match existing.get(&key) {
            Some((path, size)) if *size >= record.file_size => {
                debug!(
                    source = ?record.file_path,
                    existing = ?path,
                    size = record.file_size,
                    existing_size = *size,
                    "Target already holds an equal or larger copy, skipping"
                );
            }
            Some((path, _)) => {
                let mut op = TransferOperation::new(record, path.clone(), mode);
                op.overwrite = true;
                operations.push(op);
            }
            None => {
                let destination = target_dir.join(&record.file_name);
                operations.push(TransferOperation::new(record, destination, mode));
            }
        }
    }

    Ok(operations)
}

/// One record per lowercase file name, in order of first appearance of the
/// surviving record
fn resolve_batch_collisions<'a>(
    records: impl IntoIterator<Item = &'a MediaRecord>,
) -> Vec<&'a MediaRecord> {
    let mut slots: HashMap<String, (usize, &'a MediaRecord)> = HashMap::new();

    for (position, record) in records.into_iter().enumerate() {
        let key = record.file_name.to_lowercase();
        match slots.get_mut(&key) {
            Some(slot) if record.file_size > slot.1.file_size => {
                debug!(
                    kept = ?record.file_path,
                    dropped = ?slot.1.file_path,
                    "Larger duplicate replaces earlier record"
                );
                *slot = (position, record);
            }
            Some(slot) => {
                debug!(
                    kept = ?slot.1.file_path,
                    dropped = ?record.file_path,
                    "Duplicate file name, keeping earlier record"
                );
            }
            None => {
                slots.insert(key, (position, record));
            }
        }
    }

    let mut winners: Vec<(usize, &'a MediaRecord)> = slots.into_values().collect();
    winners.sort_by_key(|(position, _)| *position);
    winners.into_iter().map(|(_, record)| record).collect()
}

/// Files already in the target directory, keyed by lowercase name
fn existing_files(target_dir: &Path) -> Result<HashMap<String, (PathBuf, u64)>> {
    let entries = match fs::read_dir(target_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(HashMap::new()),
        Err(e) => return Err(Error::from_io(target_dir, e)),
    };

    let mut existing = HashMap::new();
    for entry in entries {
        let entry = entry.map_err(|e| Error::from_io(target_dir, e))?;
        let metadata = entry.metadata().map_err(|e| Error::from_io(&entry.path(), e))?;
        if !metadata.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_lowercase();
        existing.insert(name, (entry.path(), metadata.len()));
    }
    Ok(existing)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::tests::sample_record;
    use tempfile::tempdir;

    fn names(operations: &[TransferOperation]) -> Vec<String> {
        operations
            .iter()
            .map(|op| op.source.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_larger_duplicate_wins() {
        let out = tempdir().unwrap();
        let records = [
            sample_record("/a/vacation.jpg", 1000, (2023, 6, 1)),
            sample_record("/b/vacation.jpg", 3000, (2023, 6, 2)),
        ];

        let ops = plan_transfer(&records, out.path(), TransferMode::Copy).unwrap();
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].source, PathBuf::from("/b/vacation.jpg"));
        assert_eq!(ops[0].file_size, 3000);
        assert_eq!(ops[0].destination, out.path().join("vacation.jpg"));
        assert!(!ops[0].overwrite);
    }

    #[test]
    fn test_equal_sizes_keep_first() {
        let out = tempdir().unwrap();
        let records = [
            sample_record("/a/IMG_1.jpg", 500, (2023, 6, 1)),
            sample_record("/b/img_1.JPG", 500, (2023, 6, 2)),
        ];

        let ops = plan_transfer(&records, out.path(), TransferMode::Move).unwrap();
        assert_eq!(names(&ops), vec!["/a/IMG_1.jpg"]);
        assert_eq!(ops[0].mode, TransferMode::Move);
    }

    #[test]
    fn test_output_follows_input_order() {
        let out = tempdir().unwrap();
        let records = [
            sample_record("/a/x.jpg", 10, (2023, 6, 1)),
            sample_record("/a/y.jpg", 10, (2023, 6, 1)),
            sample_record("/b/x.jpg", 20, (2023, 6, 1)),
            sample_record("/a/z.jpg", 10, (2023, 6, 1)),
        ];

        let ops = plan_transfer(&records, out.path(), TransferMode::Copy).unwrap();
        assert_eq!(names(&ops), vec!["/a/y.jpg", "/b/x.jpg", "/a/z.jpg"]);
    }

    #[test]
    fn test_existing_larger_target_skips() {
        let out = tempdir().unwrap();
        fs::write(out.path().join("photo.jpg"), vec![0u8; 5000]).unwrap();
        let records = [sample_record("/a/photo.jpg", 10, (2023, 6, 1))];

        let ops = plan_transfer(&records, out.path(), TransferMode::Copy).unwrap();
        assert!(ops.is_empty());
    }

    #[test]
    fn test_existing_equal_target_skips() {
        let out = tempdir().unwrap();
        fs::write(out.path().join("photo.jpg"), vec![0u8; 10]).unwrap();
        let records = [sample_record("/a/PHOTO.jpg", 10, (2023, 6, 1))];

        let ops = plan_transfer(&records, out.path(), TransferMode::Copy).unwrap();
        assert!(ops.is_empty());
    }

    #[test]
    fn test_existing_smaller_target_is_overwritten() {
        let out = tempdir().unwrap();
        fs::write(out.path().join("Photo.JPG"), vec![0u8; 10]).unwrap();
        let records = [sample_record("/a/photo.jpg", 5000, (2023, 6, 1))];

        let ops = plan_transfer(&records, out.path(), TransferMode::Copy).unwrap();
        assert_eq!(ops.len(), 1);
        assert!(ops[0].overwrite);
        assert_eq!(ops[0].destination, out.path().join("Photo.JPG"));
    }

    #[test]
    fn test_missing_target_dir_is_empty() {
        let out = tempdir().unwrap();
        let target = out.path().join("2023-06");
        let records = [sample_record("/a/photo.jpg", 10, (2023, 6, 1))];

        let ops = plan_transfer(&records, &target, TransferMode::Copy).unwrap();
        assert_eq!(ops[0].destination, target.join("photo.jpg"));
        assert!(!target.exists());
    }

    #[test]
    fn test_empty_batch() {
        let out = tempdir().unwrap();
        let none: [MediaRecord; 0] = [];
        let ops = plan_transfer(&none, out.path(), TransferMode::Copy).unwrap();
        assert!(ops.is_empty());
    }
}
