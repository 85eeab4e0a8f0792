use super::{TransferOperation, TransferStatus};
use crate::config::TransferMode;
use crate::error::{Error, Result};
use filetime::FileTime;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use tracing::{debug, info, warn};

const COPY_BUFFER_SIZE: usize = 256 * 1024;

/// Overall result of a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOutcome {
    /// Nothing to do
    Empty,
    /// Every operation completed
    Success,
    /// Some operations failed, some completed
    Partial,
    /// No operation completed
    Failed,
}

impl BatchOutcome {
    /// Classify a batch from its completed and failed counts
    pub fn from_counts(completed: usize, failed: usize) -> Self {
        match (completed, failed) {
            (0, 0) => BatchOutcome::Empty,
            (_, 0) => BatchOutcome::Success,
            (0, _) => BatchOutcome::Failed,
            _ => BatchOutcome::Partial,
        }
    }

    /// Process exit code for this outcome
    pub fn exit_code(self) -> i32 {
        match self {
            BatchOutcome::Empty | BatchOutcome::Success => 0,
            BatchOutcome::Partial => 2,
            BatchOutcome::Failed => 1,
        }
    }
}

/// Counts of an executed batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferReport {
    pub completed: usize,
    pub failed: usize,
    pub dry_run: bool,
}

impl TransferReport {
    pub fn total(&self) -> usize {
        self.completed + self.failed
    }

    pub fn outcome(&self) -> BatchOutcome {
        BatchOutcome::from_counts(self.completed, self.failed)
    }

    pub fn summary(&self) -> String {
        format!(
            "Total: {}, Completed: {}, Failed: {}{}",
            self.total(),
            self.completed,
            self.failed,
            if self.dry_run { " (dry run)" } else { "" }
        )
    }
}

/// Run `operations` in order, recording each one's status.
///
/// A failed operation never stops the batch. With `dry_run` every operation
/// is marked completed without touching the filesystem.
pub fn execute_transfer(operations: &mut [TransferOperation], dry_run: bool) -> TransferReport {
    let mut report = TransferReport {
        dry_run,
        ..TransferReport::default()
    };

    for op in operations.iter_mut() {
        op.status = TransferStatus::InProgress;

        if dry_run {
            info!(
                source = ?op.source,
                destination = ?op.destination,
                mode = ?op.mode,
                "[dry run] would transfer"
            );
            op.status = TransferStatus::Completed;
            report.completed += 1;
            continue;
        }

        match perform(op) {
            Ok(()) => {
                debug!(source = ?op.source, destination = ?op.destination, "Transferred");
                op.status = TransferStatus::Completed;
                report.completed += 1;
            }
            Err(e) => {
                warn!(source = ?op.source, destination = ?op.destination, error = %e, "Transfer failed");
                op.status = TransferStatus::Failed {
                    error: e.to_string(),
                };
                report.failed += 1;
            }
        }
    }

    info!(
        completed = report.completed,
        failed = report.failed,
        dry_run,
        "Transfer batch finished"
    );
    report
}

fn perform(op: &TransferOperation) -> Result<()> {
    let source = op.source.as_path();
    let dest = op.destination.as_path();

    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::from_io(parent, e))?;
    }

    let metadata = match fs::metadata(source) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(Error::FileMissing {
                path: source.to_path_buf(),
            });
        }
        Err(e) => return Err(Error::from_io(source, e)),
    };

    if !op.overwrite && dest.exists() {
        return Err(Error::DestinationExists {
            path: dest.to_path_buf(),
        });
    }

    match op.mode {
        TransferMode::Copy => {
            copy_file(source, dest)?;
        }
        TransferMode::Move => {
            // Try rename first (faster for same filesystem)
            if fs::rename(source, dest).is_err() {
                // Fall back to copy + delete for cross-filesystem moves
                copy_file(source, dest)?;
                fs::remove_file(source).map_err(|e| Error::from_io(source, e))?;
            }
        }
    }

    // Preserve modification time
    if let Ok(mtime) = metadata.modified() {
        let _ = filetime::set_file_mtime(dest, FileTime::from_system_time(mtime));
    }

    Ok(())
}

/// Copy file with buffered I/O into a temporary sibling of `dest`, renamed
/// over `dest` once every byte is on disk
fn copy_file(source: &Path, dest: &Path) -> Result<()> {
    let file_name = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| Error::Config(format!("not a file path: {}", dest.display())))?;
    let temp_path = dest.with_file_name(format!("{}.tmp", file_name));

    let result = copy_contents(source, &temp_path)
        .and_then(|()| fs::rename(&temp_path, dest).map_err(|e| Error::from_io(dest, e)));
    if result.is_err() {
        let _ = fs::remove_file(&temp_path);
    }
    result
}

fn copy_contents(source: &Path, dest: &Path) -> Result<()> {
    let src_file = File::open(source).map_err(|e| Error::from_io(source, e))?;
    let dest_file = File::create(dest).map_err(|e| Error::from_io(dest, e))?;

    let mut reader = BufReader::with_capacity(COPY_BUFFER_SIZE, src_file);
    let mut writer = BufWriter::with_capacity(COPY_BUFFER_SIZE, dest_file);

    let mut buffer = vec![0u8; COPY_BUFFER_SIZE];
    loop {
        let bytes_read = reader.read(&mut buffer).map_err(|e| Error::from_io(source, e))?;
        if bytes_read == 0 {
            break;
        }
        writer
            .write_all(&buffer[..bytes_read])
            .map_err(|e| Error::from_io(dest, e))?;
    }

    writer.flush().map_err(|e| Error::from_io(dest, e))?;
    writer
        .get_ref()
        .sync_all()
        .map_err(|e| Error::from_io(dest, e))?;
    Ok(())
}
