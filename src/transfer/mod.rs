//! Period transfers: plan which files go where, then execute the plan
//!
//! Planning resolves name collisions up front so each period directory ends
//! up with one file per (case-insensitive) name, the largest copy seen.
//! Execution never aborts on a single failed operation; the outcome of the
//! whole batch is summarized in a [`TransferReport`].

mod execute;
mod plan;

pub use execute::{BatchOutcome, TransferReport, execute_transfer};
pub use plan::plan_transfer;

use crate::config::TransferMode;
use crate::error::Result;
use crate::index::{MediaIndex, MediaRecord};
use std::path::{Path, PathBuf};

/// Lifecycle of a single operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferStatus {
    Pending,
    InProgress,
    Completed,
    Failed { error: String },
}

/// One planned file transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferOperation {
    pub source: PathBuf,
    pub file_size: u64,
    pub destination: PathBuf,
    pub mode: TransferMode,
    /// Replace an existing, smaller file at `destination`
    pub overwrite: bool,
    pub status: TransferStatus,
}

impl TransferOperation {
    pub fn new(record: &MediaRecord, destination: PathBuf, mode: TransferMode) -> Self {
        Self {
            source: record.file_path.clone(),
            file_size: record.file_size,
            destination,
            mode,
            overwrite: false,
            status: TransferStatus::Pending,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == TransferStatus::Completed
    }

    /// Failure message, if the operation failed
    pub fn error(&self) -> Option<&str> {
        match &self.status {
            TransferStatus::Failed { error } => Some(error),
            _ => None,
        }
    }
}

/// Plan and execute in one call
pub fn transfer_records<'a>(
    records: impl IntoIterator<Item = &'a MediaRecord>,
    target_dir: &Path,
    mode: TransferMode,
    dry_run: bool,
) -> Result<(Vec<TransferOperation>, TransferReport)> {
    let mut operations = plan_transfer(records, target_dir, mode)?;
    let report = execute_transfer(&mut operations, dry_run);
    Ok((operations, report))
}

/// Record completed operations on the index. Returns how many records were
/// updated.
pub fn apply_completed(index: &mut MediaIndex, operations: &[TransferOperation]) -> usize {
    index.mark_transferred(
        operations
            .iter()
            .filter(|op| op.is_completed())
            .map(|op| (op.source.as_path(), op.destination.as_path())),
    )
}
