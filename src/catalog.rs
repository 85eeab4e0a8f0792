//! High-level catalog operations over one persisted index

use crate::config::{Config, TransferMode};
use crate::error::{Error, Result};
use crate::index::MediaIndex;
use crate::indexer::{IndexOptions, IndexProgress, IndexReport, MediaIndexer};
use crate::period::Period;
use crate::stats::IndexStats;
use crate::store::IndexStore;
use crate::transfer::{self, TransferOperation, TransferReport};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Result of transferring one period
#[derive(Debug, Clone)]
pub struct PeriodTransfer {
    pub period: Period,
    pub target_dir: PathBuf,
    /// Records in the period that were already transferred earlier
    pub already_transferred: usize,
    pub operations: Vec<TransferOperation>,
    pub report: TransferReport,
    /// Snapshot holding the updated transfer status, if one was written
    pub snapshot: Option<PathBuf>,
}

/// Entry point tying the indexer, the store and the transfer pipeline
/// together
pub struct Catalog {
    config: Config,
    store: IndexStore,
}

impl Catalog {
    /// `output_path` is the base path of the index snapshots
    pub fn new(config: Config, output_path: impl Into<PathBuf>) -> Self {
        Self {
            config,
            store: IndexStore::new(output_path),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &IndexStore {
        &self.store
    }

    /// Index (or resume indexing) `directory`
    pub fn index<F>(&self, directory: &Path, options: IndexOptions, on_progress: F) -> Result<IndexReport>
    where
        F: FnMut(IndexProgress),
    {
        MediaIndexer::new(self.config.clone())?.index(directory, self.store.base(), options, on_progress)
    }

    /// Latest complete index
    pub fn load(&self) -> Result<(PathBuf, MediaIndex)> {
        self.store.load_latest_index()?.ok_or_else(|| Error::NotFound {
            path: self.store.base().to_path_buf(),
        })
    }

    pub fn stats(&self) -> Result<IndexStats> {
        let (_, index) = self.load()?;
        Ok(IndexStats::from_index(&index))
    }

    /// Transfer every not-yet-transferred record of `period` into
    /// `target_root/YYYY-MM`, then persist the transfer status as a new
    /// snapshot
    pub fn transfer_period(
        &self,
        period: Period,
        target_root: &Path,
        mode: TransferMode,
        dry_run: bool,
    ) -> Result<PeriodTransfer> {
        if let Some(checkpoint) = self.store.load_checkpoint()? {
            warn!(
                processed = checkpoint.processed_files,
                total = checkpoint.total_files,
                "Refusing to transfer while an indexing run is suspended"
            );
            return Err(Error::ScanInProgress {
                path: self.store.checkpoint_path(),
            });
        }

        let (source, mut index) = self.load()?;
        let target_dir = target_root.join(period.to_string());

        let in_period = index.records_in_period(period);
        let already_transferred = in_period.iter().filter(|r| r.is_transferred).count();
        let candidates: Vec<_> = in_period.into_iter().filter(|r| !r.is_transferred).collect();
        info!(
            %period,
            candidates = candidates.len(),
            already_transferred,
            index = %source.display(),
            "Planning transfer"
        );

        let mut operations = transfer::plan_transfer(candidates, &target_dir, mode)?;
        if !dry_run && !operations.is_empty() {
            fs::create_dir_all(&target_dir).map_err(|e| Error::from_io(&target_dir, e))?;
        }
        let report = transfer::execute_transfer(&mut operations, dry_run);

        let snapshot = if !dry_run && report.completed > 0 {
            let updated = transfer::apply_completed(&mut index, &operations);
            let path = self.store.write_next_snapshot(&index)?;
            info!(updated, snapshot = %path.display(), "Recorded transfer status");
            Some(path)
        } else {
            None
        };

        Ok(PeriodTransfer {
            period,
            target_dir,
            already_transferred,
            operations,
            report,
            snapshot,
        })
    }
}
