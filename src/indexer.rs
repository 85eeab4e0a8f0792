//! Resumable media indexing
//!
//! Drives enumeration, hashing and date collection for a directory tree:
//!
//! 1. Initializing: resume a leftover checkpoint or start a fresh scan,
//!    carrying over unchanged records from the latest complete snapshot
//! 2. Scanning: process pending paths in parallel chunks (Rayon); per-file
//!    failures are logged and the path is marked processed
//! 3. Checkpointing: every `checkpoint_interval` files, write the partial
//!    index and then the checkpoint
//! 4. Finalizing: write the complete snapshot and drop the checkpoint

use crate::config::Config;
use crate::dates::{DateCollector, filesystem_times, select_effective_date};
use crate::error::{Error, Result};
use crate::hash::compute_file_hash;
use crate::index::{BasePathRegistry, MediaIndex, MediaRecord, ScanCheckpoint};
use crate::scan::FileEnumerator;
use crate::store::IndexStore;
use crate::transfer::BatchOutcome;
use rayon::prelude::*;
use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{Level, debug, info, span, warn};

/// Upper bound on files hashed in parallel between two state updates
const PARALLEL_CHUNK: usize = 256;

/// Indexer state machine phases
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexPhase {
    Initializing,
    Scanning,
    Checkpointing,
    Finalizing,
    /// Scan stopped early by a file limit; the checkpoint is kept
    Suspended,
    Done,
}

/// Snapshot of indexing progress handed to the caller's callback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexProgress {
    pub phase: IndexPhase,
    pub processed: usize,
    pub total: usize,
}

/// Per-run indexing options
#[derive(Debug, Clone, Copy, Default)]
pub struct IndexOptions {
    /// Re-walk the tree instead of trusting the base path registry, keeping
    /// what was already processed
    pub update_base: bool,
    /// Stop after processing this many files, leaving the checkpoint behind
    pub file_limit: Option<usize>,
}

/// Outcome of one indexing run
#[derive(Debug, Clone)]
pub struct IndexReport {
    /// `Done` or `Suspended`
    pub phase: IndexPhase,
    /// Snapshot file written by this run
    pub snapshot: PathBuf,
    /// Discoverable paths in the tree
    pub discovered: usize,
    /// Files processed during this run
    pub processed: usize,
    /// Records carried over from the previous snapshot
    pub reused: usize,
    /// Files that could not be indexed
    pub failed: usize,
    pub index: MediaIndex,
}

impl IndexReport {
    pub fn is_complete(&self) -> bool {
        self.phase == IndexPhase::Done
    }

    /// Files indexed versus files that failed during this run
    pub fn outcome(&self) -> BatchOutcome {
        BatchOutcome::from_counts(self.processed.saturating_sub(self.failed), self.failed)
    }
}

/// Builds and maintains the media index for a directory tree
pub struct MediaIndexer {
    config: Config,
    collector: DateCollector,
}

impl MediaIndexer {
    /// Create an indexer with the standard date sources
    pub fn new(config: Config) -> Result<Self> {
        Self::with_collector(config, DateCollector::default())
    }

    pub fn with_collector(config: Config, collector: DateCollector) -> Result<Self> {
        config.validate()?;

        // Configure Rayon thread pool
        if config.threads > 0 {
            rayon::ThreadPoolBuilder::new()
                .num_threads(config.threads)
                .build_global()
                .ok(); // Ignore if already initialized
        }

        Ok(Self { config, collector })
    }

    /// Index `directory`, persisting snapshots next to `output_path`
    pub fn index<F>(
        &self,
        directory: &Path,
        output_path: &Path,
        options: IndexOptions,
        mut on_progress: F,
    ) -> Result<IndexReport>
    where
        F: FnMut(IndexProgress),
    {
        let _span = span!(Level::INFO, "index", ?directory).entered();

        let store = IndexStore::new(output_path);
        let enumerator = FileEnumerator::new(directory, self.config.supported_extensions())?;

        on_progress(IndexProgress {
            phase: IndexPhase::Initializing,
            processed: 0,
            total: 0,
        });
        let (mut checkpoint, mut index, reused) = self.initialize(&store, &enumerator, options)?;
        self.save_progress(&store, &index, &mut checkpoint)?;

        let total = checkpoint.total_files;
        let pending = checkpoint.pending();
        info!(
            total,
            pending = pending.len(),
            reused,
            snapshot = %checkpoint.current_output_file.display(),
            "Scanning media files"
        );

        let interval = self.config.checkpoint_interval;
        let limit = options.file_limit.unwrap_or(usize::MAX);
        let chunk_size = PARALLEL_CHUNK.min(interval);
        let mut processed = 0usize;
        let mut failed = 0usize;
        let mut since_save = 0usize;

        for chunk in pending.chunks(chunk_size) {
            if processed >= limit {
                break;
            }
            let chunk = &chunk[..chunk.len().min(limit - processed)];

            let results: Vec<Result<MediaRecord>> = chunk
                .par_iter()
                .map(|path| build_record(path, &self.config, &self.collector))
                .collect();

            for (path, result) in chunk.iter().zip(results) {
                match result {
                    Ok(record) => {
                        debug!(?path, effective = %record.effective_date, "Indexed file");
                        index.extend_new([record]);
                    }
                    Err(e) => {
                        warn!(?path, error = %e, "Skipping file that could not be indexed");
                        failed += 1;
                    }
                }
                checkpoint.mark_processed(path);
            }
            processed += chunk.len();
            since_save += chunk.len();

            on_progress(IndexProgress {
                phase: IndexPhase::Scanning,
                processed: checkpoint.processed_files,
                total,
            });

            if since_save >= interval {
                on_progress(IndexProgress {
                    phase: IndexPhase::Checkpointing,
                    processed: checkpoint.processed_files,
                    total,
                });
                self.save_progress(&store, &index, &mut checkpoint)?;
                since_save = 0;
            }
        }

        let phase = if checkpoint.is_complete() {
            on_progress(IndexProgress {
                phase: IndexPhase::Finalizing,
                processed: checkpoint.processed_files,
                total,
            });
            index.sort_records();
            store.save_index(&index, &checkpoint.current_output_file)?;
            store.delete_checkpoint()?;
            info!(
                records = index.total_count(),
                processed,
                reused,
                failed,
                snapshot = %checkpoint.current_output_file.display(),
                "Indexing complete"
            );
            IndexPhase::Done
        } else {
            self.save_progress(&store, &index, &mut checkpoint)?;
            info!(
                processed = checkpoint.processed_files,
                total,
                "File limit reached, scan suspended"
            );
            IndexPhase::Suspended
        };

        on_progress(IndexProgress {
            phase,
            processed: checkpoint.processed_files,
            total,
        });

        Ok(IndexReport {
            phase,
            snapshot: checkpoint.current_output_file.clone(),
            discovered: total,
            processed,
            reused,
            failed,
            index,
        })
    }

    /// Resume or start a scan. Returns the checkpoint, the index being built
    /// and the number of records carried over from the previous snapshot.
    fn initialize(
        &self,
        store: &IndexStore,
        enumerator: &FileEnumerator,
        options: IndexOptions,
    ) -> Result<(ScanCheckpoint, MediaIndex, usize)> {
        let root = enumerator.root().to_path_buf();
        let extensions = self.config.supported_extensions();

        let leftover = store.load_checkpoint()?;
        if let Some(mut checkpoint) = leftover.clone()
            && checkpoint.working_directory == root
        {
            let mut index = match store.load_index(&checkpoint.current_output_file) {
                Ok(index) => index,
                Err(Error::NotFound { .. }) if checkpoint.processed_files == 0 => {
                    MediaIndex::new(root.clone(), extensions.clone())
                }
                Err(e) => return Err(e),
            };
            index.supported_extensions = extensions;

            // The snapshot may hold records written after the checkpoint it
            // pairs with; those files are still pending and get rebuilt
            let loaded = index.total_count();
            index.retain(|r| checkpoint.is_processed(&r.file_path) || r.is_transferred);
            for record in index.records().iter().filter(|r| r.is_transferred) {
                checkpoint.mark_processed(&record.file_path);
            }
            if index.total_count() < loaded {
                warn!(
                    dropped = loaded - index.total_count(),
                    "Snapshot is ahead of its checkpoint, re-indexing unrecorded files"
                );
            }

            let mut reused = 0;
            if options.update_base {
                let paths = self.discover(store, enumerator, true)?;
                let previous = previously_indexed(store, &root)?;
                let known: BTreeSet<PathBuf> =
                    index.records().iter().map(|r| r.file_path.clone()).collect();
                checkpoint.rebase(paths, &known);

                let discoverable: HashSet<&PathBuf> = checkpoint.all_paths().iter().collect();
                index.retain(|r| discoverable.contains(&r.file_path) || r.is_transferred);
                reused = carry_over(previous, &mut index, &mut checkpoint);
            }

            info!(
                processed = checkpoint.processed_files,
                total = checkpoint.total_files,
                started_at = %checkpoint.started_at,
                "Resuming interrupted scan"
            );
            return Ok((checkpoint, index, reused));
        }

        // A checkpoint for another tree cannot be resumed; its snapshot slot
        // is reused by the fresh scan
        let target = match leftover {
            Some(stale) => {
                warn!(
                    checkpoint_root = %stale.working_directory.display(),
                    root = %root.display(),
                    "Discarding checkpoint that belongs to another directory"
                );
                store.delete_checkpoint()?;
                stale.current_output_file
            }
            None => store.snapshots().next()?,
        };

        let paths = self.discover(store, enumerator, options.update_base)?;
        let mut checkpoint = ScanCheckpoint::new(root.clone(), paths, target);
        let mut index = MediaIndex::new(root.clone(), extensions);
        let previous = previously_indexed(store, &root)?;
        let reused = carry_over(previous, &mut index, &mut checkpoint);

        Ok((checkpoint, index, reused))
    }

    /// Discoverable paths, from the base path registry unless a refresh is
    /// requested or no registry exists for this tree
    fn discover(
        &self,
        store: &IndexStore,
        enumerator: &FileEnumerator,
        refresh: bool,
    ) -> Result<Vec<PathBuf>> {
        if !refresh
            && let Some(registry) = store.load_registry()?
            && registry.working_directory == enumerator.root()
        {
            debug!(paths = registry.total_files, "Using base path registry");
            return Ok(registry.file_paths);
        }

        let paths = enumerator.collect_paths();
        info!(count = paths.len(), "Enumerated media files");
        store.save_registry(&BasePathRegistry::new(
            enumerator.root().to_path_buf(),
            paths.clone(),
        ))?;
        Ok(paths)
    }

    /// Snapshot first, checkpoint second: the checkpoint never refers to
    /// work the snapshot does not contain
    fn save_progress(
        &self,
        store: &IndexStore,
        index: &MediaIndex,
        checkpoint: &mut ScanCheckpoint,
    ) -> Result<()> {
        store.save_index(index, &checkpoint.current_output_file)?;
        store.save_checkpoint(checkpoint)
    }
}

/// Latest complete snapshot for the same tree
fn previously_indexed(store: &IndexStore, root: &Path) -> Result<Option<MediaIndex>> {
    Ok(store
        .load_latest_index()?
        .map(|(_, index)| index)
        .filter(|index| index.working_directory == root))
}

/// Move unchanged, still-discoverable records of a previous index into the
/// index being built and mark them processed. Transferred records whose
/// source is gone are carried as they are.
fn carry_over(
    previous: Option<MediaIndex>,
    index: &mut MediaIndex,
    checkpoint: &mut ScanCheckpoint,
) -> usize {
    let Some(previous) = previous else {
        return 0;
    };

    let present: HashSet<PathBuf> = index.records().iter().map(|r| r.file_path.clone()).collect();
    let mut carried = Vec::new();
    for record in previous.records() {
        if present.contains(&record.file_path) || checkpoint.is_processed(&record.file_path) {
            continue;
        }
        if record.is_transferred && !record.file_path.exists() {
            // Moved away; a stale path list may still name it
            checkpoint.mark_processed(&record.file_path);
            carried.push(record.clone());
            continue;
        }
        if !is_unchanged(record) {
            continue;
        }
        // Paths no longer discoverable are refused here
        if checkpoint.mark_processed(&record.file_path) {
            carried.push(record.clone());
        }
    }

    let reused = carried.len();
    index.extend_new(carried);
    if reused > 0 {
        debug!(reused, "Carried over unchanged records");
    }
    reused
}

fn is_unchanged(record: &MediaRecord) -> bool {
    let Ok(metadata) = fs::metadata(&record.file_path) else {
        return false;
    };
    match filesystem_times(&record.file_path, &metadata) {
        Ok((_, modified)) => record.matches_file(metadata.len(), modified),
        Err(_) => false,
    }
}

/// Hash, date and describe a single file
pub fn build_record(path: &Path, config: &Config, collector: &DateCollector) -> Result<MediaRecord> {
    let metadata = fs::metadata(path).map_err(|e| Error::from_io(path, e))?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| Error::Config(format!("not a file path: {}", path.display())))?;
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    let kind = config
        .media_kind(&extension)
        .ok_or_else(|| Error::Config(format!("unsupported extension '{}'", extension)))?;

    let hash = compute_file_hash(path)?;
    let all_dates = collector.collect(path, &metadata, kind);
    let (creation_date, modification_date) = filesystem_times(path, &metadata)?;
    let effective_date = select_effective_date(&all_dates, creation_date);

    Ok(MediaRecord {
        file_path: path.to_path_buf(),
        file_name,
        extension,
        file_size: metadata.len(),
        hash,
        creation_date,
        modification_date,
        effective_date,
        all_dates,
        is_transferred: false,
        transferred_to: None,
    })
}
