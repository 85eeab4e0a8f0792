//! Media Catalog - resumable media indexing with duplicate-aware transfers
//!
//! This library indexes photo and video collections and reorganizes them
//! by month:
//! - Content hashing with xxHash3-128
//! - Date facts from the filesystem, EXIF, MP4 container headers and
//!   filename patterns, reduced to one effective date per file
//! - Checkpointed, resumable scans with numbered index snapshots
//! - Parallel hashing with Rayon
//! - Per-month transfer planning that keeps the largest copy of each name

pub mod catalog;
pub mod cli;
pub mod config;
pub mod dates;
pub mod error;
pub mod hash;
pub mod index;
pub mod indexer;
pub mod period;
pub mod scan;
pub mod stats;
pub mod store;
pub mod transfer;

pub use catalog::{Catalog, PeriodTransfer};
pub use cli::{Cli, Command};
pub use config::{Config, ConfigError, MediaKind, TransferMode};
pub use dates::{DateCollector, DateFact, DateFactSource, DateOrigin, select_effective_date};
pub use error::{Error, Result};
pub use index::{BasePathRegistry, MediaIndex, MediaRecord, ScanCheckpoint};
pub use indexer::{IndexOptions, IndexPhase, IndexProgress, IndexReport, MediaIndexer};
pub use period::Period;
pub use stats::IndexStats;
pub use store::IndexStore;
pub use transfer::{
    BatchOutcome, TransferOperation, TransferReport, TransferStatus, execute_transfer,
    plan_transfer,
};
