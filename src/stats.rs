//! Aggregate figures over an index

use crate::index::MediaIndex;
use crate::period::Period;
use std::collections::{BTreeMap, HashSet};

/// Per-period totals
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PeriodStats {
    pub files: usize,
    pub bytes: u64,
    pub transferred: usize,
}

/// Index statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexStats {
    pub total_files: usize,
    pub total_bytes: u64,
    pub transferred: usize,
    /// Records whose every date fact is a placeholder
    pub placeholder_only: usize,
    /// Records whose content hash was already seen on another record
    pub duplicate_content: usize,
    pub by_period: BTreeMap<Period, PeriodStats>,
    pub by_extension: BTreeMap<String, usize>,
}

impl IndexStats {
    pub fn from_index(index: &MediaIndex) -> Self {
        let mut stats = Self::default();
        let mut hashes = HashSet::new();

        for record in index.records() {
            stats.total_files += 1;
            stats.total_bytes += record.file_size;
            if record.is_transferred {
                stats.transferred += 1;
            }
            if record.has_only_placeholder_dates() {
                stats.placeholder_only += 1;
            }
            if !hashes.insert(record.hash.as_str()) {
                stats.duplicate_content += 1;
            }

            let period = stats.by_period.entry(record.period()).or_default();
            period.files += 1;
            period.bytes += record.file_size;
            if record.is_transferred {
                period.transferred += 1;
            }

            *stats
                .by_extension
                .entry(record.extension.clone())
                .or_default() += 1;
        }

        stats
    }

    /// Periods that still hold files not yet transferred
    pub fn pending_periods(&self) -> impl Iterator<Item = Period> + '_ {
        self.by_period
            .iter()
            .filter(|(_, s)| s.transferred < s.files)
            .map(|(p, _)| *p)
    }

    pub fn summary(&self) -> String {
        format!(
            "Files: {}, Size: {:.1} MB, Transferred: {}, Placeholder dates only: {}, Duplicate content: {}",
            self.total_files,
            self.total_bytes as f64 / (1024.0 * 1024.0),
            self.transferred,
            self.placeholder_only,
            self.duplicate_content
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dates::{DateFact, DateOrigin};
    use crate::index::tests::sample_record;
    use chrono::NaiveDate;
    use std::path::PathBuf;

    #[test]
    fn test_from_index() {
        let mut index = MediaIndex::new(PathBuf::from("/photos"), Default::default());
        let mut moved = sample_record("/photos/a.jpg", 100, (2023, 6, 1));
        moved.is_transferred = true;
        let twin = sample_record("/photos/copy/a2.jpg", 100, (2023, 6, 3));
        let mut epoch = sample_record("/photos/b.mp4", 50, (1970, 1, 1));
        let placeholder = NaiveDate::from_ymd_opt(1970, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        epoch.all_dates = vec![DateFact::new(placeholder, DateOrigin::FilesystemCreated)];
        index.extend_new([moved, twin, epoch]);

        let stats = IndexStats::from_index(&index);
        assert_eq!(stats.total_files, 3);
        assert_eq!(stats.total_bytes, 250);
        assert_eq!(stats.transferred, 1);
        assert_eq!(stats.placeholder_only, 1);
        assert_eq!(stats.duplicate_content, 1);
        assert_eq!(stats.by_extension.get("jpg"), Some(&2));
        assert_eq!(stats.by_extension.get("mp4"), Some(&1));

        let june = stats.by_period[&Period::new(2023, 6).unwrap()];
        assert_eq!(june.files, 2);
        assert_eq!(june.transferred, 1);

        let pending: Vec<String> = stats.pending_periods().map(|p| p.to_string()).collect();
        assert_eq!(pending, vec!["1970-01", "2023-06"]);
    }

    #[test]
    fn test_empty_index() {
        let index = MediaIndex::new(PathBuf::from("/photos"), Default::default());
        let stats = IndexStats::from_index(&index);
        assert_eq!(stats, IndexStats::default());
        assert!(stats.summary().starts_with("Files: 0"));
    }
}
