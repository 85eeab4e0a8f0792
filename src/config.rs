//! Configuration types for the media catalog

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

/// How a planned transfer touches the source file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TransferMode {
    /// Copy files to destination, leaving the source untouched
    #[default]
    Copy,
    /// Move files to destination
    Move,
}

/// Media kind, selects which embedded-date sources apply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    /// Still images, including RAW formats (EXIF capable)
    Image,
    /// Video containers (ISO-BMFF headers)
    Video,
}

/// Configuration for the media catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Supported image extensions
    pub image_extensions: Vec<String>,

    /// Supported RAW extensions
    pub raw_extensions: Vec<String>,

    /// Supported video extensions
    pub video_extensions: Vec<String>,

    /// Newly processed files between two checkpoint writes
    pub checkpoint_interval: usize,

    /// Number of threads for parallel hashing (0 = auto)
    pub threads: usize,

    /// Default transfer mode
    pub transfer_mode: TransferMode,

    /// Dry run mode - plan and report transfers without touching files
    pub dry_run: bool,

    /// Verbose output
    pub verbose: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            image_extensions: vec![
                "jpg".into(), "jpeg".into(), "png".into(), "gif".into(),
                "bmp".into(), "webp".into(), "heic".into(), "heif".into(),
                "avif".into(), "tiff".into(), "tif".into(),
            ],
            raw_extensions: vec![
                "raw".into(), "arw".into(), "cr2".into(), "cr3".into(),
                "nef".into(), "orf".into(), "rw2".into(), "dng".into(),
                "raf".into(), "srw".into(), "pef".into(),
            ],
            video_extensions: vec![
                "mp4".into(), "mov".into(), "m4v".into(), "3gp".into(),
                "avi".into(), "mkv".into(),
            ],
            checkpoint_interval: 5000,
            threads: 0,
            transfer_mode: TransferMode::default(),
            dry_run: false,
            verbose: false,
        }
    }
}

impl Config {
    /// Check if a file extension is a supported image format (RAW included)
    pub fn is_image(&self, ext: &str) -> bool {
        self.image_extensions
            .iter()
            .chain(self.raw_extensions.iter())
            .any(|e| e.eq_ignore_ascii_case(ext))
    }

    /// Check if a file extension is a supported video format
    pub fn is_video(&self, ext: &str) -> bool {
        self.video_extensions.iter().any(|e| e.eq_ignore_ascii_case(ext))
    }

    /// Check if a file extension is supported
    pub fn is_supported(&self, ext: &str) -> bool {
        self.is_image(ext) || self.is_video(ext)
    }

    /// Get the media kind for a given extension
    pub fn media_kind(&self, ext: &str) -> Option<MediaKind> {
        if self.is_video(ext) {
            Some(MediaKind::Video)
        } else if self.is_image(ext) {
            Some(MediaKind::Image)
        } else {
            None
        }
    }

    /// Lower-cased allow-list of every supported extension
    pub fn supported_extensions(&self) -> BTreeSet<String> {
        self.image_extensions
            .iter()
            .chain(self.raw_extensions.iter())
            .chain(self.video_extensions.iter())
            .map(|e| e.to_lowercase())
            .collect()
    }

    /// Reject settings the indexer cannot work with
    pub fn validate(&self) -> crate::Result<()> {
        if self.checkpoint_interval == 0 {
            return Err(crate::Error::Config(
                "checkpoint_interval must be greater than zero".into(),
            ));
        }
        if self.supported_extensions().is_empty() {
            return Err(crate::Error::Config("no supported extensions configured".into()));
        }
        Ok(())
    }

    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })?;

        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError {
                path: path.to_path_buf(),
                source: e,
            })?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError { source: e })?;

        fs::write(path, content).map_err(|e| ConfigError::WriteError {
            path: path.to_path_buf(),
            source: e,
        })?;

        Ok(())
    }
}

/// Errors that can occur when loading or saving configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{}': {source}", path.display())]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{}': {source}", path.display())]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Failed to write config file '{}': {source}", path.display())]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to serialize config: {source}")]
    SerializeError { source: toml::ser::Error },
}
