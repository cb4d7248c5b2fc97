//! Persistence configuration.

use std::path::PathBuf;

/// Configuration for opening a disk persistence backend.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root directory holding one subdirectory per partition.
    pub root: PathBuf,

    /// Name of the action queue (also used for the worker thread name).
    pub queue_name: String,

    /// Whether to sync every record file to disk after writing it.
    pub sync_writes: bool,

    /// Whether recovery skips files that are empty or only whitespace.
    ///
    /// When false such files are handed to the decoder like any other.
    pub skip_blank_files: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root: PathBuf::from("db"),
            queue_name: "disk-persistence".to_string(),
            sync_writes: false,
            skip_blank_files: true,
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the root directory.
    #[must_use]
    pub fn root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    /// Sets the action queue name.
    #[must_use]
    pub fn queue_name(mut self, name: impl Into<String>) -> Self {
        self.queue_name = name.into();
        self
    }

    /// Sets whether each record file is synced after writing.
    #[must_use]
    pub fn sync_writes(mut self, value: bool) -> Self {
        self.sync_writes = value;
        self
    }

    /// Sets whether blank files are skipped during recovery.
    #[must_use]
    pub fn skip_blank_files(mut self, value: bool) -> Self {
        self.skip_blank_files = value;
        self
    }
}
