use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Flush/sync strategy for the write-ahead log.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncMode {
    /// `fsync` after every commit (safest, highest latency).
    EveryWrite,
    /// Flush to the OS page cache only (fastest, least durable).
    #[default]
    OsDefault,
}

/// Configuration for a file-backed ledger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Path of the write-ahead log file.
    pub path: PathBuf,
    pub sync_mode: SyncMode,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("ledger.wal"),
            sync_mode: SyncMode::default(),
        }
    }
}

impl LedgerConfig {
    /// Default settings with the log at `path`.
    pub fn at(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let c = LedgerConfig::default();
        assert_eq!(c.path, PathBuf::from("ledger.wal"));
        assert_eq!(c.sync_mode, SyncMode::OsDefault);
    }

    #[test]
    fn at_overrides_path_only() {
        let c = LedgerConfig::at("/var/lib/dl/state.wal");
        assert_eq!(c.path, PathBuf::from("/var/lib/dl/state.wal"));
        assert_eq!(c.sync_mode, SyncMode::OsDefault);
    }
}
