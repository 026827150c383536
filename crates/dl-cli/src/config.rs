use std::fs;
use std::path::Path;

use anyhow::Context;
use dl_ledger::LedgerConfig;
use serde::{Deserialize, Serialize};

/// Settings read from `dl.toml`.
///
/// ```toml
/// [ledger]
/// path = "state/ledger.wal"
/// sync_mode = "every-write"
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub ledger: LedgerConfig,
}

impl CliConfig {
    /// Looked up in the working directory when `--config` is not given.
    pub const DEFAULT_FILE: &'static str = "dl.toml";

    /// Load `path`, or `dl.toml` if it exists, or fall back to defaults.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => {
                let default = Path::new(Self::DEFAULT_FILE);
                if default.exists() {
                    Self::from_file(default)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("invalid config {}", path.display()))
    }
}
