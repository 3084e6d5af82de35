//! Configuration for gardener
//!
//! Settings live in an optional `.gardener.json` at the target repository
//! root. Every component takes the config by reference at construction;
//! there is no ambient global state.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

pub const CONFIG_FILE: &str = ".gardener.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GardenerConfig {
    /// Number of candidates the scanner selects per run
    pub top_targets: usize,
    /// Skip candidates that failed within this many days
    pub skip_days: i64,
    /// Name of the journal ledger file at the repository root
    pub journal_file: String,
    /// Timeout for a single-file syntax check, in seconds
    pub syntax_timeout_secs: u64,
    /// Timeout for a full test-suite run, in seconds
    pub test_timeout_secs: u64,
    /// Timeout for a whole-tree complexity analysis, in seconds
    pub analyze_timeout_secs: u64,
}

impl Default for GardenerConfig {
    fn default() -> Self {
        Self {
            top_targets: 3,
            skip_days: 3,
            journal_file: "journal.md".to_string(),
            syntax_timeout_secs: 10,
            test_timeout_secs: 120,
            analyze_timeout_secs: 300,
        }
    }
}

impl GardenerConfig {
    /// Load config from the repository root, or return defaults.
    ///
    /// A corrupt config file is backed up and replaced by defaults rather
    /// than aborting the run.
    pub fn load(repo_path: &Path) -> Self {
        let path = repo_path.join(CONFIG_FILE);
        if let Ok(content) = fs::read_to_string(&path) {
            match serde_json::from_str(&content) {
                Ok(config) => return config,
                Err(err) => {
                    preserve_corrupt_config(&path, &content);
                    eprintln!(
                        "  Warning: {} was corrupted ({}). A backup was saved and defaults were loaded.",
                        CONFIG_FILE, err
                    );
                }
            }
        }
        Self::default()
    }

    pub fn syntax_timeout(&self) -> Duration {
        Duration::from_secs(self.syntax_timeout_secs)
    }

    pub fn test_timeout(&self) -> Duration {
        Duration::from_secs(self.test_timeout_secs)
    }

    pub fn analyze_timeout(&self) -> Duration {
        Duration::from_secs(self.analyze_timeout_secs)
    }
}

fn preserve_corrupt_config(path: &Path, content: &str) {
    let corrupt_path = path.with_extension("json.corrupt");
    if fs::rename(path, &corrupt_path).is_err() {
        let _ = fs::write(&corrupt_path, content);
    }
}
