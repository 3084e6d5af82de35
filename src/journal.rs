//! Append-only attempt ledger
//!
//! `journal.md` at the target repository root records every gate attempt as
//! one pipe-delimited line:
//!
//! ```text
//! [2026-08-30] | target: src/engine.rs::resolve_home | status: Fail | cc: 22->22 | reason: Tests failed
//! ```
//!
//! Entries are never mutated or deleted. The file is re-read fresh on every
//! call, and malformed lines are skipped so partial corruption never loses
//! earlier valid history.

use crate::config::GardenerConfig;
use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

const HEADER: &str = "# Gardener Journal\n\n";

/// Outcome of one recorded attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
pub enum AttemptStatus {
    Success,
    Fail,
}

impl AttemptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptStatus::Success => "Success",
            AttemptStatus::Fail => "Fail",
        }
    }
}

impl std::fmt::Display for AttemptStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One immutable historical record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalEntry {
    pub date: NaiveDate,
    /// Fully qualified identity, `filePath::qualifiedName`
    pub target: String,
    pub status: AttemptStatus,
    pub old_cc: u32,
    pub new_cc: u32,
    pub reason: String,
}

impl JournalEntry {
    /// Parse one ledger line. Returns `None` for anything that does not
    /// carry a valid date, target, and status; callers skip those lines.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return None;
        }

        let parts: Vec<&str> = line.split('|').map(|p| p.trim()).collect();
        let date_token = parts.first()?.trim_matches(|c| c == '[' || c == ']' || c == ' ');
        let date = NaiveDate::parse_from_str(date_token, "%Y-%m-%d").ok()?;

        let target = parts
            .iter()
            .find(|p| p.starts_with("target:"))?
            .splitn(2, ':')
            .nth(1)?
            .trim()
            .to_string();
        if target.is_empty() {
            return None;
        }

        let status_part = parts.iter().find(|p| p.starts_with("status:"))?;
        let status = if status_part.contains("Fail") {
            AttemptStatus::Fail
        } else if status_part.contains("Success") {
            AttemptStatus::Success
        } else {
            return None;
        };

        let (old_cc, new_cc) = parts
            .iter()
            .find(|p| p.starts_with("cc:"))
            .and_then(|p| {
                let cc = p.splitn(2, ':').nth(1)?.trim();
                let (old, new) = cc.split_once("->")?;
                Some((old.trim().parse().ok()?, new.trim().parse().ok()?))
            })
            .unwrap_or((0, 0));

        let reason = parts
            .iter()
            .find(|p| p.starts_with("reason:"))
            .and_then(|p| p.splitn(2, ':').nth(1))
            .map(|r| r.trim().to_string())
            .unwrap_or_default();

        Some(Self {
            date,
            target,
            status,
            old_cc,
            new_cc,
            reason,
        })
    }

    fn format_line(&self) -> String {
        format!(
            "[{}] | target: {} | status: {} | cc: {}->{} | reason: {}\n",
            self.date.format("%Y-%m-%d"),
            self.target,
            self.status,
            self.old_cc,
            self.new_cc,
            self.reason
        )
    }
}

/// Entries within a lookback window plus aggregate counts, for reporting
#[derive(Debug, Clone)]
pub struct JournalSummary {
    pub entries: Vec<JournalEntry>,
    pub successes: usize,
    pub fails: usize,
}

/// The journal store for one repository
pub struct Journal {
    path: PathBuf,
}

impl Journal {
    pub fn new(repo_path: &Path, config: &GardenerConfig) -> Self {
        Self {
            path: repo_path.join(&config.journal_file),
        }
    }

    /// Append one entry, creating the ledger with its header if absent.
    ///
    /// A failed attempt has no valid new complexity, so `Fail` entries are
    /// always written `old->old` regardless of the supplied value.
    pub fn append(
        &self,
        target: &str,
        status: AttemptStatus,
        reason: &str,
        old_cc: u32,
        new_cc: u32,
    ) -> Result<JournalEntry> {
        let entry = JournalEntry {
            date: Local::now().date_naive(),
            target: target.to_string(),
            status,
            old_cc,
            new_cc: match status {
                AttemptStatus::Success => new_cc,
                AttemptStatus::Fail => old_cc,
            },
            reason: reason.to_string(),
        };

        if !self.path.exists() {
            fs::write(&self.path, HEADER).context("failed to create journal")?;
        }
        let mut file = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .context("failed to open journal for append")?;
        file.write_all(entry.format_line().as_bytes())
            .context("failed to append journal entry")?;

        Ok(entry)
    }

    /// Identities of targets with a `Fail` entry in the last `skip_days`
    /// days. Day-granularity dates are compared against a full timestamp
    /// cutoff, so an entry dated exactly `skip_days` days ago falls outside
    /// the window.
    pub fn recent_failures(&self, skip_days: i64) -> HashSet<String> {
        self.failures_since(Local::now() - Duration::days(skip_days))
    }

    pub fn failures_since(&self, cutoff: DateTime<Local>) -> HashSet<String> {
        self.parse_all()
            .into_iter()
            .filter(|e| e.status == AttemptStatus::Fail && !entry_before(e, cutoff))
            .map(|e| e.target)
            .collect()
    }

    /// All parseable entries from the last `days` days, oldest first,
    /// with success/fail counts.
    pub fn read_recent(&self, days: i64) -> JournalSummary {
        let cutoff = Local::now() - Duration::days(days);
        let entries: Vec<JournalEntry> = self
            .parse_all()
            .into_iter()
            .filter(|e| !entry_before(e, cutoff))
            .collect();
        let successes = entries
            .iter()
            .filter(|e| e.status == AttemptStatus::Success)
            .count();
        let fails = entries.len() - successes;
        JournalSummary {
            entries,
            successes,
            fails,
        }
    }

    fn parse_all(&self) -> Vec<JournalEntry> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(_) => return Vec::new(),
        };
        content.lines().filter_map(JournalEntry::parse).collect()
    }
}

fn entry_before(entry: &JournalEntry, cutoff: DateTime<Local>) -> bool {
    match entry.date.and_hms_opt(0, 0, 0).and_then(|dt| dt.and_local_timezone(Local).single()) {
        Some(entry_dt) => entry_dt < cutoff,
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn journal_in(tmp: &TempDir) -> Journal {
        Journal::new(tmp.path(), &GardenerConfig::default())
    }

    #[test]
    fn test_append_creates_header_and_round_trips() {
        let tmp = TempDir::new().unwrap();
        let journal = journal_in(&tmp);
        journal
            .append(
                "src/a.rs::busy",
                AttemptStatus::Success,
                "Extracted helpers",
                27,
                18,
            )
            .unwrap();

        let content = fs::read_to_string(tmp.path().join("journal.md")).unwrap();
        assert!(content.starts_with("# Gardener Journal"));
        assert!(content.contains("target: src/a.rs::busy"));
        assert!(content.contains("cc: 27->18"));

        let summary = journal.read_recent(7);
        assert_eq!(summary.entries.len(), 1);
        assert_eq!(summary.successes, 1);
        assert_eq!(summary.fails, 0);
    }

    #[test]
    fn test_fail_forces_new_cc_equal_to_old() {
        let tmp = TempDir::new().unwrap();
        let journal = journal_in(&tmp);
        let entry = journal
            .append("src/a.rs::busy", AttemptStatus::Fail, "Tests failed", 22, 9)
            .unwrap();
        assert_eq!(entry.new_cc, 22);

        let content = fs::read_to_string(tmp.path().join("journal.md")).unwrap();
        assert!(content.contains("cc: 22->22"));
    }

    #[test]
    fn test_recent_failures_round_trip() {
        let tmp = TempDir::new().unwrap();
        let journal = journal_in(&tmp);
        journal
            .append("src/a.rs::busy", AttemptStatus::Fail, "Tests failed", 22, 22)
            .unwrap();
        journal
            .append("src/b.rs::fine", AttemptStatus::Success, "Reduced", 20, 11)
            .unwrap();

        let failed = journal.recent_failures(3);
        assert!(failed.contains("src/a.rs::busy"));
        assert!(!failed.contains("src/b.rs::fine"));
    }

    #[test]
    fn test_window_excludes_old_entries() {
        let tmp = TempDir::new().unwrap();
        let journal = journal_in(&tmp);
        let old_date = (Local::now() - Duration::days(10)).date_naive();
        let line = format!(
            "[{}] | target: src/old.rs::f | status: Fail | cc: 15->15 | reason: stale\n",
            old_date.format("%Y-%m-%d")
        );
        fs::write(tmp.path().join("journal.md"), format!("{}{}", HEADER, line)).unwrap();

        assert!(journal.recent_failures(3).is_empty());
        // A wide enough window still sees it
        assert!(journal.recent_failures(30).contains("src/old.rs::f"));
    }

    #[test]
    fn test_boundary_entry_excluded_from_window() {
        // Dated exactly skip_days ago: midnight timestamp is before the
        // cutoff, so it is outside the exclusion window
        let tmp = TempDir::new().unwrap();
        let journal = journal_in(&tmp);
        let boundary = (Local::now() - Duration::days(3)).date_naive();
        let line = format!(
            "[{}] | target: src/edge.rs::f | status: Fail | cc: 15->15 | reason: edge\n",
            boundary.format("%Y-%m-%d")
        );
        fs::write(tmp.path().join("journal.md"), format!("{}{}", HEADER, line)).unwrap();

        let cutoff = Local::now() - Duration::days(3);
        assert!(journal.failures_since(cutoff).is_empty());
    }

    #[test]
    fn test_malformed_lines_are_skipped_not_fatal() {
        let tmp = TempDir::new().unwrap();
        let journal = journal_in(&tmp);
        let today = Local::now().date_naive().format("%Y-%m-%d");
        let content = format!(
            "{}[not-a-date] | target: x | status: Fail | cc: 1->1 | reason: bad\n\
             garbage line with no delimiters\n\
             [{today}] | status: Fail | cc: 2->2 | reason: no target\n\
             [{today}] | target: src/ok.rs::f | status: Fail | cc: 9->9 | reason: kept\n",
            HEADER
        );
        fs::write(tmp.path().join("journal.md"), content).unwrap();

        let failed = journal.recent_failures(3);
        assert_eq!(failed.len(), 1);
        assert!(failed.contains("src/ok.rs::f"));
    }

    #[test]
    fn test_parse_tolerates_whitespace_and_missing_cc() {
        let entry = JournalEntry::parse(
            "[2026-08-29]|target:  src/a.py::Tool.run  |status: Success|reason: tidy",
        )
        .unwrap();
        assert_eq!(entry.target, "src/a.py::Tool.run");
        assert_eq!(entry.status, AttemptStatus::Success);
        assert_eq!((entry.old_cc, entry.new_cc), (0, 0));
        assert_eq!(entry.reason, "tidy");
    }

    #[test]
    fn test_missing_journal_reads_empty() {
        let tmp = TempDir::new().unwrap();
        let journal = journal_in(&tmp);
        assert!(journal.recent_failures(3).is_empty());
        assert!(journal.read_recent(7).entries.is_empty());
    }
}
