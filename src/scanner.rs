//! Complexity scanner
//!
//! Runs an adapter's whole-tree analysis, ranks the results, consults the
//! journal for recently failed targets, and emits an ordered shortlist plus
//! tree-health aggregates.

use crate::adapter::{ComplexityRecord, Ecosystem, EcosystemAdapter};
use crate::config::GardenerConfig;
use crate::journal::Journal;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Letter grade for a complexity score, for display only
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Grade {
    A,
    B,
    C,
    D,
    F,
}

impl Grade {
    pub fn from_cc(cc: u32) -> Self {
        match cc {
            0..=5 => Grade::A,
            6..=10 => Grade::B,
            11..=20 => Grade::C,
            21..=30 => Grade::D,
            _ => Grade::F,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Grade::A => "A",
            Grade::B => "B",
            Grade::C => "C",
            Grade::D => "D",
            Grade::F => "F",
        }
    }
}

impl std::fmt::Display for Grade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One analyzable unit flagged as a refactor candidate
#[derive(Debug, Clone, Serialize)]
pub struct CandidateTarget {
    pub file: String,
    /// `ClassName.function` when nested, else the bare name; stable across
    /// a scan and reconstructible from (file, function) alone
    pub function: String,
    pub complexity: u32,
    pub line: usize,
    pub rank: Grade,
    pub kind: String,
    pub ecosystem: Ecosystem,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub skipped: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<String>,
}

impl CandidateTarget {
    fn from_record(record: &ComplexityRecord, ecosystem: Ecosystem) -> Self {
        Self {
            file: record.file.clone(),
            function: record.qualified_name(),
            complexity: record.complexity,
            line: record.line,
            rank: Grade::from_cc(record.complexity),
            kind: record.kind.clone(),
            ecosystem,
            skipped: false,
            skip_reason: None,
        }
    }

    /// The journal identity form, `filePath::qualifiedName`
    pub fn journal_key(&self) -> String {
        format!("{}::{}", self.file, self.function)
    }
}

/// Structured scan output
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub ecosystem: Ecosystem,
    pub targets: Vec<CandidateTarget>,
    pub total_scanned: usize,
    pub skipped_from_journal: usize,
    /// Tree-health aggregates over the full scanned population, not just
    /// the selection
    pub avg_complexity: f64,
    pub max_complexity: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

pub struct Scanner<'a> {
    adapter: &'a dyn EcosystemAdapter,
    config: &'a GardenerConfig,
}

impl<'a> Scanner<'a> {
    pub fn new(adapter: &'a dyn EcosystemAdapter, config: &'a GardenerConfig) -> Self {
        Self { adapter, config }
    }

    pub fn scan(&self, repo_path: &Path) -> Result<ScanReport> {
        let ecosystem = self.adapter.ecosystem();
        let mut records = self.adapter.analyze(repo_path)?;

        // A clean tree is a legitimate terminal state, distinct from an
        // analysis failure (which surfaced as Err above)
        if records.is_empty() {
            return Ok(ScanReport {
                ecosystem,
                targets: Vec::new(),
                total_scanned: 0,
                skipped_from_journal: 0,
                avg_complexity: 0.0,
                max_complexity: 0,
                message: Some("no complexity targets found".to_string()),
            });
        }

        // Stable sort: analyzer order breaks ties
        records.sort_by(|a, b| b.complexity.cmp(&a.complexity));

        let total_scanned = records.len();
        let sum: u64 = records.iter().map(|r| u64::from(r.complexity)).sum();
        let avg_complexity = round2(sum as f64 / total_scanned as f64);
        let max_complexity = records.first().map(|r| r.complexity).unwrap_or(0);

        let journal = Journal::new(repo_path, self.config);
        let recently_failed = journal.recent_failures(self.config.skip_days);

        let candidates: Vec<CandidateTarget> = records
            .iter()
            .map(|r| CandidateTarget::from_record(r, ecosystem))
            .collect();
        let targets = select_targets(candidates, &recently_failed, self.config.top_targets);

        Ok(ScanReport {
            ecosystem,
            targets,
            total_scanned,
            skipped_from_journal: recently_failed.len(),
            avg_complexity,
            max_complexity,
            message: None,
        })
    }
}

/// Walk the ranked candidates and keep up to `top_n` that are not in the
/// recently-failed set. Excluded candidates are surfaced with
/// `skipped = true` instead of silently dropped.
///
/// Matching checks both the bare qualified name and the `file::name` form:
/// the journal always stores the latter, but different analyzers key
/// differently, and dropping either form could silently widen re-attempts
/// on known-bad targets.
pub fn select_targets(
    candidates: Vec<CandidateTarget>,
    recently_failed: &HashSet<String>,
    top_n: usize,
) -> Vec<CandidateTarget> {
    let mut out = Vec::new();
    let mut kept = 0usize;

    for mut candidate in candidates {
        if kept >= top_n {
            break;
        }
        let excluded = recently_failed.contains(&candidate.function)
            || recently_failed.contains(&candidate.journal_key());
        if excluded {
            candidate.skipped = true;
            candidate.skip_reason = Some("recently failed (see journal)".to_string());
            out.push(candidate);
            continue;
        }
        kept += 1;
        out.push(candidate);
    }

    out
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
