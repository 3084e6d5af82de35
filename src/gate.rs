//! Gate verification state machine
//!
//! Given one candidate that an external agent claims to have rewritten in
//! place, run the ordered checks (forbidden files, syntax, tests,
//! complexity) and end in exactly one of committed or reverted. Any
//! failure short-circuits straight to a full revert; later checks never
//! run. The repository is left either one commit ahead or byte-identical
//! to before the attempt, never anything in between.

use crate::adapter::{EcosystemAdapter, FORBIDDEN_COMMON};
use crate::config::{GardenerConfig, CONFIG_FILE};
use crate::git_ops;
use anyhow::Result;
use serde::Serialize;
use std::path::Path;

/// The ordered checks, in the sequence they run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateStage {
    ForbiddenCheck,
    Syntax,
    Tests,
    Complexity,
}

impl GateStage {
    pub fn index(&self) -> usize {
        match self {
            GateStage::ForbiddenCheck => 0,
            GateStage::Syntax => 1,
            GateStage::Tests => 2,
            GateStage::Complexity => 3,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            GateStage::ForbiddenCheck => "Checking for forbidden file modifications",
            GateStage::Syntax => "Syntax check",
            GateStage::Tests => "Running tests",
            GateStage::Complexity => "Checking complexity",
        }
    }
}

/// Machine-readable failure kinds, one per way a check can reject
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    ForbiddenFilesModified,
    SyntaxTimeout,
    SyntaxError,
    TestTimeout,
    TestsFailed,
    ComplexityNotReduced,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::ForbiddenFilesModified => "forbidden_files_modified",
            FailureKind::SyntaxTimeout => "syntax_timeout",
            FailureKind::SyntaxError => "syntax_error",
            FailureKind::TestTimeout => "test_timeout",
            FailureKind::TestsFailed => "tests_failed",
            FailureKind::ComplexityNotReduced => "complexity_not_reduced",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GateResult {
    #[serde(rename = "PASS")]
    Pass,
    #[serde(rename = "FAIL")]
    Fail,
}

/// The single structured record emitted by every terminal transition
#[derive(Debug, Clone, Serialize)]
pub struct GateOutcome {
    pub result: GateResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub old_cc: u32,
    /// Absent when the target could not be re-located after the rewrite
    /// (decomposed); serialized as "N/A"
    #[serde(serialize_with = "serialize_new_cc")]
    pub new_cc: Option<u32>,
}

impl GateOutcome {
    pub fn passed(&self) -> bool {
        self.result == GateResult::Pass
    }
}

fn serialize_new_cc<S: serde::Serializer>(
    value: &Option<u32>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    match value {
        Some(cc) => serializer.serialize_u32(*cc),
        None => serializer.serialize_str("N/A"),
    }
}

pub struct Gate<'a> {
    repo_path: &'a Path,
    file_path: &'a str,
    qualified_name: &'a str,
    original_cc: u32,
    adapter: &'a dyn EcosystemAdapter,
    config: &'a GardenerConfig,
}

impl<'a> Gate<'a> {
    pub fn new(
        repo_path: &'a Path,
        file_path: &'a str,
        qualified_name: &'a str,
        original_cc: u32,
        adapter: &'a dyn EcosystemAdapter,
        config: &'a GardenerConfig,
    ) -> Self {
        Self {
            repo_path,
            file_path,
            qualified_name,
            original_cc,
            adapter,
            config,
        }
    }

    /// Files gardener itself writes at the repository root. They are
    /// invisible to the forbidden check and survive every revert.
    fn owned_files(&self) -> [&str; 2] {
        [self.config.journal_file.as_str(), CONFIG_FILE]
    }

    /// Run all checks to a terminal state.
    ///
    /// Internal errors during a check still route through the revert path
    /// before propagating, so the tree is never left dirty.
    pub fn run(&self) -> Result<GateOutcome> {
        match self.execute() {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                git_ops::revert_all(self.repo_path, &self.owned_files())?;
                Err(err)
            }
        }
    }

    fn execute(&self) -> Result<GateOutcome> {
        self.announce(GateStage::ForbiddenCheck);
        // The journal and config file live untracked at the repo root and
        // are written by gardener between gate runs; they are not part of
        // the rewrite under judgment.
        let owned = self.owned_files();
        let changed: Vec<String> = git_ops::changed_files(self.repo_path)?
            .into_iter()
            .filter(|path| !owned.contains(&path.as_str()))
            .collect();
        let violations = forbidden_violations(&changed, self.adapter.forbidden_patterns());
        if !violations.is_empty() {
            println!("  x Forbidden files modified: {}", violations.join(", "));
            return self.fail(FailureKind::ForbiddenFilesModified, Some(violations.join(", ")), None);
        }
        println!("  + No forbidden files touched.");

        self.announce(GateStage::Syntax);
        let syntax = self.adapter.syntax_check(self.repo_path, self.file_path)?;
        if syntax.timed_out {
            println!("  x Syntax check timed out.");
            return self.fail(FailureKind::SyntaxTimeout, None, None);
        }
        if !syntax.ok {
            println!("  x Syntax error: {}", truncate_chars(&syntax.output, 200));
            return self.fail(
                FailureKind::SyntaxError,
                Some(truncate_chars(&syntax.output, 500)),
                None,
            );
        }
        println!("  + Syntax OK.");

        self.announce(GateStage::Tests);
        let tests = self.adapter.run_tests(self.repo_path)?;
        if tests.timed_out {
            println!("  x Test run timed out.");
            return self.fail(FailureKind::TestTimeout, None, None);
        }
        if !tests.ok {
            println!("  x Tests failed.");
            // Summary only: the last few lines carry the failure digest
            return self.fail(
                FailureKind::TestsFailed,
                Some(tail_lines(&tests.output, 5)),
                None,
            );
        }
        println!("  + Tests passed.");

        self.announce(GateStage::Complexity);
        let new_cc = self
            .adapter
            .complexity_of(self.repo_path, self.file_path, self.qualified_name)?;

        match new_cc {
            None => {
                // The function is gone under its old name: the rewrite
                // likely split it into smaller functions. That is success.
                println!(
                    "  ! Could not find {} after rewrite (likely decomposed). Accepting.",
                    self.qualified_name
                );
                self.commit(0)?;
                Ok(GateOutcome {
                    result: GateResult::Pass,
                    reason: Some("function_decomposed".to_string()),
                    detail: None,
                    old_cc: self.original_cc,
                    new_cc: None,
                })
            }
            Some(new) if new >= self.original_cc => {
                println!("  x Complexity not reduced ({} -> {}).", self.original_cc, new);
                self.fail(
                    FailureKind::ComplexityNotReduced,
                    Some(format!("{} -> {}", self.original_cc, new)),
                    Some(new),
                )
            }
            Some(new) => {
                println!("  + Complexity reduced: {} -> {}", self.original_cc, new);
                self.commit(new)?;
                Ok(GateOutcome {
                    result: GateResult::Pass,
                    reason: None,
                    detail: None,
                    old_cc: self.original_cc,
                    new_cc: Some(new),
                })
            }
        }
    }

    fn announce(&self, stage: GateStage) {
        println!("  [{}/3] {}...", stage.index(), stage.label());
    }

    /// Terminal failure: revert everything, then report.
    fn fail(
        &self,
        kind: FailureKind,
        detail: Option<String>,
        new_cc: Option<u32>,
    ) -> Result<GateOutcome> {
        git_ops::revert_all(self.repo_path, &self.owned_files())?;
        Ok(GateOutcome {
            result: GateResult::Fail,
            reason: Some(kind.as_str().to_string()),
            detail,
            old_cc: self.original_cc,
            new_cc,
        })
    }

    fn commit(&self, new_cc: u32) -> Result<()> {
        let message = format!(
            "refactor: reduce complexity of {} ({} -> {})",
            self.qualified_name, self.original_cc, new_cc
        );
        git_ops::commit_file(self.repo_path, self.file_path, &message)?;
        Ok(())
    }
}

/// Changed paths matching any protected-path substring
pub fn forbidden_violations(changed: &[String], ecosystem_patterns: &[&str]) -> Vec<String> {
    changed
        .iter()
        .filter(|path| {
            FORBIDDEN_COMMON
                .iter()
                .chain(ecosystem_patterns.iter())
                .any(|pattern| path.contains(pattern))
        })
        .cloned()
        .collect()
}

/// Char-boundary-safe prefix truncation
pub fn truncate_chars(s: &str, max: usize) -> String {
    let trimmed = s.trim();
    if trimmed.chars().count() <= max {
        trimmed.to_string()
    } else {
        trimmed.chars().take(max).collect()
    }
}

/// The last `n` lines of combined output
pub fn tail_lines(s: &str, n: usize) -> String {
    let lines: Vec<&str> = s.trim().lines().collect();
    let start = lines.len().saturating_sub(n);
    lines[start..].join("\n")
}
