//! Ecosystem adapters
//!
//! Each supported toolchain implements [`EcosystemAdapter`]: whole-tree
//! complexity analysis, single-file syntax check, test-suite run, and
//! per-function complexity lookup. Adding an ecosystem means adding one
//! implementation and one registry arm; nothing else changes.

pub mod process;
pub mod python;
pub mod rust;

use crate::config::GardenerConfig;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use walkdir::WalkDir;

/// Paths that no rewrite is ever allowed to touch, regardless of ecosystem:
/// governance docs and CI configuration. The journal ledger and the config
/// file are not listed here; they are gardener's own outputs and the gate
/// ignores them when inspecting the working tree.
pub const FORBIDDEN_COMMON: &[&str] = &["SKILL.md", "CONSTITUTION.md", ".github/"];

/// Supported source ecosystems
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Ecosystem {
    Python,
    Rust,
}

impl Ecosystem {
    pub fn as_str(&self) -> &'static str {
        match self {
            Ecosystem::Python => "python",
            Ecosystem::Rust => "rust",
        }
    }
}

impl std::fmt::Display for Ecosystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One function/method reported by an ecosystem's complexity analyzer
#[derive(Debug, Clone)]
pub struct ComplexityRecord {
    /// Repository-relative path of the containing file
    pub file: String,
    /// Bare function name as the analyzer reports it
    pub function: String,
    /// Enclosing class when the analyzer reports one
    pub class_name: Option<String>,
    /// Integer complexity score
    pub complexity: u32,
    /// 1-based line of the definition
    pub line: usize,
    /// "function" or "method"
    pub kind: String,
}

impl ComplexityRecord {
    /// `ClassName.function` when nested, else the bare function name.
    /// Stable across a scan; used as the journal lookup key.
    pub fn qualified_name(&self) -> String {
        match &self.class_name {
            Some(class) => format!("{}.{}", class, self.function),
            None => self.function.clone(),
        }
    }

    /// True when this record answers for the given qualified name,
    /// matched as either the bare name or `ClassName.name`.
    pub fn matches(&self, qualified_name: &str) -> bool {
        self.function == qualified_name || self.qualified_name() == qualified_name
    }
}

/// Result of a syntax check or test run: exit status and combined output,
/// with timeouts surfaced as a distinct condition.
#[derive(Debug, Clone)]
pub struct CheckOutcome {
    pub ok: bool,
    pub output: String,
    pub timed_out: bool,
}

/// The per-ecosystem toolchain binding.
///
/// Implementations never assume prior process state, never mutate the
/// repository, and restore any scratch configuration they temporarily edit
/// on every exit path.
pub trait EcosystemAdapter {
    fn ecosystem(&self) -> Ecosystem;

    /// Run the complexity analyzer over the whole tree.
    ///
    /// Unparseable analyzer output is an empty result, not an error.
    fn analyze(&self, repo_path: &Path) -> Result<Vec<ComplexityRecord>>;

    /// Fast structural validation of a single file.
    fn syntax_check(&self, repo_path: &Path, file_path: &str) -> Result<CheckOutcome>;

    /// Execute the full test suite.
    fn run_tests(&self, repo_path: &Path) -> Result<CheckOutcome>;

    /// Re-run the analyzer and return the score for one function, or `None`
    /// when no record matches: the legitimate signal that the function was
    /// decomposed during a rewrite.
    fn complexity_of(
        &self,
        repo_path: &Path,
        file_path: &str,
        qualified_name: &str,
    ) -> Result<Option<u32>>;

    /// Path substrings a rewrite must never touch in this ecosystem,
    /// in addition to [`FORBIDDEN_COMMON`].
    fn forbidden_patterns(&self) -> &'static [&'static str];
}

/// Detect the repository's ecosystem from its markers.
///
/// Manifest files win; otherwise fall back to counting source files by
/// extension and picking the ecosystem with the most matches.
pub fn detect(repo_path: &Path) -> Ecosystem {
    if repo_path.join("Cargo.toml").exists() {
        return Ecosystem::Rust;
    }
    let python_markers = ["pyproject.toml", "setup.py", "setup.cfg", "requirements.txt"];
    if python_markers.iter().any(|m| repo_path.join(m).exists()) {
        return Ecosystem::Python;
    }

    let (mut rs_count, mut py_count) = (0usize, 0usize);
    for entry in WalkDir::new(repo_path)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| {
            // Never prune the walk root; its own name is irrelevant
            e.depth() == 0
                || e.file_name()
                    .to_str()
                    .map(|name| {
                        !name.starts_with('.') && name != "target" && name != "node_modules"
                    })
                    .unwrap_or(true)
        })
        .flatten()
    {
        match entry.path().extension().and_then(|e| e.to_str()) {
            Some("rs") => rs_count += 1,
            Some("py") => py_count += 1,
            _ => {}
        }
    }

    if rs_count > py_count {
        Ecosystem::Rust
    } else {
        Ecosystem::Python
    }
}

/// Construct the adapter for an ecosystem.
pub fn adapter_for(ecosystem: Ecosystem, config: &GardenerConfig) -> Box<dyn EcosystemAdapter> {
    match ecosystem {
        Ecosystem::Python => Box::new(python::PythonAdapter::new(config.clone())),
        Ecosystem::Rust => Box::new(rust::RustAdapter::new(config.clone())),
    }
}
