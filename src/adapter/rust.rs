//! Rust ecosystem adapter
//!
//! cargo clippy's `cognitive_complexity` lint is the analyzer: a scoped
//! `clippy.toml` override drops the threshold to 1 so every function gets
//! reported, and the JSON diagnostics are parsed at a strict boundary.
//! `cargo check` covers syntax, `cargo test` the suite.

use super::process::run_with_timeout;
use super::{CheckOutcome, ComplexityRecord, Ecosystem, EcosystemAdapter};
use crate::config::GardenerConfig;
use anyhow::{bail, Context, Result};
use regex::Regex;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const FORBIDDEN_RUST: &[&str] = &["tests/", "benches/", "build.rs", "Cargo.toml", "Cargo.lock"];

const CLIPPY_ARGS: &[&str] = &[
    "clippy",
    "--message-format=json",
    "--",
    "-W",
    "clippy::cognitive_complexity",
];

pub struct RustAdapter {
    config: GardenerConfig,
}

impl RustAdapter {
    pub fn new(config: GardenerConfig) -> Self {
        Self { config }
    }

    fn run_clippy(&self, repo_path: &Path) -> Result<Vec<ComplexityRecord>> {
        let _guard = ClippyConfigGuard::acquire(repo_path)?;
        let out = run_with_timeout(
            repo_path,
            "cargo",
            CLIPPY_ARGS,
            self.config.analyze_timeout(),
            &[("CARGO_TERM_COLOR", "never")],
        )?;
        if out.timed_out {
            bail!("cargo clippy timed out during complexity analysis");
        }
        Ok(parse_clippy_output(&out.output))
    }
}

impl EcosystemAdapter for RustAdapter {
    fn ecosystem(&self) -> Ecosystem {
        Ecosystem::Rust
    }

    fn analyze(&self, repo_path: &Path) -> Result<Vec<ComplexityRecord>> {
        self.run_clippy(repo_path)
    }

    fn syntax_check(&self, repo_path: &Path, _file_path: &str) -> Result<CheckOutcome> {
        // cargo check compiles the whole crate, so the single-file syntax
        // budget does not apply; floor the timeout at the compiled-language
        // reference of 120s.
        let timeout = Duration::from_secs(self.config.syntax_timeout_secs.max(120));
        let out = run_with_timeout(
            repo_path,
            "cargo",
            &["check", "--message-format=short"],
            timeout,
            &[("CARGO_TERM_COLOR", "never")],
        )?;
        Ok(CheckOutcome {
            ok: out.ok,
            output: out.output,
            timed_out: out.timed_out,
        })
    }

    fn run_tests(&self, repo_path: &Path) -> Result<CheckOutcome> {
        let timeout = Duration::from_secs(self.config.test_timeout_secs.max(300));
        let out = run_with_timeout(
            repo_path,
            "cargo",
            &["test", "--", "--test-threads=1"],
            timeout,
            &[("CARGO_TERM_COLOR", "never")],
        )?;
        Ok(CheckOutcome {
            ok: out.ok,
            output: out.output,
            timed_out: out.timed_out,
        })
    }

    fn complexity_of(
        &self,
        repo_path: &Path,
        _file_path: &str,
        qualified_name: &str,
    ) -> Result<Option<u32>> {
        let records = self.run_clippy(repo_path)?;
        Ok(records
            .iter()
            .find(|r| r.matches(qualified_name))
            .map(|r| r.complexity))
    }

    fn forbidden_patterns(&self) -> &'static [&'static str] {
        FORBIDDEN_RUST
    }
}

/// Scoped `clippy.toml` override.
///
/// Writes `cognitive-complexity-threshold = 1` on acquire and puts the
/// original file back (or removes it if there was none) when dropped, on
/// every exit path.
struct ClippyConfigGuard {
    path: PathBuf,
    original: Option<String>,
}

impl ClippyConfigGuard {
    fn acquire(repo_path: &Path) -> Result<Self> {
        let path = repo_path.join("clippy.toml");
        let original = match fs::read_to_string(&path) {
            Ok(content) => Some(content),
            Err(_) => None,
        };
        fs::write(&path, "cognitive-complexity-threshold = 1\n")
            .context("failed to write scratch clippy.toml")?;
        Ok(Self { path, original })
    }
}

impl Drop for ClippyConfigGuard {
    fn drop(&mut self) {
        match &self.original {
            Some(content) => {
                let _ = fs::write(&self.path, content);
            }
            None => {
                let _ = fs::remove_file(&self.path);
            }
        }
    }
}

/// Parse cargo's JSON diagnostic stream into complexity records.
///
/// Only `compiler-message` lines carrying the `cognitive_complexity` lint
/// count; anything ambiguous (no primary span, no parseable function name,
/// no score in the message) is dropped rather than guessed at.
pub fn parse_clippy_output(output: &str) -> Vec<ComplexityRecord> {
    let cc_pattern = Regex::new(r"cognitive complexity of \((\d+)/\d+\)").unwrap();
    let fn_pattern = Regex::new(r"\bfn\s+(\w+)\s*[(<]").unwrap();

    let mut records = Vec::new();
    let mut seen = HashSet::new();

    for line in output.lines() {
        let msg: serde_json::Value = match serde_json::from_str(line) {
            Ok(value) => value,
            Err(_) => continue,
        };
        if msg.get("reason").and_then(|r| r.as_str()) != Some("compiler-message") {
            continue;
        }
        let diag = match msg.get("message") {
            Some(diag) => diag,
            None => continue,
        };
        let code = diag
            .get("code")
            .and_then(|c| c.get("code"))
            .and_then(|c| c.as_str())
            .unwrap_or("");
        if !code.contains("cognitive_complexity") {
            continue;
        }

        let text = diag.get("message").and_then(|m| m.as_str()).unwrap_or("");
        let complexity = match cc_pattern
            .captures(text)
            .and_then(|caps| caps[1].parse::<u32>().ok())
        {
            Some(cc) => cc,
            None => continue,
        };

        let spans = match diag.get("spans").and_then(|s| s.as_array()) {
            Some(spans) if !spans.is_empty() => spans,
            _ => continue,
        };
        let primary = spans
            .iter()
            .find(|s| s.get("is_primary").and_then(|p| p.as_bool()) == Some(true))
            .unwrap_or(&spans[0]);

        let file = primary
            .get("file_name")
            .and_then(|f| f.as_str())
            .unwrap_or("unknown")
            .to_string();
        let line_num = primary
            .get("line_start")
            .and_then(|l| l.as_u64())
            .unwrap_or(0) as usize;

        // The function name comes from the span's first source line,
        // e.g. "pub async fn run_scan("; return absent on anything else
        let source_line = primary
            .get("text")
            .and_then(|t| t.as_array())
            .and_then(|t| t.first())
            .and_then(|t| t.get("text"))
            .and_then(|t| t.as_str())
            .unwrap_or("");
        let function = match fn_pattern.captures(source_line) {
            Some(caps) => caps[1].to_string(),
            None => continue,
        };

        // clippy repeats diagnostics across compilation units
        let key = format!("{}::{}:{}", file, function, line_num);
        if !seen.insert(key) {
            continue;
        }

        records.push(ComplexityRecord {
            file,
            function,
            class_name: None,
            complexity,
            line: line_num,
            kind: "function".to_string(),
        });
    }

    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn diag_line(file: &str, func_line: &str, line_start: u64, message: &str) -> String {
        serde_json::json!({
            "reason": "compiler-message",
            "message": {
                "code": {"code": "clippy::cognitive_complexity"},
                "message": message,
                "spans": [{
                    "is_primary": true,
                    "file_name": file,
                    "line_start": line_start,
                    "text": [{"text": func_line}]
                }]
            }
        })
        .to_string()
    }

    #[test]
    fn test_parse_clippy_diagnostic() {
        let output = diag_line(
            "src/engine.rs",
            "pub fn resolve_home(path: &str) -> String {",
            42,
            "the function has a cognitive complexity of (28/1)",
        );
        let records = parse_clippy_output(&output);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].function, "resolve_home");
        assert_eq!(records[0].complexity, 28);
        assert_eq!(records[0].file, "src/engine.rs");
        assert_eq!(records[0].line, 42);
    }

    #[test]
    fn test_parse_async_and_generic_fns() {
        let output = [
            diag_line(
                "src/a.rs",
                "pub async fn run_loop(cfg: &Config) {",
                1,
                "the function has a cognitive complexity of (12/1)",
            ),
            diag_line(
                "src/b.rs",
                "fn merge<T: Ord>(items: Vec<T>) {",
                9,
                "the function has a cognitive complexity of (7/1)",
            ),
        ]
        .join("\n");
        let records = parse_clippy_output(&output);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].function, "run_loop");
        assert_eq!(records[1].function, "merge");
    }

    #[test]
    fn test_parse_dedupes_repeated_diagnostics() {
        let line = diag_line(
            "src/a.rs",
            "fn busy() {",
            3,
            "the function has a cognitive complexity of (9/1)",
        );
        let output = format!("{}\n{}", line, line);
        assert_eq!(parse_clippy_output(&output).len(), 1);
    }

    #[test]
    fn test_parse_ignores_other_lints_and_noise() {
        let other_lint = serde_json::json!({
            "reason": "compiler-message",
            "message": {
                "code": {"code": "clippy::needless_return"},
                "message": "unneeded return",
                "spans": [{"is_primary": true, "file_name": "src/a.rs", "line_start": 1, "text": [{"text": "fn f() {"}]}]
            }
        })
        .to_string();
        let artifact = r#"{"reason": "compiler-artifact", "target": {"name": "x"}}"#;
        let output = format!("{}\nnot json\n{}", other_lint, artifact);
        assert!(parse_clippy_output(&output).is_empty());
    }

    #[test]
    fn test_parse_unmatchable_span_returns_absent() {
        // Source line with no fn, e.g. a closure span. Don't guess.
        let output = diag_line(
            "src/a.rs",
            "    let handler = move |x| {",
            7,
            "the function has a cognitive complexity of (15/1)",
        );
        assert!(parse_clippy_output(&output).is_empty());
    }

    #[test]
    fn test_parse_message_without_score_returns_absent() {
        let output = diag_line("src/a.rs", "fn f() {", 1, "some unrelated phrasing");
        assert!(parse_clippy_output(&output).is_empty());
    }

    #[test]
    fn test_clippy_guard_removes_scratch_config() {
        let tmp = TempDir::new().unwrap();
        {
            let _guard = ClippyConfigGuard::acquire(tmp.path()).unwrap();
            let written = fs::read_to_string(tmp.path().join("clippy.toml")).unwrap();
            assert!(written.contains("cognitive-complexity-threshold = 1"));
        }
        assert!(!tmp.path().join("clippy.toml").exists());
    }

    #[test]
    fn test_clippy_guard_restores_existing_config() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("clippy.toml");
        fs::write(&path, "msrv = \"1.81\"\n").unwrap();
        {
            let _guard = ClippyConfigGuard::acquire(tmp.path()).unwrap();
            assert_ne!(fs::read_to_string(&path).unwrap(), "msrv = \"1.81\"\n");
        }
        assert_eq!(fs::read_to_string(&path).unwrap(), "msrv = \"1.81\"\n");
    }
}
