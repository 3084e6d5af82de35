//! Python ecosystem adapter
//!
//! radon (cyclomatic complexity, JSON output) for analysis, `py_compile`
//! for syntax, pytest for the test suite.

use super::process::run_with_timeout;
use super::{CheckOutcome, ComplexityRecord, Ecosystem, EcosystemAdapter};
use crate::config::GardenerConfig;
use anyhow::Result;
use std::path::Path;

const FORBIDDEN_PYTHON: &[&str] = &["test_", "tests/", "_test.py", "conftest.py"];

pub struct PythonAdapter {
    config: GardenerConfig,
}

impl PythonAdapter {
    pub fn new(config: GardenerConfig) -> Self {
        Self { config }
    }

    fn run_radon(&self, repo_path: &Path, scope: &str) -> Result<String> {
        // Rank filter keeps output small on big trees; retry unfiltered if
        // the filtered invocation itself fails.
        let filtered = run_with_timeout(
            repo_path,
            "radon",
            &["cc", scope, "-j", "-n", "C"],
            self.config.analyze_timeout(),
            &[],
        )?;
        if filtered.ok {
            return Ok(filtered.output);
        }
        eprintln!("  radon -n C failed, retrying unfiltered");
        let full = run_with_timeout(
            repo_path,
            "radon",
            &["cc", scope, "-j"],
            self.config.analyze_timeout(),
            &[],
        )?;
        Ok(full.output)
    }
}

impl EcosystemAdapter for PythonAdapter {
    fn ecosystem(&self) -> Ecosystem {
        Ecosystem::Python
    }

    fn analyze(&self, repo_path: &Path) -> Result<Vec<ComplexityRecord>> {
        let output = self.run_radon(repo_path, ".")?;
        Ok(parse_radon_output(&output))
    }

    fn syntax_check(&self, repo_path: &Path, file_path: &str) -> Result<CheckOutcome> {
        let out = run_with_timeout(
            repo_path,
            "python3",
            &["-m", "py_compile", file_path],
            self.config.syntax_timeout(),
            &[],
        )?;
        Ok(CheckOutcome {
            ok: out.ok,
            output: out.output,
            timed_out: out.timed_out,
        })
    }

    fn run_tests(&self, repo_path: &Path) -> Result<CheckOutcome> {
        let out = run_with_timeout(
            repo_path,
            "python3",
            &["-m", "pytest", "-x", "--tb=short", "-q"],
            self.config.test_timeout(),
            &[],
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
        file_path: &str,
        qualified_name: &str,
    ) -> Result<Option<u32>> {
        // Unfiltered: the rewritten function may have dropped below rank C,
        // which is exactly the result we want to see.
        let out = run_with_timeout(
            repo_path,
            "radon",
            &["cc", file_path, "-j"],
            self.config.analyze_timeout(),
            &[],
        )?;
        let records = parse_radon_output(&out.output);
        Ok(records
            .iter()
            .find(|r| r.matches(qualified_name))
            .map(|r| r.complexity))
    }

    fn forbidden_patterns(&self) -> &'static [&'static str] {
        FORBIDDEN_PYTHON
    }
}

/// Parse radon's JSON output: a map of file path to block records.
///
/// Unparseable output or unexpected shapes produce an empty list; this is
/// a strict boundary, and a guess here would poison the whole loop.
pub fn parse_radon_output(output: &str) -> Vec<ComplexityRecord> {
    let data: serde_json::Value = match serde_json::from_str(output) {
        Ok(value) => value,
        Err(_) => return Vec::new(),
    };
    let map = match data.as_object() {
        Some(map) => map,
        None => return Vec::new(),
    };

    let mut records = Vec::new();
    for (file, blocks) in map {
        let blocks = match blocks.as_array() {
            Some(blocks) => blocks,
            // radon reports per-file errors as objects; skip them
            None => continue,
        };
        for block in blocks {
            let function = match block.get("name").and_then(|n| n.as_str()) {
                Some(name) => name.to_string(),
                None => continue,
            };
            let complexity = block
                .get("complexity")
                .and_then(|c| c.as_u64())
                .unwrap_or(0) as u32;
            records.push(ComplexityRecord {
                file: file.clone(),
                function,
                class_name: block
                    .get("classname")
                    .and_then(|c| c.as_str())
                    .map(|s| s.to_string()),
                complexity,
                line: block.get("lineno").and_then(|l| l.as_u64()).unwrap_or(0) as usize,
                kind: block
                    .get("type")
                    .and_then(|t| t.as_str())
                    .unwrap_or("function")
                    .to_string(),
            });
        }
    }
    records
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "pkg/tools.py": [
            {"name": "dispatch", "complexity": 22, "lineno": 40, "rank": "D", "type": "function"},
            {"name": "_validate", "complexity": 27, "lineno": 90, "rank": "D", "type": "method", "classname": "Tool"}
        ],
        "pkg/util.py": [
            {"name": "flatten", "complexity": 4, "lineno": 5, "rank": "A", "type": "function"}
        ]
    }"#;

    #[test]
    fn test_parse_radon_output() {
        let records = parse_radon_output(SAMPLE);
        assert_eq!(records.len(), 3);

        let validate = records.iter().find(|r| r.function == "_validate").unwrap();
        assert_eq!(validate.qualified_name(), "Tool._validate");
        assert_eq!(validate.complexity, 27);
        assert_eq!(validate.kind, "method");
        assert_eq!(validate.file, "pkg/tools.py");
    }

    #[test]
    fn test_parse_garbage_returns_empty() {
        assert!(parse_radon_output("not json at all").is_empty());
        assert!(parse_radon_output("[1, 2, 3]").is_empty());
        assert!(parse_radon_output("").is_empty());
    }

    #[test]
    fn test_parse_skips_error_entries() {
        // radon emits {"error": "..."} instead of a block list for files
        // it cannot parse
        let output = r#"{
            "broken.py": {"error": "invalid syntax"},
            "ok.py": [{"name": "f", "complexity": 6, "lineno": 1, "type": "function"}]
        }"#;
        let records = parse_radon_output(output);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].function, "f");
    }

    #[test]
    fn test_parse_block_missing_name_is_dropped() {
        let output = r#"{"a.py": [{"complexity": 9, "lineno": 2}]}"#;
        assert!(parse_radon_output(output).is_empty());
    }
}
