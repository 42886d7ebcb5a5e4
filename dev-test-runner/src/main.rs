//! Golden fixture runner.
//!
//! Every `fixtures/<name>.json` is a case:
//!
//! ```json
//! {"input": {...}, "expected": {...}, "findings": 0}
//! ```
//!
//! `input` is imported and compiled; the output must equal `expected` (or
//! `input` itself when `expected` is absent) including key order, and a second
//! round trip must reproduce it. `findings`, when present, is the number of
//! document-checker findings `input` must produce.
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use colored::Colorize;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

static FIXTURE_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z0-9_\-]+\.json$").unwrap());

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Case {
    #[serde(default)]
    description: Option<String>,
    input: Value,
    #[serde(default)]
    expected: Option<Value>,
    #[serde(default)]
    findings: Option<usize>,
}

fn fixture_paths(dir: &Path) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
        .unwrap_or_else(|e| panic!("cannot read {}: {e}", dir.display()))
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| FIXTURE_NAME.is_match(n))
        })
        .collect();
    paths.sort();
    paths
}

fn load_case(path: &Path) -> Result<Case, String> {
    let src = std::fs::read_to_string(path).map_err(|e| e.to_string())?;
    let de = &mut serde_json::Deserializer::from_str(&src);
    serde_path_to_error::deserialize(de).map_err(|e| format!("at {}: {}", e.path(), e.inner()))
}

fn normalize(document: &Value) -> Result<Value, String> {
    schema_tree::decompile(document)
        .map(|tree| schema_tree::compile(&tree))
        .map_err(|e| e.to_string())
}

fn run_case(case: &Case) -> Result<(), String> {
    let once = normalize(&case.input)?;
    let expected = case.expected.as_ref().unwrap_or(&case.input);
    let got_text = serde_json::to_string_pretty(&once).map_err(|e| e.to_string())?;
    let expected_text = serde_json::to_string_pretty(expected).map_err(|e| e.to_string())?;
    if got_text != expected_text {
        return Err(format!("output mismatch\n--- expected\n{expected_text}\n--- got\n{got_text}"));
    }

    let twice = normalize(&once)?;
    if twice != once {
        return Err("second round trip changed the document".into());
    }

    if let Some(expected_findings) = case.findings {
        let findings = schema_tree::check_document(&case.input).map_err(|e| e.to_string())?;
        if findings.len() != expected_findings {
            let listed: Vec<String> = findings.iter().map(|f| f.to_string()).collect();
            return Err(format!(
                "expected {expected_findings} findings, got {}:\n  {}",
                findings.len(),
                listed.join("\n  ")
            ));
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let dir = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures"));

    let mut failed = 0usize;
    let paths = fixture_paths(&dir);
    for path in &paths {
        let label = path.file_stem().and_then(|s| s.to_str()).unwrap_or("?");
        let outcome = load_case(path).and_then(|case| {
            run_case(&case).map(|()| case.description.unwrap_or_default())
        });
        match outcome {
            Ok(description) => println!("{} {} {}", "PASS".green(), label.bold(), description.dimmed()),
            Err(message) => {
                failed += 1;
                println!("{} {}\n{}", "FAIL".red(), label.bold(), message);
            }
        }
    }

    println!("\n{} cases, {} failed", paths.len(), failed);
    if failed == 0 { ExitCode::SUCCESS } else { ExitCode::FAILURE }
}
