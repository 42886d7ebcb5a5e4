//! CLI: normalize | check | edit | store
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use rayon::prelude::*;
use serde_json::{json, Value};
use uuid::Uuid;

use schema_tree::jq_exec::Selector;
use schema_tree::script::{apply_script, parse_script};
use schema_tree::store::{DirStore, Pagination, SchemaPatch, SchemaStore};
use schema_tree::{check_document, check_tree, compile, decompile, Finding, SchemaTree};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// build, check and store JSON Schema documents through the editable tree model
#[derive(Parser, Debug)]
#[command(name = "schema-tree", version)]
pub struct CommandLineInterface {
    /// tracing filter, e.g. `debug` or `schema_tree=trace` (falls back to RUST_LOG)
    #[arg(long, global = true, env = "SCHEMA_TREE_LOG")]
    pub log_level: Option<String>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// import each input and print its canonical compiled form
    Normalize(NormalizeOut),
    /// report consistency findings for each input
    Check(CheckArgs),
    /// apply an edit script to a document and print the compiled result
    Edit(EditArgs),
    /// manage saved schemas
    #[command(subcommand)]
    Store(StoreCommand),
}

#[derive(Args, Debug, Clone)]
struct InputSettings {
    /// JSON Pointer to select a subnode in each document (e.g. /data/schema)
    #[arg(long)]
    json_pointer: Option<String>,

    /// JQ pre-process filter for each document (e.g. `.schema`)
    #[arg(long)]
    jq_expr: Option<String>,

    /// One or more inputs. May be literal paths or quoted glob patterns or '-' for stdin
    #[arg(long, short, num_args = 1.., required = true)]
    input: Vec<String>,
}

#[derive(clap::Parser, Debug)]
struct NormalizeOut {
    #[command(flatten)]
    input_settings: InputSettings,

    /// output .json file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,
}

#[derive(clap::Parser, Debug)]
struct CheckArgs {
    #[command(flatten)]
    input_settings: InputSettings,

    /// also import each document and check the resulting tree
    #[arg(long)]
    tree: bool,

    /// exit non-zero when any finding is reported
    #[arg(long)]
    strict: bool,

    /// print findings as JSON
    #[arg(long)]
    json: bool,
}

#[derive(clap::Parser, Debug)]
struct EditArgs {
    /// document to start from ('-' for stdin); an empty object schema if omitted
    #[arg(long, short)]
    input: Option<String>,

    /// JSON edit script (array of ops)
    #[arg(long, short)]
    script: PathBuf,

    /// output .json file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
struct StoreSettings {
    /// directory holding saved schemas
    #[arg(long, env = "SCHEMA_TREE_STORE", default_value = ".schema-tree")]
    store_dir: PathBuf,
}

#[derive(Subcommand, Debug)]
enum StoreCommand {
    /// normalize a document and save it (updates when --id is given)
    Save {
        #[command(flatten)]
        store: StoreSettings,
        #[arg(long)]
        name: Option<String>,
        #[arg(long, short)]
        input: String,
        #[arg(long)]
        id: Option<Uuid>,
    },
    /// list saved schemas, newest first
    List {
        #[command(flatten)]
        store: StoreSettings,
        #[arg(long, default_value_t = 1)]
        page: usize,
        #[arg(long, default_value_t = 20)]
        page_size: usize,
    },
    /// print one saved schema document
    Show {
        #[command(flatten)]
        store: StoreSettings,
        id: Uuid,
    },
    /// delete a saved schema
    Delete {
        #[command(flatten)]
        store: StoreSettings,
        id: Uuid,
    },
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl InputSettings {
    /// Every selected document, labelled with its source.
    fn load(&self) -> Result<Vec<(String, Value)>> {
        let selector = self.jq_expr.as_deref().map(Selector::compile).transpose()?;
        let mut out = Vec::new();
        for source in resolve_inputs(&self.input)? {
            let label = source.label();
            let json_value = source.read_json()?;
            let json_value = match self.json_pointer.as_deref() {
                None => json_value,
                Some(pointer) => json_value
                    .pointer(pointer)
                    .cloned()
                    .ok_or_else(|| anyhow!("JSON pointer {pointer} selects nothing in {label}"))?,
            };
            match selector.as_ref() {
                None => out.push((label, json_value)),
                Some(selector) => {
                    let selected = selector
                        .select(&json_value)
                        .with_context(|| format!("failed to select schemas from {label}"))?;
                    out.extend(selected.into_iter().map(|value| (label.clone(), value)));
                }
            }
        }
        Ok(out)
    }
}

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }

    pub fn run(&self) -> Result<ExitCode> {
        match &self.cmd {
            Command::Normalize(target) => {
                let mut normalized = Vec::new();
                for (label, document) in target.input_settings.load()? {
                    let tree = decompile(&document).with_context(|| format!("cannot import {label}"))?;
                    normalized.push(compile(&tree));
                }
                let output = match normalized.len() {
                    1 => normalized.remove(0),
                    _ => Value::Array(normalized),
                };
                emit(target.out.as_deref(), &serde_json::to_string_pretty(&output)?)?;
                Ok(ExitCode::SUCCESS)
            }
            Command::Check(target) => {
                let documents = target.input_settings.load()?;
                let reports = documents
                    .par_iter()
                    .map(|(label, document)| check_one(document, target.tree).map(|f| (label, f)))
                    .collect::<Result<Vec<_>>>()?;

                let total: usize = reports.iter().map(|(_, findings)| findings.len()).sum();
                if target.json {
                    let out: Vec<Value> = reports
                        .iter()
                        .map(|(label, findings)| json!({"input": label, "findings": findings}))
                        .collect();
                    println!("{}", serde_json::to_string_pretty(&out)?);
                } else {
                    for (label, findings) in &reports {
                        print_report(label, findings);
                    }
                }
                Ok(if target.strict && total > 0 { ExitCode::FAILURE } else { ExitCode::SUCCESS })
            }
            Command::Edit(target) => {
                let mut tree = match target.input.as_deref() {
                    None => SchemaTree::new(),
                    Some(input) => {
                        let source = resolve_inputs([input])?
                            .pop()
                            .ok_or_else(|| anyhow!("no input matched {input}"))?;
                        decompile(&source.read_json()?)?
                    }
                };
                let script_src = std::fs::read_to_string(&target.script)
                    .with_context(|| format!("failed to read {}", target.script.display()))?;
                let ops = parse_script(&script_src)?;
                apply_script(&mut tree, &ops)?;
                emit(target.out.as_deref(), &serde_json::to_string_pretty(&compile(&tree))?)?;
                Ok(ExitCode::SUCCESS)
            }
            Command::Store(command) => run_store(command),
        }
    }
}

fn run_store(command: &StoreCommand) -> Result<ExitCode> {
    match command {
        StoreCommand::Save { store, name, input, id } => {
            let mut store = DirStore::open(&store.store_dir)?;
            let source = resolve_inputs([input.as_str()])?
                .pop()
                .ok_or_else(|| anyhow!("no input matched {input}"))?;
            let label = source.label();
            let document = compile(&decompile(&source.read_json()?)?);
            let record = match id {
                Some(id) => store.update(*id, SchemaPatch { name: name.clone(), document: Some(document) })?,
                None => {
                    let name = name.clone().unwrap_or(label);
                    store.create(&name, document)?
                }
            };
            println!("{}", record.id);
        }
        StoreCommand::List { store, page, page_size } => {
            let store = DirStore::open(&store.store_dir)?;
            let page = store.list(Pagination { page: *page, page_size: *page_size })?;
            for record in &page.items {
                println!(
                    "{}  {}  {}",
                    record.id.to_string().dimmed(),
                    record.updated_at.format("%Y-%m-%d %H:%M"),
                    record.name.bold()
                );
            }
            eprintln!("page {}/{} ({} total)", page.page, page.total_pages.max(1), page.total);
        }
        StoreCommand::Show { store, id } => {
            let store = DirStore::open(&store.store_dir)?;
            println!("{}", serde_json::to_string_pretty(&store.get(*id)?.document)?);
        }
        StoreCommand::Delete { store, id } => {
            let mut store = DirStore::open(&store.store_dir)?;
            store.delete(*id)?;
        }
    }
    Ok(ExitCode::SUCCESS)
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn check_one(document: &Value, with_tree: bool) -> Result<Vec<Finding>> {
    let mut findings = check_document(document)?;
    if with_tree {
        findings.extend(check_tree(&decompile(document)?));
    }
    Ok(findings)
}

fn print_report(label: &str, findings: &[Finding]) {
    if findings.is_empty() {
        println!("{} {}", "✓".green(), label.bold());
        return;
    }
    println!("{} {} ({} findings)", "✗".yellow(), label.bold(), findings.len());
    for finding in findings {
        println!("    {}", finding.to_string().yellow());
    }
}

fn emit(out: Option<&Path>, text: &str) -> Result<()> {
    match out {
        Some(out) => {
            if let Some(parent) = out.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(out, text).with_context(|| format!("failed to write {}", out.display()))?;
        }
        None => println!("{text}"),
    }
    Ok(())
}

enum InputSource {
    Stdin,
    File(PathBuf),
}

impl InputSource {
    fn label(&self) -> String {
        match self {
            InputSource::Stdin => "<stdin>".to_string(),
            InputSource::File(path) => path.to_string_lossy().to_string(),
        }
    }

    fn read_json(&self) -> Result<Value> {
        let source = match self {
            InputSource::Stdin => {
                let mut buf = String::new();
                std::io::stdin().read_to_string(&mut buf).context("failed to read stdin")?;
                buf
            }
            InputSource::File(path) => std::fs::read_to_string(path)
                .with_context(|| format!("failed to read source file {}", path.display()))?,
        };
        schema_tree::path_de::from_str_with_path(&source)
            .with_context(|| format!("failed to parse JSON source ({})", self.label()))
    }
}

fn resolve_inputs<I>(patterns: I) -> Result<Vec<InputSource>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    fn has_glob_chars(s: &str) -> bool {
        // Minimal glob detection for the `glob` crate syntax.
        s.bytes().any(|b| matches!(b, b'*' | b'?' | b'[' | b'{'))
    }

    let mut out = Vec::new();
    for raw in patterns {
        let pattern = raw.as_ref();
        if pattern == "-" {
            out.push(InputSource::Stdin);
        } else if has_glob_chars(pattern) {
            let before = out.len();
            for entry in glob::glob(pattern)? {
                out.push(InputSource::File(entry?));
            }
            if out.len() == before {
                // an explicit glob that matched nothing is an error
                bail!("glob pattern matched no files: {pattern}");
            }
        } else {
            out.push(InputSource::File(PathBuf::from(pattern)));
        }
    }
    Ok(out)
}
