//! Gimlet CLI - check and format config files

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::debug;
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

use gimlet::binding::Params;
use gimlet::parser::{parse_statements, Statement, SyntaxDelegate};
use gimlet::render::{render, RenderInput, RenderOptions, Section};
use gimlet::{FixSuggestion, GimletError, Settings, Value};

#[derive(Parser)]
#[command(name = "gimlet")]
#[command(about = "Check and format gimlet config files")]
#[command(version)]
struct Cli {
    /// Log debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Syntax-check config files (directories are searched for *.gin)
    Check {
        /// Files or directories
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Extra binding lines to check, e.g. "train.steps = 10"
        #[arg(short, long = "binding")]
        bindings: Vec<String>,

        /// Settings YAML file
        #[arg(short, long)]
        settings: Option<PathBuf>,
    },

    /// Print the canonical rendering of a config file
    Fmt {
        /// Config file
        file: PathBuf,

        /// Settings YAML file
        #[arg(short, long)]
        settings: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Check {
            paths,
            bindings,
            settings,
        } => check(&paths, &bindings, settings.as_deref()),
        Commands::Fmt { file, settings } => fmt(&file, settings.as_deref()),
    };

    if let Err(e) = result {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        if let Some(suggestion) = e.downcast_ref::<GimletError>().and_then(|g| g.fix_suggestion()) {
            eprintln!("  {} {}", "Fix:".yellow(), suggestion);
        }
        std::process::exit(1);
    }
}

fn load_settings(path: Option<&Path>) -> anyhow::Result<Settings> {
    let settings = match path {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };
    Ok(settings.with_env())
}

/// Config files named by `paths`, directories expanded to their `*.gin`
/// files.
fn collect_files(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for path in paths {
        if !path.is_dir() {
            files.push(path.clone());
            continue;
        }
        let mut found: Vec<PathBuf> = WalkDir::new(path)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .filter(|p| p.extension().map_or(false, |ext| ext == "gin"))
            .collect();
        found.sort();
        files.extend(found);
    }
    files
}

/// Read `path`, trying the settings' search paths for relative names.
fn read_config(path: &Path, settings: &Settings) -> anyhow::Result<(String, String)> {
    let name = path.to_string_lossy();
    for prefix in &settings.search_paths {
        let candidate = gimlet::reader::join_search_path(prefix, &name);
        if Path::new(&candidate).is_file() {
            let text = std::fs::read_to_string(&candidate)
                .with_context(|| format!("reading {}", candidate))?;
            return Ok((candidate, text));
        }
    }
    Err(GimletError::FileNotFound { path: name.into_owned() }.into())
}

fn check(paths: &[PathBuf], bindings: &[String], settings: Option<&Path>) -> anyhow::Result<()> {
    let settings = load_settings(settings)?;
    let files = collect_files(paths);
    let mut failed = 0;

    for file in &files {
        let summary = read_config(file, &settings).and_then(|(origin, text)| {
            let statements = parse_statements(&text, Some(&origin), &SyntaxDelegate)?;
            Ok(summarize(&statements))
        });
        match summary {
            Ok(summary) => println!("{} {}: {}", "✓".green(), file.display(), summary),
            Err(e) => {
                failed += 1;
                println!("{} {}", "✗".red(), file.display());
                eprintln!("{} {:#}", "Error:".red().bold(), e);
            }
        }
    }

    if !bindings.is_empty() {
        let statements = parse_statements(&bindings.join("\n"), None, &SyntaxDelegate)?;
        println!("{} --binding: {}", "✓".green(), summarize(&statements));
    }

    debug!(files = files.len(), failed, "Check finished");
    if failed > 0 {
        anyhow::bail!("{} of {} files failed to parse", failed, files.len());
    }
    Ok(())
}

fn summarize(statements: &[Statement]) -> String {
    let mut counts = [0usize; 3];
    for statement in statements {
        match statement {
            Statement::Binding(_) => counts[0] += 1,
            Statement::Import(_) => counts[1] += 1,
            Statement::Include(_) => counts[2] += 1,
            Statement::Block(_) => {}
        }
    }
    format!("{} bindings, {} imports, {} includes", counts[0], counts[1], counts[2])
}

fn fmt(file: &Path, settings: Option<&Path>) -> anyhow::Result<()> {
    let settings = load_settings(settings)?;
    let (origin, text) = read_config(file, &settings)?;
    let statements = parse_statements(&text, Some(&origin), &SyntaxDelegate)?;

    let mut input = RenderInput::default();
    let mut includes = Vec::new();
    let mut sections: BTreeMap<(String, String), Params> = BTreeMap::new();
    for statement in statements {
        match statement {
            Statement::Binding(binding) if binding.is_macro() => {
                let name = binding.macro_name();
                input.macros.retain(|(existing, _)| *existing != name);
                input.macros.push((name, binding.value));
            }
            Statement::Binding(binding) => {
                sections
                    .entry((binding.scope, binding.selector))
                    .or_default()
                    .insert(binding.param, binding.value);
            }
            Statement::Import(import) => input.imports.push(import),
            Statement::Include(include) => includes.push(include.path),
            Statement::Block(_) => {}
        }
    }
    input.sections = sections
        .into_iter()
        .map(|((scope, selector), params)| Section {
            scope,
            name: selector.clone(),
            selector,
            params,
        })
        .collect();

    for path in &includes {
        println!("include {}", Value::from(path.as_str()));
    }
    if !includes.is_empty() {
        println!();
    }
    print!("{}", render(&input, &RenderOptions::from(&settings), &SyntaxDelegate));
    Ok(())
}
