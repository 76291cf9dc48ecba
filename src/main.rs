//! matrix-history: version history diff tool for flow matrices
//!
//! Compares matrix snapshots, assesses the risk of a change, pages through
//! large diffs, compresses snapshots and searches entries.

#![allow(clippy::too_many_lines, clippy::struct_excessive_bools)]

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use matrix_history::{
    cli::{self, exit_codes, DiffCommand, PageCommand, SearchCommand},
    config::{AppConfig, ConfigPreset, Validatable},
    diff::{ChangeType, DiffFilters, ImpactLevel, PaginationOptions, SortBy, SortOrder},
    model::EntryField,
    reports::ReportFormat,
};
use std::io;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "matrix-history")]
#[command(version)]
#[command(about = "Version history diff tool for flow matrices", long_about = None)]
#[command(after_help = "EXIT CODES:
    0  No changes detected
    1  Changes detected / no search hits
    2  Critical risk detected (with --fail-on-critical)
    3  Error occurred

EXAMPLES:
    # CSV export of the changes between two snapshots
    matrix-history diff v3.json v4.json -o csv

    # CI gate on risky changes
    matrix-history impact v3.json v4.json --fail-on-critical

    # Second page of modified rules, most changed first
    matrix-history page v3.json v4.json --page 2 --type modified --sort-by changes --order desc

    # Search rule text
    matrix-history search v4.json \"backup server\"")]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Path to configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Start from a named preset (default, low-memory, high-throughput)
    #[arg(long, global = true)]
    preset: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

// ============================================================================
// Command argument structs
// ============================================================================

/// Snapshot pair shared by diff-based commands
#[derive(Parser)]
struct SnapshotPair {
    /// Path to the older snapshot
    old: PathBuf,

    /// Path to the newer snapshot
    new: PathBuf,

    /// Matrix id used for export file names
    #[arg(long, default_value_t = 0)]
    matrix_id: i64,

    /// Include unchanged entries in the diff
    #[arg(long)]
    include_unchanged: bool,

    /// Exit with code 2 when the change is critical
    #[arg(long)]
    fail_on_critical: bool,
}

impl SnapshotPair {
    fn command(&self, quiet: bool) -> DiffCommand {
        DiffCommand {
            old: self.old.clone(),
            new: self.new.clone(),
            matrix_id: self.matrix_id,
            include_unchanged: self.include_unchanged,
            fail_on_critical: self.fail_on_critical,
            quiet,
        }
    }
}

/// Arguments for the `diff` subcommand
#[derive(Parser)]
struct DiffArgs {
    #[command(flatten)]
    pair: SnapshotPair,

    /// Export format (json, csv, markdown)
    #[arg(short, long, default_value = "json")]
    output: ReportFormat,

    /// Output file path (stdout if not specified)
    #[arg(short = 'O', long, conflicts_with = "output_dir")]
    output_file: Option<PathBuf>,

    /// Write into this directory under the standard export file name
    #[arg(long)]
    output_dir: Option<PathBuf>,
}

/// Arguments for the `impact` subcommand
#[derive(Parser)]
struct ImpactArgs {
    #[command(flatten)]
    pair: SnapshotPair,

    /// Emit JSON instead of text
    #[arg(long)]
    json: bool,

    /// Output file path (stdout if not specified)
    #[arg(short = 'O', long)]
    output_file: Option<PathBuf>,
}

/// Arguments for the `page` subcommand
#[derive(Parser)]
struct PageArgs {
    #[command(flatten)]
    pair: SnapshotPair,

    /// 1-based page number
    #[arg(long, default_value_t = 1)]
    page: usize,

    /// Entries per page (defaults to the configured page size)
    #[arg(long)]
    page_size: Option<usize>,

    #[arg(long, value_enum, default_value = "id")]
    sort_by: SortBy,

    #[arg(long, value_enum, default_value = "asc")]
    order: SortOrder,

    /// Keep only these change types (repeatable)
    #[arg(long = "type", value_parser = parse_change_type)]
    types: Vec<ChangeType>,

    /// Case-insensitive text filter
    #[arg(long)]
    search: Option<String>,

    /// Keep only entries of this impact level
    #[arg(long, value_enum)]
    impact: Option<ImpactLevel>,

    /// Include render-cost estimates
    #[arg(long)]
    metrics: bool,

    /// Output file path (stdout if not specified)
    #[arg(short = 'O', long)]
    output_file: Option<PathBuf>,
}

/// Arguments for the `search` subcommand
#[derive(Parser)]
struct SearchArgs {
    /// Snapshot to index
    snapshot: PathBuf,

    /// Query text
    query: String,

    #[arg(long, default_value_t = 0)]
    matrix_id: i64,

    #[arg(long)]
    case_sensitive: bool,

    /// Only match whole words
    #[arg(long)]
    whole_words: bool,

    /// Widen every term to index terms containing it
    #[arg(long)]
    fuzzy: bool,

    /// Typo-tolerant search with spelling suggestions
    #[arg(long, conflicts_with_all = ["case_sensitive", "whole_words", "fuzzy"])]
    suggest: bool,

    /// Edit distance for --suggest
    #[arg(long, requires = "suggest")]
    max_distance: Option<usize>,

    /// Only return entries with this field populated (repeatable)
    #[arg(long = "require", value_parser = parse_field)]
    required_fields: Vec<EntryField>,

    /// Maximum number of results
    #[arg(short, long)]
    limit: Option<usize>,

    /// Output file path (stdout if not specified)
    #[arg(short = 'O', long)]
    output_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Export the diff between two snapshots
    Diff(DiffArgs),

    /// Assess the risk of the changes between two snapshots
    Impact(ImpactArgs),

    /// Show one filtered, sorted page of a diff as JSON
    Page(PageArgs),

    /// Compress a snapshot file
    Compress {
        snapshot: PathBuf,

        /// Emit the compact cache form instead of the JSON envelope
        #[arg(long)]
        cache_form: bool,

        /// Output file path (stdout if not specified)
        #[arg(short = 'O', long)]
        output_file: Option<PathBuf>,
    },

    /// Restore a compressed snapshot
    Decompress {
        input: PathBuf,

        /// Output file path (stdout if not specified)
        #[arg(short = 'O', long)]
        output_file: Option<PathBuf>,
    },

    /// Estimate whether a snapshot is worth compressing
    Analyze {
        snapshot: PathBuf,

        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Search entries of a snapshot
    Search(SearchArgs),

    /// Complete a term prefix from a snapshot's index
    Autocomplete {
        snapshot: PathBuf,

        prefix: String,

        #[arg(long, default_value_t = 0)]
        matrix_id: i64,

        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },

    /// Generate JSON Schema for the config file format
    ConfigSchema {
        /// Write schema to file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show, discover, or initialize configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Sub-subcommands for the `config` command
#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Print the discovered config file
    Path,
    /// Generate an example .matrix-history.yaml in the current directory
    Init,
}

fn parse_change_type(s: &str) -> Result<ChangeType, String> {
    ChangeType::from_label(s)
        .ok_or_else(|| format!("unknown change type '{s}' (added, removed, modified, unchanged)"))
}

fn parse_field(s: &str) -> Result<EntryField, String> {
    EntryField::from_name(s).ok_or_else(|| format!("unknown field '{s}'"))
}

/// Effective configuration: preset or file, then validated.
fn load_config(cli: &Cli) -> Result<AppConfig> {
    let config = match cli.preset.as_deref() {
        Some(name) => {
            let preset = ConfigPreset::from_name(name)
                .with_context(|| format!("unknown preset '{name}'"))?;
            AppConfig::from_preset(preset)
        }
        None => matrix_history::config::load_or_default(cli.config.as_deref()).0,
    };

    let errors = config.validate();
    if !errors.is_empty() {
        for error in &errors {
            tracing::error!("{error}");
        }
        anyhow::bail!("configuration has {} invalid value(s)", errors.len());
    }
    Ok(config)
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "warn"
    } else {
        "info"
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.to_string()),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(io::stderr))
        .init();

    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(error) => {
            eprintln!("Error: {error:#}");
            std::process::exit(exit_codes::ERROR);
        }
    }
}

fn run(cli: Cli) -> Result<i32> {
    let config = load_config(&cli)?;

    match cli.command {
        Commands::Diff(args) => cli::run_diff(
            &args.pair.command(cli.quiet),
            args.output,
            args.output_file,
            args.output_dir,
        ),

        Commands::Impact(args) => {
            cli::run_impact(&args.pair.command(cli.quiet), args.json, args.output_file)
        }

        Commands::Page(args) => {
            let options = PaginationOptions::default()
                .page(args.page)
                .page_size(args.page_size.unwrap_or(config.pagination.default_page_size))
                .sort(args.sort_by, args.order)
                .filters(DiffFilters {
                    types: (!args.types.is_empty()).then_some(args.types),
                    search: args.search,
                    impact_level: args.impact,
                });
            let page = PageCommand {
                options,
                pagination: config.pagination,
                metrics: args.metrics,
            };
            cli::run_page(&args.pair.command(cli.quiet), &page, args.output_file)
        }

        Commands::Compress {
            snapshot,
            cache_form,
            output_file,
        } => cli::run_compress(&snapshot, config.compression, cache_form, output_file),

        Commands::Decompress { input, output_file } => cli::run_decompress(&input, output_file),

        Commands::Analyze { snapshot, json } => cli::run_analyze(&snapshot, config.compression, json),

        Commands::Search(args) => {
            let command = SearchCommand {
                snapshot: args.snapshot,
                matrix_id: args.matrix_id,
                query: args.query,
                case_sensitive: args.case_sensitive,
                whole_words: args.whole_words,
                fuzzy: args.fuzzy,
                suggest: args.suggest,
                max_distance: args.max_distance,
                required_fields: args.required_fields,
                limit: args.limit,
            };
            cli::run_search(&command, config.search, args.output_file)
        }

        Commands::Autocomplete {
            snapshot,
            prefix,
            matrix_id,
            limit,
        } => cli::run_autocomplete(&snapshot, matrix_id, &prefix, limit, config.search),

        Commands::Completions { shell } => {
            generate(shell, &mut Cli::command(), "matrix-history", &mut io::stdout());
            Ok(exit_codes::SUCCESS)
        }

        Commands::ConfigSchema { output } => {
            let schema = matrix_history::config::generate_json_schema();
            match output {
                Some(path) => {
                    std::fs::write(&path, &schema)
                        .with_context(|| format!("failed to write {}", path.display()))?;
                    eprintln!("Schema written to {}", path.display());
                }
                None => println!("{schema}"),
            }
            Ok(exit_codes::SUCCESS)
        }

        Commands::Config { action } => match action {
            ConfigAction::Show => {
                let yaml = serde_yaml::to_string(&config).context("failed to serialize config")?;
                print!("{yaml}");
                Ok(exit_codes::SUCCESS)
            }
            ConfigAction::Path => {
                match matrix_history::config::discover_config_file(cli.config.as_deref()) {
                    Some(path) => eprintln!("Active config file: {}", path.display()),
                    None => eprintln!("No config file found."),
                }
                Ok(exit_codes::SUCCESS)
            }
            ConfigAction::Init => {
                let target = std::env::current_dir()
                    .context("cannot determine current directory")?
                    .join(".matrix-history.yaml");
                if target.exists() {
                    anyhow::bail!(
                        "{} already exists. Remove it first to re-initialize.",
                        target.display()
                    );
                }
                std::fs::write(&target, matrix_history::config::generate_example_config())
                    .with_context(|| format!("failed to write {}", target.display()))?;
                eprintln!("Created {}", target.display());
                Ok(exit_codes::SUCCESS)
            }
        },
    }
}
