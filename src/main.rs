use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use covtrack::cli::{self, Style};
use covtrack::config::{Config, DATAFILE_ENV, DEFAULT_DATAFILE};

/// covtrack: concurrent coverage collection with merge-on-save snapshots.
#[derive(Parser)]
#[command(name = "covtrack", version, about)]
struct Cli {
    /// Path to the coverage data file.
    #[arg(long, global = true, env = DATAFILE_ENV, default_value = DEFAULT_DATAFILE)]
    data_file: PathBuf,

    /// Log debug output to stderr.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay hit-event logs into the data file.
    Record {
        /// One or more hit-event log files.
        #[arg(required = true)]
        logs: Vec<PathBuf>,
    },

    /// Show project and per-package coverage.
    Summary {
        /// Output style.
        #[arg(long, value_enum, default_value = "text")]
        style: Style,

        /// JSON file of complexity scores.
        #[arg(long)]
        scores: Option<PathBuf>,
    },

    /// List packages, optionally only those at or below a prefix.
    Packages {
        /// Package name, e.g. `com.example`; nested packages are included.
        prefix: Option<String>,

        /// JSON file of complexity scores.
        #[arg(long)]
        scores: Option<PathBuf>,
    },

    /// List per-file coverage.
    Files {
        /// Sort by coverage rate ascending (show worst files first).
        #[arg(long)]
        sort_by_coverage: bool,

        /// JSON file of complexity scores.
        #[arg(long)]
        scores: Option<PathBuf>,
    },

    /// Show line-level coverage for a source file.
    Lines {
        /// Source file as stored in the coverage data, e.g. `com/example/Foo.java`.
        source_file: String,

        /// Directory to read the source text from.
        #[arg(long)]
        source_dir: Option<PathBuf>,

        /// Only list uncovered lines, grouped into ranges.
        #[arg(long)]
        uncovered: bool,
    },

    /// Add the hits of another data file into this one.
    Merge {
        /// Data file to read.
        source: PathBuf,

        /// Data file to write (default: --data-file).
        #[arg(long)]
        into: Option<PathBuf>,
    },

    /// Print complexity scores per class.
    Complexity {
        /// JSON file of complexity scores.
        #[arg(long)]
        scores: PathBuf,

        /// Also score individual methods.
        #[arg(long)]
        methods: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let config = Config::with_data_file(&cli.data_file);

    let out = match cli.command {
        Commands::Record { logs } => cli::cmd_record(&config, &logs)?,
        Commands::Summary { style, scores } => {
            let project = cli::load(&config)?;
            let complexity = cli::complexity(&project, scores.as_deref(), &config)?;
            cli::cmd_summary(&project, &complexity, &style)
        }
        Commands::Packages { prefix, scores } => {
            let project = cli::load(&config)?;
            let complexity = cli::complexity(&project, scores.as_deref(), &config)?;
            cli::cmd_packages(&project, &complexity, prefix.as_deref())
        }
        Commands::Files {
            sort_by_coverage,
            scores,
        } => {
            let project = cli::load(&config)?;
            let complexity = cli::complexity(&project, scores.as_deref(), &config)?;
            cli::cmd_files(&project, &complexity, sort_by_coverage)
        }
        Commands::Lines {
            source_file,
            source_dir,
            uncovered,
        } => {
            let project = cli::load(&config)?;
            let source = match source_dir {
                Some(dir) => Some(read_source(&dir, &source_file)?),
                None => None,
            };
            cli::cmd_lines(&project, &source_file, source.as_deref(), uncovered)?
        }
        Commands::Merge { source, into } => {
            let target = into.unwrap_or_else(|| config.data_file.clone());
            cli::cmd_merge(&source, &target)?
        }
        Commands::Complexity { scores, methods } => {
            let config = config.with_method_complexity(methods);
            let project = cli::load(&config)?;
            let complexity = cli::complexity(&project, Some(&scores), &config)?;
            cli::cmd_complexity(&project, &complexity)?
        }
    };
    print!("{}", out);
    Ok(())
}

fn read_source(dir: &Path, source_file: &str) -> Result<String> {
    let path = dir.join(source_file);
    std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read source {}", path.display()))
}
