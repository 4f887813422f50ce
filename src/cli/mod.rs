pub mod format;
pub mod toml_config;

use crate::config::Config;
use crate::dispatch::{self, DispatchError};
use crate::process::ProcessFileResult;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use toml_config::LayoutSetting;

#[derive(Parser, Debug)]
#[command(
    name = "textfiddle",
    version,
    about = "Keep, delete or rewrite lines of text files with ordered regex rules"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase log verbosity (-v, -vv, -vvv). RUST_LOG takes precedence.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Disable logging.
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Apply a rules file to files or directories.
    Run {
        /// Files or directories to process.
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Rules file.
        #[arg(short, long, default_value = "textfiddle.toml")]
        config: PathBuf,

        /// Overwrite the original files.
        #[arg(long, conflicts_with = "output_dir")]
        in_place: bool,

        /// Write processed files into this directory.
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// How output paths are derived inside the output directory.
        #[arg(long, value_enum)]
        layout: Option<LayoutSetting>,

        /// Worker threads for directories (0 = one per CPU, 1 = sequential).
        #[arg(short = 'j', long)]
        threads: Option<usize>,

        /// Only process files whose name matches this glob.
        #[arg(short, long)]
        pattern: Option<String>,

        /// Do not descend into subdirectories.
        #[arg(long)]
        no_recursive: bool,

        /// Output format.
        #[arg(long, value_enum, default_value_t = OutputFormat::Pretty)]
        format: OutputFormat,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Pretty,
    Json,
}

/// Process each target: directories are walked with `pattern`/`recursive`,
/// anything else goes through `process_path`. Roots and pattern are checked
/// up front so a fatal error leaves every file untouched.
pub fn run_targets(
    config: &Config,
    paths: &[PathBuf],
    pattern: &str,
    recursive: bool,
) -> Result<Vec<ProcessFileResult>, DispatchError> {
    dispatch::check_roots(paths)?;
    dispatch::check_pattern(pattern)?;

    let mut results = Vec::new();
    for path in paths {
        let mut batch = if path.is_dir() {
            dispatch::process_directory(config, path, pattern, recursive)?
        } else {
            dispatch::process_path(config, path)?
        };
        results.append(&mut batch);
    }
    Ok(results)
}

/// Install the tracing subscriber. `RUST_LOG` overrides the verbosity flag.
pub fn setup_logging(verbose: u8, quiet: bool) {
    if quiet {
        return;
    }

    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        match verbose {
            0 => tracing_subscriber::EnvFilter::new("warn"),
            1 => tracing_subscriber::EnvFilter::new("info,ignore=warn,globset=warn"),
            2 => tracing_subscriber::EnvFilter::new("debug,ignore=warn,globset=warn"),
            _ => tracing_subscriber::EnvFilter::new("trace"),
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_run_flags() {
        let cli = Cli::try_parse_from([
            "textfiddle", "-vv", "run", "logs", "a.txt", "-c", "rules.toml", "-j", "4", "--pattern",
            "*.log", "--format", "json",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        let Commands::Run {
            paths,
            config,
            threads,
            pattern,
            format,
            in_place,
            ..
        } = cli.command;
        assert_eq!(paths, [PathBuf::from("logs"), PathBuf::from("a.txt")]);
        assert_eq!(config, PathBuf::from("rules.toml"));
        assert_eq!(threads, Some(4));
        assert_eq!(pattern.as_deref(), Some("*.log"));
        assert_eq!(format, OutputFormat::Json);
        assert!(!in_place);
    }

    #[test]
    fn bad_later_target_leaves_earlier_files_untouched() {
        use crate::config::Output;
        use crate::rules::{Rule, RuleAction};
        use std::fs;
        use tempfile::TempDir;

        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("a.log");
        fs::write(&file, "drop me\n").unwrap();
        let config = Config::new(vec![Rule::new(RuleAction::Delete)], Output::InPlace);

        let missing = [file.clone(), tmp.path().join("missing")];
        let err = run_targets(&config, &missing, "*", true).unwrap_err();
        assert!(matches!(err, DispatchError::NotFound(_)));
        assert_eq!(fs::read_to_string(&file).unwrap(), "drop me\n");

        let err = run_targets(&config, &[file.clone()], "[", true).unwrap_err();
        assert!(matches!(err, DispatchError::InvalidGlob(_)));
        assert_eq!(fs::read_to_string(&file).unwrap(), "drop me\n");

        let results = run_targets(&config, &[file.clone()], "*", true).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(fs::read_to_string(&file).unwrap(), "");
    }

    #[test]
    fn in_place_conflicts_with_output_dir() {
        let err = Cli::try_parse_from(["textfiddle", "run", "x", "--in-place", "-o", "out"]);
        assert!(err.is_err());
    }
}
