//! CLI command definitions

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Output format for the run report
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Every document and agent with decisions and warnings
    Full,
    /// Only the run summary
    Summary,
    /// JSON output
    Json,
}

/// CLI arguments for extraction-coach
#[derive(Parser, Debug)]
#[command(name = "extraction-coach")]
#[command(author, version, about = "Coached multi-agent extraction for sectionized annual reports")]
#[command(long_about = r#"
extraction-coach routes the sections of each document to specialized
extraction agents, scores every attempt, and coaches the agents between
rounds. Learning state is kept in a JSONL ledger so it carries across runs.

Documents are JSON files produced by the layout extractor. Reference data
for scoring is read from `<name>.reference.json` next to each document.

Configuration files are loaded from (in priority order):
1. COACH_* environment variables (e.g. COACH_ENGINE__AGENT_CONCURRENCY=8)
2. --config <path>     Explicit config file
3. ./coach.toml        Project-level config
4. ~/.config/extraction-coach/config.toml   Global config

Example:
  extraction-coach reports/brf_81563.json
  extraction-coach reports/ --ledger coach-ledger.jsonl --report run.json
  extraction-coach reports/ --no-advisor -o summary -vv
  extraction-coach reports/ --ledger coach-ledger.jsonl --skip-processed
  extraction-coach --status --ledger coach-ledger.jsonl
"#)]
pub struct Cli {
    /// Sectionized document file, or a directory of them
    #[arg(value_name = "SOURCE", required_unless_present_any = ["show_config", "status"])]
    pub source: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "full")]
    pub output: OutputFormat,

    /// Also write the JSON run report to this file
    #[arg(long, value_name = "PATH")]
    pub report: Option<PathBuf>,

    /// JSONL ledger file (overrides engine.ledger_path)
    #[arg(long, value_name = "PATH")]
    pub ledger: Option<PathBuf>,

    /// JSONL run-event log (overrides engine.event_log)
    #[arg(long, value_name = "PATH")]
    pub event_log: Option<PathBuf>,

    /// Skip documents that already have attempts in the ledger
    #[arg(long)]
    pub skip_processed: bool,

    /// Print the learning status recorded in the ledger and exit
    #[arg(long)]
    pub status: bool,

    /// Coaching sessions listed by --status
    #[arg(long, value_name = "N", default_value_t = 10)]
    pub recent: usize,

    /// Decide with the deterministic fallback only
    #[arg(long)]
    pub no_advisor: bool,

    /// Documents processed at the same time (overrides engine.document_concurrency)
    #[arg(long, value_name = "N")]
    pub document_concurrency: Option<usize>,

    /// Agents dispatched together per document (overrides engine.agent_concurrency)
    #[arg(long, value_name = "N")]
    pub agent_concurrency: Option<usize>,

    /// Verbosity level (-v = info, -vv = debug, -vvv = trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress progress indicators
    #[arg(short, long)]
    pub quiet: bool,

    /// Write diagnostic logs to a daily file in this directory
    #[arg(long, value_name = "DIR")]
    pub log_dir: Option<PathBuf>,

    /// Path to configuration file
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Disable loading of configuration files
    #[arg(long)]
    pub no_config: bool,

    /// Show configuration file locations and exit
    #[arg(long)]
    pub show_config: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal() {
        let cli = Cli::try_parse_from(["extraction-coach", "reports/"]).unwrap();
        assert_eq!(cli.source, Some(PathBuf::from("reports/")));
        assert_eq!(cli.output, OutputFormat::Full);
        assert!(!cli.no_advisor);
        assert_eq!(cli.verbose, 0);
    }

    #[test]
    fn test_parse_overrides() {
        let cli = Cli::try_parse_from([
            "extraction-coach",
            "doc.json",
            "-o",
            "json",
            "--ledger",
            "ledger.jsonl",
            "--document-concurrency",
            "3",
            "--no-advisor",
            "-vv",
        ])
        .unwrap();
        assert_eq!(cli.output, OutputFormat::Json);
        assert_eq!(cli.ledger, Some(PathBuf::from("ledger.jsonl")));
        assert_eq!(cli.document_concurrency, Some(3));
        assert!(cli.no_advisor);
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn test_source_required_unless_show_config() {
        assert!(Cli::try_parse_from(["extraction-coach"]).is_err());
        let cli = Cli::try_parse_from(["extraction-coach", "--show-config"]).unwrap();
        assert!(cli.show_config);
        assert!(cli.source.is_none());
    }

    #[test]
    fn test_status_needs_no_source() {
        let cli = Cli::try_parse_from([
            "extraction-coach",
            "--status",
            "--ledger",
            "ledger.jsonl",
            "--recent",
            "3",
        ])
        .unwrap();
        assert!(cli.status);
        assert!(cli.source.is_none());
        assert_eq!(cli.recent, 3);
        assert!(!cli.skip_processed);
    }

    #[test]
    fn test_parse_skip_processed() {
        let cli = Cli::try_parse_from(["extraction-coach", "reports/", "--skip-processed"]).unwrap();
        assert!(cli.skip_processed);
        assert!(!cli.status);
        assert_eq!(cli.recent, 10);
    }
}
