//! CLI command definitions and argument parsing.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Scout - Enrich entities with web search and an LLM.
#[derive(Debug, Parser)]
#[command(name = "scout")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Output format
    #[arg(short, long, value_enum, global = true)]
    pub format: Option<CliFormat>,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Configuration file path (defaults to ~/.scout/config.toml)
    #[arg(short, long, global = true, env = "SCOUT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum CliFormat {
    /// Table format (default)
    Table,
    /// JSON format
    Json,
}

/// CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Search and extract fields for every entity in a file
    Run(RunArgs),

    /// Inspect or clean the result cache
    Cache(CacheArgs),
}

/// Arguments for the run command.
#[derive(Debug, Parser)]
pub struct RunArgs {
    /// JSON file with an array of entities, or `-` for stdin
    #[arg(short, long)]
    pub entities: PathBuf,

    /// Search query template, e.g. "{company} contact email"
    #[arg(short, long)]
    pub query_template: String,

    /// Extraction prompt template
    #[arg(short, long)]
    pub prompt_template: String,

    /// Field to extract (repeatable or comma-separated)
    #[arg(long = "field", required = true, value_delimiter = ',')]
    pub fields: Vec<String>,

    /// Write results to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Override the configured worker concurrency
    #[arg(long)]
    pub concurrency: Option<usize>,
}

/// Arguments for cache management.
#[derive(Debug, Parser)]
pub struct CacheArgs {
    #[command(subcommand)]
    pub action: CacheAction,
}

/// Cache management actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
pub enum CacheAction {
    /// Show entry count and size
    Stats,

    /// Delete expired and unreadable entries
    Purge,

    /// Delete every entry
    Clear,
}

impl From<CliFormat> for crate::config::OutputFormat {
    fn from(format: CliFormat) -> Self {
        match format {
            CliFormat::Table => crate::config::OutputFormat::Table,
            CliFormat::Json => crate::config::OutputFormat::Json,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_command() {
        let cli = Cli::parse_from([
            "scout",
            "run",
            "--entities",
            "companies.json",
            "--query-template",
            "{company} contact email",
            "--prompt-template",
            "Find the contact email of {company}.",
            "--field",
            "email",
            "--field",
            "phone,website",
        ]);

        match cli.command {
            Command::Run(args) => {
                assert_eq!(args.entities, PathBuf::from("companies.json"));
                assert_eq!(args.query_template, "{company} contact email");
                assert_eq!(args.fields, ["email", "phone", "website"]);
                assert!(args.output.is_none());
            }
            _ => panic!("Expected Run command"),
        }
        assert!(!cli.verbose);
    }

    #[test]
    fn test_run_requires_field() {
        let result = Cli::try_parse_from([
            "scout",
            "run",
            "-e",
            "companies.json",
            "-q",
            "{company}",
            "-p",
            "Extract.",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cache_command_with_global_flags() {
        let cli = Cli::parse_from(["scout", "cache", "stats", "--format", "json", "-v"]);
        match cli.command {
            Command::Cache(args) => assert_eq!(args.action, CacheAction::Stats),
            _ => panic!("Expected Cache command"),
        }
        assert_eq!(cli.format, Some(CliFormat::Json));
        assert!(cli.verbose);
    }

    #[test]
    fn test_format_conversion() {
        let format: crate::config::OutputFormat = CliFormat::Json.into();
        assert_eq!(format, crate::config::OutputFormat::Json);
    }
}
