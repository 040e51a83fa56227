// src/cli.rs
// =============================================================================
// This file defines our command-line interface using the `clap` crate.
//
// We use the "derive" API which lets us define the CLI structure using
// Rust structs and attributes (the #[...] things).
//
// Every flag that mirrors a config file setting is an Option, so "not given
// on the command line" can fall back to the config file value.
// =============================================================================

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "site-guardian",
    version,
    about = "Check whether a list of websites is up, how fast they answer, and whether they use HTTPS",
    long_about = "site-guardian reads a list of URLs (one per line), checks them a few at a time, \
                  and prints a report. The report can also be sent by e-mail through a relay service."
)]
pub struct Cli {
    /// Path to a JSON config file (default: ./site-guardian.json if present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check every site listed in a file
    ///
    /// Example: site-guardian check data/websites.csv --concurrency 10
    Check(CheckArgs),

    /// List the preset target files from the config
    Presets,
}

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// File with one URL per line (lines starting with # are comments)
    #[arg(required_unless_present = "preset", conflicts_with = "preset")]
    pub file: Option<PathBuf>,

    /// Use a named target file from the config's "presets"
    #[arg(long)]
    pub preset: Option<String>,

    /// How many sites to check at the same time
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Deadline for each site, in milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Count any connection failure as DOWN, without the HEAD fallback request
    #[arg(long)]
    pub strict: bool,

    /// Do not show whether sites use HTTPS
    #[arg(long)]
    pub no_ssl: bool,

    /// Do not show latency
    #[arg(long)]
    pub no_latency: bool,

    /// Output results in JSON format instead of a table
    #[arg(long)]
    pub json: bool,

    /// E-mail the report through the configured mail relay when done
    #[arg(long)]
    pub send_report: bool,

    /// Report recipient (overrides email_recipient from the config)
    #[arg(long, value_name = "EMAIL")]
    pub to: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_check_with_file() {
        let cli = Cli::parse_from(["site-guardian", "check", "sites.txt", "--concurrency", "3", "--json"]);
        match cli.command {
            Commands::Check(args) => {
                assert_eq!(args.file, Some(PathBuf::from("sites.txt")));
                assert_eq!(args.concurrency, Some(3));
                assert!(args.json);
                assert!(!args.strict);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_file_or_preset_required() {
        assert!(Cli::try_parse_from(["site-guardian", "check"]).is_err());
        assert!(Cli::try_parse_from(["site-guardian", "check", "--preset", "Main"]).is_ok());
        assert!(Cli::try_parse_from(["site-guardian", "check", "a.txt", "--preset", "Main"]).is_err());
    }

    #[test]
    fn test_global_config_flag() {
        let cli = Cli::parse_from(["site-guardian", "presets", "--config", "my.json"]);
        assert_eq!(cli.config, Some(PathBuf::from("my.json")));
    }
}
