// src/cli.rs

use clap::{Args, Parser};
#[cfg(feature = "web")]
use clap::Subcommand;

/// Turns a Git repository reference into a single LLM-friendly text digest.
///
/// repodigest resolves a repository reference (`owner/repo`, a host URL, or a
/// `/tree/<branch>/<path>` link), fetches a snapshot of it, and prints a
/// summary, a directory tree and the concatenated contents of every file that
/// passes the size and pattern filters.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
#[command(args_conflicts_with_subcommands = true, subcommand_negates_reqs = true)]
pub struct Cli {
    #[cfg(feature = "web")]
    #[command(subcommand)]
    pub command: Option<Command>,

    #[command(flatten)]
    pub ingest: IngestArgs,
}

#[cfg(feature = "web")]
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Serve the ingestion API over HTTP.
    Serve {
        /// Port to listen on (localhost only).
        #[arg(short, long, default_value_t = 3000)]
        port: u16,
    },
}

/// Options for a single ingestion run.
#[derive(Args, Debug, Clone, Default)]
pub struct IngestArgs {
    /// Repository reference: `owner/repo`, `host/owner/repo`, or a full URL
    /// (optionally with `/tree/<branch>/<path>`).
    #[arg(required = true, value_name = "REFERENCE")]
    pub reference: Option<String>,

    // --- Source Options ---
    /// Branch to fetch, overriding any branch in the reference.
    #[arg(short = 'b', long, value_name = "BRANCH")]
    pub branch: Option<String>,

    /// Access token for private repositories. Falls back to <PROVIDER>_TOKEN.
    #[arg(short = 't', long, value_name = "TOKEN")]
    pub token: Option<String>,

    /// Acquisition strategy: disk (git clone), virtual (in-memory fetch) or api (GitHub API).
    #[arg(short = 's', long, value_name = "STRATEGY", default_value = "disk")]
    pub strategy: String,

    /// CORS relay prefixed to Git URLs by the virtual strategy.
    #[arg(long, value_name = "URL")]
    pub cors_proxy: Option<String>,

    /// Give up after this many seconds (default 60).
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    // --- Filtering Options ---
    /// Maximum file size to include (e.g., "50k", "1MiB"). Larger files are skipped.
    #[arg(short = 'm', long, value_name = "BYTES", conflicts_with = "slider")]
    pub max_size: Option<String>,

    /// Maximum file size as a slider position from 1 to 500 (default 243, about 50 KB).
    #[arg(long, value_name = "POSITION")]
    pub slider: Option<u32>,

    /// Keep only files matching these glob patterns (repeatable).
    #[arg(short = 'i', long = "include", value_name = "GLOB", num_args = 1..)]
    pub include_patterns: Vec<String>,

    /// Skip files matching these glob patterns, in addition to the built-in ignores.
    #[arg(short = 'e', long = "exclude", value_name = "GLOB", num_args = 1..)]
    pub exclude_patterns: Vec<String>,

    // --- Output Options ---
    /// Write the digest to the specified file instead of stdout.
    #[arg(short = 'o', long, value_name = "FILE")]
    pub output_file: Option<String>,

    /// Do not draw a progress bar on stderr.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub no_progress: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_debug_assert() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::parse_from(["repodigest", "octocat/Hello-World"]);
        assert_eq!(cli.ingest.reference.as_deref(), Some("octocat/Hello-World"));
        assert_eq!(cli.ingest.strategy, "disk");
        assert!(cli.ingest.include_patterns.is_empty());
        assert!(!cli.ingest.no_progress);
    }

    #[test]
    fn test_reference_is_required() {
        assert!(Cli::try_parse_from(["repodigest"]).is_err());
    }

    #[test]
    fn test_max_size_conflicts_with_slider() {
        assert!(Cli::try_parse_from(["repodigest", "o/r", "-m", "1k", "--slider", "3"]).is_err());
    }

    #[cfg(feature = "web")]
    #[test]
    fn test_serve_subcommand() {
        let cli = Cli::parse_from(["repodigest", "serve", "--port", "8080"]);
        assert_eq!(cli.command, Some(Command::Serve { port: 8080 }));
        assert!(cli.ingest.reference.is_none());
    }
}
