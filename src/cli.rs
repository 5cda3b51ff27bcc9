//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Host platform to download as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Platform {
    Desktop,
    Android,
    Ios,
}

/// Download a published resource the way a browser on the chosen platform
/// would.
///
/// Saves into the output directory. Pass a URL, or a resource record
/// (JSON, as exported from the resource store) with --resource.
#[derive(Parser, Debug)]
#[command(name = "resource-dl")]
#[command(author, version, about)]
pub struct Args {
    /// URL of the file to download
    #[arg(conflicts_with = "resource", required_unless_present = "resource")]
    pub url: Option<String>,

    /// Filename to save as (defaults to "download")
    #[arg(short, long)]
    pub name: Option<String>,

    /// Resource record JSON file to download instead of a URL
    #[arg(long, value_name = "FILE")]
    pub resource: Option<PathBuf>,

    /// Directory to save into (default: current directory)
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// User-Agent string to detect the platform from
    #[arg(long, conflicts_with = "platform")]
    pub user_agent: Option<String>,

    /// Platform to download as
    #[arg(long, value_enum)]
    pub platform: Option<Platform>,

    /// Maximum file size in bytes
    #[arg(long, value_name = "BYTES", value_parser = clap::value_parser!(u64).range(1..))]
    pub size_limit: Option<u64>,

    /// Fetch timeout in milliseconds (1-600000)
    #[arg(
        short,
        long,
        value_name = "MS",
        value_parser = clap::value_parser!(u64).range(1..=600_000)
    )]
    pub timeout_ms: Option<u64>,

    /// Use the simple native path: no fetch, no progress
    #[arg(long)]
    pub native: bool,

    /// Refuse to open new browsing contexts (reports a blocked popup)
    #[arg(long)]
    pub no_new_contexts: bool,

    /// Endpoint that counts resource downloads (POST, JSON)
    #[arg(long, value_name = "URL")]
    pub record_endpoint: Option<String>,

    /// Print the outcome as JSON on stdout
    #[arg(long)]
    pub json: bool,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,
}
