use std::path::PathBuf;

use clap::Parser;

/// Download Instagram stories through a web unlock service.
#[derive(Parser, Debug, Default)]
#[command(name = "mediagrab", author, version, about)]
pub struct Cli {
    /// File with one source URL per line
    #[arg(default_value = "urls.txt")]
    pub urls_file: PathBuf,

    /// RON file with pipeline settings; command-line flags win over it
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Root directory for per-user downloads
    #[arg(long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Number of browser workers
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u16).range(1..))]
    pub parallel: Option<u16>,

    /// Extra download attempts per media URL
    #[arg(long, value_name = "N")]
    pub retries: Option<u32>,

    /// Timeout for page navigation and waiting for results
    #[arg(long, value_name = "SECS")]
    pub nav_timeout_secs: Option<u64>,

    /// Timeout for one media download request
    #[arg(long, value_name = "SECS")]
    pub request_timeout_secs: Option<u64>,

    /// Show the browser window
    #[arg(long)]
    pub headed: bool,

    /// Chrome or Chromium executable to launch
    #[arg(long, value_name = "PATH")]
    pub chrome: Option<PathBuf>,

    /// Also append log output to this file
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long)]
    pub verbose: bool,
}
