//! Layered settings: built-in defaults, then the optional RON file, then the
//! command line.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use grab_engine::PipelineConfig;
use ron::extensions::Extensions;
use serde::Deserialize;

use crate::cli::Cli;

pub const DEFAULT_OUTPUT_ROOT: &str = "downloads";

/// On-disk settings. Every field is optional; `Some(..)` may be omitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub output: Option<PathBuf>,
    pub diagnostics_dir: Option<PathBuf>,
    pub parallel: Option<usize>,
    pub retries: Option<u32>,
    pub nav_timeout_secs: Option<u64>,
    pub request_timeout_secs: Option<u64>,
    pub connect_timeout_secs: Option<u64>,
    pub headless: Option<bool>,
    pub chrome: Option<PathBuf>,
    pub service_url: Option<String>,
    pub user_agent: Option<String>,
    pub log_file: Option<PathBuf>,
}

impl FileConfig {
    pub fn parse(content: &str) -> Result<Self> {
        let config = ron::Options::default()
            .with_default_extension(Extensions::IMPLICIT_SOME)
            .from_str(content)?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("cannot read config file {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("malformed config file {}", path.display()))
    }
}

/// Everything `main` needs after startup validation.
#[derive(Debug)]
pub struct Settings {
    pub pipeline: PipelineConfig,
    pub log_file: Option<PathBuf>,
}

pub fn resolve(cli: &Cli, file: FileConfig) -> Result<Settings> {
    let output = cli
        .output
        .clone()
        .or(file.output)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_ROOT));
    let mut pipeline = PipelineConfig::default_with_output(output);

    if let Some(dir) = file.diagnostics_dir {
        pipeline.diagnostics_dir = dir;
    }

    let parallel = cli.parallel.map(usize::from).or(file.parallel);
    match parallel {
        Some(0) => bail!("parallelism must be at least 1"),
        Some(n) => pipeline.parallelism = n,
        None => {}
    }

    if let Some(retries) = cli.retries.or(file.retries) {
        pipeline.fetch.retries = retries;
    }
    if let Some(secs) = cli.nav_timeout_secs.or(file.nav_timeout_secs) {
        pipeline.navigation_timeout = Duration::from_secs(secs);
    }
    if let Some(secs) = cli.request_timeout_secs.or(file.request_timeout_secs) {
        pipeline.fetch.request_timeout = Duration::from_secs(secs);
    }
    if let Some(secs) = file.connect_timeout_secs {
        pipeline.fetch.connect_timeout = Duration::from_secs(secs);
    }
    if let Some(agent) = file.user_agent {
        pipeline.fetch.user_agent = agent;
    }

    if cli.headed {
        pipeline.chrome.headless = false;
    } else if let Some(headless) = file.headless {
        pipeline.chrome.headless = headless;
    }
    if let Some(executable) = cli.chrome.clone().or(file.chrome) {
        pipeline.chrome.executable = Some(executable);
    }

    if let Some(url) = file.service_url {
        pipeline.site.service_url = url;
    }

    Ok(Settings {
        pipeline,
        log_file: cli.log_file.clone().or(file.log_file),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_file_or_flags() {
        let settings = resolve(&Cli::default(), FileConfig::default()).unwrap();
        let pipeline = settings.pipeline;
        assert_eq!(pipeline.output_root, PathBuf::from("downloads"));
        assert_eq!(pipeline.diagnostics_dir, PathBuf::from("downloads").join(".debug"));
        assert_eq!(pipeline.parallelism, 2);
        assert_eq!(pipeline.fetch.retries, 2);
        assert!(pipeline.chrome.headless);
        assert!(settings.log_file.is_none());
    }

    #[test]
    fn file_values_apply_and_flags_win() {
        let file = FileConfig::parse(
            r#"(
                output: "from_file",
                parallel: 4,
                retries: 1,
                headless: false,
                service_url: "https://unlock.example/",
            )"#,
        )
        .unwrap();
        let cli = Cli {
            parallel: Some(3),
            ..Cli::default()
        };

        let pipeline = resolve(&cli, file).unwrap().pipeline;
        assert_eq!(pipeline.output_root, PathBuf::from("from_file"));
        assert_eq!(pipeline.parallelism, 3);
        assert_eq!(pipeline.fetch.retries, 1);
        assert!(!pipeline.chrome.headless);
        assert_eq!(pipeline.site.service_url, "https://unlock.example/");
    }

    #[test]
    fn explicit_some_is_accepted_too() {
        let file = FileConfig::parse("(nav_timeout_secs: Some(30))").unwrap();
        assert_eq!(file.nav_timeout_secs, Some(30));
    }

    #[test]
    fn zero_parallelism_in_file_is_rejected() {
        let file = FileConfig::parse("(parallel: 0)").unwrap();
        assert!(resolve(&Cli::default(), file).is_err());
    }

    #[test]
    fn unknown_or_malformed_fields_fail() {
        assert!(FileConfig::parse("(parallel: \"two\")").is_err());
        assert!(FileConfig::parse("(paralel: 2)").is_err());
    }

    #[test]
    fn missing_config_file_is_an_error() {
        let temp = tempfile::TempDir::new().unwrap();
        let err = FileConfig::load(&temp.path().join("absent.ron")).unwrap_err();
        assert!(err.to_string().contains("absent.ron"));
    }
}
