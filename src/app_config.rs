//! Config file loading and merging with command-line arguments.
//!
//! Precedence: values given on the command line, then the config file, then
//! built-in defaults.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use booru_crawler::{
    CrawlConfig, DedupStrategy, FailurePolicy, ImageFormat, MAX_CONCURRENCY, MAX_QUEUE_DEPTH,
    Rating, SearchQuery, StatusPolicy, default_concurrency,
};
use clap::parser::ValueSource;
use clap::{ArgMatches, CommandFactory, FromArgMatches};
use serde::Deserialize;
use tracing::debug;

use crate::cli::Args;

const APP_DIR: &str = "booru-crawler";

/// TOML-backed defaults for the CLI.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct FileConfig {
    pub(crate) destination: Option<PathBuf>,
    pub(crate) workers: Option<usize>,
    pub(crate) buffer_size: Option<usize>,
    pub(crate) timeout: Option<u64>,
    pub(crate) rating: Option<Rating>,
    pub(crate) format: Option<ImageFormat>,
    pub(crate) page_size: Option<u32>,
    pub(crate) base_url: Option<String>,
    pub(crate) dedup: Option<DedupStrategy>,
    pub(crate) keep_going: Option<bool>,
    pub(crate) lenient_status: Option<bool>,
}

impl FileConfig {
    /// Validates values against the same ranges the CLI enforces.
    pub(crate) fn validate(&self) -> Result<()> {
        if let Some(workers) = self.workers
            && !(1..=MAX_CONCURRENCY).contains(&workers)
        {
            bail!("Invalid config value for `workers`: {workers}. Expected range: 1..={MAX_CONCURRENCY}");
        }
        if let Some(buffer_size) = self.buffer_size
            && !(1..=MAX_QUEUE_DEPTH).contains(&buffer_size)
        {
            bail!(
                "Invalid config value for `buffer_size`: {buffer_size}. Expected range: 1..={MAX_QUEUE_DEPTH}"
            );
        }
        if let Some(timeout) = self.timeout
            && !(1..=3600).contains(&timeout)
        {
            bail!("Invalid config value for `timeout`: {timeout}. Expected range: 1..=3600");
        }
        if let Some(page_size) = self.page_size
            && !(1..=1000).contains(&page_size)
        {
            bail!("Invalid config value for `page_size`: {page_size}. Expected range: 1..=1000");
        }
        if let Some(base_url) = &self.base_url
            && !(base_url.starts_with("http://") || base_url.starts_with("https://"))
        {
            bail!("Invalid config value for `base_url`: '{base_url}'. Expected an http(s) URL");
        }
        Ok(())
    }
}

/// Which arguments were given explicitly on the command line.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct CliValueSources {
    pub(crate) destination: bool,
    pub(crate) workers: bool,
    pub(crate) buffer_size: bool,
    pub(crate) timeout: bool,
    pub(crate) rating: bool,
    pub(crate) format: bool,
    pub(crate) page_size: bool,
    pub(crate) base_url: bool,
    pub(crate) dedup: bool,
    pub(crate) keep_going: bool,
    pub(crate) lenient_status: bool,
}

impl CliValueSources {
    fn from_matches(matches: &ArgMatches) -> Self {
        Self {
            destination: is_commandline_value(matches, "destination"),
            workers: is_commandline_value(matches, "workers"),
            buffer_size: is_commandline_value(matches, "buffer_size"),
            timeout: is_commandline_value(matches, "timeout"),
            rating: is_commandline_value(matches, "rating"),
            format: is_commandline_value(matches, "format"),
            page_size: is_commandline_value(matches, "page_size"),
            base_url: is_commandline_value(matches, "base_url"),
            dedup: is_commandline_value(matches, "dedup"),
            keep_going: is_commandline_value(matches, "keep_going"),
            lenient_status: is_commandline_value(matches, "lenient_status"),
        }
    }
}

/// Parses process arguments, exiting on `--help`, `--version` or errors.
pub(crate) fn parse_cli_with_sources() -> (Args, CliValueSources) {
    let matches = Args::command().get_matches();
    let args = Args::from_arg_matches(&matches).unwrap_or_else(|err| err.exit());
    (args, CliValueSources::from_matches(&matches))
}

#[cfg(test)]
fn try_parse_with_sources<I, T>(argv: I) -> Result<(Args, CliValueSources), clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let matches = Args::command().try_get_matches_from(argv)?;
    let args = Args::from_arg_matches(&matches)?;
    Ok((args, CliValueSources::from_matches(&matches)))
}

fn is_commandline_value(matches: &ArgMatches, id: &str) -> bool {
    matches.value_source(id) == Some(ValueSource::CommandLine)
}

/// Resolves the default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/booru-crawler/config.toml`
/// 2. `$HOME/.config/booru-crawler/config.toml`
#[must_use]
pub(crate) fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(PathBuf::from(xdg_config_home).join(APP_DIR).join("config.toml"));
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join(APP_DIR)
            .join("config.toml"),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads the config file.
///
/// An explicit `--config` path must exist. The default path is optional.
pub(crate) fn load_file_config(explicit: Option<&Path>) -> Result<Option<FileConfig>> {
    if let Some(path) = explicit {
        return read_file_config(path).map(Some);
    }

    let Some(path) = resolve_default_config_path() else {
        return Ok(None);
    };
    if !path.exists() {
        debug!(path = %path.display(), "no config file");
        return Ok(None);
    }
    read_file_config(&path).map(Some)
}

fn read_file_config(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    let config = parse_config_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))?;
    debug!(path = %path.display(), "config file loaded");
    Ok(config)
}

fn parse_config_str(raw: &str) -> Result<FileConfig> {
    let config: FileConfig = toml::from_str(raw)?;
    config.validate()?;
    Ok(config)
}

/// Fills every argument not given on the command line from `file_config`.
pub(crate) fn apply_config_defaults(
    mut args: Args,
    cli_sources: &CliValueSources,
    file_config: Option<&FileConfig>,
) -> Args {
    let Some(file_config) = file_config else {
        return args;
    };

    if !cli_sources.destination
        && let Some(destination) = &file_config.destination
    {
        args.destination = destination.clone();
    }
    if !cli_sources.workers
        && let Some(workers) = file_config.workers
    {
        args.workers = Some(workers);
    }
    if !cli_sources.buffer_size
        && let Some(buffer_size) = file_config.buffer_size
    {
        args.buffer_size = buffer_size;
    }
    if !cli_sources.timeout
        && let Some(timeout) = file_config.timeout
    {
        args.timeout = timeout;
    }
    if !cli_sources.rating
        && let Some(rating) = file_config.rating
    {
        args.rating = rating;
    }
    if !cli_sources.format
        && let Some(format) = file_config.format
    {
        args.format = format;
    }
    if !cli_sources.page_size
        && let Some(page_size) = file_config.page_size
    {
        args.page_size = page_size;
    }
    if !cli_sources.base_url
        && let Some(base_url) = &file_config.base_url
    {
        args.base_url.clone_from(base_url);
    }
    if !cli_sources.dedup
        && let Some(dedup) = file_config.dedup
    {
        args.dedup = dedup;
    }
    if !cli_sources.keep_going
        && let Some(keep_going) = file_config.keep_going
    {
        args.keep_going = keep_going;
    }
    if !cli_sources.lenient_status
        && let Some(lenient_status) = file_config.lenient_status
    {
        args.lenient_status = lenient_status;
    }

    args
}

/// Builds the library configuration from merged arguments.
pub(crate) fn crawl_config_from_args(args: &Args) -> Result<CrawlConfig> {
    let query = SearchQuery::new(args.tags.as_slice(), args.rating)?;

    let mut config = CrawlConfig::new(query);
    config.base_url.clone_from(&args.base_url);
    config.format = args.format;
    config.destination.clone_from(&args.destination);
    config.concurrency = args.workers.unwrap_or_else(default_concurrency);
    config.queue_depth = args.buffer_size;
    config.timeout = Duration::from_secs(args.timeout);
    config.page_size = args.page_size;
    config.dedup = args.dedup;
    config.failure_policy = if args.keep_going {
        FailurePolicy::Continue
    } else {
        FailurePolicy::Abort
    };
    config.status_policy = if args.lenient_status {
        StatusPolicy::Lenient
    } else {
        StatusPolicy::Strict
    };

    config.validate()?;
    Ok(config)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config_partial_fields() {
        let cfg = parse_config_str(
            r#"
destination = "/data/wallpapers"
workers = 4
rating = "questionable"
format = "sample"
"#,
        )
        .unwrap();
        assert_eq!(cfg.destination, Some(PathBuf::from("/data/wallpapers")));
        assert_eq!(cfg.workers, Some(4));
        assert_eq!(cfg.rating, Some(Rating::Questionable));
        assert_eq!(cfg.format, Some(ImageFormat::Sample));
        assert!(cfg.timeout.is_none());
        assert!(cfg.dedup.is_none());
    }

    #[test]
    fn test_parse_config_empty_file() {
        let cfg = parse_config_str("").unwrap();
        assert!(cfg.workers.is_none());
        assert!(cfg.base_url.is_none());
    }

    #[test]
    fn test_parse_config_rejects_unknown_keys() {
        let err = parse_config_str("unknown_key = 123").unwrap_err();
        assert!(err.to_string().contains("unknown_key"));
    }

    #[test]
    fn test_parse_config_rejects_invalid_workers() {
        let err = parse_config_str("workers = 0").unwrap_err();
        assert!(err.to_string().contains("workers"));
    }

    #[test]
    fn test_parse_config_rejects_invalid_timeout() {
        let err = parse_config_str("timeout = 7200").unwrap_err();
        assert!(err.to_string().contains("timeout"));
    }

    #[test]
    fn test_parse_config_rejects_non_http_base_url() {
        let err = parse_config_str(r#"base_url = "ftp://mirror.example""#).unwrap_err();
        assert!(err.to_string().contains("base_url"));
    }

    #[test]
    fn test_parse_config_rejects_unknown_rating() {
        assert!(parse_config_str(r#"rating = "spicy""#).is_err());
    }

    #[test]
    fn test_explicit_config_path_must_exist() {
        let dir = tempfile::TempDir::new().unwrap();
        let missing = dir.path().join("missing.toml");
        let err = load_file_config(Some(&missing)).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_explicit_config_path_is_loaded() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "page_size = 40\ndedup = \"index\"\n").unwrap();

        let cfg = load_file_config(Some(&path)).unwrap().unwrap();
        assert_eq!(cfg.page_size, Some(40));
        assert_eq!(cfg.dedup, Some(DedupStrategy::Index));
    }

    #[test]
    fn test_file_values_fill_unset_arguments() {
        let (args, sources) = try_parse_with_sources(["booru-crawler", "cat"]).unwrap();
        let file = FileConfig {
            workers: Some(3),
            timeout: Some(30),
            keep_going: Some(true),
            ..FileConfig::default()
        };

        let merged = apply_config_defaults(args, &sources, Some(&file));
        assert_eq!(merged.workers, Some(3));
        assert_eq!(merged.timeout, 30);
        assert!(merged.keep_going);
        assert_eq!(merged.page_size, 100);
    }

    #[test]
    fn test_command_line_values_win_over_file() {
        let (args, sources) =
            try_parse_with_sources(["booru-crawler", "-w", "5", "-r", "explicit", "cat"]).unwrap();
        let file = FileConfig {
            workers: Some(3),
            rating: Some(Rating::Questionable),
            ..FileConfig::default()
        };

        let merged = apply_config_defaults(args, &sources, Some(&file));
        assert_eq!(merged.workers, Some(5));
        assert_eq!(merged.rating, Rating::Explicit);
    }

    #[test]
    fn test_crawl_config_from_args_maps_flags() {
        let (args, _) = try_parse_with_sources([
            "booru-crawler",
            "-w",
            "2",
            "--keep-going",
            "--lenient-status",
            "--base-url",
            "http://127.0.0.1:1/",
            "cat",
        ])
        .unwrap();

        let config = crawl_config_from_args(&args).unwrap();
        assert_eq!(config.concurrency, 2);
        assert_eq!(config.failure_policy, FailurePolicy::Continue);
        assert_eq!(config.status_policy, StatusPolicy::Lenient);
        assert_eq!(config.base(), "http://127.0.0.1:1");
        assert_eq!(config.query.as_str(), "cat+rating:safe");
    }

    #[test]
    fn test_crawl_config_from_args_rejects_blank_tags() {
        let (args, _) = try_parse_with_sources(["booru-crawler", " "]).unwrap();
        assert!(crawl_config_from_args(&args).is_err());
    }
}
