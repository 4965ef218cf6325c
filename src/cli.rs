//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use booru_crawler::{DedupStrategy, ImageFormat, MAX_CONCURRENCY, MAX_QUEUE_DEPTH, Rating};
use clap::Parser;

/// Bulk-download every image matching a tag search on a booru board.
///
/// The result count is requested first; pages are then enumerated while a
/// pool of workers downloads images into the destination directory. Files
/// already present as `<md5>.<ext>` are skipped.
#[derive(Parser, Debug)]
#[command(name = "booru-crawler")]
#[command(author, version, about)]
pub struct Args {
    /// Tags to search for
    #[arg(required = true, value_name = "TAGS")]
    pub tags: Vec<String>,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,

    /// Number of download workers [default: twice the available parallelism]
    #[arg(short = 'w', long, value_parser = parse_workers)]
    pub workers: Option<usize>,

    /// Capacity of the queue between the page fetcher and the workers
    #[arg(short = 'b', long, default_value_t = booru_crawler::DEFAULT_QUEUE_DEPTH, value_parser = parse_buffer_size)]
    pub buffer_size: usize,

    /// Per-request timeout in seconds (1-3600)
    #[arg(short = 't', long, default_value_t = booru_crawler::DEFAULT_TIMEOUT_SECS, value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub timeout: u64,

    /// Directory images are written to
    #[arg(short = 'o', long, default_value = booru_crawler::DEFAULT_DESTINATION)]
    pub destination: PathBuf,

    /// Content rating filter
    #[arg(short = 'r', long, value_enum, default_value_t = Rating::Safe)]
    pub rating: Rating,

    /// Which rendition of each post to download
    #[arg(short = 'f', long, value_enum, default_value_t = ImageFormat::File)]
    pub format: ImageFormat,

    /// Posts requested per page (1-1000)
    #[arg(long, default_value_t = booru_crawler::DEFAULT_PAGE_SIZE, value_parser = clap::value_parser!(u32).range(1..=1000))]
    pub page_size: u32,

    /// Board to crawl
    #[arg(long, default_value = booru_crawler::DEFAULT_BASE_URL)]
    pub base_url: String,

    /// How existing files are detected
    #[arg(long, value_enum, default_value_t = DedupStrategy::Scan)]
    pub dedup: DedupStrategy,

    /// Keep downloading after an item fails (exit code 2 if any did)
    #[arg(long)]
    pub keep_going: bool,

    /// Save non-2xx response bodies instead of failing the item
    #[arg(long)]
    pub lenient_status: bool,

    /// Config file [default: $XDG_CONFIG_HOME/booru-crawler/config.toml]
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

fn parse_workers(raw: &str) -> Result<usize, String> {
    parse_bounded(raw, MAX_CONCURRENCY)
}

fn parse_buffer_size(raw: &str) -> Result<usize, String> {
    parse_bounded(raw, MAX_QUEUE_DEPTH)
}

fn parse_bounded(raw: &str, max: usize) -> Result<usize, String> {
    let value: usize = raw
        .parse()
        .map_err(|_| format!("`{raw}` is not a number"))?;
    if (1..=max).contains(&value) {
        Ok(value)
    } else {
        Err(format!("must be between 1 and {max}"))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_default_args_parses_successfully() {
        let args = Args::try_parse_from(["booru-crawler", "cat"]).unwrap();
        assert_eq!(args.tags, vec!["cat".to_string()]);
        assert_eq!(args.verbose, 0);
        assert!(!args.quiet);
        assert_eq!(args.workers, None);
        assert_eq!(args.buffer_size, 64);
        assert_eq!(args.timeout, 120);
        assert_eq!(args.destination, PathBuf::from("images"));
        assert_eq!(args.rating, Rating::Safe);
        assert_eq!(args.format, ImageFormat::File);
        assert_eq!(args.page_size, 100);
        assert_eq!(args.base_url, "https://konachan.com");
        assert_eq!(args.dedup, DedupStrategy::Scan);
        assert!(!args.keep_going);
        assert!(!args.lenient_status);
        assert!(args.config.is_none());
    }

    #[test]
    fn test_cli_multiple_tags_keep_order() {
        let args = Args::try_parse_from(["booru-crawler", "blue_sky", "cloud", "sea"]).unwrap();
        assert_eq!(args.tags, vec!["blue_sky", "cloud", "sea"]);
    }

    #[test]
    fn test_cli_tags_are_required() {
        let err = Args::try_parse_from(["booru-crawler"]).unwrap_err();
        assert_eq!(
            err.kind(),
            clap::error::ErrorKind::MissingRequiredArgument
        );
    }

    #[test]
    fn test_cli_verbose_flag_increments_count() {
        let args = Args::try_parse_from(["booru-crawler", "cat", "-v"]).unwrap();
        assert_eq!(args.verbose, 1);

        let args = Args::try_parse_from(["booru-crawler", "cat", "-vv"]).unwrap();
        assert_eq!(args.verbose, 2);
    }

    #[test]
    fn test_cli_quiet_flag_sets_quiet() {
        let args = Args::try_parse_from(["booru-crawler", "-q", "cat"]).unwrap();
        assert!(args.quiet);
    }

    #[test]
    fn test_cli_help_flag_shows_usage() {
        let err = Args::try_parse_from(["booru-crawler", "--help"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }

    #[test]
    fn test_cli_version_flag_shows_version() {
        let err = Args::try_parse_from(["booru-crawler", "--version"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayVersion);
    }

    #[test]
    fn test_cli_invalid_flag_returns_error() {
        let err = Args::try_parse_from(["booru-crawler", "cat", "--invalid-flag"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::UnknownArgument);
    }

    #[test]
    fn test_cli_short_flags() {
        let args = Args::try_parse_from([
            "booru-crawler",
            "-w",
            "8",
            "-b",
            "16",
            "-t",
            "30",
            "-o",
            "out/dir",
            "-r",
            "questionableplus",
            "-f",
            "jpeg",
            "cat",
        ])
        .unwrap();
        assert_eq!(args.workers, Some(8));
        assert_eq!(args.buffer_size, 16);
        assert_eq!(args.timeout, 30);
        assert_eq!(args.destination, PathBuf::from("out/dir"));
        assert_eq!(args.rating, Rating::Questionableplus);
        assert_eq!(args.format, ImageFormat::Jpeg);
    }

    #[test]
    fn test_cli_long_flags() {
        let args = Args::try_parse_from([
            "booru-crawler",
            "--page-size",
            "50",
            "--base-url",
            "http://127.0.0.1:9000",
            "--dedup",
            "index",
            "--keep-going",
            "--lenient-status",
            "--config",
            "/tmp/crawler.toml",
            "cat",
        ])
        .unwrap();
        assert_eq!(args.page_size, 50);
        assert_eq!(args.base_url, "http://127.0.0.1:9000");
        assert_eq!(args.dedup, DedupStrategy::Index);
        assert!(args.keep_going);
        assert!(args.lenient_status);
        assert_eq!(args.config, Some(PathBuf::from("/tmp/crawler.toml")));
    }

    #[test]
    fn test_cli_workers_zero_rejected() {
        let err = Args::try_parse_from(["booru-crawler", "-w", "0", "cat"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn test_cli_workers_over_max_rejected() {
        let err = Args::try_parse_from(["booru-crawler", "-w", "257", "cat"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn test_cli_buffer_size_zero_rejected() {
        let err = Args::try_parse_from(["booru-crawler", "-b", "0", "cat"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn test_cli_timeout_zero_rejected() {
        let err = Args::try_parse_from(["booru-crawler", "-t", "0", "cat"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn test_cli_unknown_rating_rejected() {
        let err = Args::try_parse_from(["booru-crawler", "-r", "spicy", "cat"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::InvalidValue);
    }
}
