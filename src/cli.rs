use std::path::PathBuf;

use clap::{ArgGroup, Parser};
use tracing::warn;

use crate::config::Config;
use crate::page::ScrapeOption;
use crate::plan::CrawlAction;

/// CLI surface for launching crawls over one URL or a batch file.
#[derive(Parser, Debug)]
#[command(name = "profile-scout")]
#[command(about = "Crawls websites to locate and scrape staff profile pages")]
#[command(version)]
#[command(group(ArgGroup::new("input").required(true)))]
pub struct Cli {
    #[arg(short, long, group = "input", help = "Single URL to crawl")]
    pub url: Option<String>,

    #[arg(
        short,
        long,
        group = "input",
        help = "Batch file with one '[DEPTH [SLEEP]] URL' entry per line"
    )]
    pub file: Option<PathBuf>,

    #[arg(
        short,
        long,
        value_enum,
        default_value = "scrape-pages",
        help = "What to do with visited pages"
    )]
    pub action: CrawlAction,

    #[arg(
        short,
        long,
        value_enum,
        default_value = "all",
        help = "Which artifacts to store when scraping"
    )]
    pub scrape_option: ScrapeOption,

    #[arg(
        short,
        long,
        default_value = "./results",
        help = "Directory that per-site export directories are created under"
    )]
    pub export_path: PathBuf,

    #[arg(short, long, default_value_t = Config::DEFAULT_MAX_DEPTH, help = "Maximum crawl depth")]
    pub depth: u32,

    #[arg(long, help = "Maximum number of pages to act on per site")]
    pub max_pages: Option<usize>,

    #[arg(long, default_value_t = Config::CRAWL_SLEEP_SECS, help = "Politeness delay between page visits, in seconds")]
    pub crawl_sleep: u64,

    #[arg(short, long, default_value_t = 4, help = "Number of sites crawled in parallel")]
    pub threads: usize,

    #[arg(long, help = "Treat links that differ only by fragment as distinct")]
    pub include_fragment: bool,

    #[arg(long, help = "Do not move links with profile-related words to the queue front")]
    pub no_bump_relevant: bool,

    #[arg(long, help = "Crawl the seed URL as given instead of reducing it to the site root")]
    pub preserve: bool,

    #[arg(long, help = "Buffer per-crawl logs in memory and write them once at the end")]
    pub buffer: bool,

    #[arg(
        long,
        default_value = "2880x1620",
        value_parser = parse_resolution,
        help = "Screenshot viewport as WIDTHxHEIGHT"
    )]
    pub resolution: (u32, u32),
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

fn parse_resolution(value: &str) -> Result<(u32, u32), String> {
    let (width, height) = value
        .split_once('x')
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got {value:?}"))?;
    let width: u32 = width
        .trim()
        .parse()
        .map_err(|_| format!("invalid width in {value:?}"))?;
    let height: u32 = height
        .trim()
        .parse()
        .map_err(|_| format!("invalid height in {value:?}"))?;
    if width == 0 || height == 0 {
        return Err(format!("resolution must be positive, got {value:?}"));
    }
    Ok((width, height))
}

/// One crawl target from the CLI or a batch file, with optional
/// per-site overrides of depth and politeness delay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlInput {
    pub url: String,
    pub depth: Option<u32>,
    pub crawl_sleep: Option<u64>,
}

impl CrawlInput {
    pub fn for_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            depth: None,
            crawl_sleep: None,
        }
    }
}

/// Parse batch-file lines of the form `[DEPTH [SLEEP]] URL`. Malformed
/// lines and non-http(s) URLs are skipped with a warning.
pub fn parse_batch_lines(content: &str) -> Vec<CrawlInput> {
    let mut inputs = Vec::new();
    for (line_no, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        let input = match fields.as_slice() {
            [url] => Some(CrawlInput::for_url(*url)),
            [depth, url] => depth.parse().ok().map(|d| CrawlInput {
                url: url.to_string(),
                depth: Some(d),
                crawl_sleep: None,
            }),
            [depth, sleep, url] => match (depth.parse(), sleep.parse()) {
                (Ok(d), Ok(s)) => Some(CrawlInput {
                    url: url.to_string(),
                    depth: Some(d),
                    crawl_sleep: Some(s),
                }),
                _ => None,
            },
            _ => None,
        };
        match input {
            Some(input) if input.url.starts_with("http://") || input.url.starts_with("https://") => {
                inputs.push(input)
            }
            Some(input) => {
                warn!(line = line_no + 1, url = %input.url, "skipping non-http(s) URL")
            }
            None => warn!(line = line_no + 1, content = %line, "skipping malformed batch line"),
        }
    }
    inputs
}
