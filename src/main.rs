use std::fs;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use profile_scout::cli::{parse_batch_lines, Cli, CrawlInput};
use profile_scout::config::{Config, CrawlOptions};
use profile_scout::crawler::{CrawlSummary, Crawler};
use profile_scout::logging;
use profile_scout::page::{ProfileClassifier, UrlKeywordClassifier};
use profile_scout::plan::{CrawlAction, CrawlPlan};
use profile_scout::url_utils;
use profile_scout::visitor::{HttpVisitor, PageVisitor};

#[derive(Error, Debug)]
pub enum MainError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Logging setup failed: {0}")]
    Logging(String),

    #[error("No valid crawl inputs were provided")]
    NoInputs,

    #[error("Summary serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

fn gather_inputs(cli: &Cli) -> Result<Vec<CrawlInput>, MainError> {
    if let Some(url) = &cli.url {
        return Ok(vec![CrawlInput::for_url(url.clone())]);
    }
    if let Some(path) = &cli.file {
        let content = fs::read_to_string(path)?;
        return Ok(parse_batch_lines(&content));
    }
    // clap enforces one of the two
    Ok(Vec::new())
}

/// First Ctrl+C asks crawls to wind down; a second one force-quits.
fn spawn_signal_handler(shutdown_tx: watch::Sender<bool>) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("shutdown requested, letting crawls wind down");
            let _ = shutdown_tx.send(true);
        }
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("second interrupt, exiting immediately");
            std::process::exit(130);
        }
    });
}

fn write_summaries(export_path: &Path, summaries: &[CrawlSummary]) -> Result<(), MainError> {
    if summaries.is_empty() {
        return Ok(());
    }
    let path = export_path.join("crawl-summary.jsonl");
    let mut file = fs::File::create(&path)?;
    for summary in summaries {
        serde_json::to_writer(&mut file, summary)?;
        file.write_all(b"\n")?;
    }
    info!(path = %path.display(), "crawl summaries written");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), MainError> {
    let cli = Cli::parse_args();
    logging::init_logging("./logs").map_err(|e| MainError::Logging(e.to_string()))?;

    let inputs = gather_inputs(&cli)?;
    if inputs.is_empty() {
        return Err(MainError::NoInputs);
    }

    let use_buffer = cli.buffer || inputs.len() > Config::BUFF_THRESHOLD;
    if use_buffer && !cli.buffer {
        info!(
            sites = inputs.len(),
            "large batch, per-crawl logs will be buffered in memory"
        );
    }

    fs::create_dir_all(&cli.export_path)?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    spawn_signal_handler(shutdown_tx);

    let semaphore = Arc::new(Semaphore::new(cli.threads.max(1)));
    let mut tasks = JoinSet::new();
    for input in inputs {
        let base_url = if cli.preserve {
            input.url.clone()
        } else {
            url_utils::to_base_url(&input.url)
        };
        let export_dir = cli.export_path.join(url_utils::to_key(&input.url));
        let options = CrawlOptions {
            max_depth: input.depth.unwrap_or(cli.depth),
            max_pages: cli.max_pages,
            crawl_sleep_secs: input.crawl_sleep.unwrap_or(cli.crawl_sleep),
            include_fragment: cli.include_fragment,
            bump_relevant: !cli.no_bump_relevant,
            use_buffer,
            scraping: !matches!(cli.action, CrawlAction::FindOrigin),
            resolution: cli.resolution,
        };
        let action = cli.action;
        let scrape = cli.scrape_option;
        let semaphore = semaphore.clone();
        let shutdown = shutdown_rx.clone();

        tasks.spawn(async move {
            let Ok(_permit) = semaphore.acquire_owned().await else {
                return None;
            };
            if *shutdown.borrow() {
                return None;
            }
            let visitor: Arc<dyn PageVisitor> = match HttpVisitor::new() {
                Ok(v) => Arc::new(v),
                Err(e) => {
                    error!(url = %base_url, error = %e, "failed to build HTTP client");
                    return None;
                }
            };
            let classifier: Arc<dyn ProfileClassifier> = Arc::new(UrlKeywordClassifier::new());
            let plan = CrawlPlan::for_action(action, scrape);
            let crawler = Crawler::new(
                visitor, classifier, plan, options, base_url, export_dir, shutdown,
            );
            Some(crawler.run().await)
        });
    }

    let mut summaries = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Some(summary)) => {
                info!(
                    base_url = %summary.base_url,
                    outcome = ?summary.outcome,
                    visited = summary.visited,
                    scraped = summary.scraped,
                    "site crawl complete"
                );
                summaries.push(summary);
            }
            Ok(None) => {}
            // one failed task must not take down its siblings
            Err(e) => error!(error = %e, "crawl task failed"),
        }
    }

    write_summaries(&cli.export_path, &summaries)?;

    let visited: usize = summaries.iter().map(|s| s.visited).sum();
    let scraped: usize = summaries.iter().map(|s| s.scraped).sum();
    info!(sites = summaries.len(), visited, scraped, "all crawls finished");

    Ok(())
}
