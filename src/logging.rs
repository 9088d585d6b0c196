//! Process-wide tracing setup. Per-crawl out/err logs live in
//! `export::CrawlLog`; this covers everything else.

use std::path::Path;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Initialize the tracing subscriber: a compact stdout layer plus a
/// daily-rotated text file under `log_dir`.
///
/// `RUST_LOG` controls filtering (default: "info").
pub fn init_logging<P: AsRef<Path>>(log_dir: P) -> Result<(), Box<dyn std::error::Error>> {
    let log_path = log_dir.as_ref();
    std::fs::create_dir_all(log_path)?;

    // EnvFilter is not Clone, so each layer builds its own
    let env_filter = || EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info"));

    let file_appender = tracing_appender::rolling::daily(log_path, "profile-scout.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer()
        .with_writer(file_writer)
        .with_target(true)
        .with_ansi(false)
        .compact()
        .with_filter(env_filter()?);

    let stdout_layer = fmt::layer()
        .with_target(false)
        .compact()
        .with_filter(env_filter()?);

    tracing_subscriber::registry()
        .with(file_layer)
        .with(stdout_layer)
        .init();

    // the writer guard must outlive the program
    Box::leak(Box::new(guard));

    tracing::debug!("logging initialized, file logs under {}", log_path.display());
    Ok(())
}
