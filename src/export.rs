//! Per-site export: the crawl's own out/err log pair and the html /
//! screenshot artifact store.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use rand::Rng;
use thiserror::Error;

use crate::config::Config;
use crate::links::PageLink;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("cannot create directory at {path:?}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot write {path:?}: {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

enum LogSink {
    File(File),
    Buffer(String),
    Stdout,
    Stderr,
}

impl LogSink {
    fn write_line(&mut self, line: &str) {
        match self {
            Self::File(f) => {
                let _ = writeln!(f, "{line}");
            }
            Self::Buffer(s) => {
                s.push_str(line);
                s.push('\n');
            }
            Self::Stdout => println!("{line}"),
            Self::Stderr => eprintln!("{line}"),
        }
    }

    fn flush(&mut self) {
        if let Self::File(f) = self {
            let _ = f.flush();
        }
    }
}

/// The out/err log pair owned by one crawl. Sub-crawls write to their
/// parent's instance; nothing here is shared across crawl tasks.
///
/// Must be closed exactly once when the crawl ends; in buffered mode
/// that is the moment the accumulated content reaches disk.
pub struct CrawlLog {
    out: LogSink,
    err: LogSink,
    export_path: Option<PathBuf>,
    closed: bool,
}

impl CrawlLog {
    /// Logs straight to the process streams.
    pub fn stdio() -> Self {
        Self {
            out: LogSink::Stdout,
            err: LogSink::Stderr,
            export_path: None,
            closed: false,
        }
    }

    /// In-memory log without a backing directory. Used by tests.
    pub fn buffered() -> Self {
        Self {
            out: LogSink::Buffer(String::new()),
            err: LogSink::Buffer(String::new()),
            export_path: None,
            closed: false,
        }
    }

    /// Log pair under the crawl's export directory. In buffered mode
    /// the files are only written at close; otherwise they are opened
    /// now, with a random suffix when a previous crawl left logs
    /// behind. Falls back to the process streams when the files cannot
    /// be opened.
    pub fn for_export(export_path: &Path, use_buffer: bool) -> Self {
        if use_buffer {
            return Self {
                out: LogSink::Buffer(String::new()),
                err: LogSink::Buffer(String::new()),
                export_path: Some(export_path.to_path_buf()),
                closed: false,
            };
        }
        match create_log_files(export_path) {
            Ok((out, err)) => Self {
                out: LogSink::File(out),
                err: LogSink::File(err),
                export_path: Some(export_path.to_path_buf()),
                closed: false,
            },
            Err(e) => {
                eprintln!(
                    "ERROR: cannot open log files at {export_path:?} ({e}), stderr and stdout will be used"
                );
                Self::stdio()
            }
        }
    }

    pub fn info(&mut self, msg: &str) {
        self.out.write_line(&format!("INFO: {msg}"));
    }

    pub fn warn(&mut self, msg: &str) {
        self.err.write_line(&format!("WARN: {msg}"));
    }

    pub fn error(&mut self, msg: &str) {
        self.err.write_line(&format!("ERROR: {msg}"));
    }

    /// The one-per-visited-page progress line.
    pub fn page(&mut self, depth: u32, url: &str) {
        self.out.write_line(&format!("{depth} {url}"));
        self.out.flush();
    }

    pub fn flush(&mut self) {
        self.out.flush();
        self.err.flush();
    }

    /// Contents of both buffers, when this log buffers in memory.
    pub fn buffered_output(&self) -> Option<(&str, &str)> {
        match (&self.out, &self.err) {
            (LogSink::Buffer(out), LogSink::Buffer(err)) => Some((out, err)),
            _ => None,
        }
    }

    /// Flush and, in buffered mode, write the accumulated content to
    /// the log files. Safe to call more than once; only the first call
    /// does anything.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.flush();

        if let (Some(path), LogSink::Buffer(out), LogSink::Buffer(err)) =
            (&self.export_path, &self.out, &self.err)
        {
            match create_log_files(path) {
                Ok((mut out_file, mut err_file)) => {
                    let _ = out_file.write_all(out.as_bytes());
                    let _ = err_file.write_all(err.as_bytes());
                }
                Err(e) => eprintln!("ERROR: cannot write buffered logs to {path:?}: {e}"),
            }
        }
    }
}

impl Drop for CrawlLog {
    fn drop(&mut self) {
        // backstop; the driver closes explicitly
        self.close();
    }
}

fn create_log_files(export_path: &Path) -> io::Result<(File, File)> {
    let mut out_path = export_path.join("out.log");
    let mut err_path = export_path.join("err.log");
    if out_path.exists() || err_path.exists() {
        let suffix =
            rand::thread_rng().gen_range(Config::LOG_SUFFIX_MIN..=Config::LOG_SUFFIX_MAX);
        out_path = export_path.join(format!("out{suffix}.log"));
        err_path = export_path.join(format!("err{suffix}.log"));
    }
    Ok((File::create(out_path)?, File::create(err_path)?))
}

/// Turn a URL into a filesystem-safe filename with the given extension.
/// Overlong names are cut and tagged with a random crop suffix; the
/// flag reports whether that happened.
fn to_filename(url: &str, extension: &str) -> (String, bool) {
    let mut name = url.trim_end_matches('/').to_string();
    name = name.replace("http://", "").replace("https://", "");
    for (unsafe_part, replacement) in Config::CHAR_REPLACEMENTS {
        name = name.replace(unsafe_part, replacement);
    }

    let limit = Config::FILENAME_MAX_LEN;
    if name.len() + extension.len() + 1 > limit {
        let suffix = format!(
            "{}{}",
            Config::FILENAME_CUT_SUFFIX,
            rand::thread_rng().gen_range(1000..=9999)
        );
        let mut keep = limit.saturating_sub(suffix.len() + extension.len() + 1);
        while keep > 0 && !name.is_char_boundary(keep) {
            keep -= 1;
        }
        name.truncate(keep);
        (format!("{name}{suffix}.{extension}"), true)
    } else {
        (format!("{name}.{extension}"), false)
    }
}

/// Writes a crawl's page artifacts under its per-site directory:
/// `<export>/html/` and `<export>/screenshots/`.
pub struct SiteExporter {
    export_path: PathBuf,
}

impl SiteExporter {
    pub fn new(export_path: impl Into<PathBuf>) -> Self {
        Self {
            export_path: export_path.into(),
        }
    }

    pub fn export_path(&self) -> &Path {
        &self.export_path
    }

    /// Create the export directory, and the artifact subdirectories
    /// when the crawl will scrape.
    pub fn prepare(&self, scraping: bool) -> Result<(), ExportError> {
        let mut dirs = vec![self.export_path.clone()];
        if scraping {
            dirs.push(self.export_path.join("html"));
            dirs.push(self.export_path.join("screenshots"));
        }
        for dir in dirs {
            fs::create_dir_all(&dir).map_err(|source| ExportError::CreateDir {
                path: dir.clone(),
                source,
            })?;
        }
        Ok(())
    }

    /// Store the page source. Returns the written path, or `None` when
    /// a file for this URL already exists (logged, not overwritten).
    pub fn save_html(
        &self,
        link: &PageLink,
        html: &str,
        log: &mut CrawlLog,
    ) -> Result<Option<PathBuf>, ExportError> {
        self.save_artifact("html", link, "html", html.as_bytes(), log)
    }

    pub fn save_screenshot(
        &self,
        link: &PageLink,
        png: &[u8],
        log: &mut CrawlLog,
    ) -> Result<Option<PathBuf>, ExportError> {
        self.save_artifact("screenshots", link, "png", png, log)
    }

    fn save_artifact(
        &self,
        subdir: &str,
        link: &PageLink,
        extension: &str,
        content: &[u8],
        log: &mut CrawlLog,
    ) -> Result<Option<PathBuf>, ExportError> {
        let (filename, cropped) = to_filename(&link.url, extension);
        if cropped {
            log.warn(&format!(
                "Link was too long. The filename has changed to: {filename}"
            ));
        }
        let path = self.export_path.join(subdir).join(filename);
        if path.exists() {
            log.warn(&format!("File already exists at: {path:?}"));
            return Ok(None);
        }
        fs::write(&path, content).map_err(|source| ExportError::WriteFile {
            path: path.clone(),
            source,
        })?;
        Ok(Some(path))
    }
}
