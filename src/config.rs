// Global configuration constants - single source of truth

use serde::{Deserialize, Serialize};

pub struct Config;

impl Config {
    // Crawl timing
    pub const CRAWL_SLEEP_SECS: u64 = 2;
    pub const RETRY_COOLDOWN_SECS: u64 = 60;

    // HTTP/Network config
    pub const FETCH_TIMEOUT_SECS: u64 = 45;
    pub const CONNECT_TIMEOUT_SECS: u64 = 10;
    pub const USER_AGENT: &'static str = "ProfileScout/0.3";

    // Frontier limits
    pub const MAX_URL_LEN: usize = 310;
    pub const DEFAULT_MAX_DEPTH: u32 = 2;

    // Origin detection
    pub const ORIGIN_PAGE_THRESHOLD: usize = 3;
    pub const PLACEHOLDER: &'static str = "####";

    // Default viewport for screenshots
    pub const WIDTH: u32 = 2880;
    pub const HEIGHT: u32 = 1620;

    // Export layout
    pub const FILENAME_MAX_LEN: usize = 99;
    pub const FILENAME_CUT_SUFFIX: &'static str = "--CROP_";
    pub const LOG_SUFFIX_MIN: u32 = 100_000;
    pub const LOG_SUFFIX_MAX: u32 = 999_999;

    // Batches larger than this buffer per-crawl logs in memory to spare
    // the storage device
    pub const BUFF_THRESHOLD: usize = 30;

    /// File extensions that are never worth visiting
    pub const INVALID_EXTENSIONS: &'static [&'static str] = &[
        "mp4", "jpg", "png", "jpeg", "zip", "rar", "xls", "rtf", "docx", "doc", "pptx", "ppt",
        "pdf", "txt",
    ];

    /// URL substrings that mark a link as likely profile-related.
    /// English plus localized (sr, Latin and Cyrillic) equivalents.
    pub const RELEVANT_WORDS: &'static [&'static str] = &[
        // en
        "profile",
        "user",
        "users",
        "about-us",
        "team",
        "employees",
        "staff",
        "professor",
        // sr
        "profil",
        "o-nama",
        "zaposlen",
        "nastavnik",
        "nastavnici",
        "saradnici",
        "profesor",
        "osoblje",
        "запослен",
        "наставник",
        "наставници",
        "сарадници",
        "професор",
        "особље",
    ];

    /// Replacements for characters that are unsafe in filenames
    pub const CHAR_REPLACEMENTS: &'static [(&'static str, &'static str)] = &[
        ("#", "ANCH"),
        ("?", "QMARK"),
        ("&", "AMP"),
        ("@", "ATSGN"),
        ("!", "EMARK"),
        (":", "COL"),
        (";", "SEMICOL"),
        (",", "COMMA"),
        ("'", "APOST"),
        ("\"", "QUOTE"),
        ("`", "BTICK"),
        ("(", "BR"),
        (")", "BR"),
        ("{", "CRBR"),
        ("}", "CRBR"),
        ("[", "SQBR"),
        ("]", "SQBR"),
        ("<", "LTHEN"),
        (">", "GTHEN"),
        ("/", "__"),
        ("|", "PIPE"),
        ("\\", "BSLASH"),
        ("%", "PERC"),
        ("+", "PLUS"),
        ("*", "STAR"),
        ("=", "EQL"),
        ("^", "CARET"),
        ("~", "TILDA"),
    ];
}

/// Per-crawl options, passed into each component at construction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlOptions {
    pub max_depth: u32,
    /// None means unbounded
    pub max_pages: Option<usize>,
    pub crawl_sleep_secs: u64,
    /// Treat links that differ only by fragment as distinct pages
    pub include_fragment: bool,
    /// Move links whose URL contains a relevant word to the queue front
    pub bump_relevant: bool,
    /// Buffer per-crawl logs in memory and write them once at the end
    pub use_buffer: bool,
    /// Whether html/ and screenshots/ directories should be prepared
    pub scraping: bool,
    pub resolution: (u32, u32),
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self {
            max_depth: Config::DEFAULT_MAX_DEPTH,
            max_pages: None,
            crawl_sleep_secs: Config::CRAWL_SLEEP_SECS,
            include_fragment: false,
            bump_relevant: true,
            use_buffer: false,
            scraping: true,
            resolution: (Config::WIDTH, Config::HEIGHT),
        }
    }
}
