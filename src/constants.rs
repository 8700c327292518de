// src/constants.rs

/// Separator line framing each file header in the content section (48 `=`).
pub const FILE_SEPARATOR: &str = "================================================";

/// Placeholder emitted instead of content that is not valid text.
pub const BINARY_SENTINEL: &str = "[Binary file]";

/// First line of the rendered directory tree.
pub const TREE_HEADER: &str = "Directory structure:";

/// Name of the VCS metadata directory, skipped before any other filtering.
pub const VCS_DIR: &str = ".git";

/// Patterns that are always excluded, regardless of user options.
pub const DEFAULT_IGNORE_PATTERNS: &[&str] = &[
    // VCS metadata
    ".git/",
    ".DS_Store",
    // Dependency caches and virtualenvs
    "node_modules/",
    "__pycache__/",
    ".venv/",
    "venv/",
    "vendor/",
    // Build output
    "dist/",
    "build/",
    "target/",
    ".next/",
    "coverage/",
    // Lockfiles
    "package-lock.json",
    "yarn.lock",
    "pnpm-lock.yaml",
    "Cargo.lock",
    // Binary and image files
    "*.png",
    "*.jpg",
    "*.jpeg",
    "*.gif",
    "*.ico",
    "*.pdf",
    "*.zip",
    "*.exe",
];

/// Upper bound of progress events.
pub const PROGRESS_TOTAL: u64 = 100;

/// Progress value at which acquisition hands over to per-file reads.
pub const PROGRESS_ACQUIRED: u64 = 50;

/// Largest piece of text handed to the BPE encoder in one call.
pub const TOKEN_CHUNK_BYTES: usize = 4 * 1024;

/// Above this many bytes the token count is approximated as bytes / 4.
pub const EXACT_TOKEN_LIMIT_BYTES: usize = 2 * 1024 * 1024;

/// Number of concurrent blob fetches per batch in the remote-API strategy.
pub const API_FETCH_BATCH_SIZE: usize = 5;

/// Slider range and default used to derive the maximum file size.
pub const SLIDER_MAX: u32 = 500;
pub const DEFAULT_SLIDER_POSITION: u32 = 243;

/// Default timeout budget for one ingestion request, in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

/// Default provider used for short `owner/repo` references.
pub const DEFAULT_HOST: &str = "github.com";

/// Default GitHub API and raw-content endpoints.
pub const GITHUB_API_BASE: &str = "https://api.github.com";
pub const GITHUB_RAW_BASE: &str = "https://raw.githubusercontent.com";

/// User agent sent with every outbound request.
pub const USER_AGENT: &str = concat!("repodigest/", env!("CARGO_PKG_VERSION"));
