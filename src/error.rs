//! Error types shared by the fetch, parse and store stages.

use thiserror::Error;

/// Failures while obtaining or reading the source page.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("failed to build HTTP client: {0}")]
    Client(String),

    /// Transport failure, including timeouts.
    #[error("failed to fetch {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The page answered with a non-2xx status.
    #[error("{url} answered with status {status}")]
    Status { url: String, status: u16 },

    /// Markup that cannot be used, or a selector that does not compile.
    #[error("HTML parsing error: {0}")]
    Parse(String),
}

/// Failures raised by a [`crate::store::Store`] implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The region does not exist yet. Recovered by bootstrapping.
    #[error("store region '{region}' does not exist")]
    Uninitialized { region: String },

    #[error("invalid region name '{0}'")]
    InvalidRegion(String),

    /// The region exists but does not carry the expected header.
    #[error("region '{region}' is missing column '{column}'")]
    Schema { region: String, column: String },

    #[error("failed to create store directory {path}: {source}")]
    Directory {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to open store {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("failed to read store: {0}")]
    Read(#[source] rusqlite::Error),

    #[error("failed to write store: {0}")]
    Write(#[source] rusqlite::Error),

    /// Another run rewrote the region after this run read it.
    #[error("region '{region}' changed since it was read, nothing written")]
    Conflict { region: String },
}

/// Settings that cannot drive a run.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Load(#[from] config::ConfigError),

    #[error("no store configured (set REWARDS_STORE or pass --store)")]
    MissingStore,

    #[error("window size must be at least 1")]
    ZeroWindow,

    #[error("timeout must be at least 1 second")]
    ZeroTimeout,

    #[error("source url '{0}' is not an absolute http(s) url")]
    SourceUrl(String),
}
