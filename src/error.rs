use crate::types::SourceKind;
use thiserror::Error;

/// Failures raised while retrieving a document.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FetchError {
    #[error("request to {url} timed out after {attempts} attempt(s)")]
    Timeout { url: String, attempts: u32 },

    #[error("HTTP {status} from {url}")]
    Http { url: String, status: u16 },

    #[error("login wall: {url} redirected to {final_url}")]
    LoginWall { url: String, final_url: String },

    #[error("transport error for {url}: {message}")]
    Transport { url: String, message: String },
}

impl FetchError {
    /// 429 and 5xx are worth another attempt; other statuses are final.
    pub fn is_transient_status(status: u16) -> bool {
        status == 429 || (500..=599).contains(&status)
    }
}

/// Failures raised while locating a table inside a fetched document.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExtractionError {
    #[error("no {kind} table found in {url}")]
    NoTableFound { kind: SourceKind, url: String },

    #[error("{kind} table in {url} lacks required columns: {missing}")]
    MissingColumns {
        kind: SourceKind,
        url: String,
        missing: String,
    },
}

/// A required canonical field could not be resolved from the table headers.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NormalizationError {
    #[error("{kind} table: unresolved field '{field}' (columns: {columns:?})")]
    UnresolvedField {
        kind: SourceKind,
        field: &'static str,
        columns: Vec<String>,
    },
}

#[derive(Error, Debug)]
pub enum ScraperError {
    #[error("Fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("Extraction failed: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("Normalization failed: {0}")]
    Normalization(#[from] NormalizationError),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ScraperError {
    /// Fetch and extraction problems degrade a partition to "skipped".
    pub fn is_skippable(&self) -> bool {
        matches!(self, ScraperError::Fetch(_) | ScraperError::Extraction(_))
    }
}

pub type Result<T> = std::result::Result<T, ScraperError>;
