use std::path::PathBuf;

use thiserror::Error;

/// Why a single row's image could not be fetched
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("row has no image URL")]
    MissingUrl,
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected status {0}")]
    Status(u16),
    #[error("empty payload")]
    EmptyPayload,
}

/// Image could not be measured or embedded
#[derive(Debug, Error)]
pub enum LayoutError {
    #[error("unreadable image: {0}")]
    Unreadable(String),
}

/// Invalid generation options or filter input
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("images per slide must be between 1 and 4, got {0}")]
    ImagesPerSlide(usize),
    #[error("at most 8 caption columns may be selected, got {0}")]
    TooManyCaptionColumns(usize),
    #[error("invalid font colour '{0}', expected 6 hex digits")]
    FontColor(String),
    #[error("unknown column '{0}'")]
    UnknownColumn(String),
    #[error("unreadable filter value for column '{column}': '{value}'")]
    UnreadableFilter { column: String, value: String },
    #[error("no column with image URLs was found")]
    NoImageColumn,
    #[error("concurrency limit must be at least 1")]
    ConcurrencyLimit,
}

/// Failure that aborts a whole generation run
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("working directory {path:?} is not usable: {source}")]
    WorkingDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to load dataset: {0:#}")]
    Dataset(anyhow::Error),
    #[error("failed to build HTTP client: {0}")]
    HttpClient(reqwest::Error),
}

/// Failure attributed to one partition's document
#[derive(Debug, Error)]
pub enum PartitionError {
    #[error("failed to assemble document for '{label}': {cause:#}")]
    Assembly { label: String, cause: anyhow::Error },
    #[error("failed to persist document for '{label}': {cause:#}")]
    Persist { label: String, cause: anyhow::Error },
}

impl PartitionError {
    pub fn label(&self) -> &str {
        match self {
            PartitionError::Assembly { label, .. } | PartitionError::Persist { label, .. } => label,
        }
    }
}
