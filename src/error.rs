use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("No usable data directory for glint")]
    NoDataDir,

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Word list not found: {0}")]
    WordListNotFound(String),
}

pub type Result<T> = std::result::Result<T, Error>;
