#[derive(thiserror::Error, Debug)]
pub enum PrimError {
    #[error("Init error: {0}")]
    Init(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Error response: {0}")]
    Status(u16),

    #[error("Request timed out")]
    Timeout,

    #[error("Deserialize error: {0}")]
    Deserialize(#[from] serde_json::Error),
}

pub type PrimResult<T> = Result<T, PrimError>;
