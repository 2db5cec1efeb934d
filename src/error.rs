use thiserror::Error;

#[derive(Error, Debug)]
pub enum FinwiseError {
    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[cfg(feature = "remote-extractor")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Not signed in. Run `finwise login` first.")]
    NotSignedIn,

    #[error("Backend services are unavailable (set FINWISE_API_KEY and FINWISE_PROJECT_ID)")]
    ServicesUnavailable,

    #[error("Unsupported file: {0}")]
    UnsupportedFile(String),

    #[error("Extraction failed: {0}")]
    Extraction(String),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, FinwiseError>;
