use thiserror::Error;

#[derive(Error, Debug)]
pub enum CovtrackError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("Malformed method token '{0}': expected name followed by '(' descriptor")]
    MalformedMethod(String),

    #[error("Complexity analyzer failed: {0}")]
    Analyzer(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, CovtrackError>;
