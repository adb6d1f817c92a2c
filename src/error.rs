use thiserror::Error;

#[derive(Error, Debug)]
pub enum DownlineError {
    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    #[error("Unreadable sheet: {0}")]
    Sheet(String),

    #[error("Input file not found: {0}")]
    MissingFile(String),

    #[error("Root account could not be located or created")]
    RootUnavailable,

    #[error("Settings error: {0}")]
    Settings(String),
}

pub type Result<T> = std::result::Result<T, DownlineError>;
