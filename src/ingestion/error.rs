//! Error taxonomy for the load pipeline

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoadError {
    /// Download failed or the server answered with a non-success status
    #[error("Transfer failed: {0}")]
    Transfer(String),

    /// Downloaded bytes are not a readable workbook
    #[error("Could not parse spreadsheet: {0}")]
    Format(#[from] calamine::Error),

    #[error("Error during data cleaning: {0}")]
    Cleaning(String),

    #[error("Error connecting to PostgreSQL database: {0}")]
    Connection(#[source] sqlx::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Input error: {0}")]
    Input(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<reqwest::Error> for LoadError {
    fn from(err: reqwest::Error) -> Self {
        LoadError::Transfer(err.to_string())
    }
}

impl From<std::io::Error> for LoadError {
    fn from(err: std::io::Error) -> Self {
        LoadError::Input(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, LoadError>;
