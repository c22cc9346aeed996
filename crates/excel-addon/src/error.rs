//! Errors reported back to the host inside the response envelope

use std::path::PathBuf;

use thiserror::Error;

/// Result type for component operations
pub type AddonResult<T> = std::result::Result<T, AddonError>;

/// Errors that can occur inside the native component
#[derive(Debug, Error)]
pub enum AddonError {
    #[error("Null request pointer")]
    NullRequest,

    #[error("Malformed request: {0}")]
    Request(#[from] serde_json::Error),

    #[error("Error opening workbook: {0}")]
    Open(#[from] calamine::Error),

    #[error("Workbook error: {0}")]
    Workbook(String),

    #[error("Sheet not found: {0}")]
    SheetNotFound(String),

    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("Upsert requires at least one cell")]
    EmptyRow,

    #[error("Column indexes are 1-based, got 0")]
    ZeroColumn,

    #[error("Native component panicked")]
    Panicked,
}
