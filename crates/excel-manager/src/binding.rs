//! The two-operation capability every loaded module exposes

use std::path::Path;
use std::sync::Arc;

use excel_addon_protocol::{Table, UpdateCell};
use thiserror::Error;

/// Read and upsert access to workbooks.
///
/// Implemented by the dynamically loaded native module and by the synthetic
/// development fallback. Implementations must tolerate concurrent calls.
pub trait ExcelBinding: Send + Sync {
    /// Read every row of `sheet` in the workbook at `path`.
    fn read(&self, path: &Path, sheet: &str) -> Result<Table, BindingError>;

    /// Update the row keyed by the first cell, or append a new one.
    fn upsert(&self, path: &Path, sheet: &str, cells: &[UpdateCell]) -> Result<(), BindingError>;
}

/// Shared handle to the active binding.
pub type NativeHandle = Arc<dyn ExcelBinding>;

/// Failure of a single call into a binding
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindingError {
    /// Error message produced by the module itself
    #[error("{0}")]
    Native(String),

    #[error("Invalid response from native module: {0}")]
    Protocol(String),

    #[error("Native module returned a null response")]
    NullResponse,

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}
