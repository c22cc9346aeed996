//! Error types for excel-manager

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

use crate::binding::BindingError;

/// Result type alias using [`Error`]
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while resolving, staging, loading or calling the native module.
///
/// `Clone` so that the outcome of one failed initialization can be handed to
/// every caller that waited on it; I/O and loader causes are shared behind
/// `Arc` for that reason.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// No native artifact exists for this OS/architecture/libc combination
    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),

    /// The release build of the native module is missing
    #[error("Native source artifact not found: {}", .0.display())]
    SourceArtifactMissing(PathBuf),

    /// Creating the staging directory or publishing the staged copy failed
    #[error("Staging failed at {}: {source}", .path.display())]
    StagingIo {
        path: PathBuf,
        #[source]
        source: Arc<std::io::Error>,
    },

    /// The dynamic loader rejected a library
    #[error("Failed to open library {}: {source}", .path.display())]
    LibraryLoad {
        path: PathBuf,
        #[source]
        source: Arc<libloading::Error>,
    },

    /// A loaded library lacks one of the contract's exports
    #[error("Library {} does not export `{symbol}`", .path.display())]
    IncompleteBinding {
        path: PathBuf,
        symbol: &'static str,
        #[source]
        source: Arc<libloading::Error>,
    },

    /// A loaded library was built against another ABI version
    #[error("Library {} implements ABI v{actual}, expected v{expected}", .path.display())]
    AbiMismatch {
        path: PathBuf,
        expected: u32,
        actual: u32,
    },

    /// No package root holds the published package for this variant
    #[error("Package `{package}` not found ({} location(s) searched)", .searched.len())]
    PackageNotFound {
        package: String,
        searched: Vec<PathBuf>,
    },

    /// Both the staged artifact and the published package failed to load
    #[error("Failed to load native module: {primary}; package fallback: {secondary}")]
    NativeLoadFailed {
        #[source]
        primary: Box<Error>,
        secondary: Box<Error>,
    },

    /// The service has not loaded a module and will not initialize on demand
    #[error("Excel module is not initialized")]
    ModuleNotInitialized,

    /// The file name is not a single plain path component
    #[error("Invalid Excel file name: {0:?}")]
    InvalidFileName(String),

    /// The requested workbook does not exist under the data directory
    #[error("Excel file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// The loaded module reported a failure
    #[error("Excel {operation} failed: {source}")]
    UnderlyingOperationFailed {
        operation: &'static str,
        #[source]
        source: BindingError,
    },
}

pub(crate) fn staging_io(path: impl Into<PathBuf>, source: std::io::Error) -> Error {
    Error::StagingIo {
        path: path.into(),
        source: Arc::new(source),
    }
}
