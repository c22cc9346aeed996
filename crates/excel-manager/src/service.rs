//! The access façade consumers go through.
//!
//! [`ExcelService`] owns the load state of the native module. The first call
//! that needs the module (or an explicit [`ExcelService::initialize`]) runs the
//! [`Initializer`]; concurrent callers queue behind that attempt and share its
//! outcome. Once a handle is installed, reads and upserts run in parallel
//! without further locking.

use std::ffi::OsStr;
use std::fmt;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use excel_addon_protocol::{Table, UpdateCell};

use crate::binding::NativeHandle;
use crate::config::ServiceConfig;
use crate::error::{Error, Result};
use crate::fallback::SyntheticBinding;
use crate::pipeline::{Initializer, NativePipeline};

/// Load state of the native module
#[derive(Clone)]
pub enum LoadState {
    Unloaded,
    Loaded(NativeHandle),
    FallbackEngaged(NativeHandle),
    Failed(Error),
}

/// Summary of a [`LoadState`] without the handle or cause
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStatus {
    Unloaded,
    Loaded,
    FallbackEngaged,
    Failed,
}

impl LoadState {
    pub fn status(&self) -> LoadStatus {
        match self {
            LoadState::Unloaded => LoadStatus::Unloaded,
            LoadState::Loaded(_) => LoadStatus::Loaded,
            LoadState::FallbackEngaged(_) => LoadStatus::FallbackEngaged,
            LoadState::Failed(_) => LoadStatus::Failed,
        }
    }

    fn outcome(&self) -> Result<NativeHandle> {
        match self {
            LoadState::Loaded(handle) | LoadState::FallbackEngaged(handle) => Ok(Arc::clone(handle)),
            LoadState::Failed(cause) => Err(cause.clone()),
            LoadState::Unloaded => Err(Error::ModuleNotInitialized),
        }
    }
}

impl fmt::Debug for LoadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadState::Failed(cause) => f.debug_tuple("Failed").field(cause).finish(),
            other => write!(f, "{:?}", other.status()),
        }
    }
}

/// A workbook addressed relative to a base directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExcelFileRef {
    pub base_directory: PathBuf,
    pub file_name: String,
    pub sheet_name: String,
}

impl ExcelFileRef {
    /// Fails with `InvalidFileName` unless `file_name` is a single plain
    /// path component.
    pub fn new(
        base_directory: impl Into<PathBuf>,
        file_name: &str,
        sheet_name: &str,
    ) -> Result<Self> {
        if !is_plain_file_name(file_name) {
            return Err(Error::InvalidFileName(file_name.to_string()));
        }
        Ok(Self {
            base_directory: base_directory.into(),
            file_name: file_name.to_string(),
            sheet_name: sheet_name.to_string(),
        })
    }

    /// Absolute path of an existing file, or `FileNotFound`.
    pub fn resolve(&self) -> Result<PathBuf> {
        let candidate = self.base_directory.join(&self.file_name);
        match fs::canonicalize(&candidate) {
            Ok(path) if path.is_file() => Ok(path),
            _ => Err(Error::FileNotFound(candidate)),
        }
    }
}

fn is_plain_file_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(part)), None) => part == OsStr::new(name),
        _ => false,
    }
}

struct Slot {
    state: LoadState,
    /// Completed initialization attempts, used to detect that an attempt
    /// finished while a caller was queued at the gate.
    attempts: u64,
}

/// Entry point for reading and upserting workbooks through the native module.
pub struct ExcelService {
    config: ServiceConfig,
    initializer: Box<dyn Initializer>,
    slot: Mutex<Slot>,
    init_gate: Mutex<()>,
}

impl ExcelService {
    /// Service backed by the native module staged under `config.addon_root`.
    pub fn new(config: ServiceConfig) -> Self {
        let pipeline = NativePipeline::new(&config);
        Self::with_initializer(config, pipeline)
    }

    pub fn with_initializer(config: ServiceConfig, initializer: impl Initializer + 'static) -> Self {
        Self {
            config,
            initializer: Box::new(initializer),
            slot: Mutex::new(Slot {
                state: LoadState::Unloaded,
                attempts: 0,
            }),
            init_gate: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn status(&self) -> LoadStatus {
        lock(&self.slot).state.status()
    }

    /// Run a fresh initialization attempt, replacing any installed handle.
    ///
    /// With the synthetic fallback allowed this only fails if the fallback
    /// itself cannot be engaged, which never happens.
    pub fn initialize(&self) -> Result<LoadStatus> {
        self.run_attempt(None)?;
        Ok(self.status())
    }

    /// Drop the handle and return to `Unloaded`. Loaded native code stays
    /// mapped in the process.
    pub fn shutdown(&self) {
        let _gate = lock(&self.init_gate);
        lock(&self.slot).state = LoadState::Unloaded;
        tracing::info!("Excel module handle released");
    }

    /// Whether `file_name` names an existing file in the data directory.
    pub fn excel_file_exists(&self, file_name: &str) -> bool {
        ExcelFileRef::new(&self.config.data_dir, file_name, &self.config.default_sheet)
            .and_then(|file| file.resolve())
            .is_ok()
    }

    /// Read the default sheet of `file_name`.
    pub fn read_excel_file(&self, file_name: &str) -> Result<Table> {
        self.read_sheet(file_name, &self.config.default_sheet)
    }

    pub fn read_sheet(&self, file_name: &str, sheet_name: &str) -> Result<Table> {
        let file = ExcelFileRef::new(&self.config.data_dir, file_name, sheet_name)?;
        let path = file.resolve()?;
        let handle = self.ensure_ready()?;

        handle.read(&path, &file.sheet_name).map_err(|source| {
            tracing::error!("Reading {} failed: {source}", path.display());
            Error::UnderlyingOperationFailed {
                operation: "read",
                source,
            }
        })
    }

    /// Update the row keyed by the first cell, or append one.
    pub fn upsert_row(&self, file_name: &str, sheet_name: &str, cells: &[UpdateCell]) -> Result<()> {
        let file = ExcelFileRef::new(&self.config.data_dir, file_name, sheet_name)?;
        let path = file.resolve()?;
        let handle = self.ensure_ready()?;

        handle
            .upsert(&path, &file.sheet_name, cells)
            .map_err(|source| {
                tracing::error!("Upserting into {} failed: {source}", path.display());
                Error::UnderlyingOperationFailed {
                    operation: "upsert",
                    source,
                }
            })
    }

    fn ensure_ready(&self) -> Result<NativeHandle> {
        let observed = {
            let slot = lock(&self.slot);
            match &slot.state {
                LoadState::Loaded(handle) | LoadState::FallbackEngaged(handle) => {
                    return Ok(Arc::clone(handle));
                }
                _ if !self.config.reinitialize_on_demand => {
                    return Err(Error::ModuleNotInitialized);
                }
                _ => slot.attempts,
            }
        };

        self.run_attempt(Some(observed))
    }

    /// Run one attempt under the gate.
    ///
    /// `observed` is the attempt count the caller saw before queueing; if an
    /// attempt completed since then, its outcome is returned instead. An
    /// `Unloaded` state (a shutdown ran in between) is never adopted.
    fn run_attempt(&self, observed: Option<u64>) -> Result<NativeHandle> {
        let _gate = lock(&self.init_gate);

        if let Some(observed) = observed {
            let slot = lock(&self.slot);
            if slot.attempts != observed && !matches!(slot.state, LoadState::Unloaded) {
                return slot.state.outcome();
            }
        }

        let state = self.attempt();
        let outcome = state.outcome();

        let mut slot = lock(&self.slot);
        slot.attempts += 1;
        slot.state = state;
        outcome
    }

    fn attempt(&self) -> LoadState {
        if let Err(e) = fs::create_dir_all(&self.config.data_dir) {
            tracing::warn!(
                "Could not create data directory {}: {e}",
                self.config.data_dir.display()
            );
        }

        match self.initializer.initialize() {
            Ok(handle) => {
                tracing::info!("Native Excel module ready");
                LoadState::Loaded(handle)
            }
            Err(cause) if self.config.allow_synthetic_fallback => {
                tracing::warn!("Native Excel module unavailable ({cause}), serving synthetic data");
                LoadState::FallbackEngaged(Arc::new(SyntheticBinding::new()))
            }
            Err(cause) => {
                tracing::error!("Failed to initialize native Excel module: {cause}");
                LoadState::Failed(cause)
            }
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
