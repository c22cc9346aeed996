//! Shared test doubles for the excel-manager integration tests.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use excel_manager::{
    BindingError, Error, ExcelBinding, Initializer, ModuleLoader, NativeHandle, ServiceConfig,
    Table, UpdateCell,
};

/// A binding that returns a fixed table and records upserts.
#[derive(Debug, Default)]
pub struct RecordingBinding {
    pub table: Table,
    pub upserts: Mutex<Vec<(PathBuf, String, Vec<UpdateCell>)>>,
}

impl RecordingBinding {
    pub fn with_table(table: Table) -> Self {
        Self {
            table,
            upserts: Mutex::default(),
        }
    }
}

impl ExcelBinding for RecordingBinding {
    fn read(&self, _path: &Path, _sheet: &str) -> Result<Table, BindingError> {
        Ok(self.table.clone())
    }

    fn upsert(&self, path: &Path, sheet: &str, cells: &[UpdateCell]) -> Result<(), BindingError> {
        self.upserts
            .lock()
            .unwrap()
            .push((path.to_path_buf(), sheet.to_string(), cells.to_vec()));
        Ok(())
    }
}

/// A binding whose every call fails with a native error message.
pub struct FailingBinding;

impl ExcelBinding for FailingBinding {
    fn read(&self, _path: &Path, sheet: &str) -> Result<Table, BindingError> {
        Err(BindingError::Native(format!("Feuille '{sheet}' introuvable")))
    }

    fn upsert(&self, _path: &Path, _sheet: &str, _cells: &[UpdateCell]) -> Result<(), BindingError> {
        Err(BindingError::Native("workbook is read-only".into()))
    }
}

/// Initializer that counts its invocations and hands out a fixed outcome.
pub struct CountingInitializer {
    pub calls: Arc<AtomicUsize>,
    outcome: Result<NativeHandle, Error>,
    delay: Duration,
}

impl CountingInitializer {
    pub fn succeeding(handle: NativeHandle) -> Self {
        Self {
            calls: Arc::default(),
            outcome: Ok(handle),
            delay: Duration::ZERO,
        }
    }

    pub fn failing(error: Error) -> Self {
        Self {
            calls: Arc::default(),
            outcome: Err(error),
            delay: Duration::ZERO,
        }
    }

    /// Hold every attempt open for `delay` so concurrent callers pile up.
    pub fn slow(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

impl Initializer for CountingInitializer {
    fn initialize(&self) -> Result<NativeHandle, Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
        self.outcome.clone()
    }
}

/// Loader that never touches the dynamic loader.
///
/// Records which staged path it was asked for and returns `handle`.
pub struct StubLoader {
    pub handle: NativeHandle,
    pub requested: Arc<Mutex<Vec<(PathBuf, String)>>>,
}

impl StubLoader {
    pub fn new(handle: NativeHandle) -> Self {
        Self {
            handle,
            requested: Arc::default(),
        }
    }
}

impl ModuleLoader for StubLoader {
    fn load(&self, staged_path: &Path, variant: &str) -> Result<NativeHandle, Error> {
        self.requested
            .lock()
            .unwrap()
            .push((staged_path.to_path_buf(), variant.to_string()));
        Ok(Arc::clone(&self.handle))
    }
}

/// A config rooted in `root` with a data directory holding `files`.
pub fn config_with_files(root: &Path, files: &[&str]) -> ServiceConfig {
    let config = ServiceConfig::for_addon_root(root);
    fs::create_dir_all(&config.data_dir).unwrap();
    for name in files {
        fs::write(config.data_dir.join(name), b"").unwrap();
    }
    config
}

pub fn table(rows: &[&[&str]]) -> Table {
    rows.iter()
        .map(|row| row.iter().map(|cell| cell.to_string()).collect())
        .collect()
}
