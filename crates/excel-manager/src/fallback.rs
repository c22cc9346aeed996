//! Synthetic stand-in for the native module during development

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use excel_addon_protocol::{Table, UpdateCell};

use crate::binding::{BindingError, ExcelBinding};

/// Upserts kept by [`SyntheticBinding`]; older ones are dropped.
pub const MAX_RECORDED_UPSERTS: usize = 64;

/// The table every read returns while the fallback is engaged.
pub fn synthetic_table() -> Table {
    vec![
        vec!["Données".into(), "de".into(), "secours".into()],
        vec!["pour".into(), "le".into(), "développement".into()],
    ]
}

/// An upsert the fallback accepted without writing anything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedUpsert {
    pub path: PathBuf,
    pub sheet: String,
    pub cells: Vec<UpdateCell>,
}

/// In-memory [`ExcelBinding`] that never touches the filesystem.
///
/// Remembers the last [`MAX_RECORDED_UPSERTS`] upserts.
#[derive(Debug, Default)]
pub struct SyntheticBinding {
    upserts: Mutex<VecDeque<RecordedUpsert>>,
}

impl SyntheticBinding {
    pub fn new() -> Self {
        Self::default()
    }

    /// Most recent upserts, oldest first.
    pub fn recorded_upserts(&self) -> Vec<RecordedUpsert> {
        self.upserts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }
}

impl ExcelBinding for SyntheticBinding {
    fn read(&self, path: &Path, sheet: &str) -> Result<Table, BindingError> {
        tracing::info!("[fallback] Reading {} ({sheet})", path.display());
        Ok(synthetic_table())
    }

    fn upsert(&self, path: &Path, sheet: &str, cells: &[UpdateCell]) -> Result<(), BindingError> {
        tracing::info!(
            "[fallback] Upsert of {} cell(s) into {} ({sheet}) not written",
            cells.len(),
            path.display()
        );
        let mut upserts = self.upserts.lock().unwrap_or_else(PoisonError::into_inner);
        if upserts.len() == MAX_RECORDED_UPSERTS {
            upserts.pop_front();
        }
        upserts.push_back(RecordedUpsert {
            path: path.to_path_buf(),
            sheet: sheet.to_string(),
            cells: cells.to_vec(),
        });
        Ok(())
    }
}
