//! # excel-manager
//!
//! Host side of the native spreadsheet component.
//!
//! The component is built as a `cdylib` (see the `excel-addon` crate). At first
//! use this crate works out which platform variant it runs on, copies the
//! release build into the staging directory under its canonical name, loads it
//! and serves reads and upserts through it. In development, a synthetic
//! binding can stand in when no native build is available.
//!
//! ## Layout
//!
//! - [`variant`]: platform detection and canonical artifact names
//! - [`stager`]: copying the release build into `npm/`
//! - [`loader`]: opening the staged module or its published package
//! - [`service`]: the [`ExcelService`] façade and its load state
//!
//! ## Example
//!
//! ```no_run
//! use excel_manager::{ExcelService, ServiceConfig, UpdateCell};
//!
//! let service = ExcelService::new(ServiceConfig::from_env());
//! let rows = service.read_excel_file("Cotation-Parc-Batterie-01072025.xlsx")?;
//! println!("{} rows", rows.len());
//!
//! service.upsert_row(
//!     "payplan.xlsx",
//!     "Feuil1",
//!     &[UpdateCell::new(1, "REF-001"), UpdateCell::new(3, "42")],
//! )?;
//! # Ok::<(), excel_manager::Error>(())
//! ```

pub mod binding;
pub mod config;
pub mod error;
pub mod fallback;
pub mod loader;
pub mod pipeline;
pub mod service;
pub mod stager;
pub mod variant;

pub use binding::{BindingError, ExcelBinding, NativeHandle};
pub use config::ServiceConfig;
pub use error::{Error, Result};
pub use fallback::{synthetic_table, RecordedUpsert, SyntheticBinding, MAX_RECORDED_UPSERTS};
pub use loader::{LibraryLoader, ModuleLoader, NativeLibrary};
pub use pipeline::{Initializer, NativePipeline};
pub use service::{ExcelFileRef, ExcelService, LoadState, LoadStatus};
pub use stager::{ensure_staged, ArtifactLocation, Staged};
pub use variant::{canonical_artifact_name, Arch, Libc, Os, VariantKey};

pub use excel_addon_protocol::{Row, Table, UpdateCell};
