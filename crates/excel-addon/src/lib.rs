//! # excel-addon
//!
//! The native spreadsheet component that `excel-manager` stages and loads at
//! runtime. It exports the C ABI described in `excel-addon-protocol`; reading
//! is delegated to `calamine` and row upserts to `umya-spreadsheet`.

mod error;
mod ffi;
mod formula;
mod workbook;

pub use error::{AddonError, AddonResult};
pub use ffi::{
    excel_manager_abi_version, excel_manager_free_string, excel_manager_read,
    excel_manager_upsert,
};
pub use formula::adjust_formula_references;
pub use workbook::{read_sheet, upsert_row};
