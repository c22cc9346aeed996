//! Shared ABI types for the native spreadsheet component.
//!
//! The host process and the component talk through four C functions. The two
//! operations take a JSON request as a NUL-terminated string and return a JSON
//! [`Response`] envelope that the component allocated; the host must hand every
//! returned string back through the [`FREE_STRING_SYMBOL`] export.
//!
//! ```text
//! host                                  component
//!   excel_manager_abi_version()  ───▶  u32
//!   excel_manager_read(json)     ───▶  {"status":"ok","data":[["a","b"]]}
//!   excel_manager_upsert(json)   ───▶  {"status":"error","message":"..."}
//!   excel_manager_free_string(ptr)
//! ```

use std::fmt::Display;
use std::os::raw::c_char;

use serde::{Deserialize, Serialize};

/// Bumped whenever a request or response shape changes incompatibly.
pub const ABI_VERSION: u32 = 1;

pub const ABI_VERSION_SYMBOL: &str = "excel_manager_abi_version";
pub const READ_SYMBOL: &str = "excel_manager_read";
pub const UPSERT_SYMBOL: &str = "excel_manager_upsert";
pub const FREE_STRING_SYMBOL: &str = "excel_manager_free_string";

/// Signature of [`ABI_VERSION_SYMBOL`].
pub type AbiVersionFn = unsafe extern "C" fn() -> u32;

/// Signature shared by [`READ_SYMBOL`] and [`UPSERT_SYMBOL`].
pub type CallFn = unsafe extern "C" fn(request: *const c_char) -> *mut c_char;

/// Signature of [`FREE_STRING_SYMBOL`].
pub type FreeStringFn = unsafe extern "C" fn(ptr: *mut c_char);

/// One row of a sheet, cells rendered as strings.
pub type Row = Vec<String>;

/// All rows of a sheet, in order.
pub type Table = Vec<Row>;

/// A value to write into a 1-based column of the upserted row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateCell {
    #[serde(rename = "cell", alias = "columnIndex")]
    pub column_index: u32,
    pub value: String,
}

impl UpdateCell {
    pub fn new(column_index: u32, value: impl Into<String>) -> Self {
        Self {
            column_index,
            value: value.into(),
        }
    }
}

/// Payload of [`READ_SYMBOL`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadRequest {
    /// Absolute path of the workbook.
    pub path: String,
    pub sheet: String,
}

/// Payload of [`UPSERT_SYMBOL`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpsertRequest {
    /// Absolute path of the workbook.
    pub path: String,
    pub sheet: String,
    /// The first cell is the match key: an existing row whose value in the
    /// key's own column (not necessarily column 1) equals the key is updated,
    /// otherwise a row is appended. `[{cell: 2, value: "42"}]` therefore
    /// matches on column B.
    pub cells: Vec<UpdateCell>,
}

/// Envelope returned by both operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status")]
pub enum Response<T> {
    #[serde(rename = "ok")]
    Ok { data: T },
    #[serde(rename = "error")]
    Error { message: String },
}

impl<T> Response<T> {
    pub fn from_result<E: Display>(result: Result<T, E>) -> Self {
        match result {
            Ok(data) => Response::Ok { data },
            Err(e) => Response::Error {
                message: e.to_string(),
            },
        }
    }

    pub fn into_result(self) -> Result<T, String> {
        match self {
            Response::Ok { data } => Ok(data),
            Response::Error { message } => Err(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_update_cell_wire_names() {
        let cell = UpdateCell::new(2, "42");
        assert_eq!(
            serde_json::to_value(&cell).unwrap(),
            json!({"cell": 2, "value": "42"})
        );

        let parsed: UpdateCell =
            serde_json::from_value(json!({"columnIndex": 3, "value": "x"})).unwrap();
        assert_eq!(parsed, UpdateCell::new(3, "x"));
    }

    #[test]
    fn test_response_envelopes() {
        let ok: Response<Table> = Response::Ok {
            data: vec![vec!["a".into(), "b".into()]],
        };
        assert_eq!(
            serde_json::to_value(&ok).unwrap(),
            json!({"status": "ok", "data": [["a", "b"]]})
        );

        let err: Response<()> = serde_json::from_str(r#"{"status":"error","message":"boom"}"#).unwrap();
        assert_eq!(err.into_result(), Err("boom".to_string()));

        let unit: Response<()> = serde_json::from_str(r#"{"status":"ok","data":null}"#).unwrap();
        assert_eq!(unit.into_result(), Ok(()));
    }
}
