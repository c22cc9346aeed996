//! Exported C functions

use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::ptr;

use excel_addon_protocol::{ReadRequest, Response, UpsertRequest, ABI_VERSION};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{AddonError, AddonResult};
use crate::workbook;

/// ABI version this component was built against
#[no_mangle]
pub extern "C" fn excel_manager_abi_version() -> u32 {
    ABI_VERSION
}

/// Read every row of a sheet.
///
/// # Safety
///
/// `request` must be null or point to a NUL-terminated string. The returned
/// pointer must be released with [`excel_manager_free_string`].
#[no_mangle]
pub unsafe extern "C" fn excel_manager_read(request: *const c_char) -> *mut c_char {
    dispatch(request, |req: ReadRequest| {
        workbook::read_sheet(Path::new(&req.path), &req.sheet)
    })
}

/// Update the row matching the first cell, or append a new one.
///
/// # Safety
///
/// Same contract as [`excel_manager_read`].
#[no_mangle]
pub unsafe extern "C" fn excel_manager_upsert(request: *const c_char) -> *mut c_char {
    dispatch(request, |req: UpsertRequest| {
        workbook::upsert_row(Path::new(&req.path), &req.sheet, &req.cells)
    })
}

/// Release a string returned by this component.
///
/// # Safety
///
/// `ptr` must be null or a pointer previously returned by this component that
/// has not been freed yet.
#[no_mangle]
pub unsafe extern "C" fn excel_manager_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

unsafe fn dispatch<Req, T, F>(request: *const c_char, op: F) -> *mut c_char
where
    Req: DeserializeOwned,
    T: Serialize,
    F: FnOnce(Req) -> AddonResult<T>,
{
    let result = parse_request(request).and_then(|req| {
        panic::catch_unwind(AssertUnwindSafe(|| op(req)))
            .unwrap_or(Err(AddonError::Panicked))
    });
    encode(&Response::from_result(result))
}

unsafe fn parse_request<Req: DeserializeOwned>(request: *const c_char) -> AddonResult<Req> {
    if request.is_null() {
        return Err(AddonError::NullRequest);
    }
    let bytes = CStr::from_ptr(request).to_bytes();
    Ok(serde_json::from_slice(bytes)?)
}

fn encode<T: Serialize>(response: &Response<T>) -> *mut c_char {
    let json = serde_json::to_string(response)
        .or_else(|e| {
            serde_json::to_string(&Response::<()>::Error {
                message: format!("Failed to encode response: {e}"),
            })
        })
        .unwrap_or_default();
    // JSON escapes control characters, so an interior NUL cannot occur.
    CString::new(json).map_or(ptr::null_mut(), CString::into_raw)
}
