//! Dynamic loading of the native module.
//!
//! The staged artifact is tried first. If the dynamic loader rejects it, the
//! published package for the same variant is looked up under the configured
//! package roots (`<root>/<name>-<variant>/<name>.<variant>.node`). The loader
//! never retries; that decision belongs to [`ExcelService`](crate::ExcelService).

use std::ffi::{CStr, CString};
use std::mem::ManuallyDrop;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use excel_addon_protocol::{
    AbiVersionFn, CallFn, FreeStringFn, ReadRequest, Response, Table, UpdateCell, UpsertRequest,
    ABI_VERSION, ABI_VERSION_SYMBOL, FREE_STRING_SYMBOL, READ_SYMBOL, UPSERT_SYMBOL,
};
use libloading::Library;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::binding::{BindingError, ExcelBinding, NativeHandle};
use crate::error::{Error, Result};
use crate::stager::staged_file_name;

/// Turns a staged artifact into a usable binding.
pub trait ModuleLoader: Send + Sync {
    /// Load `staged_path`, falling back to the published package of `variant`.
    fn load(&self, staged_path: &Path, variant: &str) -> Result<NativeHandle>;
}

/// [`ModuleLoader`] backed by the platform dynamic loader.
#[derive(Debug, Clone)]
pub struct LibraryLoader {
    library_name: String,
    package_roots: Vec<PathBuf>,
}

impl LibraryLoader {
    pub fn new(library_name: impl Into<String>, package_roots: Vec<PathBuf>) -> Self {
        Self {
            library_name: library_name.into(),
            package_roots,
        }
    }

    /// Name of the published package for a variant, e.g. `excel_manager-linux-x64-gnu`.
    pub fn package_name(&self, variant: &str) -> String {
        format!("{}-{}", self.library_name, variant)
    }

    fn package_candidates(&self, variant: &str) -> Vec<PathBuf> {
        let package = self.package_name(variant);
        let file_name = staged_file_name(&self.library_name, variant);
        self.package_roots
            .iter()
            .map(|root| root.join(&package).join(&file_name))
            .collect()
    }

    fn load_package(&self, variant: &str) -> Result<NativeHandle> {
        let searched = self.package_candidates(variant);
        let Some(path) = searched.iter().find(|p| p.is_file()) else {
            return Err(Error::PackageNotFound {
                package: self.package_name(variant),
                searched,
            });
        };

        let library = NativeLibrary::open(path)?;
        tracing::info!("Loaded native module from package {}", path.display());
        Ok(Arc::new(library))
    }
}

impl ModuleLoader for LibraryLoader {
    fn load(&self, staged_path: &Path, variant: &str) -> Result<NativeHandle> {
        let primary = match NativeLibrary::open(staged_path) {
            Ok(library) => {
                tracing::info!("Loaded native module {}", staged_path.display());
                return Ok(Arc::new(library));
            }
            Err(e) => e,
        };

        tracing::warn!(
            "Could not load {} ({primary}), trying package {}",
            staged_path.display(),
            self.package_name(variant)
        );

        self.load_package(variant)
            .map_err(|secondary| Error::NativeLoadFailed {
                primary: Box::new(primary),
                secondary: Box::new(secondary),
            })
    }
}

/// A loaded native module with its exports resolved.
pub struct NativeLibrary {
    path: PathBuf,
    read: CallFn,
    upsert: CallFn,
    free_string: FreeStringFn,
    // Never closed: unloading native code from a running process is unsupported,
    // and the function pointers above must stay valid for the process lifetime.
    _library: ManuallyDrop<Library>,
}

impl NativeLibrary {
    /// Open `path` and resolve every export of the contract.
    pub fn open(path: &Path) -> Result<Self> {
        // SAFETY: loading runs the module's initializers. The module is our own
        // build artifact, staged from the release directory.
        let library = unsafe { Library::new(path) }.map_err(|e| Error::LibraryLoad {
            path: path.to_path_buf(),
            source: Arc::new(e),
        })?;

        // SAFETY: the symbol types below are the signatures the protocol crate
        // defines for these exports.
        let (abi_version, read, upsert, free_string) = unsafe {
            (
                export::<AbiVersionFn>(&library, path, ABI_VERSION_SYMBOL)?,
                export::<CallFn>(&library, path, READ_SYMBOL)?,
                export::<CallFn>(&library, path, UPSERT_SYMBOL)?,
                export::<FreeStringFn>(&library, path, FREE_STRING_SYMBOL)?,
            )
        };

        // SAFETY: takes no arguments and returns a plain integer.
        check_abi(path, unsafe { abi_version() })?;

        Ok(Self {
            path: path.to_path_buf(),
            read,
            upsert,
            free_string,
            _library: ManuallyDrop::new(library),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn call<Req: Serialize, T: DeserializeOwned>(
        &self,
        f: CallFn,
        request: &Req,
    ) -> std::result::Result<T, BindingError> {
        let payload = serde_json::to_string(request)
            .map_err(|e| BindingError::InvalidArgument(e.to_string()))?;
        let payload =
            CString::new(payload).map_err(|e| BindingError::InvalidArgument(e.to_string()))?;

        // SAFETY: `payload` is a valid NUL-terminated string that outlives the
        // call; a non-null result is a string owned by the module until it is
        // handed back to `free_string`.
        let text = unsafe {
            let raw = f(payload.as_ptr());
            if raw.is_null() {
                return Err(BindingError::NullResponse);
            }
            let text = CStr::from_ptr(raw).to_string_lossy().into_owned();
            (self.free_string)(raw);
            text
        };

        let response: Response<T> =
            serde_json::from_str(&text).map_err(|e| BindingError::Protocol(e.to_string()))?;
        response.into_result().map_err(BindingError::Native)
    }
}

impl ExcelBinding for NativeLibrary {
    fn read(&self, path: &Path, sheet: &str) -> std::result::Result<Table, BindingError> {
        let request = ReadRequest {
            path: path_arg(path)?,
            sheet: sheet.to_string(),
        };
        self.call(self.read, &request)
    }

    fn upsert(
        &self,
        path: &Path,
        sheet: &str,
        cells: &[UpdateCell],
    ) -> std::result::Result<(), BindingError> {
        let request = UpsertRequest {
            path: path_arg(path)?,
            sheet: sheet.to_string(),
            cells: cells.to_vec(),
        };
        self.call(self.upsert, &request)
    }
}

unsafe fn export<T: Copy>(library: &Library, path: &Path, name: &'static str) -> Result<T> {
    library
        .get::<T>(name.as_bytes())
        .map(|symbol| *symbol)
        .map_err(|e| Error::IncompleteBinding {
            path: path.to_path_buf(),
            symbol: name,
            source: Arc::new(e),
        })
}

fn check_abi(path: &Path, actual: u32) -> Result<()> {
    if actual == ABI_VERSION {
        return Ok(());
    }
    Err(Error::AbiMismatch {
        path: path.to_path_buf(),
        expected: ABI_VERSION,
        actual,
    })
}

fn path_arg(path: &Path) -> std::result::Result<String, BindingError> {
    path.to_str().map(str::to_owned).ok_or_else(|| {
        BindingError::InvalidArgument(format!("path is not valid UTF-8: {}", path.display()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_package_candidates() {
        let loader = LibraryLoader::new(
            "excel_manager",
            vec![PathBuf::from("/a"), PathBuf::from("/b")],
        );
        assert_eq!(loader.package_name("linux-x64-gnu"), "excel_manager-linux-x64-gnu");
        assert_eq!(
            loader.package_candidates("linux-x64-gnu"),
            vec![
                PathBuf::from("/a/excel_manager-linux-x64-gnu/excel_manager.linux-x64-gnu.node"),
                PathBuf::from("/b/excel_manager-linux-x64-gnu/excel_manager.linux-x64-gnu.node"),
            ]
        );
    }

    #[test]
    fn test_garbage_library_is_a_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("excel_manager.linux-x64-gnu.node");
        fs::write(&path, b"definitely not a shared object").unwrap();

        let err = NativeLibrary::open(&path).err().unwrap();
        assert!(matches!(err, Error::LibraryLoad { .. }), "{err}");
    }

    #[test]
    #[cfg(all(target_os = "linux", target_env = "gnu"))]
    fn test_library_without_exports_is_incomplete() {
        // libm is always present on glibc systems and exports none of ours.
        let path = Path::new("libm.so.6");
        let err = NativeLibrary::open(path).err().unwrap();

        match err {
            Error::IncompleteBinding { symbol, source, .. } => {
                assert_eq!(symbol, ABI_VERSION_SYMBOL);
                assert!(!source.to_string().is_empty());
            }
            other => panic!("expected IncompleteBinding, got {other}"),
        }
    }

    #[test]
    fn test_abi_version_is_checked() {
        let path = Path::new("/addon/npm/excel_manager.linux-x64-gnu.node");
        assert!(check_abi(path, ABI_VERSION).is_ok());

        match check_abi(path, ABI_VERSION + 1) {
            Err(Error::AbiMismatch {
                expected, actual, ..
            }) => {
                assert_eq!(expected, ABI_VERSION);
                assert_eq!(actual, ABI_VERSION + 1);
            }
            other => panic!("expected AbiMismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_both_causes_are_preserved() {
        let dir = tempfile::tempdir().unwrap();
        let loader = LibraryLoader::new("excel_manager", vec![dir.path().join("packages")]);

        let err = loader
            .load(&dir.path().join("missing.node"), "linux-x64-gnu")
            .err()
            .unwrap();

        let Error::NativeLoadFailed { primary, secondary } = err else {
            panic!("expected NativeLoadFailed");
        };
        assert!(matches!(*primary, Error::LibraryLoad { .. }));
        match *secondary {
            Error::PackageNotFound { package, searched } => {
                assert_eq!(package, "excel_manager-linux-x64-gnu");
                assert_eq!(searched.len(), 1);
            }
            other => panic!("expected PackageNotFound, got {other}"),
        }
    }

    #[test]
    fn test_broken_package_reports_its_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let package_dir = dir.path().join("excel_manager-linux-x64-gnu");
        fs::create_dir_all(&package_dir).unwrap();
        fs::write(package_dir.join("excel_manager.linux-x64-gnu.node"), b"garbage").unwrap();

        let loader = LibraryLoader::new("excel_manager", vec![dir.path().to_path_buf()]);
        let err = loader
            .load(&dir.path().join("missing.node"), "linux-x64-gnu")
            .err()
            .unwrap();

        let Error::NativeLoadFailed { secondary, .. } = err else {
            panic!("expected NativeLoadFailed");
        };
        assert!(matches!(*secondary, Error::LibraryLoad { .. }));
    }
}
