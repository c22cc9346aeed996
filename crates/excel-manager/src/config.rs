//! Service configuration

use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Overrides the addon root (directory holding `target/` and `npm/`).
pub const ENV_ADDON_ROOT: &str = "EXCEL_MANAGER_ADDON_ROOT";
/// Overrides the directory workbooks are read from.
pub const ENV_DATA_DIR: &str = "EXCEL_MANAGER_DATA_DIR";
/// Extra package roots, in the platform's `PATH` syntax, searched first.
pub const ENV_PACKAGE_PATH: &str = "EXCEL_MANAGER_PACKAGE_PATH";
/// `development` enables the synthetic fallback.
pub const ENV_ENVIRONMENT: &str = "EXCEL_MANAGER_ENV";

/// Data directory relative to the addon root
pub const DEFAULT_DATA_DIR: &str = "src/assets/excel_files";
/// Package root relative to the addon root
pub const DEFAULT_PACKAGE_DIR: &str = "packages";
pub const DEFAULT_LIBRARY_NAME: &str = "excel_manager";
pub const DEFAULT_SHEET: &str = "Feuil1";

/// Configuration for [`ExcelService`](crate::ExcelService).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    /// Directory containing `target/release/` and the `npm/` staging directory.
    pub addon_root: PathBuf,

    /// Crate library name of the native module (`lib<name>.so`).
    pub library_name: String,

    /// Directory workbook file names are resolved against.
    pub data_dir: PathBuf,

    /// Directories searched for the published package when the staged
    /// module cannot be loaded.
    pub package_roots: Vec<PathBuf>,

    /// Sheet read by [`ExcelService::read_excel_file`](crate::ExcelService::read_excel_file).
    pub default_sheet: String,

    /// Serve synthetic data instead of failing when no native module loads.
    /// Meant for development only.
    pub allow_synthetic_fallback: bool,

    /// Let public operations start initialization when the module is not
    /// loaded. When false they fail with `ModuleNotInitialized` instead.
    pub reinitialize_on_demand: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        let root = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self::for_addon_root(root)
    }
}

impl ServiceConfig {
    /// Defaults laid out under `addon_root`.
    pub fn for_addon_root(addon_root: impl Into<PathBuf>) -> Self {
        let addon_root = addon_root.into();
        Self {
            data_dir: addon_root.join(DEFAULT_DATA_DIR),
            package_roots: vec![addon_root.join(DEFAULT_PACKAGE_DIR)],
            addon_root,
            library_name: DEFAULT_LIBRARY_NAME.to_string(),
            default_sheet: DEFAULT_SHEET.to_string(),
            allow_synthetic_fallback: false,
            reinitialize_on_demand: true,
        }
    }

    /// Defaults overlaid with the `EXCEL_MANAGER_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(None, |key| env::var_os(key))
    }

    /// Like [`from_env`](Self::from_env), with `addon_root` taking the place of
    /// `EXCEL_MANAGER_ADDON_ROOT`. The other variables still apply on top.
    pub fn from_env_with_addon_root(addon_root: Option<PathBuf>) -> Self {
        Self::from_lookup(addon_root, |key| env::var_os(key))
    }

    fn from_lookup(
        addon_root: Option<PathBuf>,
        lookup: impl Fn(&str) -> Option<OsString>,
    ) -> Self {
        let root = addon_root.or_else(|| lookup(ENV_ADDON_ROOT).map(PathBuf::from));
        let mut config = match root {
            Some(root) => Self::for_addon_root(root),
            None => Self::default(),
        };

        if let Some(dir) = lookup(ENV_DATA_DIR) {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(paths) = lookup(ENV_PACKAGE_PATH) {
            let mut roots: Vec<PathBuf> = env::split_paths(&paths).collect();
            roots.append(&mut config.package_roots);
            config.package_roots = roots;
        }
        config.allow_synthetic_fallback = lookup(ENV_ENVIRONMENT)
            .is_some_and(|value| value.eq_ignore_ascii_case("development"));

        config
    }

    pub fn with_data_dir(mut self, data_dir: impl Into<PathBuf>) -> Self {
        self.data_dir = data_dir.into();
        self
    }

    pub fn with_synthetic_fallback(mut self, allow: bool) -> Self {
        self.allow_synthetic_fallback = allow;
        self
    }

    pub fn with_reinitialize_on_demand(mut self, enabled: bool) -> Self {
        self.reinitialize_on_demand = enabled;
        self
    }

    pub fn addon_root(&self) -> &Path {
        &self.addon_root
    }
}
