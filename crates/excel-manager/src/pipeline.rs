//! The resolve → stage → load sequence that produces a native handle

use std::path::PathBuf;

use crate::binding::NativeHandle;
use crate::config::ServiceConfig;
use crate::error::Result;
use crate::loader::{LibraryLoader, ModuleLoader};
use crate::stager::{ensure_staged, ArtifactLocation};
use crate::variant;

/// Produces the handle an [`ExcelService`](crate::ExcelService) serves from.
///
/// Called at most once per initialization attempt; implementations must not
/// retry internally.
pub trait Initializer: Send + Sync {
    fn initialize(&self) -> Result<NativeHandle>;
}

/// Resolves the platform variant, stages the release build and loads it.
pub struct NativePipeline {
    addon_root: PathBuf,
    library_name: String,
    loader: Box<dyn ModuleLoader>,
}

impl NativePipeline {
    pub fn new(config: &ServiceConfig) -> Self {
        let loader = LibraryLoader::new(&config.library_name, config.package_roots.clone());
        Self::with_loader(config, loader)
    }

    pub fn with_loader(config: &ServiceConfig, loader: impl ModuleLoader + 'static) -> Self {
        Self {
            addon_root: config.addon_root.clone(),
            library_name: config.library_name.clone(),
            loader: Box::new(loader),
        }
    }

    /// Source and staged paths for the running platform.
    pub fn location(&self) -> Result<ArtifactLocation> {
        let variant = variant::resolve()?;
        ArtifactLocation::new(&self.addon_root, &self.library_name, variant)
    }
}

impl Initializer for NativePipeline {
    fn initialize(&self) -> Result<NativeHandle> {
        let location = self.location()?;
        let staged = ensure_staged(&location)?;
        self.loader.load(&staged.path, &location.canonical_name)
    }
}
