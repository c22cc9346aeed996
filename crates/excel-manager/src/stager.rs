//! Publishing the freshly built native module under its canonical name.
//!
//! The release build lands in `<addon_root>/target/release/`. Before it is
//! loaded it is copied to `<addon_root>/npm/<name>.<variant>.node`, and that
//! copy is only refreshed when the build is newer.

use std::fs::{self, File, Metadata};
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::error::{staging_io, Error, Result};
use crate::variant::{canonical_artifact_name, VariantKey};

/// Staging directory name, relative to the addon root
pub const STAGING_DIR: &str = "npm";

/// Cargo's release output directory, relative to the addon root
pub const RELEASE_DIR: &str = "target/release";

/// File name of the staged artifact for a canonical variant name.
pub fn staged_file_name(library_name: &str, canonical_name: &str) -> String {
    format!("{library_name}.{canonical_name}.node")
}

/// Where the build artifact comes from and where its staged copy goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactLocation {
    pub source_path: PathBuf,
    pub staged_path: PathBuf,
    pub canonical_name: String,
}

impl ArtifactLocation {
    pub fn new(addon_root: &Path, library_name: &str, variant: VariantKey) -> Result<Self> {
        let canonical_name = canonical_artifact_name(variant)?;
        Ok(Self {
            source_path: addon_root
                .join(RELEASE_DIR)
                .join(variant.os.dynamic_library_file_name(library_name)),
            staged_path: addon_root
                .join(STAGING_DIR)
                .join(staged_file_name(library_name, canonical_name)),
            canonical_name: canonical_name.to_string(),
        })
    }

    pub fn staging_dir(&self) -> &Path {
        self.staged_path.parent().unwrap_or_else(|| Path::new("."))
    }
}

/// Result of [`ensure_staged`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Staged {
    pub path: PathBuf,
    /// Whether the staged copy was (re)written by this call.
    pub refreshed: bool,
}

/// Make sure the staged copy exists and is not older than the build.
pub fn ensure_staged(location: &ArtifactLocation) -> Result<Staged> {
    let source = &location.source_path;
    let staged = &location.staged_path;

    let source_meta = match fs::metadata(source) {
        Ok(meta) => meta,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(Error::SourceArtifactMissing(source.clone()));
        }
        Err(e) => return Err(staging_io(source, e)),
    };
    let source_modified = source_meta.modified().map_err(|e| staging_io(source, e))?;

    let staging_dir = location.staging_dir();
    fs::create_dir_all(staging_dir).map_err(|e| staging_io(staging_dir, e))?;

    let stale = match fs::metadata(staged) {
        Ok(meta) => {
            let staged_modified = meta.modified().map_err(|e| staging_io(staged, e))?;
            source_modified > staged_modified
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => true,
        Err(e) => return Err(staging_io(staged, e)),
    };

    if !stale {
        tracing::debug!("Staged module {} is up to date", staged.display());
        return Ok(Staged {
            path: staged.clone(),
            refreshed: false,
        });
    }

    copy_atomically(source, staged, &source_meta, source_modified)?;
    tracing::info!("Copied {} to {}", source.display(), staged.display());

    Ok(Staged {
        path: staged.clone(),
        refreshed: true,
    })
}

/// Copy into a temporary file next to `dest`, then rename it into place.
///
/// The copy carries the source's modification time, so an unchanged build
/// compares equal on the next call instead of newer.
fn copy_atomically(
    source: &Path,
    dest: &Path,
    source_meta: &Metadata,
    source_modified: SystemTime,
) -> Result<()> {
    let dir = dest.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::Builder::new()
        .prefix(".staging-")
        .tempfile_in(dir)
        .map_err(|e| staging_io(dir, e))?;

    let mut input = File::open(source).map_err(|e| staging_io(source, e))?;
    io::copy(&mut input, tmp.as_file_mut()).map_err(|e| staging_io(tmp.path(), e))?;

    let file = tmp.as_file();
    file.set_permissions(source_meta.permissions())
        .map_err(|e| staging_io(tmp.path(), e))?;
    file.set_modified(source_modified)
        .map_err(|e| staging_io(tmp.path(), e))?;
    file.sync_all().map_err(|e| staging_io(tmp.path(), e))?;

    tmp.persist(dest).map_err(|e| staging_io(dest, e.error))?;
    Ok(())
}
