//! Platform variant detection and canonical artifact names.
//!
//! A native module is published once per supported (OS, architecture, libc)
//! combination. [`resolve`] detects the combination for the running process
//! and [`canonical_artifact_name`] maps it to the identifier used for staged
//! file names and published package names.

use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use crate::error::{Error, Result};

/// Memory map of the running process, scanned for the musl dynamic loader.
const PROC_MAPS: &str = "/proc/self/maps";

/// Operating system family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Os {
    Windows,
    MacOs,
    Linux,
}

impl Os {
    pub const ALL: [Os; 3] = [Os::Windows, Os::MacOs, Os::Linux];

    /// Parse a `std::env::consts::OS` value.
    pub fn from_target(name: &str) -> Result<Self> {
        match name {
            "windows" => Ok(Os::Windows),
            "macos" => Ok(Os::MacOs),
            "linux" => Ok(Os::Linux),
            other => Err(Error::UnsupportedPlatform(format!(
                "operating system `{other}`"
            ))),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Os::Windows => "windows",
            Os::MacOs => "macos",
            Os::Linux => "linux",
        }
    }

    /// File name the Rust toolchain gives a `cdylib` called `name`.
    pub fn dynamic_library_file_name(self, name: &str) -> String {
        match self {
            Os::Windows => format!("{name}.dll"),
            Os::MacOs => format!("lib{name}.dylib"),
            Os::Linux => format!("lib{name}.so"),
        }
    }
}

/// CPU architecture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Arch {
    X64,
    Arm64,
    Ia32,
}

impl Arch {
    pub const ALL: [Arch; 3] = [Arch::X64, Arch::Arm64, Arch::Ia32];

    /// Parse a `std::env::consts::ARCH` value.
    pub fn from_target(name: &str) -> Result<Self> {
        match name {
            "x86_64" => Ok(Arch::X64),
            "aarch64" => Ok(Arch::Arm64),
            "x86" => Ok(Arch::Ia32),
            other => Err(Error::UnsupportedPlatform(format!("architecture `{other}`"))),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Arch::X64 => "x64",
            Arch::Arm64 => "arm64",
            Arch::Ia32 => "ia32",
        }
    }
}

/// C library flavor. Only meaningful on Linux.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Libc {
    Gnu,
    Musl,
    NotApplicable,
}

impl Libc {
    pub const ALL: [Libc; 3] = [Libc::Gnu, Libc::Musl, Libc::NotApplicable];

    pub fn as_str(self) -> &'static str {
        match self {
            Libc::Gnu => "gnu",
            Libc::Musl => "musl",
            Libc::NotApplicable => "n/a",
        }
    }
}

/// The platform variant of the running process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VariantKey {
    pub os: Os,
    pub arch: Arch,
    pub libc: Libc,
}

impl VariantKey {
    pub fn new(os: Os, arch: Arch, libc: Libc) -> Self {
        Self { os, arch, libc }
    }

    pub fn canonical_name(self) -> Result<&'static str> {
        canonical_artifact_name(self)
    }

    /// Every combination of the three axes, supported or not.
    pub fn all() -> impl Iterator<Item = VariantKey> {
        Os::ALL.into_iter().flat_map(|os| {
            Arch::ALL.into_iter().flat_map(move |arch| {
                Libc::ALL
                    .into_iter()
                    .map(move |libc| VariantKey::new(os, arch, libc))
            })
        })
    }

    /// The combinations a native artifact is published for.
    pub fn supported() -> impl Iterator<Item = VariantKey> {
        Self::all().filter(|key| canonical_artifact_name(*key).is_ok())
    }
}

impl fmt::Display for VariantKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.os.as_str(),
            self.arch.as_str(),
            self.libc.as_str()
        )
    }
}

/// Map a variant to its canonical artifact identifier.
pub fn canonical_artifact_name(key: VariantKey) -> Result<&'static str> {
    use Arch::*;
    use Libc::*;

    let name = match (key.os, key.arch, key.libc) {
        (Os::Windows, X64, NotApplicable) => "win32-x64-msvc",
        (Os::Windows, Ia32, NotApplicable) => "win32-ia32-msvc",
        (Os::Windows, Arm64, NotApplicable) => "win32-arm64-msvc",
        (Os::MacOs, X64, NotApplicable) => "darwin-x64",
        (Os::MacOs, Arm64, NotApplicable) => "darwin-arm64",
        (Os::Linux, X64, Gnu) => "linux-x64-gnu",
        (Os::Linux, X64, Musl) => "linux-x64-musl",
        (Os::Linux, Arm64, Gnu) => "linux-arm64-gnu",
        (Os::Linux, Arm64, Musl) => "linux-arm64-musl",
        _ => return Err(Error::UnsupportedPlatform(key.to_string())),
    };
    Ok(name)
}

/// Detect the variant of the running process.
///
/// Detection runs once; later calls return the memoized result.
pub fn resolve() -> Result<VariantKey> {
    static CURRENT: OnceLock<Result<VariantKey>> = OnceLock::new();
    CURRENT.get_or_init(detect).clone()
}

fn detect() -> Result<VariantKey> {
    let os = Os::from_target(std::env::consts::OS)?;
    let arch = Arch::from_target(std::env::consts::ARCH)?;
    let libc = match os {
        Os::Linux if is_musl() => Libc::Musl,
        Os::Linux => Libc::Gnu,
        Os::Windows | Os::MacOs => Libc::NotApplicable,
    };

    let key = VariantKey::new(os, arch, libc);
    tracing::debug!("Resolved platform variant {key}");
    Ok(key)
}

fn is_musl() -> bool {
    match runtime_libc_report() {
        Some(libc) => libc == Libc::Musl,
        None => scan_for_musl(Path::new(PROC_MAPS)),
    }
}

/// The C library this process was built against, when the toolchain says.
fn runtime_libc_report() -> Option<Libc> {
    if cfg!(target_env = "musl") {
        Some(Libc::Musl)
    } else if cfg!(target_env = "gnu") {
        Some(Libc::Gnu)
    } else {
        None
    }
}

/// Look for the musl loader in a memory map listing. Unreadable means glibc.
pub(crate) fn scan_for_musl(maps: &Path) -> bool {
    fs::read_to_string(maps)
        .map(|contents| contents.contains("ld-musl"))
        .unwrap_or(false)
}
