//! Runtime netCDF library version probe.
//!
//! Finds the shared netCDF library in the resolved library directories, loads
//! it and asks it for its version with `nc_inq_libvers`. Every failure here is
//! recoverable: a library that cannot be found, loaded or queried just yields
//! no version.
//!
//! # Safety
//!
//! Loading a shared library runs its initializers. Only files matching the
//! platform's netCDF library name inside directories the build is about to
//! link against are loaded, so nothing runs that the finished binding would
//! not run anyway. The library is unloaded as soon as the version string has
//! been copied out.

use libloading::{Library, Symbol};
use regex::Regex;
use std::ffi::{CStr, c_char};
use std::path::{Path, PathBuf};

const LIBVERS_SYMBOL: &[u8] = b"nc_inq_libvers\0";

/// Reports the version of the library that will be linked.
pub trait VersionProbe {
    /// Version of the first usable library in `lib_dirs`, searched in order.
    fn probe(&self, lib_dirs: &[PathBuf]) -> Option<String>;
}

/// Shared library naming convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum Platform {
    /// `netcdf.dll`
    Windows,
    /// `cygnetcdf-N.dll`, installed in `bin/` next to `lib/`
    Cygwin,
    /// `libnetcdf.dylib`
    #[cfg_attr(feature = "cli", value(name = "macos"))]
    MacOs,
    /// `libnetcdf.so`
    Unix,
}

impl Platform {
    /// Platform this binary was built for.
    pub fn current() -> Self {
        if cfg!(target_os = "windows") {
            Platform::Windows
        } else if cfg!(target_os = "cygwin") {
            Platform::Cygwin
        } else if cfg!(target_os = "macos") {
            Platform::MacOs
        } else {
            Platform::Unix
        }
    }

    /// File name pattern of the netCDF shared library.
    fn pattern(self) -> &'static str {
        match self {
            Platform::Windows => r"^netcdf\.dll$",
            Platform::Cygwin => r"^cygnetcdf-\d\.dll",
            Platform::MacOs => r"^libnetcdf\.dylib",
            Platform::Unix => r"^libnetcdf\.so",
        }
    }

    /// Directories that hold the runtime library, given the link directories.
    pub fn search_dirs(self, lib_dirs: &[PathBuf]) -> Vec<PathBuf> {
        match self {
            Platform::Cygwin => lib_dirs
                .iter()
                .map(|dir| dir.parent().unwrap_or(dir).join("bin"))
                .collect(),
            _ => lib_dirs.to_vec(),
        }
    }

    /// The matching library in `dir` with the shortest name.
    ///
    /// The shortest name is the unversioned one (`libnetcdf.so` rather than
    /// `libnetcdf.so.19.1.0`) when both are installed.
    pub fn find_library(self, dir: &Path) -> Option<PathBuf> {
        let pattern = Regex::new(self.pattern()).ok()?;
        let mut candidates: Vec<String> = std::fs::read_dir(dir)
            .ok()?
            .flatten()
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| pattern.is_match(name))
            .collect();
        candidates.sort_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));

        let path = dir.join(candidates.first()?);
        Some(std::path::absolute(&path).unwrap_or(path))
    }
}

/// Why a candidate library was skipped.
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error(transparent)]
    Load(#[from] libloading::Error),

    #[error("nc_inq_libvers returned no version")]
    NoVersion,
}

/// Probe by loading the shared library and calling `nc_inq_libvers`.
#[derive(Debug, Clone, Copy)]
pub struct SharedLibraryProbe {
    platform: Platform,
}

impl SharedLibraryProbe {
    pub fn new(platform: Platform) -> Self {
        Self { platform }
    }
}

impl Default for SharedLibraryProbe {
    fn default() -> Self {
        Self::new(Platform::current())
    }
}

impl VersionProbe for SharedLibraryProbe {
    fn probe(&self, lib_dirs: &[PathBuf]) -> Option<String> {
        for dir in self.platform.search_dirs(lib_dirs) {
            let Some(path) = self.platform.find_library(&dir) else {
                tracing::debug!("no netcdf library in {}", dir.display());
                continue;
            };
            match query_libvers(&path) {
                Ok(version) => return Some(version),
                Err(e) => tracing::debug!("skipping {}: {e}", path.display()),
            }
        }
        None
    }
}

/// Load `path` and return the first word of `nc_inq_libvers()`.
pub fn query_libvers(path: &Path) -> Result<String, ProbeError> {
    // SAFETY: see the module docs. The returned pointer refers to a static
    // string inside the library and is copied before `library` is dropped.
    unsafe {
        let library = Library::new(path)?;
        let inq_libvers: Symbol<unsafe extern "C" fn() -> *const c_char> =
            library.get(LIBVERS_SYMBOL)?;
        let raw = inq_libvers();
        if raw.is_null() {
            return Err(ProbeError::NoVersion);
        }
        let full = CStr::from_ptr(raw).to_string_lossy();
        full.split_whitespace()
            .next()
            .map(str::to_string)
            .ok_or(ProbeError::NoVersion)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str) {
        std::fs::write(dir.join(name), b"not a library").unwrap();
    }

    #[test]
    fn test_prefers_shortest_name() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "libnetcdf.so.1.2.3");
        touch(dir.path(), "libnetcdf.so");
        touch(dir.path(), "libnetcdf.so.19");

        let found = Platform::Unix.find_library(dir.path()).unwrap();
        assert_eq!(found.file_name().unwrap(), "libnetcdf.so");
    }

    #[test]
    fn test_pattern_per_platform() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "libnetcdf.a");
        touch(dir.path(), "libnetcdf_c++.so");
        touch(dir.path(), "netcdf.dll.bak");
        touch(dir.path(), "libnetcdf.dylib");
        touch(dir.path(), "cygnetcdf-7.dll");

        assert_eq!(Platform::Unix.find_library(dir.path()), None);
        assert_eq!(Platform::Windows.find_library(dir.path()), None);
        assert_eq!(
            Platform::MacOs
                .find_library(dir.path())
                .unwrap()
                .file_name()
                .unwrap(),
            "libnetcdf.dylib"
        );
        assert_eq!(
            Platform::Cygwin
                .find_library(dir.path())
                .unwrap()
                .file_name()
                .unwrap(),
            "cygnetcdf-7.dll"
        );
    }

    #[test]
    fn test_cygwin_searches_bin() {
        let dirs = vec![PathBuf::from("/usr/lib"), PathBuf::from("/opt/nc/lib")];
        assert_eq!(
            Platform::Cygwin.search_dirs(&dirs),
            vec![PathBuf::from("/usr/bin"), PathBuf::from("/opt/nc/bin")]
        );
        assert_eq!(Platform::Unix.search_dirs(&dirs), dirs);
    }

    #[test]
    fn test_missing_dir() {
        assert_eq!(
            Platform::Unix.find_library(Path::new("/nonexistent/lib")),
            None
        );
    }

    #[test]
    fn test_unloadable_library_is_skipped() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "libnetcdf.so");

        let probe = SharedLibraryProbe::new(Platform::Unix);
        assert_eq!(
            probe.probe(&[
                PathBuf::from("/nonexistent/lib"),
                dir.path().to_path_buf()
            ]),
            None
        );
    }

    /// Compile `source` into `dir/name`. None without a working C compiler.
    #[cfg(unix)]
    fn build_library(dir: &Path, name: &str, source: &str) -> Option<PathBuf> {
        let compiler = std::env::var_os("CC")
            .map(PathBuf::from)
            .or_else(|| which::which("cc").ok())?;
        let source_path = dir.join(format!("{name}.c"));
        std::fs::write(&source_path, source).unwrap();
        let output = dir.join(name);
        let status = std::process::Command::new(compiler)
            .args(["-shared", "-fPIC", "-o"])
            .arg(&output)
            .arg(&source_path)
            .status()
            .ok()?;
        std::fs::remove_file(&source_path).unwrap();
        status.success().then_some(output)
    }

    #[cfg(unix)]
    fn libvers_source(version: &str) -> String {
        format!("const char *nc_inq_libvers(void) {{ return \"{version}\"; }}\n")
    }

    #[cfg(unix)]
    #[test]
    fn test_first_loadable_library_answers() {
        let junk = TempDir::new().unwrap();
        let real = TempDir::new().unwrap();
        let later = TempDir::new().unwrap();
        touch(junk.path(), "libnetcdf.so");
        let Some(stub) = build_library(
            real.path(),
            "libnetcdf.so.7",
            &libvers_source("4.1.3 of Jan  1 2012 $"),
        ) else {
            eprintln!("no C compiler, skipping");
            return;
        };
        build_library(
            later.path(),
            "libnetcdf.so",
            &libvers_source("4.9.2 of Feb  2 2023 $"),
        )
        .unwrap();

        assert_eq!(query_libvers(&stub).unwrap(), "4.1.3");

        let probe = SharedLibraryProbe::new(Platform::Unix);
        let dirs = [
            junk.path().to_path_buf(),
            real.path().to_path_buf(),
            later.path().to_path_buf(),
        ];
        assert_eq!(probe.probe(&dirs).as_deref(), Some("4.1.3"));
    }

    #[cfg(unix)]
    #[test]
    fn test_library_without_symbol_is_skipped() {
        let bare = TempDir::new().unwrap();
        let real = TempDir::new().unwrap();
        let Some(lib) = build_library(bare.path(), "libnetcdf.so", "int nc_open(void) { return 0; }\n")
        else {
            eprintln!("no C compiler, skipping");
            return;
        };
        build_library(real.path(), "libnetcdf.so", &libvers_source("4.3.0 $")).unwrap();

        assert!(matches!(query_libvers(&lib), Err(ProbeError::Load(_))));

        let probe = SharedLibraryProbe::new(Platform::Unix);
        let dirs = [bare.path().to_path_buf(), real.path().to_path_buf()];
        assert_eq!(probe.probe(&dirs).as_deref(), Some("4.3.0"));
    }
}
