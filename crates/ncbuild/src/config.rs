//! Configuration for ncbuild.
//!
//! Settings come from two layers, merged once into an immutable [`Config`]:
//! 1. Environment: `HDF5_DIR`, `NETCDF4_INCDIR`, `USE_NCCONFIG`, ...
//! 2. Config file: `ncbuild.toml` in the working directory (overrides env)
//!
//! Example ncbuild.toml:
//! ```toml
//! [directories]
//! HDF5_dir = "/opt/hdf5"
//! netCDF4_dir = "/opt/netcdf"
//! szip_libdir = "/opt/szip/lib"
//! szip_incdir = "/opt/szip/include"
//!
//! [options]
//! use_ncconfig = true
//! ncconfig = "/opt/netcdf/bin/nc-config"
//! ```
//!
//! Keys are matched case-insensitively. Keys that are missing or carry a value
//! of the wrong type leave the environment value in place.
//!
//! `USE_NCCONFIG` / `use_ncconfig` turn `nc-config` on for any value except
//! the empty string, `0`, `false`, `no` and `off` (case-insensitive). Setting
//! it to `0` therefore disables the helper instead of enabling it.

use crate::{Error, Result};
use std::path::{Path, PathBuf};

/// Default config file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "ncbuild.toml";

/// A native dependency the binding links against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dependency {
    Hdf5,
    Netcdf4,
    Szip,
}

impl Dependency {
    /// Display name.
    pub fn name(self) -> &'static str {
        match self {
            Dependency::Hdf5 => "HDF5",
            Dependency::Netcdf4 => "netCDF4",
            Dependency::Szip => "szip",
        }
    }

    /// Prefix of the environment variables (`HDF5` -> `HDF5_DIR`).
    fn env_prefix(self) -> &'static str {
        match self {
            Dependency::Hdf5 => "HDF5",
            Dependency::Netcdf4 => "NETCDF4",
            Dependency::Szip => "SZIP",
        }
    }
}

/// Root/include/lib overrides for one dependency.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyDirs {
    /// Installation prefix (`<root>/include`, `<root>/lib`).
    pub root: Option<PathBuf>,
    /// Header directory.
    pub include: Option<PathBuf>,
    /// Library directory.
    pub lib: Option<PathBuf>,
}

impl DependencyDirs {
    /// Values set in `other` win.
    pub fn overlay(self, other: DependencyDirs) -> DependencyDirs {
        DependencyDirs {
            root: other.root.or(self.root),
            include: other.include.or(self.include),
            lib: other.lib.or(self.lib),
        }
    }

    /// Whether neither a root nor an include directory is configured.
    pub fn is_unset(&self) -> bool {
        self.root.is_none() && self.include.is_none()
    }

    /// Explicit include directory, else `<root>/include`.
    pub fn include_dir(&self) -> Option<PathBuf> {
        self.include
            .clone()
            .or_else(|| self.root.as_ref().map(|r| r.join("include")))
    }

    /// Explicit library directory, else `<root>/lib`.
    pub fn lib_dir(&self) -> Option<PathBuf> {
        self.lib
            .clone()
            .or_else(|| self.root.as_ref().map(|r| r.join("lib")))
    }
}

/// One layer of raw settings. Every field is optional so layers can be
/// stacked with [`Settings::overlay`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    pub hdf5: DependencyDirs,
    pub netcdf4: DependencyDirs,
    pub szip: DependencyDirs,
    pub use_ncconfig: Option<bool>,
    pub ncconfig: Option<PathBuf>,
    pub search_prefixes: Option<Vec<PathBuf>>,
    pub extra_include_dirs: Option<Vec<PathBuf>>,
}

impl Settings {
    /// Read the environment layer from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the environment layer through `lookup`. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: String| lookup(&key).filter(|v| !v.is_empty());
        let dirs = |dep: Dependency| {
            let prefix = dep.env_prefix();
            DependencyDirs {
                root: var(format!("{prefix}_DIR")).map(PathBuf::from),
                include: var(format!("{prefix}_INCDIR")).map(PathBuf::from),
                lib: var(format!("{prefix}_LIBDIR")).map(PathBuf::from),
            }
        };

        Settings {
            hdf5: dirs(Dependency::Hdf5),
            netcdf4: dirs(Dependency::Netcdf4),
            szip: dirs(Dependency::Szip),
            use_ncconfig: var("USE_NCCONFIG".to_string()).map(|v| parse_flag(&v)),
            ..Settings::default()
        }
    }

    /// Read the file layer. A missing file yields `Ok(None)`.
    pub fn from_file(path: &Path) -> Result<Option<Self>> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::io(path, e)),
        };
        tracing::info!("reading from {}...", path.display());
        Self::from_toml(&content)
            .map(Some)
            .map_err(|message| Error::Config {
                path: path.to_path_buf(),
                message,
            })
    }

    /// Parse the file layer from TOML text.
    pub fn from_toml(content: &str) -> std::result::Result<Self, String> {
        let table: toml::Table = toml::from_str(content).map_err(|e| e.to_string())?;
        let dirs = |prefix: &str| DependencyDirs {
            root: path_value(lookup(&table, "directories", &format!("{prefix}_dir"))),
            include: path_value(lookup(&table, "directories", &format!("{prefix}_incdir"))),
            lib: path_value(lookup(&table, "directories", &format!("{prefix}_libdir"))),
        };

        Ok(Settings {
            hdf5: dirs("hdf5"),
            netcdf4: dirs("netcdf4"),
            szip: dirs("szip"),
            use_ncconfig: flag_value(lookup(&table, "options", "use_ncconfig")),
            ncconfig: path_value(lookup(&table, "options", "ncconfig")),
            search_prefixes: path_list(lookup(&table, "options", "search_prefixes")),
            extra_include_dirs: path_list(lookup(&table, "options", "extra_include_dirs")),
        })
    }

    /// Stack `other` on top of `self`; values set in `other` win.
    pub fn overlay(self, other: Settings) -> Settings {
        Settings {
            hdf5: self.hdf5.overlay(other.hdf5),
            netcdf4: self.netcdf4.overlay(other.netcdf4),
            szip: self.szip.overlay(other.szip),
            use_ncconfig: other.use_ncconfig.or(self.use_ncconfig),
            ncconfig: other.ncconfig.or(self.ncconfig),
            search_prefixes: other.search_prefixes.or(self.search_prefixes),
            extra_include_dirs: other.extra_include_dirs.or(self.extra_include_dirs),
        }
    }
}

/// Merged, immutable configuration threaded through discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub hdf5: DependencyDirs,
    pub netcdf4: DependencyDirs,
    pub szip: DependencyDirs,
    /// Try `nc-config` before searching the filesystem.
    pub use_ncconfig: bool,
    /// Explicit path to the `nc-config` helper.
    pub ncconfig: Option<PathBuf>,
    /// Prefixes searched, in order, when a dependency has no configured location.
    pub search_prefixes: Vec<PathBuf>,
    /// Include directories appended after discovery (the binding's own headers).
    pub extra_include_dirs: Vec<PathBuf>,
}

impl Config {
    /// Environment first, then `config_file` on top of it.
    pub fn load(config_file: &Path) -> Result<Self> {
        Self::load_with(config_file, Settings::default())
    }

    /// Like [`Config::load`], with `overrides` (e.g. command-line flags) on top.
    pub fn load_with(config_file: &Path, overrides: Settings) -> Result<Self> {
        let env = Settings::from_env();
        let settings = match Settings::from_file(config_file)? {
            Some(file) => env.overlay(file),
            None => env,
        };
        Ok(Self::from_settings(settings.overlay(overrides)))
    }

    pub fn from_settings(settings: Settings) -> Self {
        Config {
            hdf5: settings.hdf5,
            netcdf4: settings.netcdf4,
            szip: settings.szip,
            use_ncconfig: settings.use_ncconfig.unwrap_or(false),
            ncconfig: settings.ncconfig,
            search_prefixes: settings
                .search_prefixes
                .unwrap_or_else(default_search_prefixes),
            extra_include_dirs: settings.extra_include_dirs.unwrap_or_default(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_settings(Settings::default())
    }
}

/// Conventional installation prefixes, searched in this order.
pub fn default_search_prefixes() -> Vec<PathBuf> {
    let mut prefixes: Vec<PathBuf> = dirs::home_dir().into_iter().collect();
    prefixes.extend(
        ["/usr/local", "/sw", "/opt", "/opt/local", "/usr"]
            .iter()
            .map(PathBuf::from),
    );
    prefixes
}

/// Interpret a `use_ncconfig` value. Anything but an explicit "off" enables it.
pub fn parse_flag(value: &str) -> bool {
    !matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "" | "0" | "false" | "no" | "off"
    )
}

/// Case-insensitive `[section] key` lookup.
fn lookup<'a>(table: &'a toml::Table, section: &str, key: &str) -> Option<&'a toml::Value> {
    let section = table
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(section))?
        .1
        .as_table()?;
    section
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(key))
        .map(|(_, value)| value)
}

fn path_value(value: Option<&toml::Value>) -> Option<PathBuf> {
    value
        .and_then(toml::Value::as_str)
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
}

fn flag_value(value: Option<&toml::Value>) -> Option<bool> {
    match value? {
        toml::Value::Boolean(b) => Some(*b),
        toml::Value::Integer(i) => Some(*i != 0),
        toml::Value::String(s) => Some(parse_flag(s)),
        _ => None,
    }
}

fn path_list(value: Option<&toml::Value>) -> Option<Vec<PathBuf>> {
    let items = value?.as_array()?;
    Some(
        items
            .iter()
            .filter_map(toml::Value::as_str)
            .map(PathBuf::from)
            .collect(),
    )
}
