//! Build configuration for netCDF4 bindings.
//!
//! Locates the HDF5 and netCDF4 installations a binding links against, checks
//! their versions and optional API, and produces the compile/link
//! specification of the binding module.
//!
//! Discovery runs in two stages:
//! 1. `nc-config`, when enabled and it works ([`ncconfig`])
//! 2. Otherwise a search for headers under configured or conventional
//!    prefixes ([`search`])
//!
//! Afterwards the runtime library is asked for its version ([`probe`]) and
//! `netcdf.h` is scanned for optional entry points ([`header`]).
//!
//! From a build script:
//! ```no_run
//! use ncbuild::{Config, extension::{Format, render}};
//!
//! let config = Config::load("ncbuild.toml".as_ref())?;
//! let spec = ncbuild::configure(&config, &ncbuild::probe::SharedLibraryProbe::default(), &Default::default())?;
//! print!("{}", render(&spec, Format::Cargo)?);
//! # Ok::<(), ncbuild::Error>(())
//! ```

pub mod config;
pub mod error;
pub mod extension;
pub mod header;
pub mod ncconfig;
pub mod probe;
pub mod search;

pub use config::Config;
pub use error::{Error, Result};

use extension::{ExtensionSpec, SourceMode};
use header::Capabilities;
use ncconfig::NcConfig;
use probe::VersionProbe;
use serde::Serialize;
use std::path::PathBuf;

/// Libraries and search directories for the compiler/linker. Order matters:
/// the first directory holding a header or library wins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LinkFlags {
    pub libs: Vec<String>,
    pub lib_dirs: Vec<PathBuf>,
    pub include_dirs: Vec<PathBuf>,
}

/// How the library locations were found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Method {
    NcConfig,
    Search,
}

/// Everything known about the installation after discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Discovery {
    pub method: Method,
    pub flags: LinkFlags,
    /// Runtime library version; None when the probe failed.
    pub version: Option<String>,
    pub capabilities: Capabilities,
}

/// Files touched when generating the binding from its template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigureOptions {
    pub mode: SourceMode,
    /// Where to write the capability constants ([`SourceMode::Generate`] only).
    pub constants: Option<PathBuf>,
    /// Previously generated source to delete ([`SourceMode::Generate`] only).
    pub clean: Option<PathBuf>,
}

impl Default for ConfigureOptions {
    fn default() -> Self {
        Self {
            mode: SourceMode::Precompiled,
            constants: None,
            clean: None,
        }
    }
}

/// Library names and directories, from `nc-config` or a header search.
///
/// A failing `nc-config` is not an error; the search runs instead. Only the
/// search can fail.
pub fn link_flags(config: &Config) -> Result<(Method, LinkFlags)> {
    if config.use_ncconfig {
        let tool = NcConfig::resolve(config);
        match tool.query() {
            Ok(flags) => {
                tracing::info!("using {} ...", tool.program().display());
                return Ok((Method::NcConfig, flags));
            }
            Err(e) => tracing::warn!("{e}; searching for headers instead"),
        }
    }
    search::discover(config).map(|flags| (Method::Search, flags))
}

/// Run discovery, the version probe and the capability scan.
pub fn discover(config: &Config, probe: &dyn VersionProbe) -> Result<Discovery> {
    let (method, mut flags) = link_flags(config)?;
    flags
        .include_dirs
        .extend(config.extra_include_dirs.iter().cloned());

    let version = probe.probe(&flags.lib_dirs);
    match &version {
        Some(v) => tracing::info!("using netcdf library version {v}"),
        None => tracing::warn!("unable to detect netcdf library version"),
    }

    let capabilities = header::capabilities(&flags.include_dirs);
    if capabilities.has_rename_grp {
        tracing::info!("netcdf lib has group rename capability");
    } else {
        tracing::info!("netcdf lib does not have group rename capability");
    }
    if capabilities.has_nc_inq_path {
        tracing::info!("netcdf lib has nc_inq_path function");
    } else {
        tracing::info!("netcdf lib does not have nc_inq_path function");
    }

    Ok(Discovery {
        method,
        flags,
        version,
        capabilities,
    })
}

/// Discover, prepare generated files, and build the extension specification.
pub fn configure(
    config: &Config,
    probe: &dyn VersionProbe,
    options: &ConfigureOptions,
) -> Result<ExtensionSpec> {
    let discovery = discover(config, probe)?;

    if options.mode == SourceMode::Generate {
        if let Some(stale) = &options.clean {
            extension::remove_stale_source(stale)?;
        }
        if let Some(path) = &options.constants {
            extension::write_constants(path, &discovery.capabilities)?;
        }
    }

    Ok(ExtensionSpec::new(discovery, options.mode))
}
