//! Manual discovery: find HDF5, netCDF4 and szip without `nc-config`.
//!
//! A dependency with a configured root or include directory is checked there
//! and nowhere else. One without is searched for under the configured
//! prefixes, first accepted prefix wins.

use crate::config::{Config, Dependency, DependencyDirs};
use crate::header;
use crate::{Error, LinkFlags, Result};
use std::path::{Path, PathBuf};

/// Libraries every manual build links, in link order.
pub const BASE_LIBS: &[&str] = &["netcdf", "hdf5_hl", "hdf5", "z"];

/// Library added when szip is configured.
pub const SZIP_LIB: &str = "sz";

/// Locate HDF5 and netCDF4 and assemble the link flags.
pub fn discover(config: &Config) -> Result<LinkFlags> {
    let hdf5 = locate_hdf5(config)?;
    let netcdf4 = locate_netcdf4(config)?;

    let mut flags = LinkFlags {
        libs: BASE_LIBS.iter().map(|lib| lib.to_string()).collect(),
        lib_dirs: [netcdf4.lib_dir(), hdf5.lib_dir()]
            .into_iter()
            .flatten()
            .collect(),
        include_dirs: [netcdf4.include_dir(), hdf5.include_dir()]
            .into_iter()
            .flatten()
            .collect(),
    };

    if let (Some(include), Some(lib)) = (config.szip.include_dir(), config.szip.lib_dir()) {
        tracing::info!("linking szip from {}", lib.display());
        flags.libs.push(SZIP_LIB.to_string());
        flags.lib_dirs.push(lib);
        flags.include_dirs.push(include);
    }

    Ok(flags)
}

/// Resolve HDF5 (>= 1.8.0) to a root/include pair.
pub fn locate_hdf5(config: &Config) -> Result<DependencyDirs> {
    let accept = |include: &Path| {
        header::hdf5_version(include).is_some_and(|v| header::hdf5_version_ok(&v))
    };

    match config.hdf5.include_dir() {
        Some(include) => {
            let version =
                header::hdf5_version(&include).ok_or_else(|| Error::HdfNotFoundIn(include.clone()))?;
            if !header::hdf5_version_ok(&version) {
                return Err(Error::HdfTooOld {
                    required: header::MIN_HDF5_VERSION,
                    found: version,
                });
            }
            tracing::info!("HDF5 {version} headers in {}", include.display());
            Ok(with_include(&config.hdf5, include))
        }
        None => search(Dependency::Hdf5, &config.hdf5, &config.search_prefixes, accept)
            .ok_or(Error::HdfNotFound),
    }
}

/// Resolve netCDF4 (built with netCDF-4 support) to a root/include pair.
pub fn locate_netcdf4(config: &Config) -> Result<DependencyDirs> {
    match config.netcdf4.include_dir() {
        Some(include) => {
            if !header::is_netcdf4(&include) {
                return Err(Error::NetcdfNotFoundIn(include));
            }
            tracing::info!("netCDF4 headers in {}", include.display());
            Ok(with_include(&config.netcdf4, include))
        }
        None => search(
            Dependency::Netcdf4,
            &config.netcdf4,
            &config.search_prefixes,
            header::is_netcdf4,
        )
        .ok_or(Error::NetcdfNotFound),
    }
}

fn with_include(dirs: &DependencyDirs, include: PathBuf) -> DependencyDirs {
    DependencyDirs {
        include: Some(include),
        ..dirs.clone()
    }
}

/// First prefix whose `include/` passes `accept`, as a root.
///
/// An explicitly configured library directory is kept.
fn search(
    dep: Dependency,
    dirs: &DependencyDirs,
    prefixes: &[PathBuf],
    accept: impl Fn(&Path) -> bool,
) -> Option<DependencyDirs> {
    tracing::info!(
        "{} location not set, checking standard locations...",
        dep.name()
    );
    for prefix in prefixes {
        tracing::info!("checking {} ...", prefix.display());
        let include = prefix.join("include");
        if accept(&include) {
            tracing::info!("{} found in {}", dep.name(), prefix.display());
            return Some(DependencyDirs {
                root: Some(prefix.clone()),
                include: Some(include),
                lib: dirs.lib.clone(),
            });
        }
    }
    None
}
