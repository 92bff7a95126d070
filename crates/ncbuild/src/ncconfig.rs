//! `nc-config` adapter.
//!
//! netCDF installs a small script that reports the compiler and linker flags
//! of the installation. When it works it is more accurate than searching the
//! filesystem, so it is tried first when enabled.

use crate::LinkFlags;
use crate::config::Config;
use std::path::{Path, PathBuf};
use std::process::Command;

const NCCONFIG: &str = "nc-config";

/// Why the helper could not be used. Never fatal: discovery falls back to a
/// filesystem search.
#[derive(Debug, thiserror::Error)]
pub enum NcConfigError {
    #[error("failed to run {}: {source}", program.display())]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("`{} {arg}` exited with {status}", program.display())]
    Failed {
        program: PathBuf,
        arg: &'static str,
        status: std::process::ExitStatus,
    },
}

/// The `nc-config` helper of one netCDF installation.
#[derive(Debug, Clone)]
pub struct NcConfig {
    program: PathBuf,
}

impl NcConfig {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Pick the helper for `config`.
    ///
    /// Order: the `ncconfig` option, then `<netCDF4 root>/bin/nc-config`, then
    /// `nc-config` on `PATH`.
    pub fn resolve(config: &Config) -> Self {
        if let Some(program) = &config.ncconfig {
            return Self::new(program);
        }
        if let Some(root) = &config.netcdf4.root {
            return Self::new(root.join("bin").join(NCCONFIG));
        }
        Self::new(which::which(NCCONFIG).unwrap_or_else(|_| PathBuf::from(NCCONFIG)))
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Query libraries, library dirs and include dirs.
    ///
    /// `--libs` supplies `-l`/`-L` tokens, `--cflags` supplies `-I` tokens.
    pub fn query(&self) -> Result<LinkFlags, NcConfigError> {
        let libs = parse_flags(&self.run("--libs")?);
        let cflags = parse_flags(&self.run("--cflags")?);
        Ok(LinkFlags {
            libs: libs.libs,
            lib_dirs: libs.lib_dirs,
            include_dirs: cflags.include_dirs,
        })
    }

    fn run(&self, arg: &'static str) -> Result<String, NcConfigError> {
        tracing::debug!("running {} {arg}", self.program.display());
        let output = Command::new(&self.program)
            .arg(arg)
            .output()
            .map_err(|source| NcConfigError::Spawn {
                program: self.program.clone(),
                source,
            })?;
        if !output.status.success() {
            return Err(NcConfigError::Failed {
                program: self.program.clone(),
                arg,
                status: output.status,
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Classify whitespace-separated compiler/linker tokens.
///
/// `-l` is a library, `-L` a library dir, `-I` an include dir. Anything else
/// (`-Wl,...`, `-D...`, bare paths) is ignored.
pub fn parse_flags(output: &str) -> LinkFlags {
    let mut flags = LinkFlags::default();
    for token in output.split_whitespace() {
        if let Some(lib) = token.strip_prefix("-l") {
            flags.libs.push(lib.to_string());
        } else if let Some(dir) = token.strip_prefix("-L") {
            flags.lib_dirs.push(PathBuf::from(dir));
        } else if let Some(dir) = token.strip_prefix("-I") {
            flags.include_dirs.push(PathBuf::from(dir));
        }
    }
    flags
}
