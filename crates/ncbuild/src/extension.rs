//! The extension module specification handed to the compiler driver, and the
//! files generated alongside it.

use crate::header::Capabilities;
use crate::{Discovery, Error, Method, Result};
use serde::Serialize;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

/// Name of the binding module.
pub const MODULE_NAME: &str = "netCDF4";

/// Binding template compiled by the code generator.
pub const TEMPLATE_SOURCE: &str = "netCDF4.pyx";

/// C source produced from [`TEMPLATE_SOURCE`], shipped for builds without the
/// code generator.
pub const GENERATED_SOURCE: &str = "netCDF4.c";

/// Capability constants read by the template at generation time.
pub const CONSTANTS_FILE: &str = "constants.pyx";

/// Which binding source gets compiled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum SourceMode {
    /// Regenerate from the template; capability constants are written first.
    Generate,
    /// Compile the already generated C source as is.
    Precompiled,
}

impl SourceMode {
    pub fn source(self) -> &'static str {
        match self {
            SourceMode::Generate => TEMPLATE_SOURCE,
            SourceMode::Precompiled => GENERATED_SOURCE,
        }
    }
}

/// Compile/link specification of the binding module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtensionSpec {
    pub name: String,
    pub sources: Vec<PathBuf>,
    pub libraries: Vec<String>,
    pub library_dirs: Vec<PathBuf>,
    pub include_dirs: Vec<PathBuf>,
    pub runtime_library_dirs: Vec<PathBuf>,
    /// Runtime netCDF library version, if the probe got one.
    pub netcdf_version: Option<String>,
    pub capabilities: Capabilities,
    /// How the library locations were found.
    pub method: Method,
}

impl ExtensionSpec {
    pub fn new(discovery: Discovery, mode: SourceMode) -> Self {
        let flags = discovery.flags;
        Self {
            name: MODULE_NAME.to_string(),
            sources: vec![PathBuf::from(mode.source())],
            libraries: flags.libs,
            runtime_library_dirs: flags.lib_dirs.clone(),
            library_dirs: flags.lib_dirs,
            include_dirs: flags.include_dirs,
            netcdf_version: discovery.version,
            capabilities: discovery.capabilities,
            method: discovery.method,
        }
    }
}

/// Text of the capability constants file.
pub fn render_constants(caps: &Capabilities) -> String {
    format!(
        "DEF HAS_RENAME_GRP = {}\nDEF HAS_NC_INQ_PATH = {}\n",
        u8::from(caps.has_rename_grp),
        u8::from(caps.has_nc_inq_path)
    )
}

/// Write the capability constants file, replacing any previous one.
pub fn write_constants(path: &Path, caps: &Capabilities) -> Result<()> {
    std::fs::write(path, render_constants(caps)).map_err(|e| Error::io(path, e))?;
    tracing::info!("wrote {}", path.display());
    Ok(())
}

/// Delete a previously generated source so the generator runs again.
///
/// Returns whether a file was removed.
pub fn remove_stale_source(path: &Path) -> Result<bool> {
    match std::fs::remove_file(path) {
        Ok(()) => {
            tracing::info!("removed stale {}", path.display());
            Ok(true)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(Error::io(path, e)),
    }
}

/// Output format for an [`ExtensionSpec`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum Format {
    /// Aligned report for people.
    #[default]
    Human,
    /// Pretty-printed JSON.
    Json,
    /// `cargo:` build script directives.
    Cargo,
}

/// Render `spec` in `format`.
pub fn render(spec: &ExtensionSpec, format: Format) -> Result<String> {
    match format {
        Format::Human => Ok(render_human(spec)),
        Format::Json => Ok(serde_json::to_string_pretty(spec)? + "\n"),
        Format::Cargo => Ok(render_cargo(spec)),
    }
}

fn join_paths(paths: &[PathBuf], sep: &str) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(sep)
}

fn yes_no(flag: bool) -> &'static str {
    if flag { "yes" } else { "no" }
}

fn render_human(spec: &ExtensionSpec) -> String {
    let mut out = String::new();
    let method = match spec.method {
        Method::NcConfig => "nc-config",
        Method::Search => "header search",
    };
    let _ = writeln!(out, "extension {} (found via {method})", spec.name);
    let _ = writeln!(out, "  sources:        {}", join_paths(&spec.sources, " "));
    let _ = writeln!(out, "  libraries:      {}", spec.libraries.join(" "));
    let _ = writeln!(out, "  library dirs:   {}", join_paths(&spec.library_dirs, " "));
    let _ = writeln!(out, "  include dirs:   {}", join_paths(&spec.include_dirs, " "));
    let _ = writeln!(
        out,
        "  runtime dirs:   {}",
        join_paths(&spec.runtime_library_dirs, " ")
    );
    let _ = writeln!(
        out,
        "  netcdf version: {}",
        spec.netcdf_version.as_deref().unwrap_or("unknown")
    );
    let _ = writeln!(
        out,
        "  group rename:   {}",
        yes_no(spec.capabilities.has_rename_grp)
    );
    let _ = writeln!(
        out,
        "  nc_inq_path:    {}",
        yes_no(spec.capabilities.has_nc_inq_path)
    );
    out
}

fn render_cargo(spec: &ExtensionSpec) -> String {
    let mut out = String::new();
    for dir in &spec.library_dirs {
        let _ = writeln!(out, "cargo:rustc-link-search=native={}", dir.display());
    }
    for lib in &spec.libraries {
        let _ = writeln!(out, "cargo:rustc-link-lib={lib}");
    }
    let sep = if cfg!(windows) { ";" } else { ":" };
    let _ = writeln!(out, "cargo:include={}", join_paths(&spec.include_dirs, sep));

    for (cfg, enabled) in [
        ("has_rename_grp", spec.capabilities.has_rename_grp),
        ("has_nc_inq_path", spec.capabilities.has_nc_inq_path),
    ] {
        let _ = writeln!(out, "cargo:rustc-check-cfg=cfg({cfg})");
        if enabled {
            let _ = writeln!(out, "cargo:rustc-cfg={cfg}");
        }
    }
    if let Some(version) = &spec.netcdf_version {
        let _ = writeln!(out, "cargo:nc_version={version}");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LinkFlags;
    use tempfile::TempDir;

    fn discovery() -> Discovery {
        Discovery {
            method: Method::Search,
            flags: LinkFlags {
                libs: vec!["netcdf".into(), "hdf5_hl".into(), "hdf5".into(), "z".into()],
                lib_dirs: vec![PathBuf::from("/opt/nc/lib"), PathBuf::from("/opt/h5/lib")],
                include_dirs: vec![
                    PathBuf::from("/opt/nc/include"),
                    PathBuf::from("/opt/h5/include"),
                ],
            },
            version: Some("4.1.3".into()),
            capabilities: Capabilities {
                has_rename_grp: true,
                has_nc_inq_path: false,
            },
        }
    }

    #[test]
    fn test_spec_from_discovery() {
        let spec = ExtensionSpec::new(discovery(), SourceMode::Generate);
        assert_eq!(spec.name, "netCDF4");
        assert_eq!(spec.sources, vec![PathBuf::from("netCDF4.pyx")]);
        assert_eq!(spec.runtime_library_dirs, spec.library_dirs);

        let spec = ExtensionSpec::new(discovery(), SourceMode::Precompiled);
        assert_eq!(spec.sources, vec![PathBuf::from("netCDF4.c")]);
    }

    #[test]
    fn test_render_constants() {
        let caps = Capabilities {
            has_rename_grp: true,
            has_nc_inq_path: false,
        };
        assert_eq!(
            render_constants(&caps),
            "DEF HAS_RENAME_GRP = 1\nDEF HAS_NC_INQ_PATH = 0\n"
        );
        assert_eq!(
            render_constants(&Capabilities::default()),
            "DEF HAS_RENAME_GRP = 0\nDEF HAS_NC_INQ_PATH = 0\n"
        );
    }

    #[test]
    fn test_write_constants_and_remove_stale() {
        let dir = TempDir::new().unwrap();
        let constants = dir.path().join(CONSTANTS_FILE);
        let stale = dir.path().join(GENERATED_SOURCE);

        write_constants(&constants, &Capabilities::default()).unwrap();
        assert!(std::fs::read_to_string(&constants)
            .unwrap()
            .contains("HAS_RENAME_GRP = 0"));

        assert!(!remove_stale_source(&stale).unwrap());
        std::fs::write(&stale, "/* generated */").unwrap();
        assert!(remove_stale_source(&stale).unwrap());
        assert!(!stale.exists());
    }

    #[test]
    fn test_render_cargo() {
        let spec = ExtensionSpec::new(discovery(), SourceMode::Precompiled);
        let out = render(&spec, Format::Cargo).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "cargo:rustc-link-search=native=/opt/nc/lib");
        assert_eq!(lines[2], "cargo:rustc-link-lib=netcdf");
        assert!(lines.contains(&"cargo:rustc-cfg=has_rename_grp"));
        assert!(!lines.contains(&"cargo:rustc-cfg=has_nc_inq_path"));
        assert!(lines.contains(&"cargo:rustc-check-cfg=cfg(has_nc_inq_path)"));
        assert!(lines.contains(&"cargo:nc_version=4.1.3"));
    }

    #[test]
    fn test_render_json() {
        let spec = ExtensionSpec::new(discovery(), SourceMode::Generate);
        let out = render(&spec, Format::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["libraries"][0], "netcdf");
        assert_eq!(value["method"], "search");
        assert_eq!(value["capabilities"]["has_rename_grp"], true);
        assert_eq!(value["netcdf_version"], "4.1.3");
    }

    #[test]
    fn test_render_human_unknown_version() {
        let mut d = discovery();
        d.version = None;
        let out = render(&ExtensionSpec::new(d, SourceMode::Generate), Format::Human).unwrap();
        assert!(out.contains("netcdf version: unknown"));
        assert!(out.contains("group rename:   yes"));
    }
}
