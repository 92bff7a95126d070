use clap::{Args, Parser, Subcommand};
use ncbuild::config::{DEFAULT_CONFIG_FILE, Settings};
use ncbuild::extension::{self, Format, SourceMode};
use ncbuild::probe::{Platform, SharedLibraryProbe, VersionProbe};
use ncbuild::{Config, ConfigureOptions, header};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

/// Locate HDF5/netCDF4 and configure the netCDF4 binding build
#[derive(Parser, Debug)]
#[command(name = "ncbuild", version)]
struct Cli {
    /// Show per-candidate detail
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Find the libraries and print the extension specification
    Discover(DiscoverArgs),

    /// Report the version of the netCDF shared library in the given directories
    ProbeVersion {
        /// Library directories, searched in order
        #[arg(required = true)]
        dirs: Vec<PathBuf>,

        /// Library naming convention (defaults to this platform's)
        #[arg(long, value_enum)]
        platform: Option<Platform>,
    },

    /// Report optional netCDF API found in netcdf.h
    Capabilities {
        /// Include directories, searched in order
        #[arg(required = true)]
        dirs: Vec<PathBuf>,
    },
}

#[derive(Args, Debug)]
struct DiscoverArgs {
    /// Config file (TOML); ignored if missing
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Output format
    #[arg(long, value_enum, default_value_t = Format::Human)]
    format: Format,

    /// Prefix to search instead of the standard locations (repeatable)
    #[arg(long = "search-prefix", value_name = "DIR")]
    search_prefixes: Vec<PathBuf>,

    /// Extra include directory appended after discovery (repeatable)
    #[arg(long = "include-dir", value_name = "DIR")]
    include_dirs: Vec<PathBuf>,

    /// Compile the binding template or the shipped C source
    #[arg(long, value_enum, default_value_t = SourceMode::Precompiled)]
    mode: SourceMode,

    /// Write capability constants here (generate mode)
    #[arg(long, value_name = "PATH")]
    constants: Option<PathBuf>,

    /// Delete this previously generated source first (generate mode)
    #[arg(long, value_name = "PATH")]
    clean: Option<PathBuf>,

    /// Library naming convention (defaults to this platform's)
    #[arg(long, value_enum)]
    platform: Option<Platform>,
}

impl DiscoverArgs {
    fn overrides(&self) -> Settings {
        Settings {
            search_prefixes: non_empty(&self.search_prefixes),
            extra_include_dirs: non_empty(&self.include_dirs),
            ..Settings::default()
        }
    }
}

fn non_empty(dirs: &[PathBuf]) -> Option<Vec<PathBuf>> {
    (!dirs.is_empty()).then(|| dirs.to_vec())
}

/// Progress goes to stdout unless stdout carries machine-readable output.
fn init_tracing(verbose: bool, to_stderr: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let writer = if to_stderr {
        BoxMakeWriter::new(std::io::stderr)
    } else {
        BoxMakeWriter::new(std::io::stdout)
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_target(false)
        .without_time()
        .init();
}

fn run(command: Command) -> ncbuild::Result<()> {
    match command {
        Command::Discover(args) => {
            let config = Config::load_with(&args.config, args.overrides())?;
            let probe = SharedLibraryProbe::new(args.platform.unwrap_or_else(Platform::current));
            let options = ConfigureOptions {
                mode: args.mode,
                constants: args.constants,
                clean: args.clean,
            };
            let spec = ncbuild::configure(&config, &probe, &options)?;
            print!("{}", extension::render(&spec, args.format)?);
        }
        Command::ProbeVersion { dirs, platform } => {
            let probe = SharedLibraryProbe::new(platform.unwrap_or_else(Platform::current));
            match probe.probe(&dirs) {
                Some(version) => println!("{version}"),
                None => {
                    tracing::warn!("unable to detect netcdf library version");
                    println!("unknown");
                }
            }
        }
        Command::Capabilities { dirs } => {
            print!("{}", extension::render_constants(&header::capabilities(&dirs)));
        }
    }
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    let machine_output = matches!(
        &cli.command,
        Command::Discover(DiscoverArgs {
            format: Format::Json | Format::Cargo,
            ..
        })
    );
    init_tracing(cli.verbose, machine_output);

    if let Err(e) = run(cli.command) {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
