use anyhow::{Context, Result};
use clap::{error::ErrorKind, Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod config;
mod dispatch;
mod error;
mod exit_codes;
mod output;
mod pum;
mod reconcile;
mod resolver;
mod runner;
mod service;
#[cfg(test)]
mod testing;
mod version;

use commands::{AppContext, ServiceArgs};
use config::{Config, ServiceFileEnv, Settings};
use error::DatamodelError;
use output::{HelpResponse, JsonError, Output, VersionResponse};

/// Version from Cargo.toml
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// QGEP default coordinate reference system (CH1903+ / LV95)
const DEFAULT_SRID: u32 = 2056;

#[derive(Parser)]
#[command(name = "qgep-datamodel")]
#[command(version = VERSION)]
#[command(
    about = "Initialize and upgrade the QGEP datamodel",
    long_about = None
)]
#[command(subcommand_required = true, arg_required_else_help = true)]
struct Cli {
    /// pg_service name to work on (default: [service] default in config)
    #[arg(short = 's', long = "service", global = true)]
    service: Option<String>,

    /// Path to config file (default: ./qgep-datamodel.toml)
    #[arg(long = "config", global = true)]
    config_path: Option<PathBuf>,

    /// Minimal output (errors only)
    #[arg(long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Show SQL statements and commands being executed
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    /// Output as JSON instead of human-readable text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show datamodel, requirements, service and version status
    Status,
    /// Manage connection services in pg_service.conf
    Service {
        #[command(subcommand)]
        command: ServiceCommands,
    },
    /// Initialize the datamodel on an empty database
    Init {
        /// Spatial reference system id of the geometries
        #[arg(long, default_value_t = DEFAULT_SRID)]
        srid: u32,
        /// Do not ask for confirmation
        #[arg(short = 'y', long)]
        yes: bool,
    },
    /// Upgrade the datamodel to the latest delta
    Upgrade {
        /// Spatial reference system id of the geometries
        #[arg(long, default_value_t = DEFAULT_SRID)]
        srid: u32,
        /// Do not ask for confirmation
        #[arg(short = 'y', long)]
        yes: bool,
    },
    /// Python requirements of the migration tool
    Deps {
        #[command(subcommand)]
        command: DepsCommands,
    },
    /// Write the QGIS project bound to the selected service
    Project {
        /// Where to write the project (default: a new temporary .qgs file)
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,
        /// Skip the datamodel version check
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand)]
enum ServiceCommands {
    /// List services in file order
    List,
    /// Show a service's connection details (password masked)
    Show {
        /// Service name (default: the selected service)
        name: Option<String>,
    },
    /// Add a service, or overwrite an existing one
    Add {
        /// Service name
        name: String,
        /// Take connection details from a postgres:// URL
        #[arg(long, value_name = "URL")]
        from_url: Option<String>,
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<String>,
        #[arg(long)]
        dbname: Option<String>,
        #[arg(long)]
        user: Option<String>,
        #[arg(long)]
        password: Option<String>,
    },
}

#[derive(Subcommand)]
enum DepsCommands {
    /// Check that the requirements are installed
    Check,
    /// Install the requirements with pip --user
    Install,
}

fn init_logging(quiet: bool, verbose: bool) {
    let mut builder = env_logger::Builder::from_default_env();
    let level = if verbose {
        Some(log::LevelFilter::Info)
    } else if quiet {
        Some(log::LevelFilter::Error)
    } else if std::env::var_os("RUST_LOG").is_none() {
        Some(log::LevelFilter::Warn)
    } else {
        None
    };
    if let Some(level) = level {
        builder.filter_level(level);
    }
    builder
        .format_timestamp_secs()
        .format_module_path(false)
        .format_target(false)
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Load .env file if present (before parsing CLI so env vars are available)
    let _ = dotenvy::dotenv();

    // Check for --json flag early (before full parsing) for error handling
    let json_mode = std::env::args().any(|arg| arg == "--json");

    // Use try_parse to handle clap errors in JSON mode
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            if json_mode {
                match e.kind() {
                    ErrorKind::DisplayHelp => {
                        HelpResponse::new(e.to_string()).print();
                        std::process::exit(0);
                    }
                    ErrorKind::DisplayVersion => {
                        VersionResponse::new(VERSION.to_string()).print();
                        std::process::exit(0);
                    }
                    _ => {
                        JsonError::new(e.to_string()).print();
                        std::process::exit(2);
                    }
                }
            } else {
                // Human mode: let clap print its formatted output
                e.exit();
            }
        }
    };

    init_logging(cli.quiet, cli.verbose);
    let output = Output::new(cli.json, cli.quiet, cli.verbose);

    match run(cli, &output).await {
        Ok(code) => {
            if code != exit_codes::OK {
                std::process::exit(code);
            }
        }
        Err(e) => {
            let domain = e.downcast_ref::<DatamodelError>();
            let code = domain
                .map(DatamodelError::exit_code)
                .unwrap_or(exit_codes::OPERATIONAL_FAILURE);
            if json_mode {
                // Use full error chain for details (same as human mode)
                let full_chain = format!("{e:#}");
                let details = (full_chain != e.to_string()).then_some(full_chain);
                let json_err = match domain {
                    Some(err) => JsonError::from_datamodel(err, details),
                    None => JsonError::with_details(e.to_string(), format!("{e:#}")),
                };
                json_err.print();
            } else {
                // Human mode: error to stderr with full chain
                eprintln!("Error: {e:#}");
            }
            std::process::exit(code);
        }
    }
}

async fn run(cli: Cli, output: &Output) -> Result<i32> {
    let config = Config::load(cli.config_path.as_deref()).context("Failed to load configuration")?;
    let settings = Settings::new(&config, &ServiceFileEnv::from_process());
    output.verbose(&format!(
        "Using service file {}",
        settings.service_file.path.display()
    ));
    let ctx = AppContext::new(settings, cli.service);

    match cli.command {
        Commands::Status => commands::status(&ctx, output).await,
        Commands::Service { command } => {
            match command {
                ServiceCommands::List => commands::service_list(&ctx, output)?,
                ServiceCommands::Show { name } => {
                    commands::service_show(&ctx, output, name.as_deref())?
                }
                ServiceCommands::Add {
                    name,
                    from_url,
                    host,
                    port,
                    dbname,
                    user,
                    password,
                } => commands::service_add(
                    &ctx,
                    output,
                    &name,
                    ServiceArgs {
                        from_url,
                        host,
                        port,
                        dbname,
                        user,
                        password,
                    },
                )?,
            }
            Ok(exit_codes::OK)
        }
        Commands::Init { srid, yes } => commands::init(&ctx, output, srid, yes).await,
        Commands::Upgrade { srid, yes } => commands::upgrade(&ctx, output, srid, yes).await,
        Commands::Deps { command } => match command {
            DepsCommands::Check => commands::deps_check(&ctx, output).await,
            DepsCommands::Install => commands::deps_install(&ctx, output).await,
        },
        Commands::Project { output: path, force } => {
            commands::project(&ctx, output, path.as_deref(), force).await?;
            Ok(exit_codes::OK)
        }
    }
}
