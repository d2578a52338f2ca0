use anyhow::{bail, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default config file looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "qgep-datamodel.toml";

/// Service file name used under PGSYSCONFDIR and the settings directory.
pub const SERVICE_FILE_NAME: &str = "pg_service.conf";

/// Main configuration structure loaded from qgep-datamodel.toml
#[derive(Deserialize, Default, Debug)]
pub struct Config {
    pub paths: Option<PathsConfig>,
    pub service: Option<ServiceConfig>,
    pub tools: Option<ToolsConfig>,
    pub timeouts: Option<TimeoutsConfig>,
}

#[derive(Deserialize, Debug, Default)]
pub struct PathsConfig {
    /// Root of the datamodel package (holds delta/, scripts/, requirements.txt)
    pub datamodel: Option<String>,
    /// QGIS project template
    pub project: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
pub struct ServiceConfig {
    /// Explicit pg_service.conf location (wins over environment variables)
    pub file: Option<PathBuf>,
    /// Service used when --service is not given
    pub default: Option<String>,
}

/// External tool configuration
#[derive(Deserialize, Debug, Default)]
pub struct ToolsConfig {
    pub python: Option<String>,
    /// Migration tool argv prefix, e.g. ["pum"] or ["python3", "-m", "pum"]
    pub pum: Option<Vec<String>>,
}

/// Timeouts in seconds
#[derive(Deserialize, Debug, Default)]
pub struct TimeoutsConfig {
    pub command: Option<u64>,
    pub setup: Option<u64>,
    pub connect: Option<u64>,
}

impl Config {
    /// Load config from file, or return default if no config exists.
    /// If an explicit path is provided via --config, it MUST exist (error if not).
    /// If no path is provided, check ./qgep-datamodel.toml (use default if not found).
    pub fn load(path: Option<&Path>) -> Result<Self, anyhow::Error> {
        let config_path = match path {
            Some(p) => {
                if !p.exists() {
                    bail!("Config file not found: {}", p.display());
                }
                p
            }
            None => {
                let default_path = Path::new(CONFIG_FILE_NAME);
                if default_path.exists() {
                    default_path
                } else {
                    return Ok(Config::default());
                }
            }
        };

        let contents = fs::read_to_string(config_path)?;
        let config: Config = toml::from_str(&contents)
            .map_err(|e| anyhow::anyhow!("Failed to parse {}: {}", config_path.display(), e))?;

        config.validate_paths()?;

        Ok(config)
    }

    /// Validate that configured paths are safe (no path traversal)
    fn validate_paths(&self) -> Result<(), anyhow::Error> {
        if let Some(ref paths) = self.paths {
            if let Some(ref p) = paths.datamodel {
                Self::validate_path(p, "paths.datamodel")?;
            }
            if let Some(ref p) = paths.project {
                Self::validate_path(p, "paths.project")?;
            }
        }
        Ok(())
    }

    /// Validate a single path doesn't contain path traversal
    fn validate_path(path: &str, field: &str) -> Result<(), anyhow::Error> {
        if Path::new(path)
            .components()
            .any(|c| matches!(c, std::path::Component::ParentDir))
        {
            bail!(
                "Invalid {} path '{}': paths cannot contain '..'",
                field,
                path
            );
        }
        Ok(())
    }

    /// Get datamodel package root
    pub fn datamodel_dir(&self) -> &str {
        self.paths
            .as_ref()
            .and_then(|p| p.datamodel.as_deref())
            .unwrap_or("datamodel")
    }

    /// Get project template path
    pub fn project_template(&self) -> &str {
        self.paths
            .as_ref()
            .and_then(|p| p.project.as_deref())
            .unwrap_or("project/qgep.qgs")
    }

    pub fn default_service(&self) -> Option<&str> {
        self.service.as_ref().and_then(|s| s.default.as_deref())
    }

    pub fn python(&self) -> &str {
        self.tools
            .as_ref()
            .and_then(|t| t.python.as_deref())
            .unwrap_or("python3")
    }

    /// Migration tool argv prefix; defaults to running pum as a python module.
    pub fn pum_program(&self) -> Vec<String> {
        self.tools
            .as_ref()
            .and_then(|t| t.pum.clone())
            .filter(|argv| !argv.is_empty())
            .unwrap_or_else(|| vec![self.python().to_string(), "-m".into(), "pum".into()])
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(
            self.timeouts
                .as_ref()
                .and_then(|t| t.command)
                .unwrap_or(10),
        )
    }

    pub fn setup_timeout(&self) -> Duration {
        Duration::from_secs(self.timeouts.as_ref().and_then(|t| t.setup).unwrap_or(300))
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.timeouts.as_ref().and_then(|t| t.connect).unwrap_or(5))
    }
}

/// Where the pg_service file lives, and whether libpq will find it there.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceFileLocation {
    pub path: PathBuf,
    /// False when we fell back to our own settings directory: clients other
    /// than this tool will not see profiles written there unless
    /// PGSYSCONFDIR or PGSERVICEFILE point at it.
    pub known: bool,
}

/// Environment inputs for service file resolution, captured once.
#[derive(Debug, Clone, Default)]
pub struct ServiceFileEnv {
    pub pgservicefile: Option<String>,
    pub pgsysconfdir: Option<String>,
    pub home: Option<PathBuf>,
    pub settings_dir: Option<PathBuf>,
}

impl ServiceFileEnv {
    pub fn from_process() -> Self {
        Self {
            pgservicefile: non_empty_var("PGSERVICEFILE"),
            pgsysconfdir: non_empty_var("PGSYSCONFDIR"),
            home: dirs::home_dir(),
            settings_dir: dirs::config_dir().map(|d| d.join("qgep-datamodel")),
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

/// Resolve the pg_service file location.
///
/// Resolution order:
/// 1. `[service].file` in config
/// 2. PGSERVICEFILE
/// 3. PGSYSCONFDIR/pg_service.conf
/// 4. ~/.pg_service.conf, if it exists
/// 5. settings directory fallback (not known to libpq)
pub fn resolve_service_file(config: &Config, env: &ServiceFileEnv) -> ServiceFileLocation {
    if let Some(file) = config.service.as_ref().and_then(|s| s.file.clone()) {
        return ServiceFileLocation {
            path: file,
            known: true,
        };
    }
    if let Some(ref file) = env.pgservicefile {
        return ServiceFileLocation {
            path: PathBuf::from(file),
            known: true,
        };
    }
    if let Some(ref dir) = env.pgsysconfdir {
        return ServiceFileLocation {
            path: Path::new(dir).join(SERVICE_FILE_NAME),
            known: true,
        };
    }
    if let Some(ref home) = env.home {
        let user_file = home.join(".pg_service.conf");
        if user_file.exists() {
            return ServiceFileLocation {
                path: user_file,
                known: true,
            };
        }
    }
    let settings_dir = env
        .settings_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from("."));
    ServiceFileLocation {
        path: settings_dir.join(SERVICE_FILE_NAME),
        known: false,
    }
}

/// Every path and tool setting the components need, resolved once at startup.
#[derive(Debug, Clone)]
pub struct Settings {
    pub service_file: ServiceFileLocation,
    pub default_service: Option<String>,
    pub datamodel_dir: PathBuf,
    pub delta_dir: PathBuf,
    pub requirements: PathBuf,
    pub setup_script: PathBuf,
    pub project_template: PathBuf,
    pub python: String,
    pub pum: Vec<String>,
    pub command_timeout: Duration,
    pub setup_timeout: Duration,
    pub connect_timeout: Duration,
}

impl Settings {
    pub fn new(config: &Config, env: &ServiceFileEnv) -> Self {
        let datamodel_dir = PathBuf::from(config.datamodel_dir());
        Self {
            service_file: resolve_service_file(config, env),
            default_service: config.default_service().map(str::to_string),
            delta_dir: datamodel_dir.join("delta"),
            requirements: datamodel_dir.join("requirements.txt"),
            setup_script: datamodel_dir.join("scripts").join("db_setup.sh"),
            datamodel_dir,
            project_template: PathBuf::from(config.project_template()),
            python: config.python().to_string(),
            pum: config.pum_program(),
            command_timeout: config.command_timeout(),
            setup_timeout: config.setup_timeout(),
            connect_timeout: config.connect_timeout(),
        }
    }

    /// Settings rooted at `root`, used by tests.
    #[cfg(test)]
    pub fn for_root(root: &Path) -> Self {
        let config: Config = toml::from_str(&format!(
            "[paths]\ndatamodel = \"datamodel\"\n[service]\nfile = '{}'\n",
            root.join(SERVICE_FILE_NAME).display()
        ))
        .expect("test config parses");
        let mut settings = Settings::new(&config, &ServiceFileEnv::default());
        settings.datamodel_dir = root.join("datamodel");
        settings.delta_dir = settings.datamodel_dir.join("delta");
        settings.requirements = settings.datamodel_dir.join("requirements.txt");
        settings.setup_script = settings.datamodel_dir.join("scripts").join("db_setup.sh");
        settings.project_template = root.join("project").join("qgep.qgs");
        settings
    }
}
