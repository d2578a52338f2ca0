//! Domain errors for qgep-datamodel.
//!
//! Every component returns `Result<T, DatamodelError>`. The CLI layer wraps
//! these in `anyhow` and downcasts back to the variant to choose an exit code
//! and a single user-facing message.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::exit_codes;

#[derive(Debug, Error)]
pub enum DatamodelError {
    /// The pg_service file could not be written.
    #[error("could not write service file {}: {reason}", path.display())]
    ConfigWrite { path: PathBuf, reason: String },

    /// The pg_service file exists but could not be read or parsed.
    #[error("could not read service file {}: {reason}", path.display())]
    ConfigRead { path: PathBuf, reason: String },

    /// Any connection-level failure. Causes are not distinguished here;
    /// the reconciliation probes tell them apart.
    #[error("{message}\nCommand:\n{statement}")]
    DatabaseConnection { statement: String, message: String },

    /// External command exited non-zero.
    #[error("{command} exited with code {exit_code}\n\nOutput:\n{stdout}\n\nError:\n{stderr}")]
    Command {
        command: String,
        exit_code: i32,
        stdout: String,
        stderr: String,
    },

    /// External command exceeded its timeout and was killed.
    #[error("{command} timed out after {}s", timeout.as_secs())]
    Timeout { command: String, timeout: Duration },

    /// No `delta_<version>_...` entry found in the delta directory.
    #[error("no delta found in {}", dir.display())]
    NoTargetVersion { dir: PathBuf },

    /// The metadata table answered but holds no usable version.
    #[error("no version recorded in {table} for service '{service}'")]
    NoCurrentVersion { service: String, table: String },

    #[error("invalid service: {0}")]
    InvalidProfile(String),

    #[error("invalid version '{0}'")]
    InvalidVersion(String),

    #[error("{action} is not supported on {platform}")]
    UnsupportedPlatform {
        action: &'static str,
        platform: String,
    },

    /// The requested action is not legal in the current reconciliation state.
    #[error("cannot {action}: datamodel is {state}")]
    InvalidState { action: &'static str, state: String },

    #[error("{0} was not confirmed")]
    NotConfirmed(&'static str),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl DatamodelError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        DatamodelError::Io {
            context: context.into(),
            source,
        }
    }

    /// Exit code for this error when it reaches the CLI boundary.
    pub fn exit_code(&self) -> i32 {
        match self {
            DatamodelError::ConfigWrite { .. }
            | DatamodelError::ConfigRead { .. }
            | DatamodelError::InvalidProfile(_)
            | DatamodelError::NoTargetVersion { .. } => exit_codes::CONFIG_ERROR,
            DatamodelError::DatabaseConnection { .. } | DatamodelError::NoCurrentVersion { .. } => {
                exit_codes::CONNECTION_FAILURE
            }
            DatamodelError::Command { .. } | DatamodelError::Timeout { .. } => {
                exit_codes::COMMAND_FAILED
            }
            DatamodelError::UnsupportedPlatform { .. } => exit_codes::UNSUPPORTED_PLATFORM,
            DatamodelError::InvalidState { .. } => exit_codes::NOT_ACTIONABLE,
            DatamodelError::InvalidVersion(_)
            | DatamodelError::NotConfirmed(_)
            | DatamodelError::Io { .. } => exit_codes::OPERATIONAL_FAILURE,
        }
    }

    /// Stable machine-readable code for JSON error envelopes.
    pub fn code(&self) -> &'static str {
        match self {
            DatamodelError::ConfigWrite { .. } => "config_write",
            DatamodelError::ConfigRead { .. } => "config_read",
            DatamodelError::DatabaseConnection { .. } => "database_connection",
            DatamodelError::Command { .. } => "command_failed",
            DatamodelError::Timeout { .. } => "timeout",
            DatamodelError::NoTargetVersion { .. } => "no_target_version",
            DatamodelError::NoCurrentVersion { .. } => "no_current_version",
            DatamodelError::InvalidProfile(_) => "invalid_profile",
            DatamodelError::InvalidVersion(_) => "invalid_version",
            DatamodelError::UnsupportedPlatform { .. } => "unsupported_platform",
            DatamodelError::InvalidState { .. } => "invalid_state",
            DatamodelError::NotConfirmed(_) => "not_confirmed",
            DatamodelError::Io { .. } => "io",
        }
    }
}

pub type Result<T, E = DatamodelError> = std::result::Result<T, E>;
