//! Output layer for the qgep-datamodel CLI.
//!
//! Centralizes stdout/stderr separation and human vs JSON output modes.
//! - stdout: data (the "answer" - status, profiles, JSON)
//! - stderr: diagnostics (progress, warnings, human-mode errors, log lines)

use colored::{ColoredString, Colorize};
use serde::Serialize;

use crate::dispatch::RequirementsCheck;
use crate::error::DatamodelError;
use crate::reconcile::{Actions, Checks, Evaluation, ReconciliationState, Severity};
use crate::service::ConnectionProfile;
use crate::version::Version;

/// Output mode for the CLI
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputMode {
    Human,
    Json,
}

/// Output helper that centralizes all CLI output
#[derive(Debug, Clone)]
pub struct Output {
    pub mode: OutputMode,
    pub quiet: bool,
    pub verbose: bool,
}

impl Output {
    pub fn new(json: bool, quiet: bool, verbose: bool) -> Self {
        Self {
            mode: if json {
                OutputMode::Json
            } else {
                OutputMode::Human
            },
            quiet,
            verbose,
        }
    }

    /// Write JSON data to stdout
    /// Returns error if serialization fails (should be propagated to become JSON error)
    pub fn json<T: Serialize>(&self, data: &T) -> Result<(), serde_json::Error> {
        let json = serde_json::to_string_pretty(data)?;
        println!("{}", json);
        Ok(())
    }

    /// Write a diagnostic/progress message to stderr
    /// Suppressed in JSON mode and when --quiet is set
    pub fn info(&self, message: &str) {
        if self.mode == OutputMode::Json || self.quiet {
            return;
        }
        eprintln!("{}", message);
    }

    /// Write a verbose diagnostic message to stderr
    /// Only shown with --verbose in human mode
    pub fn verbose(&self, message: &str) {
        if self.mode == OutputMode::Json || self.quiet || !self.verbose {
            return;
        }
        eprintln!("{}", message);
    }

    /// Write a warning to stderr
    /// Shown in human mode unless --quiet, suppressed in JSON mode
    pub fn warn(&self, message: &str) {
        if self.mode == OutputMode::Json || self.quiet {
            return;
        }
        eprintln!("{} {}", "warning:".yellow().bold(), message);
    }

    /// Check if we're in JSON mode
    pub fn is_json(&self) -> bool {
        self.mode == OutputMode::Json
    }

    /// Check if we're in quiet mode
    pub fn is_quiet(&self) -> bool {
        self.quiet
    }
}

/// Color a label by severity: green ok, orange warning, red error.
pub fn paint(label: &str, severity: Severity) -> ColoredString {
    match severity {
        Severity::Ok => label.green().bold(),
        Severity::Warning => label.yellow().bold(),
        Severity::Error => label.red().bold(),
    }
}

/// `ok` in green or `label` in red.
pub fn check_label(ok: bool, failed: &str) -> ColoredString {
    if ok {
        paint("ok", Severity::Ok)
    } else {
        paint(failed, Severity::Error)
    }
}

// =============================================================================
// JSON Response Types
// =============================================================================

/// Tool version from Cargo.toml.
pub const TOOL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Schema version for JSON outputs.
pub const SCHEMA_VERSION: &str = "1.0.0";

/// JSON error response (written to stdout with non-zero exit).
#[derive(Debug, Serialize)]
pub struct JsonError {
    pub ok: bool,
    pub schema_id: &'static str,
    pub schema_version: &'static str,
    pub tool_version: &'static str,
    pub generated_at: String,
    pub errors: Vec<JsonErrorInfo>,
    /// Always null for error responses
    pub data: Option<()>,
}

#[derive(Debug, Serialize)]
pub struct JsonErrorInfo {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl JsonError {
    pub const SCHEMA_ID: &'static str = "qgep-datamodel.error";

    fn with_code(code: &'static str, message: String, details: Option<String>) -> Self {
        Self {
            ok: false,
            schema_id: Self::SCHEMA_ID,
            schema_version: SCHEMA_VERSION,
            tool_version: TOOL_VERSION,
            generated_at: chrono::Utc::now().to_rfc3339(),
            errors: vec![JsonErrorInfo {
                code,
                message,
                details,
            }],
            data: None,
        }
    }

    pub fn new(message: impl Into<String>) -> Self {
        Self::with_code("internal_error", message.into(), None)
    }

    pub fn with_details(message: impl Into<String>, details: impl Into<String>) -> Self {
        Self::with_code("internal_error", message.into(), Some(details.into()))
    }

    /// Error envelope carrying the domain error's stable code.
    pub fn from_datamodel(err: &DatamodelError, details: Option<String>) -> Self {
        Self::with_code(err.code(), err.to_string(), details)
    }

    /// Print this error as JSON to stdout
    pub fn print(&self) {
        match serde_json::to_string_pretty(self) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("Error: {}", e),
        }
    }
}

/// Where the service file was found.
#[derive(Debug, Serialize)]
pub struct ServiceFileJson {
    pub path: String,
    /// False when libpq will not look at this location by itself
    pub known: bool,
}

#[derive(Debug, Serialize)]
pub struct EvaluationJson {
    pub state: ReconciliationState,
    pub label: String,
    pub severity: Severity,
    pub target_version: Option<Version>,
    pub current_version: Option<Version>,
    pub upgrade_available: bool,
    pub actions: Actions,
}

impl From<&Evaluation> for EvaluationJson {
    fn from(e: &Evaluation) -> Self {
        Self {
            state: e.state,
            label: e.label(),
            severity: e.severity(),
            target_version: e.target.clone(),
            current_version: e.current.clone(),
            upgrade_available: e.upgrade_available(),
            actions: e.actions(),
        }
    }
}

/// JSON success response for the status command
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub ok: bool,
    pub schema_id: &'static str,
    pub schema_version: &'static str,
    pub tool_version: &'static str,
    pub generated_at: String,
    pub service_file: ServiceFileJson,
    pub service: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<ConnectionProfile>,
    pub requirements: RequirementsCheck,
    pub evaluation: EvaluationJson,
    pub checks: Checks,
    pub ready: bool,
}

impl StatusResponse {
    pub const SCHEMA_ID: &'static str = "qgep-datamodel.status";
}

#[derive(Debug, Serialize)]
pub struct ServiceListResponse {
    pub ok: bool,
    pub service_file: ServiceFileJson,
    pub services: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ServiceShowResponse {
    pub ok: bool,
    pub name: String,
    pub profile: ConnectionProfile,
    pub has_password: bool,
}

#[derive(Debug, Serialize)]
pub struct ServiceWriteResponse {
    pub ok: bool,
    pub name: String,
    pub created: bool,
    pub service_file: ServiceFileJson,
}

/// JSON response for init and upgrade
#[derive(Debug, Serialize)]
pub struct ActionResponse {
    pub ok: bool,
    pub action: &'static str,
    pub service: String,
    pub command: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonErrorInfo>,
    pub evaluation: EvaluationJson,
}

#[derive(Debug, Serialize)]
pub struct RequirementsResponse {
    pub ok: bool,
    pub requirements_file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonErrorInfo>,
    pub requirements: RequirementsCheck,
}

#[derive(Debug, Serialize)]
pub struct ProjectResponse {
    pub ok: bool,
    pub service: String,
    pub path: String,
}

// =============================================================================
// Meta UX JSON Response Types (--help, --version)
// =============================================================================

/// JSON response for --help flag
#[derive(Debug, Serialize)]
pub struct HelpResponse {
    pub ok: bool,
    pub help: String,
}

impl HelpResponse {
    pub fn new(help_text: String) -> Self {
        Self {
            ok: true,
            help: help_text,
        }
    }

    pub fn print(&self) {
        if let Ok(json) = serde_json::to_string_pretty(self) {
            println!("{}", json);
        }
    }
}

/// JSON response for --version flag
#[derive(Debug, Serialize)]
pub struct VersionResponse {
    pub ok: bool,
    pub version: String,
}

impl VersionResponse {
    pub fn new(version: String) -> Self {
        Self { ok: true, version }
    }

    pub fn print(&self) {
        if let Ok(json) = serde_json::to_string_pretty(self) {
            println!("{}", json);
        }
    }
}
