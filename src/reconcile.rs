//! Version-state reconciliation.
//!
//! Combines the target version (on disk), the current version (in the
//! database) and, when the latter cannot be read, two connectivity probes
//! into exactly one [`ReconciliationState`]. The state decides which actions
//! are legal.

use serde::Serialize;
use std::fmt;
use std::path::Path;

use crate::resolver;
use crate::runner::{DbTarget, Runner};
use crate::version::Version;

const PROBE_SQL: &str = "SELECT 1;";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconciliationState {
    NotInitialized,
    UpToDate,
    /// Part of the state set, but `current < target` is reported as
    /// `UpToDate` with `upgrade_available`, so `reconcile` never yields it.
    #[allow(dead_code)]
    NeedsUpgrade,
    CannotDowngrade,
    ConnectionUnavailable,
    DatabaseMissing,
    NoTargetFound,
    NoProfileSelected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Ok,
    Warning,
    Error,
}

impl ReconciliationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReconciliationState::NotInitialized => "not_initialized",
            ReconciliationState::UpToDate => "up_to_date",
            ReconciliationState::NeedsUpgrade => "needs_upgrade",
            ReconciliationState::CannotDowngrade => "cannot_downgrade",
            ReconciliationState::ConnectionUnavailable => "connection_unavailable",
            ReconciliationState::DatabaseMissing => "database_missing",
            ReconciliationState::NoTargetFound => "no_target_found",
            ReconciliationState::NoProfileSelected => "no_profile_selected",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            ReconciliationState::UpToDate => Severity::Ok,
            ReconciliationState::NotInitialized
            | ReconciliationState::DatabaseMissing
            | ReconciliationState::NeedsUpgrade => Severity::Warning,
            ReconciliationState::CannotDowngrade
            | ReconciliationState::ConnectionUnavailable
            | ReconciliationState::NoTargetFound
            | ReconciliationState::NoProfileSelected => Severity::Error,
        }
    }
}

impl fmt::Display for ReconciliationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which actions the state allows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Actions {
    pub initialize_visible: bool,
    pub upgrade_visible: bool,
    pub upgrade_enabled: bool,
}

/// Result of one reconciliation pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Evaluation {
    pub state: ReconciliationState,
    pub target: Option<Version>,
    pub current: Option<Version>,
}

impl Evaluation {
    fn new(
        state: ReconciliationState,
        target: Option<&Version>,
        current: Option<Version>,
    ) -> Self {
        Self {
            state,
            target: target.cloned(),
            current,
        }
    }

    pub fn actions(&self) -> Actions {
        Actions {
            initialize_visible: self.state == ReconciliationState::NotInitialized,
            upgrade_visible: self.current.is_some(),
            upgrade_enabled: self.state == ReconciliationState::UpToDate,
        }
    }

    /// True when the datamodel is behind the deltas on disk.
    pub fn upgrade_available(&self) -> bool {
        match (&self.current, &self.target) {
            (Some(current), Some(target)) => current < target,
            _ => false,
        }
    }

    pub fn severity(&self) -> Severity {
        self.state.severity()
    }

    /// Short human label for the state.
    pub fn label(&self) -> String {
        match (self.state, &self.current) {
            (ReconciliationState::UpToDate, Some(current)) => current.to_string(),
            (ReconciliationState::NeedsUpgrade, Some(current)) => {
                format!("{} (upgrade available)", current)
            }
            (ReconciliationState::CannotDowngrade, Some(current)) => {
                format!("{} (cannot downgrade)", current)
            }
            (ReconciliationState::NoProfileSelected, _) => "service not selected".to_string(),
            (ReconciliationState::NoTargetFound, _) => "no delta in datamodel".to_string(),
            (ReconciliationState::NotInitialized, _) => "qgep not initialized".to_string(),
            (ReconciliationState::DatabaseMissing, _) => "database does not exist".to_string(),
            (ReconciliationState::ConnectionUnavailable, _) => {
                "could not connect to database".to_string()
            }
            (state, None) => state.as_str().replace('_', " "),
        }
    }
}

/// Decide the reconciliation state. First matching rule wins:
///
/// 1. no profile selected
/// 2. no target version
/// 3. current version readable: `<=` target is up to date, `>` cannot downgrade
/// 4. otherwise probe the service database, then the administrative database
///
/// No side effects besides at most one metadata query and two probes.
pub async fn reconcile<R: Runner>(
    runner: &R,
    service: Option<&str>,
    target: Option<&Version>,
) -> Evaluation {
    let Some(service) = service.filter(|s| !s.is_empty()) else {
        return Evaluation::new(ReconciliationState::NoProfileSelected, target, None);
    };

    let Some(target_version) = target else {
        return Evaluation::new(ReconciliationState::NoTargetFound, None, None);
    };

    match resolver::current_version(runner, service).await {
        Ok(current) => {
            let state = if current <= *target_version {
                ReconciliationState::UpToDate
            } else {
                ReconciliationState::CannotDowngrade
            };
            Evaluation::new(state, target, Some(current))
        }
        Err(e) => {
            // A missing metadata table and an unreachable server fail the same way
            log::info!("Current version unavailable, probing: {}", e);
            let state = probe(runner, service).await;
            Evaluation::new(state, target, None)
        }
    }
}

async fn probe<R: Runner>(runner: &R, service: &str) -> ReconciliationState {
    if runner
        .run_sql(service, PROBE_SQL, DbTarget::Service, false)
        .await
        .is_ok()
    {
        return ReconciliationState::NotInitialized;
    }

    match runner
        .run_sql(service, PROBE_SQL, DbTarget::Admin, false)
        .await
    {
        Ok(_) => ReconciliationState::DatabaseMissing,
        Err(e) => {
            log::info!("Administrative database unreachable: {}", e);
            ReconciliationState::ConnectionUnavailable
        }
    }
}

/// Resolve the target from `delta_dir` and reconcile against it.
pub async fn evaluate<R: Runner>(runner: &R, delta_dir: &Path, service: Option<&str>) -> Evaluation {
    let target = match resolver::target_version(delta_dir) {
        Ok(version) => Some(version),
        Err(e) => {
            log::warn!("{}", e);
            None
        }
    };
    reconcile(runner, service, target.as_ref()).await
}

/// Readiness flags; the upgrade action needs all of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Checks {
    pub datamodel: bool,
    pub requirements: bool,
    pub pgconfig: bool,
    pub current_version: bool,
    pub project: bool,
}

impl Checks {
    pub fn from_evaluation(evaluation: &Evaluation, requirements: bool, pgconfig: bool) -> Self {
        Self {
            datamodel: evaluation.target.is_some(),
            requirements,
            pgconfig,
            current_version: evaluation.state == ReconciliationState::UpToDate,
            project: evaluation.current.is_some(),
        }
    }

    pub fn all(&self) -> bool {
        self.datamodel && self.requirements && self.pgconfig && self.current_version && self.project
    }

    /// Names of the checks that do not pass.
    pub fn failing(&self) -> Vec<&'static str> {
        [
            ("datamodel", self.datamodel),
            ("requirements", self.requirements),
            ("pgconfig", self.pgconfig),
            ("current_version", self.current_version),
            ("project", self.project),
        ]
        .into_iter()
        .filter(|(_, ok)| !ok)
        .map(|(name, _)| name)
        .collect()
    }
}
