//! Scripted [`Runner`] for unit tests.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{DatamodelError, Result};
use crate::runner::{CommandLine, DbTarget, Row, Runner};

/// A recorded `run_command` call.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandCall {
    pub command: CommandLine,
    pub cwd: Option<PathBuf>,
    pub timeout: Option<Duration>,
}

/// Answers the metadata query from `versions` (`None` = query fails) and
/// `SELECT 1;` probes from the reachability flags. Commands succeed with
/// empty output unless a result has been queued.
#[derive(Debug, Default)]
pub struct FakeRunner {
    versions: RefCell<Option<Vec<String>>>,
    versions_after_command: RefCell<Option<Vec<String>>>,
    service_reachable: bool,
    admin_reachable: bool,
    command_results: RefCell<VecDeque<Result<String>>>,
    sql_calls: RefCell<Vec<(String, DbTarget)>>,
    commands: RefCell<Vec<CommandCall>>,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// The metadata table exists and holds these rows.
    pub fn with_versions(self, versions: &[&str]) -> Self {
        *self.versions.borrow_mut() = Some(versions.iter().map(|v| v.to_string()).collect());
        self
    }

    pub fn service_reachable(mut self) -> Self {
        self.service_reachable = true;
        self.admin_reachable = true;
        self
    }

    pub fn admin_reachable(mut self) -> Self {
        self.admin_reachable = true;
        self
    }

    /// Metadata rows visible once any command has run.
    pub fn versions_after_command(self, versions: &[&str]) -> Self {
        *self.versions_after_command.borrow_mut() =
            Some(versions.iter().map(|v| v.to_string()).collect());
        self
    }

    pub fn queue_command_result(self, result: Result<String>) -> Self {
        self.command_results.borrow_mut().push_back(result);
        self
    }

    pub fn queue_command_failure(self, exit_code: i32, stderr: &str) -> Self {
        self.queue_command_result(Err(DatamodelError::Command {
            command: "fake".to_string(),
            exit_code,
            stdout: String::new(),
            stderr: stderr.to_string(),
        }))
    }

    pub fn sql_calls(&self) -> Vec<(String, DbTarget)> {
        self.sql_calls.borrow().clone()
    }

    pub fn commands(&self) -> Vec<CommandCall> {
        self.commands.borrow().clone()
    }
}

fn unreachable(statement: &str, target: DbTarget) -> DatamodelError {
    DatamodelError::DatabaseConnection {
        statement: statement.to_string(),
        message: format!("fake: {} unreachable", target),
    }
}

impl Runner for FakeRunner {
    async fn run_sql(
        &self,
        _service: &str,
        statement: &str,
        target: DbTarget,
        _autocommit: bool,
    ) -> Result<Vec<Row>> {
        self.sql_calls
            .borrow_mut()
            .push((statement.to_string(), target));

        if statement.trim() == "SELECT 1;" {
            let reachable = match target {
                DbTarget::Service => self.service_reachable,
                DbTarget::Admin => self.admin_reachable,
            };
            return if reachable {
                Ok(vec![vec![Some("1".to_string())]])
            } else {
                Err(unreachable(statement, target))
            };
        }

        if statement.contains("pum_info") && target == DbTarget::Service {
            if let Some(versions) = self.versions.borrow().as_ref() {
                return Ok(versions.iter().map(|v| vec![Some(v.clone())]).collect());
            }
        }

        Err(unreachable(statement, target))
    }

    async fn run_command(
        &self,
        command: &CommandLine,
        cwd: Option<&Path>,
        timeout: Option<Duration>,
    ) -> Result<String> {
        self.commands.borrow_mut().push(CommandCall {
            command: command.clone(),
            cwd: cwd.map(Path::to_path_buf),
            timeout,
        });

        let result = self
            .command_results
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Ok(String::new()));

        if result.is_ok() {
            if let Some(after) = self.versions_after_command.borrow_mut().take() {
                *self.versions.borrow_mut() = Some(after);
            }
        }
        result
    }
}
