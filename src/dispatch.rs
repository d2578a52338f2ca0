//! User-triggered actions: initialize, upgrade, install requirements, load
//! project. Every action that runs an external command re-evaluates
//! afterwards, whether or not the command succeeded.

use dialoguer::Confirm;
use serde::Serialize;
use std::fs;
use std::io::{IsTerminal, Write};
use std::path::{Path, PathBuf};

use crate::config::Settings;
use crate::error::{DatamodelError, Result};
use crate::pum;
use crate::reconcile::{self, Checks, Evaluation, ReconciliationState};
use crate::resolver;
use crate::runner::{CommandLine, Runner};

/// Service name the project template is saved with.
pub const TEMPLATE_SERVICE: &str = "service='pg_qgep'";

/// Proof that the user agreed to a potentially destructive action.
/// Only obtainable from an explicit flag or an interactive prompt.
#[derive(Debug)]
pub struct Confirmation(());

impl Confirmation {
    /// Use `--yes` when given, otherwise ask on the terminal.
    /// Without a terminal, `--yes` is required.
    pub fn obtain(yes: bool, action: &'static str, prompt: &str) -> Result<Self> {
        if yes {
            return Ok(Confirmation(()));
        }
        if !std::io::stdin().is_terminal() {
            log::warn!("{} requires --yes when not running interactively", action);
            return Err(DatamodelError::NotConfirmed(action));
        }

        let proceed = Confirm::new()
            .with_prompt(prompt)
            .default(false)
            .interact()
            .map_err(|e| {
                DatamodelError::io(
                    "confirmation prompt",
                    std::io::Error::new(std::io::ErrorKind::Other, e.to_string()),
                )
            })?;

        if proceed {
            Ok(Confirmation(()))
        } else {
            Err(DatamodelError::NotConfirmed(action))
        }
    }

    #[cfg(test)]
    pub fn granted() -> Self {
        Confirmation(())
    }
}

/// Prompt text for initialize and upgrade.
pub fn confirmation_prompt(verb: &str, service: &str, target: Option<&crate::version::Version>) -> String {
    let target = target
        .map(|t| t.to_string())
        .unwrap_or_else(|| "the latest version".to_string());
    format!(
        "You are about to {} the datamodel on {} to version {}. \
         This operation can result in data loss; make sure you have a backup. Continue?",
        verb, service, target
    )
}

/// An external command's result together with the state evaluated after it.
#[derive(Debug)]
pub struct ActionOutcome<T> {
    pub command: CommandLine,
    pub output: Result<String>,
    pub after: T,
}

impl<T> ActionOutcome<T> {
    #[cfg(test)]
    pub fn succeeded(&self) -> bool {
        self.output.is_ok()
    }

    /// Split into the re-evaluated state and the command's error, if any.
    pub fn into_parts(self) -> (T, Option<DatamodelError>) {
        (self.after, self.output.err())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequirementsCheck {
    pub satisfied: bool,
    /// `<requirement>: missing|conflict`
    pub missing: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl RequirementsCheck {
    fn failed(message: String) -> Self {
        Self {
            satisfied: false,
            missing: Vec::new(),
            message: Some(message),
        }
    }
}

pub struct Dispatcher<'a, R: Runner> {
    settings: &'a Settings,
    runner: &'a R,
    platform: String,
}

impl<'a, R: Runner> Dispatcher<'a, R> {
    pub fn new(settings: &'a Settings, runner: &'a R) -> Self {
        Self {
            settings,
            runner,
            platform: std::env::consts::OS.to_string(),
        }
    }

    /// Override the platform the setup script support check looks at.
    #[cfg(test)]
    pub fn with_platform(mut self, platform: &str) -> Self {
        self.platform = platform.to_string();
        self
    }

    pub async fn evaluate(&self, service: Option<&str>) -> Evaluation {
        reconcile::evaluate(self.runner, &self.settings.delta_dir, service).await
    }

    /// Run the setup script on a reachable but uninitialized database.
    pub async fn initialize(
        &self,
        service: &str,
        srid: u32,
        _confirmation: Confirmation,
    ) -> Result<ActionOutcome<Evaluation>> {
        if self.platform == "windows" {
            return Err(DatamodelError::UnsupportedPlatform {
                action: "initialize",
                platform: self.platform.clone(),
            });
        }

        let before = self.evaluate(Some(service)).await;
        require_state("initialize", &before, ReconciliationState::NotInitialized)?;

        let command = pum::setup_command(&self.settings.setup_script, srid, service);
        log::info!("Initializing the datamodel on {}", service);
        let output = self
            .runner
            .run_command(&command, None, Some(self.settings.setup_timeout))
            .await;

        let after = self.evaluate(Some(service)).await;
        Ok(ActionOutcome {
            command,
            output,
            after,
        })
    }

    /// Run the migration tool up to the target version.
    pub async fn upgrade(
        &self,
        service: &str,
        srid: u32,
        _confirmation: Confirmation,
    ) -> Result<ActionOutcome<Evaluation>> {
        let before = self.evaluate(Some(service)).await;
        require_state("upgrade", &before, ReconciliationState::UpToDate)?;
        self.upgrade_checks(&before).await?;
        let target = before.target.clone().ok_or_else(|| DatamodelError::InvalidState {
            action: "upgrade",
            state: before.label(),
        })?;

        // pum runs from the datamodel root, so hand it an absolute delta path
        let delta_dir = fs::canonicalize(&self.settings.delta_dir).map_err(|e| {
            DatamodelError::io(
                format!("resolving {}", self.settings.delta_dir.display()),
                e,
            )
        })?;
        let cwd = delta_dir.parent().map(Path::to_path_buf);

        let command = pum::upgrade_command(&self.settings.pum, service, &delta_dir, &target, srid);
        log::info!("Upgrading the datamodel on {} to {}", service, target);
        let output = self
            .runner
            .run_command(&command, cwd.as_deref(), Some(self.settings.setup_timeout))
            .await;

        let after = self.evaluate(Some(service)).await;
        Ok(ActionOutcome {
            command,
            output,
            after,
        })
    }

    /// Upgrade is only allowed when every check passes, requirements included.
    pub async fn upgrade_checks(&self, evaluation: &Evaluation) -> Result<Checks> {
        let requirements = self.check_requirements().await;
        let checks = Checks::from_evaluation(evaluation, requirements.satisfied, true);
        if checks.all() {
            Ok(checks)
        } else {
            Err(DatamodelError::InvalidState {
                action: "upgrade",
                state: format!("failing checks: {}", checks.failing().join(", ")),
            })
        }
    }

    /// Requirement lines: trimmed, blank lines and comments skipped.
    pub fn read_requirements(&self) -> Result<Vec<String>> {
        let path = &self.settings.requirements;
        let contents = fs::read_to_string(path)
            .map_err(|e| DatamodelError::io(format!("reading {}", path.display()), e))?;
        Ok(contents
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with('#'))
            .map(str::to_string)
            .collect())
    }

    pub async fn check_requirements(&self) -> RequirementsCheck {
        let requirements = match self.read_requirements() {
            Ok(reqs) => reqs,
            Err(e) => return RequirementsCheck::failed(e.to_string()),
        };
        if requirements.is_empty() {
            return RequirementsCheck {
                satisfied: true,
                missing: Vec::new(),
                message: None,
            };
        }

        let command = pum::requirements_check_command(&self.settings.python, &requirements);
        match self
            .runner
            .run_command(&command, None, Some(self.settings.command_timeout))
            .await
        {
            Ok(_) => RequirementsCheck {
                satisfied: true,
                missing: Vec::new(),
                message: None,
            },
            Err(DatamodelError::Command {
                exit_code: 1,
                stdout,
                ..
            }) if !stdout.trim().is_empty() => RequirementsCheck {
                satisfied: false,
                missing: stdout
                    .lines()
                    .map(str::trim)
                    .filter(|l| !l.is_empty())
                    .map(str::to_string)
                    .collect(),
                message: None,
            },
            Err(e) => RequirementsCheck::failed(e.to_string()),
        }
    }

    /// `pip install --user` every requirement, without timeout, then re-check.
    pub async fn install_requirements(&self) -> Result<ActionOutcome<RequirementsCheck>> {
        let requirements = self.read_requirements()?;
        log::info!(
            "Installing python dependencies from {}",
            self.settings.requirements.display()
        );

        let command = pum::pip_install_command(&self.settings.python, &requirements);
        let output = if requirements.is_empty() {
            Ok(String::new())
        } else {
            self.runner.run_command(&command, None, None).await
        };

        let after = self.check_requirements().await;
        Ok(ActionOutcome {
            command,
            output,
            after,
        })
    }

    /// Write the project template bound to `service` and return its path.
    ///
    /// Without `output` the project goes to a temporary `.qgs` file that is
    /// kept after exit. Unless `force`, the datamodel must have a readable
    /// version.
    pub async fn load_project(
        &self,
        service: &str,
        output: Option<&Path>,
        force: bool,
    ) -> Result<PathBuf> {
        if !force {
            if let Err(e) = resolver::current_version(self.runner, service).await {
                log::info!("Project check failed: {}", e);
                return Err(DatamodelError::InvalidState {
                    action: "load project",
                    state: "version not found".to_string(),
                });
            }
        }

        let template = &self.settings.project_template;
        let contents = fs::read_to_string(template)
            .map_err(|e| DatamodelError::io(format!("reading {}", template.display()), e))?;
        let project = render_project(&contents, service);

        match output {
            Some(path) => {
                fs::write(path, project)
                    .map_err(|e| DatamodelError::io(format!("writing {}", path.display()), e))?;
                Ok(path.to_path_buf())
            }
            None => {
                let mut file = tempfile::Builder::new()
                    .prefix("qgep-")
                    .suffix(".qgs")
                    .tempfile()
                    .map_err(|e| DatamodelError::io("creating temporary project", e))?;
                file.write_all(project.as_bytes())
                    .map_err(|e| DatamodelError::io("writing temporary project", e))?;
                let (_, path) = file
                    .keep()
                    .map_err(|e| DatamodelError::io("keeping temporary project", e.error))?;
                Ok(path)
            }
        }
    }
}

/// Fail with `InvalidState` unless `evaluation` is in `expected`.
pub fn require_state(
    action: &'static str,
    evaluation: &Evaluation,
    expected: ReconciliationState,
) -> Result<()> {
    if evaluation.state == expected {
        Ok(())
    } else {
        Err(DatamodelError::InvalidState {
            action,
            state: evaluation.label(),
        })
    }
}

/// Point the template's layers at `service`.
pub fn render_project(contents: &str, service: &str) -> String {
    contents.replace(TEMPLATE_SERVICE, &format!("service='{}'", service))
}
