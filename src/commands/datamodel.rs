use anyhow::Result;
use colored::Colorize;

use super::AppContext;
use crate::dispatch::{self, ActionOutcome, Confirmation};
use crate::error::DatamodelError;
use crate::exit_codes;
use crate::output::{paint, ActionResponse, EvaluationJson, JsonErrorInfo, Output};
use crate::reconcile::{Evaluation, ReconciliationState};

/// Initialize the datamodel on a reachable, empty database.
pub async fn init(ctx: &AppContext, output: &Output, srid: u32, yes: bool) -> Result<i32> {
    let service = ctx.require_service()?;
    let dispatcher = ctx.dispatcher();

    let before = dispatcher.evaluate(Some(service)).await;
    dispatch::require_state("initialize", &before, ReconciliationState::NotInitialized)?;

    let prompt = dispatch::confirmation_prompt("initialize", service, before.target.as_ref());
    let confirmation = Confirmation::obtain(yes, "initialize", &prompt)?;

    output.info(&format!("Initializing the datamodel on {}...", service));
    let outcome = dispatcher.initialize(service, srid, confirmation).await?;
    report("initialize", service, outcome, output, "Datamodel successfully initialized")
}

/// Upgrade the datamodel to the newest delta version.
pub async fn upgrade(ctx: &AppContext, output: &Output, srid: u32, yes: bool) -> Result<i32> {
    let service = ctx.require_service()?;
    let dispatcher = ctx.dispatcher();

    let before = dispatcher.evaluate(Some(service)).await;
    dispatch::require_state("upgrade", &before, ReconciliationState::UpToDate)?;
    dispatcher.upgrade_checks(&before).await?;
    if !before.upgrade_available() {
        output.info("Datamodel already at the target version; running pum upgrade anyway.");
    }

    let prompt = dispatch::confirmation_prompt("upgrade", service, before.target.as_ref());
    let confirmation = Confirmation::obtain(yes, "upgrade", &prompt)?;

    output.info(&format!("Running pum upgrade on {}...", service));
    let outcome = dispatcher.upgrade(service, srid, confirmation).await?;
    report("upgrade", service, outcome, output, "Datamodel successfully upgraded")
}

/// Print the re-evaluated state, then the command's error if it failed.
fn report(
    action: &'static str,
    service: &str,
    outcome: ActionOutcome<Evaluation>,
    output: &Output,
    success: &str,
) -> Result<i32> {
    let command = outcome.command.to_string();
    let (evaluation, error) = outcome.into_parts();

    if output.is_json() {
        let exit_code = error
            .as_ref()
            .map(DatamodelError::exit_code)
            .unwrap_or(exit_codes::OK);
        output.json(&ActionResponse {
            ok: error.is_none(),
            action,
            service: service.to_string(),
            command,
            error: error.map(|e| JsonErrorInfo {
                code: e.code(),
                message: e.to_string(),
                details: None,
            }),
            evaluation: EvaluationJson::from(&evaluation),
        })?;
        return Ok(exit_code);
    }

    output.verbose(&format!("Command: {}", command));
    output.info(&format!(
        "Datamodel on {} is now: {}",
        service,
        paint(&evaluation.label(), evaluation.severity())
    ));

    match error {
        Some(e) => Err(e.into()),
        None => {
            if !output.is_quiet() {
                println!("{}", success.green());
            }
            Ok(exit_codes::OK)
        }
    }
}
