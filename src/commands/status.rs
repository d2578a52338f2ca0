use anyhow::Result;
use colored::Colorize;

use super::AppContext;
use crate::exit_codes;
use crate::output::{check_label, paint, EvaluationJson, Output, StatusResponse, SCHEMA_VERSION, TOOL_VERSION};
use crate::reconcile::{Checks, Severity};

/// Show everything needed to decide on the next action.
///
/// Returns `NOT_ACTIONABLE` when the reconciliation state is not ok, so
/// scripts can gate on `status` before running `upgrade`.
pub async fn status(ctx: &AppContext, output: &Output) -> Result<i32> {
    let dispatcher = ctx.dispatcher();
    let service = ctx.service.as_deref();

    let profile = match service {
        Some(name) => ctx.store.read_profile(name)?,
        None => None,
    };
    if let (Some(name), None) = (service, &profile) {
        output.warn(&format!(
            "service '{}' not found in {}",
            name,
            ctx.store.path().display()
        ));
    }

    let requirements = dispatcher.check_requirements().await;
    let evaluation = dispatcher.evaluate(service).await;
    let checks = Checks::from_evaluation(&evaluation, requirements.satisfied, service.is_some());

    let exit_code = if evaluation.severity() == Severity::Ok {
        exit_codes::OK
    } else {
        exit_codes::NOT_ACTIONABLE
    };

    if output.is_json() {
        let response = StatusResponse {
            ok: true,
            schema_id: StatusResponse::SCHEMA_ID,
            schema_version: SCHEMA_VERSION,
            tool_version: TOOL_VERSION,
            generated_at: chrono::Utc::now().to_rfc3339(),
            service_file: ctx.service_file_json(),
            service: ctx.service.clone(),
            profile,
            requirements,
            evaluation: EvaluationJson::from(&evaluation),
            ready: checks.all(),
            checks,
        };
        output.json(&response)?;
        return Ok(exit_code);
    }

    ctx.warn_unknown_service_file(output);
    if output.is_quiet() {
        println!("{}", evaluation.state);
        return Ok(exit_code);
    }

    println!("{}", "Datamodel".bold());
    println!(
        "  {:<16} {}",
        "directory:",
        ctx.settings.datamodel_dir.display()
    );
    match &evaluation.target {
        Some(target) => println!("  {:<16} {}", "target version:", paint(&target.to_string(), Severity::Ok)),
        None => println!("  {:<16} {}", "target version:", paint("not found", Severity::Error)),
    }
    let requirements_label = if requirements.missing.is_empty() {
        requirements.message.clone().unwrap_or_default()
    } else {
        requirements.missing.join(", ")
    };
    println!(
        "  {:<16} {}",
        "requirements:",
        check_label(requirements.satisfied, &requirements_label)
    );

    println!();
    println!("{}", "Service".bold());
    println!(
        "  {:<16} {}",
        "file:",
        ctx.settings.service_file.path.display()
    );
    println!(
        "  {:<16} {}",
        "selected:",
        check_label(service.is_some(), "not set")
    );
    if let Some(name) = service {
        println!("  {:<16} {}", "name:", name);
        let summary = profile
            .as_ref()
            .map(|p| p.summary())
            .unwrap_or_else(|| "-".to_string());
        for line in summary.lines() {
            println!("  {:<16} {}", "", line.dimmed());
        }
    }

    println!();
    println!("{}", "Version".bold());
    println!(
        "  {:<16} {}",
        "current:",
        paint(&evaluation.label(), evaluation.severity())
    );
    if evaluation.upgrade_available() {
        if let Some(target) = &evaluation.target {
            println!(
                "  {:<16} {}",
                "",
                format!("upgrade available to {}", target).yellow()
            );
        }
    }
    println!(
        "  {:<16} {}",
        "project:",
        check_label(checks.project, "version not found")
    );

    println!();
    let actions = evaluation.actions();
    if actions.initialize_visible {
        println!(
            "{} qgep-datamodel init --service {}",
            "Next:".bold(),
            service.unwrap_or_default()
        );
    } else if actions.upgrade_visible && checks.all() {
        if evaluation.upgrade_available() {
            println!(
                "{} qgep-datamodel upgrade --service {}",
                "Next:".bold(),
                service.unwrap_or_default()
            );
        } else {
            println!("{}", "Datamodel is up to date.".green());
        }
    } else if actions.upgrade_visible {
        println!(
            "{} {}",
            "Upgrade blocked by:".bold(),
            checks.failing().join(", ")
        );
    }

    Ok(exit_code)
}
