use anyhow::Result;
use colored::Colorize;

use super::AppContext;
use crate::exit_codes;
use crate::output::{JsonErrorInfo, Output, RequirementsResponse};

pub async fn deps_check(ctx: &AppContext, output: &Output) -> Result<i32> {
    let check = ctx.dispatcher().check_requirements().await;
    let exit_code = if check.satisfied {
        exit_codes::OK
    } else {
        exit_codes::NOT_ACTIONABLE
    };

    if output.is_json() {
        output.json(&RequirementsResponse {
            ok: true,
            requirements_file: ctx.settings.requirements.display().to_string(),
            command: None,
            error: None,
            requirements: check,
        })?;
        return Ok(exit_code);
    }

    if check.satisfied {
        println!("{}", "Python requirements: ok".green());
    } else {
        println!("{}", "Python requirements not satisfied:".red().bold());
        for line in &check.missing {
            println!("  {}", line);
        }
        if let Some(message) = &check.message {
            println!("  {}", message);
        }
        output.info("Install them with: qgep-datamodel deps install");
    }
    Ok(exit_code)
}

/// `pip install --user` the datamodel's requirements.
pub async fn deps_install(ctx: &AppContext, output: &Output) -> Result<i32> {
    output.info(&format!(
        "Installing python dependencies from {}...",
        ctx.settings.requirements.display()
    ));
    let outcome = ctx.dispatcher().install_requirements().await?;
    let command = outcome.command.to_string();
    let (check, error) = outcome.into_parts();

    if output.is_json() {
        let exit_code = error
            .as_ref()
            .map(|e| e.exit_code())
            .unwrap_or(exit_codes::OK);
        output.json(&RequirementsResponse {
            ok: error.is_none(),
            requirements_file: ctx.settings.requirements.display().to_string(),
            command: Some(command),
            error: error.map(|e| JsonErrorInfo {
                code: e.code(),
                message: e.to_string(),
                details: None,
            }),
            requirements: check,
        })?;
        return Ok(exit_code);
    }

    if let Some(e) = error {
        let shell = if cfg!(windows) {
            "the OSGeo4W shell"
        } else {
            "the terminal"
        };
        output.warn(&format!(
            "Could not install python dependencies. You can try to run the command manually from {}:\n  {}",
            shell, command
        ));
        return Err(e.into());
    }

    if check.satisfied {
        println!("{}", "Python requirements installed.".green());
        Ok(exit_codes::OK)
    } else {
        println!("{}", "Installed, but requirements are still not satisfied:".yellow());
        for line in &check.missing {
            println!("  {}", line);
        }
        Ok(exit_codes::NOT_ACTIONABLE)
    }
}
