use anyhow::Result;
use std::path::Path;

use super::AppContext;
use crate::output::{Output, ProjectResponse};

/// Write the QGIS project bound to the selected service and print its path.
pub async fn project(
    ctx: &AppContext,
    output: &Output,
    destination: Option<&Path>,
    force: bool,
) -> Result<()> {
    let service = ctx.require_service()?;
    let path = ctx
        .dispatcher()
        .load_project(service, destination, force)
        .await?;

    if output.is_json() {
        output.json(&ProjectResponse {
            ok: true,
            service: service.to_string(),
            path: path.display().to_string(),
        })?;
        return Ok(());
    }

    output.info(&format!("Project for service '{}' written to:", service));
    println!("{}", path.display());
    Ok(())
}
