use anyhow::{bail, Context, Result};
use colored::Colorize;
use std::fs;

use super::AppContext;
use crate::output::{Output, ServiceListResponse, ServiceShowResponse, ServiceWriteResponse};
use crate::service::{ConnectionProfile, WriteOutcome};

/// Connection fields given on the command line for `service add`.
#[derive(Debug, Default)]
pub struct ServiceArgs {
    pub from_url: Option<String>,
    pub host: Option<String>,
    pub port: Option<String>,
    pub dbname: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
}

impl ServiceArgs {
    /// Build the profile: URL first, explicit fields override it.
    fn into_profile(self) -> Result<ConnectionProfile> {
        let mut profile = match self.from_url.as_deref() {
            Some(url) => ConnectionProfile::from_url(url)?,
            None => ConnectionProfile {
                host: "localhost".to_string(),
                port: "5432".to_string(),
                ..Default::default()
            },
        };
        if let Some(host) = self.host {
            profile.host = host;
        }
        if let Some(port) = self.port {
            profile.port = port;
        }
        if let Some(dbname) = self.dbname {
            profile.dbname = dbname;
        }
        if self.user.is_some() {
            profile.user = self.user;
        }
        if self.password.is_some() {
            profile.password = self.password;
        }
        if profile.dbname.is_empty() {
            bail!("--dbname (or a --from-url with a database) is required");
        }
        Ok(profile)
    }
}

pub fn service_list(ctx: &AppContext, output: &Output) -> Result<()> {
    let services = ctx.store.list_profiles()?;

    if output.is_json() {
        return Ok(output.json(&ServiceListResponse {
            ok: true,
            service_file: ctx.service_file_json(),
            services,
        })?);
    }

    ctx.warn_unknown_service_file(output);
    output.info(&format!(
        "Services in {}:",
        ctx.store.path().display()
    ));
    if services.is_empty() {
        output.info(&"  (none)".dimmed().to_string());
    }
    for name in &services {
        if ctx.service.as_deref() == Some(name.as_str()) {
            println!("{} {}", name, "(selected)".green());
        } else {
            println!("{}", name);
        }
    }
    Ok(())
}

pub fn service_show(ctx: &AppContext, output: &Output, name: Option<&str>) -> Result<()> {
    let name = match name {
        Some(n) => n,
        None => ctx.require_service()?,
    };
    let profile = ctx.store.read_profile(name)?.with_context(|| {
        format!(
            "service '{}' not found in {}",
            name,
            ctx.store.path().display()
        )
    })?;

    if output.is_json() {
        return Ok(output.json(&ServiceShowResponse {
            ok: true,
            name: name.to_string(),
            has_password: profile.password.is_some(),
            profile,
        })?);
    }

    println!("{}", format!("[{}]", name).bold());
    println!("{}", profile.summary());
    Ok(())
}

pub fn service_add(ctx: &AppContext, output: &Output, name: &str, args: ServiceArgs) -> Result<()> {
    let profile = args.into_profile()?;

    // Only our own settings directory may need creating; libpq locations are
    // the user's to manage.
    if !ctx.settings.service_file.known {
        if let Some(dir) = ctx.store.path().parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("create settings directory {}", dir.display()))?;
        }
    }

    let outcome = ctx.store.write_profile(name, &profile)?;
    let created = outcome == WriteOutcome::Created;

    if output.is_json() {
        return Ok(output.json(&ServiceWriteResponse {
            ok: true,
            name: name.to_string(),
            created,
            service_file: ctx.service_file_json(),
        })?);
    }

    ctx.warn_unknown_service_file(output);
    let verb = if created { "Created" } else { "Overwrote" };
    output.info(&format!(
        "{} service '{}' in {}",
        verb.green(),
        name,
        ctx.store.path().display()
    ));
    output.verbose(&profile.summary());
    Ok(())
}
