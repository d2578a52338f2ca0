//! Target and current datamodel versions.

use std::fs;
use std::path::Path;

use crate::error::{DatamodelError, Result};
use crate::runner::{DbTarget, Runner};
use crate::version::Version;

/// Metadata table maintained by the migration tool.
pub const PUM_INFO_TABLE: &str = "qgep_sys.pum_info";

const DELTA_PREFIX: &str = "delta_";

/// Version encoded in a delta entry name: `delta_<version>_<description>`.
/// Returns `None` for entries that are not deltas.
pub fn delta_version(name: &str) -> Option<&str> {
    let rest = name.strip_prefix(DELTA_PREFIX)?;
    let version = rest.split('_').next().unwrap_or(rest);
    if version.is_empty() {
        None
    } else {
        Some(version)
    }
}

/// Highest version among the delta entries (files or directories) of `delta_dir`.
pub fn target_version(delta_dir: &Path) -> Result<Version> {
    let no_target = || DatamodelError::NoTargetVersion {
        dir: delta_dir.to_path_buf(),
    };

    let entries = match fs::read_dir(delta_dir) {
        Ok(entries) => entries,
        Err(e) => {
            log::warn!("Cannot read delta directory {}: {}", delta_dir.display(), e);
            return Err(no_target());
        }
    };

    let mut max_version: Option<Version> = None;
    for entry in entries.filter_map(|e| e.ok()) {
        let filename = entry.file_name().to_string_lossy().to_string();
        let Some(raw) = delta_version(&filename) else {
            continue;
        };
        match Version::parse(raw) {
            Ok(version) => {
                if max_version.as_ref().map_or(true, |max| version > *max) {
                    max_version = Some(version);
                }
            }
            Err(_) => log::warn!("Skipping delta with invalid version: {}", filename),
        }
    }

    max_version.ok_or_else(no_target)
}

/// Highest version recorded in the metadata table of the service's database.
///
/// A missing table surfaces as `DatabaseConnection`, exactly like an
/// unreachable server; the reconciliation probes tell them apart.
pub async fn current_version<R: Runner>(runner: &R, service: &str) -> Result<Version> {
    let statement = format!("SELECT version FROM {};", PUM_INFO_TABLE);
    let rows = runner
        .run_sql(service, &statement, DbTarget::Service, false)
        .await?;

    let mut max_version: Option<Version> = None;
    for value in rows.iter().filter_map(|row| row.first().cloned().flatten()) {
        match Version::parse(&value) {
            Ok(version) => {
                if max_version.as_ref().map_or(true, |max| version > *max) {
                    max_version = Some(version);
                }
            }
            Err(_) => log::warn!("Ignoring invalid version '{}' in {}", value, PUM_INFO_TABLE),
        }
    }

    max_version.ok_or_else(|| DatamodelError::NoCurrentVersion {
        service: service.to_string(),
        table: PUM_INFO_TABLE.to_string(),
    })
}
