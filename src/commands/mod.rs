//! Command implementations for the qgep-datamodel CLI.
//!
//! Each submodule contains related command functions.

mod datamodel;
mod deps;
mod project;
mod service;
mod status;

pub use datamodel::{init, upgrade};
pub use deps::{deps_check, deps_install};
pub use project::project;
pub use service::{service_add, service_list, service_show, ServiceArgs};
pub use status::status;

use crate::config::Settings;
use crate::dispatch::Dispatcher;
use crate::error::DatamodelError;
use crate::output::{Output, ServiceFileJson};
use crate::runner::SystemRunner;
use crate::service::ServiceStore;

/// Everything a command needs, resolved once in `main`.
pub struct AppContext {
    pub settings: Settings,
    pub store: ServiceStore,
    pub runner: SystemRunner,
    /// `--service`, or the configured default
    pub service: Option<String>,
}

impl AppContext {
    pub fn new(settings: Settings, service: Option<String>) -> Self {
        let store = ServiceStore::new(settings.service_file.path.clone());
        let runner = SystemRunner::new(store.clone(), settings.connect_timeout);
        let service = service
            .or_else(|| settings.default_service.clone())
            .filter(|s| !s.is_empty());
        Self {
            settings,
            store,
            runner,
            service,
        }
    }

    pub fn dispatcher(&self) -> Dispatcher<'_, SystemRunner> {
        Dispatcher::new(&self.settings, &self.runner)
    }

    /// The selected service, required by actions that touch the database.
    pub fn require_service(&self) -> Result<&str, DatamodelError> {
        self.service.as_deref().ok_or_else(|| {
            DatamodelError::InvalidProfile(
                "no service selected (use --service or set [service] default)".to_string(),
            )
        })
    }

    pub(crate) fn service_file_json(&self) -> ServiceFileJson {
        ServiceFileJson {
            path: self.settings.service_file.path.display().to_string(),
            known: self.settings.service_file.known,
        }
    }

    /// Hint shown when profiles live where libpq will not look for them.
    pub(crate) fn warn_unknown_service_file(&self, output: &Output) {
        if !self.settings.service_file.known {
            output.warn(&format!(
                "{} is not a location libpq searches; set PGSYSCONFDIR to {} so other tools see these services",
                self.settings.service_file.path.display(),
                self.settings
                    .service_file
                    .path
                    .parent()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default()
            ));
        }
    }
}
