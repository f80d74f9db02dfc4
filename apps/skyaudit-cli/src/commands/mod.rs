//! CLI command implementations

pub mod accounts;
pub mod checks;
pub mod config;
pub mod scan;

use anyhow::Context;
use skyaudit_core::{AuditError, CloudProvider, Config, Settings, SettingsOverrides};
use skyaudit_provider::InventoryProvider;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Options shared by every command
pub struct GlobalOptions {
    pub config: Option<PathBuf>,
    pub profile: String,
}

impl GlobalOptions {
    pub fn load_config(&self) -> anyhow::Result<Config> {
        Ok(Config::load(self.config.as_deref())?)
    }

    /// Resolve the selected profile with command-line overrides applied
    pub fn settings(&self, overrides: SettingsOverrides) -> anyhow::Result<Settings> {
        let config = self.load_config()?;
        let settings = config.settings(&self.profile)?.with_overrides(overrides)?;
        settings.validate_services(&skyaudit_checks::default_registry().services())?;
        Ok(settings)
    }
}

/// Open the inventory snapshot that backs the cloud API
pub fn open_provider(inventory: &Path) -> anyhow::Result<Arc<dyn CloudProvider>> {
    let provider = InventoryProvider::from_file(inventory)
        .with_context(|| format!("Failed to load inventory {}", inventory.display()))?;
    Ok(Arc::new(provider))
}

/// Fatal run error, with the failure kind's hint for provider failures
pub fn fatal(err: AuditError) -> anyhow::Error {
    let hint = matches!(err, AuditError::Cloud { .. }).then(|| err.kind().hint());
    let err = anyhow::Error::new(err);
    match hint {
        Some(hint) => err.context(hint),
        None => err,
    }
}
