//! CLI command implementations

mod config;
mod run;
mod settings;
mod status;
mod subscription;

pub use config::{config_init, config_path, config_show};
pub use run::run_command;
pub use settings::{settings_get, settings_set};
pub use status::status_command;
pub use subscription::{
    resolve_subscription, subscription_add, subscription_delete, subscription_list,
    subscription_rename, subscription_select, subscription_update,
};

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};

use mg_core::config::{self as core_config, AppConfig, ProxySettings, SelectionState};
use mg_tunnel::store::HttpFetcher;
use mg_tunnel::SubscriptionStore;

/// Files and configuration shared by every command
#[derive(Debug, Clone)]
pub struct CliContext {
    pub config_path: PathBuf,
    pub settings_path: PathBuf,
    pub state_path: PathBuf,
    pub config: AppConfig,
}

impl CliContext {
    /// Load `config.toml`; `settings.toml` and `state.toml` sit next to it
    pub fn load(config_override: Option<&Path>) -> Result<Self> {
        let (config_path, settings_path, state_path) = match config_override {
            Some(path) => {
                let dir = path.parent().unwrap_or_else(|| Path::new("."));
                (
                    path.to_path_buf(),
                    dir.join("settings.toml"),
                    dir.join("state.toml"),
                )
            }
            None => (
                core_config::default_config_path(),
                core_config::default_settings_path(),
                core_config::default_state_path(),
            ),
        };

        tracing::debug!("Using configuration {:?}", config_path);
        let config: AppConfig = core_config::load_or_default(&config_path)
            .with_context(|| format!("Failed to load configuration from {:?}", config_path))?;

        Ok(Self {
            config_path,
            settings_path,
            state_path,
            config,
        })
    }

    /// Open the subscription store with the HTTP fetcher
    pub async fn open_store(&self) -> Result<SubscriptionStore> {
        let fetcher = HttpFetcher::new(&self.config.fetch).context("Failed to build HTTP client")?;
        let store = SubscriptionStore::open(self.config.subscriptions_dir(), Arc::new(fetcher))
            .await
            .with_context(|| {
                format!(
                    "Failed to open subscriptions in {:?}",
                    self.config.subscriptions_dir()
                )
            })?;
        Ok(store)
    }

    /// Current proxy settings
    pub fn load_settings(&self) -> Result<ProxySettings> {
        core_config::load_or_default(&self.settings_path)
            .with_context(|| format!("Failed to load settings from {:?}", self.settings_path))
    }

    /// Persisted subscription selection
    pub fn load_selection(&self) -> Result<SelectionState> {
        SelectionState::load(&self.state_path)
            .with_context(|| format!("Failed to load selection from {:?}", self.state_path))
    }

    /// Persist the subscription selection
    pub fn save_selection(&self, selection: &SelectionState) -> Result<()> {
        selection
            .save(&self.state_path)
            .with_context(|| format!("Failed to save selection to {:?}", self.state_path))
    }
}
