//! Config command implementations

use std::path::Path;

use anyhow::{Context, Result};

use mg_core::config::{self, ProxySettings};

use super::CliContext;
use crate::output::{print_error, print_info, print_success};

/// Show the effective configuration and proxy settings
pub fn config_show(ctx: &CliContext) -> Result<()> {
    if !ctx.config_path.exists() {
        print_info(&format!(
            "No configuration file at {:?}; showing defaults",
            ctx.config_path
        ));
    }

    println!("# {}", ctx.config_path.display());
    println!("{}", toml::to_string_pretty(&ctx.config)?);

    let settings = ctx.load_settings()?;
    println!("# {}", ctx.settings_path.display());
    println!("{}", toml::to_string_pretty(&settings)?);
    Ok(())
}

/// Print where configuration and data live
pub fn config_path(ctx: &CliContext) {
    println!("config:        {}", ctx.config_path.display());
    println!("settings:      {}", ctx.settings_path.display());
    println!("state:         {}", ctx.state_path.display());
    println!("subscriptions: {}", ctx.config.subscriptions_dir().display());
}

/// Write default `config.toml` and `settings.toml`
pub fn config_init(ctx: &CliContext, force: bool) -> Result<()> {
    let mut wrote = false;

    if write_default(&ctx.config_path, &ctx.config, force)? {
        print_success(&format!("Created {:?}", ctx.config_path));
        wrote = true;
    }
    if write_default(&ctx.settings_path, &ProxySettings::default(), force)? {
        print_success(&format!("Created {:?}", ctx.settings_path));
        wrote = true;
    }

    if !wrote {
        print_error("Configuration already exists");
        print_info("Use --force to overwrite");
    }
    Ok(())
}

fn write_default<T: serde::Serialize>(path: &Path, value: &T, force: bool) -> Result<bool> {
    if path.exists() && !force {
        return Ok(false);
    }
    config::save_config(path, value).with_context(|| format!("Failed to write {:?}", path))?;
    Ok(true)
}
