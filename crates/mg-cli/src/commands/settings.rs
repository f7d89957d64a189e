//! Proxy settings command implementations
//!
//! Keys are dotted paths into `settings.toml`, e.g. `sniffing.enabled` or
//! `logging.error_severity`.

use anyhow::{anyhow, bail, Context, Result};

use mg_core::config::{self, ProxySettings};

use super::CliContext;
use crate::output::print_success;

/// Print one settings value
pub fn settings_get(ctx: &CliContext, key: &str) -> Result<()> {
    let table = settings_table(&ctx.load_settings()?)?;
    let value = lookup(&table, key)?;

    match value {
        toml::Value::String(s) => println!("{}", s),
        toml::Value::Array(items) => {
            for item in items {
                match item {
                    toml::Value::String(s) => println!("{}", s),
                    other => println!("{}", other),
                }
            }
        }
        toml::Value::Table(_) => println!("{}", toml::to_string_pretty(value)?),
        other => println!("{}", other),
    }
    Ok(())
}

/// Change one settings value
///
/// The new value takes the type of the current one; lists are given as
/// comma-separated items and an empty string clears them.
pub fn settings_set(ctx: &CliContext, key: &str, value: &str) -> Result<()> {
    let mut table = settings_table(&ctx.load_settings()?)?;
    let (parent, last) = match key.rsplit_once('.') {
        Some((parent, last)) => (Some(parent), last),
        None => (None, key),
    };

    let section = match parent {
        Some(parent) => lookup_mut(&mut table, parent)?,
        None => &mut table,
    };
    let current = section
        .get(last)
        .ok_or_else(|| anyhow!("Unknown setting: {}", key))?;
    let parsed = parse_like(current, value).with_context(|| format!("Invalid value for {}", key))?;
    section.insert(last.to_string(), parsed);

    let settings: ProxySettings = toml::Value::Table(table)
        .try_into()
        .with_context(|| format!("Invalid value for {}", key))?;
    config::save_config(&ctx.settings_path, &settings)
        .with_context(|| format!("Failed to write {:?}", ctx.settings_path))?;

    print_success(&format!("Set {} = {}", key, value));
    Ok(())
}

fn settings_table(settings: &ProxySettings) -> Result<toml::Table> {
    let value = toml::Value::try_from(settings)?;
    match value {
        toml::Value::Table(table) => Ok(table),
        _ => bail!("Settings did not serialize to a table"),
    }
}

fn lookup<'a>(table: &'a toml::Table, key: &str) -> Result<&'a toml::Value> {
    let mut parts = key.split('.');
    let first = parts.next().unwrap_or_default();
    let mut current = table
        .get(first)
        .ok_or_else(|| anyhow!("Unknown setting: {}", key))?;
    for part in parts {
        current = current
            .as_table()
            .and_then(|t| t.get(part))
            .ok_or_else(|| anyhow!("Unknown setting: {}", key))?;
    }
    Ok(current)
}

fn lookup_mut<'a>(table: &'a mut toml::Table, key: &str) -> Result<&'a mut toml::Table> {
    let mut current = table;
    for part in key.split('.') {
        current = current
            .get_mut(part)
            .and_then(|v| v.as_table_mut())
            .ok_or_else(|| anyhow!("Unknown settings section: {}", key))?;
    }
    Ok(current)
}

/// Parse `raw` as the same kind of value as `current`
fn parse_like(current: &toml::Value, raw: &str) -> Result<toml::Value> {
    let value = match current {
        toml::Value::Boolean(_) => match raw.trim() {
            "true" | "on" | "yes" => toml::Value::Boolean(true),
            "false" | "off" | "no" => toml::Value::Boolean(false),
            other => bail!("expected true or false, got {:?}", other),
        },
        toml::Value::Integer(_) => toml::Value::Integer(raw.trim().parse()?),
        toml::Value::Array(_) => toml::Value::Array(
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| toml::Value::String(s.to_string()))
                .collect(),
        ),
        toml::Value::String(_) => toml::Value::String(raw.trim().to_string()),
        _ => bail!("cannot set a whole section"),
    };
    Ok(value)
}
