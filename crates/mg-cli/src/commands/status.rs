//! Status command implementation

use anyhow::Result;

use mg_core::time::format_relative;

use super::CliContext;
use crate::output::{print_info, print_warning};

/// Show the selected subscription and where things live
pub async fn status_command(ctx: &CliContext) -> Result<()> {
    let store = ctx.open_store().await?;
    let selection = ctx.load_selection()?;

    println!("Subscriptions: {}", store.len());
    match selection.current.id() {
        None => print_info("No subscription selected"),
        Some(id) => match store.get(&id) {
            Some(subscription) => println!(
                "Selected: {} ({}), updated {}",
                subscription.alias,
                subscription.id,
                format_relative(subscription.updated_at)
            ),
            None => print_warning(&format!(
                "Selected subscription {} no longer exists",
                id
            )),
        },
    }

    println!("Core: {}", ctx.config.core.binary.display());
    println!("Data: {}", ctx.config.data_dir.display());
    Ok(())
}
