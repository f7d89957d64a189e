//! Subscription command implementations

use anyhow::{bail, Context, Result};

use mg_core::{Subscription, SubscriptionId};
use mg_tunnel::SubscriptionStore;

use super::CliContext;
use crate::output::{format_subscriptions, print_info, print_success, print_warning};

/// Find a subscription by id, alias or unique id prefix
pub fn resolve_subscription(store: &SubscriptionStore, query: &str) -> Result<Subscription> {
    let query = query.trim();
    if let Some(subscription) = store.get(&SubscriptionId::new(query)) {
        return Ok(subscription);
    }

    let subscriptions = store.list();
    let by_alias: Vec<_> = subscriptions.iter().filter(|s| s.alias == query).collect();
    match by_alias.as_slice() {
        [only] => return Ok((*only).clone()),
        [] => {}
        _ => bail!("Alias {:?} matches {} subscriptions; use the id", query, by_alias.len()),
    }

    if !query.is_empty() {
        let by_prefix: Vec<_> = subscriptions
            .iter()
            .filter(|s| s.id.as_str().starts_with(query))
            .collect();
        match by_prefix.as_slice() {
            [only] => return Ok((*only).clone()),
            [] => {}
            _ => bail!("Id prefix {:?} is ambiguous", query),
        }
    }

    bail!("No subscription matches {:?}", query)
}

/// Download a new subscription
pub async fn subscription_add(ctx: &CliContext, source: &str, select: bool) -> Result<()> {
    let store = ctx.open_store().await?;
    let subscription = store
        .download(source)
        .await
        .with_context(|| format!("Failed to add {}", source))?;

    print_success(&format!(
        "Added {} ({})",
        subscription.alias, subscription.id
    ));

    if select {
        let mut selection = ctx.load_selection()?;
        selection.select(&subscription.id);
        ctx.save_selection(&selection)?;
        print_info(&format!("Selected {}", subscription.alias));
    }
    Ok(())
}

/// Re-fetch one subscription, or all of them
pub async fn subscription_update(ctx: &CliContext, query: Option<&str>) -> Result<()> {
    let store = ctx.open_store().await?;
    let targets = match query {
        Some(query) => vec![resolve_subscription(&store, query)?],
        None => store.list(),
    };

    if targets.is_empty() {
        print_info("No subscriptions to update");
        return Ok(());
    }

    let mut failed = 0;
    for target in &targets {
        match store.update(&target.id).await {
            Ok(updated) => print_success(&format!("Updated {}", updated.alias)),
            Err(e) if targets.len() == 1 => {
                return Err(e).with_context(|| format!("Failed to update {}", target.alias));
            }
            Err(e) => {
                failed += 1;
                print_warning(&format!("Failed to update {}: {}", target.alias, e));
            }
        }
    }

    if failed > 0 {
        bail!("{} of {} updates failed", failed, targets.len());
    }
    Ok(())
}

/// Change a subscription's display name
pub async fn subscription_rename(ctx: &CliContext, query: &str, name: &str) -> Result<()> {
    let store = ctx.open_store().await?;
    let target = resolve_subscription(&store, query)?;
    let renamed = store
        .rename(&target.id, name)
        .await
        .with_context(|| format!("Failed to rename {}", target.alias))?;

    print_success(&format!("Renamed {} to {}", target.alias, renamed.alias));
    Ok(())
}

/// Delete a subscription, clearing the selection if it pointed at it
pub async fn subscription_delete(ctx: &CliContext, query: &str) -> Result<()> {
    let store = ctx.open_store().await?;
    let target = resolve_subscription(&store, query)?;
    let deleted = store
        .delete(&target.id)
        .await
        .with_context(|| format!("Failed to delete {}", target.alias))?;
    print_success(&format!("Deleted {}", deleted.alias));

    let mut selection = ctx.load_selection()?;
    if selection.clear_if(&deleted.id) {
        ctx.save_selection(&selection)?;
        print_info("Cleared the active selection");
    }
    Ok(())
}

/// Print all subscriptions
pub async fn subscription_list(ctx: &CliContext, long: bool) -> Result<()> {
    let store = ctx.open_store().await?;
    let selection = ctx.load_selection()?;
    println!("{}", format_subscriptions(&store.list(), &selection.current, long));
    Ok(())
}

/// Make a subscription the active one
pub async fn subscription_select(ctx: &CliContext, query: &str) -> Result<()> {
    let store = ctx.open_store().await?;
    let target = resolve_subscription(&store, query)?;

    let mut selection = ctx.load_selection()?;
    if selection.select(&target.id) {
        ctx.save_selection(&selection)?;
        print_success(&format!("Selected {}", target.alias));
    } else {
        print_info(&format!("{} is already selected", target.alias));
    }
    Ok(())
}
