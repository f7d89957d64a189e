//! Mango CLI
//!
//! Single binary for managing subscriptions and running the tunnel:
//! - Subscription management (add, update, rename, delete, list, select)
//! - Tunnel runner (foreground, stops on Ctrl+C)
//! - Configuration and proxy settings

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mango::commands::{self, CliContext};
use mango::output::print_error;
use mg_core::error::TunnelError;

#[derive(Parser)]
#[command(name = "mango")]
#[command(author, version, about = "Proxy subscription manager and tunnel runner")]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true, env = "MANGO_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage subscriptions
    /// Alias: sub
    #[command(alias = "sub")]
    Subscription {
        #[command(subcommand)]
        action: SubscriptionAction,
    },

    /// Start the tunnel with the selected subscription until Ctrl+C
    Run {
        /// Subscription to use instead of the selected one
        #[arg(short, long)]
        subscription: Option<String>,
    },

    /// Show the selected subscription and data locations
    Status,

    /// Read or change proxy settings (sniffing, network, logging)
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum SubscriptionAction {
    /// Download a subscription from an http(s) URL
    Add {
        url: String,
        /// Make it the active subscription
        #[arg(short, long)]
        select: bool,
    },
    /// Re-fetch a subscription (all of them when omitted)
    Update { subscription: Option<String> },
    /// Change a subscription's display name
    Rename { subscription: String, name: String },
    /// Delete a subscription
    #[command(alias = "rm")]
    Delete { subscription: String },
    /// List subscriptions
    #[command(alias = "ls")]
    List {
        /// Show full ids and sources
        #[arg(short, long)]
        long: bool,
    },
    /// Make a subscription the active one
    Select { subscription: String },
}

#[derive(Subcommand)]
enum SettingsAction {
    /// Print a setting, e.g. `sniffing.enabled`
    Get { key: String },
    /// Change a setting, e.g. `sniffing.excluded_domains a.com,b.com`
    Set { key: String, value: String },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration
    Show,
    /// Show config and data paths
    Path,
    /// Write default configuration files
    Init {
        /// Overwrite existing files
        #[arg(short, long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    let log_level = match (cli.quiet, cli.verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        (false, _) => "trace",
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    if let Err(e) = run(cli).await {
        print_error(&format!("{:#}", e));
        // Fatal tunnel errors exit with status 2
        let fatal = e
            .downcast_ref::<TunnelError>()
            .is_some_and(TunnelError::is_fatal);
        std::process::exit(if fatal { 2 } else { 1 });
    }
}

async fn run(cli: Cli) -> Result<()> {
    let ctx = CliContext::load(cli.config.as_deref())?;

    let command = match cli.command {
        Some(cmd) => cmd,
        None => return commands::status_command(&ctx).await,
    };

    match command {
        Commands::Subscription { action } => match action {
            SubscriptionAction::Add { url, select } => {
                commands::subscription_add(&ctx, &url, select).await
            }
            SubscriptionAction::Update { subscription } => {
                commands::subscription_update(&ctx, subscription.as_deref()).await
            }
            SubscriptionAction::Rename { subscription, name } => {
                commands::subscription_rename(&ctx, &subscription, &name).await
            }
            SubscriptionAction::Delete { subscription } => {
                commands::subscription_delete(&ctx, &subscription).await
            }
            SubscriptionAction::List { long } => commands::subscription_list(&ctx, long).await,
            SubscriptionAction::Select { subscription } => {
                commands::subscription_select(&ctx, &subscription).await
            }
        },
        Commands::Run { subscription } => {
            commands::run_command(&ctx, subscription.as_deref()).await
        }
        Commands::Status => commands::status_command(&ctx).await,
        Commands::Settings { action } => match action {
            SettingsAction::Get { key } => commands::settings_get(&ctx, &key),
            SettingsAction::Set { key, value } => commands::settings_set(&ctx, &key, &value),
        },
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_show(&ctx),
            ConfigAction::Path => {
                commands::config_path(&ctx);
                Ok(())
            }
            ConfigAction::Init { force } => commands::config_init(&ctx, force),
        },
    }
}
