//! bandsite - headless driver for the band site shell
//!
//! Runs the shell against a local site directory or a remote base URL and
//! prints what a visitor would see.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use bandsite_common::config::SiteConfig;
use bandsite_common::prefs::FilePreferences;
use bandsite_shell::dom::{ContentMount, MemoryMount};
use bandsite_shell::{App, Host, NavigationOutcome};
use clap::{Parser, Subcommand};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for bandsite
#[derive(Parser, Debug)]
#[command(name = "bandsite")]
#[command(about = "Headless driver for the band site shell")]
#[command(version)]
struct Args {
    /// Config file (TOML)
    #[arg(short, long, env = "BANDSITE_CONFIG")]
    config: Option<PathBuf>,

    /// Local directory page locators are read from
    #[arg(long, conflicts_with = "base_url")]
    site_root: Option<PathBuf>,

    /// Base URL page locators are fetched from
    #[arg(long)]
    base_url: Option<String>,

    /// Log level (overrides the config file; RUST_LOG overrides both)
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Navigate to each page in order and print the container
    Visit {
        #[arg(required = true)]
        pages: Vec<String>,
    },
    /// Fetch every page into the cache
    Preload,
    /// List the visible navigation entries
    Pages,
    /// Check the backend API
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = SiteConfig::load_or_default(args.config.as_deref());
    if let Some(root) = &args.site_root {
        config.site.root = Some(root.clone());
        config.site.base_url = None;
    }
    if let Some(base_url) = &args.base_url {
        config.site.base_url = Some(base_url.clone());
    }
    if let Some(level) = &args.log_level {
        config.logging.level = level.clone();
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("bandsite={0},bandsite_shell={0}", config.logging.level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting bandsite v{}", env!("CARGO_PKG_VERSION"));

    tokio::select! {
        result = run(config, args.command) => result,
        _ = signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
            Ok(())
        }
    }
}

async fn run(config: SiteConfig, command: Command) -> Result<()> {
    let prefs_path = config.preferences_path();
    let prefs = FilePreferences::open(&prefs_path)
        .with_context(|| format!("Failed to open preferences {}", prefs_path.display()))?;

    let mount = Arc::new(MemoryMount::new());
    let mut host = Host::headless("").with_prefs(Arc::new(prefs));
    host.mount = mount.clone();

    let app = App::new(config, host).context("Failed to build site")?;

    match command {
        Command::Visit { pages } => {
            app.start().await;
            for page in pages {
                let outcome = app.router().navigate_to(&page).await;
                report(&outcome);
                println!("{}", mount.html());
            }
        }
        Command::Preload => {
            app.start().await;
            app.router().preload_all().await;
            for page in app.router().loader().cached_pages() {
                println!("{}", page);
            }
        }
        Command::Pages => {
            for page in app.router().nav_entries() {
                println!("{}", page);
            }
        }
        Command::Health => {
            let Some(api) = app.api() else {
                bail!("No API base URL configured");
            };
            if api.health_check().await {
                println!("ok");
            } else {
                bail!("API at {} is unhealthy", api.base_url());
            }
        }
    }

    app.shutdown();
    Ok(())
}

fn report(outcome: &NavigationOutcome) {
    match outcome {
        NavigationOutcome::Committed(page) => info!(page = %page, "Displayed"),
        NavigationOutcome::Unchanged(page) => info!(page = %page, "Already displayed"),
        NavigationOutcome::Superseded(page) => warn!(page = %page, "Superseded"),
        NavigationOutcome::Failed(page, e) => warn!(page = %page, "Failed to load: {}", e),
    }
}
