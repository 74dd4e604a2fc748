mod cli;
mod handlers;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use rdebrid::ConfigManager;
use std::process;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    // Validate CLI arguments first
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        process::exit(1);
    }

    // Logs go to stderr so they never mix with progress output
    let level = if args.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let mut config_manager = match &args.config {
        Some(path) => ConfigManager::with_path(path)?,
        None => ConfigManager::new()?,
    };

    // Validate config on startup (unless we're about to fix it)
    if !handlers::should_skip_config_validation(&args.command) {
        if let Err(e) = config_manager.validate() {
            eprintln!("Configuration validation failed: {}", e);
            eprintln!(
                "Edit {} or run 'rdebrid config validate' for details",
                config_manager.config_file().display()
            );
            process::exit(1);
        }
    }

    if args.requires_token() && !config_manager.config().api.has_token() {
        eprintln!("No API token configured. Run setup first:\n  rdebrid setup");
        process::exit(1);
    }

    match args.command {
        Some(Commands::Setup { token }) => {
            handlers::handle_setup(&mut config_manager, token).await?;
        }
        Some(Commands::Config { action }) => {
            handlers::handle_config(&config_manager, action)?;
        }
        None => {
            let summary = handlers::handle_download(
                &config_manager,
                args.links,
                args.dir,
                args.builtin,
                args.no_install,
            )
            .await?;

            if summary.has_failures() {
                process::exit(1);
            }
        }
    }

    Ok(())
}
