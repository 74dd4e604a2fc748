use crate::cli::ConfigAction;
use anyhow::{Context, Result, bail};
use console::{Term, style};
use rdebrid::config::ConfigManager;

pub fn handle_config(config_manager: &ConfigManager, action: ConfigAction) -> Result<()> {
    let term = Term::stdout();

    match action {
        ConfigAction::Show => {
            term.write_line(&format!("{} Current configuration:", style("⚙️").cyan()))?;
            term.write_line("")?;
            term.write_line(&render_masked(config_manager)?)?;
        }

        ConfigAction::Path => {
            term.write_line(&format!(
                "{} Config file location: {}",
                style("📝").cyan(),
                config_manager.config_file().display()
            ))?;
        }

        ConfigAction::Validate => {
            term.write_line(&format!("{} Validating configuration...", style("🔍").cyan()))?;

            match config_manager.validate() {
                Ok(()) => {
                    term.write_line(&format!(
                        "{} Configuration is valid",
                        style("✅").green()
                    ))?;
                    if !config_manager.config().api.has_token() {
                        term.write_line(&format!(
                            "{} No API token set. Run {} to add one",
                            style("⚠️").yellow(),
                            style("rdebrid setup").cyan()
                        ))?;
                    }
                }
                Err(e) => {
                    term.write_line(&format!(
                        "{} Configuration is invalid: {}",
                        style("❌").red(),
                        e
                    ))?;
                    bail!("invalid configuration in {}", config_manager.config_file().display());
                }
            }
        }
    }

    Ok(())
}

/// Config as TOML with the token hidden
fn render_masked(config_manager: &ConfigManager) -> Result<String> {
    let mut config = config_manager.config().clone();
    config.api.token = config.api.masked_token();
    toml::to_string_pretty(&config).context("Failed to serialize config")
}
