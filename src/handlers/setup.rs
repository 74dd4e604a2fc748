use anyhow::{Context, Result, bail};
use console::{Term, style};
use dialoguer::Password;
use rdebrid::{ConfigManager, RealDebridClient, StaticToken};
use std::sync::Arc;

const TOKEN_PAGE: &str = "https://real-debrid.com/apitoken";

pub async fn handle_setup(config_manager: &mut ConfigManager, token: Option<String>) -> Result<()> {
    let term = Term::stdout();

    term.write_line(&format!("{} Real-Debrid setup", style("🔧").cyan().bold()))?;
    term.write_line("")?;
    term.write_line(&format!(
        "Get your API token from: {}",
        style(TOKEN_PAGE).cyan().underlined()
    ))?;
    term.write_line("")?;

    let token = match token {
        Some(token) => token,
        None => Password::new()
            .with_prompt("API token")
            .interact()
            .context("Failed to read token")?,
    };
    let token = token.trim().to_string();
    if token.is_empty() {
        bail!("no token entered");
    }

    term.write_line(&format!("{} Verifying token...", style("🔍").cyan()))?;

    let api = &config_manager.config().api;
    let client = RealDebridClient::new(
        &api.base_url,
        Arc::new(StaticToken(token.clone())),
        api.timeout(),
    )?;

    let user = match client.user().await {
        Ok(user) => user,
        Err(e) => {
            term.write_line(&format!("{} Token rejected: {}", style("❌").red(), e))?;
            bail!("could not verify token");
        }
    };

    config_manager.set_token(&token);
    config_manager.save()?;

    term.write_line(&format!(
        "{} Logged in as {} ({})",
        style("✅").green(),
        style(user.username.as_deref().unwrap_or("unknown")).green().bold(),
        user.account_type.as_deref().unwrap_or("unknown")
    ))?;
    term.write_line(&format!(
        "   Token saved to {}",
        style(config_manager.config_file().display()).dim()
    ))?;

    Ok(())
}
