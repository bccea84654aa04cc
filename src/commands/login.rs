use crate::client::Client;
use crate::config::ClientConfig;
use crate::progress;
use crate::session::Credentials;
use anyhow::{Context, Result};
use console::style;
use std::process::ExitCode;

/// Authenticate against the configured dashboard and report which
/// acceptance signal validated the session.
pub async fn run(config: ClientConfig, credentials: Credentials) -> Result<ExitCode> {
    let base_url = config.base_url.clone();
    let client = Client::new(config, credentials).context("Invalid configuration")?;

    println!("Logging in to {base_url}...");
    match client.authenticate().await {
        Ok(session) => {
            println!(
                "{} (accepted by {})",
                style("Login successful").green(),
                session.accepted_by()
            );
            match session.csrf_token() {
                Some(_) => progress::note("CSRF token bound to session"),
                None => progress::warn(
                    "no CSRF token found on the login page; state-changing calls may be rejected",
                ),
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            println!("{} {err}", style("Login failed:").red());
            Ok(ExitCode::FAILURE)
        }
    }
}
