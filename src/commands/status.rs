use crate::client::Client;
use crate::config::ClientConfig;
use crate::monitor::WatchVerdict;
use crate::session::Credentials;
use crate::{progress, ui};
use anyhow::{Context, Result};
use std::process::ExitCode;
use std::time::Duration;

/// Watch an existing operation to a terminal state and report it.
pub async fn run(
    config: ClientConfig,
    credentials: Credentials,
    operation_id: &str,
    poll_interval: Option<u64>,
    timeout: Option<u64>,
) -> Result<ExitCode> {
    let poll_interval = poll_interval
        .map(Duration::from_secs)
        .unwrap_or(config.poll_interval());
    let timeout = timeout.map(Duration::from_secs).unwrap_or(config.timeout());
    let base_url = config.base_url.clone();
    let client = Client::new(config, credentials).context("Invalid configuration")?;

    println!("Authenticating with {base_url}...");
    let session = client
        .authenticate()
        .await
        .context("Authentication stage failed")?;

    let sp = ui::spinner(&format!("Watching operation {operation_id}..."));
    let report = client
        .watch_with(&session, operation_id, poll_interval, timeout)
        .await;
    sp.finish_with_message(format!(
        "Operation {}: {} ({} poll(s), {:.0?} elapsed)",
        operation_id,
        ui::styled_verdict(report.verdict),
        report.polls,
        report.elapsed
    ));
    if let Some(message) = &report.last_status.message {
        progress::note(&format!("last status: {message}"));
    }

    match report.verdict {
        WatchVerdict::Succeeded => Ok(ExitCode::SUCCESS),
        _ => Ok(ExitCode::FAILURE),
    }
}
