use crate::config::RunRecord;
use crate::monitor::{DeployState, WatchVerdict};
use crate::session::Credentials;
use crate::submit::{AttemptOutcome, SubmissionResult};
use console::style;
use dialoguer::{Input, Password};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Create a spinner with a message.
pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
            .template("{spinner:.cyan} {msg}")
            .expect("valid template"),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Prompt for whichever credential parts were not supplied via flags/env.
pub fn resolve_credentials(
    email: Option<String>,
    password: Option<String>,
) -> Result<Credentials, anyhow::Error> {
    let email = match email {
        Some(e) => e,
        None => Input::new().with_prompt("Email").interact_text()?,
    };
    let password = match password {
        Some(p) => p,
        None => Password::new().with_prompt("Password").interact()?,
    };
    Ok(Credentials { email, password })
}

/// Style a deployment state for terminal output.
pub fn styled_state(state: DeployState) -> String {
    match state {
        DeployState::Succeeded => style("succeeded").green().to_string(),
        DeployState::Failed => style("failed").red().to_string(),
        DeployState::Running => style("running").yellow().to_string(),
        DeployState::Pending => style("pending").yellow().to_string(),
        DeployState::Unknown => style("unknown").dim().to_string(),
    }
}

pub fn styled_verdict(verdict: WatchVerdict) -> String {
    match verdict {
        WatchVerdict::Succeeded => style("SUCCEEDED").green().to_string(),
        WatchVerdict::Failed => style("FAILED").red().to_string(),
        WatchVerdict::TimedOut => style("TIMEOUT").yellow().to_string(),
    }
}

/// Print every strategy attempt from a submission, success or not.
pub fn print_attempt_trail(submission: &SubmissionResult) {
    for attempt in &submission.attempts {
        let outcome = match &attempt.outcome {
            AttemptOutcome::Accepted { operation_id } => {
                let id = operation_id.as_deref().unwrap_or("no operation id");
                style(format!("accepted ({id})")).green().to_string()
            }
            AttemptOutcome::Rejected { status, detail } => {
                let detail = if detail.is_empty() {
                    String::new()
                } else {
                    format!(": {detail}")
                };
                style(format!("rejected ({status}){detail}")).red().to_string()
            }
            AttemptOutcome::CsrfRejected => style("csrf rejected (419)").red().to_string(),
            AttemptOutcome::UnexpectedShape { detail } => {
                style(format!("unexpected response shape: {detail}"))
                    .red()
                    .to_string()
            }
            AttemptOutcome::Network { detail } => {
                style(format!("network error: {detail}")).red().to_string()
            }
        };
        println!("    {:<18} {outcome}", attempt.strategy);
    }
}

/// Print the deploy summary.
pub fn print_summary(record: &RunRecord) {
    let divider = "=".repeat(60);
    println!("\n{divider}");
    println!("  Deployment Run Complete");
    println!("{divider}");
    println!("  Application:   {}", record.app_name);
    println!("  Repository:    {}", record.repo_url);
    println!("  Dashboard:     {}", record.base_url);
    println!(
        "  Operation ID:  {}",
        record.operation_id.as_deref().unwrap_or("None")
    );
    println!(
        "  Strategy:      {}",
        record.strategy.as_deref().unwrap_or("None")
    );
    println!("  Verdict:       {}", record.verdict);
    println!("  Run Record:    ~/.deckhand/runs/{}.json", record.id);
    println!("{divider}\n");
}
