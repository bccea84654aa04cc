use anyhow::Result;
use clap::{Parser, Subcommand};
use deckhand::commands::{self, deploy::DeployParams};
use deckhand::config::ClientConfig;
use deckhand::session::Credentials;
use deckhand::ui;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(
    name = "deckhand",
    version,
    about = "Deploy applications through a PaaS web dashboard"
)]
struct Cli {
    /// Path to a config file (default: ~/.deckhand/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Dashboard base URL (e.g. https://panel.example.com)
    #[arg(long, env = "DECKHAND_BASE_URL", global = true)]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Verify credentials and report which acceptance signal matched
    Login {
        /// Login email
        #[arg(long, env = "DECKHAND_EMAIL")]
        email: Option<String>,

        /// Login password
        #[arg(long, env = "DECKHAND_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Create and deploy an application from a git repository
    Deploy {
        /// Source repository URL
        repo: String,

        /// Application name
        name: String,

        /// Target domain for the application
        #[arg(long)]
        domain: Option<String>,

        /// Build method (e.g. nixpacks, dockerfile)
        #[arg(long)]
        build_method: Option<String>,

        /// Environment variable for the application, KEY=VALUE (repeatable)
        #[arg(long = "env", value_parser = parse_env_var)]
        env_vars: Vec<(String, String)>,

        /// Login email
        #[arg(long, env = "DECKHAND_EMAIL")]
        email: Option<String>,

        /// Login password
        #[arg(long, env = "DECKHAND_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Watch an existing operation to a terminal state
    Status {
        /// Operation id to watch
        operation_id: String,

        /// Seconds between polls
        #[arg(long)]
        poll_interval: Option<u64>,

        /// Overall watch timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Login email
        #[arg(long, env = "DECKHAND_EMAIL")]
        email: Option<String>,

        /// Login password
        #[arg(long, env = "DECKHAND_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
}

fn parse_env_var(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .filter(|(key, _)| !key.is_empty())
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .ok_or_else(|| format!("expected KEY=VALUE, got {s:?}"))
}

/// Merge the config file with CLI overrides and resolve credentials,
/// prompting for whatever is still missing.
fn prepare(
    config_path: Option<&PathBuf>,
    base_url: Option<String>,
    email: Option<String>,
    password: Option<String>,
) -> Result<(ClientConfig, Credentials)> {
    let mut config = ClientConfig::load(config_path.map(|p| p.as_path()))?;
    if let Some(base_url) = base_url {
        config.base_url = base_url;
    }

    let stored = config.credentials.clone();
    let credentials = ui::resolve_credentials(
        email.or_else(|| stored.as_ref().map(|c| c.email.clone())),
        password.or_else(|| stored.map(|c| c.password)),
    )?;
    Ok((config, credentials))
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match cli.command {
        Commands::Login { email, password } => {
            let (config, credentials) =
                prepare(cli.config.as_ref(), cli.base_url, email, password)?;
            commands::login::run(config, credentials).await
        }
        Commands::Deploy {
            repo,
            name,
            domain,
            build_method,
            env_vars,
            email,
            password,
        } => {
            let (config, credentials) =
                prepare(cli.config.as_ref(), cli.base_url, email, password)?;
            let params = DeployParams {
                repo_url: repo,
                name,
                domain,
                build_method,
                env_vars,
            };
            commands::deploy::run(config, credentials, params).await
        }
        Commands::Status {
            operation_id,
            poll_interval,
            timeout,
            email,
            password,
        } => {
            let (config, credentials) =
                prepare(cli.config.as_ref(), cli.base_url, email, password)?;
            commands::status::run(config, credentials, &operation_id, poll_interval, timeout).await
        }
    }
}
