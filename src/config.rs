//! Client configuration and local run records.
//!
//! Everything backend-specific is configuration, not contract: endpoint
//! paths, acceptance signals, and status vocabulary all come from here so
//! the client is not hardwired to one dashboard version. No secrets or
//! instance identifiers live at module scope.

use crate::error::ConfigError;
use crate::locate::{LocateHint, ResourceHandle};
use crate::monitor::{StatusVocabulary, WatchVerdict};
use crate::session::{self, Credentials, LoginSignal};
use crate::submit::{self, StrategyKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_POLL_INTERVAL_MS: u64 = 10_000;
pub const DEFAULT_TIMEOUT_MS: u64 = 300_000;
pub const CONFIG_FILE: &str = "config.json";

/// Resolve the app data directory: ~/.deckhand/
pub fn app_dir() -> Result<PathBuf, ConfigError> {
    let home = dirs::home_dir().ok_or(ConfigError::HomeDirNotFound)?;
    Ok(home.join(".deckhand"))
}

/// ~/.deckhand/runs/
pub fn runs_dir() -> Result<PathBuf, ConfigError> {
    Ok(app_dir()?.join("runs"))
}

/// Ensure all app directories exist
pub fn ensure_dirs() -> Result<(), ConfigError> {
    std::fs::create_dir_all(runs_dir()?)?;
    Ok(())
}

/// Mapping from logical operation to concrete endpoint template. Templates
/// may carry `{project}`, `{environment}`, `{component}` and `{operation}`
/// placeholders, filled from the resolved handle at request time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointMap {
    pub login: String,
    /// Page fetched when the CSRF token needs refreshing.
    pub token_page: String,
    pub nav_page: String,
    pub operation_page: String,
    pub component_call: String,
    /// Fingerprint name used when no component id was discovered.
    pub component_name: String,
    pub form_action: String,
    pub resource_collection: String,
    pub status: String,
}

impl Default for EndpointMap {
    fn default() -> Self {
        EndpointMap {
            login: "/login".into(),
            token_page: "/".into(),
            nav_page: "/projects".into(),
            operation_page: "/new-application".into(),
            component_call: "/livewire/update".into(),
            component_name: "resource.create".into(),
            form_action: "/project/{project}/environment/{environment}/new/application".into(),
            resource_collection: "/api/v1/applications".into(),
            status: "/deployments/{operation}".into(),
        }
    }
}

/// Fill an endpoint template's placeholders from a resolved handle and an
/// optional operation id. Unfilled placeholders stay verbatim, which makes
/// a misconfigured template visible in error messages instead of silent.
pub fn fill_template(template: &str, handle: &ResourceHandle, operation: Option<&str>) -> String {
    let mut out = template.to_string();
    if let Some(project) = &handle.project_id {
        out = out.replace("{project}", project);
    }
    if let Some(environment) = &handle.environment_id {
        out = out.replace("{environment}", environment);
    }
    if let Some(component) = &handle.component_id {
        out = out.replace("{component}", component);
    }
    if let Some(operation) = operation {
        out = out.replace("{operation}", operation);
    }
    out
}

/// The full client configuration. Defaults describe a conventional
/// Laravel/Livewire dashboard; every field can be overridden from the
/// config file or (for the common ones) CLI flags.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub base_url: String,
    /// Optional stored credentials; flags and env take precedence.
    pub credentials: Option<Credentials>,
    /// Self-hosted panels often run self-signed certificates.
    pub accept_invalid_certs: bool,
    pub login_signals: Vec<LoginSignal>,
    pub status_vocabulary: StatusVocabulary,
    pub poll_interval_ms: u64,
    pub timeout_ms: u64,
    pub strategy_order: Vec<StrategyKind>,
    pub endpoints: EndpointMap,
    pub default_handle: Option<ResourceHandle>,
    pub locate_hint: Option<LocateHint>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            base_url: String::new(),
            credentials: None,
            accept_invalid_certs: false,
            login_signals: session::default_login_signals(),
            status_vocabulary: StatusVocabulary::default(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            strategy_order: submit::default_strategy_order(),
            endpoints: EndpointMap::default(),
            default_handle: None,
            locate_hint: None,
        }
    }
}

impl ClientConfig {
    /// Load from an explicit path, or from ~/.deckhand/config.json when it
    /// exists; otherwise start from defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => {
                let default = app_dir()?.join(CONFIG_FILE);
                if !default.exists() {
                    return Ok(ClientConfig::default());
                }
                default
            }
        };
        let raw = std::fs::read_to_string(&path)?;
        let config: ClientConfig = serde_json::from_str(&raw)?;
        Ok(config)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_url.trim().is_empty() {
            return Err(ConfigError::MissingBaseUrl);
        }
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(ConfigError::Invalid(format!(
                "base_url must be http(s), got {:?}",
                self.base_url
            )));
        }
        if self.timeout_ms == 0 {
            return Err(ConfigError::Invalid("timeout must be non-zero".into()));
        }
        if self.strategy_order.is_empty() {
            return Err(ConfigError::Invalid(
                "strategy_order must name at least one strategy".into(),
            ));
        }
        Ok(())
    }
}

/// Summary of one orchestration run, written under ~/.deckhand/runs/.
#[derive(Debug, Serialize, Deserialize)]
pub struct RunRecord {
    pub id: String,
    pub base_url: String,
    pub app_name: String,
    pub repo_url: String,
    pub operation_id: Option<String>,
    /// Transport strategy that was accepted, when one was.
    pub strategy: Option<String>,
    pub verdict: String,
    pub created_at: DateTime<Utc>,
}

impl RunRecord {
    pub fn verdict_label(verdict: WatchVerdict) -> &'static str {
        match verdict {
            WatchVerdict::Succeeded => "succeeded",
            WatchVerdict::Failed => "failed",
            WatchVerdict::TimedOut => "timeout",
        }
    }

    pub fn save(&self) -> Result<PathBuf, ConfigError> {
        let path = runs_dir()?.join(format!("{}.json", self.id));
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json)?;
        Ok(path)
    }
}
