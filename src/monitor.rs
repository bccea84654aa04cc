//! Timeout-bounded polling of a deployment to a terminal state.

use crate::config;
use crate::locate::ResourceHandle;
use crate::session::Session;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Point-in-time deployment state. `Unknown` covers unreachable status
/// sources and vocabulary misses; it never terminates the watch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeployState {
    Pending,
    Running,
    Succeeded,
    Failed,
    Unknown,
}

/// Snapshot produced by one poll. No history is kept; each poll yields a
/// fresh value and only the most recent one is retained.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeploymentStatus {
    pub state: DeployState,
    pub message: Option<String>,
}

impl DeploymentStatus {
    fn unknown(message: impl Into<String>) -> Self {
        DeploymentStatus {
            state: DeployState::Unknown,
            message: Some(message.into()),
        }
    }
}

/// How the watch ended. `TimedOut` is deliberately distinct from `Failed`:
/// on timeout the remote operation's true outcome is unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WatchVerdict {
    Succeeded,
    Failed,
    TimedOut,
}

#[derive(Debug, Clone, Serialize)]
pub struct WatchReport {
    pub verdict: WatchVerdict,
    pub last_status: DeploymentStatus,
    #[serde(skip)]
    pub elapsed: Duration,
    pub polls: u32,
}

/// Success/failure keyword sets for classifying backend status text.
/// Backend vocabularies are not standardized, so the sets are caller
/// configuration with defaults matching common dashboards.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusVocabulary {
    pub success: Vec<String>,
    pub failure: Vec<String>,
    pub running: Vec<String>,
    pub pending: Vec<String>,
}

impl Default for StatusVocabulary {
    fn default() -> Self {
        StatusVocabulary {
            success: words(&["succeeded", "success", "finished", "deployed", "healthy"]),
            failure: words(&["failed", "error", "crashed", "cancelled"]),
            running: words(&["running", "in_progress", "building", "deploying", "starting"]),
            pending: words(&["pending", "queued", "created"]),
        }
    }
}

fn words(list: &[&str]) -> Vec<String> {
    list.iter().map(|w| w.to_string()).collect()
}

impl StatusVocabulary {
    /// Classify a status string. Failure keywords take precedence so that
    /// "deployment failed" is never read as progress; success next, so a
    /// terminal verdict beats a lingering "running" mention.
    pub fn classify(&self, text: &str) -> DeployState {
        let lower = text.to_lowercase();
        let hit = |set: &[String]| set.iter().any(|word| lower.contains(word.as_str()));
        if hit(&self.failure) {
            DeployState::Failed
        } else if hit(&self.success) {
            DeployState::Succeeded
        } else if hit(&self.running) {
            DeployState::Running
        } else if hit(&self.pending) {
            DeployState::Pending
        } else {
            DeployState::Unknown
        }
    }
}

/// Polls the configured status endpoint until a terminal classification or
/// the timeout. Polls are independent: progress is not assumed monotonic,
/// and a failed poll classifies as `Unknown` rather than ending the watch.
pub struct Monitor {
    status_endpoint: String,
    vocabulary: StatusVocabulary,
}

impl Monitor {
    pub fn new(status_endpoint: String, vocabulary: StatusVocabulary) -> Self {
        Monitor {
            status_endpoint,
            vocabulary,
        }
    }

    /// Watch one operation to a terminal state. `timeout` is mandatory:
    /// total wall clock is bounded by `timeout + poll_interval` no matter
    /// what the backend does.
    pub async fn watch(
        &self,
        session: &Session,
        operation_id: &str,
        poll_interval: Duration,
        timeout: Duration,
    ) -> WatchReport {
        let url = session.url(&config::fill_template(
            &self.status_endpoint,
            &ResourceHandle::default(),
            Some(operation_id),
        ));

        let start = Instant::now();
        let mut polls = 0u32;
        loop {
            polls += 1;
            let status = self.poll_once(session, &url).await;

            match status.state {
                DeployState::Succeeded => {
                    return WatchReport {
                        verdict: WatchVerdict::Succeeded,
                        last_status: status,
                        elapsed: start.elapsed(),
                        polls,
                    }
                }
                DeployState::Failed => {
                    return WatchReport {
                        verdict: WatchVerdict::Failed,
                        last_status: status,
                        elapsed: start.elapsed(),
                        polls,
                    }
                }
                _ => {}
            }

            if start.elapsed() >= timeout {
                return WatchReport {
                    verdict: WatchVerdict::TimedOut,
                    last_status: status,
                    elapsed: start.elapsed(),
                    polls,
                };
            }
            tokio::time::sleep(poll_interval).await;
        }
    }

    async fn poll_once(&self, session: &Session, url: &str) -> DeploymentStatus {
        let resp = match session.http().get(url).send().await {
            Ok(resp) => resp,
            Err(e) => return DeploymentStatus::unknown(format!("poll failed: {e}")),
        };
        if !resp.status().is_success() {
            return DeploymentStatus::unknown(format!("status source returned {}", resp.status()));
        }
        let text = match resp.text().await {
            Ok(text) => text,
            Err(e) => return DeploymentStatus::unknown(format!("poll body unreadable: {e}")),
        };

        // Prefer an explicit `status` field when the body is JSON; fall
        // back to scanning the raw text for vocabulary keywords.
        if let Ok(body) = serde_json::from_str::<serde_json::Value>(&text) {
            if let Some(status) = body.get("status").and_then(|s| s.as_str()) {
                let message = body
                    .get("message")
                    .and_then(|m| m.as_str())
                    .map(|m| m.to_string())
                    .or_else(|| Some(status.to_string()));
                return DeploymentStatus {
                    state: self.vocabulary.classify(status),
                    message,
                };
            }
        }
        DeploymentStatus {
            state: self.vocabulary.classify(&text),
            message: None,
        }
    }
}
