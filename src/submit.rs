//! Multi-strategy submission of a creation operation.
//!
//! Each transport strategy is one independently-triable way to hand the
//! backend an [`OperationRequest`]: a Livewire-style component call, a
//! conventional form POST, or a generic resource-collection endpoint.
//! Strategies run strictly in configured order; the first success wins and
//! every attempt is recorded for diagnostics. The only retry anywhere is a
//! single CSRF-refresh-and-retry per submit call.

use crate::config::EndpointMap;
use crate::error::AuthError;
use crate::extract;
use crate::locate::ResourceHandle;
use crate::session::{Session, SessionManager};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Laravel's "page expired" status: the CSRF token went stale mid-session.
const CSRF_REJECTED_STATUS: u16 = 419;

/// The caller's intent, immutable for the submission.
#[derive(Debug, Clone, Serialize)]
pub struct OperationRequest {
    pub name: String,
    pub repo_url: String,
    pub domain: Option<String>,
    pub build_method: Option<String>,
    pub env_vars: Vec<(String, String)>,
}

/// Transport strategies in the order they may be attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    ComponentCall,
    FormPost,
    ResourceEndpoint,
}

pub fn default_strategy_order() -> Vec<StrategyKind> {
    vec![
        StrategyKind::ComponentCall,
        StrategyKind::FormPost,
        StrategyKind::ResourceEndpoint,
    ]
}

/// Outcome of one strategy attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum AttemptOutcome {
    Accepted { operation_id: Option<String> },
    Rejected { status: u16, detail: String },
    CsrfRejected,
    UnexpectedShape { detail: String },
    Network { detail: String },
}

/// One recorded attempt, kept even after later strategies succeed or fail.
#[derive(Debug, Clone, Serialize)]
pub struct StrategyAttempt {
    pub strategy: &'static str,
    pub outcome: AttemptOutcome,
}

/// Why a submission as a whole failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmitFailure {
    AllStrategiesExhausted,
}

/// Result of a submit call: first success, or the full failure trail.
#[derive(Debug, Clone, Serialize)]
pub struct SubmissionResult {
    pub success: bool,
    pub operation_id: Option<String>,
    pub attempts: Vec<StrategyAttempt>,
    pub failure: Option<SubmitFailure>,
}

impl SubmissionResult {
    /// Name of the strategy that succeeded, if any.
    pub fn accepted_strategy(&self) -> Option<&'static str> {
        self.attempts
            .iter()
            .find(|a| matches!(a.outcome, AttemptOutcome::Accepted { .. }))
            .map(|a| a.strategy)
    }
}

/// An exhausted submission, promoted to an error at the pipeline boundary
/// with the per-strategy trail preserved.
#[derive(Error, Debug)]
#[error("all strategies exhausted ({})", summarize(&.result.attempts))]
pub struct SubmissionError {
    pub result: SubmissionResult,
}

fn summarize(attempts: &[StrategyAttempt]) -> String {
    attempts
        .iter()
        .map(|a| match &a.outcome {
            AttemptOutcome::Accepted { .. } => format!("{}: accepted", a.strategy),
            AttemptOutcome::Rejected { status, .. } => format!("{}: {status}", a.strategy),
            AttemptOutcome::CsrfRejected => format!("{}: csrf rejected", a.strategy),
            AttemptOutcome::UnexpectedShape { .. } => format!("{}: unexpected shape", a.strategy),
            AttemptOutcome::Network { .. } => format!("{}: network", a.strategy),
        })
        .collect::<Vec<_>>()
        .join("; ")
}

/// One concrete transport for an operation request.
#[async_trait]
pub trait SubmitStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    async fn attempt(
        &self,
        session: &Session,
        handle: &ResourceHandle,
        request: &OperationRequest,
    ) -> AttemptOutcome;
}

/// Tries the configured strategies in order and stops at the first success.
pub struct Submitter {
    strategies: Vec<Box<dyn SubmitStrategy>>,
}

impl Submitter {
    pub fn from_config(order: &[StrategyKind], endpoints: &EndpointMap) -> Self {
        let strategies = order
            .iter()
            .map(|kind| -> Box<dyn SubmitStrategy> {
                match kind {
                    StrategyKind::ComponentCall => Box::new(ComponentCall {
                        endpoint: endpoints.component_call.clone(),
                        component_name: endpoints.component_name.clone(),
                    }),
                    StrategyKind::FormPost => Box::new(FormPost {
                        action: endpoints.form_action.clone(),
                    }),
                    StrategyKind::ResourceEndpoint => Box::new(ResourceEndpoint {
                        endpoint: endpoints.resource_collection.clone(),
                    }),
                }
            })
            .collect();
        Submitter { strategies }
    }

    #[cfg(test)]
    pub(crate) fn with_strategies(strategies: Vec<Box<dyn SubmitStrategy>>) -> Self {
        Submitter { strategies }
    }

    /// Attempt the request through each strategy in order. On a CSRF
    /// rejection the session token is refreshed and the same strategy
    /// retried, at most once per submit call.
    pub async fn submit(
        &self,
        manager: &SessionManager,
        session: &mut Session,
        handle: &ResourceHandle,
        request: &OperationRequest,
    ) -> SubmissionResult {
        let mut attempts = Vec::new();
        let mut refreshed = false;

        for strategy in &self.strategies {
            let mut outcome = strategy.attempt(session, handle, request).await;

            if matches!(outcome, AttemptOutcome::CsrfRejected) && !refreshed {
                refreshed = true;
                attempts.push(StrategyAttempt {
                    strategy: strategy.name(),
                    outcome: outcome.clone(),
                });
                match manager.refresh_token(session).await {
                    Ok(()) => outcome = strategy.attempt(session, handle, request).await,
                    Err(err) => {
                        outcome = refresh_failure_outcome(err);
                    }
                }
            }

            let accepted = matches!(outcome, AttemptOutcome::Accepted { .. });
            let operation_id = match &outcome {
                AttemptOutcome::Accepted { operation_id } => operation_id.clone(),
                _ => None,
            };
            attempts.push(StrategyAttempt {
                strategy: strategy.name(),
                outcome,
            });

            if accepted {
                return SubmissionResult {
                    success: true,
                    operation_id,
                    attempts,
                    failure: None,
                };
            }
        }

        SubmissionResult {
            success: false,
            operation_id: None,
            attempts,
            failure: Some(SubmitFailure::AllStrategiesExhausted),
        }
    }
}

fn refresh_failure_outcome(err: AuthError) -> AttemptOutcome {
    match err {
        AuthError::TokenMissing => AttemptOutcome::UnexpectedShape {
            detail: "token refresh found no CSRF token".into(),
        },
        other => AttemptOutcome::Network {
            detail: format!("token refresh failed: {other}"),
        },
    }
}

// ── Component call (Livewire-style structured invocation) ──────────────────

struct ComponentCall {
    endpoint: String,
    component_name: String,
}

#[derive(Serialize)]
struct CallEnvelope<'a> {
    fingerprint: Fingerprint<'a>,
    #[serde(rename = "serverMemo")]
    server_memo: ServerMemo<'a>,
    updates: Vec<Update<'a>>,
}

#[derive(Serialize)]
struct Fingerprint<'a> {
    id: &'a str,
    name: &'a str,
    locale: &'a str,
    path: &'a str,
    method: &'a str,
}

#[derive(Serialize)]
struct ServerMemo<'a> {
    children: Vec<serde_json::Value>,
    errors: Vec<serde_json::Value>,
    #[serde(rename = "htmlHash")]
    html_hash: &'a str,
    data: ComponentData<'a>,
    #[serde(rename = "dataMeta")]
    data_meta: Vec<serde_json::Value>,
    checksum: &'a str,
}

#[derive(Serialize)]
struct ComponentData<'a> {
    name: &'a str,
    git_repository: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    domain: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    build_pack: Option<&'a str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    environment_variables: Vec<EnvVar<'a>>,
}

#[derive(Serialize)]
struct EnvVar<'a> {
    key: &'a str,
    value: &'a str,
}

#[derive(Serialize)]
struct Update<'a> {
    #[serde(rename = "type")]
    update_type: &'a str,
    payload: UpdatePayload<'a>,
}

#[derive(Serialize)]
struct UpdatePayload<'a> {
    method: &'a str,
    params: Vec<serde_json::Value>,
}

#[async_trait]
impl SubmitStrategy for ComponentCall {
    fn name(&self) -> &'static str {
        "component_call"
    }

    async fn attempt(
        &self,
        session: &Session,
        handle: &ResourceHandle,
        request: &OperationRequest,
    ) -> AttemptOutcome {
        let component_id = handle.component_id.as_deref().unwrap_or(&self.component_name);
        let envelope = CallEnvelope {
            fingerprint: Fingerprint {
                id: component_id,
                name: &self.component_name,
                locale: "en",
                path: "/",
                method: "GET",
            },
            server_memo: ServerMemo {
                children: vec![],
                errors: vec![],
                html_hash: "",
                data: ComponentData {
                    name: &request.name,
                    git_repository: &request.repo_url,
                    domain: request.domain.as_deref(),
                    build_pack: request.build_method.as_deref(),
                    environment_variables: request
                        .env_vars
                        .iter()
                        .map(|(k, v)| EnvVar { key: k, value: v })
                        .collect(),
                },
                data_meta: vec![],
                checksum: "",
            },
            updates: vec![Update {
                update_type: "callMethod",
                payload: UpdatePayload {
                    method: "submit",
                    params: vec![],
                },
            }],
        };

        let mut req = session
            .http()
            .post(session.url(&self.endpoint))
            .header("X-Livewire", "true")
            .header("X-Requested-With", "XMLHttpRequest")
            .json(&envelope);
        if let Some(token) = session.csrf_token() {
            req = req.header("X-CSRF-TOKEN", token);
        }

        let resp = match req.send().await {
            Ok(resp) => resp,
            Err(e) => {
                return AttemptOutcome::Network {
                    detail: e.to_string(),
                }
            }
        };

        let status = resp.status().as_u16();
        if status == CSRF_REJECTED_STATUS {
            return AttemptOutcome::CsrfRejected;
        }
        if status != 200 {
            return AttemptOutcome::Rejected {
                status,
                detail: body_snippet(resp).await,
            };
        }

        // A component call succeeds only when the backend answers with the
        // Livewire effects shape; anything else is a different page served
        // with a 200 and must not be mistaken for acceptance.
        match resp.json::<serde_json::Value>().await {
            Ok(body) => match body.get("effects") {
                Some(effects) => AttemptOutcome::Accepted {
                    operation_id: effects
                        .get("redirect")
                        .and_then(|r| r.as_str())
                        .and_then(extract::redirect_operation_id),
                },
                None => AttemptOutcome::UnexpectedShape {
                    detail: "200 response without Livewire effects".into(),
                },
            },
            Err(_) => AttemptOutcome::UnexpectedShape {
                detail: "200 response was not JSON".into(),
            },
        }
    }
}

// ── Conventional form POST against the discovered form action ──────────────

struct FormPost {
    action: String,
}

#[async_trait]
impl SubmitStrategy for FormPost {
    fn name(&self) -> &'static str {
        "form_post"
    }

    async fn attempt(
        &self,
        session: &Session,
        handle: &ResourceHandle,
        request: &OperationRequest,
    ) -> AttemptOutcome {
        let action = crate::config::fill_template(&self.action, handle, None);

        let mut form: Vec<(String, String)> = vec![
            ("name".into(), request.name.clone()),
            ("git_repository".into(), request.repo_url.clone()),
        ];
        if let Some(domain) = &request.domain {
            form.push(("domain".into(), domain.clone()));
        }
        if let Some(build) = &request.build_method {
            form.push(("build_pack".into(), build.clone()));
        }
        for (key, value) in &request.env_vars {
            form.push((format!("env[{key}]"), value.clone()));
        }
        if let Some(token) = session.csrf_token() {
            form.push(("_token".into(), token.to_string()));
        }

        let resp = match session
            .http()
            .post(session.url(&action))
            .form(&form)
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => {
                return AttemptOutcome::Network {
                    detail: e.to_string(),
                }
            }
        };

        let status = resp.status().as_u16();
        if status == CSRF_REJECTED_STATUS {
            return AttemptOutcome::CsrfRejected;
        }
        if (300..400).contains(&status) {
            let operation_id = resp
                .headers()
                .get(reqwest::header::LOCATION)
                .and_then(|v| v.to_str().ok())
                .and_then(extract::redirect_operation_id);
            return AttemptOutcome::Accepted { operation_id };
        }
        if !(200..300).contains(&status) {
            return AttemptOutcome::Rejected {
                status,
                detail: body_snippet(resp).await,
            };
        }

        // A 2xx without a redirect counts only if the backend handed back a
        // structured body carrying the new resource's id.
        match resp.json::<serde_json::Value>().await {
            Ok(body) => match operation_id_from_body(&body) {
                Some(id) => AttemptOutcome::Accepted {
                    operation_id: Some(id),
                },
                None => AttemptOutcome::UnexpectedShape {
                    detail: "2xx response carried no operation id".into(),
                },
            },
            Err(_) => AttemptOutcome::UnexpectedShape {
                detail: "2xx form response was neither a redirect nor JSON".into(),
            },
        }
    }
}

// ── Generic resource-collection endpoint ────────────────────────────────────

struct ResourceEndpoint {
    endpoint: String,
}

#[derive(Serialize)]
struct CreateResourceRequest<'a> {
    name: &'a str,
    git_repository: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    domain: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    build_pack: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    project_uuid: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    environment_uuid: Option<&'a str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    environment_variables: Vec<EnvVar<'a>>,
}

#[async_trait]
impl SubmitStrategy for ResourceEndpoint {
    fn name(&self) -> &'static str {
        "resource_endpoint"
    }

    async fn attempt(
        &self,
        session: &Session,
        handle: &ResourceHandle,
        request: &OperationRequest,
    ) -> AttemptOutcome {
        let body = CreateResourceRequest {
            name: &request.name,
            git_repository: &request.repo_url,
            domain: request.domain.as_deref(),
            build_pack: request.build_method.as_deref(),
            project_uuid: handle.project_id.as_deref(),
            environment_uuid: handle.environment_id.as_deref(),
            environment_variables: request
                .env_vars
                .iter()
                .map(|(k, v)| EnvVar { key: k, value: v })
                .collect(),
        };

        let mut req = session
            .http()
            .post(session.url(&self.endpoint))
            .json(&body);
        if let Some(token) = session.csrf_token() {
            req = req.header("X-CSRF-TOKEN", token);
        }

        let resp = match req.send().await {
            Ok(resp) => resp,
            Err(e) => {
                return AttemptOutcome::Network {
                    detail: e.to_string(),
                }
            }
        };

        let status = resp.status().as_u16();
        if status == CSRF_REJECTED_STATUS {
            return AttemptOutcome::CsrfRejected;
        }
        if !matches!(status, 200 | 201 | 202) {
            return AttemptOutcome::Rejected {
                status,
                detail: body_snippet(resp).await,
            };
        }

        match resp.json::<serde_json::Value>().await {
            Ok(body) => AttemptOutcome::Accepted {
                operation_id: operation_id_from_body(&body),
            },
            Err(_) => AttemptOutcome::UnexpectedShape {
                detail: "accepted status but non-JSON body".into(),
            },
        }
    }
}

/// Pull an operation/resource id out of a JSON response body, trying the
/// field names backends actually use.
fn operation_id_from_body(body: &serde_json::Value) -> Option<String> {
    for key in ["deployment_uuid", "uuid", "id", "operation_id"] {
        match body.get(key) {
            Some(serde_json::Value::String(s)) if !s.is_empty() => return Some(s.clone()),
            Some(serde_json::Value::Number(n)) => return Some(n.to_string()),
            _ => {}
        }
    }
    None
}

async fn body_snippet(resp: reqwest::Response) -> String {
    let text = resp.text().await.unwrap_or_default();
    let trimmed = text.trim();
    if trimmed.len() <= 200 {
        trimmed.to_string()
    } else {
        let mut end = 200;
        while !trimmed.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &trimmed[..end])
    }
}
