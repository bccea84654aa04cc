//! Discovery of the per-instance identifiers an operation needs.
//!
//! Identifiers (project, environment, component) are version- and
//! session-dependent, so they are resolved fresh per operation through a
//! prioritized list of read-only strategies and never cached or guessed.

use crate::config::ClientConfig;
use crate::error::LocateError;
use crate::extract::{self, NavTarget};
use crate::session::Session;
use serde::{Deserialize, Serialize};

/// One identifier slot a submission strategy may demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandleField {
    Project,
    Environment,
    Component,
}

/// Resolved identifiers addressing one remote operation. Read-only once
/// resolved; complete relative to the descriptor's required fields.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResourceHandle {
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub environment_id: Option<String>,
    #[serde(default)]
    pub component_id: Option<String>,
}

impl ResourceHandle {
    pub fn satisfies(&self, required: &[HandleField]) -> bool {
        required.iter().all(|field| match field {
            HandleField::Project => self.project_id.is_some(),
            HandleField::Environment => self.environment_id.is_some(),
            HandleField::Component => self.component_id.is_some(),
        })
    }
}

/// How to resolve an ambiguous discovery result. Without a hint, ambiguity
/// is surfaced to the caller rather than silently picking a candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocateHint {
    First,
    Named(String),
}

/// Names the target operation: which pages can reveal its identifiers and
/// which identifier slots it requires.
#[derive(Debug, Clone)]
pub struct OperationDescriptor {
    /// Navigation page listing project/environment links.
    pub nav_page: String,
    /// Operation-specific page (e.g. the resource-creation screen).
    pub operation_page: String,
    pub required: Vec<HandleField>,
    pub hint: Option<LocateHint>,
    /// Explicitly configured fallback, tried last. A declared fallback is
    /// not the silent guessing this replaces.
    pub default_handle: Option<ResourceHandle>,
}

impl OperationDescriptor {
    pub fn from_config(config: &ClientConfig) -> Self {
        OperationDescriptor {
            nav_page: config.endpoints.nav_page.clone(),
            operation_page: config.endpoints.operation_page.clone(),
            required: vec![HandleField::Project, HandleField::Environment],
            hint: config.locate_hint.clone(),
            default_handle: config.default_handle.clone(),
        }
    }
}

/// Tries discovery strategies in priority order: navigation page, then the
/// operation page, then a configured default. Each strategy yields a handle
/// satisfying every required field or is skipped; partial results are never
/// merged across strategies.
pub struct ResourceLocator;

impl ResourceLocator {
    pub async fn locate(
        &self,
        session: &Session,
        descriptor: &OperationDescriptor,
    ) -> Result<ResourceHandle, LocateError> {
        let mut last_fetch_error: Option<String> = None;
        let mut any_page_reachable = false;

        // Strategy 1: project/environment links on the navigation page.
        match fetch_page(session, &descriptor.nav_page).await {
            Ok(html) => {
                any_page_reachable = true;
                let targets = extract::project_environment_links(&html);
                if let Some(handle) = select_target(&targets, descriptor.hint.as_ref())? {
                    if handle.satisfies(&descriptor.required) {
                        return Ok(handle);
                    }
                }
            }
            Err(detail) => last_fetch_error = Some(detail),
        }

        // Strategy 2: identifiers embedded in the operation page itself.
        match fetch_page(session, &descriptor.operation_page).await {
            Ok(html) => {
                any_page_reachable = true;
                let targets = extract::project_environment_links(&html);
                if let Some(mut handle) = select_target(&targets, descriptor.hint.as_ref())? {
                    handle.component_id = extract::component_id(&html);
                    if handle.satisfies(&descriptor.required) {
                        return Ok(handle);
                    }
                } else if let Some(component) = extract::component_id(&html) {
                    let handle = ResourceHandle {
                        component_id: Some(component),
                        ..ResourceHandle::default()
                    };
                    if handle.satisfies(&descriptor.required) {
                        return Ok(handle);
                    }
                }
            }
            Err(detail) => last_fetch_error = Some(detail),
        }

        // Strategy 3: explicitly configured default handle.
        if let Some(handle) = &descriptor.default_handle {
            if handle.satisfies(&descriptor.required) {
                return Ok(handle.clone());
            }
        }

        if any_page_reachable {
            Err(LocateError::NotFound)
        } else {
            Err(LocateError::Unreachable(
                last_fetch_error.unwrap_or_else(|| "no discovery pages configured".into()),
            ))
        }
    }
}

async fn fetch_page(session: &Session, path: &str) -> Result<String, String> {
    let url = session.url(path);
    let resp = session
        .http()
        .get(&url)
        .send()
        .await
        .map_err(|e| e.to_string())?;
    if !resp.status().is_success() {
        return Err(format!("{url} returned {}", resp.status().as_u16()));
    }
    resp.text().await.map_err(|e| e.to_string())
}

/// Pick one nav target. Zero candidates: nothing found (strategy skipped).
/// One candidate: unambiguous. Several: honor the hint or fail as
/// ambiguous; a named hint that matches nothing skips the strategy.
fn select_target(
    targets: &[NavTarget],
    hint: Option<&LocateHint>,
) -> Result<Option<ResourceHandle>, LocateError> {
    let chosen = match (targets.len(), hint) {
        (0, _) => None,
        (1, _) => targets.first(),
        (_, Some(LocateHint::First)) => targets.first(),
        (_, Some(LocateHint::Named(name))) => {
            let needle = name.to_lowercase();
            targets.iter().find(|t| {
                t.label
                    .as_deref()
                    .is_some_and(|l| l.to_lowercase().contains(&needle))
            })
        }
        (_, None) => {
            return Err(LocateError::Ambiguous {
                field: "project/environment",
                candidates: targets
                    .iter()
                    .map(|t| format!("{}/{}", t.project_id, t.environment_id))
                    .collect(),
            })
        }
    };

    Ok(chosen.map(|t| ResourceHandle {
        project_id: Some(t.project_id.clone()),
        environment_id: Some(t.environment_id.clone()),
        component_id: None,
    }))
}
