//! The sequential orchestration pipeline:
//! authenticate → locate → submit → watch.
//!
//! One `Client` owns one run. Stages execute strictly in order, each gated
//! on the previous stage's output; the first non-recoverable error halts
//! the pipeline and is surfaced with its stage attached. Sessions are never
//! shared between clients, so concurrent runs cannot interfere through
//! cookies or CSRF state.

use crate::config::ClientConfig;
use crate::error::{AuthError, ConfigError, LocateError, RunError};
use crate::locate::{OperationDescriptor, ResourceHandle, ResourceLocator};
use crate::monitor::{Monitor, WatchReport};
use crate::session::{Credentials, Session, SessionManager};
use crate::submit::{OperationRequest, SubmissionError, SubmissionResult, Submitter};
use std::time::Duration;

/// Everything a completed deploy run produced.
#[derive(Debug)]
pub struct DeployOutcome {
    pub handle: ResourceHandle,
    pub submission: SubmissionResult,
    /// `None` when the backend acknowledged the submission without handing
    /// back an operation id to watch.
    pub report: Option<WatchReport>,
}

pub struct Client {
    config: ClientConfig,
    credentials: Credentials,
    manager: SessionManager,
    locator: ResourceLocator,
    submitter: Submitter,
    monitor: Monitor,
}

impl Client {
    pub fn new(config: ClientConfig, credentials: Credentials) -> Result<Self, ConfigError> {
        config.validate()?;
        let manager = SessionManager::new(&config);
        let submitter = Submitter::from_config(&config.strategy_order, &config.endpoints);
        let monitor = Monitor::new(
            config.endpoints.status.clone(),
            config.status_vocabulary.clone(),
        );
        Ok(Client {
            config,
            credentials,
            manager,
            locator: ResourceLocator,
            submitter,
            monitor,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    // ── Individual stages ───────────────────────────────────────────────

    pub async fn authenticate(&self) -> Result<Session, AuthError> {
        self.manager.authenticate(&self.credentials).await
    }

    pub async fn locate(
        &self,
        session: &Session,
        descriptor: &OperationDescriptor,
    ) -> Result<ResourceHandle, LocateError> {
        self.locator.locate(session, descriptor).await
    }

    pub async fn submit(
        &self,
        session: &mut Session,
        handle: &ResourceHandle,
        request: &OperationRequest,
    ) -> SubmissionResult {
        self.submitter
            .submit(&self.manager, session, handle, request)
            .await
    }

    pub async fn watch(&self, session: &Session, operation_id: &str) -> WatchReport {
        self.watch_with(
            session,
            operation_id,
            self.config.poll_interval(),
            self.config.timeout(),
        )
        .await
    }

    pub async fn watch_with(
        &self,
        session: &Session,
        operation_id: &str,
        poll_interval: Duration,
        timeout: Duration,
    ) -> WatchReport {
        self.monitor
            .watch(session, operation_id, poll_interval, timeout)
            .await
    }

    // ── Full pipeline ───────────────────────────────────────────────────

    /// Run the whole pipeline for one operation request. Halts at the first
    /// failing stage; an exhausted submission is promoted to a `RunError`
    /// with its full attempt trail.
    pub async fn deploy(&self, request: &OperationRequest) -> Result<DeployOutcome, RunError> {
        let descriptor = OperationDescriptor::from_config(&self.config);

        let mut session = self.authenticate().await?;
        let handle = self.locate(&session, &descriptor).await?;
        let submission = self.submit(&mut session, &handle, request).await;

        if !submission.success {
            return Err(RunError::Submit(SubmissionError { result: submission }));
        }

        let report = match submission.operation_id.as_deref() {
            Some(operation_id) => Some(self.watch(&session, operation_id).await),
            None => None,
        };

        Ok(DeployOutcome {
            handle,
            submission,
            report,
        })
    }
}
