//! End-to-end orchestration scenarios against the mock dashboard.

mod common;

use common::{serve, Behavior, MockState, EMAIL, PASSWORD};
use deckhand::client::Client;
use deckhand::config::ClientConfig;
use deckhand::error::{AuthError, LocateError, RunError};
use deckhand::locate::{HandleField, LocateHint, OperationDescriptor, ResourceHandle};
use deckhand::monitor::{DeployState, WatchVerdict};
use deckhand::session::Credentials;
use deckhand::submit::{AttemptOutcome, OperationRequest};
use std::sync::Arc;
use std::time::Duration;

fn credentials() -> Credentials {
    Credentials {
        email: EMAIL.into(),
        password: PASSWORD.into(),
    }
}

fn config(base_url: &str) -> ClientConfig {
    ClientConfig {
        base_url: base_url.into(),
        poll_interval_ms: 20,
        timeout_ms: 2_000,
        ..Default::default()
    }
}

fn request() -> OperationRequest {
    OperationRequest {
        name: "test-app".into(),
        repo_url: "https://github.com/example/test-app".into(),
        domain: Some("test-app.example.com".into()),
        build_method: None,
        env_vars: vec![],
    }
}

#[tokio::test]
async fn full_pipeline_deploys_and_watches_to_success() {
    let state = Arc::new(
        MockState {
            form: Behavior::AcceptRedirect {
                location: "/deployments/op-123".into(),
            },
            ..Default::default()
        }
        .with_statuses(&["running", "finished"]),
    );
    let base_url = serve(state.clone()).await;

    let client = Client::new(config(&base_url), credentials()).unwrap();
    let outcome = client.deploy(&request()).await.unwrap();

    assert!(outcome.submission.success);
    assert_eq!(outcome.submission.operation_id.as_deref(), Some("op-123"));
    assert_eq!(outcome.submission.accepted_strategy(), Some("form_post"));
    assert_eq!(outcome.handle.project_id.as_deref(), Some("p1"));
    assert_eq!(outcome.handle.environment_id.as_deref(), Some("e1"));

    let report = outcome.report.expect("watch report");
    assert_eq!(report.verdict, WatchVerdict::Succeeded);
    assert_eq!(report.polls, 2);

    // Strategy order respected: the component call failed first, the form
    // succeeded, and the resource endpoint was never touched.
    assert_eq!(state.count_hits("POST /livewire/update"), 1);
    assert_eq!(state.count_hits("POST /api/v1/applications"), 0);
}

#[tokio::test]
async fn rejected_credentials_halt_before_discovery() {
    let state = Arc::new(MockState {
        accept_login: false,
        ..Default::default()
    });
    let base_url = serve(state.clone()).await;

    let client = Client::new(config(&base_url), credentials()).unwrap();
    let err = client.deploy(&request()).await.unwrap_err();

    assert_eq!(err.stage(), "authenticate");
    assert!(matches!(err, RunError::Auth(_)));
    assert_eq!(state.count_hits("GET /projects"), 0);
}

#[tokio::test]
async fn rejection_redirect_back_to_login_is_not_a_session() {
    // Laravel answers bad credentials with a 302 back to the login form;
    // that redirect must not satisfy the default acceptance signals.
    let state = Arc::new(MockState {
        accept_login: false,
        reject_by_redirect: true,
        ..Default::default()
    });
    let base_url = serve(state.clone()).await;

    let client = Client::new(config(&base_url), credentials()).unwrap();
    let err = client.authenticate().await.unwrap_err();
    assert!(matches!(err, AuthError::Rejected { status: 302, .. }));

    let err = client.deploy(&request()).await.unwrap_err();
    assert_eq!(err.stage(), "authenticate");
    assert_eq!(state.count_hits("GET /projects"), 0);
}

#[tokio::test]
async fn exhausted_strategies_record_every_attempt() {
    // All three transports 404.
    let state = Arc::new(MockState::default());
    let base_url = serve(state.clone()).await;

    let client = Client::new(config(&base_url), credentials()).unwrap();
    let err = client.deploy(&request()).await.unwrap_err();

    assert_eq!(err.stage(), "submit");
    let RunError::Submit(submission_err) = err else {
        panic!("expected submit error");
    };
    let result = submission_err.result;
    assert!(!result.success);
    assert_eq!(result.attempts.len(), 3);
    let strategies: Vec<_> = result.attempts.iter().map(|a| a.strategy).collect();
    assert_eq!(
        strategies,
        vec!["component_call", "form_post", "resource_endpoint"]
    );
    for attempt in &result.attempts {
        assert!(matches!(
            attempt.outcome,
            AttemptOutcome::Rejected { status: 404, .. }
        ));
    }
}

#[tokio::test]
async fn csrf_rejection_triggers_exactly_one_refresh() {
    let state = Arc::new(MockState {
        component: Behavior::CsrfReject,
        form: Behavior::CsrfReject,
        resource: Behavior::CsrfReject,
        ..Default::default()
    });
    let base_url = serve(state.clone()).await;

    let client = Client::new(config(&base_url), credentials()).unwrap();
    let err = client.deploy(&request()).await.unwrap_err();
    assert_eq!(err.stage(), "submit");

    // One token refresh for the whole submit call, spent on the first
    // strategy; later strategies are not retried.
    assert_eq!(state.count_hits("GET /"), 1);
    assert_eq!(state.count_hits("POST /livewire/update"), 2);
    assert_eq!(state.count_hits("POST /api/v1/applications"), 1);
}

#[tokio::test]
async fn component_call_wins_when_livewire_answers() {
    let state = Arc::new(
        MockState {
            component: Behavior::AcceptEffects {
                redirect: "/deployments/op-lw".into(),
            },
            ..Default::default()
        }
        .with_statuses(&["finished"]),
    );
    let base_url = serve(state.clone()).await;

    let client = Client::new(config(&base_url), credentials()).unwrap();
    let outcome = client.deploy(&request()).await.unwrap();

    assert_eq!(outcome.submission.accepted_strategy(), Some("component_call"));
    assert_eq!(outcome.submission.operation_id.as_deref(), Some("op-lw"));
    assert_eq!(state.count_hits("POST /api/v1/applications"), 0);
}

#[tokio::test]
async fn resource_endpoint_accepts_after_earlier_strategies_fail() {
    let state = Arc::new(
        MockState {
            resource: Behavior::AcceptJson {
                uuid: "uuid-7".into(),
            },
            ..Default::default()
        }
        .with_statuses(&["finished"]),
    );
    let base_url = serve(state.clone()).await;

    let client = Client::new(config(&base_url), credentials()).unwrap();
    let outcome = client.deploy(&request()).await.unwrap();

    assert!(outcome.submission.success);
    assert_eq!(
        outcome.submission.accepted_strategy(),
        Some("resource_endpoint")
    );
    assert_eq!(outcome.submission.operation_id.as_deref(), Some("uuid-7"));
    assert_eq!(outcome.submission.attempts.len(), 3);
    assert_eq!(state.count_hits("POST /livewire/update"), 1);
    assert_eq!(state.count_hits("POST /api/v1/applications"), 1);

    let report = outcome.report.expect("watch report");
    assert_eq!(report.verdict, WatchVerdict::Succeeded);
}

#[tokio::test]
async fn login_without_token_still_establishes_a_session() {
    let state = Arc::new(MockState {
        login_page_has_token: false,
        ..Default::default()
    });
    let base_url = serve(state).await;

    let client = Client::new(config(&base_url), credentials()).unwrap();
    let session = client.authenticate().await.unwrap();
    assert!(session.csrf_token().is_none());
    assert_eq!(session.accepted_by(), "redirect");
}

#[tokio::test]
async fn locate_is_idempotent_against_unchanged_backend() {
    let state = Arc::new(MockState::default());
    let base_url = serve(state).await;

    let client = Client::new(config(&base_url), credentials()).unwrap();
    let session = client.authenticate().await.unwrap();
    let descriptor = OperationDescriptor::from_config(client.config());

    let first = client.locate(&session, &descriptor).await.unwrap();
    let second = client.locate(&session, &descriptor).await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn ambiguous_nav_page_needs_a_hint() {
    let state = Arc::new(MockState {
        nav_links: vec![
            ("p1".into(), "e1".into(), "Production".into()),
            ("p2".into(), "e2".into(), "Staging".into()),
        ],
        ..Default::default()
    });
    let base_url = serve(state).await;

    // Without a hint the ambiguity is surfaced, not guessed away.
    let client = Client::new(config(&base_url), credentials()).unwrap();
    let session = client.authenticate().await.unwrap();
    let descriptor = OperationDescriptor::from_config(client.config());
    let err = client.locate(&session, &descriptor).await.unwrap_err();
    assert!(matches!(err, LocateError::Ambiguous { .. }));

    // A named hint resolves it.
    let mut hinted_config = config(&base_url);
    hinted_config.locate_hint = Some(LocateHint::Named("staging".into()));
    let client = Client::new(hinted_config, credentials()).unwrap();
    let session = client.authenticate().await.unwrap();
    let descriptor = OperationDescriptor::from_config(client.config());
    let handle = client.locate(&session, &descriptor).await.unwrap();
    assert_eq!(handle.project_id.as_deref(), Some("p2"));
}

#[tokio::test]
async fn locate_fails_explicitly_when_nothing_is_discoverable() {
    let state = Arc::new(MockState {
        nav_links: vec![],
        ..Default::default()
    });
    let base_url = serve(state).await;

    let client = Client::new(config(&base_url), credentials()).unwrap();
    let session = client.authenticate().await.unwrap();
    let descriptor = OperationDescriptor::from_config(client.config());
    let err = client.locate(&session, &descriptor).await.unwrap_err();
    assert!(matches!(err, LocateError::NotFound));
}

#[tokio::test]
async fn default_handle_is_used_only_after_page_strategies_fail() {
    let fallback = ResourceHandle {
        project_id: Some("p9".into()),
        environment_id: Some("e9".into()),
        component_id: None,
    };

    // No page yields identifiers: the configured fallback is the answer.
    let state = Arc::new(MockState {
        nav_links: vec![],
        ..Default::default()
    });
    let base_url = serve(state).await;
    let mut cfg = config(&base_url);
    cfg.default_handle = Some(fallback.clone());
    let client = Client::new(cfg, credentials()).unwrap();
    let session = client.authenticate().await.unwrap();
    let descriptor = OperationDescriptor::from_config(client.config());
    let handle = client.locate(&session, &descriptor).await.unwrap();
    assert_eq!(handle, fallback);

    // Pages that do answer win over the fallback.
    let state = Arc::new(MockState::default());
    let base_url = serve(state).await;
    let mut cfg = config(&base_url);
    cfg.default_handle = Some(fallback.clone());
    let client = Client::new(cfg, credentials()).unwrap();
    let session = client.authenticate().await.unwrap();
    let descriptor = OperationDescriptor::from_config(client.config());
    let handle = client.locate(&session, &descriptor).await.unwrap();
    assert_eq!(handle.project_id.as_deref(), Some("p1"));

    // A fallback missing a required field is never used.
    let state = Arc::new(MockState {
        nav_links: vec![],
        ..Default::default()
    });
    let base_url = serve(state).await;
    let mut cfg = config(&base_url);
    cfg.default_handle = Some(fallback);
    let client = Client::new(cfg, credentials()).unwrap();
    let session = client.authenticate().await.unwrap();
    let mut descriptor = OperationDescriptor::from_config(client.config());
    descriptor.required.push(HandleField::Component);
    let err = client.locate(&session, &descriptor).await.unwrap_err();
    assert!(matches!(err, LocateError::NotFound));
}

#[tokio::test]
async fn operation_page_component_feeds_the_livewire_strategy() {
    let state = Arc::new(MockState {
        nav_links: vec![],
        operation_component: Some("comp-9".into()),
        ..Default::default()
    });
    let base_url = serve(state).await;

    let client = Client::new(config(&base_url), credentials()).unwrap();
    let session = client.authenticate().await.unwrap();

    let mut descriptor = OperationDescriptor::from_config(client.config());
    descriptor.required = vec![HandleField::Component];
    let handle = client.locate(&session, &descriptor).await.unwrap();
    assert_eq!(handle.component_id.as_deref(), Some("comp-9"));
}

#[tokio::test]
async fn watch_times_out_with_last_seen_status() {
    let state = Arc::new(MockState::default().with_statuses(&["building"]));
    let base_url = serve(state).await;

    let client = Client::new(config(&base_url), credentials()).unwrap();
    let session = client.authenticate().await.unwrap();

    let poll_interval = Duration::from_millis(30);
    let timeout = Duration::from_millis(150);
    let report = client
        .watch_with(&session, "op-slow", poll_interval, timeout)
        .await;

    assert_eq!(report.verdict, WatchVerdict::TimedOut);
    assert_eq!(report.last_status.state, DeployState::Running);
    assert!(report.elapsed >= timeout);
    // Bounded by timeout + poll_interval (plus scheduling slack).
    assert!(report.elapsed < timeout + poll_interval + Duration::from_millis(100));
}

#[tokio::test]
async fn watch_tolerates_state_regressions_as_noise() {
    let state = Arc::new(MockState::default().with_statuses(&["running", "queued", "finished"]));
    let base_url = serve(state).await;

    let client = Client::new(config(&base_url), credentials()).unwrap();
    let session = client.authenticate().await.unwrap();
    let report = client
        .watch_with(
            &session,
            "op-noisy",
            Duration::from_millis(10),
            Duration::from_secs(2),
        )
        .await;

    assert_eq!(report.verdict, WatchVerdict::Succeeded);
    assert_eq!(report.polls, 3);
}

#[tokio::test]
async fn watch_classifies_failure_distinctly_from_timeout() {
    let state = Arc::new(MockState::default().with_statuses(&["running", "crashed"]));
    let base_url = serve(state).await;

    let client = Client::new(config(&base_url), credentials()).unwrap();
    let session = client.authenticate().await.unwrap();
    let report = client
        .watch_with(
            &session,
            "op-bad",
            Duration::from_millis(10),
            Duration::from_secs(2),
        )
        .await;

    assert_eq!(report.verdict, WatchVerdict::Failed);
    assert_eq!(report.last_status.state, DeployState::Failed);
}
