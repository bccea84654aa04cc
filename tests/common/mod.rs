//! In-process mock of a Laravel/Livewire-style dashboard.

use axum::extract::{Form, Path, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::Deserialize;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

pub const EMAIL: &str = "user@example.com";
pub const PASSWORD: &str = "secret";
pub const LOGIN_TOKEN: &str = "tok-login";

/// How a submission endpoint reacts.
#[derive(Debug, Clone)]
pub enum Behavior {
    NotFound,
    CsrfReject,
    /// Livewire effects body, redirecting to the given location.
    AcceptEffects { redirect: String },
    /// Conventional 302 to the given location.
    AcceptRedirect { location: String },
    /// 201 with a JSON body carrying the given uuid.
    AcceptJson { uuid: String },
}

pub struct MockState {
    pub accept_login: bool,
    /// Answer rejected credentials with a 302 back to /login, the way
    /// Laravel bounces a failed form submission, instead of a 200 body.
    pub reject_by_redirect: bool,
    pub login_page_has_token: bool,
    /// (project_id, environment_id, label) links on the nav page.
    pub nav_links: Vec<(String, String, String)>,
    /// `wire:id` emitted on the operation page, when present.
    pub operation_component: Option<String>,
    pub component: Behavior,
    pub form: Behavior,
    pub resource: Behavior,
    /// Scripted status sequence; the last entry repeats forever.
    pub statuses: Mutex<VecDeque<String>>,
    /// "METHOD /path" log of every request served.
    pub hits: Mutex<Vec<String>>,
}

impl Default for MockState {
    fn default() -> Self {
        MockState {
            accept_login: true,
            reject_by_redirect: false,
            login_page_has_token: true,
            nav_links: vec![("p1".into(), "e1".into(), "Production".into())],
            operation_component: None,
            component: Behavior::NotFound,
            form: Behavior::NotFound,
            resource: Behavior::NotFound,
            statuses: Mutex::new(VecDeque::new()),
            hits: Mutex::new(Vec::new()),
        }
    }
}

impl MockState {
    pub fn with_statuses(self, statuses: &[&str]) -> Self {
        *self.statuses.lock().unwrap() = statuses.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn hits(&self) -> Vec<String> {
        self.hits.lock().unwrap().clone()
    }

    pub fn count_hits(&self, needle: &str) -> usize {
        self.hits().iter().filter(|h| h.as_str() == needle).count()
    }

    fn log(&self, entry: impl Into<String>) {
        self.hits.lock().unwrap().push(entry.into());
    }
}

/// Bind an ephemeral listener, serve the mock, return its base URL.
pub async fn serve(state: Arc<MockState>) -> String {
    let app = Router::new()
        .route("/login", get(login_page).post(login_submit))
        .route("/", get(token_page))
        .route("/projects", get(nav_page))
        .route("/new-application", get(operation_page))
        .route("/livewire/update", post(component_call))
        .route(
            "/project/{project}/environment/{environment}/new/application",
            post(form_post),
        )
        .route("/api/v1/applications", post(resource_post))
        .route("/deployments/{id}", get(deployment_status))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

async fn login_page(State(state): State<Arc<MockState>>) -> Html<String> {
    state.log("GET /login");
    let token_input = if state.login_page_has_token {
        format!(r#"<input type="hidden" name="_token" value="{LOGIN_TOKEN}">"#)
    } else {
        String::new()
    };
    Html(format!(
        "<html><body><form method=\"POST\" action=\"/login\">{token_input}\
         <input name=\"email\"><input name=\"password\"></form></body></html>"
    ))
}

#[derive(Deserialize)]
struct LoginForm {
    email: String,
    password: String,
    #[serde(rename = "_token")]
    token: Option<String>,
}

async fn login_submit(
    State(state): State<Arc<MockState>>,
    Form(form): Form<LoginForm>,
) -> Response {
    state.log("POST /login");
    if state.login_page_has_token && form.token.as_deref() != Some(LOGIN_TOKEN) {
        return (StatusCode::from_u16(419).unwrap(), "Page Expired").into_response();
    }
    if state.accept_login && form.email == EMAIL && form.password == PASSWORD {
        (
            StatusCode::FOUND,
            [
                (header::LOCATION, "/dashboard".to_string()),
                (
                    header::SET_COOKIE,
                    "laravel_session=sess-1; Path=/".to_string(),
                ),
            ],
        )
            .into_response()
    } else if state.reject_by_redirect {
        (StatusCode::FOUND, [(header::LOCATION, "/login".to_string())]).into_response()
    } else {
        Html("<html><body>These credentials do not match our records.</body></html>")
            .into_response()
    }
}

async fn token_page(State(state): State<Arc<MockState>>) -> Html<String> {
    state.log("GET /");
    Html(r#"<html><head><meta name="csrf-token" content="tok-fresh"></head></html>"#.into())
}

async fn nav_page(State(state): State<Arc<MockState>>) -> Html<String> {
    state.log("GET /projects");
    let links: String = state
        .nav_links
        .iter()
        .map(|(project, environment, label)| {
            format!(r#"<a href="/project/{project}/environment/{environment}">{label}</a>"#)
        })
        .collect();
    Html(format!("<html><body>{links}</body></html>"))
}

async fn operation_page(State(state): State<Arc<MockState>>) -> Html<String> {
    state.log("GET /new-application");
    let component = state
        .operation_component
        .as_deref()
        .map(|id| format!(r#"<div wire:id="{id}" wire:initial-data="{{}}"></div>"#))
        .unwrap_or_default();
    Html(format!("<html><body>{component}</body></html>"))
}

async fn component_call(State(state): State<Arc<MockState>>) -> Response {
    state.log("POST /livewire/update");
    respond(&state.component)
}

async fn form_post(
    State(state): State<Arc<MockState>>,
    Path((project, environment)): Path<(String, String)>,
) -> Response {
    state.log(format!(
        "POST /project/{project}/environment/{environment}/new/application"
    ));
    respond(&state.form)
}

async fn resource_post(State(state): State<Arc<MockState>>) -> Response {
    state.log("POST /api/v1/applications");
    respond(&state.resource)
}

async fn deployment_status(
    State(state): State<Arc<MockState>>,
    Path(id): Path<String>,
) -> Response {
    state.log(format!("GET /deployments/{id}"));
    let mut statuses = state.statuses.lock().unwrap();
    let status = if statuses.len() > 1 {
        statuses.pop_front().unwrap()
    } else {
        statuses.front().cloned().unwrap_or_else(|| "unknown".into())
    };
    Json(json!({ "status": status })).into_response()
}

fn respond(behavior: &Behavior) -> Response {
    match behavior {
        Behavior::NotFound => (StatusCode::NOT_FOUND, "not found").into_response(),
        Behavior::CsrfReject => {
            (StatusCode::from_u16(419).unwrap(), "Page Expired").into_response()
        }
        Behavior::AcceptEffects { redirect } => {
            Json(json!({ "effects": { "redirect": redirect } })).into_response()
        }
        Behavior::AcceptRedirect { location } => {
            (StatusCode::FOUND, [(header::LOCATION, location.clone())]).into_response()
        }
        Behavior::AcceptJson { uuid } => {
            (StatusCode::CREATED, Json(json!({ "uuid": uuid }))).into_response()
        }
    }
}
