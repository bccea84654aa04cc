//! Session establishment and CSRF token lifecycle.

use crate::config::ClientConfig;
use crate::error::{AuthError, TransportError};
use crate::extract;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, SET_COOKIE, USER_AGENT};
use serde::{Deserialize, Serialize};

const UA: &str = concat!("deckhand/", env!("CARGO_PKG_VERSION"));

/// Caller-supplied login identity. Immutable for the client's lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// One signal that a login response belongs to an authenticated area.
/// Signals are evaluated in configured order; first match wins. No single
/// signal is assumed because backends differ across versions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LoginSignal {
    /// A 3xx response whose `Location` starts with the given prefix. A
    /// redirect pointing back at the login page never matches; Laravel-style
    /// backends bounce rejected credentials back to the form with a 302.
    Redirect { location_prefix: String },
    /// A 200 response whose body contains the marker (case-insensitive).
    BodyMarker { marker: String },
}

pub fn default_login_signals() -> Vec<LoginSignal> {
    vec![
        LoginSignal::Redirect {
            location_prefix: String::new(),
        },
        LoginSignal::BodyMarker {
            marker: "dashboard".into(),
        },
        LoginSignal::BodyMarker {
            marker: "logout".into(),
        },
    ]
}

/// Authenticated context for one orchestration run: a cookie-carrying HTTP
/// client, the base URL, and the current CSRF token if one was found.
/// Created only by [`SessionManager::authenticate`]; the token is mutated
/// only through [`SessionManager::refresh_token`].
#[derive(Debug)]
pub struct Session {
    http: reqwest::Client,
    base_url: String,
    csrf_token: Option<String>,
    accepted_by: String,
}

impl Session {
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Absolute URL for a dashboard path.
    pub fn url(&self, path: &str) -> String {
        join(&self.base_url, path)
    }

    pub fn csrf_token(&self) -> Option<&str> {
        self.csrf_token.as_deref()
    }

    /// Description of the acceptance signal that validated the login.
    pub fn accepted_by(&self) -> &str {
        &self.accepted_by
    }

    #[cfg(test)]
    pub(crate) fn for_tests(base_url: &str) -> Self {
        Session {
            http: reqwest::Client::new(),
            base_url: base_url.to_string(),
            csrf_token: Some("test-token".into()),
            accepted_by: "test".into(),
        }
    }
}

/// Owns authentication state and its refresh lifecycle. Holds no secrets
/// itself; credentials are passed per call and sessions carry only cookies
/// and the token.
pub struct SessionManager {
    base_url: String,
    login_path: String,
    token_page: String,
    signals: Vec<LoginSignal>,
    accept_invalid_certs: bool,
}

impl SessionManager {
    pub fn new(config: &ClientConfig) -> Self {
        SessionManager {
            base_url: config.base_url.clone(),
            login_path: config.endpoints.login.clone(),
            token_page: config.endpoints.token_page.clone(),
            signals: config.login_signals.clone(),
            accept_invalid_certs: config.accept_invalid_certs,
        }
    }

    /// Fetch the login page, extract an anti-forgery token from its markup
    /// or its `XSRF-TOKEN` cookie if one is present, submit the credentials,
    /// and validate success against the configured acceptance signals. A
    /// missing token is tolerated; the submission simply carries none.
    pub async fn authenticate(&self, credentials: &Credentials) -> Result<Session, AuthError> {
        let http = self.build_http_client().map_err(TransportError::from)?;

        let login_url = join(&self.base_url, &self.login_path);
        let resp = http
            .get(&login_url)
            .send()
            .await
            .map_err(TransportError::from)?;
        if !resp.status().is_success() {
            return Err(AuthError::Transport(TransportError::Status {
                status: resp.status().as_u16(),
                url: login_url,
            }));
        }
        let token_cookie = resp
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find_map(|line| extract::set_cookie_value(line, "XSRF-TOKEN"));
        let page = resp.text().await.map_err(TransportError::from)?;
        let csrf_token = extract::csrf_token(&page).or(token_cookie);

        let mut form: Vec<(&str, &str)> = vec![
            ("email", credentials.email.as_str()),
            ("password", credentials.password.as_str()),
        ];
        if let Some(token) = csrf_token.as_deref() {
            form.push(("_token", token));
        }

        let resp = http
            .post(&login_url)
            .form(&form)
            .send()
            .await
            .map_err(TransportError::from)?;

        let status = resp.status().as_u16();
        let location = resp
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let body = resp.text().await.map_err(TransportError::from)?;

        match first_matching_signal(
            &self.signals,
            status,
            location.as_deref(),
            &body,
            &self.login_path,
        ) {
            Some(signal) => Ok(Session {
                http,
                base_url: self.base_url.clone(),
                csrf_token,
                accepted_by: describe_signal(signal),
            }),
            None => Err(AuthError::Rejected {
                status,
                detail: snippet(&body),
            }),
        }
    }

    /// Re-fetch the token page and swap the session's CSRF token. Used by
    /// the submitter after a CSRF rejection; here a missing token is an
    /// error since obtaining one is the only reason to call this.
    pub async fn refresh_token(&self, session: &mut Session) -> Result<(), AuthError> {
        let url = session.url(&self.token_page);
        let resp = session
            .http
            .get(&url)
            .send()
            .await
            .map_err(TransportError::from)?;

        let from_cookie = resp
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find_map(|line| extract::set_cookie_value(line, "XSRF-TOKEN"));
        let body = resp.text().await.map_err(TransportError::from)?;

        let token = extract::csrf_token(&body)
            .or(from_cookie)
            .ok_or(AuthError::TokenMissing)?;
        session.csrf_token = Some(token);
        Ok(())
    }

    fn build_http_client(&self) -> Result<reqwest::Client, reqwest::Error> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(UA));
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/json;q=0.9,*/*;q=0.8"),
        );

        // Redirects stay visible: a 302 after login is an acceptance
        // signal, not something to follow blindly.
        reqwest::Client::builder()
            .default_headers(headers)
            .cookie_store(true)
            .redirect(reqwest::redirect::Policy::none())
            .danger_accept_invalid_certs(self.accept_invalid_certs)
            .build()
    }
}

fn join(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    if path.starts_with('/') {
        format!("{base}{path}")
    } else {
        format!("{base}/{path}")
    }
}

fn first_matching_signal<'a>(
    signals: &'a [LoginSignal],
    status: u16,
    location: Option<&str>,
    body: &str,
    login_path: &str,
) -> Option<&'a LoginSignal> {
    signals.iter().find(|signal| match signal {
        LoginSignal::Redirect { location_prefix } => {
            (300..400).contains(&status)
                && location.is_some_and(|loc| {
                    loc.starts_with(location_prefix.as_str()) && !points_back_at(loc, login_path)
                })
        }
        LoginSignal::BodyMarker { marker } => {
            status == 200 && body.to_lowercase().contains(&marker.to_lowercase())
        }
    })
}

/// Whether a redirect target's path is the login page itself.
fn points_back_at(location: &str, login_path: &str) -> bool {
    let path = location
        .split_once("://")
        .map(|(_, rest)| rest.find('/').map_or("/", |i| &rest[i..]))
        .unwrap_or(location);
    let path = path.split(['?', '#']).next().unwrap_or("");
    path.trim_end_matches('/') == login_path.trim_end_matches('/')
}

fn describe_signal(signal: &LoginSignal) -> String {
    match signal {
        LoginSignal::Redirect { location_prefix } if location_prefix.is_empty() => {
            "redirect".to_string()
        }
        LoginSignal::Redirect { location_prefix } => {
            format!("redirect to {location_prefix}")
        }
        LoginSignal::BodyMarker { marker } => format!("body marker {marker:?}"),
    }
}

fn snippet(body: &str) -> String {
    let trimmed = body.trim();
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
