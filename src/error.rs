use thiserror::Error;

/// Network-level failures common to every stage (DNS, TLS, connect, body IO).
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected status {status} from {url}")]
    Status { status: u16, url: String },
}

/// Failures establishing or refreshing an authenticated session.
#[derive(Error, Debug)]
pub enum AuthError {
    /// The token page yielded no anti-forgery token. Non-fatal at login
    /// (the backend may still accept the request); fatal for a refresh,
    /// whose whole point is to obtain one.
    #[error("no CSRF token found on the token page")]
    TokenMissing,

    #[error("credentials rejected ({status}): {detail}")]
    Rejected { status: u16, detail: String },

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Failures discovering the identifiers a target operation needs.
#[derive(Error, Debug)]
pub enum LocateError {
    #[error("no discovery page was reachable: {0}")]
    Unreachable(String),

    /// More than one equally-plausible candidate and no hint to pick one.
    #[error("{field} is ambiguous: {} candidates ({})", .candidates.len(), .candidates.join(", "))]
    Ambiguous {
        field: &'static str,
        candidates: Vec<String>,
    },

    /// No strategy produced the required identifiers. Surfaced verbatim;
    /// never silently replaced with a guessed identifier.
    #[error("no discovery strategy produced the required identifiers")]
    NotFound,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Home directory not found")]
    HomeDirNotFound,

    #[error("base_url must be configured (e.g. https://panel.example.com)")]
    MissingBaseUrl,

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A pipeline failure, tagged with the stage that produced it.
#[derive(Error, Debug)]
pub enum RunError {
    #[error("authentication failed: {0}")]
    Auth(#[from] AuthError),

    #[error("resource discovery failed: {0}")]
    Locate(#[from] LocateError),

    #[error("submission failed: {0}")]
    Submit(#[from] crate::submit::SubmissionError),
}

impl RunError {
    /// Name of the pipeline stage that failed, for user-facing reports.
    pub fn stage(&self) -> &'static str {
        match self {
            RunError::Auth(_) => "authenticate",
            RunError::Locate(_) => "locate",
            RunError::Submit(_) => "submit",
        }
    }
}
