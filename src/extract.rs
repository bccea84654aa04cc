//! Pure HTML/header extraction functions.
//!
//! Every extractor is a side-effect-free `&str -> Option<_>` function so new
//! backend markup only requires adding a pattern here, not touching the
//! client. Patterns mirror what Laravel/Livewire dashboards actually emit.

use regex::Regex;
use std::sync::LazyLock;

static HIDDEN_INPUT_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"name=["']_token["'][^>]*value=["']([^"']+)["']"#).expect("valid pattern")
});

static HIDDEN_INPUT_TOKEN_REVERSED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"value=["']([^"']+)["'][^>]*name=["']_token["']"#).expect("valid pattern")
});

static META_CSRF_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<meta\s+name=["']csrf-token["']\s+content=["']([^"']+)["']"#)
        .expect("valid pattern")
});

static JS_CSRF_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""csrfToken"\s*:\s*"([^"]+)"|Livewire\.csrfToken\s*=\s*"([^"]+)""#)
        .expect("valid pattern")
});

static PROJECT_ENV_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"href=["'][^"']*/project/([A-Za-z0-9_-]+)/environment/([A-Za-z0-9_-]+)[^"']*["'][^>]*>([^<]*)"#,
    )
    .expect("valid pattern")
});

static WIRE_COMPONENT_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"wire:id=["']([^"']+)["']"#).expect("valid pattern"));

/// A project/environment pair discovered on a navigation page, with the
/// link text it was found under (used for named disambiguation).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavTarget {
    pub project_id: String,
    pub environment_id: String,
    pub label: Option<String>,
}

/// Extract an anti-forgery token, trying the markup shapes dashboards use
/// in priority order: hidden form input, meta tag, embedded JS assignment.
pub fn csrf_token(html: &str) -> Option<String> {
    hidden_input_token(html)
        .or_else(|| meta_csrf_token(html))
        .or_else(|| js_csrf_token(html))
}

/// Token from a hidden `<input name="_token" value="...">` (either attribute order).
pub fn hidden_input_token(html: &str) -> Option<String> {
    HIDDEN_INPUT_TOKEN
        .captures(html)
        .or_else(|| HIDDEN_INPUT_TOKEN_REVERSED.captures(html))
        .map(|c| c[1].to_string())
}

/// Token from a `<meta name="csrf-token" content="...">` tag.
pub fn meta_csrf_token(html: &str) -> Option<String> {
    META_CSRF_TOKEN.captures(html).map(|c| c[1].to_string())
}

/// Token assigned in inline JS (`"csrfToken": "..."` or `Livewire.csrfToken = "..."`).
pub fn js_csrf_token(html: &str) -> Option<String> {
    JS_CSRF_TOKEN.captures(html).and_then(|c| {
        c.get(1)
            .or_else(|| c.get(2))
            .map(|m| m.as_str().to_string())
    })
}

/// All distinct project/environment pairs linked from a page, in document
/// order. Duplicate pairs (a page often links the same environment several
/// times) collapse to the first occurrence.
pub fn project_environment_links(html: &str) -> Vec<NavTarget> {
    let mut targets: Vec<NavTarget> = Vec::new();
    for caps in PROJECT_ENV_LINK.captures_iter(html) {
        let project_id = caps[1].to_string();
        let environment_id = caps[2].to_string();
        if targets
            .iter()
            .any(|t| t.project_id == project_id && t.environment_id == environment_id)
        {
            continue;
        }
        let label = caps[3].trim();
        targets.push(NavTarget {
            project_id,
            environment_id,
            label: if label.is_empty() {
                None
            } else {
                Some(label.to_string())
            },
        });
    }
    targets
}

/// First Livewire component id (`wire:id="..."`) on a page.
pub fn component_id(html: &str) -> Option<String> {
    WIRE_COMPONENT_ID.captures(html).map(|c| c[1].to_string())
}

/// Last non-empty path segment of a redirect target, used as the operation
/// id when a backend answers a submission with `Location: .../deployments/<id>`.
pub fn redirect_operation_id(location: &str) -> Option<String> {
    let path = location
        .split_once("://")
        .map(|(_, rest)| rest.split_once('/').map(|(_, p)| p).unwrap_or(""))
        .unwrap_or(location);
    path.split(['?', '#'])
        .next()
        .unwrap_or("")
        .split('/')
        .rev()
        .find(|seg| !seg.is_empty())
        .map(|seg| seg.to_string())
}

/// Value of a named cookie in a `Set-Cookie` header line.
pub fn set_cookie_value(header: &str, name: &str) -> Option<String> {
    let (cookie_name, rest) = header.split_once('=')?;
    if cookie_name.trim() != name {
        return None;
    }
    let value = rest.split(';').next()?.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}
