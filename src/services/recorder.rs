//! Request recording middleware.
//!
//! DESIGN
//! ======
//! Every request passing through the router is timed, classified and turned
//! into a [`RequestSample`]. Classification looks at the request first (path,
//! query, headers) and only falls back to the response status to tell a
//! missing page from a served one. The session key is the signed-in user when
//! an upstream layer identified one, else a short hash of user agent and
//! client address.
//!
//! ERROR HANDLING
//! ==============
//! Recording never affects the response. The append runs on a blocking thread
//! after the response is built and failures are logged by
//! [`TraceStore::record_best_effort`](tracestore::TraceStore::record_best_effort).

use std::collections::HashMap;
use std::fmt::Write;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::extract::{ConnectInfo, Query, Request, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::middleware::Next;
use axum::response::Response;
use records::RequestType;
use sha2::{Digest, Sha256};
use tracestore::RequestSample;

use crate::state::AppState;

const ANONYMOUS_KEY_HEX: usize = 16;
const UNKNOWN_ADDRESS: &str = "-";

/// Decoded query string parameters.
pub type QueryParams = HashMap<String, String>;

/// Signed-in user attached to a request by an upstream auth layer, either as a
/// request extension or through the trusted identity header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub id: String,
    pub login: String,
}

impl AuthenticatedUser {
    /// Parse the `id:login` form carried by the identity header.
    #[must_use]
    pub fn from_header_value(value: &str) -> Option<Self> {
        let (id, login) = value.split_once(':')?;
        let (id, login) = (id.trim(), login.trim());
        if id.is_empty() || login.is_empty() {
            return None;
        }
        Some(Self { id: id.to_owned(), login: login.to_owned() })
    }

    #[must_use]
    pub fn session_key(&self) -> String {
        format!("user:#{}({})", self.id, self.login)
    }
}

/// Session key for a visitor nobody signed in: `~` plus a short digest of
/// user agent and address, so the raw address never reaches the log.
#[must_use]
pub fn anonymous_session_key(user_agent: &str, address: &str) -> String {
    let digest = Sha256::digest(format!("{user_agent}-{address}").as_bytes());
    let mut key = String::with_capacity(ANONYMOUS_KEY_HEX + 1);
    key.push('~');
    for b in &digest[..ANONYMOUS_KEY_HEX / 2] {
        let _ = write!(key, "{b:02x}");
    }
    key
}

/// Classify from the request alone. `None` means "page or 404", which only
/// the response status can settle.
#[must_use]
pub fn classify_request(path: &str, params: &QueryParams, headers: &HeaderMap) -> Option<RequestType> {
    if path_matches(path, "/cron") {
        return Some(RequestType::Cron);
    }
    if path.starts_with("/api/") || params.get("rest_route").is_some_and(|route| route.starts_with('/')) {
        return Some(RequestType::Rest);
    }
    if path_matches(path, "/xmlrpc") {
        return Some(RequestType::System);
    }
    if path_matches(path, "/login") || path_matches(path, "/signup") {
        return Some(RequestType::Login);
    }
    if is_ajax(headers) {
        return Some(RequestType::Ajax);
    }
    None
}

/// Final request type once the response status is known.
#[must_use]
pub fn resolve_type(from_request: Option<RequestType>, status: StatusCode) -> RequestType {
    match from_request {
        Some(kind) => kind,
        None if status == StatusCode::NOT_FOUND => RequestType::NotFound,
        None => RequestType::Page,
    }
}

/// Path text stored with the record: the request target, plus the `action`
/// parameter for AJAX calls.
#[must_use]
pub fn request_label(target: &str, params: &QueryParams, kind: RequestType) -> String {
    match (kind, params.get("action")) {
        (RequestType::Ajax, Some(action)) if !action.is_empty() => format!("{target} ({action})"),
        _ => target.to_owned(),
    }
}

#[must_use]
pub fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0.0, |d| d.as_secs_f64())
}

/// Axum middleware: time the inner service and append one record.
pub async fn record_request(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let start_time = unix_now();
    let uri = request.uri();
    let path = uri.path().to_owned();
    // A malformed query string classifies like an empty one.
    let params = Query::<QueryParams>::try_from_uri(uri).map_or_else(|_| QueryParams::new(), |Query(p)| p);
    let target = uri
        .path_and_query()
        .map_or_else(|| path.clone(), |pq| pq.as_str().to_owned());
    let from_request = classify_request(&path, &params, request.headers());
    let session = session_for(&request, &state.user_header);

    let response = next.run(request).await;

    let status = response.status();
    let request_type = resolve_type(from_request, status);
    let sample = RequestSample {
        session,
        start_time,
        end_time: unix_now(),
        request_type,
        path: request_label(&target, &params, request_type),
        had_fatal_error: status.is_server_error(),
    };

    let trace = Arc::clone(&state.trace);
    let usage = Arc::clone(&state.usage);
    tokio::task::spawn_blocking(move || trace.store().record_best_effort(sample, usage.as_ref()));

    response
}

fn session_for(request: &Request, user_header: &str) -> String {
    if let Some(user) = request.extensions().get::<AuthenticatedUser>() {
        return user.session_key();
    }
    let headers = request.headers();
    if let Some(user) = header_str(headers, user_header).and_then(AuthenticatedUser::from_header_value) {
        return user.session_key();
    }

    let user_agent = header_str(headers, header::USER_AGENT.as_str()).unwrap_or_default();
    let address = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .or_else(|| forwarded_for(headers))
        .unwrap_or_else(|| UNKNOWN_ADDRESS.to_owned());
    anonymous_session_key(user_agent, &address)
}

fn forwarded_for(headers: &HeaderMap) -> Option<String> {
    header_str(headers, "x-forwarded-for")?
        .split(',')
        .map(str::trim)
        .find(|addr| !addr.is_empty())
        .map(str::to_owned)
}

fn is_ajax(headers: &HeaderMap) -> bool {
    if header_str(headers, "x-requested-with").is_some_and(|v| v.eq_ignore_ascii_case("xmlhttprequest")) {
        return true;
    }
    [header::ACCEPT, header::CONTENT_TYPE]
        .iter()
        .filter_map(|name| header_str(headers, name.as_str()))
        .any(|v| v.contains("application/json"))
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

// `/cron` and `/cron/...` match; `/cronjob` does not.
fn path_matches(path: &str, prefix: &str) -> bool {
    path.strip_prefix(prefix)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/') || rest.starts_with('.'))
}

#[cfg(test)]
#[path = "recorder_test.rs"]
mod tests;
