use super::*;
use crate::state::test_helpers;
use axum::body::Body;
use axum::http::HeaderValue;
use records::EventRecord;
use std::time::Duration;

fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
    let mut map = HeaderMap::new();
    for (name, value) in pairs {
        map.insert(*name, HeaderValue::from_static(*value));
    }
    map
}

// Decode a raw query string the way the middleware does.
fn params(query: Option<&str>) -> QueryParams {
    let uri: axum::http::Uri = match query {
        Some(q) => format!("/?{q}").parse().unwrap(),
        None => "/".parse().unwrap(),
    };
    Query::<QueryParams>::try_from_uri(&uri).unwrap().0
}

fn classify(path: &str, query: Option<&str>, pairs: &[(&'static str, &'static str)]) -> RequestType {
    resolve_type(classify_request(path, &params(query), &headers(pairs)), StatusCode::OK)
}

// =============================================================================
// classification
// =============================================================================

#[test]
fn classify_by_path() {
    assert_eq!(classify("/cron", None, &[]), RequestType::Cron);
    assert_eq!(classify("/cron/daily", None, &[]), RequestType::Cron);
    assert_eq!(classify("/api/orders", None, &[]), RequestType::Rest);
    assert_eq!(classify("/xmlrpc.php", None, &[]), RequestType::System);
    assert_eq!(classify("/login", None, &[]), RequestType::Login);
    assert_eq!(classify("/signup/confirm", None, &[]), RequestType::Login);
    assert_eq!(classify("/blog/hello", None, &[]), RequestType::Page);
}

#[test]
fn classify_requires_whole_path_segment() {
    assert_eq!(classify("/cronjob", None, &[]), RequestType::Page);
    assert_eq!(classify("/loginhelp", None, &[]), RequestType::Page);
}

#[test]
fn classify_rest_route_query() {
    assert_eq!(classify("/", Some("rest_route=/wp/v2/posts"), &[]), RequestType::Rest);
    assert_eq!(classify("/", Some("p=1&rest_route=%2Fwp%2Fv2"), &[]), RequestType::Rest);
    assert_eq!(classify("/", Some("rest_route=%2fwp"), &[]), RequestType::Rest);
    assert_eq!(classify("/", Some("rest_route=posts"), &[]), RequestType::Page);
    assert_eq!(classify("/", Some("rest_route=%252Fwp"), &[]), RequestType::Page);
}

#[test]
fn classify_ajax_headers() {
    assert_eq!(classify("/save", None, &[("x-requested-with", "XMLHttpRequest")]), RequestType::Ajax);
    assert_eq!(classify("/save", None, &[("accept", "application/json")]), RequestType::Ajax);
    assert_eq!(
        classify("/save", None, &[("content-type", "application/json; charset=utf-8")]),
        RequestType::Ajax
    );
    assert_eq!(classify("/save", None, &[("accept", "text/html")]), RequestType::Page);
}

#[test]
fn classify_path_rules_win_over_ajax() {
    let json = [("accept", "application/json")];
    assert_eq!(classify("/cron", None, &json), RequestType::Cron);
    assert_eq!(classify("/api/x", None, &json), RequestType::Rest);
    assert_eq!(classify("/login", None, &json), RequestType::Login);
}

#[test]
fn resolve_type_uses_status_only_for_pages() {
    assert_eq!(resolve_type(None, StatusCode::NOT_FOUND), RequestType::NotFound);
    assert_eq!(resolve_type(None, StatusCode::INTERNAL_SERVER_ERROR), RequestType::Page);
    assert_eq!(resolve_type(Some(RequestType::Rest), StatusCode::NOT_FOUND), RequestType::Rest);
}

#[test]
fn request_label_appends_ajax_action() {
    let target = "/admin-ajax?action=heartbeat";
    assert_eq!(
        request_label(target, &params(Some("action=heartbeat")), RequestType::Ajax),
        "/admin-ajax?action=heartbeat (heartbeat)"
    );
    assert_eq!(request_label(target, &params(Some("action=heartbeat")), RequestType::Page), target);
    assert_eq!(request_label("/x", &params(Some("action=")), RequestType::Ajax), "/x");
    assert_eq!(request_label("/x", &params(None), RequestType::Ajax), "/x");
}

#[test]
fn request_label_decodes_action() {
    let target = "/ajax?action=save%20post";
    assert_eq!(
        request_label(target, &params(Some("action=save%20post")), RequestType::Ajax),
        "/ajax?action=save%20post (save post)"
    );
    assert_eq!(
        request_label("/ajax?action=save+post", &params(Some("action=save+post")), RequestType::Ajax),
        "/ajax?action=save+post (save post)"
    );
    assert_eq!(
        request_label("/ajax?action=a%2Fb", &params(Some("action=a%2Fb")), RequestType::Ajax),
        "/ajax?action=a%2Fb (a/b)"
    );
}

// =============================================================================
// session keys
// =============================================================================

#[test]
fn authenticated_user_parses_header_value() {
    let user = AuthenticatedUser::from_header_value(" 12 : alice ").unwrap();
    assert_eq!(user, AuthenticatedUser { id: "12".into(), login: "alice".into() });
    assert_eq!(user.session_key(), "user:#12(alice)");
    assert!(AuthenticatedUser::from_header_value("alice").is_none());
    assert!(AuthenticatedUser::from_header_value(":alice").is_none());
    assert!(AuthenticatedUser::from_header_value("12:").is_none());
}

#[test]
fn anonymous_key_is_short_stable_hex() {
    let key = anonymous_session_key("Mozilla/5.0", "203.0.113.9");
    assert_eq!(key.len(), 17);
    assert!(key.starts_with('~'));
    assert!(key[1..].chars().all(|c| c.is_ascii_hexdigit()));
    assert_eq!(key, anonymous_session_key("Mozilla/5.0", "203.0.113.9"));
    assert_ne!(key, anonymous_session_key("Mozilla/5.0", "203.0.113.10"));
}

#[test]
fn session_prefers_extension_over_header() {
    let request = Request::builder()
        .uri("/")
        .header("x-authenticated-user", "2:bob")
        .extension(AuthenticatedUser { id: "1".into(), login: "ann".into() })
        .body(Body::empty())
        .unwrap();
    assert_eq!(session_for(&request, "x-authenticated-user"), "user:#1(ann)");
}

#[test]
fn session_uses_identity_header() {
    let request = Request::builder()
        .uri("/")
        .header("x-remote-user", "2:bob")
        .body(Body::empty())
        .unwrap();
    assert_eq!(session_for(&request, "x-remote-user"), "user:#2(bob)");
    assert!(session_for(&request, "x-authenticated-user").starts_with('~'));
}

#[test]
fn session_falls_back_to_forwarded_address() {
    let request = Request::builder()
        .uri("/")
        .header("user-agent", "curl/8")
        .header("x-forwarded-for", " 198.51.100.4, 10.0.0.1")
        .body(Body::empty())
        .unwrap();
    assert_eq!(
        session_for(&request, "x-authenticated-user"),
        anonymous_session_key("curl/8", "198.51.100.4")
    );
}

// =============================================================================
// middleware
// =============================================================================

async fn spawn_server(state: AppState) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = crate::routes::app(state);
    tokio::spawn(async move {
        axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
            .await
            .unwrap();
    });
    addr
}

async fn wait_for_records(state: &AppState, count: usize) -> Vec<EventRecord> {
    for _ in 0..100 {
        let result = state.trace.query_window(0.0, f64::MAX).unwrap();
        if result.records.len() >= count {
            return result.records;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("expected {count} recorded requests");
}

fn find<'a>(records: &'a [EventRecord], path: &str) -> &'a EventRecord {
    records
        .iter()
        .find(|r| r.path == path)
        .unwrap_or_else(|| panic!("no record for {path}"))
}

#[tokio::test]
async fn middleware_records_each_request() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_helpers::test_app_state(dir.path());
    let addr = spawn_server(state.clone()).await;
    let client = reqwest::Client::new();

    let health = client
        .get(format!("http://{addr}/healthz"))
        .header("x-authenticated-user", "7:ada")
        .send()
        .await
        .unwrap();
    assert_eq!(health.status(), reqwest::StatusCode::OK);

    let missing = client
        .get(format!("http://{addr}/missing"))
        .header("user-agent", "probe/1.0")
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), reqwest::StatusCode::NOT_FOUND);

    client
        .get(format!("http://{addr}/widgets?action=save+draft"))
        .header("x-requested-with", "XMLHttpRequest")
        .send()
        .await
        .unwrap();

    let records = wait_for_records(&state, 3).await;

    let health = find(&records, "/healthz");
    assert_eq!(health.session, "user:#7(ada)");
    assert_eq!(health.request_type, RequestType::Page);
    assert!(!health.had_fatal_error);
    assert!(health.end_time >= health.start_time);

    let missing = find(&records, "/missing");
    assert_eq!(missing.request_type, RequestType::NotFound);
    assert_eq!(missing.session, anonymous_session_key("probe/1.0", "127.0.0.1"));

    let ajax = find(&records, "/widgets?action=save+draft (save draft)");
    assert_eq!(ajax.request_type, RequestType::Ajax);
}

#[tokio::test]
async fn middleware_records_dashboard_reads_as_rest() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_helpers::test_app_state(dir.path());
    let addr = spawn_server(state.clone()).await;

    let response = reqwest::get(format!("http://{addr}/api/trace/raw?from=0&to=1")).await.unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["truncated"], serde_json::Value::Bool(false));

    let records = wait_for_records(&state, 1).await;
    let read = find(&records, "/api/trace/raw?from=0&to=1");
    assert_eq!(read.request_type, RequestType::Rest);
}
