// SPDX-License-Identifier: Apache-2.0

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde_json::json;
use warp::Filter;

use super::*;

struct StubDirector {
    addr: SocketAddr,
    /// Last API version header seen on /v1 requests.
    seen_version: Arc<parking_lot::Mutex<Option<String>>>,
    /// Heartbeat / lookup call counter.
    calls: Arc<AtomicUsize>,
}

impl StubDirector {
    fn url(&self) -> String {
        format!("http://{}", self.addr)
    }
}

/// Serve a director stub where lookup and heartbeat answer with the given
/// status sequences (last entry repeats).
fn spawn_director(lookup_statuses: Vec<u16>, heartbeat_statuses: Vec<u16>) -> StubDirector {
    let seen_version = Arc::new(parking_lot::Mutex::new(None::<String>));
    let calls = Arc::new(AtomicUsize::new(0));

    let root = warp::path::end().map(|| {
        warp::reply::json(&json!({
            "default_version": {"id": "v1", "version": "1.72"},
        }))
    });

    let lookup_calls = calls.clone();
    let lookup_seen = seen_version.clone();
    let lookup = warp::path!("v1" / "lookup")
        .and(warp::header::optional::<String>("x-openstack-ironic-api-version"))
        .map(move |version: Option<String>| {
            *lookup_seen.lock() = version;
            let n = lookup_calls.fetch_add(1, Ordering::SeqCst);
            let status = *lookup_statuses.get(n).unwrap_or(
                lookup_statuses.last().unwrap_or(&200),
            );
            let body = json!({
                "node": {"uuid": "deadbeef-dead-beef-dead-beef00000c10",
                         "properties": {}, "driver_info": {}},
                "config": {"heartbeat_timeout": 300,
                           "agent_token": "A".repeat(32),
                           "agent_token_required": true},
            });
            warp::reply::with_status(
                warp::reply::json(&body),
                warp::http::StatusCode::from_u16(status).unwrap_or(warp::http::StatusCode::OK),
            )
        });

    let hb_calls = calls.clone();
    let heartbeat = warp::path!("v1" / "heartbeat" / String)
        .and(warp::post())
        .and(warp::body::json())
        .map(move |_uuid: String, _body: serde_json::Value| {
            let n = hb_calls.fetch_add(1, Ordering::SeqCst);
            let status = *heartbeat_statuses.get(n).unwrap_or(
                heartbeat_statuses.last().unwrap_or(&202),
            );
            warp::reply::with_status(
                warp::reply::json(&json!({"faultstring": "stub says no"})),
                warp::http::StatusCode::from_u16(status)
                    .unwrap_or(warp::http::StatusCode::ACCEPTED),
            )
        });

    let (addr, server) =
        warp::serve(root.or(lookup).or(heartbeat)).bind_ephemeral(([127, 0, 0, 1], 0));
    tokio::spawn(server);
    StubDirector { addr, seen_version, calls }
}

fn client(url: &str) -> APIClient {
    APIClient::new(url, std::time::Duration::from_secs(5), "0.1.0").unwrap()
}

#[tokio::test]
async fn api_version_is_clamped_to_max_known() {
    let stub = spawn_director(vec![200], vec![202]);
    let client = client(&stub.url());
    assert_eq!(client.api_version().await, MAX_KNOWN_VERSION);
}

#[tokio::test]
async fn api_version_falls_back_to_min_when_unreachable() {
    let client = client("http://127.0.0.1:1");
    assert_eq!(client.api_version().await, MIN_API_VERSION);
}

#[tokio::test]
async fn lookup_returns_node_and_config() {
    let stub = spawn_director(vec![200], vec![202]);
    let client = client(&stub.url());
    let result = client
        .lookup_node(
            &["52:54:00:12:34:56".to_string()],
            None,
            std::time::Duration::from_secs(30),
            std::time::Duration::from_millis(10),
        )
        .await
        .unwrap();

    assert_eq!(result.node.uuid, "deadbeef-dead-beef-dead-beef00000c10");
    assert_eq!(result.config.heartbeat_timeout, Some(300));
    assert_eq!(result.config.agent_token.as_deref(), Some("A".repeat(32).as_str()));
    assert_eq!(result.config.agent_token_required, Some(true));
    // Every request carried the negotiated version header.
    assert_eq!(stub.seen_version.lock().as_deref(), Some("1.68"));
}

#[tokio::test]
async fn lookup_retries_errors_until_success() {
    let stub = spawn_director(vec![500, 500, 200], vec![202]);
    let client = client(&stub.url());
    let result = client
        .lookup_node(
            &["52:54:00:12:34:56".to_string()],
            Some("deadbeef-dead-beef-dead-beef00000c10"),
            std::time::Duration::from_secs(30),
            std::time::Duration::from_millis(5),
        )
        .await
        .unwrap();
    assert_eq!(result.node.uuid, "deadbeef-dead-beef-dead-beef00000c10");
    assert!(stub.calls.load(Ordering::SeqCst) >= 3);
}

#[tokio::test]
async fn lookup_times_out_with_lookup_node_error() {
    let client = client("http://127.0.0.1:1");
    let err = client
        .lookup_node(
            &["52:54:00:12:34:56".to_string()],
            None,
            std::time::Duration::from_millis(50),
            std::time::Duration::from_millis(5),
        )
        .await
        .err()
        .unwrap();
    assert!(matches!(err, RestError::LookupNode { .. }));
}

#[tokio::test]
async fn legacy_toplevel_heartbeat_timeout_is_accepted() {
    let content = json!({
        "node": {"uuid": "u1", "properties": {}, "driver_info": {}},
        "heartbeat_timeout": 120,
    });
    let result = parse_lookup_content(content).unwrap();
    assert_eq!(result.config.heartbeat_timeout, Some(120));
    assert!(result.config.agent_token.is_none());
}

#[tokio::test]
async fn lookup_reply_without_node_is_rejected() {
    assert!(parse_lookup_content(json!({"config": {}})).is_none());
    assert!(parse_lookup_content(json!({"node": {"no_uuid": true}})).is_none());
    assert!(parse_lookup_content(json!({"node": {"uuid": "u1"}})).is_none());
}

#[tokio::test]
async fn heartbeat_posts_and_accepts_202() {
    let stub = spawn_director(vec![200], vec![202]);
    let client = client(&stub.url());
    client
        .heartbeat("u1", "https://192.0.2.10:9999", Some("token"), None)
        .await
        .unwrap();
}

#[tokio::test]
async fn heartbeat_conflict_maps_to_conflict_error() {
    let stub = spawn_director(vec![200], vec![409]);
    let client = client(&stub.url());
    let err = client
        .heartbeat("u1", "https://192.0.2.10:9999", None, None)
        .await
        .err()
        .unwrap();
    match err {
        RestError::HeartbeatConflict { details } => {
            assert!(details.contains("Error 409"), "details: {details}");
            assert!(details.contains("stub says no"), "details: {details}");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn heartbeat_5xx_maps_to_heartbeat_error() {
    let stub = spawn_director(vec![200], vec![500]);
    let client = client(&stub.url());
    let err = client
        .heartbeat("u1", "https://192.0.2.10:9999", None, None)
        .await
        .err()
        .unwrap();
    assert!(matches!(err, RestError::Heartbeat { .. }));
}

#[tokio::test]
async fn heartbeat_connection_failure_maps_to_connection_error() {
    let client = client("http://127.0.0.1:1");
    let err = client
        .heartbeat("u1", "https://192.0.2.10:9999", None, None)
        .await
        .err()
        .unwrap();
    assert!(matches!(err, RestError::HeartbeatConnection { .. }));
}

#[test]
fn conflict_pause_escalates_and_caps() {
    let mut pause = ConflictPause::default();
    assert_eq!(pause.next().as_secs(), 5);
    assert_eq!(pause.next().as_secs(), 10);
    assert_eq!(pause.next().as_secs(), 30);
    assert_eq!(pause.next().as_secs(), 30);
}

#[test]
fn backoff_interval_is_bounded() {
    let starting = std::time::Duration::from_secs(1);
    for attempt in 1..12 {
        let wait = backoff_interval(starting, attempt);
        assert!(wait >= starting);
        assert!(wait <= std::time::Duration::from_secs(60));
    }
}
