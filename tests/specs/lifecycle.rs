// SPDX-License-Identifier: Apache-2.0

//! Liaison and shutdown scenarios.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use warp::Filter;

use ira_daemon::heartbeater::Heartbeater;
use ira_daemon::AGENT_VERSION;
use ira_ironic::APIClient;

use crate::specs::prelude::*;

/// A director whose lookup always answers with a token-bearing config and
/// which counts heartbeats.
fn spawn_director() -> (String, Arc<AtomicUsize>) {
    let beats = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&beats);

    let root = warp::path::end()
        .map(|| warp::reply::json(&json!({"default_version": {"version": "1.68"}})));
    let lookup = warp::path!("v1" / "lookup").map(|| {
        warp::reply::json(&json!({
            "node": {"uuid": "deadbeef-dead-beef-dead-beef00000c10",
                     "properties": {}, "driver_info": {}},
            "config": {"heartbeat_timeout": 300,
                       "agent_token": "A".repeat(32),
                       "agent_token_required": true},
        }))
    });
    let heartbeat = warp::path!("v1" / "heartbeat" / String)
        .and(warp::post())
        .and(warp::body::json())
        .map(move |_uuid: String, _body: Value| {
            counter.fetch_add(1, Ordering::SeqCst);
            warp::reply::with_status(
                warp::reply::json(&json!({})),
                warp::http::StatusCode::ACCEPTED,
            )
        });

    let (addr, server) =
        warp::serve(root.or(lookup).or(heartbeat)).bind_ephemeral(([127, 0, 0, 1], 0));
    tokio::spawn(server);
    (format!("http://{addr}"), beats)
}

#[tokio::test]
async fn lookup_with_token_arms_the_agent_and_heartbeats_start() {
    let (director_url, beats) = spawn_director();
    let client =
        Arc::new(APIClient::new(&director_url, Duration::from_secs(5), AGENT_VERSION).unwrap());

    let state = Arc::new(AgentState::new(false));
    let lookup = client
        .lookup_node(
            &["52:54:00:12:34:56".to_string()],
            None,
            Duration::from_secs(30),
            Duration::from_millis(10),
        )
        .await
        .unwrap();
    state.process_lookup_data(&lookup).unwrap();

    assert_eq!(state.node_uuid().as_deref(), Some("deadbeef-dead-beef-dead-beef00000c10"));
    assert_eq!(state.heartbeat_timeout(), 300);
    assert!(state.token_required());
    assert_eq!(state.token(), Some("A".repeat(32).as_str()));

    // With a 300s timeout the first beat is immediate and the next lands
    // 90..180s out, so exactly one arrives now.
    let heartbeater =
        Heartbeater::spawn(client, Arc::clone(&state), "http://192.0.2.10:9999".into());
    tokio::time::timeout(Duration::from_secs(5), async {
        while beats.load(Ordering::SeqCst) < 1 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("no heartbeat arrived");
    heartbeater.stop().await;
}

#[tokio::test]
async fn token_required_gates_command_posts() {
    let harness = Harness::start(vec![generic_manager()]).await;
    harness.state.set_token("sekrit".into());
    harness.state.require_token();

    let (status, _) = harness.post_command("fake.noop", json!({})).await;
    assert_eq!(status, 401);

    let (status, result) =
        harness.post_command("fake.noop", json!({"agent_token": "sekrit"})).await;
    assert_eq!(status, 200);
    assert_eq!(result["command_status"], "SUCCEEDED");
}

#[tokio::test]
async fn lockdown_is_terminal_and_drains_the_serve_loop() {
    let harness = Harness::start(vec![generic_manager()]).await;

    let (status, result) = harness.post_command("system.lockdown", json!({})).await;
    assert_eq!(status, 200);
    assert_eq!(result["command_status"], "SUCCEEDED");

    assert!(!harness.state.serving());
    assert!(harness.state.lockdown());
    // The HTTP loop exits before any further accept.
    harness.join().await;
}

#[tokio::test]
async fn status_and_banner_are_served() {
    let harness = Harness::start(vec![generic_manager()]).await;

    let (status, banner) = harness.get("/").await;
    assert_eq!(status, 200);
    assert_eq!(banner["name"], "OpenStack Ironic Python Agent API");

    let (_, agent_status) = harness.get("/v1/status").await;
    assert!(agent_status["started_at"].as_f64().unwrap() > 0.0);
    assert!(agent_status["version"].is_string());

    let (status, missing) = harness.get("/v1/commands/nope").await;
    assert_eq!(status, 404);
    assert_eq!(missing["type"], "RequestedObjectNotFoundError");
}
