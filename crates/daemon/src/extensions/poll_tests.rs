// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use serde_json::json;

use ira_core::test_support::{hardware_info, params};
use ira_core::CommandStatus;
use ira_hardware::{FakeHardwareManager, HardwareManager, HardwareSupport, MethodOutcome, Registry};

use super::*;
use crate::dispatch::CommandExecutor;

async fn harness(standalone: bool) -> (Arc<AgentState>, Arc<CommandExecutor>) {
    let manager = FakeHardwareManager::new("GenericHardwareManager", HardwareSupport::GENERIC)
        .with_method("list_hardware_info", MethodOutcome::done(hardware_info()));
    let registry = Arc::new(
        Registry::build(vec![Arc::new(manager) as Arc<dyn HardwareManager>]).await.unwrap(),
    );
    let state = Arc::new(AgentState::new(standalone));
    let executor = Arc::new(CommandExecutor::new(vec![Arc::new(PollExtension::new(
        Arc::clone(&state),
        registry,
    ))]));
    (state, executor)
}

#[tokio::test]
async fn get_hardware_info_returns_inventory() {
    let (_state, executor) = harness(false).await;
    let record = executor.execute("poll.get_hardware_info", params(&[])).await.unwrap();
    assert_eq!(record.status(), CommandStatus::Succeeded);
    let info = record.result().unwrap();
    assert_eq!(info["interfaces"][0]["mac_address"], "52:54:00:12:34:56");
    assert_eq!(info["memory"]["total"], 4_294_967_296u64);
}

#[tokio::test]
async fn set_node_info_rejected_outside_standalone_mode() {
    let (_state, executor) = harness(false).await;
    let err = executor
        .execute("poll.set_node_info", params(&[("node_info", json!({"node": {"uuid": "u1"}}))]))
        .await
        .err()
        .unwrap();
    assert!(matches!(err, RestError::InvalidCommand { .. }));
}

#[tokio::test]
async fn set_node_info_applies_lookup_shaped_payload() {
    let (state, executor) = harness(true).await;
    let record = executor
        .execute(
            "poll.set_node_info",
            params(&[(
                "node_info",
                json!({
                    "node": {"uuid": "u1", "properties": {}, "driver_info": {}},
                    "config": {"heartbeat_timeout": 60, "agent_token": "tok",
                               "agent_token_required": true},
                }),
            )]),
        )
        .await
        .unwrap();

    assert_eq!(record.status(), CommandStatus::Succeeded);
    assert_eq!(state.node_uuid().as_deref(), Some("u1"));
    assert_eq!(state.heartbeat_timeout(), 60);
    assert_eq!(state.token(), Some("tok"));
    assert!(state.token_required());
}

#[tokio::test]
async fn set_node_info_validates_shape() {
    let (_state, executor) = harness(true).await;
    let err = executor
        .execute("poll.set_node_info", params(&[("node_info", json!({"config": {}}))]))
        .await
        .err()
        .unwrap();
    assert!(matches!(err, RestError::InvalidCommandParams { .. }));
}

#[tokio::test]
async fn set_node_info_accepts_legacy_heartbeat_timeout() {
    let (state, executor) = harness(true).await;
    executor
        .execute(
            "poll.set_node_info",
            params(&[(
                "node_info",
                json!({"node": {"uuid": "u2"}, "heartbeat_timeout": 90}),
            )]),
        )
        .await
        .unwrap();
    assert_eq!(state.heartbeat_timeout(), 90);
}
