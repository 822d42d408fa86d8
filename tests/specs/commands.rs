// SPDX-License-Identifier: Apache-2.0

//! Command execution scenarios over the real HTTP surface.

use crate::specs::prelude::*;

#[tokio::test]
async fn busy_agent_rejects_while_async_command_runs() {
    let harness = Harness::start(vec![generic_manager()]).await;

    let (status, running) =
        harness.post_command("fake.sleep", json!({"seconds": 5})).await;
    assert_eq!(status, 200);
    assert_eq!(running["command_status"], "RUNNING");
    assert_eq!(running["command_error"], Value::Null);
    assert_eq!(running["command_result"], Value::Null);

    let (status, error) = harness.post_command("fake.noop", json!({})).await;
    assert_eq!(status, 409);
    assert_eq!(error["type"], "AgentIsBusy");

    // The rejected command never entered the ledger.
    let (_, listed) = harness.get("/v1/commands").await;
    assert_eq!(listed["commands"].as_array().unwrap().len(), 1);
    assert_eq!(listed["commands"][0]["id"], running["id"]);
}

#[tokio::test]
async fn dispatch_falls_through_to_the_generic_manager() {
    // The specific manager wins dispatch order but cannot erase here.
    let specific =
        FakeHardwareManager::new("SpecificHardwareManager", HardwareSupport::MAINLINE)
            .with_version("2.0")
            .with_steps(StepPhase::Clean, vec![])
            .with_method("erase_devices", MethodOutcome::Unsupported);
    let harness = Harness::start(vec![specific, generic_manager()]).await;

    let node = json!({"uuid": "dead-beef", "properties": {}, "driver_info": {}});
    let (_, catalog) = harness
        .post_command("clean.get_clean_steps", json!({"node": node, "ports": []}))
        .await;
    let version = catalog["command_result"]["hardware_manager_version"].clone();

    let (status, accepted) = harness
        .post_command(
            "clean.execute_clean_step",
            json!({
                "step": {"step": "erase_devices", "priority": 10, "interface": "deploy",
                         "reboot_requested": false, "abortable": true},
                "node": node,
                "ports": [],
                "clean_version": version,
            }),
        )
        .await;
    assert_eq!(status, 200);

    let id = accepted["id"].as_str().unwrap();
    let (_, done) = harness.get(&format!("/v1/commands/{id}?wait=true")).await;
    assert_eq!(done["command_status"], "SUCCEEDED");
    assert_eq!(done["command_result"]["clean_result"], json!(["generic wipe", ""]));
}

#[tokio::test]
async fn step_catalog_deduplicates_across_managers() {
    // Support levels 3 / 4 / 4 proposing erase_devices at priorities
    // 10 / 40 / 50: the disk manager's step must win.
    let step = |priority| Step::new("erase_devices", priority, StepInterface::Deploy);
    let specific = FakeHardwareManager::new("SpecificHardwareManager", HardwareSupport(3))
        .with_steps(StepPhase::Clean, vec![step(10)]);
    let firmware = FakeHardwareManager::new("FirmwareHardwareManager", HardwareSupport(4))
        .with_steps(StepPhase::Clean, vec![step(40)]);
    let disk = FakeHardwareManager::new("DiskHardwareManager", HardwareSupport(4))
        .with_steps(StepPhase::Clean, vec![step(50)]);
    let harness = Harness::start(vec![specific, firmware, disk]).await;

    let node = json!({"uuid": "dead-beef"});
    let (_, catalog) = harness
        .post_command("clean.get_clean_steps", json!({"node": node, "ports": []}))
        .await;

    let steps = catalog["command_result"]["clean_steps"].as_object().unwrap();
    assert_eq!(steps.len(), 1);
    assert_eq!(steps["DiskHardwareManager"][0]["step"], "erase_devices");
    assert_eq!(steps["DiskHardwareManager"][0]["priority"], 50);
}

#[tokio::test]
async fn stale_fingerprint_fails_the_step_with_version_mismatch() {
    let harness = Harness::start(vec![generic_manager()]).await;

    let node = json!({"uuid": "dead-beef"});
    let (_, accepted) = harness
        .post_command(
            "clean.execute_clean_step",
            json!({
                "step": {"step": "erase_devices", "priority": 10, "interface": "deploy",
                         "reboot_requested": false, "abortable": true},
                "node": node,
                "ports": [],
                "clean_version": {"GenericHardwareManager": "0.9"},
            }),
        )
        .await;

    let id = accepted["id"].as_str().unwrap();
    let (_, done) = harness.get(&format!("/v1/commands/{id}?wait=true")).await;
    assert_eq!(done["command_status"], "FAILED");
    assert_eq!(done["command_error"]["type"], "VersionMismatch");
    assert_eq!(done["command_result"], Value::Null);
}

#[tokio::test]
async fn command_results_survive_and_list_in_acceptance_order() {
    let harness = Harness::start(vec![generic_manager()]).await;

    harness.post_command("fake.noop", json!({})).await;
    harness.post_command("fake.echo", json!({"k": "v"})).await;
    let (status, _) = harness.post_command("fake.unknown", json!({})).await;
    assert_eq!(status, 400);

    let (_, listed) = harness.get("/v1/commands").await;
    let names: Vec<&str> = listed["commands"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["command_name"].as_str().unwrap())
        .collect();
    assert_eq!(names, ["fake.noop", "fake.echo"]);
}
