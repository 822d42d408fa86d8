// SPDX-License-Identifier: Apache-2.0

use super::*;

#[yare::parameterized(
    invalid_content = { RestError::InvalidContent { details: "x".into() }, "InvalidContentError", 400 },
    invalid_command = { RestError::invalid_command("x"), "InvalidCommandError", 400 },
    invalid_params = { RestError::invalid_params("x"), "InvalidCommandParamsError", 400 },
    not_found = { RestError::not_found("Command Result", "abc"), "RequestedObjectNotFoundError", 404 },
    execution = { RestError::command_execution("boom"), "CommandExecutionError", 500 },
    heartbeat = { RestError::Heartbeat { details: "x".into() }, "HeartbeatError", 500 },
    heartbeat_conflict = { RestError::HeartbeatConflict { details: "x".into() }, "HeartbeatConflictError", 409 },
    lookup = { RestError::LookupNode { details: "x".into() }, "LookupNodeError", 500 },
    lookup_ip = { RestError::LookupAgentIp { details: "x".into() }, "LookupAgentIPError", 500 },
    busy = { RestError::AgentIsBusy { command_name: "fake.sleep".into() }, "AgentIsBusy", 409 },
    version_mismatch = {
        RestError::VersionMismatch {
            agent_version: Default::default(),
            node_version: Default::default(),
        },
        "VersionMismatch",
        409
    },
    method_not_found = {
        RestError::HardwareManagerMethodNotFound { method: "erase_devices".into() },
        "HardwareManagerMethodNotFound",
        500
    },
    incompatible = { RestError::incompatible("no ATA"), "IncompatibleHardwareMethodError", 500 },
    device_not_found = { RestError::DeviceNotFound { details: "x".into() }, "DeviceNotFound", 404 },
)]
fn wire_names_and_codes(err: RestError, type_name: &str, code: u16) {
    assert_eq!(err.type_name(), type_name);
    assert_eq!(err.code(), code);
}

#[test]
fn serializes_to_four_field_object() {
    let err = RestError::not_found("Extension", "standby");
    let value = err.serialize();
    let obj = value.as_object().unwrap();
    assert_eq!(obj.len(), 4);
    assert_eq!(obj["type"], "RequestedObjectNotFoundError");
    assert_eq!(obj["code"], 404);
    assert_eq!(obj["message"], "Not found");
    assert_eq!(obj["details"], "Extension with id standby not found.");
}

#[test]
fn serde_serialize_matches_wire_object() {
    let err = RestError::invalid_command("no such method");
    let via_serde = serde_json::to_value(&err).unwrap();
    assert_eq!(via_serde, err.serialize());
}

#[test]
fn invalid_content_family() {
    assert!(RestError::InvalidContent { details: String::new() }.is_invalid_content());
    assert!(RestError::invalid_command("x").is_invalid_content());
    assert!(RestError::invalid_params("x").is_invalid_content());
    assert!(RestError::InvalidImage { details: String::new() }.is_invalid_content());
    assert!(!RestError::command_execution("x").is_invalid_content());
    assert!(!RestError::not_found("a", "b").is_invalid_content());
}

#[test]
fn details_compose_structured_fields() {
    let err = RestError::ImageWrite {
        device: "/dev/sda".into(),
        exit_code: 1,
        stdout: "out".into(),
        stderr: "err".into(),
    };
    assert_eq!(
        err.details(),
        "Writing image to device /dev/sda failed with exit code 1. stdout: out. stderr: err"
    );
}
