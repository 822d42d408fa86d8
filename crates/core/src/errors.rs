// SPDX-License-Identifier: Apache-2.0

//! Error taxonomy shared with the director.
//!
//! Every kind carries a stable wire name, an HTTP status code, a fixed
//! message and a variable details string, and serialises to the four-field
//! object `{type, code, message, details}`. The names and codes are part of
//! the director contract and must not change.

use std::collections::BTreeMap;

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

/// Closed set of wire-visible error kinds.
///
/// Only `IncompatibleHardwareMethod` is ever recovered internally (hardware
/// dispatch falls through to the next manager); every other kind propagates
/// to the HTTP boundary or is recorded on a command result.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RestError {
    #[error("Invalid request body: {details}")]
    InvalidContent { details: String },

    #[error("Invalid command: {details}")]
    InvalidCommand { details: String },

    #[error("Invalid command parameters: {details}")]
    InvalidCommandParams { details: String },

    #[error("Not found: {type_descr} with id {id} not found.")]
    RequestedObjectNotFound { type_descr: String, id: String },

    #[error("Command execution failed: {details}")]
    CommandExecution { details: String },

    #[error("Error in call to ironic-api: {details}")]
    IronicApi { details: String },

    #[error("Error heartbeating to agent API: {details}")]
    Heartbeat { details: String },

    #[error("Conflict error heartbeating to agent API: {details}")]
    HeartbeatConflict { details: String },

    #[error("Transitory network failure or blocked port during heartbeat: {details}")]
    HeartbeatConnection { details: String },

    #[error("Error getting configuration from Ironic: {details}")]
    LookupNode { details: String },

    #[error("Error finding IP for Ironic Agent: {details}")]
    LookupAgentIp { details: String },

    #[error("Error downloading image: download of image {image_id} failed: {msg}")]
    ImageDownload { image_id: String, msg: String },

    #[error("Error verifying image checksum: image {image_id} failed to verify against checksum.")]
    ImageChecksum { image_id: String },

    #[error("Error writing image to device {device}: exit code {exit_code}. stdout: {stdout}. stderr: {stderr}")]
    ImageWrite { device: String, exit_code: i32, stdout: String, stderr: String },

    #[error("The requested image is not valid for use: {details}")]
    InvalidImage { details: String },

    #[error("Block device caused unknown error: {details}")]
    BlockDevice { details: String },

    #[error("Error erasing block device: {details}")]
    BlockDeviceErase { details: String },

    #[error("Configdrive at {filename} has size {filesize}, which is larger than the intended partition.")]
    ConfigDriveTooLarge { filename: String, filesize: u64 },

    #[error("Error writing configdrive to device {device}: {details}")]
    ConfigDriveWrite { device: String, details: String },

    #[error("Reboot script failed with exit code {exit_code}. stdout: {stdout}. stderr: {stderr}")]
    SystemReboot { exit_code: i32, stdout: String, stderr: String },

    #[error("Agent is not associated with an Ironic node: {details}")]
    UnknownNode { details: String },

    #[error("No valid HardwareManager found: {details}")]
    HardwareManagerNotFound { details: String },

    #[error("No HardwareManager found to handle method: \"{method}\".")]
    HardwareManagerMethodNotFound { method: String },

    #[error("HardwareManager method is not compatible with hardware: {details}")]
    IncompatibleHardwareMethod { details: String },

    #[error("Clean step failed: {details}")]
    Cleaning { details: String },

    #[error("Deploy step failed: {details}")]
    Deployment { details: String },

    #[error("Service step failed: {details}")]
    Servicing { details: String },

    #[error("Hardware managers version mismatch, reload agent with correct version.")]
    VersionMismatch {
        agent_version: BTreeMap<String, String>,
        node_version: BTreeMap<String, String>,
    },

    #[error("Agent is busy: executing command {command_name}")]
    AgentIsBusy { command_name: String },

    #[error("Failed to inspect hardware: {details}")]
    Inspection { details: String },

    #[error("Error finding the device to deploy onto: {details}")]
    DeviceNotFound { details: String },
}

impl RestError {
    /// Stable wire name, matching the director's expectations.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::InvalidContent { .. } => "InvalidContentError",
            Self::InvalidCommand { .. } => "InvalidCommandError",
            Self::InvalidCommandParams { .. } => "InvalidCommandParamsError",
            Self::RequestedObjectNotFound { .. } => "RequestedObjectNotFoundError",
            Self::CommandExecution { .. } => "CommandExecutionError",
            Self::IronicApi { .. } => "IronicAPIError",
            Self::Heartbeat { .. } => "HeartbeatError",
            Self::HeartbeatConflict { .. } => "HeartbeatConflictError",
            Self::HeartbeatConnection { .. } => "HeartbeatConnectionError",
            Self::LookupNode { .. } => "LookupNodeError",
            Self::LookupAgentIp { .. } => "LookupAgentIPError",
            Self::ImageDownload { .. } => "ImageDownloadError",
            Self::ImageChecksum { .. } => "ImageChecksumError",
            Self::ImageWrite { .. } => "ImageWriteError",
            Self::InvalidImage { .. } => "InvalidImage",
            Self::BlockDevice { .. } => "BlockDeviceError",
            Self::BlockDeviceErase { .. } => "BlockDeviceEraseError",
            Self::ConfigDriveTooLarge { .. } => "ConfigDriveTooLargeError",
            Self::ConfigDriveWrite { .. } => "ConfigDriveWriteError",
            Self::SystemReboot { .. } => "SystemRebootError",
            Self::UnknownNode { .. } => "UnknownNodeError",
            Self::HardwareManagerNotFound { .. } => "HardwareManagerNotFound",
            Self::HardwareManagerMethodNotFound { .. } => "HardwareManagerMethodNotFound",
            Self::IncompatibleHardwareMethod { .. } => "IncompatibleHardwareMethodError",
            Self::Cleaning { .. } => "CleaningError",
            Self::Deployment { .. } => "DeploymentError",
            Self::Servicing { .. } => "ServicingError",
            Self::VersionMismatch { .. } => "VersionMismatch",
            Self::AgentIsBusy { .. } => "AgentIsBusy",
            Self::Inspection { .. } => "InspectionError",
            Self::DeviceNotFound { .. } => "DeviceNotFound",
        }
    }

    /// HTTP status code rendered at the API boundary.
    pub fn code(&self) -> u16 {
        match self {
            Self::InvalidContent { .. }
            | Self::InvalidCommand { .. }
            | Self::InvalidCommandParams { .. }
            | Self::InvalidImage { .. } => 400,
            Self::RequestedObjectNotFound { .. } | Self::DeviceNotFound { .. } => 404,
            Self::HeartbeatConflict { .. }
            | Self::VersionMismatch { .. }
            | Self::AgentIsBusy { .. } => 409,
            _ => 500,
        }
    }

    /// Fixed, kind-specific message.
    pub fn message(&self) -> &'static str {
        match self {
            Self::InvalidContent { .. } => "Invalid request body",
            Self::InvalidCommand { .. } => "Invalid command",
            Self::InvalidCommandParams { .. } => "Invalid command parameters",
            Self::RequestedObjectNotFound { .. } => "Not found",
            Self::CommandExecution { .. } => "Command execution failed",
            Self::IronicApi { .. } => "Error in call to ironic-api.",
            Self::Heartbeat { .. } => "Error heartbeating to agent API.",
            Self::HeartbeatConflict { .. } => {
                "Conflict error occurred when sending heartbeat to agent API."
            }
            Self::HeartbeatConnection { .. } => {
                "Error attempting to heartbeat - possible transitory network failure \
                 or blocking port may be present."
            }
            Self::LookupNode { .. } => "Error getting configuration from Ironic.",
            Self::LookupAgentIp { .. } => "Error finding IP for Ironic Agent.",
            Self::ImageDownload { .. } => "Error downloading image.",
            Self::ImageChecksum { .. } => "Error verifying image checksum.",
            Self::ImageWrite { .. } => "Error writing image to device.",
            Self::InvalidImage { .. } => "The requested image is not valid for use.",
            Self::BlockDevice { .. } => "Block device caused unknown error.",
            Self::BlockDeviceErase { .. } => "Error erasing block device.",
            Self::ConfigDriveTooLarge { .. } => "Configdrive is too large for intended partition.",
            Self::ConfigDriveWrite { .. } => "Error writing configdrive to device.",
            Self::SystemReboot { .. } => "Error rebooting system.",
            Self::UnknownNode { .. } => "Agent is not associated with an Ironic node.",
            Self::HardwareManagerNotFound { .. } => "No valid HardwareManager found.",
            Self::HardwareManagerMethodNotFound { .. } => {
                "No HardwareManager found to handle method."
            }
            Self::IncompatibleHardwareMethod { .. } => {
                "HardwareManager method is not compatible with hardware."
            }
            Self::Cleaning { .. } => "Clean step failed.",
            Self::Deployment { .. } => "Deploy step failed.",
            Self::Servicing { .. } => "Service step failed.",
            Self::VersionMismatch { .. } => {
                "Hardware managers version mismatch, reload agent with correct version."
            }
            Self::AgentIsBusy { .. } => "Agent is busy.",
            Self::Inspection { .. } => "Failed to inspect hardware.",
            Self::DeviceNotFound { .. } => {
                "Error finding the disk or partition device to deploy the image onto."
            }
        }
    }

    /// Variable per-instance details.
    pub fn details(&self) -> String {
        match self {
            Self::InvalidContent { details }
            | Self::InvalidCommand { details }
            | Self::InvalidCommandParams { details }
            | Self::CommandExecution { details }
            | Self::IronicApi { details }
            | Self::Heartbeat { details }
            | Self::HeartbeatConflict { details }
            | Self::HeartbeatConnection { details }
            | Self::LookupNode { details }
            | Self::LookupAgentIp { details }
            | Self::InvalidImage { details }
            | Self::BlockDevice { details }
            | Self::BlockDeviceErase { details }
            | Self::UnknownNode { details }
            | Self::HardwareManagerNotFound { details }
            | Self::IncompatibleHardwareMethod { details }
            | Self::Cleaning { details }
            | Self::Deployment { details }
            | Self::Servicing { details }
            | Self::Inspection { details }
            | Self::DeviceNotFound { details } => details.clone(),
            Self::RequestedObjectNotFound { type_descr, id } => {
                format!("{} with id {} not found.", type_descr, id)
            }
            Self::ImageDownload { image_id, msg } => {
                format!("Download of image id {} failed: {}", image_id, msg)
            }
            Self::ImageChecksum { image_id } => {
                format!("Image with id {} failed to verify against checksum.", image_id)
            }
            Self::ImageWrite { device, exit_code, stdout, stderr } => format!(
                "Writing image to device {} failed with exit code {}. stdout: {}. stderr: {}",
                device, exit_code, stdout, stderr
            ),
            Self::ConfigDriveTooLarge { filename, filesize } => format!(
                "Configdrive at {} has size {}, which is larger than the intended partition.",
                filename, filesize
            ),
            Self::ConfigDriveWrite { device, details } => format!(
                "Writing configdrive to device {} failed: {}",
                device, details
            ),
            Self::SystemReboot { exit_code, stdout, stderr } => format!(
                "Reboot script failed with exit code {}. stdout: {}. stderr: {}.",
                exit_code, stdout, stderr
            ),
            Self::VersionMismatch { agent_version, node_version } => format!(
                "Current versions: {:?}, versions used by ironic: {:?}",
                agent_version, node_version
            ),
            Self::AgentIsBusy { command_name } => {
                format!("executing command {}", command_name)
            }
            Self::HardwareManagerMethodNotFound { method } => {
                format!("No HardwareManager found to handle method: \"{}\".", method)
            }
        }
    }

    /// True for the user-input family surfaced as HTTP 4xx without ever
    /// producing a FAILED command record.
    pub fn is_invalid_content(&self) -> bool {
        matches!(
            self,
            Self::InvalidContent { .. }
                | Self::InvalidCommand { .. }
                | Self::InvalidCommandParams { .. }
                | Self::InvalidImage { .. }
        )
    }

    /// Snapshot as the wire object `{type, code, message, details}`.
    pub fn serialize(&self) -> serde_json::Value {
        serde_json::json!({
            "type": self.type_name(),
            "code": self.code(),
            "message": self.message(),
            "details": self.details(),
        })
    }

    pub fn invalid_command(details: impl Into<String>) -> Self {
        Self::InvalidCommand { details: details.into() }
    }

    pub fn invalid_params(details: impl Into<String>) -> Self {
        Self::InvalidCommandParams { details: details.into() }
    }

    pub fn not_found(type_descr: impl Into<String>, id: impl Into<String>) -> Self {
        Self::RequestedObjectNotFound { type_descr: type_descr.into(), id: id.into() }
    }

    pub fn command_execution(details: impl Into<String>) -> Self {
        Self::CommandExecution { details: details.into() }
    }

    pub fn incompatible(details: impl Into<String>) -> Self {
        Self::IncompatibleHardwareMethod { details: details.into() }
    }
}

impl Serialize for RestError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("RestError", 4)?;
        s.serialize_field("type", self.type_name())?;
        s.serialize_field("code", &self.code())?;
        s.serialize_field("message", self.message())?;
        s.serialize_field("details", &self.details())?;
        s.end()
    }
}

#[cfg(test)]
#[path = "errors_tests.rs"]
mod errors_tests;
