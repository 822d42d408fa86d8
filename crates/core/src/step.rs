// SPDX-License-Identifier: Apache-2.0

//! Step types for the clean / deploy / service catalogs.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// The lifecycle phase a step catalog belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepPhase {
    Clean,
    Deploy,
    Service,
}

impl StepPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Clean => "clean",
            Self::Deploy => "deploy",
            Self::Service => "service",
        }
    }

    /// The dispatched method that lists this phase's steps.
    pub fn list_method(&self) -> &'static str {
        match self {
            Self::Clean => "get_clean_steps",
            Self::Deploy => "get_deploy_steps",
            Self::Service => "get_service_steps",
        }
    }
}

impl std::fmt::Display for StepPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The director-side interface a step is reported under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepInterface {
    Deploy,
    Clean,
    Service,
    Raid,
    Bios,
    Management,
    Power,
}

/// Description of one step argument, surfaced to the director verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepArgInfo {
    pub description: String,
    pub required: bool,
}

/// A named atomic unit of work contributed by a hardware manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// Step name; doubles as the dispatched method name on execution.
    #[serde(rename = "step")]
    pub name: String,
    pub priority: i32,
    pub interface: StepInterface,
    pub reboot_requested: bool,
    pub abortable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub argsinfo: Option<BTreeMap<String, StepArgInfo>>,
}

impl Step {
    pub fn new(name: impl Into<String>, priority: i32, interface: StepInterface) -> Self {
        Self {
            name: name.into(),
            priority,
            interface,
            reboot_requested: false,
            abortable: false,
            argsinfo: None,
        }
    }
}

/// `{manager name → manager version}` over all managers that apply on this
/// host. Captured at step listing, replayed by the director on execution.
pub type VersionFingerprint = BTreeMap<String, String>;

#[cfg(test)]
#[path = "step_tests.rs"]
mod step_tests;
