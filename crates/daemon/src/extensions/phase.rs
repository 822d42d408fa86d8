// SPDX-License-Identifier: Apache-2.0

//! The clean / deploy / service extensions.
//!
//! All three phases share the same two operations: list the deduplicated
//! step catalog with its version fingerprint, and execute one step gated on
//! that fingerprint. One extension per phase is registered, each backed by
//! the same implementation.

use std::sync::Arc;

use futures_util::FutureExt;
use serde_json::{Map, Value};

use ira_core::{Node, Params, RestError, Step, StepPhase, VersionFingerprint};
use ira_hardware::{steps, Registry};

use super::{optional_param, required_param, unknown_command, AgentExtension, CommandReply};

pub struct PhaseExtension {
    phase: StepPhase,
    registry: Arc<Registry>,
}

impl PhaseExtension {
    pub fn new(phase: StepPhase, registry: Arc<Registry>) -> Self {
        Self { phase, registry }
    }

    fn get_steps(&self, params: &Params) -> Result<CommandReply, RestError> {
        let node: Node = required_param(params, "node")?;
        let ports: Value = params.get("ports").cloned().unwrap_or(Value::Array(Vec::new()));
        let registry = Arc::clone(&self.registry);
        let phase = self.phase;
        Ok(CommandReply::Sync(
            async move {
                let catalog = steps::get_steps(&registry, phase, &node, &ports).await?;
                let mut reply = Map::new();
                reply.insert(
                    format!("{phase}_steps"),
                    serde_json::to_value(&catalog.steps).map_err(|e| {
                        RestError::command_execution(format!("serialising steps: {e}"))
                    })?,
                );
                reply.insert(
                    "hardware_manager_version".to_string(),
                    serde_json::to_value(&catalog.hardware_manager_version).map_err(|e| {
                        RestError::command_execution(format!("serialising versions: {e}"))
                    })?,
                );
                Ok(Value::Object(reply))
            }
            .boxed(),
        ))
    }

    fn execute_step(&self, params: &Params) -> Result<CommandReply, RestError> {
        let raw_step: Value = required_param(params, "step")?;
        if raw_step.get("step").is_none() {
            return Err(RestError::invalid_params(format!(
                "malformed {}_step, no \"step\" key: {raw_step}",
                self.phase
            )));
        }
        let step: Step = serde_json::from_value(raw_step.clone())
            .map_err(|e| RestError::invalid_params(format!("malformed step: {e}")))?;
        let node: Node = required_param(params, "node")?;
        let ports: Value = params.get("ports").cloned().unwrap_or(Value::Array(Vec::new()));
        let version: Option<VersionFingerprint> =
            optional_param(params, &format!("{}_version", self.phase))?;

        // Step arguments: anything the director embedded in the step's own
        // `args` object, plus spare top-level params.
        let mut extra = Map::new();
        for (key, value) in params {
            if !matches!(key.as_str(), "step" | "node" | "ports")
                && key != &format!("{}_version", self.phase)
            {
                extra.insert(key.clone(), value.clone());
            }
        }
        if let Some(args) = raw_step.get("args").and_then(Value::as_object) {
            for (key, value) in args {
                extra.insert(key.clone(), value.clone());
            }
        }

        let registry = Arc::clone(&self.registry);
        let phase = self.phase;
        Ok(CommandReply::Async(
            async move {
                steps::execute_step(&registry, phase, &step, &node, &ports, version.as_ref(), extra)
                    .await
            }
            .boxed(),
        ))
    }
}

impl AgentExtension for PhaseExtension {
    fn name(&self) -> &'static str {
        match self.phase {
            StepPhase::Clean => "clean",
            StepPhase::Deploy => "deploy",
            StepPhase::Service => "service",
        }
    }

    fn command(&self, method: &str, params: &Params) -> Result<CommandReply, RestError> {
        let list = self.phase.list_method();
        let execute = format!("execute_{}_step", self.phase);
        if method == list {
            self.get_steps(params)
        } else if method == execute {
            self.execute_step(params)
        } else {
            Err(unknown_command(self.name(), method))
        }
    }
}

#[cfg(test)]
#[path = "phase_tests.rs"]
mod phase_tests;
