// SPDX-License-Identifier: Apache-2.0

//! Passive-mode commands: hardware polling and out-of-band node data.

use std::sync::Arc;

use futures_util::FutureExt;
use serde_json::Value;
use tracing::debug;

use ira_core::{Node, Params, RestError};
use ira_hardware::Registry;
use ira_ironic::{LookupConfig, LookupResult};

use crate::state::AgentState;

use super::{required_param, unknown_command, AgentExtension, CommandReply};

pub struct PollExtension {
    state: Arc<AgentState>,
    registry: Arc<Registry>,
}

impl PollExtension {
    pub fn new(state: Arc<AgentState>, registry: Arc<Registry>) -> Self {
        Self { state, registry }
    }
}

/// Decode a lookup-shaped payload: a node with a uuid, and an optional
/// config object (legacy top-level `heartbeat_timeout` accepted).
fn parse_node_info(value: &Value) -> Result<LookupResult, RestError> {
    let node: Node = value
        .get("node")
        .cloned()
        .ok_or_else(|| RestError::invalid_params("node_info must carry a node object"))
        .and_then(|n| {
            serde_json::from_value(n)
                .map_err(|e| RestError::invalid_params(format!("malformed node: {e}")))
        })?;

    let config: LookupConfig = match value.get("config") {
        Some(config) => serde_json::from_value(config.clone())
            .map_err(|e| RestError::invalid_params(format!("malformed config: {e}")))?,
        None => LookupConfig {
            heartbeat_timeout: value.get("heartbeat_timeout").and_then(Value::as_u64),
            ..Default::default()
        },
    };
    Ok(LookupResult { node, config })
}

impl AgentExtension for PollExtension {
    fn name(&self) -> &'static str {
        "poll"
    }

    fn command(&self, method: &str, params: &Params) -> Result<CommandReply, RestError> {
        match method {
            "get_hardware_info" => {
                let registry = Arc::clone(&self.registry);
                Ok(CommandReply::Sync(
                    async move {
                        let info = registry.list_hardware_info().await?;
                        serde_json::to_value(info).map_err(|e| {
                            RestError::command_execution(format!("serialising inventory: {e}"))
                        })
                    }
                    .boxed(),
                ))
            }
            "set_node_info" => {
                if !self.state.standalone() {
                    return Err(RestError::invalid_command(
                        "node lookup data can only be set in standalone mode",
                    ));
                }
                let node_info: Value = required_param(params, "node_info")?;
                let result = parse_node_info(&node_info)?;
                let state = Arc::clone(&self.state);
                let registry = Arc::clone(&self.registry);
                Ok(CommandReply::Sync(
                    async move {
                        debug!(uuid = %result.node.uuid, "received out-of-band lookup data");
                        registry.cache_node(result.node.clone());
                        state.process_lookup_data(&result)?;
                        Ok(Value::Null)
                    }
                    .boxed(),
                ))
            }
            _ => Err(unknown_command(self.name(), method)),
        }
    }
}

#[cfg(test)]
#[path = "poll_tests.rs"]
mod poll_tests;
