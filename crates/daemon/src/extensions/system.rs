// SPDX-License-Identifier: Apache-2.0

//! System-wide commands.

use std::sync::Arc;

use futures_util::FutureExt;
use serde_json::Value;
use tracing::info;

use ira_core::{Params, RestError};

use crate::state::AgentState;

use super::{unknown_command, AgentExtension, CommandReply};

pub struct SystemExtension {
    state: Arc<AgentState>,
}

impl SystemExtension {
    pub fn new(state: Arc<AgentState>) -> Self {
        Self { state }
    }
}

impl AgentExtension for SystemExtension {
    fn name(&self) -> &'static str {
        "system"
    }

    fn command(&self, method: &str, _params: &Params) -> Result<CommandReply, RestError> {
        match method {
            // Terminal: prevents any further interaction with the agent.
            "lockdown" => {
                let state = Arc::clone(&self.state);
                Ok(CommandReply::Sync(
                    async move {
                        info!("locking agent down and stopping the API");
                        state.set_lockdown();
                        state.stop_serving();
                        Ok(Value::Null)
                    }
                    .boxed(),
                ))
            }
            _ => Err(unknown_command(self.name(), method)),
        }
    }
}
