// SPDX-License-Identifier: Apache-2.0

//! A do-nothing extension exercising every dispatcher path; used by the
//! test suite and for smoke-testing a live agent.

use std::time::Duration;

use futures_util::FutureExt;
use serde_json::Value;

use ira_core::{Params, RestError};

use super::{optional_param, unknown_command, AgentExtension, CommandReply};

pub struct FakeExtension;

impl AgentExtension for FakeExtension {
    fn name(&self) -> &'static str {
        "fake"
    }

    fn command(&self, method: &str, params: &Params) -> Result<CommandReply, RestError> {
        match method {
            "noop" => Ok(CommandReply::Sync(async { Ok(Value::Null) }.boxed())),
            "echo" => {
                let params = params.clone();
                Ok(CommandReply::Sync(async move { Ok(Value::Object(params)) }.boxed()))
            }
            "sleep" => {
                let seconds: f64 = optional_param(params, "seconds")?.unwrap_or(1.0);
                if seconds < 0.0 {
                    return Err(RestError::invalid_params("seconds must be non-negative"));
                }
                Ok(CommandReply::Async(
                    async move {
                        tokio::time::sleep(Duration::from_secs_f64(seconds)).await;
                        Ok(Value::Null)
                    }
                    .boxed(),
                ))
            }
            "fail" => Ok(CommandReply::Sync(
                async { Err(RestError::command_execution("fake.fail always fails")) }.boxed(),
            )),
            "fail_async" => Ok(CommandReply::Async(
                async { Err(RestError::command_execution("fake.fail_async always fails")) }.boxed(),
            )),
            _ => Err(unknown_command(self.name(), method)),
        }
    }
}
