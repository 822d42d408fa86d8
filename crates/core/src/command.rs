// SPDX-License-Identifier: Apache-2.0

//! Per-invocation command result records.
//!
//! A record is created at command acceptance and lives for the rest of the
//! process. Status moves RUNNING → SUCCEEDED/FAILED exactly once; readers
//! always observe either RUNNING with no payload or a terminal status with
//! its matching payload.

use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::watch;

use crate::errors::RestError;

/// Free-form command parameters, insertion-ordered like the request body.
pub type Params = serde_json::Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandStatus {
    Running,
    Succeeded,
    Failed,
}

#[derive(Debug)]
struct CommandState {
    status: CommandStatus,
    result: Option<Value>,
    error: Option<RestError>,
}

/// The record for one accepted command.
///
/// Sync commands are constructed already terminal via [`CommandResult::sync`];
/// async commands start RUNNING via [`CommandResult::new`] and are completed
/// by their worker through [`CommandResult::finish`].
#[derive(Debug)]
pub struct CommandResult {
    id: String,
    name: String,
    params: Params,
    state: Mutex<CommandState>,
    done: watch::Sender<bool>,
}

impl CommandResult {
    /// New RUNNING record with a fresh UUIDv4 id.
    pub fn new(name: impl Into<String>, params: Params) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            params,
            state: Mutex::new(CommandState {
                status: CommandStatus::Running,
                result: None,
                error: None,
            }),
            done: watch::channel(false).0,
        }
    }

    /// Already-terminal record for a synchronously executed command.
    pub fn sync(
        name: impl Into<String>,
        params: Params,
        outcome: Result<Value, RestError>,
    ) -> Self {
        let record = Self::new(name, params);
        record.finish(outcome);
        record
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn status(&self) -> CommandStatus {
        self.state.lock().status
    }

    pub fn is_done(&self) -> bool {
        self.status() != CommandStatus::Running
    }

    /// Terminal error, if the command FAILED.
    pub fn error(&self) -> Option<RestError> {
        self.state.lock().error.clone()
    }

    /// Terminal result, if the command SUCCEEDED.
    pub fn result(&self) -> Option<Value> {
        self.state.lock().result.clone()
    }

    /// Record the terminal outcome. The transition is monotone: once a
    /// record is terminal, later calls are ignored.
    pub fn finish(&self, outcome: Result<Value, RestError>) {
        {
            let mut state = self.state.lock();
            if state.status != CommandStatus::Running {
                return;
            }
            match outcome {
                Ok(value) => {
                    state.status = CommandStatus::Succeeded;
                    state.result = Some(value);
                }
                Err(err) => {
                    state.status = CommandStatus::Failed;
                    state.error = Some(err);
                }
            }
        }
        self.done.send_replace(true);
    }

    /// Block until the record is terminal, or until `timeout` elapses.
    pub async fn wait(&self, timeout: Option<Duration>) {
        let mut rx = self.done.subscribe();
        if *rx.borrow() {
            return;
        }
        match timeout {
            None => {
                let _ = rx.changed().await;
            }
            Some(t) => {
                let _ = tokio::time::timeout(t, rx.changed()).await;
            }
        }
    }

    /// Snapshot as the wire object. Valid at any moment; status and payload
    /// are read under the record's own lock.
    pub fn serialize(&self) -> Value {
        let state = self.state.lock();
        serde_json::json!({
            "id": self.id,
            "command_name": self.name,
            "command_params": self.params,
            "command_status": state.status,
            "command_error": state.error,
            "command_result": state.result,
        })
    }
}

#[cfg(test)]
#[path = "command_tests.rs"]
mod command_tests;
