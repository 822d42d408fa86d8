// SPDX-License-Identifier: Apache-2.0

//! The command dispatcher: name resolution, the single-RUNNING concurrency
//! gate, and the insertion-ordered command ledger.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use indexmap::IndexMap;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::{debug, error};

use ira_core::{CommandResult, CommandStatus, Params, RestError};

use crate::extensions::{AgentExtension, CommandFuture, CommandReply};

pub struct CommandExecutor {
    extensions: HashMap<&'static str, Arc<dyn AgentExtension>>,
    /// Insertion-ordered ledger of every accepted command. Entries are
    /// never removed for the lifetime of the process.
    ledger: Mutex<IndexMap<String, Arc<CommandResult>>>,
    /// Acceptance gate. Held across acceptance and inline sync execution,
    /// so at most one command is RUNNING at any instant.
    gate: tokio::sync::Mutex<()>,
    /// Rung when an async command reaches a terminal state, shortening the
    /// next heartbeat.
    completion_signal: Mutex<Option<Arc<Notify>>>,
}

impl CommandExecutor {
    pub fn new(extensions: Vec<Arc<dyn AgentExtension>>) -> Self {
        let extensions = extensions.into_iter().map(|e| (e.name(), e)).collect();
        Self {
            extensions,
            ledger: Mutex::new(IndexMap::new()),
            gate: tokio::sync::Mutex::new(()),
            completion_signal: Mutex::new(None),
        }
    }

    /// Wire the force-heartbeat signal rung on async command completion.
    pub fn set_completion_signal(&self, signal: Arc<Notify>) {
        *self.completion_signal.lock() = Some(signal);
    }

    /// Accept and run a command.
    ///
    /// Validation failures and unknown names return an error without
    /// touching the ledger. Sync commands run inline under the gate and
    /// their failures (other than the invalid-content family) are captured
    /// into a FAILED record; async commands return their RUNNING record
    /// immediately.
    pub async fn execute(
        &self,
        name: &str,
        params: Params,
    ) -> Result<Arc<CommandResult>, RestError> {
        let _gate = self.gate.lock().await;

        if let Some(last) = self.last_command() {
            if last.status() == CommandStatus::Running {
                return Err(RestError::AgentIsBusy { command_name: last.name().to_string() });
            }
        }

        let (extension_name, method) = split_command(name)?;
        let extension = self
            .extensions
            .get(extension_name)
            .ok_or_else(|| RestError::not_found("Extension", extension_name))?;

        debug!(command = name, "executing command");
        match extension.command(method, &params)? {
            CommandReply::Sync(work) => {
                let outcome = run_caught(work).await;
                if let Err(err) = &outcome {
                    if err.is_invalid_content() {
                        return Err(err.clone());
                    }
                    error!(command = name, %err, "command failed");
                }
                let record = Arc::new(CommandResult::sync(name, params, outcome));
                self.insert(&record);
                Ok(record)
            }
            CommandReply::Async(work) => {
                let record = Arc::new(CommandResult::new(name, params));
                self.insert(&record);
                self.spawn_worker(Arc::clone(&record), work);
                Ok(record)
            }
        }
    }

    /// All accepted commands in acceptance order.
    pub fn list(&self) -> Vec<Arc<CommandResult>> {
        self.ledger.lock().values().cloned().collect()
    }

    pub fn get(&self, id: &str) -> Result<Arc<CommandResult>, RestError> {
        self.ledger
            .lock()
            .get(id)
            .cloned()
            .ok_or_else(|| RestError::not_found("Command Result", id))
    }

    fn last_command(&self) -> Option<Arc<CommandResult>> {
        self.ledger.lock().last().map(|(_, record)| Arc::clone(record))
    }

    fn insert(&self, record: &Arc<CommandResult>) {
        self.ledger.lock().insert(record.id().to_string(), Arc::clone(record));
    }

    fn spawn_worker(&self, record: Arc<CommandResult>, work: CommandFuture) {
        let signal = self.completion_signal.lock().clone();
        tokio::spawn(async move {
            let outcome = run_caught(work).await;
            if let Err(err) = &outcome {
                error!(command = record.name(), %err, "async command failed");
            }
            record.finish(outcome);
            if let Some(signal) = signal {
                signal.notify_one();
            }
        });
    }
}

/// Run command work, folding panics into `CommandExecutionError` so a
/// misbehaving worker never takes the agent down.
async fn run_caught(work: CommandFuture) -> Result<serde_json::Value, RestError> {
    match AssertUnwindSafe(work).catch_unwind().await {
        Ok(outcome) => outcome,
        Err(_) => Err(RestError::command_execution("command worker panicked")),
    }
}

/// Split `<extension>.<method>`.
fn split_command(name: &str) -> Result<(&str, &str), RestError> {
    match name.split_once('.') {
        Some((extension, method)) if !extension.is_empty() && !method.is_empty() => {
            Ok((extension, method))
        }
        _ => Err(RestError::invalid_command(
            "command name must be of the form <extension>.<name>",
        )),
    }
}

#[cfg(test)]
#[path = "dispatch_tests.rs"]
mod dispatch_tests;
