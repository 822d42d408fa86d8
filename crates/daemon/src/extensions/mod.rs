// SPDX-License-Identifier: Apache-2.0

//! Agent extensions: the named command surface the director drives.
//!
//! Each extension maps method names to sync or async work. Validators run
//! synchronously inside [`AgentExtension::command`]; the returned future is
//! executed by the dispatcher, inline for sync commands or on a worker task
//! for async ones.

mod fake;
mod phase;
mod poll;
mod rescue;
mod system;

pub use fake::FakeExtension;
pub use phase::PhaseExtension;
pub use poll::PollExtension;
pub use rescue::{CryptHasher, PasswordHasher, RescueExtension, RESCUE_PASSWORD_FILE};
pub use system::SystemExtension;

use futures_util::future::BoxFuture;
use serde_json::Value;

use ira_core::{Params, RestError};

pub type CommandFuture = BoxFuture<'static, Result<Value, RestError>>;

/// How a command wants to run.
pub enum CommandReply {
    /// Executed inline under the acceptance gate; the reply is terminal.
    Sync(CommandFuture),
    /// Executed on a worker task; the reply is a RUNNING record.
    Async(CommandFuture),
}

pub trait AgentExtension: Send + Sync {
    /// The `<extension>` part of `<extension>.<method>` command names.
    fn name(&self) -> &'static str;

    /// Resolve a method, validate its params, and hand back the work.
    /// Unknown methods fail with `InvalidCommandError`; bad params with
    /// `InvalidCommandParamsError`.
    fn command(&self, method: &str, params: &Params) -> Result<CommandReply, RestError>;
}

/// The standard unknown-method error.
pub(crate) fn unknown_command(extension: &str, method: &str) -> RestError {
    RestError::invalid_command(format!("Unknown command: {extension}.{method}"))
}

/// Decode a required param into a concrete type.
pub(crate) fn required_param<T: serde::de::DeserializeOwned>(
    params: &Params,
    name: &str,
) -> Result<T, RestError> {
    let value = params
        .get(name)
        .ok_or_else(|| RestError::invalid_params(format!("missing required parameter {name}")))?;
    serde_json::from_value(value.clone())
        .map_err(|e| RestError::invalid_params(format!("malformed parameter {name}: {e}")))
}

/// Decode an optional param into a concrete type.
pub(crate) fn optional_param<T: serde::de::DeserializeOwned>(
    params: &Params,
    name: &str,
) -> Result<Option<T>, RestError> {
    match params.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => serde_json::from_value(value.clone())
            .map(Some)
            .map_err(|e| RestError::invalid_params(format!("malformed parameter {name}: {e}"))),
    }
}
