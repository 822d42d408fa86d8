// SPDX-License-Identifier: Apache-2.0

//! The hardware-manager contract.
//!
//! Managers self-report how specific they are for the running host and
//! answer named operations through a single `dispatch` entry point. A
//! manager that cannot apply a method on this hardware answers
//! `Unsupported` so dispatch can fall through to a more generic manager
//! without an error ever surfacing.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};

use ira_core::RestError;

/// Self-reported support level. Larger means more specific; managers
/// reporting [`HardwareSupport::NONE`] are excluded from the registry.
/// Third-party managers may report values above `SERVICE_PROVIDER`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HardwareSupport(pub u32);

impl HardwareSupport {
    pub const NONE: Self = Self(0);
    pub const GENERIC: Self = Self(1);
    pub const MAINLINE: Self = Self(2);
    pub const SERVICE_PROVIDER: Self = Self(3);

    pub fn applies(&self) -> bool {
        self.0 > 0
    }
}

/// Payload handed to a dispatched method: the node and ports the director
/// sent, plus any step arguments.
#[derive(Debug, Clone, Default)]
pub struct DispatchArgs {
    pub node: Option<Value>,
    pub ports: Option<Value>,
    pub extra: Map<String, Value>,
}

impl DispatchArgs {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn for_node(node: Value, ports: Value) -> Self {
        Self { node: Some(node), ports: Some(ports), extra: Map::new() }
    }

    /// A step argument by name.
    pub fn arg(&self, name: &str) -> Option<&Value> {
        self.extra.get(name)
    }
}

/// Outcome of asking one manager for one method.
#[derive(Debug, Clone)]
pub enum MethodOutcome {
    /// The manager does not expose this method at all.
    NoSuchMethod,
    /// The manager exposes the method but it does not apply on this
    /// hardware; dispatch moves on to the next manager.
    Unsupported,
    /// Final outcome; dispatch stops here.
    Done(Result<Value, RestError>),
}

impl MethodOutcome {
    /// Successful outcome from any serialisable value.
    pub fn done<T: Serialize>(value: T) -> Self {
        match serde_json::to_value(value) {
            Ok(v) => Self::Done(Ok(v)),
            Err(e) => Self::Done(Err(RestError::command_execution(format!(
                "failed to serialise method result: {e}"
            )))),
        }
    }

    pub fn fail(err: RestError) -> Self {
        Self::Done(Err(err))
    }
}

impl<T: Serialize> From<Result<T, RestError>> for MethodOutcome {
    fn from(result: Result<T, RestError>) -> Self {
        match result {
            Ok(value) => Self::done(value),
            Err(err) => Self::fail(err),
        }
    }
}

/// One hardware manager. Implementations are registered at startup and
/// frozen into the registry's priority order for the process lifetime.
#[async_trait]
pub trait HardwareManager: Send + Sync {
    /// Stable name used in step catalogs and version fingerprints.
    fn name(&self) -> &'static str;

    /// Opaque version string; any change forces the director to restart a
    /// cleaning cycle.
    fn version(&self) -> String {
        env!("CARGO_PKG_VERSION").to_string()
    }

    /// Asked exactly once at registration.
    async fn evaluate_hardware_support(&self) -> HardwareSupport;

    /// Answer a named operation.
    async fn dispatch(&self, method: &str, args: &DispatchArgs) -> MethodOutcome;
}
