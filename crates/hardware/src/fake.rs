// SPDX-License-Identifier: Apache-2.0

//! Canned hardware manager for tests.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use ira_core::{Step, StepPhase};

use crate::manager::{DispatchArgs, HardwareManager, HardwareSupport, MethodOutcome};

/// A manager whose answers are configured up front. Records every
/// dispatched method so tests can assert call order.
pub struct FakeHardwareManager {
    name: &'static str,
    support: HardwareSupport,
    version: String,
    responses: HashMap<String, MethodOutcome>,
    calls: Mutex<Vec<String>>,
}

impl FakeHardwareManager {
    pub fn new(name: &'static str, support: HardwareSupport) -> Self {
        Self {
            name,
            support,
            version: "1.0".into(),
            responses: HashMap::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_method(mut self, method: impl Into<String>, outcome: MethodOutcome) -> Self {
        self.responses.insert(method.into(), outcome);
        self
    }

    /// Canned step list for one phase.
    pub fn with_steps(self, phase: StepPhase, steps: Vec<Step>) -> Self {
        let method = phase.list_method().to_string();
        self.with_method(method, MethodOutcome::done(steps))
    }

    /// Methods dispatched so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl HardwareManager for FakeHardwareManager {
    fn name(&self) -> &'static str {
        self.name
    }

    fn version(&self) -> String {
        self.version.clone()
    }

    async fn evaluate_hardware_support(&self) -> HardwareSupport {
        self.support
    }

    async fn dispatch(&self, method: &str, _args: &DispatchArgs) -> MethodOutcome {
        self.calls.lock().push(method.to_string());
        self.responses.get(method).cloned().unwrap_or(MethodOutcome::NoSuchMethod)
    }
}
