// SPDX-License-Identifier: Apache-2.0

//! The frozen, priority-ordered manager registry and its dispatch loops.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, info};

use ira_core::{HardwareInfo, Node, RestError, VersionFingerprint};

use crate::manager::{DispatchArgs, HardwareManager, HardwareSupport, MethodOutcome};

struct Entry {
    manager: Arc<dyn HardwareManager>,
    support: HardwareSupport,
}

/// Priority-ordered set of hardware managers, frozen at startup.
///
/// Ordering: support level descending, name ascending. No lock is taken on
/// the ordering after construction; only the node cache is mutable.
pub struct Registry {
    entries: Vec<Entry>,
    node: Mutex<Option<Node>>,
}

impl Registry {
    /// Evaluate every candidate once, drop the ones that do not apply, and
    /// freeze the ranked survivors.
    pub async fn build(
        candidates: Vec<Arc<dyn HardwareManager>>,
    ) -> Result<Self, RestError> {
        let mut entries = Vec::with_capacity(candidates.len());
        for manager in candidates {
            let support = manager.evaluate_hardware_support().await;
            if !support.applies() {
                debug!(manager = manager.name(), "hardware manager does not apply, dropping");
                continue;
            }
            info!(
                manager = manager.name(),
                support = support.0,
                version = %manager.version(),
                "hardware manager found"
            );
            entries.push(Entry { manager, support });
        }
        if entries.is_empty() {
            return Err(RestError::HardwareManagerNotFound {
                details: "no hardware manager reported support for this host".into(),
            });
        }
        entries.sort_by(|a, b| {
            b.support.cmp(&a.support).then_with(|| a.manager.name().cmp(b.manager.name()))
        });
        Ok(Self { entries, node: Mutex::new(None) })
    }

    /// Manager names in dispatch order.
    pub fn manager_names(&self) -> Vec<&'static str> {
        self.entries.iter().map(|e| e.manager.name()).collect()
    }

    /// Support level per manager, as used by step deduplication.
    pub fn support_levels(&self) -> BTreeMap<String, HardwareSupport> {
        self.entries.iter().map(|e| (e.manager.name().to_string(), e.support)).collect()
    }

    /// `{manager → version}` over every manager in the registry.
    pub fn get_current_versions(&self) -> VersionFingerprint {
        self.entries.iter().map(|e| (e.manager.name().to_string(), e.manager.version())).collect()
    }

    /// Cache the node record sent by the director.
    pub fn cache_node(&self, node: Node) {
        *self.node.lock() = Some(node);
    }

    pub fn cached_node(&self) -> Option<Node> {
        self.node.lock().clone()
    }

    /// Run `method` on the most specific manager that handles it.
    ///
    /// Managers that do not expose the method or answer `Unsupported` are
    /// skipped; the first `Done` outcome is final. Exhausting the list
    /// fails with `HardwareManagerMethodNotFound`.
    pub async fn dispatch_to_managers(
        &self,
        method: &str,
        args: &DispatchArgs,
    ) -> Result<Value, RestError> {
        for entry in &self.entries {
            match entry.manager.dispatch(method, args).await {
                MethodOutcome::NoSuchMethod => {
                    debug!(manager = entry.manager.name(), method, "manager has no such method");
                }
                MethodOutcome::Unsupported => {
                    debug!(manager = entry.manager.name(), method, "manager does not support method");
                }
                MethodOutcome::Done(outcome) => return outcome,
            }
        }
        Err(RestError::HardwareManagerMethodNotFound { method: method.to_string() })
    }

    /// Run `method` on every manager, collecting one entry per manager that
    /// produced a result. Used for step listing and other read-style
    /// queries, never for mutating operations.
    pub async fn dispatch_to_all_managers(
        &self,
        method: &str,
        args: &DispatchArgs,
    ) -> Result<BTreeMap<String, Value>, RestError> {
        let mut results = BTreeMap::new();
        for entry in &self.entries {
            match entry.manager.dispatch(method, args).await {
                MethodOutcome::NoSuchMethod | MethodOutcome::Unsupported => {
                    debug!(manager = entry.manager.name(), method, "skipped in dispatch-all");
                }
                MethodOutcome::Done(Ok(value)) => {
                    results.insert(entry.manager.name().to_string(), value);
                }
                MethodOutcome::Done(Err(err)) => return Err(err),
            }
        }
        if results.is_empty() {
            return Err(RestError::HardwareManagerMethodNotFound { method: method.to_string() });
        }
        Ok(results)
    }

    /// The full inventory bundle, via the best manager.
    pub async fn list_hardware_info(&self) -> Result<HardwareInfo, RestError> {
        let value = self.dispatch_to_managers("list_hardware_info", &DispatchArgs::empty()).await?;
        decode("list_hardware_info", value)
    }

    pub async fn list_network_interfaces(
        &self,
    ) -> Result<Vec<ira_core::NetworkInterface>, RestError> {
        let value =
            self.dispatch_to_managers("list_network_interfaces", &DispatchArgs::empty()).await?;
        decode("list_network_interfaces", value)
    }

    /// The device the OS image should be written to.
    pub async fn get_os_install_device(&self) -> Result<String, RestError> {
        let value =
            self.dispatch_to_managers("get_os_install_device", &DispatchArgs::empty()).await?;
        decode("get_os_install_device", value)
    }
}

fn decode<T: serde::de::DeserializeOwned>(method: &str, value: Value) -> Result<T, RestError> {
    serde_json::from_value(value).map_err(|e| {
        RestError::command_execution(format!("unexpected payload from {method}: {e}"))
    })
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod registry_tests;
