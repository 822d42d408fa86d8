// SPDX-License-Identifier: Apache-2.0

//! Per-phase step catalogs: collection, deduplication, version gating and
//! step execution.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{info, warn};

use ira_core::{Node, RestError, Step, StepPhase, VersionFingerprint};

use crate::manager::{DispatchArgs, HardwareSupport};
use crate::registry::Registry;

/// What the director receives for `get_<phase>_steps`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepCatalog {
    pub steps: BTreeMap<String, Vec<Step>>,
    pub hardware_manager_version: VersionFingerprint,
}

/// Collect and deduplicate the step lists for one phase.
pub async fn get_steps(
    registry: &Registry,
    phase: StepPhase,
    node: &Node,
    ports: &Value,
) -> Result<StepCatalog, RestError> {
    registry.cache_node(node.clone());
    let args = DispatchArgs::for_node(node_value(node)?, ports.clone());
    let raw = registry.dispatch_to_all_managers(phase.list_method(), &args).await?;

    let mut candidates = BTreeMap::new();
    for (manager, value) in raw {
        let steps: Vec<Step> = serde_json::from_value(value).map_err(|e| {
            RestError::command_execution(format!(
                "manager {manager} returned malformed {phase} steps: {e}"
            ))
        })?;
        candidates.insert(manager, steps);
    }

    let steps = deduplicate_steps(candidates, &registry.support_levels());
    Ok(StepCatalog { steps, hardware_manager_version: registry.get_current_versions() })
}

/// Remove duplicated steps across managers.
///
/// Two steps collide iff they share a name. The winner is picked by: higher
/// manager support level, then higher step priority, then earlier manager
/// name. A pure function of its inputs; the same input always yields the
/// same output.
pub fn deduplicate_steps(
    candidates: BTreeMap<String, Vec<Step>>,
    support: &BTreeMap<String, HardwareSupport>,
) -> BTreeMap<String, Vec<Step>> {
    let mut groups: BTreeMap<String, Vec<(String, HardwareSupport, Step)>> = BTreeMap::new();
    for (manager, steps) in candidates {
        let Some(&level) = support.get(&manager) else {
            warn!(manager = %manager, "unknown hardware support, dropping candidate steps");
            continue;
        };
        for step in steps {
            groups.entry(step.name.clone()).or_default().push((manager.clone(), level, step));
        }
    }

    let mut deduped: BTreeMap<String, Vec<Step>> = BTreeMap::new();
    for (_, mut group) in groups {
        group.sort_by(|a, b| {
            b.1.cmp(&a.1)
                .then_with(|| b.2.priority.cmp(&a.2.priority))
                .then_with(|| a.0.cmp(&b.0))
        });
        if let Some((manager, _, step)) = group.into_iter().next() {
            deduped.entry(manager).or_default().push(step);
        }
    }
    deduped
}

/// Fail with `VersionMismatch` iff the director replayed a fingerprint that
/// no longer matches the running managers. `None` means the first run of a
/// cycle and always passes.
pub fn check_versions(
    registry: &Registry,
    version: Option<&VersionFingerprint>,
) -> Result<(), RestError> {
    let Some(node_version) = version else {
        return Ok(());
    };
    let agent_version = registry.get_current_versions();
    if *node_version != agent_version {
        warn!(
            agent = ?agent_version,
            node = ?node_version,
            "mismatched hardware manager versions"
        );
        return Err(RestError::VersionMismatch {
            agent_version,
            node_version: node_version.clone(),
        });
    }
    Ok(())
}

/// Execute one step: cache the node, gate on the fingerprint, dispatch the
/// step name, and wrap the outcome in the phase's reply shape.
pub async fn execute_step(
    registry: &Registry,
    phase: StepPhase,
    step: &Step,
    node: &Node,
    ports: &Value,
    version: Option<&VersionFingerprint>,
    extra: Map<String, Value>,
) -> Result<Value, RestError> {
    registry.cache_node(node.clone());
    check_versions(registry, version)?;

    let mut args = DispatchArgs::for_node(node_value(node)?, ports.clone());
    args.extra = extra;

    info!(phase = %phase, step = %step.name, "executing step");
    let result = registry.dispatch_to_managers(&step.name, &args).await?;
    info!(phase = %phase, step = %step.name, "step completed");

    let mut reply = Map::new();
    reply.insert(format!("{phase}_result"), result);
    reply.insert(
        format!("{phase}_step"),
        serde_json::to_value(step).map_err(|e| wrap_phase(phase, &step.name, &e.to_string()))?,
    );
    Ok(Value::Object(reply))
}

fn node_value(node: &Node) -> Result<Value, RestError> {
    serde_json::to_value(node)
        .map_err(|e| RestError::command_execution(format!("failed to serialise node: {e}")))
}

fn wrap_phase(phase: StepPhase, step: &str, err: &str) -> RestError {
    let details = format!("error performing {phase} step {step}: {err}");
    match phase {
        StepPhase::Clean => RestError::Cleaning { details },
        StepPhase::Deploy => RestError::Deployment { details },
        StepPhase::Service => RestError::Servicing { details },
    }
}

#[cfg(test)]
#[path = "steps_tests.rs"]
mod steps_tests;
