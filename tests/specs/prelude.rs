// SPDX-License-Identifier: Apache-2.0

//! Shared harness for the scenario specs.

use std::net::SocketAddr;
use std::sync::Arc;

pub use serde_json::{json, Value};

pub use ira_core::{Step, StepInterface, StepPhase};
pub use ira_daemon::api::{routes, ApiContext};
pub use ira_daemon::extensions::{
    AgentExtension, FakeExtension, PhaseExtension, PollExtension, SystemExtension,
};
pub use ira_daemon::{AgentState, CommandExecutor};
pub use ira_hardware::{
    FakeHardwareManager, HardwareManager, HardwareSupport, MethodOutcome, Registry,
};

/// A fully wired agent API around the given hardware managers.
pub struct Harness {
    pub state: Arc<AgentState>,
    pub addr: SocketAddr,
    server: tokio::task::JoinHandle<()>,
}

impl Harness {
    /// Build the agent around `managers` and serve its API on an ephemeral
    /// port, with the serve-API flag wired to graceful shutdown.
    pub async fn start(managers: Vec<FakeHardwareManager>) -> Self {
        let managers: Vec<Arc<dyn HardwareManager>> =
            managers.into_iter().map(|m| Arc::new(m) as Arc<dyn HardwareManager>).collect();
        let registry = Arc::new(Registry::build(managers).await.unwrap());
        let state = Arc::new(AgentState::new(false));

        let extensions: Vec<Arc<dyn AgentExtension>> = vec![
            Arc::new(PhaseExtension::new(StepPhase::Clean, Arc::clone(&registry))),
            Arc::new(PhaseExtension::new(StepPhase::Deploy, Arc::clone(&registry))),
            Arc::new(PhaseExtension::new(StepPhase::Service, Arc::clone(&registry))),
            Arc::new(SystemExtension::new(Arc::clone(&state))),
            Arc::new(PollExtension::new(Arc::clone(&state), Arc::clone(&registry))),
            Arc::new(FakeExtension),
        ];
        let executor = Arc::new(CommandExecutor::new(extensions));

        let ctx = Arc::new(ApiContext {
            executor: Arc::clone(&executor),
            state: Arc::clone(&state),
            started_at: 1_722_470_400.0,
            version: "0.1.0".to_string(),
        });

        let mut shutdown = state.serve_signal();
        let signal = async move {
            while *shutdown.borrow() {
                if shutdown.changed().await.is_err() {
                    break;
                }
            }
        };
        let (addr, server) =
            warp::serve(routes(ctx)).bind_with_graceful_shutdown(([127, 0, 0, 1], 0), signal);
        let server = tokio::spawn(server);

        Self { state, addr, server }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    /// POST a command and decode the reply.
    pub async fn post_command(&self, name: &str, params: Value) -> (u16, Value) {
        let response = reqwest::Client::new()
            .post(self.url("/v1/commands"))
            .json(&json!({"name": name, "params": params}))
            .send()
            .await
            .unwrap();
        let status = response.status().as_u16();
        (status, response.json().await.unwrap())
    }

    pub async fn get(&self, path: &str) -> (u16, Value) {
        let response = reqwest::Client::new().get(self.url(path)).send().await.unwrap();
        let status = response.status().as_u16();
        (status, response.json().await.unwrap())
    }

    /// Wait (bounded) for the serve loop to exit after a terminal command.
    pub async fn join(self) {
        tokio::time::timeout(std::time::Duration::from_secs(5), self.server)
            .await
            .expect("serve loop did not exit")
            .unwrap();
    }
}

/// A generic manager with one clean step and canned erase behavior.
pub fn generic_manager() -> FakeHardwareManager {
    let mut erase = Step::new("erase_devices", 10, StepInterface::Deploy);
    erase.abortable = true;
    FakeHardwareManager::new("GenericHardwareManager", HardwareSupport::GENERIC)
        .with_version("1.1")
        .with_steps(StepPhase::Clean, vec![erase])
        .with_method("erase_devices", MethodOutcome::done(json!(["generic wipe", ""])))
}
