// SPDX-License-Identifier: Apache-2.0

//! Process-wide agent state: session token, node record, serve flag.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::OnceLock;

use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::info;

use ira_core::{Node, RestError};
use ira_ironic::LookupResult;

/// Shared mutable state of the running agent.
///
/// The session token is write-once: whichever source sets it first (CLI
/// pre-injection, lookup reply, out-of-band virtual media) wins and it is
/// immutable for the rest of the process.
pub struct AgentState {
    token: OnceLock<String>,
    token_required: AtomicBool,
    standalone: bool,
    lockdown: AtomicBool,
    serve_api: watch::Sender<bool>,
    node: Mutex<Option<Node>>,
    heartbeat_timeout: AtomicU64,
}

impl AgentState {
    pub fn new(standalone: bool) -> Self {
        Self {
            token: OnceLock::new(),
            token_required: AtomicBool::new(false),
            standalone,
            lockdown: AtomicBool::new(false),
            serve_api: watch::channel(true).0,
            node: Mutex::new(None),
            heartbeat_timeout: AtomicU64::new(300),
        }
    }

    pub fn standalone(&self) -> bool {
        self.standalone
    }

    /// Set the session token. The first writer wins; returns whether this
    /// call set it.
    pub fn set_token(&self, token: String) -> bool {
        self.token.set(token).is_ok()
    }

    pub fn token(&self) -> Option<&str> {
        self.token.get().map(String::as_str)
    }

    pub fn require_token(&self) {
        self.token_required.store(true, Ordering::SeqCst);
    }

    pub fn token_required(&self) -> bool {
        self.token_required.load(Ordering::SeqCst)
    }

    /// Token gate for incoming command POSTs. Only enforced once a token is
    /// set and required.
    pub fn validate_token(&self, presented: Option<&str>) -> bool {
        if !self.token_required() {
            return true;
        }
        match self.token() {
            Some(expected) => presented == Some(expected),
            None => true,
        }
    }

    pub fn set_lockdown(&self) {
        self.lockdown.store(true, Ordering::SeqCst);
    }

    pub fn lockdown(&self) -> bool {
        self.lockdown.load(Ordering::SeqCst)
    }

    /// Lower the serve-API flag; the HTTP loop drains and exits.
    pub fn stop_serving(&self) {
        self.serve_api.send_replace(false);
    }

    pub fn serving(&self) -> bool {
        *self.serve_api.subscribe().borrow()
    }

    pub fn serve_signal(&self) -> watch::Receiver<bool> {
        self.serve_api.subscribe()
    }

    pub fn set_node(&self, node: Node) {
        *self.node.lock() = Some(node);
    }

    pub fn node(&self) -> Option<Node> {
        self.node.lock().clone()
    }

    pub fn node_uuid(&self) -> Option<String> {
        self.node.lock().as_ref().map(|n| n.uuid.clone())
    }

    pub fn set_heartbeat_timeout(&self, seconds: u64) {
        self.heartbeat_timeout.store(seconds, Ordering::SeqCst);
    }

    pub fn heartbeat_timeout(&self) -> u64 {
        self.heartbeat_timeout.load(Ordering::SeqCst)
    }

    /// Apply a lookup reply: cache the node, capture the heartbeat timeout,
    /// and capture the session token when the director requires one.
    pub fn process_lookup_data(&self, result: &LookupResult) -> Result<(), RestError> {
        info!(uuid = %result.node.uuid, "node lookup succeeded");
        self.set_node(result.node.clone());

        if let Some(timeout) = result.config.heartbeat_timeout {
            self.set_heartbeat_timeout(timeout);
        }

        if result.config.agent_token_required.unwrap_or(false) {
            self.require_token();
            match &result.config.agent_token {
                Some(token) => {
                    if self.set_token(token.clone()) {
                        info!("session token received from the director");
                    }
                }
                None => {
                    // A pre-injected token (CLI / virtual media) also satisfies
                    // the requirement.
                    if self.token().is_none() {
                        return Err(RestError::LookupNode {
                            details: "director requires an agent token but none was provided"
                                .into(),
                        });
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod state_tests;
