// SPDX-License-Identifier: Apache-2.0

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! ira-daemon: the provisioning agent runtime.
//!
//! Wires the hardware dispatch layer and the director liaison into a
//! long-lived HTTP service: commands come in over `/v1/commands`, execute
//! through the hardware registry, and the heartbeater keeps the director
//! informed of agent liveness until a terminal command shuts the API down.

pub mod agent;
pub mod api;
pub mod config;
pub mod dispatch;
pub mod extensions;
pub mod heartbeater;
pub mod inspector;
pub mod netutils;
pub mod state;

pub use agent::Agent;
pub use config::Config;
pub use dispatch::CommandExecutor;
pub use state::AgentState;

/// Agent version reported in `/v1/status` and heartbeats.
pub const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");
