// SPDX-License-Identifier: Apache-2.0

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! ira-core: wire types shared by the provisioning agent's crates.
//!
//! The error taxonomy, command result records, step and inventory types
//! defined here are the agent's contract with the director; everything
//! serialises to the exact field names the director expects.

pub mod clock;
pub mod command;
pub mod errors;
pub mod inventory;
pub mod node;
pub mod step;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use clock::{Clock, FakeClock, SystemClock};
pub use command::{CommandResult, CommandStatus, Params};
pub use errors::RestError;
pub use inventory::{BlockDevice, Cpu, HardwareInfo, Memory, NetworkInterface};
pub use node::Node;
pub use step::{Step, StepArgInfo, StepInterface, StepPhase, VersionFingerprint};
