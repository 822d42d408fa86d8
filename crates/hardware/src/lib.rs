// SPDX-License-Identifier: Apache-2.0

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! ira-hardware: the hardware-manager dispatch layer.
//!
//! A priority-ranked registry resolves a named operation to the most
//! specific manager that supports it on this host. The step catalog on top
//! of it produces the per-phase clean/deploy/service step lists with a
//! version fingerprint that gates mid-cycle compatibility.

pub mod generic;
pub mod imaging;
pub mod manager;
pub mod registry;
pub mod shell;
pub mod steps;

#[cfg(any(test, feature = "test-support"))]
pub mod fake;

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeHardwareManager;
pub use generic::GenericHardwareManager;
#[cfg(any(test, feature = "test-support"))]
pub use imaging::FakeImageWriter;
pub use imaging::{ImageInfo, ImageWriter, StreamingImageWriter};
pub use manager::{DispatchArgs, HardwareManager, HardwareSupport, MethodOutcome};
pub use registry::Registry;
pub use steps::{deduplicate_steps, execute_step, get_steps, StepCatalog};
