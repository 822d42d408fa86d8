// SPDX-License-Identifier: Apache-2.0

//! Director discovery seam.
//!
//! Real deployments resolve the director via mDNS; that collaborator lives
//! outside this crate. The agent only consumes this trait: an endpoint URL
//! plus any configuration overrides the discovery source advertises.

use async_trait::async_trait;
use serde_json::{Map, Value};

use ira_core::RestError;

#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveryResult {
    pub api_url: String,
    /// `key → value` configuration overrides applied before the agent
    /// starts serving (e.g. `ipa_disk_wait_attempts`).
    pub overrides: Map<String, Value>,
}

#[async_trait]
pub trait Discovery: Send + Sync {
    async fn discover(&self) -> Result<DiscoveryResult, RestError>;
}

/// A discovery source with a fixed answer. Used where the endpoint is known
/// out-of-band, and by tests.
pub struct StaticDiscovery {
    result: DiscoveryResult,
}

impl StaticDiscovery {
    pub fn new(api_url: impl Into<String>) -> Self {
        Self { result: DiscoveryResult { api_url: api_url.into(), overrides: Map::new() } }
    }

    pub fn with_overrides(mut self, overrides: Map<String, Value>) -> Self {
        self.result.overrides = overrides;
        self
    }
}

#[async_trait]
impl Discovery for StaticDiscovery {
    async fn discover(&self) -> Result<DiscoveryResult, RestError> {
        Ok(self.result.clone())
    }
}
