// SPDX-License-Identifier: Apache-2.0

//! The node record cached from the director's lookup reply.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A dict-shaped node as the director sends it. Only `uuid` is interpreted
/// by the agent; everything else is carried for the hardware managers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub uuid: String,
    #[serde(default)]
    pub properties: Map<String, Value>,
    #[serde(default)]
    pub driver_info: Map<String, Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Node {
    pub fn with_uuid(uuid: impl Into<String>) -> Self {
        Self {
            uuid: uuid.into(),
            properties: Map::new(),
            driver_info: Map::new(),
            extra: Map::new(),
        }
    }
}
