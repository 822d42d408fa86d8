// SPDX-License-Identifier: Apache-2.0

//! Hardware inventory types reported to the director during lookup and
//! inspection. Field names are the wire contract.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockDevice {
    /// Device node, e.g. `/dev/sda`.
    pub name: String,
    pub model: String,
    /// Size in bytes.
    pub size: u64,
    pub rotational: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serial: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkInterface {
    pub name: String,
    pub mac_address: String,
    #[serde(default)]
    pub ipv4_address: Option<String>,
    #[serde(default)]
    pub ipv6_address: Option<String>,
    #[serde(default)]
    pub has_carrier: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cpu {
    pub model_name: String,
    /// Textual frequency as read from /proc/cpuinfo (MHz).
    #[serde(default)]
    pub frequency: Option<String>,
    pub count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Memory {
    /// Total physical memory in bytes.
    pub total: u64,
}

/// The full inventory bundle, as posted to lookup and inspection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HardwareInfo {
    pub interfaces: Vec<NetworkInterface>,
    pub cpu: Cpu,
    pub disks: Vec<BlockDevice>,
    pub memory: Memory,
}

impl HardwareInfo {
    /// MAC addresses of candidate NICs, used as lookup keys.
    pub fn mac_addresses(&self) -> Vec<String> {
        self.interfaces
            .iter()
            .filter(|iface| !iface.mac_address.is_empty())
            .map(|iface| iface.mac_address.clone())
            .collect()
    }
}

#[cfg(test)]
#[path = "inventory_tests.rs"]
mod inventory_tests;
