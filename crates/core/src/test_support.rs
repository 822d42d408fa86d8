// SPDX-License-Identifier: Apache-2.0

//! Shared helpers for other crates' tests.

use serde_json::Value;

use crate::command::Params;
use crate::inventory::{BlockDevice, Cpu, HardwareInfo, Memory, NetworkInterface};

/// Build command params from key/value pairs.
pub fn params(pairs: &[(&str, Value)]) -> Params {
    pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
}

/// A small but plausible inventory for lookup and dispatch tests.
pub fn hardware_info() -> HardwareInfo {
    HardwareInfo {
        interfaces: vec![NetworkInterface {
            name: "eth0".into(),
            mac_address: "52:54:00:12:34:56".into(),
            ipv4_address: Some("192.0.2.10".into()),
            ipv6_address: None,
            has_carrier: true,
        }],
        cpu: Cpu { model_name: "Test CPU".into(), frequency: Some("2000.000".into()), count: 4 },
        disks: vec![BlockDevice {
            name: "/dev/sda".into(),
            model: "TESTDISK".into(),
            size: 21_474_836_480,
            rotational: false,
            serial: None,
        }],
        memory: Memory { total: 4_294_967_296 },
    }
}
