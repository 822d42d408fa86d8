// SPDX-License-Identifier: Apache-2.0

//! Agent configuration: CLI flags, kernel command line parameters, and
//! discovery-supplied overrides.

use std::collections::HashMap;
use std::net::IpAddr;
use std::path::PathBuf;

use clap::Parser;
use serde_json::{Map, Value};
use tracing::debug;

/// Command line of the `ira` binary.
#[derive(Debug, Parser)]
#[command(name = "ira", about = "In-RAM bare-metal provisioning agent")]
pub struct Cli {
    /// URL of the director API. Discovered via mDNS when omitted.
    #[arg(long)]
    pub api_url: Option<String>,

    /// Address the agent API listens on.
    #[arg(long, default_value = "0.0.0.0")]
    pub listen_host: IpAddr,

    #[arg(long, default_value_t = 9999)]
    pub listen_port: u16,

    /// Address the director is told to call back on. Derived from the
    /// routing table towards the director when omitted.
    #[arg(long)]
    pub advertise_host: Option<String>,

    #[arg(long, default_value_t = 9999)]
    pub advertise_port: u16,

    /// Interface whose address should be advertised.
    #[arg(long)]
    pub network_interface: Option<String>,

    #[arg(long, default_value_t = 6)]
    pub ip_lookup_attempts: u32,

    /// Seconds between advertise-address resolution attempts.
    #[arg(long, default_value_t = 10)]
    pub ip_lookup_sleep: u64,

    /// Overall lookup deadline in seconds.
    #[arg(long, default_value_t = 300)]
    pub lookup_timeout: u64,

    /// Starting interval between lookup attempts in seconds.
    #[arg(long, default_value_t = 1)]
    pub lookup_interval: u64,

    /// Run without a director; node data arrives via poll.set_node_info.
    #[arg(long)]
    pub standalone: bool,

    /// Pre-injected session token (e.g. from virtual media).
    #[arg(long)]
    pub agent_token: Option<String>,

    /// Seconds to wait before the first hardware probe.
    #[arg(long, default_value_t = 0)]
    pub hardware_initialization_delay: u64,

    /// Inspection collector endpoint; enables the one-shot inspection
    /// branch at startup.
    #[arg(long)]
    pub inspection_callback_url: Option<String>,

    /// Serve the agent API over TLS.
    #[arg(long)]
    pub listen_tls: bool,

    #[arg(long, requires = "listen_tls")]
    pub tls_cert_file: Option<PathBuf>,

    #[arg(long, requires = "listen_tls")]
    pub tls_key_file: Option<PathBuf>,

    /// Require and verify image checksums before writing.
    #[arg(long)]
    pub deep_image_inspection: bool,

    /// Timeout for outbound HTTP requests in seconds.
    #[arg(long, default_value_t = 30)]
    pub http_request_timeout: u64,
}

/// Resolved agent configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub api_url: Option<String>,
    pub listen_host: IpAddr,
    pub listen_port: u16,
    pub advertise_host: Option<String>,
    pub advertise_port: u16,
    pub network_interface: Option<String>,
    pub ip_lookup_attempts: u32,
    pub ip_lookup_sleep: u64,
    pub lookup_timeout: u64,
    pub lookup_interval: u64,
    pub standalone: bool,
    pub agent_token: Option<String>,
    pub hardware_initialization_delay: u64,
    pub inspection_callback_url: Option<String>,
    pub listen_tls: bool,
    pub tls_cert_file: Option<PathBuf>,
    pub tls_key_file: Option<PathBuf>,
    pub deep_image_inspection: bool,
    pub http_request_timeout: u64,
    /// PXE boot MAC hint from the kernel command line (`BOOTIF=`).
    pub boot_mac: Option<String>,
    pub disk_wait_attempts: u32,
    pub disk_wait_delay: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: None,
            listen_host: IpAddr::from([0, 0, 0, 0]),
            listen_port: 9999,
            advertise_host: None,
            advertise_port: 9999,
            network_interface: None,
            ip_lookup_attempts: 6,
            ip_lookup_sleep: 10,
            lookup_timeout: 300,
            lookup_interval: 1,
            standalone: false,
            agent_token: None,
            hardware_initialization_delay: 0,
            inspection_callback_url: None,
            listen_tls: false,
            tls_cert_file: None,
            tls_key_file: None,
            deep_image_inspection: false,
            http_request_timeout: 30,
            boot_mac: None,
            disk_wait_attempts: 10,
            disk_wait_delay: 3,
        }
    }
}

impl Config {
    pub fn from_cli(cli: Cli) -> Self {
        Self {
            api_url: cli.api_url,
            listen_host: cli.listen_host,
            listen_port: cli.listen_port,
            advertise_host: cli.advertise_host,
            advertise_port: cli.advertise_port,
            network_interface: cli.network_interface,
            ip_lookup_attempts: cli.ip_lookup_attempts,
            ip_lookup_sleep: cli.ip_lookup_sleep,
            lookup_timeout: cli.lookup_timeout,
            lookup_interval: cli.lookup_interval,
            standalone: cli.standalone,
            agent_token: cli.agent_token,
            hardware_initialization_delay: cli.hardware_initialization_delay,
            inspection_callback_url: cli.inspection_callback_url,
            listen_tls: cli.listen_tls,
            tls_cert_file: cli.tls_cert_file,
            tls_key_file: cli.tls_key_file,
            deep_image_inspection: cli.deep_image_inspection,
            http_request_timeout: cli.http_request_timeout,
            ..Self::default()
        }
    }

    /// Fill gaps from the kernel command line. Explicit CLI flags win.
    pub fn apply_kernel_cmdline(&mut self, cmdline: &str) {
        let params = parse_kernel_params(cmdline);
        if self.api_url.is_none() {
            self.api_url = params.get("ipa-api-url").cloned();
        }
        if self.inspection_callback_url.is_none() {
            self.inspection_callback_url = params.get("ipa-inspection-callback-url").cloned();
        }
        if self.boot_mac.is_none() {
            // BOOTIF is `01-aa-bb-cc-dd-ee-ff`: hardware type prefix, dashes.
            self.boot_mac = params
                .get("BOOTIF")
                .map(|raw| raw.trim_start_matches("01-").replace('-', ":"));
        }
        if let Some(timeout) = params.get("ipa-lookup-timeout").and_then(|v| v.parse().ok()) {
            self.lookup_timeout = timeout;
        }
    }

    /// Apply discovery- or lookup-supplied overrides. Unknown keys are
    /// logged and ignored.
    pub fn apply_overrides(&mut self, overrides: &Map<String, Value>) {
        for (key, value) in overrides {
            match key.trim_start_matches("ipa_") {
                "disk_wait_attempts" => {
                    if let Some(v) = value.as_u64() {
                        self.disk_wait_attempts = v as u32;
                    }
                }
                "disk_wait_delay" => {
                    if let Some(v) = value.as_u64() {
                        self.disk_wait_delay = v;
                    }
                }
                "lookup_timeout" => {
                    if let Some(v) = value.as_u64() {
                        self.lookup_timeout = v;
                    }
                }
                "lookup_interval" => {
                    if let Some(v) = value.as_u64() {
                        self.lookup_interval = v;
                    }
                }
                other => debug!(key = other, "ignoring unknown configuration override"),
            }
        }
    }
}

/// Extract `key=value` tokens from a kernel command line. Bare flags and
/// unknown shapes are skipped.
pub fn parse_kernel_params(cmdline: &str) -> HashMap<String, String> {
    cmdline
        .split_whitespace()
        .filter_map(|token| {
            let (key, value) = token.split_once('=')?;
            if key.is_empty() || value.is_empty() {
                return None;
            }
            Some((key.to_string(), value.to_string()))
        })
        .collect()
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;
