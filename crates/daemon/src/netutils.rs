// SPDX-License-Identifier: Apache-2.0

//! Host networking plumbing: advertise-address resolution and the startup
//! wait for a usable interface.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::lookup_host;
use tracing::{info, warn};

use ira_core::RestError;
use ira_hardware::{shell, Registry};

/// Bracket IPv6 literals for URL embedding.
pub fn wrap_ipv6(host: &str) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("[{host}]")
    } else {
        host.to_string()
    }
}

/// The host and port of an http(s) URL, without pulling in a URL parser.
pub fn split_url_host(api_url: &str) -> Option<(String, u16)> {
    let rest = api_url.split("://").nth(1).unwrap_or(api_url);
    let default_port = if api_url.starts_with("https") { 443 } else { 80 };
    let authority = rest.split('/').next()?;
    if let Some(end) = authority.find(']') {
        // Bracketed IPv6 literal.
        let host = authority.get(1..end)?.to_string();
        let port = authority
            .get(end + 1..)
            .and_then(|p| p.strip_prefix(':'))
            .and_then(|p| p.parse().ok())
            .unwrap_or(default_port);
        return Some((host, port));
    }
    match authority.rsplit_once(':') {
        Some((host, port)) => Some((host.to_string(), port.parse().ok()?)),
        None => Some((authority.to_string(), default_port)),
    }
}

/// The source address the kernel would use to reach the director, read
/// from `ip route get`.
pub(crate) fn parse_route_source(output: &str) -> Option<String> {
    let mut tokens = output.split_whitespace();
    while let Some(token) = tokens.next() {
        if token == "src" {
            return tokens.next().map(str::to_string);
        }
    }
    None
}

async fn route_source(director_ip: &str) -> Option<String> {
    match shell::execute("ip", &["-o", "route", "get", director_ip]).await {
        Ok(output) => parse_route_source(&output.stdout),
        Err(err) => {
            warn!(%err, "ip route get failed");
            None
        }
    }
}

/// Resolve the address the director should call back on, by consulting the
/// routing table toward the director's URL. Retries `attempts` times with
/// `sleep` in between, then fails with `LookupAgentIPError`.
pub async fn resolve_advertise_host(
    api_url: &str,
    attempts: u32,
    sleep: Duration,
) -> Result<String, RestError> {
    let (host, port) = split_url_host(api_url).ok_or_else(|| RestError::LookupAgentIp {
        details: format!("cannot extract a host from director URL {api_url}"),
    })?;

    for attempt in 1..=attempts.max(1) {
        let director_ip = match lookup_host((host.as_str(), port)).await {
            Ok(mut addrs) => addrs.next().map(|a: SocketAddr| a.ip().to_string()),
            Err(err) => {
                warn!(%err, host = %host, "cannot resolve director host");
                None
            }
        };
        if let Some(director_ip) = director_ip {
            if let Some(source) = route_source(&director_ip).await {
                info!(address = %source, "resolved advertise address");
                return Ok(source);
            }
        }
        if attempt < attempts {
            tokio::time::sleep(sleep).await;
        }
    }
    Err(RestError::LookupAgentIp {
        details: format!("no route toward the director after {attempts} attempts"),
    })
}

/// The IPv4 address of a specific interface, for `--network-interface`.
pub async fn interface_address(registry: &Registry, name: &str) -> Result<String, RestError> {
    let interfaces = registry.list_network_interfaces().await?;
    interfaces
        .iter()
        .find(|iface| iface.name == name)
        .and_then(|iface| iface.ipv4_address.clone())
        .ok_or_else(|| RestError::LookupAgentIp {
            details: format!("interface {name} has no IPv4 address"),
        })
}

/// Wait until at least one interface carries an IPv4 address, up to a
/// bounded number of attempts. Degraded networks log and proceed; lookup
/// retries on its own schedule.
pub async fn wait_for_ipv4(registry: &Registry, attempts: u32, delay: Duration) {
    for _ in 0..attempts {
        match registry.list_network_interfaces().await {
            Ok(interfaces) if interfaces.iter().any(|i| i.ipv4_address.is_some()) => return,
            Ok(_) => {}
            Err(err) => warn!(%err, "cannot list interfaces while waiting for IPv4"),
        }
        tokio::time::sleep(delay).await;
    }
    warn!("proceeding without a confirmed IPv4 address");
}

#[cfg(test)]
#[path = "netutils_tests.rs"]
mod netutils_tests;
