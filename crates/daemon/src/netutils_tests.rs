// SPDX-License-Identifier: Apache-2.0

use super::*;

#[yare::parameterized(
    plain = { "192.0.2.10", "192.0.2.10" },
    hostname = { "director.example", "director.example" },
    ipv6 = { "2001:db8::10", "[2001:db8::10]" },
    already_bracketed = { "[2001:db8::10]", "[2001:db8::10]" },
)]
fn wrap_ipv6_brackets_only_bare_literals(host: &str, expected: &str) {
    assert_eq!(wrap_ipv6(host), expected);
}

#[yare::parameterized(
    http_with_port = { "http://director.example:6385/v1", "director.example", 6385 },
    http_default = { "http://director.example", "director.example", 80 },
    https_default = { "https://director.example/", "director.example", 443 },
    ipv6_with_port = { "http://[2001:db8::10]:6385", "2001:db8::10", 6385 },
    ipv6_default = { "https://[2001:db8::10]", "2001:db8::10", 443 },
)]
fn split_url_host_cases(url: &str, host: &str, port: u16) {
    assert_eq!(split_url_host(url), Some((host.to_string(), port)));
}

#[test]
fn route_source_is_the_src_token() {
    let output =
        "192.0.2.1 via 10.0.0.1 dev eth0 src 10.0.0.17 uid 0 \\    cache \n";
    assert_eq!(parse_route_source(output).as_deref(), Some("10.0.0.17"));
}

#[test]
fn route_without_src_yields_none() {
    assert!(parse_route_source("unreachable 192.0.2.1\n").is_none());
}
