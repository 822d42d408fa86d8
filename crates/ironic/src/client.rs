// SPDX-License-Identifier: Apache-2.0

//! HTTP client for the director's bare-metal API.
//!
//! Lookup retries with randomised exponential backoff under an overall
//! deadline; heartbeats map the director's reply onto the error taxonomy;
//! every request carries the negotiated API version header.

use std::time::{Duration, Instant};

use parking_lot::Mutex;
use rand::Rng;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use ira_core::{Node, RestError};

/// Oldest director API the agent can talk to.
pub const MIN_API_VERSION: (u32, u32) = (1, 31);
/// First version accepting `agent_version` in heartbeats.
pub const VERSION_WITH_AGENT_VERSION: (u32, u32) = (1, 36);
/// First version with agent token support.
pub const VERSION_WITH_AGENT_TOKEN: (u32, u32) = (1, 62);
/// First version accepting `agent_verify_ca`.
pub const VERSION_WITH_VERIFY_CA: (u32, u32) = (1, 68);
/// Highest version the agent knows how to speak.
pub const MAX_KNOWN_VERSION: (u32, u32) = VERSION_WITH_VERIFY_CA;

const API_VERSION_HEADER: &str = "X-OpenStack-Ironic-API-Version";
const LOOKUP_MAX_INTERVAL: Duration = Duration::from_secs(60);

/// The `config` object of a lookup reply. Extra keys are carried as
/// configuration overrides for the agent to apply.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct LookupConfig {
    #[serde(default)]
    pub heartbeat_timeout: Option<u64>,
    #[serde(default)]
    pub agent_token: Option<String>,
    #[serde(default)]
    pub agent_token_required: Option<bool>,
    #[serde(flatten)]
    pub overrides: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LookupResult {
    pub node: Node,
    pub config: LookupConfig,
}

enum LookupAttempt {
    Found(Box<LookupResult>),
    Conflict,
    Retry,
}

pub struct APIClient {
    api_url: String,
    http: reqwest::Client,
    agent_version: String,
    negotiated: Mutex<Option<(u32, u32)>>,
}

impl APIClient {
    pub fn new(
        api_url: &str,
        request_timeout: Duration,
        agent_version: impl Into<String>,
    ) -> Result<Self, RestError> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| RestError::IronicApi { details: format!("http client: {e}") })?;
        Ok(Self {
            api_url: api_url.trim_end_matches('/').to_string(),
            http,
            agent_version: agent_version.into(),
            negotiated: Mutex::new(None),
        })
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// The director's advertised API version, clamped to the highest one
    /// the agent speaks. Discovered once and cached.
    pub async fn api_version(&self) -> (u32, u32) {
        if let Some(version) = *self.negotiated.lock() {
            return version;
        }
        let discovered = self.discover_api_version().await.unwrap_or_else(|| {
            warn!(
                "could not discover director API versions, falling back to {}.{}",
                MIN_API_VERSION.0, MIN_API_VERSION.1
            );
            MIN_API_VERSION
        });
        let version = discovered.min(MAX_KNOWN_VERSION);
        *self.negotiated.lock() = Some(version);
        version
    }

    async fn discover_api_version(&self) -> Option<(u32, u32)> {
        let response = self.http.get(format!("{}/", self.api_url)).send().await.ok()?;
        let body: Value = response.json().await.ok()?;
        let text = body.get("default_version")?.get("version")?.as_str()?;
        let mut parts = text.split('.');
        let major = parts.next()?.parse().ok()?;
        let minor = parts.next()?.parse().ok()?;
        Some((major, minor))
    }

    async fn version_header(&self) -> String {
        let (major, minor) = self.api_version().await;
        format!("{major}.{minor}")
    }

    /// POST a heartbeat for `uuid`, announcing `callback_url`.
    pub async fn heartbeat(
        &self,
        uuid: &str,
        callback_url: &str,
        agent_token: Option<&str>,
        verify_ca: Option<&str>,
    ) -> Result<(), RestError> {
        let version = self.api_version().await;
        let mut body = Map::new();
        body.insert("callback_url".into(), Value::String(callback_url.to_string()));
        if version >= VERSION_WITH_AGENT_TOKEN {
            if let Some(token) = agent_token {
                body.insert("agent_token".into(), Value::String(token.to_string()));
            }
        }
        if version >= VERSION_WITH_AGENT_VERSION {
            body.insert("agent_version".into(), Value::String(self.agent_version.clone()));
        }
        if version >= VERSION_WITH_VERIFY_CA {
            if let Some(ca) = verify_ca {
                body.insert("agent_verify_ca".into(), Value::String(ca.to_string()));
            }
        }

        debug!(callback_url, version = %format!("{}.{}", version.0, version.1), "heartbeat");
        let response = self
            .http
            .post(format!("{}/v1/heartbeat/{uuid}", self.api_url))
            .header(API_VERSION_HEADER, self.version_header().await)
            .json(&Value::Object(body))
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() || e.is_timeout() {
                    RestError::HeartbeatConnection { details: e.to_string() }
                } else {
                    RestError::Heartbeat { details: e.to_string() }
                }
            })?;

        match response.status().as_u16() {
            202 => Ok(()),
            409 => Err(RestError::HeartbeatConflict {
                details: error_from_response(response).await,
            }),
            _ => Err(RestError::Heartbeat { details: error_from_response(response).await }),
        }
    }

    /// Look the node up by MAC addresses, retrying with randomised
    /// exponential backoff until `timeout` elapses.
    pub async fn lookup_node(
        &self,
        addresses: &[String],
        node_uuid: Option<&str>,
        timeout: Duration,
        starting_interval: Duration,
    ) -> Result<LookupResult, RestError> {
        let deadline = Instant::now() + timeout;
        let mut conflict_pause = ConflictPause::default();
        let mut attempt: u32 = 0;

        loop {
            match self.do_lookup(addresses, node_uuid).await {
                LookupAttempt::Found(result) => return Ok(*result),
                LookupAttempt::Conflict => {
                    let pause = conflict_pause.next();
                    warn!(
                        "director responded with a conflict, the node is locked; waiting {}s",
                        pause.as_secs()
                    );
                    if Instant::now() + pause >= deadline {
                        break;
                    }
                    tokio::time::sleep(pause).await;
                }
                LookupAttempt::Retry => {
                    attempt = attempt.saturating_add(1);
                    let wait = backoff_interval(starting_interval, attempt);
                    if Instant::now() + wait >= deadline {
                        break;
                    }
                    tokio::time::sleep(wait).await;
                }
            }
        }
        Err(RestError::LookupNode {
            details: "could not look up node info, check logs for details".into(),
        })
    }

    async fn do_lookup(&self, addresses: &[String], node_uuid: Option<&str>) -> LookupAttempt {
        let joined = addresses.join(",");
        debug!(addresses = %joined, ?node_uuid, api = %self.api_url, "looking up node");
        let mut query: Vec<(&str, String)> = vec![("addresses", joined)];
        if let Some(uuid) = node_uuid {
            query.push(("node_uuid", uuid.to_string()));
        }

        let response = match self
            .http
            .get(format!("{}/v1/lookup", self.api_url))
            .header(API_VERSION_HEADER, self.version_header().await)
            .query(&query)
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => {
                warn!(%err, "error performing lookup, retrying");
                return LookupAttempt::Retry;
            }
        };

        match response.status().as_u16() {
            200 => {}
            409 => return LookupAttempt::Conflict,
            status => {
                warn!(status, "lookup failed; has inspection completed?");
                return LookupAttempt::Retry;
            }
        }

        let content: Value = match response.json().await {
            Ok(content) => content,
            Err(err) => {
                warn!(%err, "error decoding lookup response");
                return LookupAttempt::Retry;
            }
        };
        match parse_lookup_content(content) {
            Some(result) => LookupAttempt::Found(Box::new(result)),
            None => LookupAttempt::Retry,
        }
    }
}

/// Pull `{node, config}` out of a lookup reply, accepting the legacy shape
/// with a top-level `heartbeat_timeout` instead of a `config` object.
fn parse_lookup_content(content: Value) -> Option<LookupResult> {
    let node: Node = serde_json::from_value(content.get("node")?.clone()).ok()?;

    let config = match content.get("config") {
        Some(config) => serde_json::from_value(config.clone()).ok()?,
        None => {
            // Old director API: heartbeat_timeout at the top level.
            let heartbeat_timeout = content.get("heartbeat_timeout")?.as_u64()?;
            LookupConfig { heartbeat_timeout: Some(heartbeat_timeout), ..Default::default() }
        }
    };
    Some(LookupResult { node, config })
}

/// Escalating pause for directors that answer 409: 5, 10, then 30 seconds.
#[derive(Debug, Default)]
struct ConflictPause {
    current: u64,
}

impl ConflictPause {
    fn next(&mut self) -> Duration {
        self.current = match self.current {
            0 => 5,
            5 => 10,
            _ => 30,
        };
        Duration::from_secs(self.current)
    }
}

/// Randomised exponential backoff: uniform over `[starting, cap]` where the
/// cap doubles per attempt up to 60 seconds.
fn backoff_interval(starting: Duration, attempt: u32) -> Duration {
    let floor = starting.as_secs_f64().max(0.1);
    let cap = (floor * 2f64.powi(attempt.min(16) as i32)).min(LOOKUP_MAX_INTERVAL.as_secs_f64());
    let wait = rand::thread_rng().gen_range(floor..=cap.max(floor + f64::EPSILON));
    Duration::from_secs_f64(wait)
}

async fn error_from_response(response: reqwest::Response) -> String {
    let status = response.status().as_u16();
    let text = response.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<Value>(&text)
        .ok()
        .and_then(|body| {
            let body = body.get("error_message").cloned().unwrap_or(body);
            body.get("faultstring")
                .or_else(|| body.get("title"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or(text);
    format!("Error {status}: {detail}")
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod client_tests;
