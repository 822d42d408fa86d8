// SPDX-License-Identifier: Apache-2.0

//! One-shot inspection: post the collected inventory to the inspection
//! collector and capture the node UUID it answers with.

use std::time::Duration;

use serde_json::{json, Value};
use tracing::info;

use ira_core::RestError;
use ira_hardware::Registry;

/// Run inspection against `callback_url`. Returns the node UUID when the
/// collector reports one; the UUID seeds the subsequent lookup.
pub async fn inspect(
    callback_url: &str,
    registry: &Registry,
    timeout: Duration,
) -> Result<Option<String>, RestError> {
    let inventory = registry.list_hardware_info().await?;

    let http = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| RestError::Inspection { details: format!("http client: {e}") })?;

    info!(callback_url, "posting inspection inventory");
    let response = http
        .post(callback_url)
        .json(&json!({ "inventory": inventory }))
        .send()
        .await
        .map_err(|e| RestError::Inspection { details: e.to_string() })?;

    let status = response.status();
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        return Err(RestError::Inspection {
            details: format!("inspection collector answered {status}: {text}"),
        });
    }

    // 204 or an empty body means the collector has nothing to tell us.
    let text = response.text().await.unwrap_or_default();
    if text.trim().is_empty() {
        return Ok(None);
    }
    let body: Value = serde_json::from_str(&text)
        .map_err(|e| RestError::Inspection { details: format!("malformed reply: {e}") })?;
    let uuid = body.get("uuid").and_then(Value::as_str).map(str::to_string);
    if let Some(uuid) = &uuid {
        info!(uuid = %uuid, "inspection determined the node");
    }
    Ok(uuid)
}

#[cfg(test)]
#[path = "inspector_tests.rs"]
mod inspector_tests;
