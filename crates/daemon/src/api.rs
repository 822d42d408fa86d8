// SPDX-License-Identifier: Apache-2.0

//! The agent's HTTP surface.
//!
//! A small REST API under `/v1`: status, the command ledger, and command
//! submission. Token enforcement happens here, before the dispatcher is
//! ever involved; errors render as `{faultcode, faultstring, …}` objects
//! with the kind's HTTP status.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::info;
use warp::http::header::CONTENT_TYPE;
use warp::http::{Response, StatusCode};
use warp::Filter;

use ira_core::RestError;

use crate::config::Config;
use crate::dispatch::CommandExecutor;
use crate::state::AgentState;

/// Static banner served on `/`.
pub const API_NAME: &str = "OpenStack Ironic Python Agent API";

/// Everything the request handlers need.
pub struct ApiContext {
    pub executor: Arc<CommandExecutor>,
    pub state: Arc<AgentState>,
    pub started_at: f64,
    pub version: String,
}

#[derive(Debug, Deserialize)]
struct CommandQuery {
    wait: Option<String>,
    agent_token: Option<String>,
}

fn wants_wait(query: &CommandQuery) -> bool {
    query.wait.as_deref().is_some_and(|w| w.eq_ignore_ascii_case("true"))
}

/// Build the filter tree for the agent API.
pub fn routes(
    ctx: Arc<ApiContext>,
) -> impl Filter<Extract = (Response<String>,), Error = warp::Rejection> + Clone {
    let with_ctx = {
        let ctx = Arc::clone(&ctx);
        warp::any().map(move || Arc::clone(&ctx))
    };

    let banner = warp::get()
        .and(warp::path::end())
        .map(|| json_reply(StatusCode::OK, &json!({ "name": API_NAME })));

    let v1_index = warp::get().and(warp::path("v1")).and(warp::path::end()).map(|| {
        json_reply(
            StatusCode::OK,
            &json!({
                "name": API_NAME,
                "links": [
                    {"href": "/v1/status", "rel": "status"},
                    {"href": "/v1/commands", "rel": "commands"},
                ],
            }),
        )
    });

    let status = warp::get()
        .and(warp::path!("v1" / "status"))
        .and(with_ctx.clone())
        .map(|ctx: Arc<ApiContext>| {
            json_reply(
                StatusCode::OK,
                &json!({ "started_at": ctx.started_at, "version": ctx.version }),
            )
        });

    let list_commands = warp::get()
        .and(warp::path!("v1" / "commands"))
        .and(with_ctx.clone())
        .map(|ctx: Arc<ApiContext>| {
            let commands: Vec<Value> =
                ctx.executor.list().iter().map(|record| record.serialize()).collect();
            json_reply(StatusCode::OK, &json!({ "commands": commands }))
        });

    let get_command = warp::get()
        .and(warp::path!("v1" / "commands" / String))
        .and(warp::query::<CommandQuery>())
        .and(with_ctx.clone())
        .and_then(handle_get_command);

    let post_command = warp::post()
        .and(warp::path!("v1" / "commands"))
        .and(warp::query::<CommandQuery>())
        .and(warp::body::json::<Value>())
        .and(with_ctx)
        .and_then(handle_post_command);

    banner
        .or(v1_index)
        .unify()
        .or(status)
        .unify()
        .or(list_commands)
        .unify()
        .or(get_command)
        .unify()
        .or(post_command)
        .unify()
}

async fn handle_get_command(
    id: String,
    query: CommandQuery,
    ctx: Arc<ApiContext>,
) -> Result<Response<String>, Infallible> {
    let record = match ctx.executor.get(&id) {
        Ok(record) => record,
        Err(err) => return Ok(error_reply(&err)),
    };
    if wants_wait(&query) {
        record.wait(None).await;
    }
    Ok(json_reply(StatusCode::OK, &record.serialize()))
}

async fn handle_post_command(
    query: CommandQuery,
    body: Value,
    ctx: Arc<ApiContext>,
) -> Result<Response<String>, Infallible> {
    let Some(obj) = body.as_object() else {
        return Ok(error_reply(&RestError::invalid_command("request body must be a JSON object")));
    };
    let Some(name) = obj.get("name").and_then(Value::as_str) else {
        return Ok(error_reply(&RestError::invalid_command("command name is required")));
    };
    let params = match obj.get("params") {
        Some(Value::Object(params)) => params.clone(),
        _ => {
            return Ok(error_reply(&RestError::invalid_command(
                "command params are required and must be an object",
            )))
        }
    };

    // Token gate: in params or the query string, checked before dispatch.
    let presented =
        params.get("agent_token").and_then(Value::as_str).or(query.agent_token.as_deref());
    if !ctx.state.validate_token(presented) {
        return Ok(unauthorized_reply());
    }

    let record = match ctx.executor.execute(name, params).await {
        Ok(record) => record,
        Err(err) => return Ok(error_reply(&err)),
    };
    if wants_wait(&query) {
        record.wait(None).await;
    }
    Ok(json_reply(StatusCode::OK, &record.serialize()))
}

/// Serve the API until the serve flag drops. TLS is a configuration
/// concern; the routes are identical either way.
pub async fn serve(ctx: Arc<ApiContext>, config: &Config) -> Result<(), RestError> {
    let addr = SocketAddr::new(config.listen_host, config.listen_port);
    let mut shutdown = ctx.state.serve_signal();
    let signal = async move {
        while *shutdown.borrow() {
            if shutdown.changed().await.is_err() {
                break;
            }
        }
    };
    let filter = routes(Arc::clone(&ctx));

    if config.listen_tls {
        let (cert, key) = match (&config.tls_cert_file, &config.tls_key_file) {
            (Some(cert), Some(key)) => (cert.clone(), key.clone()),
            _ => {
                return Err(RestError::command_execution(
                    "TLS requested but certificate or key path is missing",
                ))
            }
        };
        let (bound, server) = warp::serve(filter)
            .tls()
            .cert_path(cert)
            .key_path(key)
            .bind_with_graceful_shutdown(addr, signal);
        info!(%bound, "serving agent API over TLS");
        server.await;
    } else {
        let (bound, server) = warp::serve(filter)
            .try_bind_with_graceful_shutdown(addr, signal)
            .map_err(|e| RestError::command_execution(format!("cannot bind API socket: {e}")))?;
        info!(%bound, "serving agent API");
        server.await;
    }
    info!("agent API stopped");
    Ok(())
}

/// Encode a reply the way the director expects: pretty-printed JSON with a
/// trailing newline and an explicit charset.
fn json_reply(status: StatusCode, body: &Value) -> Response<String> {
    let mut text = serde_json::to_string_pretty(body).unwrap_or_else(|_| "{}".to_string());
    text.push('\n');
    let response = Response::builder()
        .status(status)
        .header(CONTENT_TYPE, "application/json; charset=utf-8")
        .body(text.clone());
    response.unwrap_or_else(|_| {
        let mut fallback = Response::new(text);
        *fallback.status_mut() = status;
        fallback
    })
}

/// `RestError` rendered at the boundary.
fn error_reply(err: &RestError) -> Response<String> {
    let status = StatusCode::from_u16(err.code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let faultcode = if err.code() >= 500 { "Server" } else { "Client" };
    let mut body = Map::new();
    body.insert("faultcode".into(), Value::String(faultcode.to_string()));
    body.insert("faultstring".into(), Value::String(err.to_string()));
    if let Value::Object(fields) = err.serialize() {
        for (key, value) in fields {
            body.insert(key, value);
        }
    }
    json_reply(status, &Value::Object(body))
}

fn unauthorized_reply() -> Response<String> {
    json_reply(
        StatusCode::UNAUTHORIZED,
        &json!({
            "faultcode": "Client",
            "faultstring": "Invalid or missing agent token",
        }),
    )
}

#[cfg(test)]
#[path = "api_tests.rs"]
mod api_tests;
