// SPDX-License-Identifier: Apache-2.0

//! Rescue finalisation: persist the hashed rescue password and stop the
//! API so the rescue network never sees it.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::FutureExt;
use serde_json::Value;
use tracing::{debug, info};

use ira_core::{Params, RestError};
use ira_hardware::shell;

use crate::state::AgentState;

use super::{optional_param, unknown_command, AgentExtension, CommandReply};

/// Where the rescue environment picks the password hash up after the agent
/// exits. The only file the agent ever persists.
pub const RESCUE_PASSWORD_FILE: &str = "/etc/ipa-rescue-config/ipa-rescue-password";

/// Produces a crypt(3)-format hash for /etc/shadow consumption.
#[async_trait]
pub trait PasswordHasher: Send + Sync {
    async fn hash(&self, password: &str) -> Result<String, RestError>;
}

/// SHA-512 crypt via the host's openssl, the way the ramdisk images ship it.
pub struct CryptHasher;

#[async_trait]
impl PasswordHasher for CryptHasher {
    async fn hash(&self, password: &str) -> Result<String, RestError> {
        let output = shell::execute_with_stdin("openssl", &["passwd", "-6", "-stdin"], password)
            .await
            .map_err(|e| {
                RestError::command_execution(format!("hashing rescue password failed: {e}"))
            })?;
        Ok(output.stdout.trim().to_string())
    }
}

pub struct RescueExtension {
    state: Arc<AgentState>,
    password_file: PathBuf,
    hasher: Arc<dyn PasswordHasher>,
}

impl RescueExtension {
    pub fn new(state: Arc<AgentState>) -> Self {
        Self {
            state,
            password_file: PathBuf::from(RESCUE_PASSWORD_FILE),
            hasher: Arc::new(CryptHasher),
        }
    }

    pub fn with_password_file(mut self, path: PathBuf) -> Self {
        self.password_file = path;
        self
    }

    pub fn with_hasher(mut self, hasher: Arc<dyn PasswordHasher>) -> Self {
        self.hasher = hasher;
        self
    }
}

impl AgentExtension for RescueExtension {
    fn name(&self) -> &'static str {
        "rescue"
    }

    fn command(&self, method: &str, params: &Params) -> Result<CommandReply, RestError> {
        match method {
            "finalize_rescue" => {
                let password: String =
                    optional_param(params, "rescue_password")?.unwrap_or_default();
                let state = Arc::clone(&self.state);
                let hasher = Arc::clone(&self.hasher);
                let path = self.password_file.clone();
                Ok(CommandReply::Sync(
                    async move {
                        debug!(path = %path.display(), "writing hashed rescue password");
                        let hashed = hasher.hash(&password).await?;
                        if let Some(parent) = path.parent() {
                            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                                RestError::command_execution(format!(
                                    "creating rescue config dir failed: {e}"
                                ))
                            })?;
                        }
                        tokio::fs::write(&path, format!("{hashed}\n")).await.map_err(|e| {
                            RestError::command_execution(format!(
                                "writing the hashed rescue password failed: {e}"
                            ))
                        })?;
                        // The API must not stay reachable from the rescue network.
                        info!("rescue finalised, stopping the API");
                        state.stop_serving();
                        Ok(Value::Null)
                    }
                    .boxed(),
                ))
            }
            _ => Err(unknown_command(self.name(), method)),
        }
    }
}

#[cfg(test)]
#[path = "rescue_tests.rs"]
mod rescue_tests;
