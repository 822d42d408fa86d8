// SPDX-License-Identifier: Apache-2.0

//! Background liveness loop.
//!
//! One task owns all heartbeating, so beats never overlap. The schedule is
//! pure state: jittered nominal interval after success, exponential backoff
//! after errors, an escalating pause after director conflicts. A forced
//! beat rings a `Notify`; forces arriving while a beat is in flight
//! coalesce into a single immediate re-beat.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use ira_core::RestError;
use ira_ironic::APIClient;

use crate::state::AgentState;

/// Jitter multipliers applied to the nominal heartbeat interval.
pub const MIN_JITTER_MULTIPLIER: f64 = 0.3;
pub const MAX_JITTER_MULTIPLIER: f64 = 0.6;

const INITIAL_DELAY: f64 = 1.0;
const MAX_DELAY: f64 = 300.0;
const BACKOFF_FACTOR: f64 = 2.7;

/// Pure scheduling state for the heartbeat loop.
#[derive(Debug)]
pub struct HeartbeatSchedule {
    error_delay: f64,
    conflict_pause: u64,
}

impl HeartbeatSchedule {
    pub fn new() -> Self {
        Self { error_delay: INITIAL_DELAY, conflict_pause: 0 }
    }

    /// Next interval after a successful beat: the nominal timeout scaled by
    /// the supplied jitter multiplier. Resets all backoff state.
    pub fn after_success(&mut self, heartbeat_timeout: u64, jitter: f64) -> Duration {
        self.error_delay = INITIAL_DELAY;
        self.conflict_pause = 0;
        Duration::from_secs_f64(heartbeat_timeout as f64 * jitter)
    }

    /// Next interval after a failed beat: exponential backoff capped at
    /// five minutes.
    pub fn after_error(&mut self) -> Duration {
        let delay = self.error_delay;
        self.error_delay = (self.error_delay * BACKOFF_FACTOR).min(MAX_DELAY);
        Duration::from_secs_f64(delay)
    }

    /// Next interval after a 409: the director wants us to slow down.
    pub fn after_conflict(&mut self) -> Duration {
        self.conflict_pause = match self.conflict_pause {
            0 => 5,
            5 => 10,
            _ => 30,
        };
        Duration::from_secs(self.conflict_pause)
    }
}

impl Default for HeartbeatSchedule {
    fn default() -> Self {
        Self::new()
    }
}

/// A uniform jitter multiplier in `[MIN_JITTER_MULTIPLIER, MAX_JITTER_MULTIPLIER)`.
pub fn sample_jitter() -> f64 {
    rand::thread_rng().gen_range(MIN_JITTER_MULTIPLIER..MAX_JITTER_MULTIPLIER)
}

/// Handle to the running heartbeater task.
pub struct Heartbeater {
    force: Arc<Notify>,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl Heartbeater {
    /// Start the loop. The first beat fires immediately.
    pub fn spawn(client: Arc<APIClient>, state: Arc<AgentState>, callback_url: String) -> Self {
        let force = Arc::new(Notify::new());
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_loop(
            client,
            state,
            callback_url,
            Arc::clone(&force),
            cancel.clone(),
        ));
        Self { force, cancel, handle }
    }

    /// The signal that shortens the next interval to ~0.
    pub fn force_signal(&self) -> Arc<Notify> {
        Arc::clone(&self.force)
    }

    pub fn force(&self) {
        self.force.notify_one();
    }

    /// Cancel the loop and wait for it to exit.
    pub async fn stop(self) {
        info!("stopping heartbeater");
        self.cancel.cancel();
        let _ = self.handle.await;
    }
}

async fn run_loop(
    client: Arc<APIClient>,
    state: Arc<AgentState>,
    callback_url: String,
    force: Arc<Notify>,
    cancel: CancellationToken,
) {
    info!("starting heartbeater");
    let mut schedule = HeartbeatSchedule::new();
    let mut interval = Duration::ZERO;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
            _ = force.notified() => {
                debug!("forced heartbeat");
            }
        }

        interval = match do_heartbeat(&client, &state, &callback_url).await {
            Ok(()) => {
                let next =
                    schedule.after_success(state.heartbeat_timeout(), sample_jitter());
                info!(interval = next.as_secs_f64(), "heartbeat successful, sleeping");
                next
            }
            Err(RestError::HeartbeatConflict { details }) => {
                let next = schedule.after_conflict();
                warn!(%details, pause = next.as_secs(), "heartbeat conflict, slowing down");
                next
            }
            Err(err) => {
                let next = schedule.after_error();
                error!(%err, retry_in = next.as_secs_f64(), "error sending heartbeat");
                next
            }
        };
    }
}

async fn do_heartbeat(
    client: &APIClient,
    state: &AgentState,
    callback_url: &str,
) -> Result<(), RestError> {
    let uuid = state.node_uuid().ok_or_else(|| RestError::Heartbeat {
        details: "tried to heartbeat without a node uuid".into(),
    })?;
    client.heartbeat(&uuid, callback_url, state.token(), None).await
}

#[cfg(test)]
#[path = "heartbeater_tests.rs"]
mod heartbeater_tests;
