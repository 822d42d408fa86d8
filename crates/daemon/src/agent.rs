// SPDX-License-Identifier: Apache-2.0

//! Agent lifecycle: wire the registry, the liaison, the dispatcher and the
//! API together, and run until a terminal command or a signal stops the
//! serve loop.

use std::sync::Arc;
use std::time::Duration;

use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info, warn};

use ira_core::{Clock, RestError, StepPhase, SystemClock};
use ira_hardware::{GenericHardwareManager, HardwareManager, Registry, StreamingImageWriter};
use ira_ironic::{APIClient, Discovery};

use crate::api::{self, ApiContext};
use crate::config::Config;
use crate::dispatch::CommandExecutor;
use crate::extensions::{
    AgentExtension, FakeExtension, PhaseExtension, PollExtension, RescueExtension, SystemExtension,
};
use crate::heartbeater::Heartbeater;
use crate::inspector;
use crate::netutils;
use crate::state::AgentState;

pub struct Agent {
    config: Config,
    registry: Arc<Registry>,
    state: Arc<AgentState>,
    executor: Arc<CommandExecutor>,
    started_at: f64,
}

impl Agent {
    /// Build the runtime: hardware registry, shared state, extensions.
    pub async fn bootstrap(
        mut config: Config,
        discovery: Option<Arc<dyn Discovery>>,
    ) -> Result<Self, RestError> {
        if config.hardware_initialization_delay > 0 {
            info!(
                seconds = config.hardware_initialization_delay,
                "waiting before hardware initialization"
            );
            tokio::time::sleep(Duration::from_secs(config.hardware_initialization_delay)).await;
        }

        if config.api_url.is_none() && !config.standalone {
            if let Some(discovery) = &discovery {
                let found = discovery.discover().await?;
                info!(api_url = %found.api_url, "director discovered");
                config.apply_overrides(&found.overrides);
                config.api_url = Some(found.api_url);
            }
        }

        let image_writer = Arc::new(StreamingImageWriter::new(
            Duration::from_secs(config.http_request_timeout),
            config.deep_image_inspection,
        )?);
        let managers: Vec<Arc<dyn HardwareManager>> =
            vec![Arc::new(GenericHardwareManager::new(image_writer))];
        let registry = Arc::new(Registry::build(managers).await?);

        let state = Arc::new(AgentState::new(config.standalone));
        if let Some(token) = &config.agent_token {
            state.set_token(token.clone());
        }

        let extensions: Vec<Arc<dyn AgentExtension>> = vec![
            Arc::new(PhaseExtension::new(StepPhase::Clean, Arc::clone(&registry))),
            Arc::new(PhaseExtension::new(StepPhase::Deploy, Arc::clone(&registry))),
            Arc::new(PhaseExtension::new(StepPhase::Service, Arc::clone(&registry))),
            Arc::new(SystemExtension::new(Arc::clone(&state))),
            Arc::new(RescueExtension::new(Arc::clone(&state))),
            Arc::new(PollExtension::new(Arc::clone(&state), Arc::clone(&registry))),
            Arc::new(FakeExtension),
        ];
        let executor = Arc::new(CommandExecutor::new(extensions));

        Ok(Self {
            config,
            registry,
            state,
            executor,
            started_at: SystemClock.epoch_secs(),
        })
    }

    pub fn state(&self) -> Arc<AgentState> {
        Arc::clone(&self.state)
    }

    pub fn executor(&self) -> Arc<CommandExecutor> {
        Arc::clone(&self.executor)
    }

    /// Run the agent to completion: inspection, lookup, heartbeating, and
    /// the API serve loop.
    pub async fn run(&mut self) -> Result<(), RestError> {
        spawn_signal_handler(Arc::clone(&self.state));

        // One-shot inspection first: its UUID seeds the lookup.
        let mut inspected_uuid = None;
        if !self.config.standalone {
            if let Some(url) = self.config.inspection_callback_url.clone() {
                let timeout = Duration::from_secs(self.config.http_request_timeout);
                match inspector::inspect(&url, &self.registry, timeout).await {
                    Ok(uuid) => inspected_uuid = uuid,
                    Err(err) => error!(%err, "inspection failed"),
                }
            }
        }

        let ctx = Arc::new(ApiContext {
            executor: Arc::clone(&self.executor),
            state: Arc::clone(&self.state),
            started_at: self.started_at,
            version: crate::AGENT_VERSION.to_string(),
        });

        if self.config.standalone {
            info!("running standalone, skipping lookup and heartbeats");
            return api::serve(ctx, &self.config).await;
        }

        let Some(api_url) = self.config.api_url.clone() else {
            if self.config.inspection_callback_url.is_some() {
                // Inspection-only ramdisk: nothing left to do.
                info!("no director configured, inspection-only run complete");
                return Ok(());
            }
            return Err(RestError::LookupNode {
                details: "no director URL configured or discovered".into(),
            });
        };

        netutils::wait_for_ipv4(&self.registry, 30, Duration::from_secs(2)).await;
        self.wait_for_disks().await;

        let advertise_host = match self.config.advertise_host.clone() {
            Some(host) => host,
            None => match self.config.network_interface.clone() {
                Some(interface) => {
                    netutils::interface_address(&self.registry, &interface).await?
                }
                None => {
                    netutils::resolve_advertise_host(
                        &api_url,
                        self.config.ip_lookup_attempts,
                        Duration::from_secs(self.config.ip_lookup_sleep),
                    )
                    .await?
                }
            },
        };
        let scheme = if self.config.listen_tls { "https" } else { "http" };
        let callback_url = format!(
            "{scheme}://{}:{}",
            netutils::wrap_ipv6(&advertise_host),
            self.config.advertise_port
        );

        let client = Arc::new(APIClient::new(
            &api_url,
            Duration::from_secs(self.config.http_request_timeout),
            crate::AGENT_VERSION,
        )?);

        let mut addresses = self.registry.list_hardware_info().await?.mac_addresses();
        if addresses.is_empty() {
            warn!("no MAC addresses found to look the node up with");
        }
        // The PXE boot interface is the most likely lookup match.
        if let Some(boot_mac) = &self.config.boot_mac {
            if let Some(position) = addresses.iter().position(|mac| mac.eq_ignore_ascii_case(boot_mac)) {
                addresses.swap(0, position);
            }
        }
        let lookup = client
            .lookup_node(
                &addresses,
                inspected_uuid.as_deref(),
                Duration::from_secs(self.config.lookup_timeout),
                Duration::from_secs(self.config.lookup_interval.max(1)),
            )
            .await?;
        self.config.apply_overrides(&lookup.config.overrides);
        self.registry.cache_node(lookup.node.clone());
        self.state.process_lookup_data(&lookup)?;

        let heartbeater =
            Heartbeater::spawn(Arc::clone(&client), Arc::clone(&self.state), callback_url);
        // Completed async commands shorten the next heartbeat.
        self.executor.set_completion_signal(heartbeater.force_signal());

        let served = api::serve(ctx, &self.config).await;

        heartbeater.stop().await;
        served
    }

    /// Block devices can lag hotplug at early boot; give them a bounded
    /// window to settle before the inventory goes out.
    async fn wait_for_disks(&self) {
        for _ in 0..self.config.disk_wait_attempts {
            let listed =
                self.registry.dispatch_to_managers("list_block_devices", &Default::default()).await;
            match listed {
                Ok(devices) if devices.as_array().is_some_and(|d| !d.is_empty()) => return,
                Ok(_) => {}
                Err(err) => warn!(%err, "cannot list block devices yet"),
            }
            tokio::time::sleep(Duration::from_secs(self.config.disk_wait_delay)).await;
        }
        warn!("proceeding without any visible block devices");
    }
}

/// SIGINT/SIGTERM stop the serve loop like a terminal command does.
fn spawn_signal_handler(state: Arc<AgentState>) {
    tokio::spawn(async move {
        let mut term = match signal(SignalKind::terminate()) {
            Ok(term) => term,
            Err(err) => {
                warn!(%err, "cannot install SIGTERM handler");
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => info!("interrupt received, shutting down"),
            _ = term.recv() => info!("termination signal received, shutting down"),
        }
        state.stop_serving();
    });
}

#[cfg(test)]
#[path = "agent_tests.rs"]
mod agent_tests;
