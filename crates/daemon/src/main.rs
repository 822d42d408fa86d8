// SPDX-License-Identifier: Apache-2.0

//! The `ira` binary: an in-RAM bare-metal provisioning agent.

use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use ira_daemon::config::{Cli, Config};
use ira_daemon::Agent;

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut config = Config::from_cli(Cli::parse());
    if let Ok(cmdline) = std::fs::read_to_string("/proc/cmdline") {
        config.apply_kernel_cmdline(&cmdline);
    }

    let mut agent = match Agent::bootstrap(config, None).await {
        Ok(agent) => agent,
        Err(err) => {
            error!(%err, "agent failed to start");
            std::process::exit(1);
        }
    };
    if let Err(err) = agent.run().await {
        // Unrecoverable: external machinery reboots the ramdisk.
        error!(%err, "agent exited with an error");
        std::process::exit(1);
    }
}
