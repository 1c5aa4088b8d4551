//! Gateway reachability through the system `ping` utility.
//!
//! Raw ICMP sockets need elevated privileges on most systems, while the
//! `ping` binary is installed setuid or with capabilities, so the probe
//! shells out.  One echo request, no retries.
//!
//! | Platform | Arguments           | Reply wait |
//! |----------|---------------------|------------|
//! | Windows  | `-n 1 -w 1000`      | ms         |
//! | macOS    | `-c 1 -W 1000`      | ms         |
//! | other    | `-c 1 -W 1`         | seconds    |
//!
//! The child is additionally bounded by an outer timeout and killed if it
//! overruns.  A missing binary, a spawn failure, a non-zero exit and an
//! overrun all mean [`GatewayStatus::Unreachable`].

use std::net::Ipv4Addr;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::application::events::GatewayStatus;
use crate::application::run_scan::ReachabilityProbe;

/// Default outer bound for one ping.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(3);

/// Probes with a single `ping`.
#[derive(Debug, Clone)]
pub struct PingProbe {
    timeout: Duration,
}

impl Default for PingProbe {
    fn default() -> Self {
        Self::new(DEFAULT_PROBE_TIMEOUT)
    }
}

impl PingProbe {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// Command-line arguments for one echo request to `address`.
fn ping_args(address: Ipv4Addr) -> Vec<String> {
    #[cfg(target_os = "windows")]
    let flags = ["-n", "1", "-w", "1000"];

    #[cfg(target_os = "macos")]
    let flags = ["-c", "1", "-W", "1000"];

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    let flags = ["-c", "1", "-W", "1"];

    flags
        .iter()
        .map(|s| s.to_string())
        .chain(std::iter::once(address.to_string()))
        .collect()
}

#[async_trait]
impl ReachabilityProbe for PingProbe {
    async fn probe(&self, address: Ipv4Addr) -> GatewayStatus {
        let mut command = Command::new("ping");
        command
            .args(ping_args(address))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        let success = match tokio::time::timeout(self.timeout, command.status()).await {
            Ok(Ok(status)) => status.success(),
            Ok(Err(e)) => {
                debug!(%address, error = %e, "could not run ping");
                false
            }
            Err(_) => {
                debug!(%address, timeout = ?self.timeout, "ping overran its deadline");
                false
            }
        };
        GatewayStatus::from_success(success)
    }
}
