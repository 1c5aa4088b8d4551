//! Scan events and the sink that receives them.
//!
//! A scan produces two kinds of output: one [`DeviceRecord`] per device that
//! answered both commands, and one [`GatewayStatus`] per group that has a
//! gateway configured.  Both go to a [`ScanEventSink`] injected into the
//! orchestrator.
//!
//! The production sink is the sending half of a Tokio channel; the
//! presentation layer drains the receiving half at its own pace, so a slow
//! terminal never holds up the scan.

use std::fmt;
use std::net::Ipv4Addr;

use antscan_core::DeviceRecord;
use tokio::sync::mpsc;
use tracing::debug;

/// Result of a single reachability check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayStatus {
    Reachable,
    Unreachable,
}

impl GatewayStatus {
    pub fn from_success(success: bool) -> Self {
        if success {
            GatewayStatus::Reachable
        } else {
            GatewayStatus::Unreachable
        }
    }

    pub fn is_reachable(self) -> bool {
        self == GatewayStatus::Reachable
    }
}

impl fmt::Display for GatewayStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GatewayStatus::Reachable => f.write_str("reachable"),
            GatewayStatus::Unreachable => f.write_str("unreachable"),
        }
    }
}

/// Everything a scan reports.
#[derive(Debug, Clone, PartialEq)]
pub enum ScanEvent {
    /// Both documents arrived for a device and were merged.
    Record(DeviceRecord),
    /// A group's gateway was probed.
    Gateway {
        group: String,
        gateway: Ipv4Addr,
        status: GatewayStatus,
    },
}

/// Receiver of scan output.
///
/// Implementations must return quickly; they are called from the worker
/// tasks that run device queries.
pub trait ScanEventSink: Send + Sync {
    /// Called exactly once per device that completed in the session.
    fn record_ready(&self, record: DeviceRecord);

    /// Called once per gateway probe.
    fn gateway_status(&self, group: &str, gateway: Ipv4Addr, status: GatewayStatus);
}

impl ScanEventSink for mpsc::UnboundedSender<ScanEvent> {
    fn record_ready(&self, record: DeviceRecord) {
        if self.send(ScanEvent::Record(record)).is_err() {
            debug!("scan event receiver dropped; record discarded");
        }
    }

    fn gateway_status(&self, group: &str, gateway: Ipv4Addr, status: GatewayStatus) {
        let event = ScanEvent::Gateway {
            group: group.to_string(),
            gateway,
            status,
        };
        if self.send(event).is_err() {
            debug!("scan event receiver dropped; gateway status discarded");
        }
    }
}
