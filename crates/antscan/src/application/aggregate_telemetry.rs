//! TelemetryAggregator: correlates the two documents of each device.
//!
//! Every address is queried twice, once per [`CommandKind`], and the two
//! answers arrive in any order from different worker tasks.  The aggregator
//! keeps a per-address accumulator until both halves are present, then turns
//! them into a [`DeviceRecord`] and hands it to the sink.
//!
//! # Lifecycle of one address
//!
//! ```text
//!   submit(stats)          submit(pools)
//!        │                      │
//!        ▼                      ▼
//!   ┌──────────┐  ──────►  ┌──────────┐  ──►  entry removed  ──►  sink.record_ready
//!   │ stats: ✓ │           │ stats: ✓ │       (under lock)         (outside lock)
//!   │ pools: – │           │ pools: ✓ │
//!   └──────────┘           └──────────┘
//! ```
//!
//! Because the entry is removed in the same critical section that completes
//! it, a second pair of submissions for the same address starts over with a
//! fresh accumulator and can never complete the first one twice.
//!
//! One aggregator lives for exactly one scan pass.  Addresses that only ever
//! got one document stay in the map and are reported by [`TelemetryAggregator::drain`].

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex, PoisonError};

use antscan_core::{CommandKind, DeviceDocument, DeviceRecord};
use tracing::trace;

use crate::application::events::ScanEventSink;

/// Accumulator for one address.
#[derive(Debug, Default)]
struct PartialDeviceState {
    stats: Option<DeviceDocument>,
    pools: Option<DeviceDocument>,
}

impl PartialDeviceState {
    fn set(&mut self, document: DeviceDocument) {
        match document.kind() {
            CommandKind::Stats => self.stats = Some(document),
            CommandKind::Pools => self.pools = Some(document),
        }
    }

    fn is_complete(&self) -> bool {
        self.stats.is_some() && self.pools.is_some()
    }

    fn into_pair(self) -> Option<(DeviceDocument, DeviceDocument)> {
        Some((self.stats?, self.pools?))
    }
}

/// Thread-safe merge point for one scan session.
pub struct TelemetryAggregator {
    pending: Mutex<HashMap<Ipv4Addr, PartialDeviceState>>,
    sink: Arc<dyn ScanEventSink>,
}

impl TelemetryAggregator {
    pub fn new(sink: Arc<dyn ScanEventSink>) -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
            sink,
        }
    }

    /// Stores `document` for `address`, emitting the record if this completes it.
    ///
    /// A second document of the same kind replaces the first.  Returns `true`
    /// when this call emitted a record.
    pub fn submit(&self, address: Ipv4Addr, document: DeviceDocument) -> bool {
        let completed = {
            let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
            let state = pending.entry(address).or_default();
            state.set(document);
            if state.is_complete() {
                pending.remove(&address).and_then(PartialDeviceState::into_pair)
            } else {
                None
            }
        };

        match completed {
            Some((stats, pools)) => {
                let record = DeviceRecord::from_documents(address, &stats, &pools);
                trace!(%address, "device record complete");
                self.sink.record_ready(record);
                true
            }
            None => false,
        }
    }

    /// Empties the session, returning the addresses that never completed.
    ///
    /// The returned addresses are sorted.
    pub fn drain(&self) -> Vec<Ipv4Addr> {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        let mut leftovers: Vec<Ipv4Addr> = pending.drain().map(|(addr, _)| addr).collect();
        leftovers.sort_unstable();
        leftovers
    }

    /// Number of addresses currently holding exactly one document.
    pub fn pending_len(&self) -> usize {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}
