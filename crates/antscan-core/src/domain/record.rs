//! The flattened per-device record.
//!
//! A record is built from one `stats` and one `pools` document.  Fields are
//! picked by array position, following how the firmware lays out its
//! answers:
//!
//! ```text
//! STATS[0]  version block      → Type
//! STATS[1]  miner block        → GHS av, GHS 5s, total_freqavg, miner_version, Elapsed
//! POOLS[0]  first pool slot    → URL
//! POOLS[1]  second pool slot   → User
//! ```
//!
//! Rigs report a varying number of pool slots, and some omit the miner block
//! while booting.  Every lookup therefore falls back to an empty string; a
//! partial record is still worth showing.

use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

use crate::protocol::messages::{CommandKind, DeviceDocument};

/// Column titles, in the order of [`DeviceRecord::values`].
pub const RECORD_COLUMNS: [&str; 9] = [
    "IP",
    "Type",
    "GHS av",
    "GHS 5s",
    "total_freqavg",
    "miner_version",
    "Pool",
    "User",
    "Elapsed",
];

const VERSION_BLOCK: usize = 0;
const MINER_BLOCK: usize = 1;
const PRIMARY_POOL: usize = 0;
const SECONDARY_POOL: usize = 1;

/// Display-ready telemetry for one device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub address: Ipv4Addr,
    pub device_type: String,
    pub ghs_avg: String,
    pub ghs_5s: String,
    pub freq_avg: String,
    pub firmware_version: String,
    pub pool_url: String,
    pub pool_user: String,
    pub elapsed: String,
}

impl DeviceRecord {
    /// Builds a record from a device's two documents.
    ///
    /// The documents are read by position, never by kind, so passing them in
    /// swapped order is a caller bug; a debug assertion catches it.
    pub fn from_documents(address: Ipv4Addr, stats: &DeviceDocument, pools: &DeviceDocument) -> Self {
        debug_assert_eq!(stats.kind(), CommandKind::Stats);
        debug_assert_eq!(pools.kind(), CommandKind::Pools);

        Self {
            address,
            device_type: stats.field(VERSION_BLOCK, "Type"),
            ghs_avg: stats.field(MINER_BLOCK, "GHS av"),
            ghs_5s: stats.field(MINER_BLOCK, "GHS 5s"),
            freq_avg: stats.field(MINER_BLOCK, "total_freqavg"),
            firmware_version: stats.field(MINER_BLOCK, "miner_version"),
            pool_url: pools.field(PRIMARY_POOL, "URL"),
            pool_user: pools.field(SECONDARY_POOL, "User"),
            elapsed: stats.field(MINER_BLOCK, "Elapsed"),
        }
    }

    /// Returns the record as nine ordered strings matching [`RECORD_COLUMNS`].
    pub fn values(&self) -> [String; 9] {
        [
            self.address.to_string(),
            self.device_type.clone(),
            self.ghs_avg.clone(),
            self.ghs_5s.clone(),
            self.freq_avg.clone(),
            self.firmware_version.clone(),
            self.pool_url.clone(),
            self.pool_user.clone(),
            self.elapsed.clone(),
        ]
    }
}
