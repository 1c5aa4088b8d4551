//! Network infrastructure.
//!
//! # Sub-modules
//!
//! - **`device_client`** – Short-lived TCP connections to the device API on
//!   port 4028.  One connection per command, bounded by a single deadline
//!   covering connect, write and read.  Implements
//!   [`DeviceQuery`](crate::application::run_scan::DeviceQuery).
//!
//! - **`reachability`** – Gateway checks through the system `ping` utility.
//!   Implements [`ReachabilityProbe`](crate::application::run_scan::ReachabilityProbe).

pub mod device_client;
pub mod reachability;
