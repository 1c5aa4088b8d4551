//! Application layer use cases for antscan.
//!
//! Use cases in this layer orchestrate the domain types from `antscan_core`
//! and depend only on traits for anything that touches the network.  The
//! TCP client and the ping probe are injected at construction time, so the
//! whole scan pipeline can be unit-tested with in-memory doubles.
//!
//! # Sub-modules
//!
//! - **`events`** – What a scan reports to the outside world (records and
//!   gateway statuses) and the [`events::ScanEventSink`] seam that receives
//!   them.
//!
//! - **`aggregate_telemetry`** – The per-session store that pairs each
//!   address's `stats` and `pools` documents and emits one record per
//!   device.
//!
//! - **`run_scan`** – The orchestrator: expands groups, probes gateways, and
//!   runs device queries under a fixed worker budget.

pub mod aggregate_telemetry;
pub mod events;
pub mod run_scan;
