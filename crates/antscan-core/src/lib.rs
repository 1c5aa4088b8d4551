//! # antscan-core
//!
//! Shared library for antscan containing the address range expander, the
//! scan-group model, the device API codec, and the mapping from telemetry
//! documents to flat device records.
//!
//! It has zero dependencies on OS APIs, network sockets, or async runtimes.
//! The `antscan` crate wires these pieces to real TCP connections and the
//! system `ping` utility.
//!
//! # Architecture overview
//!
//! antscan polls mining rigs that expose the cgminer-style JSON API on TCP
//! port 4028.  For every address it asks two questions, `stats` and `pools`,
//! and merges the two answers into one [`DeviceRecord`].
//!
//! - **`domain`** – Pure data and rules: which addresses a range expression
//!   denotes ([`expand`]), what a scan group is ([`ScanGroup`]), and how two
//!   documents flatten into a record ([`DeviceRecord::from_documents`]).
//!
//! - **`protocol`** – How bytes travel to and from a device: the request
//!   encoding and the response decoding with the firmware's trailing
//!   sentinel byte.

pub mod domain;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `antscan_core::ScanGroup` instead of `antscan_core::domain::group::ScanGroup`.
pub use domain::group::ScanGroup;
pub use domain::range::{expand, expand_all};
pub use domain::record::{DeviceRecord, RECORD_COLUMNS};
pub use protocol::codec::{decode_response, encode_request, ProtocolError};
pub use protocol::messages::{CommandKind, DeviceDocument, DEFAULT_API_PORT};
