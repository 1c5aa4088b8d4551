//! Infrastructure layer for the scanner.
//!
//! Contains the OS-facing adapters: device sockets, the system `ping`
//! utility, config file storage, and result writers.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `antscan_core`, but MUST NOT be imported by the `application` layer.

pub mod network;
pub mod report;
pub mod storage;
