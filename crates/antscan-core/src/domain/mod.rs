//! Domain entities for antscan.
//!
//! This module contains pure logic with no infrastructure dependencies.
//! Everything here can be compiled and tested on any platform without a
//! network: range expansion is string arithmetic, and record mapping works
//! on already-decoded JSON values.

/// Scan groups: a name, its range expressions, and an optional gateway.
pub mod group;
/// Range expressions and their expansion into IPv4 addresses.
pub mod range;
/// The flattened per-device record built from two telemetry documents.
pub mod record;
