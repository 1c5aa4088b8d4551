//! Storage infrastructure: configuration file persistence.
//!
//! The `config` sub-module reads and writes the TOML file holding scanner
//! settings and the operator's scan groups, falls back to defaults on first
//! run, and imports the older JSON container file.

pub mod config;
