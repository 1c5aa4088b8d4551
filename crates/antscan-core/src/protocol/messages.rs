//! Device API command kinds and decoded telemetry documents.
//!
//! Mining rigs running cgminer/bmminer-derived firmware answer JSON commands
//! on TCP port 4028.  antscan issues two of them per device:
//!
//! | Command | Top-level key | Used for                                  |
//! |---------|---------------|-------------------------------------------|
//! | `stats` | `STATS`       | model, hashrates, frequency, uptime       |
//! | `pools` | `POOLS`       | configured pool URLs and worker names     |
//!
//! Both answers are kept as opaque JSON.  Firmware versions disagree about
//! field types (`"GHS av"` is a string on some models and a float on others)
//! so values are only interpreted when a record is built, through
//! [`DeviceDocument::field`].

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// TCP port of the device API.
pub const DEFAULT_API_PORT: u16 = 4028;

/// The two commands antscan sends to every device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandKind {
    Stats,
    Pools,
}

impl CommandKind {
    /// Both kinds, in the order they are issued for an address.
    pub const ALL: [CommandKind; 2] = [CommandKind::Stats, CommandKind::Pools];

    /// The command string sent on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            CommandKind::Stats => "stats",
            CommandKind::Pools => "pools",
        }
    }

    /// The top-level key holding the response array.
    pub fn section_key(self) -> &'static str {
        match self {
            CommandKind::Stats => "STATS",
            CommandKind::Pools => "POOLS",
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One decoded response: the command that produced it plus its JSON payload.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceDocument {
    kind: CommandKind,
    payload: Value,
}

impl DeviceDocument {
    pub fn new(kind: CommandKind, payload: Value) -> Self {
        Self { kind, payload }
    }

    pub fn kind(&self) -> CommandKind {
        self.kind
    }

    /// Returns the array under the kind's section key.
    ///
    /// A missing key, or a key that does not hold an array, yields an empty
    /// slice.
    pub fn section(&self) -> &[Value] {
        self.payload
            .get(self.kind.section_key())
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Returns the object at `index` in the section, if there is one.
    pub fn entry(&self, index: usize) -> Option<&Map<String, Value>> {
        self.section().get(index).and_then(Value::as_object)
    }

    /// Returns `name` from the section entry at `index` rendered as text.
    ///
    /// Fallback is the empty string when the entry or the field is absent, or
    /// when the field is `null`.  Strings are returned verbatim, numbers and
    /// booleans in their JSON spelling, nested values as compact JSON.
    pub fn field(&self, index: usize, name: &str) -> String {
        self.entry(index)
            .and_then(|entry| entry.get(name))
            .map(scalar_text)
            .unwrap_or_default()
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
