//! Scan groups: the unit an operator selects and scans.
//!
//! A group (a "container" in the field) is a name, the range expressions
//! covering its rigs, and optionally the address of the gateway in front of
//! them.  Groups are owned by the persistence layer and are read-only during
//! a scan pass.

use std::collections::BTreeSet;
use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

use crate::domain::range::expand_all;

/// A named set of range expressions plus an optional gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanGroup {
    /// Display name, unique within a configuration.
    pub name: String,
    /// Range expressions in the order the operator entered them.
    #[serde(default)]
    pub ip_ranges: Vec<String>,
    /// Gateway whose reachability is reported before the group is scanned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway: Option<Ipv4Addr>,
}

impl ScanGroup {
    /// Creates a group without a gateway.
    pub fn new<I, S>(name: impl Into<String>, ip_ranges: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            ip_ranges: ip_ranges.into_iter().map(Into::into).collect(),
            gateway: None,
        }
    }

    /// Sets the gateway address.
    pub fn with_gateway(mut self, gateway: Ipv4Addr) -> Self {
        self.gateway = Some(gateway);
        self
    }

    /// Returns every address covered by the group, deduplicated.
    pub fn addresses(&self) -> BTreeSet<Ipv4Addr> {
        expand_all(&self.ip_ranges)
    }
}

/// Splits a comma-separated list of range expressions as typed by an operator.
///
/// Entries are trimmed and empty entries are dropped, so `"10.0.0, ,10.0.1"`
/// yields two expressions.
pub fn split_range_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_group_has_no_gateway() {
        let group = ScanGroup::new("c1", ["10.0.0.1-5"]);
        assert_eq!(group.name, "c1");
        assert_eq!(group.ip_ranges, vec!["10.0.0.1-5".to_string()]);
        assert!(group.gateway.is_none());
    }

    #[test]
    fn test_with_gateway_sets_gateway() {
        let gw = Ipv4Addr::new(10, 0, 0, 1);
        let group = ScanGroup::new("c1", ["10.0.0"]).with_gateway(gw);
        assert_eq!(group.gateway, Some(gw));
    }

    #[test]
    fn test_addresses_deduplicates_across_ranges() {
        // Arrange: second range overlaps the first on .3 – .5
        let group = ScanGroup::new("c1", ["10.0.0.1-5", "10.0.0.3-8"]);

        // Act
        let addrs = group.addresses();

        // Assert
        assert_eq!(addrs.len(), 8);
    }

    #[test]
    fn test_addresses_of_group_with_only_bad_ranges_is_empty() {
        let group = ScanGroup::new("broken", ["10.4", "x.y.z"]);
        assert!(group.addresses().is_empty());
    }

    #[test]
    fn test_split_range_list_trims_and_drops_empty_entries() {
        let ranges = split_range_list(" 10.4.101.0/24 , ,10.4.102.1-50,");
        assert_eq!(ranges, vec!["10.4.101.0/24", "10.4.102.1-50"]);
    }

    #[test]
    fn test_group_without_gateway_omits_field_when_serialized() {
        let json = serde_json::to_string(&ScanGroup::new("c1", ["10.0.0"])).unwrap();
        assert!(!json.contains("gateway"));
    }
}
