//! Integration tests for the antscan-core public API.
//!
//! These tests take raw bytes as a device would send them, decode them with
//! the codec, and flatten the resulting documents into a record, exercising
//! the codec, document accessors and record mapping together.

use std::net::Ipv4Addr;

use antscan_core::{
    decode_response, encode_request, expand, CommandKind, DeviceRecord, ProtocolError, ScanGroup,
    RECORD_COLUMNS,
};

/// Appends the firmware's trailing NUL to a JSON body.
fn device_bytes(body: &str) -> Vec<u8> {
    let mut raw = body.as_bytes().to_vec();
    raw.push(0);
    raw
}

#[test]
fn test_worked_example_produces_expected_record() {
    // Arrange: responses as an S9 sends them
    let stats_raw = device_bytes(
        r#"{"STATS":[{"Type":"AntminerS9"},{"GHS av":"13500","GHS 5s":"13600","total_freqavg":"631","miner_version":"1.0","Elapsed":"3600"}]}"#,
    );
    let pools_raw =
        device_bytes(r#"{"POOLS":[{"URL":"stratum+tcp://pool1"},{"User":"worker.1"}]}"#);

    // Act
    let stats = decode_response(CommandKind::Stats, &stats_raw).expect("stats decode");
    let pools = decode_response(CommandKind::Pools, &pools_raw).expect("pools decode");
    let record = DeviceRecord::from_documents(Ipv4Addr::new(10, 4, 101, 5), &stats, &pools);

    // Assert
    let expected = [
        "10.4.101.5",
        "AntminerS9",
        "13500",
        "13600",
        "631",
        "1.0",
        "stratum+tcp://pool1",
        "worker.1",
        "3600",
    ];
    assert_eq!(record.values(), expected.map(String::from));
}

#[test]
fn test_numeric_firmware_fields_are_rendered_as_text() {
    let stats_raw = device_bytes(
        r#"{"STATUS":[{"STATUS":"S"}],"STATS":[{"Type":"Antminer S19j Pro"},{"GHS av":104213.57,"GHS 5s":"103950.12","total_freqavg":545.0,"miner_version":"uart_trans.1.3","Elapsed":95122}],"id":1}"#,
    );
    let pools_raw = device_bytes(
        r#"{"POOLS":[{"POOL":0,"URL":"stratum+tcp://a:3333","User":"acct.w1"},{"POOL":1,"URL":"stratum+tcp://b:3333","User":"acct.w2"},{"POOL":2,"URL":"","User":""}],"id":1}"#,
    );

    let stats = decode_response(CommandKind::Stats, &stats_raw).unwrap();
    let pools = decode_response(CommandKind::Pools, &pools_raw).unwrap();
    let record = DeviceRecord::from_documents(Ipv4Addr::new(10, 4, 102, 17), &stats, &pools);

    assert_eq!(record.ghs_avg, "104213.57");
    assert_eq!(record.freq_avg, "545.0");
    assert_eq!(record.elapsed, "95122");
    assert_eq!(record.pool_url, "stratum+tcp://a:3333");
    assert_eq!(record.pool_user, "acct.w2");
}

#[test]
fn test_truncated_response_is_a_decode_error() {
    let raw = device_bytes(r#"{"STATS":[{"Type":"Antmin"#);
    assert!(matches!(
        decode_response(CommandKind::Stats, &raw),
        Err(ProtocolError::InvalidJson(_))
    ));
}

#[test]
fn test_requests_for_both_kinds_differ_only_in_command() {
    let stats = String::from_utf8(encode_request(CommandKind::Stats)).unwrap();
    let pools = String::from_utf8(encode_request(CommandKind::Pools)).unwrap();
    assert_eq!(stats.replace("stats", "pools"), pools);
}

#[test]
fn test_group_addresses_match_expected_counts() {
    let group = ScanGroup::new(
        "container-7",
        ["10.4.101.0/24", "10.4.102.1-50", "10.4.103", "bogus"],
    );

    let addrs = group.addresses();

    assert_eq!(addrs.len(), 254 + 50 + 255);
    assert_eq!(expand("10.4.102.1-50").len(), 50);
}

#[test]
fn test_record_columns_match_legacy_export_header() {
    assert_eq!(
        RECORD_COLUMNS.join(","),
        "IP,Type,GHS av,GHS 5s,total_freqavg,miner_version,Pool,User,Elapsed"
    );
}
