//! antscan entry point.
//!
//! Parses the command line, loads the config file, and wires the
//! infrastructure adapters into the scan orchestrator.
//!
//! # Architecture
//!
//! ```text
//! main()
//!  └─ load_config_from(path)        -- scanner settings + groups
//!  └─ init_tracing(log_level)       -- RUST_LOG wins over the config
//!  └─ scan
//!       ├─ ScanOrchestrator         (TcpDeviceClient, PingProbe, mpsc sink)
//!       ├─ printer task             (drains ScanEvents into a RecordWriter)
//!       └─ Ctrl-C handler           (cancels admission)
//! ```
//!
//! Records go to stdout; logs, gateway statuses and the summary go to
//! stderr, so `antscan scan --format csv > out.csv` produces a clean file.
//! `--format xlsx` refuses to write to a terminal.

use std::io::{self, IsTerminal};
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use antscan::application::events::{ScanEvent, ScanEventSink};
use antscan::application::run_scan::{DeviceQuery, ReachabilityProbe, ScanOrchestrator};
use antscan::infrastructure::network::device_client::TcpDeviceClient;
use antscan::infrastructure::network::reachability::PingProbe;
use antscan::infrastructure::report::{OutputFormat, RecordWriter, ReportError};
use antscan::infrastructure::storage::config::{
    config_file_path, import_legacy_containers, load_config_from, save_config_to, AppConfig,
};
use antscan_core::domain::group::split_range_list;
use antscan_core::{expand_all, ScanGroup};

/// Name of the group built from `--range` arguments.
const AD_HOC_GROUP: &str = "cli";

#[derive(Debug, Parser)]
#[command(name = "antscan", version, about = "Discover and poll mining rigs across address ranges")]
struct Cli {
    /// Config file to use instead of the platform default.
    #[arg(long, global = true, env = "ANTSCAN_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Scan configured groups and/or ad-hoc ranges.
    Scan(ScanArgs),
    /// Manage configured groups.
    #[command(subcommand)]
    Groups(GroupsCommand),
    /// Print the addresses a range expression covers.
    Expand {
        #[arg(required = true)]
        exprs: Vec<String>,
    },
}

#[derive(Debug, Args)]
struct ScanArgs {
    /// Configured group to scan (repeatable).  Defaults to every group.
    #[arg(short, long = "group")]
    groups: Vec<String>,

    /// Ad-hoc range expression (repeatable, comma-separated lists allowed).
    #[arg(short, long = "range")]
    ranges: Vec<String>,

    /// Gateway of the ad-hoc group.
    #[arg(long, requires = "ranges")]
    gateway: Option<Ipv4Addr>,

    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,

    /// Maximum concurrent device connections.
    #[arg(long, env = "ANTSCAN_MAX_IN_FLIGHT")]
    max_in_flight: Option<usize>,

    /// Deadline for one device query, in milliseconds.
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Device API port.
    #[arg(long)]
    port: Option<u16>,
}

#[derive(Debug, Subcommand)]
enum GroupsCommand {
    /// List configured groups.
    List,
    /// Add a group, replacing one with the same name.
    Add {
        name: String,
        /// Comma-separated range expressions.
        #[arg(long)]
        ranges: String,
        #[arg(long)]
        gateway: Option<Ipv4Addr>,
    },
    /// Remove a group.
    Remove { name: String },
    /// Merge groups from a legacy JSON container file.
    Import { path: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = match cli.config {
        Some(path) => path,
        None => config_file_path().context("no config path; pass --config")?,
    };
    let mut config = load_config_from(&config_path)
        .with_context(|| format!("loading config from {}", config_path.display()))?;

    init_tracing(&config.scanner.log_level);

    match cli.command {
        Command::Scan(args) => scan(&config, args).await,
        Command::Groups(command) => manage_groups(&mut config, &config_path, command),
        Command::Expand { exprs } => {
            let addresses = expand_all(&exprs);
            if addresses.is_empty() {
                warn!(?exprs, "expressions cover no addresses");
            }
            for address in addresses {
                println!("{address}");
            }
            Ok(())
        }
    }
}

fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

// ── scan ──────────────────────────────────────────────────────────────────────

async fn scan(config: &AppConfig, args: ScanArgs) -> Result<()> {
    let groups = select_groups(config, &args)?;
    if args.format.is_binary() && io::stdout().is_terminal() {
        bail!("XLSX output is binary; redirect stdout to a file");
    }

    let scanner = &config.scanner;
    let port = args.port.unwrap_or(scanner.api_port);
    let timeout = args
        .timeout_ms
        .map(Duration::from_millis)
        .unwrap_or_else(|| scanner.query_timeout());
    let max_in_flight = args.max_in_flight.unwrap_or(scanner.max_in_flight);

    let (tx, rx) = mpsc::unbounded_channel::<ScanEvent>();
    let orchestrator = ScanOrchestrator::new(
        Arc::new(TcpDeviceClient::new(port, timeout)) as Arc<dyn DeviceQuery>,
        Arc::new(PingProbe::new(scanner.probe_timeout())) as Arc<dyn ReachabilityProbe>,
        Arc::new(tx) as Arc<dyn ScanEventSink>,
        max_in_flight,
    );

    let writer = RecordWriter::new(args.format, io::stdout()).context("writing output header")?;
    let printer = tokio::spawn(print_events(rx, writer));

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received; waiting for in-flight queries");
            interrupt.cancel();
        }
    });

    info!(groups = groups.len(), port, ?timeout, max_in_flight, "scanning");
    let summary = orchestrator.run_scan(&groups, &cancel).await;

    // Dropping the orchestrator drops the last sender and ends the printer.
    drop(orchestrator);
    printer
        .await
        .context("printer task failed")?
        .context("writing records")?;

    eprintln!("{summary}");
    Ok(())
}

async fn print_events<W: io::Write>(
    mut rx: mpsc::UnboundedReceiver<ScanEvent>,
    mut writer: RecordWriter<W>,
) -> Result<usize, ReportError> {
    while let Some(event) = rx.recv().await {
        match event {
            ScanEvent::Record(record) => writer.write_record(&record)?,
            ScanEvent::Gateway {
                group,
                gateway,
                status,
            } => eprintln!("gateway {gateway} ({group}): {status}"),
        }
    }
    let written = writer.written();
    writer.finish()?;
    Ok(written)
}

/// Resolves the groups a scan covers.
///
/// Named groups come first, in argument order, followed by the ad-hoc group
/// when `--range` is given.  With neither, every configured group is scanned.
fn select_groups(config: &AppConfig, args: &ScanArgs) -> Result<Vec<ScanGroup>> {
    let mut selected = Vec::new();

    for name in &args.groups {
        match config.find_group(name) {
            Some(group) => selected.push(group.clone()),
            None => bail!("no group named '{name}' in the config"),
        }
    }

    if !args.ranges.is_empty() {
        let ranges: Vec<String> = args.ranges.iter().flat_map(|r| split_range_list(r)).collect();
        let mut group = ScanGroup::new(AD_HOC_GROUP, ranges);
        group.gateway = args.gateway;
        selected.push(group);
    }

    if args.groups.is_empty() && args.ranges.is_empty() {
        selected = config.groups.clone();
    }

    if selected.is_empty() {
        bail!("nothing to scan; add a group with `antscan groups add` or pass --range");
    }
    Ok(selected)
}

// ── groups ────────────────────────────────────────────────────────────────────

fn manage_groups(config: &mut AppConfig, path: &Path, command: GroupsCommand) -> Result<()> {
    match command {
        GroupsCommand::List => {
            if config.groups.is_empty() {
                println!("no groups configured");
            }
            for group in &config.groups {
                println!("{}", group_line(group));
            }
            return Ok(());
        }
        GroupsCommand::Add {
            name,
            ranges,
            gateway,
        } => {
            let mut group = ScanGroup::new(name, split_range_list(&ranges));
            group.gateway = gateway;
            if group.addresses().is_empty() {
                warn!(group = %group.name, "ranges cover no addresses");
            }
            config.upsert_group(group)?;
        }
        GroupsCommand::Remove { name } => {
            if !config.remove_group(&name) {
                bail!("no group named '{name}' in the config");
            }
        }
        GroupsCommand::Import { path: legacy } => {
            let imported = import_legacy_containers(&legacy)?;
            info!(count = imported.len(), from = %legacy.display(), "importing groups");
            for group in imported {
                if let Err(e) = config.upsert_group(group) {
                    warn!(error = %e, "skipping legacy group");
                }
            }
        }
    }

    save_config_to(path, config).with_context(|| format!("saving config to {}", path.display()))?;
    info!(path = %path.display(), groups = config.groups.len(), "config saved");
    Ok(())
}

fn group_line(group: &ScanGroup) -> String {
    let gateway = group
        .gateway
        .map(|g| g.to_string())
        .unwrap_or_else(|| "-".to_string());
    format!(
        "{:<20}  {:>5} hosts  gateway {:<15}  {}",
        group.name,
        group.addresses().len(),
        gateway,
        group.ip_ranges.join(", ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn scan_args(argv: &[&str]) -> ScanArgs {
        let cli = Cli::try_parse_from(std::iter::once("antscan").chain(argv.iter().copied()))
            .expect("parse");
        match cli.command {
            Command::Scan(args) => args,
            other => panic!("expected scan, got {other:?}"),
        }
    }

    fn config_with_groups() -> AppConfig {
        let mut cfg = AppConfig::default();
        cfg.upsert_group(ScanGroup::new("c1", ["10.4.101.0/24"])).unwrap();
        cfg.upsert_group(ScanGroup::new("c2", ["10.4.102.1-50"]).with_gateway(Ipv4Addr::new(10, 4, 102, 1)))
            .unwrap();
        cfg
    }

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_scan_defaults() {
        let args = scan_args(&["scan"]);
        assert!(args.groups.is_empty());
        assert_eq!(args.format, OutputFormat::Table);
        assert!(args.port.is_none());
    }

    #[test]
    fn test_scan_parses_repeated_flags_and_format() {
        let args = scan_args(&[
            "scan", "-g", "c1", "--group", "c2", "--range", "10.0.0.1-5", "--format", "csv", "--port", "14028",
        ]);
        assert_eq!(args.groups, vec!["c1", "c2"]);
        assert_eq!(args.ranges, vec!["10.0.0.1-5"]);
        assert_eq!(args.format, OutputFormat::Csv);
        assert_eq!(args.port, Some(14028));
    }

    #[test]
    fn test_scan_accepts_xlsx_format() {
        let args = scan_args(&["scan", "--format", "xlsx"]);
        assert_eq!(args.format, OutputFormat::Xlsx);
    }

    #[test]
    fn test_gateway_without_range_is_rejected() {
        let result = Cli::try_parse_from(["antscan", "scan", "--gateway", "10.0.0.1"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_groups_add_parses() {
        let cli = Cli::try_parse_from([
            "antscan", "groups", "add", "c9", "--ranges", "10.0.0, 10.0.1.1-9", "--gateway", "10.0.0.1",
        ])
        .unwrap();
        match cli.command {
            Command::Groups(GroupsCommand::Add { name, ranges, gateway }) => {
                assert_eq!(name, "c9");
                assert_eq!(split_range_list(&ranges), vec!["10.0.0", "10.0.1.1-9"]);
                assert_eq!(gateway, Some(Ipv4Addr::new(10, 0, 0, 1)));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_select_all_groups_by_default() {
        let groups = select_groups(&config_with_groups(), &scan_args(&["scan"])).unwrap();
        let names: Vec<&str> = groups.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, vec!["c1", "c2"]);
    }

    #[test]
    fn test_select_named_group_and_ad_hoc_ranges() {
        // Arrange
        let args = scan_args(&["scan", "-g", "c2", "-r", "10.9.9.1-3,10.9.9.7-8", "--gateway", "10.9.9.1"]);

        // Act
        let groups = select_groups(&config_with_groups(), &args).unwrap();

        // Assert
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].name, "c2");
        assert_eq!(groups[1].name, AD_HOC_GROUP);
        assert_eq!(groups[1].addresses().len(), 5);
        assert_eq!(groups[1].gateway, Some(Ipv4Addr::new(10, 9, 9, 1)));
    }

    #[test]
    fn test_select_unknown_group_fails() {
        let err = select_groups(&config_with_groups(), &scan_args(&["scan", "-g", "nope"])).unwrap_err();
        assert!(err.to_string().contains("nope"));
    }

    #[test]
    fn test_select_with_empty_config_fails() {
        assert!(select_groups(&AppConfig::default(), &scan_args(&["scan"])).is_err());
    }

    #[test]
    fn test_group_line_shows_host_count_and_gateway() {
        let cfg = config_with_groups();
        let line = group_line(cfg.find_group("c2").unwrap());
        assert!(line.contains("50 hosts"));
        assert!(line.contains("10.4.102.1"));
        assert!(group_line(cfg.find_group("c1").unwrap()).contains("gateway -"));
    }

    #[test]
    fn test_groups_add_remove_persist() {
        // Arrange
        let dir = std::env::temp_dir().join(format!("antscan_cli_{}", uuid::Uuid::new_v4()));
        let path = dir.join("config.toml");
        let mut cfg = AppConfig::default();

        // Act
        manage_groups(
            &mut cfg,
            &path,
            GroupsCommand::Add {
                name: "c1".to_string(),
                ranges: "10.0.0.1-5, 10.0.1".to_string(),
                gateway: None,
            },
        )
        .unwrap();
        let saved = load_config_from(&path).unwrap();
        manage_groups(&mut cfg, &path, GroupsCommand::Remove { name: "c1".to_string() }).unwrap();
        let removed = load_config_from(&path).unwrap();

        // Assert
        assert_eq!(saved.groups, vec![ScanGroup::new("c1", ["10.0.0.1-5", "10.0.1"])]);
        assert!(removed.groups.is_empty());
        assert!(manage_groups(&mut cfg, &path, GroupsCommand::Remove { name: "c1".to_string() }).is_err());

        std::fs::remove_dir_all(&dir).ok();
    }
}
