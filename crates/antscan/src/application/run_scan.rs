//! ScanOrchestrator: one scan pass over a list of groups.
//!
//! # Pass structure
//!
//! ```text
//! run_scan(groups)
//!   │  new session id, new TelemetryAggregator
//!   │
//!   ├─ group 1 ──► gateway probe (spawned, reports to sink on its own)
//!   │          ──► expand ranges ──► for each address, for each kind:
//!   │                                   acquire permit ──► spawn query task
//!   │                                                         │
//!   │                                   Ok(doc)  ──► aggregator.submit
//!   │                                   Err(_)   ──► counted, dropped
//!   ├─ group 2 ...
//!   │
//!   └─ wait for in-flight tasks ──► drain leftovers ──► ScanSummary
//! ```
//!
//! Groups are walked one after another; the queries of a group are not
//! awaited before the next group starts admitting.  The semaphore is the
//! only limit on in-flight device connections.
//!
//! # Cancellation
//!
//! Cancelling the token stops admission: no permit is requested after it
//! fires and no further probe is launched.  Queries already running finish or
//! time out on their own, and their results still reach the sink.

use std::fmt;
use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use antscan_core::{CommandKind, DeviceDocument, ProtocolError, ScanGroup};
use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument, Span};
use uuid::Uuid;

use crate::application::aggregate_telemetry::TelemetryAggregator;
use crate::application::events::{GatewayStatus, ScanEventSink};

/// Default cap on concurrent device connections.
pub const DEFAULT_MAX_IN_FLIGHT: usize = 32;

/// Why a single device query produced no document.
///
/// Every variant is routine during a scan (most addresses in a range are
/// empty) and none of them is propagated past the orchestrator.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("connect to {addr} failed: {source}")]
    Connect {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("I/O with {addr} failed: {source}")]
    Io {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("{addr} did not answer within {timeout:?}")]
    Timeout { addr: SocketAddr, timeout: Duration },

    #[error("{addr} sent an unusable response: {source}")]
    Protocol {
        addr: SocketAddr,
        #[source]
        source: ProtocolError,
    },
}

/// Fetches one telemetry document from one device.
#[async_trait]
pub trait DeviceQuery: Send + Sync {
    async fn query(&self, address: Ipv4Addr, kind: CommandKind) -> Result<DeviceDocument, QueryError>;
}

/// Checks whether a gateway answers at the network layer.
///
/// Never fails: every problem is reported as [`GatewayStatus::Unreachable`].
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReachabilityProbe: Send + Sync {
    async fn probe(&self, address: Ipv4Addr) -> GatewayStatus;
}

/// Counters for one finished pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanSummary {
    /// Groups visited before the pass ended, including groups that expand
    /// to no addresses.
    pub groups: usize,
    /// Distinct addresses per group, summed over scanned groups.
    pub addresses: usize,
    pub queries_ok: usize,
    pub queries_failed: usize,
    /// Records handed to the sink.
    pub records: usize,
    /// Addresses that received exactly one of their two documents.
    pub incomplete: usize,
    /// The pass stopped early because the token was cancelled.
    pub cancelled: bool,
}

impl fmt::Display for ScanSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} group(s), {} address(es), {} record(s), {} incomplete, {} failed quer{}",
            self.groups,
            self.addresses,
            self.records,
            self.incomplete,
            self.queries_failed,
            if self.queries_failed == 1 { "y" } else { "ies" },
        )?;
        if self.cancelled {
            f.write_str(" (cancelled)")?;
        }
        Ok(())
    }
}

#[derive(Default)]
struct QueryCounters {
    ok: AtomicUsize,
    failed: AtomicUsize,
    records: AtomicUsize,
}

/// Per-pass state shared by the admission loop and the query tasks.
struct Session {
    aggregator: Arc<TelemetryAggregator>,
    semaphore: Arc<Semaphore>,
    counters: Arc<QueryCounters>,
    tasks: JoinSet<()>,
}

/// Coordinates gateway probes and device queries for a list of groups.
pub struct ScanOrchestrator {
    query: Arc<dyn DeviceQuery>,
    probe: Arc<dyn ReachabilityProbe>,
    sink: Arc<dyn ScanEventSink>,
    max_in_flight: usize,
}

impl ScanOrchestrator {
    /// Creates an orchestrator.  A `max_in_flight` of zero is treated as one.
    pub fn new(
        query: Arc<dyn DeviceQuery>,
        probe: Arc<dyn ReachabilityProbe>,
        sink: Arc<dyn ScanEventSink>,
        max_in_flight: usize,
    ) -> Self {
        Self {
            query,
            probe,
            sink,
            max_in_flight: max_in_flight.max(1),
        }
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight
    }

    /// Runs one pass over `groups`.
    ///
    /// Returns once every admitted query has finished.  Each call uses a
    /// fresh session, so partial results of an earlier pass never complete
    /// in a later one.
    pub async fn run_scan(&self, groups: &[ScanGroup], cancel: &CancellationToken) -> ScanSummary {
        let session_id = Uuid::new_v4();
        let span = info_span!("scan", session = %session_id);
        self.run_session(groups, cancel).instrument(span).await
    }

    async fn run_session(&self, groups: &[ScanGroup], cancel: &CancellationToken) -> ScanSummary {
        let mut session = Session {
            aggregator: Arc::new(TelemetryAggregator::new(Arc::clone(&self.sink))),
            semaphore: Arc::new(Semaphore::new(self.max_in_flight)),
            counters: Arc::new(QueryCounters::default()),
            tasks: JoinSet::new(),
        };
        let mut summary = ScanSummary::default();

        info!(groups = groups.len(), max_in_flight = self.max_in_flight, "scan started");

        for group in groups {
            if cancel.is_cancelled() {
                summary.cancelled = true;
                break;
            }
            summary.groups += 1;

            let span = info_span!("group", name = %group.name);
            let (addresses, completed) = self
                .admit_group(group, &mut session, cancel)
                .instrument(span)
                .await;
            summary.addresses += addresses;
            if !completed {
                summary.cancelled = true;
                break;
            }
        }

        while let Some(joined) = session.tasks.join_next().await {
            if let Err(e) = joined {
                warn!(error = %e, "scan task aborted");
            }
        }

        summary.queries_ok = session.counters.ok.load(Ordering::Relaxed);
        summary.queries_failed = session.counters.failed.load(Ordering::Relaxed);
        summary.records = session.counters.records.load(Ordering::Relaxed);
        summary.incomplete = session.aggregator.drain().len();

        info!(
            records = summary.records,
            incomplete = summary.incomplete,
            failed = summary.queries_failed,
            cancelled = summary.cancelled,
            "scan finished"
        );
        summary
    }

    /// Launches the gateway probe and admits every query of one group.
    ///
    /// Returns the number of distinct addresses in the group and whether
    /// admission ran to the end (`false` when cancelled).
    async fn admit_group(
        &self,
        group: &ScanGroup,
        session: &mut Session,
        cancel: &CancellationToken,
    ) -> (usize, bool) {
        if let Some(gateway) = group.gateway {
            self.spawn_probe(&group.name, gateway, session);
        }

        let addresses = group.addresses();
        if addresses.is_empty() {
            warn!(ranges = ?group.ip_ranges, "group expands to no addresses");
            return (0, true);
        }
        debug!(count = addresses.len(), "admitting addresses");

        for &address in &addresses {
            for kind in CommandKind::ALL {
                let permit = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return (addresses.len(), false),
                    permit = Arc::clone(&session.semaphore).acquire_owned() => match permit {
                        Ok(permit) => permit,
                        Err(_) => return (addresses.len(), false),
                    },
                };

                let query = Arc::clone(&self.query);
                let aggregator = Arc::clone(&session.aggregator);
                let counters = Arc::clone(&session.counters);
                session.tasks.spawn(
                    async move {
                        let result = query.query(address, kind).await;
                        drop(permit);
                        match result {
                            Ok(document) => {
                                counters.ok.fetch_add(1, Ordering::Relaxed);
                                if aggregator.submit(address, document) {
                                    counters.records.fetch_add(1, Ordering::Relaxed);
                                }
                            }
                            Err(e) => {
                                counters.failed.fetch_add(1, Ordering::Relaxed);
                                debug!(%address, %kind, error = %e, "query failed");
                            }
                        }
                    }
                    .instrument(Span::current()),
                );

                while let Some(joined) = session.tasks.try_join_next() {
                    if let Err(e) = joined {
                        warn!(error = %e, "scan task aborted");
                    }
                }
            }
        }

        (addresses.len(), true)
    }

    fn spawn_probe(&self, group: &str, gateway: Ipv4Addr, session: &mut Session) {
        let probe = Arc::clone(&self.probe);
        let sink = Arc::clone(&self.sink);
        let group = group.to_string();
        session.tasks.spawn(
            async move {
                let status = probe.probe(gateway).await;
                if status.is_reachable() {
                    debug!(%gateway, "gateway reachable");
                } else {
                    warn!(%gateway, "gateway unreachable");
                }
                sink.gateway_status(&group, gateway, status);
            }
            .instrument(Span::current()),
        );
    }
}
