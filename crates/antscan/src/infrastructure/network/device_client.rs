//! TCP client for the device API.
//!
//! Every query is its own connection:
//!
//! ```text
//! connect ──► write {"command": "..."} ──► read until EOF ──► strip sentinel ──► JSON
//! └──────────────────────── one deadline (default 2 s) ───────────────────────┘
//! ```
//!
//! The deadline wraps the whole exchange rather than each step, so a device
//! that accepts the connection and then trickles bytes cannot hold a worker
//! longer than a device that never answers.  No retries.

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use antscan_core::{decode_response, encode_request, CommandKind, DeviceDocument, DEFAULT_API_PORT};
use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::application::run_scan::{DeviceQuery, QueryError};

/// Default deadline for one query.
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(2);

/// Responses larger than this are cut off (and will fail to decode).
const MAX_RESPONSE_BYTES: u64 = 1024 * 1024;

/// Queries devices over plain TCP.
#[derive(Debug, Clone)]
pub struct TcpDeviceClient {
    port: u16,
    timeout: Duration,
}

impl Default for TcpDeviceClient {
    fn default() -> Self {
        Self::new(DEFAULT_API_PORT, DEFAULT_QUERY_TIMEOUT)
    }
}

impl TcpDeviceClient {
    pub fn new(port: u16, timeout: Duration) -> Self {
        Self { port, timeout }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn exchange(&self, addr: SocketAddr, kind: CommandKind) -> Result<Vec<u8>, QueryError> {
        let mut stream = TcpStream::connect(addr)
            .await
            .map_err(|source| QueryError::Connect { addr, source })?;

        stream
            .write_all(&encode_request(kind))
            .await
            .map_err(|source| QueryError::Io { addr, source })?;

        let mut raw = Vec::new();
        stream
            .take(MAX_RESPONSE_BYTES)
            .read_to_end(&mut raw)
            .await
            .map_err(|source| QueryError::Io { addr, source })?;
        Ok(raw)
    }
}

#[async_trait]
impl DeviceQuery for TcpDeviceClient {
    async fn query(&self, address: Ipv4Addr, kind: CommandKind) -> Result<DeviceDocument, QueryError> {
        let addr = SocketAddr::from((address, self.port));

        let raw = tokio::time::timeout(self.timeout, self.exchange(addr, kind))
            .await
            .map_err(|_| QueryError::Timeout {
                addr,
                timeout: self.timeout,
            })??;

        decode_response(kind, &raw).map_err(|source| QueryError::Protocol { addr, source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use antscan_core::ProtocolError;
    use tokio::net::TcpListener;
    use tokio_test::{assert_err, assert_ok};

    /// Accepts one connection, reads the request, answers with `reply` and closes.
    async fn fake_miner(reply: &'static [u8]) -> (u16, tokio::task::JoinHandle<Vec<u8>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 64];
            while !request.ends_with(b"}") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            socket.write_all(reply).await.unwrap();
            request
        });
        (port, handle)
    }

    #[test]
    fn test_default_client_targets_api_port_with_two_second_deadline() {
        let client = TcpDeviceClient::default();
        assert_eq!(client.port(), 4028);
        assert_eq!(client.timeout(), Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_query_sends_command_and_decodes_reply() {
        // Arrange
        let (port, miner) = fake_miner(b"{\"STATS\":[{\"Type\":\"AntminerS9\"}]}\0").await;
        let client = TcpDeviceClient::new(port, Duration::from_secs(2));

        // Act
        let doc = assert_ok!(client.query(Ipv4Addr::LOCALHOST, CommandKind::Stats).await);

        // Assert
        assert_eq!(doc.kind(), CommandKind::Stats);
        assert_eq!(doc.field(0, "Type"), "AntminerS9");
        assert_eq!(miner.await.unwrap(), br#"{"command": "stats"}"#.to_vec());
    }

    #[tokio::test]
    async fn test_refused_connection_is_connect_error() {
        // Arrange: grab a free port, then close it
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        let client = TcpDeviceClient::new(port, Duration::from_secs(2));

        // Act
        let err = assert_err!(client.query(Ipv4Addr::LOCALHOST, CommandKind::Pools).await);

        // Assert
        assert!(matches!(err, QueryError::Connect { .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn test_silent_device_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let _holder = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
            drop(socket);
        });
        let client = TcpDeviceClient::new(port, Duration::from_millis(200));

        let err = assert_err!(client.query(Ipv4Addr::LOCALHOST, CommandKind::Stats).await);

        assert!(
            matches!(err, QueryError::Timeout { timeout, .. } if timeout == Duration::from_millis(200)),
            "got {err:?}"
        );
    }

    #[tokio::test]
    async fn test_garbage_reply_is_protocol_error() {
        let (port, _miner) = fake_miner(b"not json at all\0").await;
        let client = TcpDeviceClient::new(port, Duration::from_secs(2));

        let err = assert_err!(client.query(Ipv4Addr::LOCALHOST, CommandKind::Stats).await);

        assert!(
            matches!(err, QueryError::Protocol { source: ProtocolError::InvalidJson(_), .. }),
            "got {err:?}"
        );
    }

    #[tokio::test]
    async fn test_empty_reply_is_protocol_error() {
        let (port, _miner) = fake_miner(b"").await;
        let client = TcpDeviceClient::new(port, Duration::from_secs(2));

        let err = assert_err!(client.query(Ipv4Addr::LOCALHOST, CommandKind::Pools).await);

        assert!(matches!(
            err,
            QueryError::Protocol { source: ProtocolError::EmptyResponse, .. }
        ));
    }
}
