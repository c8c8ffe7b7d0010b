//! PLC gateway TCP client.
//!
//! The protocol gateway terminates the PLC session (OPC UA transport,
//! certificates, subscriptions) and republishes every signal update as one
//! JSON [`SignalSample`] per line over plain TCP. This client handles
//! framing, read timeouts, TCP keepalive, and stale-feed detection; the
//! pipeline loop owns the reconnect policy and calls [`connect`] again
//! after a failure.
//!
//! [`connect`]: GatewaySource::connect

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

use crate::config::SourceConfig;
use crate::types::SignalSample;

use super::{SampleEvent, SampleSource, SourceError};

/// Connect timeout (seconds). Kept short relative to the read timeout —
/// an unreachable gateway should surface quickly so backoff can start.
const CONNECT_TIMEOUT_SECS: u64 = 30;

pub struct GatewaySource {
    addr: String,
    stream: Option<BufReader<TcpStream>>,
    line_buffer: String,
    read_timeout_secs: u64,
    stale_secs: u64,
    /// Unix seconds of the last successful sample receipt.
    last_data_time: u64,
    samples_received: u64,
    timeouts: u64,
}

impl GatewaySource {
    pub fn new(cfg: &SourceConfig) -> Self {
        Self {
            addr: cfg.addr.clone(),
            stream: None,
            line_buffer: String::with_capacity(1024),
            read_timeout_secs: cfg.read_timeout_secs,
            stale_secs: cfg.stale_secs,
            last_data_time: 0,
            samples_received: 0,
            timeouts: 0,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// Connection health counters for diagnostics.
    pub fn stats(&self) -> GatewayStats {
        GatewayStats {
            connected: self.is_connected(),
            samples_received: self.samples_received,
            timeouts: self.timeouts,
            last_data_secs_ago: if self.last_data_time > 0 {
                current_unix_secs().saturating_sub(self.last_data_time)
            } else {
                0
            },
        }
    }

    async fn read_line(&mut self) -> Result<usize, SourceError> {
        let reader = self.stream.as_mut().ok_or(SourceError::NotConnected)?;
        self.line_buffer.clear();

        let read_timeout = tokio::time::Duration::from_secs(self.read_timeout_secs);
        let result = tokio::time::timeout(read_timeout, reader.read_line(&mut self.line_buffer))
            .await;

        match result {
            Ok(Ok(bytes)) => Ok(bytes),
            Ok(Err(e)) => Err(SourceError::ConnectionFailed(e.to_string())),
            Err(_) => {
                self.timeouts += 1;
                Err(SourceError::Timeout)
            }
        }
    }
}

#[async_trait]
impl SampleSource for GatewaySource {
    async fn connect(&mut self) -> Result<(), SourceError> {
        if self.stream.is_some() {
            return Ok(());
        }

        tracing::info!(address = %self.addr, "Connecting to PLC gateway");

        let connect_timeout = tokio::time::Duration::from_secs(CONNECT_TIMEOUT_SECS);
        let stream = tokio::time::timeout(connect_timeout, TcpStream::connect(&self.addr))
            .await
            .map_err(|_| SourceError::Timeout)?
            .map_err(|e| SourceError::ConnectionFailed(e.to_string()))?;

        // TCP keepalive to detect dead connections under the read timeout
        let sock_ref = socket2::SockRef::from(&stream);
        let keepalive = socket2::TcpKeepalive::new()
            .with_time(std::time::Duration::from_secs(30))
            .with_interval(std::time::Duration::from_secs(10));
        let _ = sock_ref.set_tcp_keepalive(&keepalive);

        self.stream = Some(BufReader::new(stream));
        self.last_data_time = current_unix_secs();

        tracing::info!("Gateway connection established");
        Ok(())
    }

    async fn next_sample(&mut self) -> Result<SampleEvent, SourceError> {
        // Stale feed: the connection is up but the gateway stopped pushing.
        // Surface it as a timeout so the loop tears down and reconnects.
        let now = current_unix_secs();
        if self.is_connected()
            && self.last_data_time > 0
            && now.saturating_sub(self.last_data_time) > self.stale_secs
        {
            tracing::warn!(
                silent_secs = now.saturating_sub(self.last_data_time),
                threshold = self.stale_secs,
                "Gateway feed stale — forcing reconnect"
            );
            self.disconnect().await;
            return Err(SourceError::Timeout);
        }

        loop {
            let bytes = self.read_line().await?;
            if bytes == 0 {
                self.disconnect().await;
                return Err(SourceError::ConnectionClosed);
            }

            let line = self.line_buffer.trim();
            if line.is_empty() {
                continue;
            }

            match serde_json::from_str::<SignalSample>(line) {
                Ok(sample) => {
                    self.last_data_time = current_unix_secs();
                    self.samples_received += 1;
                    return Ok(SampleEvent::Sample(sample));
                }
                Err(e) => {
                    tracing::warn!("[GatewaySource] Failed to parse sample: {}", e);
                    // One corrupt frame must not drop the connection
                }
            }
        }
    }

    async fn disconnect(&mut self) {
        if let Some(mut reader) = self.stream.take() {
            let _ = reader.get_mut().shutdown().await;
            tracing::info!("Gateway connection closed");
        }
    }

    fn source_name(&self) -> &str {
        "gateway"
    }
}

/// Gateway connection health statistics
#[derive(Debug, Clone, serde::Serialize)]
pub struct GatewayStats {
    pub connected: bool,
    pub samples_received: u64,
    pub timeouts: u64,
    pub last_data_secs_ago: u64,
}

fn current_unix_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SignalPayload;
    use tokio::io::AsyncWriteExt as _;

    fn test_cfg(addr: &str) -> SourceConfig {
        SourceConfig {
            addr: addr.to_string(),
            read_timeout_secs: 5,
            stale_secs: 300,
        }
    }

    #[tokio::test]
    async fn reads_json_lines_and_skips_garbage() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let sample = SignalSample {
                line_name: "L1".to_string(),
                machine_name: "M1".to_string(),
                signal_key: "s1".to_string(),
                timestamp: 42,
                payload: SignalPayload::Sensor { value: 7.0 },
            };
            let mut frame = String::from("not json\n\n");
            frame.push_str(&serde_json::to_string(&sample).unwrap());
            frame.push('\n');
            socket.write_all(frame.as_bytes()).await.unwrap();
            socket.flush().await.unwrap();
            // keep the socket open until the client has read
            tokio::time::sleep(tokio::time::Duration::from_millis(200)).await;
        });

        let mut source = GatewaySource::new(&test_cfg(&addr.to_string()));
        source.connect().await.unwrap();

        match source.next_sample().await.unwrap() {
            SampleEvent::Sample(s) => {
                assert_eq!(s.timestamp, 42);
                assert_eq!(s.signal_key, "s1");
            }
            SampleEvent::Eof => panic!("unexpected EOF"),
        }
        assert_eq!(source.stats().samples_received, 1);

        source.disconnect().await;
        server.await.unwrap();
    }

    #[tokio::test]
    async fn peer_close_surfaces_as_connection_closed() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            drop(socket);
        });

        let mut source = GatewaySource::new(&test_cfg(&addr.to_string()));
        source.connect().await.unwrap();
        server.await.unwrap();

        assert!(matches!(
            source.next_sample().await,
            Err(SourceError::ConnectionClosed)
        ));
        assert!(!source.is_connected());
    }

    #[tokio::test]
    async fn connect_to_dead_port_fails() {
        // bind then drop to get a port with nothing listening
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let mut source = GatewaySource::new(&test_cfg(&addr.to_string()));
        assert!(source.connect().await.is_err());
    }
}
