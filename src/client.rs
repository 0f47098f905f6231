//! Cryostat TCP connection handle.
//!
//! [`CryostationClient`] owns the socket to the instrument and performs
//! framed command/response round-trips. The instrument services one
//! command at a time over one connection, so the client is strictly
//! sequential: send a frame, then read the full response before the
//! next command goes out.

use crate::config::ConnectionConfig;
use crate::protocol::{self, ProtocolError};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

/// Client-level errors
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("connection closed by instrument")]
    ConnectionClosed,

    #[error("timed out waiting for instrument response")]
    TimedOut,

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("response payload not parseable as {expected}: {payload:?}")]
    Parse {
        expected: &'static str,
        payload: String,
    },
}

/// Connection health statistics
#[derive(Debug, Clone, Serialize)]
pub struct ClientStats {
    pub connected: bool,
    pub commands_sent: u64,
    pub timeouts: u64,
}

/// Owns the TCP connection to a cryostat instrument.
pub struct CryostationClient {
    config: ConnectionConfig,
    stream: Option<TcpStream>,
    commands_sent: u64,
    timeouts: u64,
}

impl CryostationClient {
    /// Open a connection to the instrument.
    ///
    /// Honours the config's connect timeout, and its opt-in bounded
    /// retry with exponential backoff when `retry.enabled` is set.
    pub async fn connect(config: ConnectionConfig) -> Result<Self, ClientError> {
        let attempts = if config.retry.enabled {
            config.retry.max_attempts.max(1)
        } else {
            1
        };
        let mut delay = Duration::from_millis(config.retry.initial_delay_ms);
        let max_delay = Duration::from_millis(config.retry.max_delay_ms);

        let mut last_error = ClientError::ConnectionFailed("no connection attempt made".to_string());
        for attempt in 1..=attempts {
            match Self::try_connect(&config).await {
                Ok(stream) => {
                    info!(
                        host = %config.host,
                        port = config.port,
                        "Cryostat connection established"
                    );
                    return Ok(Self {
                        config,
                        stream: Some(stream),
                        commands_sent: 0,
                        timeouts: 0,
                    });
                }
                Err(e) => {
                    warn!(
                        attempt,
                        max_attempts = attempts,
                        error = %e,
                        "Cryostat connect attempt failed"
                    );
                    last_error = e;
                    if attempt < attempts {
                        tokio::time::sleep(delay).await;
                        delay = (delay * 2).min(max_delay);
                    }
                }
            }
        }
        Err(last_error)
    }

    async fn try_connect(config: &ConnectionConfig) -> Result<TcpStream, ClientError> {
        let addr = format!("{}:{}", config.host, config.port);
        debug!(address = %addr, "Connecting to cryostat");

        let connect_timeout = Duration::from_secs(config.connect_timeout_secs);
        let stream = tokio::time::timeout(connect_timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| ClientError::TimedOut)?
            .map_err(|e| ClientError::ConnectionFailed(e.to_string()))?;

        // Keepalive so a silently dead instrument link surfaces as an error
        // rather than an eternal response wait.
        let sock_ref = socket2::SockRef::from(&stream);
        let keepalive = socket2::TcpKeepalive::new()
            .with_time(Duration::from_secs(30))
            .with_interval(Duration::from_secs(10));
        let _ = sock_ref.set_tcp_keepalive(&keepalive);

        Ok(stream)
    }

    /// Send one command frame and read the full response payload.
    ///
    /// With no `response_timeout_secs` configured this waits as long as
    /// the instrument takes; with one, a late response is a
    /// [`ClientError::TimedOut`].
    pub async fn query(&mut self, command: &str) -> Result<String, ClientError> {
        let frame = protocol::encode_frame(command)?;
        let response_timeout = self.config.response_timeout_secs.map(Duration::from_secs);

        let stream = self.stream.as_mut().ok_or(ClientError::ConnectionClosed)?;
        stream
            .write_all(&frame)
            .await
            .map_err(|e| ClientError::ConnectionFailed(e.to_string()))?;
        self.commands_sent += 1;

        let stream = self.stream.as_mut().ok_or(ClientError::ConnectionClosed)?;
        let payload = match response_timeout {
            Some(limit) => match tokio::time::timeout(limit, read_response(stream)).await {
                Ok(result) => result?,
                Err(_) => {
                    self.timeouts += 1;
                    warn!(command, timeout_secs = limit.as_secs(), "Response timed out");
                    return Err(ClientError::TimedOut);
                }
            },
            None => read_response(stream).await?,
        };

        debug!(command, payload = %payload, "Command round-trip complete");
        Ok(payload)
    }

    /// Send a command carrying a float argument and read the response.
    pub async fn query_with_float(
        &mut self,
        command: &str,
        value: f64,
    ) -> Result<String, ClientError> {
        let body = format!("{} {}", command, protocol::format_scientific(value));
        self.query(&body).await
    }

    /// Query expecting a float payload.
    pub async fn query_float(&mut self, command: &str) -> Result<f64, ClientError> {
        let payload = self.query(command).await?;
        payload
            .trim()
            .parse::<f64>()
            .map_err(|_| ClientError::Parse {
                expected: "float",
                payload,
            })
    }

    /// Query expecting a boolean payload (`"T"` is true).
    pub async fn query_bool(&mut self, command: &str) -> Result<bool, ClientError> {
        let payload = self.query(command).await?;
        Ok(protocol::parse_bool_payload(&payload))
    }

    /// Close the connection. Idempotent: a second call does nothing.
    pub async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            let _ = stream.shutdown().await;
            info!("Cryostat connection closed");
        }
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// Connection health statistics.
    pub fn stats(&self) -> ClientStats {
        ClientStats {
            connected: self.is_connected(),
            commands_sent: self.commands_sent,
            timeouts: self.timeouts,
        }
    }
}

/// Read one length-prefixed response frame off the stream.
async fn read_response(stream: &mut TcpStream) -> Result<String, ClientError> {
    let mut prefix = [0u8; 2];
    stream.read_exact(&mut prefix).await.map_err(map_read_err)?;
    let len = protocol::parse_length_prefix(prefix)?;

    let mut payload = vec![0u8; len];
    stream.read_exact(&mut payload).await.map_err(map_read_err)?;
    String::from_utf8(payload).map_err(|_| ProtocolError::InvalidPayload.into())
}

fn map_read_err(e: std::io::Error) -> ClientError {
    if e.kind() == std::io::ErrorKind::UnexpectedEof {
        ClientError::ConnectionClosed
    } else {
        ClientError::ConnectionFailed(e.to_string())
    }
}
