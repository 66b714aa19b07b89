//! Test utilities and mocks for Relaycat
//!
//! This module provides common test utilities used across integration tests.

#![allow(dead_code)]

use relaycat::config::{Config, Family, Mode, SocketType};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{duplex, DuplexStream};
use tokio::net::{TcpListener, TcpStream};

/// Create a pair of connected duplex streams for testing
pub fn create_mock_stream_pair() -> (DuplexStream, DuplexStream) {
    duplex(8192)
}

/// Create a test TCP listener on an available port
pub async fn create_test_listener() -> (TcpListener, SocketAddr) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    (listener, addr)
}

/// A loopback port that nothing is listening on
pub async fn free_port() -> u16 {
    let (listener, addr) = create_test_listener().await;
    drop(listener);
    addr.port()
}

/// Connect to a loopback port, retrying until something listens there
pub async fn connect_retry(port: u16) -> TcpStream {
    loop {
        match TcpStream::connect(("127.0.0.1", port)).await {
            Ok(stream) => return stream,
            Err(_) => tokio::time::sleep(Duration::from_millis(10)).await,
        }
    }
}

/// Test configuration builder
pub struct TestConfigBuilder {
    config: Config,
}

impl Default for TestConfigBuilder {
    fn default() -> Self {
        TestConfigBuilder {
            config: Config {
                host: Some("127.0.0.1".to_string()),
                timeout: Some(Duration::from_secs(5)),
                ..Default::default()
            },
        }
    }
}

impl TestConfigBuilder {
    /// Create a new test config builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Connect to `port` on loopback
    pub fn connect(mut self, port: u16) -> Self {
        self.config.mode = Mode::Connect;
        self.config.port = Some(port.to_string());
        self
    }

    /// Listen on `port` on loopback
    pub fn listen(mut self, port: u16) -> Self {
        self.config.mode = Mode::Listen;
        self.config.port = Some(port.to_string());
        self
    }

    /// Use a Unix-domain socket at `path`
    pub fn unix(mut self, path: &str) -> Self {
        self.config.family = Family::Unix;
        self.config.host = Some(path.to_string());
        self.config.port = None;
        self
    }

    /// Use UDP
    pub fn udp(mut self) -> Self {
        self.config.socket_type = SocketType::Datagram;
        self
    }

    /// Set the idle timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = Some(timeout);
        self
    }

    /// Apply any other change
    pub fn with(mut self, f: impl FnOnce(&mut Config)) -> Self {
        f(&mut self.config);
        self
    }

    /// Build the configuration
    pub fn build(self) -> Config {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_mock_stream_pair() {
        let (mut a, mut b) = create_mock_stream_pair();

        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        a.write_all(b"hello").await.unwrap();
        let mut buf = [0u8; 5];
        b.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"hello");
    }

    #[test]
    fn test_config_builder() {
        let config = TestConfigBuilder::new().listen(4000).build();
        assert_eq!(config.mode, Mode::Listen);
        assert_eq!(config.port.as_deref(), Some("4000"));
        assert!(config.validate().is_ok());
    }
}
