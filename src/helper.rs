//! Helper utilities for Relaycat
//!
//! This module provides constants and small conversions used throughout
//! the application.

use std::time::Duration;

/// Bytes moved per pump iteration
pub const DEFAULT_CHUNK_SIZE: usize = 1024;

/// Bytes moved per pump iteration with the jumbo option
pub const JUMBO_CHUNK_SIZE: usize = 8192;

/// Default SOCKS proxy port
pub const DEFAULT_SOCKS_PORT: u16 = 1080;

/// Default HTTP CONNECT proxy port
pub const DEFAULT_HTTP_PROXY_PORT: u16 = 3128;

/// Highest valid port number
pub const PORT_MAX: u32 = 65535;

/// Single-byte writes performed by the UDP reachability probe
pub const UDP_PROBE_WRITES: usize = 4;

/// Listen backlog; one pending peer at a time
pub const LISTEN_BACKLOG: i32 = 1;

/// Parse duration from seconds, treating zero as "no duration"
pub fn duration_from_secs(secs: u64) -> Option<Duration> {
    if secs == 0 {
        None
    } else {
        Some(Duration::from_secs(secs))
    }
}

/// Await `fut`, bounded by `limit` when one is set
///
/// Returns `None` when the limit elapsed first.
pub async fn maybe_timeout<F: std::future::Future>(
    limit: Option<Duration>,
    fut: F,
) -> Option<F::Output> {
    match limit {
        Some(limit) => tokio::time::timeout(limit, fut).await.ok(),
        None => Some(fut.await),
    }
}
