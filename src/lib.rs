//! # Relaycat - TCP/UDP/Unix Relay
//!
//! Relaycat moves bytes between the process's standard streams and a single
//! network or Unix-domain socket, in either direction, until both sides
//! are done.
//!
//! ## Features
//!
//! - **Connect or Listen**: dial out to a port list, or serve inbound peers one at a time
//! - **Port Probing**: zero-I/O connect scans, including a UDP reachability probe
//! - **Proxies**: SOCKS4, SOCKS5 (with username/password) and HTTP CONNECT
//! - **Half-Close Aware Pump**: each direction is shut down independently
//! - **TELNET Refusals**: answers option negotiation with DONT/WONT
//!
//! ## Usage
//!
//! ```rust,ignore
//! use relaycat::config::Config;
//! use relaycat::session::{run, LocalIo};
//! use relaycat::transport::SocketOpts;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut config = Config::default();
//!     config.set_destination("example.com");
//!     config.port = Some("80".to_string());
//!
//!     let summary = run(&config, &mut LocalIo::stdio(), &SocketOpts::default()).await?;
//!     println!("{} connection(s) succeeded", summary.succeeded);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! stdin  -> pump -> [proxy handshake] -> socket
//! stdout <- pump <- socket
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod config;
pub mod error;
pub mod helper;
pub mod proxy;
pub mod relay;
pub mod session;
pub mod transport;

// Re-export commonly used items
pub use config::{load_config, Config};
pub use error::{ProxyError, RelayError};
pub use session::{run, LocalIo, RunSummary};

/// Version of the Relaycat library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Name of the application
pub const NAME: &str = env!("CARGO_PKG_NAME");
