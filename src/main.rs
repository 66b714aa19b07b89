//! Relaycat - TCP/UDP/Unix relay and port probe
//!
//! This is the main entry point for the Relaycat application.

use anyhow::{Context, Result};
use clap::Parser;
use relaycat::config::{
    load_config, Config, ConnectStrategy, Family, FileConfig, LineEnding, Mode, ProxyConfig,
    ProxyCredentials, ProxyKind, SocketType,
};
use relaycat::helper::duration_from_secs;
use relaycat::session::{run, LocalIo};
use relaycat::transport::SocketOpts;
use std::io::IsTerminal;
use std::path::PathBuf;
use tracing::{debug, Level};
use tracing_subscriber::FmtSubscriber;

/// Relaycat - relay bytes between standard streams and a socket
#[derive(Parser, Debug)]
#[command(name = "relaycat")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Destination host, or socket path with -U (the port when listening)
    destination: Option<String>,

    /// Port or lo-hi range
    port: Option<String>,

    /// Use IPv4 only
    #[arg(short = '4', conflicts_with = "ipv6")]
    ipv4: bool,

    /// Use IPv6 only
    #[arg(short = '6')]
    ipv6: bool,

    /// Use Unix-domain sockets
    #[arg(short = 'U')]
    unix: bool,

    /// Use UDP instead of TCP
    #[arg(short = 'u')]
    udp: bool,

    /// Listen for an inbound connection
    #[arg(short = 'l')]
    listen: bool,

    /// Keep listening after a peer disconnects
    #[arg(short = 'k')]
    keep_listening: bool,

    /// Scan for listening daemons without sending data
    #[arg(short = 'z')]
    zero_io: bool,

    /// Verbose connection reports
    #[arg(short = 'v')]
    verbose: bool,

    /// Numeric addresses only, no name lookups
    #[arg(short = 'n')]
    numeric: bool,

    /// Randomize the port order
    #[arg(short = 'r')]
    random_ports: bool,

    /// Do not read from standard input
    #[arg(short = 'd')]
    no_input: bool,

    /// Answer TELNET negotiation with refusals
    #[arg(short = 't')]
    telnet: bool,

    /// Send CRLF as line ending
    #[arg(short = 'C')]
    crlf: bool,

    /// Use jumbo transfer chunks
    #[arg(short = 'j')]
    jumbo: bool,

    /// Apply socket options after connect or bind
    #[arg(short = 'o')]
    options_after_connect: bool,

    /// Use multipath TCP (implies --rich-connect)
    #[arg(short = 'M')]
    multipath: bool,

    /// Report socket events while relaying
    #[arg(short = 'D')]
    debug_events: bool,

    /// Idle timeout in seconds (0 waits forever)
    #[arg(short = 'w', value_name = "SECS", default_value_t = 0)]
    timeout: u64,

    /// Delay in seconds before each transfer
    #[arg(short = 'i', value_name = "SECS", default_value_t = 0)]
    interval: u64,

    /// Local source address
    #[arg(short = 's', value_name = "ADDR")]
    source_addr: Option<String>,

    /// Local source port
    #[arg(short = 'p', value_name = "PORT")]
    source_port: Option<String>,

    /// Proxy address as host[:port]
    #[arg(short = 'x', value_name = "PROXY")]
    proxy: Option<String>,

    /// Proxy protocol: 4, 5 or connect
    #[arg(short = 'X', value_name = "PROTO", default_value = "5")]
    proxy_proto: String,

    /// Proxy credentials as user:pass
    #[arg(short = 'P', value_name = "USER:PASS")]
    proxy_auth: Option<String>,

    /// Path to configuration file
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Connect without a deadline, then report both endpoints and a connection id
    #[arg(long)]
    rich_connect: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,

    /// Enable JSON logging format
    #[arg(long)]
    json_log: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let code = match start().await {
        Ok(true) => 0,
        Ok(false) => 1,
        Err(e) => {
            eprintln!("relaycat: {:#}", e);
            1
        }
    };
    // A pending stdin read would otherwise hold the runtime open
    std::process::exit(code);
}

async fn start() -> Result<bool> {
    let args = Args::parse();

    let reporting = args.verbose || args.zero_io || args.debug_events;
    setup_logging(log_level(&args.log_level, reporting), args.json_log)?;

    let file = match &args.config {
        Some(path) => load_config(path)?,
        None => FileConfig::default(),
    };
    let config = build_config(&args, &file)?;
    debug!("Relaycat v{} in {:?} mode", relaycat::VERSION, config.mode);

    let tuner = SocketOpts::from_config(&config.socket);
    let mut io = LocalIo::stdio();
    let summary = run(&config, &mut io, &tuner).await?;
    Ok(summary.success())
}

/// Turn parsed arguments and the optional file into a relay configuration
fn build_config(args: &Args, file: &FileConfig) -> Result<Config> {
    let mut config = Config {
        mode: if args.listen { Mode::Listen } else { Mode::Connect },
        family: if args.unix {
            Family::Unix
        } else if args.ipv4 {
            Family::Ipv4
        } else if args.ipv6 {
            Family::Ipv6
        } else {
            Family::Unspecified
        },
        socket_type: if args.udp {
            SocketType::Datagram
        } else {
            SocketType::Stream
        },
        numeric: args.numeric,
        local_host: args.source_addr.clone(),
        local_port: args.source_port.clone(),
        timeout: duration_from_secs(args.timeout),
        interval: duration_from_secs(args.interval),
        keep_listening: args.keep_listening,
        zero_io: args.zero_io,
        verbose: args.verbose,
        random_ports: args.random_ports,
        no_input: args.no_input,
        telnet: args.telnet,
        line_ending: if args.crlf { LineEnding::Crlf } else { LineEnding::Lf },
        jumbo: args.jumbo,
        options_after_connect: args.options_after_connect,
        strategy: if args.multipath || args.rich_connect {
            ConnectStrategy::Rich {
                multipath: args.multipath,
            }
        } else {
            ConnectStrategy::Classic
        },
        debug_events: args.debug_events,
        socket: file.socket.clone(),
        ..Default::default()
    };

    // `relaycat -l PORT` names only the port
    match (&args.destination, &args.port) {
        (Some(port), None) if args.listen && !args.unix => config.port = Some(port.clone()),
        (Some(destination), port) => {
            config.set_destination(destination);
            config.port = port.clone();
        }
        (None, _) => {}
    }

    if let Some(spec) = &args.proxy {
        let kind = ProxyKind::parse(&args.proxy_proto)?;
        let credentials = match &args.proxy_auth {
            Some(raw) => Some(ProxyCredentials::parse(raw)?),
            None => file.proxy.credentials(),
        };
        let proxy = ProxyConfig::parse(spec, kind)
            .context("Invalid proxy")?
            .with_credentials(credentials);
        config.proxy = Some(proxy);
    }

    Ok(config)
}

/// Map the level name, raising it to INFO when connection or event reports were asked for
fn log_level(name: &str, reporting: bool) -> Level {
    let level = match name.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" | "warning" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::WARN,
    };
    if reporting && level < Level::INFO {
        Level::INFO
    } else {
        level
    }
}

/// Setup logging on stderr; standard output carries relayed data
fn setup_logging(level: Level, json: bool) -> Result<()> {

    if json {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(level)
            .with_writer(std::io::stderr)
            .json()
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(level)
            .with_writer(std::io::stderr)
            .with_ansi(std::io::stderr().is_terminal())
            .with_target(false)
            .without_time()
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Config {
        let args = Args::try_parse_from(std::iter::once("relaycat").chain(args.iter().copied()))
            .unwrap();
        build_config(&args, &FileConfig::default()).unwrap()
    }

    #[test]
    fn test_connect_arguments() {
        let config = parse(&["-v", "-w", "3", "example.com", "20-25"]);
        assert_eq!(config.mode, Mode::Connect);
        assert_eq!(config.host.as_deref(), Some("example.com"));
        assert_eq!(config.port.as_deref(), Some("20-25"));
        assert_eq!(config.timeout, Some(std::time::Duration::from_secs(3)));
        assert!(config.verbose);
    }

    #[test]
    fn test_listen_with_port_only() {
        let config = parse(&["-l", "-k", "8080"]);
        assert_eq!(config.mode, Mode::Listen);
        assert!(config.host.is_none());
        assert_eq!(config.port.as_deref(), Some("8080"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_proxy_arguments() {
        let config = parse(&["-x", "proxy.local", "-X", "connect", "-P", "bob:pw", "host", "443"]);
        let proxy = config.proxy.unwrap();
        assert_eq!(proxy.kind, ProxyKind::HttpConnect);
        assert_eq!(proxy.port_or_default(), "3128");
        assert_eq!(proxy.credentials.unwrap().username, "bob");
    }

    #[test]
    fn test_reports_raise_log_level() {
        assert_eq!(log_level("warn", true), Level::INFO);
        assert_eq!(log_level("error", true), Level::INFO);
        assert_eq!(log_level("debug", true), Level::DEBUG);
        assert_eq!(log_level("warn", false), Level::WARN);
        assert_eq!(log_level("bogus", false), Level::WARN);
    }

    #[test]
    fn test_multipath_implies_rich_connect() {
        let config = parse(&["-M", "host", "80"]);
        assert_eq!(config.strategy, ConnectStrategy::Rich { multipath: true });
        assert_eq!(config.proto_name(), "mptcp");
    }
}
