//! Socket event observer
//!
//! An optional task that receives lifecycle events from the pump over an
//! unbounded channel and logs them. Sending never blocks the pump; the
//! task is joined once the pump loop has exited.

use std::fmt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::info;

/// Connection lifecycle notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PumpEvent {
    /// Pump started on a connection
    Connected {
        /// Printable peer address
        peer: String,
    },
    /// Bytes read from the network and written to local output
    Received(usize),
    /// Bytes written to the network from local input
    Sent(usize),
    /// TELNET refusals written back to the network
    TelnetRefused(usize),
    /// Network peer shut down its write side
    ReadClosed,
    /// Local input ended; our write side was shut down
    WriteClosed,
    /// Nothing happened within the idle timeout
    TimedOut,
    /// I/O failure ended the pump
    Failed(String),
    /// Pump loop exited
    Disconnected,
}

impl fmt::Display for PumpEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PumpEvent::Connected { peer } => write!(f, "CONNECTED {}", peer),
            PumpEvent::Received(n) => write!(f, "READ {} bytes", n),
            PumpEvent::Sent(n) => write!(f, "WRITE {} bytes", n),
            PumpEvent::TelnetRefused(n) => write!(f, "TELNET {} refusal bytes", n),
            PumpEvent::ReadClosed => write!(f, "READCLOSED"),
            PumpEvent::WriteClosed => write!(f, "WRITECLOSED"),
            PumpEvent::TimedOut => write!(f, "TIMEOUT"),
            PumpEvent::Failed(reason) => write!(f, "ERROR {}", reason),
            PumpEvent::Disconnected => write!(f, "DISCONNECTED"),
        }
    }
}

/// Sending half handed to the pump; a disabled sink drops every event
#[derive(Debug, Clone, Default)]
pub struct EventSink(Option<mpsc::UnboundedSender<PumpEvent>>);

impl EventSink {
    /// A sink that discards events
    pub fn disabled() -> Self {
        EventSink(None)
    }

    /// Publish an event
    pub fn emit(&self, event: PumpEvent) {
        if let Some(tx) = &self.0 {
            // observer gone; nothing to report to
            let _ = tx.send(event);
        }
    }
}

/// Totals gathered by the observer task
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObserverSummary {
    /// Events received
    pub events: usize,
    /// Bytes received from the network
    pub bytes_received: usize,
    /// Bytes sent to the network
    pub bytes_sent: usize,
}

/// Handle to the running observer task
#[derive(Debug)]
pub struct Observer {
    handle: JoinHandle<ObserverSummary>,
}

impl Observer {
    /// Spawn the observer and return it with the sink feeding it
    pub fn spawn() -> (Observer, EventSink) {
        let (tx, mut rx) = mpsc::unbounded_channel::<PumpEvent>();

        let handle = tokio::spawn(async move {
            let mut summary = ObserverSummary::default();
            while let Some(event) = rx.recv().await {
                summary.events += 1;
                match &event {
                    PumpEvent::Received(n) => summary.bytes_received += n,
                    PumpEvent::Sent(n) => summary.bytes_sent += n,
                    _ => {}
                }
                info!("Received {} event", event);
            }
            info!(
                "reached EOF ({} events, {} bytes in, {} bytes out)",
                summary.events, summary.bytes_received, summary.bytes_sent
            );
            summary
        });

        (Observer { handle }, EventSink(Some(tx)))
    }

    /// Close the sink and wait for the task to drain
    pub async fn join(self, sink: EventSink) -> ObserverSummary {
        drop(sink);
        match self.handle.await {
            Ok(summary) => summary,
            Err(e) => {
                tracing::warn!("event observer task failed: {}", e);
                ObserverSummary::default()
            }
        }
    }
}
