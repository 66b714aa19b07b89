//! Port list expansion
//!
//! Expands `"80"` or `"lo-hi"` into the ordered list of ports to try.

use crate::error::{RelayError, Result};
use crate::helper::PORT_MAX;
use rand::rngs::OsRng;
use rand::seq::SliceRandom;

/// Ordered list of textual ports, each in `1..=65535`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortList {
    ports: Vec<String>,
}

fn parse_port(s: &str) -> Result<u32> {
    match s.parse::<u32>() {
        Ok(port) if (1..=PORT_MAX).contains(&port) => Ok(port),
        _ => Err(RelayError::config("port range not valid")),
    }
}

impl PortList {
    /// Expand a port argument
    ///
    /// Reversed bounds are swapped. With `random` set the expanded range
    /// is shuffled with the OS random source.
    pub fn build(spec: &str, random: bool) -> Result<Self> {
        let mut ports: Vec<String> = match spec.split_once('-') {
            Some((lo, hi)) => {
                let hi = parse_port(hi)?;
                let lo = parse_port(lo)?;
                let (lo, hi) = if lo > hi { (hi, lo) } else { (lo, hi) };
                (lo..=hi).map(|p| p.to_string()).collect()
            }
            None => vec![parse_port(spec)?.to_string()],
        };

        if random {
            ports.shuffle(&mut OsRng);
        }

        Ok(PortList { ports })
    }

    /// Ports in try order
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.ports.iter().map(String::as_str)
    }

    /// Number of ports
    pub fn len(&self) -> usize {
        self.ports.len()
    }

    /// Whether the list is empty (never true for a built list)
    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }
}
