//! Host port pools handed out to fleet containers.
//!
//! Two disjoint ranges exist: one for the containers' control servers and one
//! for their HTTP proxies. The allocator never writes anything; it only scans
//! the ports the registry reports as used and proposes the lowest free one.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::{FleetError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortRange {
    pub start: u16,
    pub end: u16,
}

impl PortRange {
    pub const fn new(start: u16, end: u16) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, port: u16) -> bool {
        port >= self.start && port <= self.end
    }

    pub fn overlaps(&self, other: &PortRange) -> bool {
        self.start <= other.end && other.start <= self.end
    }
}

impl fmt::Display for PortRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortPool {
    Control,
    Proxy,
}

impl PortPool {
    /// Capitalised name for user-facing messages.
    pub fn label(&self) -> &'static str {
        match self {
            PortPool::Control => "Control",
            PortPool::Proxy => "Proxy",
        }
    }
}

impl fmt::Display for PortPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortPool::Control => write!(f, "control"),
            PortPool::Proxy => write!(f, "proxy"),
        }
    }
}

/// The next free port of each pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortPair {
    pub control_port: u16,
    pub proxy_port: u16,
}

#[derive(Debug, Clone, Copy)]
pub struct PortAllocator {
    control: PortRange,
    proxy: PortRange,
}

impl PortAllocator {
    pub fn new(control: PortRange, proxy: PortRange) -> Result<Self> {
        if control.start > control.end || proxy.start > proxy.end {
            return Err(FleetError::Validation(format!(
                "Port ranges must not be empty (control {control}, proxy {proxy})"
            )));
        }
        if control.overlaps(&proxy) {
            return Err(FleetError::Validation(format!(
                "Control range {control} overlaps proxy range {proxy}"
            )));
        }
        Ok(Self { control, proxy })
    }

    pub fn range(&self, pool: PortPool) -> PortRange {
        match pool {
            PortPool::Control => self.control,
            PortPool::Proxy => self.proxy,
        }
    }

    /// Smallest port of `pool` that is not in `used`.
    pub fn next_free(&self, pool: PortPool, used: &[u16]) -> Result<u16> {
        let range = self.range(pool);
        (range.start..=range.end)
            .find(|port| !used.contains(port))
            .ok_or(FleetError::RangeExhausted {
                pool,
                start: range.start,
                end: range.end,
            })
    }

    pub fn next_pair(&self, used: &[u16]) -> Result<PortPair> {
        Ok(PortPair {
            control_port: self.next_free(PortPool::Control, used)?,
            proxy_port: self.next_free(PortPool::Proxy, used)?,
        })
    }

    /// Range check only. Collisions are checked against the registry at creation time.
    pub fn validate(&self, pool: PortPool, port: u16) -> Result<()> {
        let range = self.range(pool);
        if range.contains(port) {
            Ok(())
        } else {
            Err(FleetError::Validation(format!(
                "{} port must be between {} and {}",
                pool.label(),
                range.start,
                range.end
            )))
        }
    }
}
