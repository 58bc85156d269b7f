//! IP matching — CIDR ranges and single addresses

use crate::error::{Result, RouterError};
use ipnet::IpNet;
use std::net::IpAddr;

/// IP address matcher supporting CIDR ranges and single IPs.
/// Single addresses are stored as host-length networks.
#[derive(Debug, Clone)]
pub(crate) struct IpMatcher {
    networks: Vec<IpNet>,
}

impl IpMatcher {
    /// Parse a list of IP/CIDR entries
    pub(crate) fn new(entries: &[String]) -> Result<Self> {
        let networks = entries
            .iter()
            .map(|entry| parse_entry(entry.trim()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { networks })
    }

    /// Check whether an address is covered by any entry
    pub(crate) fn contains(&self, ip: &IpAddr) -> bool {
        self.networks.iter().any(|net| net.contains(ip))
    }

    /// Check an address given as text; unparseable input never matches
    pub(crate) fn contains_str(&self, ip: &str) -> bool {
        ip.parse::<IpAddr>()
            .map(|addr| self.contains(&addr))
            .unwrap_or(false)
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.networks.is_empty()
    }
}

fn parse_entry(entry: &str) -> Result<IpNet> {
    if entry.contains('/') {
        entry
            .parse::<IpNet>()
            .map_err(|e| RouterError::Middleware(format!("Invalid CIDR '{}': {}", entry, e)))
    } else {
        let addr = entry.parse::<IpAddr>().map_err(|e| {
            RouterError::Middleware(format!("Invalid IP address '{}': {}", entry, e))
        })?;
        let host_len = if addr.is_ipv4() { 32 } else { 128 };
        IpNet::new(addr, host_len)
            .map_err(|e| RouterError::Middleware(format!("Invalid IP address '{}': {}", entry, e)))
    }
}
