use crate::error::ProbeError;
use std::net::{IpAddr, ToSocketAddrs};

/// Turns a target address (hostname or literal IP) into one IP.
pub trait Resolver: Send + Sync {
    fn resolve(&self, host: &str) -> Result<IpAddr, ProbeError>;
}

/// Platform resolver. Prefers IPv4 when a name has both families.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemResolver;

impl Resolver for SystemResolver {
    fn resolve(&self, host: &str) -> Result<IpAddr, ProbeError> {
        if let Ok(ip) = host.parse::<IpAddr>() {
            return Ok(ip);
        }

        let addrs: Vec<IpAddr> = (host, 0)
            .to_socket_addrs()
            .map_err(|source| ProbeError::Resolve {
                host: host.to_string(),
                source,
            })?
            .map(|addr| addr.ip())
            .collect();

        addrs
            .iter()
            .find(|ip| ip.is_ipv4())
            .or_else(|| addrs.first())
            .copied()
            .ok_or_else(|| ProbeError::NoAddress(host.to_string()))
    }
}
