//! Port validation and local free-port discovery.

use std::collections::BTreeSet;
use std::net::{IpAddr, Ipv4Addr, TcpListener};

use crate::error::{InstanceError, Result};

pub const MIN_PORT: i32 = 1;
pub const MAX_PORT: i32 = 65535;

/// Declared ports of one protocol. Ordered so generated specs are stable.
pub type PortSet = BTreeSet<i32>;

/// Transport protocol of a declared port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Tcp,
    Udp,
}

impl Protocol {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Tcp => "TCP",
            Self::Udp => "UDP",
        }
    }
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn validate_port(port: i32) -> Result<()> {
    if (MIN_PORT..=MAX_PORT).contains(&port) {
        Ok(())
    } else {
        Err(InstanceError::InvalidPort { port })
    }
}

#[must_use]
pub fn is_registered(ports: &PortSet, port: i32) -> bool {
    ports.contains(&port)
}

/// Ask the OS for an unused TCP port.
///
/// The listener is dropped before returning, so another process may grab
/// the port before the caller binds it. Callers must tolerate that.
pub fn discover_free_tcp_port() -> Result<u16> {
    free_port_on(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}

fn free_port_on(addr: IpAddr) -> Result<u16> {
    let listener = TcpListener::bind((addr, 0)).map_err(InstanceError::FreePortDiscovery)?;
    let port = listener
        .local_addr()
        .map_err(InstanceError::FreePortDiscovery)?
        .port();
    drop(listener);
    Ok(port)
}
