/// Dialable endpoints: TCP/IP host:port pairs or local domain-socket paths
use crate::error::{TandemError, TandemResult};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::net::{IpAddr, Ipv4Addr, SocketAddr, ToSocketAddrs};
use std::path::{Path, PathBuf};

/// Address family. Domain sockets order before IP addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AddressFamily {
    Unix,
    Inet,
}

/// A resolved endpoint.
///
/// Equality, ordering and hashing only look at the fields that matter for the
/// family: IP and port for `Inet`, the path for `Unix`. Addresses of different
/// families are never equal.
#[derive(Debug, Clone)]
pub enum Address {
    Inet(SocketAddr),
    Unix(PathBuf),
}

impl Address {
    /// Wildcard address for a listener on `port`
    pub fn listen(port: u16) -> Self {
        Address::Inet(SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port))
    }

    /// Remote endpoint. A zero `port` means `host` is a domain-socket path;
    /// otherwise `host` is an IP literal or a name to resolve.
    pub fn endpoint(host: &str, port: u16) -> TandemResult<Self> {
        if port == 0 {
            return Ok(Address::Unix(PathBuf::from(host)));
        }

        if let Ok(ip) = host.parse::<IpAddr>() {
            return Ok(Address::Inet(SocketAddr::new(ip, port)));
        }

        let mut resolved = (host, port)
            .to_socket_addrs()
            .map_err(|e| TandemError::AddressResolution {
                host: host.to_string(),
                message: e.to_string(),
            })?;

        resolved
            .next()
            .map(Address::Inet)
            .ok_or_else(|| TandemError::AddressResolution {
                host: host.to_string(),
                message: "no addresses returned".to_string(),
            })
    }

    pub fn family(&self) -> AddressFamily {
        match self {
            Address::Inet(_) => AddressFamily::Inet,
            Address::Unix(_) => AddressFamily::Unix,
        }
    }

    /// Port number, zero for domain sockets
    pub fn port(&self) -> u16 {
        match self {
            Address::Inet(addr) => addr.port(),
            Address::Unix(_) => 0,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        match self {
            Address::Unix(path) => Some(path),
            Address::Inet(_) => None,
        }
    }

    /// Domain sockets are always local; IP addresses are local when loopback
    pub fn is_local_host(&self) -> bool {
        match self {
            Address::Unix(_) => true,
            Address::Inet(addr) => addr.ip().is_loopback(),
        }
    }

    /// Same check as [`Address::is_local_host`]
    pub fn localhost(&self) -> bool {
        self.is_local_host()
    }
}

impl PartialEq for Address {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Address::Inet(a), Address::Inet(b)) => a.ip() == b.ip() && a.port() == b.port(),
            (Address::Unix(a), Address::Unix(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Address {}

impl Ord for Address {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Address::Inet(a), Address::Inet(b)) => {
                (a.ip(), a.port()).cmp(&(b.ip(), b.port()))
            }
            (Address::Unix(a), Address::Unix(b)) => a.cmp(b),
            _ => self.family().cmp(&other.family()),
        }
    }
}

impl PartialOrd for Address {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Hash for Address {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.family().hash(state);
        match self {
            Address::Inet(addr) => {
                addr.ip().hash(state);
                addr.port().hash(state);
            }
            Address::Unix(path) => path.hash(state),
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Address::Inet(addr) => write!(f, "{}", addr),
            Address::Unix(path) => write!(f, "{} (unix domain socket)", path.display()),
        }
    }
}
