use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, ToSocketAddrs};

/// A proxy target: either a literal address or a name to resolve, plus port.
#[derive(Clone, Debug, PartialEq)]
pub enum TargetAddr {
	Domain(String, u16),
	IPv4(Ipv4Addr, u16),
	IPv6(Ipv6Addr, u16),
}

impl TargetAddr {
	pub fn port(&self) -> u16 {
		match self {
			TargetAddr::Domain(_, port) => *port,
			TargetAddr::IPv4(_, port) => *port,
			TargetAddr::IPv6(_, port) => *port,
		}
	}

	/// Resolves to a connectable [`SocketAddr`], performing DNS resolution for
	/// domain targets. Picks the first address the resolver returns.
	pub fn to_socket_addr(&self) -> std::io::Result<SocketAddr> {
		match self {
			TargetAddr::IPv4(ip, port) => Ok(SocketAddr::from((*ip, *port))),
			TargetAddr::IPv6(ip, port) => Ok(SocketAddr::from((*ip, *port))),
			TargetAddr::Domain(domain, port) => (domain.as_str(), *port)
				.to_socket_addrs()?
				.next()
				.ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, "no address found for domain")),
		}
	}
}

impl std::fmt::Display for TargetAddr {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			TargetAddr::Domain(domain, port) => write!(f, "{domain}:{port}"),
			TargetAddr::IPv4(ip, port) => write!(f, "{ip}:{port}"),
			TargetAddr::IPv6(ip, port) => write!(f, "[{ip}]:{port}"),
		}
	}
}
