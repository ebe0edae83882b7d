use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;

/// A listener bind address.
///
/// The teacher's version of this type supports binding a logical name to
/// several concrete addresses (e.g. one per network family). Every listener
/// this agent opens — a UDP processor, the gRPC reporter's loopback admin
/// port, or the sampling HTTP server — binds to exactly one address, so this
/// is kept to the single-address case rather than generalized back out.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Address(SocketAddr);

impl Address {
	pub fn new(addr: SocketAddr) -> Self {
		Address(addr)
	}

	pub fn as_socket_addr(&self) -> SocketAddr {
		self.0
	}
}

impl From<SocketAddr> for Address {
	fn from(addr: SocketAddr) -> Self {
		Address(addr)
	}
}

impl FromStr for Address {
	type Err = std::net::AddrParseError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Ok(Address(s.parse()?))
	}
}

impl fmt::Display for Address {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl IntoIterator for Address {
	type Item = SocketAddr;
	type IntoIter = std::iter::Once<SocketAddr>;

	fn into_iter(self) -> Self::IntoIter {
		std::iter::once(self.0)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn into_iter_yields_one_address() {
		let addr: Address = "127.0.0.1:8080".parse().unwrap();
		let collected: Vec<_> = addr.into_iter().collect();
		assert_eq!(collected, vec!["127.0.0.1:8080".parse::<SocketAddr>().unwrap()]);
	}
}
