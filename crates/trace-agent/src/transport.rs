use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::net::UdpSocket;

use crate::errors::TransportError;

/// Datagram Transport (C1): owns a bound UDP socket and presents it as a
/// byte-stream reader plus addressing. Exactly one reader loop may use a
/// given `Transport` at a time (spec.md §4.1) — the type itself doesn't
/// enforce this beyond requiring `&self` access to `read`, since tokio's
/// `UdpSocket::recv_from` is safe to call concurrently but doing so yields
/// unspecified interleavings, as documented.
pub struct Transport {
	socket: UdpSocket,
	local_addr: SocketAddr,
	closed: AtomicBool,
}

impl Transport {
	pub async fn open(bind_address: SocketAddr) -> Result<Self, TransportError> {
		let socket = UdpSocket::bind(bind_address).await.map_err(|e| {
			if e.kind() == std::io::ErrorKind::AddrInUse {
				TransportError::AddressInUse(bind_address)
			} else {
				TransportError::ResolveFailed(e)
			}
		})?;
		let local_addr = socket.local_addr().map_err(TransportError::ResolveFailed)?;
		Ok(Transport {
			socket,
			local_addr,
			closed: AtomicBool::new(false),
		})
	}

	pub fn local_addr(&self) -> SocketAddr {
		self.local_addr
	}

	/// Reads exactly one datagram. `n <= buf.len()`; a datagram larger than
	/// `buf` is truncated to its capacity by the OS, per UDP semantics.
	pub async fn read(&self, buf: &mut [u8]) -> Result<(usize, SocketAddr), TransportError> {
		if self.closed.load(Ordering::Acquire) {
			return Err(TransportError::NotOpen);
		}
		self.socket.recv_from(buf).await.map_err(TransportError::Io)
	}

	/// Idempotent only in the sense that a second call is a detectable
	/// error, matching spec.md §4.1's `AlreadyClosed` contract; the
	/// underlying socket is released regardless on `Drop`.
	pub fn close(&self) -> Result<(), TransportError> {
		if self.closed.swap(true, Ordering::AcqRel) {
			return Err(TransportError::AlreadyClosed);
		}
		Ok(())
	}

	/// Best-effort OS socket-option tuning. Platforms (or socket states)
	/// that reject the call still report success, since spec.md §4.1
	/// requires `setReceiveBufferSize` to never surface as a hard failure.
	pub fn set_receive_buffer_size(&self, bytes: usize) {
		let raw = socket2::SockRef::from(&self.socket);
		if let Err(err) = raw.set_recv_buffer_size(bytes) {
			tracing::debug!(%err, bytes, "setReceiveBufferSize ignored");
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn open_binds_ephemeral_port() {
		let t = Transport::open("127.0.0.1:0".parse().unwrap()).await.unwrap();
		assert_ne!(t.local_addr().port(), 0);
	}

	#[tokio::test]
	async fn close_twice_errors() {
		let t = Transport::open("127.0.0.1:0".parse().unwrap()).await.unwrap();
		t.close().unwrap();
		assert!(matches!(t.close(), Err(TransportError::AlreadyClosed)));
	}

	#[tokio::test]
	async fn read_after_close_fails() {
		let t = Transport::open("127.0.0.1:0".parse().unwrap()).await.unwrap();
		t.close().unwrap();
		let mut buf = [0u8; 16];
		assert!(matches!(t.read(&mut buf).await, Err(TransportError::NotOpen)));
	}

	#[tokio::test]
	async fn oversized_datagram_is_truncated() {
		let server = Transport::open("127.0.0.1:0".parse().unwrap()).await.unwrap();
		let addr = server.local_addr();
		let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
		client.send_to(&[7u8; 64], addr).await.unwrap();

		let mut small = [0u8; 8];
		let (n, _) = server.read(&mut small).await.unwrap();
		assert_eq!(n, 8);
	}
}
