use bytes::BytesMut;
use crossbeam_channel::{Receiver, Sender, unbounded};

/// A buffer checked out of a [`BufferPool`]. Ownership transfers on
/// `acquire`: whoever holds a `PooledBuffer` is its sole owner, matching the
/// "single-writer discipline" the ownership model requires in place of
/// shared pointers into a GC'd pool. Dropping it returns the backing storage
/// to the pool's free list — the Rust encoding of `release`.
pub struct PooledBuffer {
	buf: BytesMut,
	release: Sender<BytesMut>,
}

impl PooledBuffer {
	pub fn buf_mut(&mut self) -> &mut BytesMut {
		&mut self.buf
	}

	pub fn as_slice(&self) -> &[u8] {
		&self.buf
	}

	pub fn len(&self) -> usize {
		self.buf.len()
	}

	pub fn is_empty(&self) -> bool {
		self.buf.is_empty()
	}

	pub fn capacity(&self) -> usize {
		self.buf.capacity()
	}
}

impl Drop for PooledBuffer {
	fn drop(&mut self) {
		let mut buf = std::mem::take(&mut self.buf);
		buf.clear();
		// A full free list only happens if the pool itself was dropped first;
		// in that case there's nothing left to return the buffer to.
		let _ = self.release.send(buf);
	}
}

/// Frame Buffer Pool (C2): a free list of fixed-capacity `BytesMut`s.
/// Unbounded — it grows to the steady-state working set and reuses
/// aggressively rather than ever blocking an `acquire`.
pub struct BufferPool {
	capacity: usize,
	free: Receiver<BytesMut>,
	release: Sender<BytesMut>,
}

impl BufferPool {
	pub fn new(capacity: usize) -> Self {
		let (release, free) = unbounded();
		BufferPool {
			capacity,
			free,
			release,
		}
	}

	/// Pops an idle buffer or allocates a fresh one at `capacity`.
	pub fn acquire(&self) -> PooledBuffer {
		let mut buf = self
			.free
			.try_recv()
			.unwrap_or_else(|_| BytesMut::with_capacity(self.capacity));
		if buf.capacity() < self.capacity {
			buf.reserve(self.capacity - buf.capacity());
		}
		PooledBuffer {
			buf,
			release: self.release.clone(),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn acquire_reuses_released_buffers() {
		let pool = BufferPool::new(64);
		let first_ptr = {
			let mut buf = pool.acquire();
			buf.buf_mut().extend_from_slice(b"hello");
			buf.as_slice().as_ptr()
		};
		let second = pool.acquire();
		assert!(second.is_empty());
		assert_eq!(second.as_slice().as_ptr(), first_ptr);
	}

	#[test]
	fn acquire_allocates_when_pool_empty() {
		let pool = BufferPool::new(32);
		let buf = pool.acquire();
		assert_eq!(buf.capacity(), 32);
	}
}
