// Copyright 2018 The Sia Developers
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Packet-shaped bandwidth limiting for byte streams.
//!
//! A limit is a `(packet_size, packets_per_second)` pair. Transfers are
//! clipped on packet boundaries and a fixed `1 / packets_per_second` sleep
//! follows every full packet. The pacing is intentionally simple, no refill
//! drift accounting; it bounds throughput rather than metering it
//! precisely.

use std::io::{self, Read, Write};
use std::net::SocketAddr;
use std::thread;
use std::time::Duration;

use crate::types::Conn;

/// One direction's bandwidth limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
	/// Bytes per packet
	pub packet_size: usize,
	/// Packets allowed per second; zero disables the limit
	pub packets_per_second: u64,
}

impl RateLimit {
	/// A limit that doesn't limit.
	pub fn unlimited() -> RateLimit {
		RateLimit {
			packet_size: 0,
			packets_per_second: 0,
		}
	}

	fn is_unlimited(&self) -> bool {
		self.packets_per_second == 0 || self.packet_size == 0
	}

	// Interval between packets.
	fn interval(&self) -> Duration {
		Duration::from_nanos(1_000_000_000 / self.packets_per_second)
	}

	// Clips a transfer to the packet boundary.
	fn clip(&self, len: usize) -> usize {
		len.min(self.packet_size)
	}

	// Sleeps the inter-packet interval if a full packet just moved.
	fn pace(&self, moved: usize) {
		if moved == self.packet_size {
			thread::sleep(self.interval());
		}
	}
}

/// A reader that caps its throughput at `packet_size * packets_per_second`
/// bytes per second.
pub struct ThrottledReader<R: Read> {
	inner: R,
	limit: RateLimit,
}

impl<R: Read> ThrottledReader<R> {
	/// Adds throttling to a reader.
	pub fn new(inner: R, limit: RateLimit) -> ThrottledReader<R> {
		ThrottledReader { inner, limit }
	}

	/// Consumes this wrapper, returning the underlying reader.
	pub fn into_inner(self) -> R {
		self.inner
	}
}

impl<R: Read> Read for ThrottledReader<R> {
	fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
		if self.limit.is_unlimited() {
			return self.inner.read(buf);
		}
		let clipped = self.limit.clip(buf.len());
		let n = self.inner.read(&mut buf[..clipped])?;
		self.limit.pace(n);
		Ok(n)
	}
}

/// A writer that caps its throughput at `packet_size * packets_per_second`
/// bytes per second.
pub struct ThrottledWriter<W: Write> {
	inner: W,
	limit: RateLimit,
}

impl<W: Write> ThrottledWriter<W> {
	/// Adds throttling to a writer.
	pub fn new(inner: W, limit: RateLimit) -> ThrottledWriter<W> {
		ThrottledWriter { inner, limit }
	}

	/// Consumes this wrapper, returning the underlying writer.
	pub fn into_inner(self) -> W {
		self.inner
	}
}

impl<W: Write> Write for ThrottledWriter<W> {
	fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
		if self.limit.is_unlimited() {
			return self.inner.write(buf);
		}
		let clipped = self.limit.clip(buf.len());
		let n = self.inner.write(&buf[..clipped])?;
		self.limit.pace(n);
		Ok(n)
	}

	fn flush(&mut self) -> io::Result<()> {
		self.inner.flush()
	}
}

/// A connection with independent read and write limits. Deadlines,
/// addresses and close semantics of the wrapped connection pass through
/// unchanged.
pub struct Throttled<S: Conn> {
	inner: S,
	read_limit: RateLimit,
	write_limit: RateLimit,
}

impl<S: Conn> Throttled<S> {
	/// Wraps a connection with the given per-direction limits.
	pub fn new(inner: S, read_limit: RateLimit, write_limit: RateLimit) -> Throttled<S> {
		Throttled {
			inner,
			read_limit,
			write_limit,
		}
	}

	/// Consumes this wrapper, returning the underlying connection.
	pub fn into_inner(self) -> S {
		self.inner
	}
}

impl<S: Conn> Read for Throttled<S> {
	fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
		if self.read_limit.is_unlimited() {
			return self.inner.read(buf);
		}
		let clipped = self.read_limit.clip(buf.len());
		let n = self.inner.read(&mut buf[..clipped])?;
		self.read_limit.pace(n);
		Ok(n)
	}
}

impl<S: Conn> Write for Throttled<S> {
	fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
		if self.write_limit.is_unlimited() {
			return self.inner.write(buf);
		}
		let clipped = self.write_limit.clip(buf.len());
		let n = self.inner.write(&buf[..clipped])?;
		self.write_limit.pace(n);
		Ok(n)
	}

	fn flush(&mut self) -> io::Result<()> {
		self.inner.flush()
	}
}

impl<S: Conn> Conn for Throttled<S> {
	fn set_deadline(&mut self, timeout: Option<Duration>) -> io::Result<()> {
		self.inner.set_deadline(timeout)
	}

	fn peer_addr(&self) -> Option<SocketAddr> {
		self.inner.peer_addr()
	}
}
