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

//! Connection trait and error types for the framed protocols.

use std::fmt;
use std::io;
use std::net::{SocketAddr, TcpStream};
use std::time::Duration;

use crate::core::ser;

/// Errors a framed exchange can produce.
#[derive(Debug)]
pub enum Error {
	/// Error serializing or deserializing a framed object
	Serialization(ser::Error),
	/// Transport level read or write failure, deadline expiry included
	Connection(io::Error),
	/// A frame whose declared length exceeds the call-site's cap
	ObjectTooLarge(u64),
	/// The remote rejected the last object with the given reason
	Rejected(String),
	/// The remote chose to end the exchange; not a failure, but carried as
	/// an error so it propagates out of nested calls
	StopResponse,
}

impl fmt::Display for Error {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Error::Serialization(e) => write!(f, "serialization error: {}", e),
			Error::Connection(e) => write!(f, "connection error: {}", e),
			Error::ObjectTooLarge(n) => write!(f, "object too large: {} bytes", n),
			Error::Rejected(reason) => write!(f, "rejected: {}", reason),
			Error::StopResponse => write!(f, "remote sent stop"),
		}
	}
}

impl From<ser::Error> for Error {
	fn from(e: ser::Error) -> Error {
		Error::Serialization(e)
	}
}

impl From<io::Error> for Error {
	fn from(e: io::Error) -> Error {
		Error::Connection(e)
	}
}

/// A byte-stream connection with deadlines. The negotiation engines are
/// written against this so tests can drive them over in-memory pipes.
pub trait Conn: io::Read + io::Write {
	/// Bounds every subsequent read and write; `None` removes the bound.
	/// Expiry surfaces as an io error from the blocked call.
	fn set_deadline(&mut self, timeout: Option<Duration>) -> io::Result<()>;

	/// Address of the remote end, when the transport has one.
	fn peer_addr(&self) -> Option<SocketAddr> {
		None
	}
}

impl Conn for TcpStream {
	fn set_deadline(&mut self, timeout: Option<Duration>) -> io::Result<()> {
		self.set_read_timeout(timeout)?;
		self.set_write_timeout(timeout)
	}

	fn peer_addr(&self) -> Option<SocketAddr> {
		TcpStream::peer_addr(self).ok()
	}
}
