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

//! Object framing and the negotiation response vocabulary.
//!
//! Every object on the wire is an 8-byte little-endian length prefix
//! followed by that many bytes of the object's canonical serialization.
//! Each read site supplies its own cap on the declared length, so a remote
//! can never talk us into an unbounded allocation.
//!
//! Responses are framed strings: `accept` and `stop` are the two
//! well-known values, anything else is a rejection carrying its reason.

use std::io::{Read, Write};

use crate::core::ser::{self, Readable, Writeable};
use crate::types::Error;

/// Response indicating the last object was accepted.
pub const ACCEPT_RESPONSE: &str = "accept";

/// Response indicating the sender wants to end the exchange cleanly.
pub const STOP_RESPONSE: &str = "stop";

/// Cap on a response frame. Rejection reasons are short typed strings.
pub const MAX_RESPONSE_LEN: u64 = 256;

/// Writes a length-prefixed object to the stream and flushes it.
pub fn write_object<S: Write + ?Sized, T: Writeable>(stream: &mut S, object: &T) -> Result<(), Error> {
	let body = ser::ser_vec(object)?;
	stream.write_all(&(body.len() as u64).to_le_bytes())?;
	stream.write_all(&body)?;
	stream.flush()?;
	Ok(())
}

/// Reads a length-prefixed object, rejecting frames above `max_len` before
/// any allocation happens.
pub fn read_object<S: Read + ?Sized, T: Readable>(stream: &mut S, max_len: u64) -> Result<T, Error> {
	let body = read_frame(stream, max_len)?;
	let mut slice = &body[..];
	let object = ser::deserialize(&mut slice)?;
	if !slice.is_empty() {
		// trailing garbage means the frame wasn't the object it claimed
		return Err(Error::Serialization(ser::Error::CorruptedData));
	}
	Ok(object)
}

fn read_frame<S: Read + ?Sized>(stream: &mut S, max_len: u64) -> Result<Vec<u8>, Error> {
	let mut prefix = [0u8; 8];
	stream.read_exact(&mut prefix)?;
	let len = u64::from_le_bytes(prefix);
	if len > max_len {
		return Err(Error::ObjectTooLarge(len));
	}
	let mut body = vec![0u8; len as usize];
	stream.read_exact(&mut body)?;
	Ok(body)
}

/// Writes a framed string.
pub fn write_string<S: Write + ?Sized>(stream: &mut S, s: &str) -> Result<(), Error> {
	stream.write_all(&(s.len() as u64).to_le_bytes())?;
	stream.write_all(s.as_bytes())?;
	stream.flush()?;
	Ok(())
}

/// Reads a framed string no longer than `max_len` bytes.
pub fn read_string<S: Read + ?Sized>(stream: &mut S, max_len: u64) -> Result<String, Error> {
	let body = read_frame(stream, max_len)?;
	String::from_utf8(body).map_err(|_| Error::Serialization(ser::Error::CorruptedData))
}

/// Signals acceptance of the last object received.
pub fn write_acceptance<S: Write + ?Sized>(stream: &mut S) -> Result<(), Error> {
	write_string(stream, ACCEPT_RESPONSE)
}

/// Signals a clean end of the exchange.
pub fn write_stop<S: Write + ?Sized>(stream: &mut S) -> Result<(), Error> {
	write_string(stream, STOP_RESPONSE)
}

/// Signals rejection of the last object, with a reason the remote can
/// classify.
pub fn write_rejection<S: Write + ?Sized>(stream: &mut S, reason: &str) -> Result<(), Error> {
	write_string(stream, reason)
}

/// Reads the remote's response to the last object sent. `accept` maps to
/// `Ok`, `stop` to `Error::StopResponse`, anything else is a rejection with
/// the string as reason.
pub fn read_acceptance<S: Read + ?Sized>(stream: &mut S) -> Result<(), Error> {
	let response = read_string(stream, MAX_RESPONSE_LEN)?;
	match response.as_str() {
		ACCEPT_RESPONSE => Ok(()),
		STOP_RESPONSE => Err(Error::StopResponse),
		reason => Err(Error::Rejected(reason.to_owned())),
	}
}
