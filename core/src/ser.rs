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

//! Serialization and deserialization layer specialized for binary encoding.
//! Ensures consistency and safety. Basically a minimal subset of
//! rustc_serialize customized for our need.
//!
//! The encoding is canonical: fixed-width integers little-endian,
//! variable-length fields as an 8-byte little-endian length followed by that
//! many bytes, nested objects recursively. The same value always encodes to
//! the same bytes, which block and transaction ids depend on.
//!
//! To use it simply implement `Writeable` or `Readable` and then use the
//! `serialize` or `deserialize` functions on them as appropriate.

use std::io::{self, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt};

/// Largest single allocation a reader will perform for a variable-length
/// field. Frames are capped per call-site before they reach the reader, this
/// bounds what a corrupt length prefix can ask for.
const MAX_ALLOC_LEN: u64 = 1 << 27;

/// Largest element count accepted when reading a collection.
const MAX_ELEMENTS: u64 = 1 << 20;

/// Possible errors deriving from serializing or deserializing.
#[derive(Clone, Eq, PartialEq, Debug, Fail)]
pub enum Error {
	/// Wraps an io error produced when reading or writing
	#[fail(display = "IO error: {}", _0)]
	IOErr(String, io::ErrorKind),
	/// Expected a given value that wasn't found
	#[fail(display = "expected {:?}, got {:?}", expected, received)]
	UnexpectedData {
		/// What we wanted
		expected: Vec<u8>,
		/// What we got
		received: Vec<u8>,
	},
	/// Data wasn't in a consumable format
	#[fail(display = "corrupted data")]
	CorruptedData,
	/// When asked to read too much data
	#[fail(display = "too large read: {}", _0)]
	TooLargeReadErr(u64),
	/// A discriminant byte that no known variant claims
	#[fail(display = "unknown variant: {}", _0)]
	UnknownVariant(u8),
}

impl From<io::Error> for Error {
	fn from(e: io::Error) -> Error {
		Error::IOErr(format!("{}", e), e.kind())
	}
}

/// Signal to a serializable object how much of its data should be serialized
#[derive(Copy, Clone, PartialEq, Eq)]
pub enum SerializationMode {
	/// Serialize everything sufficiently to fully reconstruct the object
	Full,
	/// Serialize what is required for hashing; ids that must not cover
	/// signatures rely on this
	Hash,
}

/// Implementations defined how different numbers and binary structures are
/// written to an underlying stream or container (depending on implementation).
pub trait Writer {
	/// The mode this serializer is writing in
	fn serialization_mode(&self) -> SerializationMode;

	/// Writes a fixed number of bytes. The reader is expected to know the
	/// actual length on read.
	fn write_fixed_bytes<T: AsRef<[u8]>>(&mut self, bytes: T) -> Result<(), Error>;

	/// Writes a u8 as bytes
	fn write_u8(&mut self, n: u8) -> Result<(), Error> {
		self.write_fixed_bytes(&[n])
	}

	/// Writes a u16 as little-endian bytes
	fn write_u16(&mut self, n: u16) -> Result<(), Error> {
		self.write_fixed_bytes(&n.to_le_bytes())
	}

	/// Writes a u32 as little-endian bytes
	fn write_u32(&mut self, n: u32) -> Result<(), Error> {
		self.write_fixed_bytes(&n.to_le_bytes())
	}

	/// Writes a u64 as little-endian bytes
	fn write_u64(&mut self, n: u64) -> Result<(), Error> {
		self.write_fixed_bytes(&n.to_le_bytes())
	}

	/// Writes an i64 as little-endian bytes
	fn write_i64(&mut self, n: i64) -> Result<(), Error> {
		self.write_fixed_bytes(&n.to_le_bytes())
	}

	/// Writes a variable-length field, the length encoded as a u64 prefix
	fn write_bytes<T: AsRef<[u8]>>(&mut self, bytes: T) -> Result<(), Error> {
		self.write_u64(bytes.as_ref().len() as u64)?;
		self.write_fixed_bytes(bytes)
	}
}

/// Implementations defined how different numbers and binary structures are
/// read from an underlying stream or container (depending on implementation).
pub trait Reader {
	/// Read a u8 from the underlying Read
	fn read_u8(&mut self) -> Result<u8, Error>;
	/// Read a little-endian u16
	fn read_u16(&mut self) -> Result<u16, Error>;
	/// Read a little-endian u32
	fn read_u32(&mut self) -> Result<u32, Error>;
	/// Read a little-endian u64
	fn read_u64(&mut self) -> Result<u64, Error>;
	/// Read a little-endian i64
	fn read_i64(&mut self) -> Result<i64, Error>;
	/// Read a variable-length field, expecting its u64 length prefix first
	fn read_bytes_len_prefix(&mut self) -> Result<Vec<u8>, Error>;
	/// Read a fixed number of bytes from the underlying reader.
	fn read_fixed_bytes(&mut self, length: usize) -> Result<Vec<u8>, Error>;
	/// Consumes a byte from the reader, producing an error if it doesn't have
	/// the expected value
	fn expect_u8(&mut self, val: u8) -> Result<u8, Error>;
}

/// Trait that every type that can be serialized as binary must implement.
/// Writes directly to a Writer, a utility type thinly wrapping an
/// underlying Write implementation.
pub trait Writeable {
	/// Write the data held by this Writeable to the provided writer
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), Error>;
}

/// Trait that every type that can be deserialized from binary must implement.
/// Reads directly to a Reader, a utility type thinly wrapping an
/// underlying Read implementation.
pub trait Readable
where
	Self: Sized,
{
	/// Reads the data necessary to this Readable from the provided reader
	fn read(reader: &mut dyn Reader) -> Result<Self, Error>;
}

/// Deserializes a Readable from any std::io::Read implementation.
pub fn deserialize<T: Readable>(source: &mut dyn Read) -> Result<T, Error> {
	let mut reader = BinReader { source };
	T::read(&mut reader)
}

/// Serializes a Writeable into any std::io::Write implementation.
pub fn serialize<W: Writeable>(sink: &mut dyn Write, thing: &W) -> Result<(), Error> {
	let mut writer = BinWriter { sink };
	thing.write(&mut writer)
}

/// Utility function to serialize a writeable directly in memory using a
/// Vec<u8>.
pub fn ser_vec<W: Writeable>(thing: &W) -> Result<Vec<u8>, Error> {
	let mut vec = vec![];
	serialize(&mut vec, thing)?;
	Ok(vec)
}

/// Reads a collection of serialized items into a Vec.
pub fn read_multi<T: Readable>(reader: &mut dyn Reader, count: u64) -> Result<Vec<T>, Error> {
	if count > MAX_ELEMENTS {
		return Err(Error::TooLargeReadErr(count));
	}
	let mut result = Vec::with_capacity(count as usize);
	for _ in 0..count {
		result.push(T::read(reader)?);
	}
	Ok(result)
}

/// Writes a length-prefixed collection of serialized items.
pub fn write_multi<W: Writer, T: Writeable>(writer: &mut W, items: &[T]) -> Result<(), Error> {
	writer.write_u64(items.len() as u64)?;
	for item in items {
		item.write(writer)?;
	}
	Ok(())
}

/// Utility wrapper for an underlying byte Reader. Defines higher level methods
/// to read numbers, byte vectors, hashes, etc.
pub struct BinReader<'a> {
	source: &'a mut dyn Read,
}

impl<'a> BinReader<'a> {
	/// Constructor for a new BinReader for the provided source
	pub fn new(source: &'a mut dyn Read) -> BinReader<'a> {
		BinReader { source }
	}
}

impl<'a> Reader for BinReader<'a> {
	fn read_u8(&mut self) -> Result<u8, Error> {
		self.source.read_u8().map_err(From::from)
	}
	fn read_u16(&mut self) -> Result<u16, Error> {
		self.source.read_u16::<LittleEndian>().map_err(From::from)
	}
	fn read_u32(&mut self) -> Result<u32, Error> {
		self.source.read_u32::<LittleEndian>().map_err(From::from)
	}
	fn read_u64(&mut self) -> Result<u64, Error> {
		self.source.read_u64::<LittleEndian>().map_err(From::from)
	}
	fn read_i64(&mut self) -> Result<i64, Error> {
		self.source.read_i64::<LittleEndian>().map_err(From::from)
	}
	fn read_bytes_len_prefix(&mut self) -> Result<Vec<u8>, Error> {
		let len = self.read_u64()?;
		if len > MAX_ALLOC_LEN {
			return Err(Error::TooLargeReadErr(len));
		}
		self.read_fixed_bytes(len as usize)
	}
	fn read_fixed_bytes(&mut self, length: usize) -> Result<Vec<u8>, Error> {
		if length as u64 > MAX_ALLOC_LEN {
			return Err(Error::TooLargeReadErr(length as u64));
		}
		let mut buf = vec![0; length];
		self.source
			.read_exact(&mut buf)
			.map(move |_| buf)
			.map_err(From::from)
	}
	fn expect_u8(&mut self, val: u8) -> Result<u8, Error> {
		let b = self.read_u8()?;
		if b == val {
			Ok(b)
		} else {
			Err(Error::UnexpectedData {
				expected: vec![val],
				received: vec![b],
			})
		}
	}
}

/// Utility wrapper for an underlying byte Writer. Defines higher level methods
/// to write numbers, byte vectors, hashes, etc.
pub struct BinWriter<'a> {
	sink: &'a mut dyn Write,
}

impl<'a> BinWriter<'a> {
	/// Wraps a standard Write in a new BinWriter
	pub fn new(sink: &'a mut dyn Write) -> BinWriter<'a> {
		BinWriter { sink }
	}
}

impl<'a> Writer for BinWriter<'a> {
	fn serialization_mode(&self) -> SerializationMode {
		SerializationMode::Full
	}

	fn write_fixed_bytes<T: AsRef<[u8]>>(&mut self, bytes: T) -> Result<(), Error> {
		self.sink.write_all(bytes.as_ref())?;
		Ok(())
	}
}

impl Writeable for Vec<u8> {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), Error> {
		writer.write_bytes(self)
	}
}

impl Readable for Vec<u8> {
	fn read(reader: &mut dyn Reader) -> Result<Vec<u8>, Error> {
		reader.read_bytes_len_prefix()
	}
}

impl Writeable for String {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), Error> {
		writer.write_bytes(self.as_bytes())
	}
}

impl Readable for String {
	fn read(reader: &mut dyn Reader) -> Result<String, Error> {
		let bytes = reader.read_bytes_len_prefix()?;
		String::from_utf8(bytes).map_err(|_| Error::CorruptedData)
	}
}

impl Writeable for u64 {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), Error> {
		writer.write_u64(*self)
	}
}

impl Readable for u64 {
	fn read(reader: &mut dyn Reader) -> Result<u64, Error> {
		reader.read_u64()
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn little_endian_ints() {
		let mut vec = vec![];
		{
			let mut writer = BinWriter::new(&mut vec);
			writer.write_u64(0x0102030405060708).unwrap();
		}
		assert_eq!(vec, [0x08, 0x07, 0x06, 0x05, 0x04, 0x03, 0x02, 0x01]);

		let n: u64 = deserialize(&mut &vec[..]).unwrap();
		assert_eq!(n, 0x0102030405060708);
	}

	#[test]
	fn bytes_are_length_prefixed() {
		let data = vec![0xAAu8, 0xBB, 0xCC];
		let encoded = ser_vec(&data).unwrap();
		assert_eq!(encoded.len(), 8 + 3);
		assert_eq!(&encoded[..8], &3u64.to_le_bytes());

		let decoded: Vec<u8> = deserialize(&mut &encoded[..]).unwrap();
		assert_eq!(decoded, data);
	}

	#[test]
	fn bounded_reads() {
		// a length prefix far past what the source holds
		let mut encoded = u64::max_value().to_le_bytes().to_vec();
		encoded.extend_from_slice(&[0u8; 16]);
		let res: Result<Vec<u8>, Error> = deserialize(&mut &encoded[..]);
		match res {
			Err(Error::TooLargeReadErr(_)) => {}
			other => panic!("expected TooLargeReadErr, got {:?}", other),
		}
	}
}
