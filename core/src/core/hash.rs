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

//! Hash Function
//!
//! Primary hash function used in the protocol, blake2b with a 256 bit
//! digest. Ids for blocks, transactions, contracts and outputs are all
//! hashes of canonical serializations.

use std::convert::AsRef;
use std::fmt;

use blake2_rfc::blake2b::Blake2b;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::ser::{self, Readable, Reader, SerializationMode, Writeable, Writer};
use crate::util::{from_hex, to_hex};

/// Size of a hash in bytes.
pub const HASH_SIZE: usize = 32;

/// The "zero" hash, the root of an empty sector vector among other things.
pub const ZERO_HASH: Hash = Hash([0; HASH_SIZE]);

/// A hash to uniquely (or close enough) identify one of the main blockchain
/// constructs. Used pervasively for blocks, transactions, contracts, outputs
/// and unlock hashes.
#[derive(Copy, Clone, PartialEq, PartialOrd, Eq, Ord, Hash, Default)]
pub struct Hash(pub [u8; HASH_SIZE]);

impl fmt::Debug for Hash {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let hash_hex = self.to_hex();
		const NUM_SHOW: usize = 12;
		write!(f, "{}", &hash_hex[..NUM_SHOW])
	}
}

impl fmt::Display for Hash {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.to_hex())
	}
}

impl Hash {
	/// Builds a Hash from a byte vector. If the vector is too short, it will
	/// be completed by zeroes. If it's too long, it will be truncated.
	pub fn from_vec(v: &[u8]) -> Hash {
		let mut h = [0; HASH_SIZE];
		let copy_size = v.len().min(HASH_SIZE);
		h[..copy_size].copy_from_slice(&v[..copy_size]);
		Hash(h)
	}

	/// Converts the hash to a byte vector
	pub fn to_vec(&self) -> Vec<u8> {
		self.0.to_vec()
	}

	/// The hash as a byte slice
	pub fn as_bytes(&self) -> &[u8] {
		&self.0
	}

	/// Convert a hash to hex string format.
	pub fn to_hex(&self) -> String {
		to_hex(self.to_vec())
	}

	/// Convert hex string back to hash.
	pub fn from_hex(hex: &str) -> Result<Hash, ser::Error> {
		let bytes = from_hex(hex.to_string()).map_err(|_| ser::Error::CorruptedData)?;
		if bytes.len() != HASH_SIZE {
			return Err(ser::Error::CorruptedData);
		}
		Ok(Hash::from_vec(&bytes))
	}
}

impl AsRef<[u8]> for Hash {
	fn as_ref(&self) -> &[u8] {
		&self.0
	}
}

impl Writeable for Hash {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
		writer.write_fixed_bytes(self)
	}
}

impl Readable for Hash {
	fn read(reader: &mut dyn Reader) -> Result<Hash, ser::Error> {
		let v = reader.read_fixed_bytes(HASH_SIZE)?;
		let mut a = [0; HASH_SIZE];
		a.copy_from_slice(&v[..]);
		Ok(Hash(a))
	}
}

impl Serialize for Hash {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.serialize_str(&self.to_hex())
	}
}

impl<'de> Deserialize<'de> for Hash {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Hash, D::Error> {
		let s = String::deserialize(deserializer)?;
		Hash::from_hex(&s).map_err(|_| de::Error::custom("invalid hash hex"))
	}
}

/// Serializer that outputs a hash of the serialized object
pub struct HashWriter {
	state: Blake2b,
}

impl HashWriter {
	/// Consume the `HashWriter`, outputting its current hash into a 32-byte
	/// array
	pub fn finalize(self, output: &mut [u8]) {
		output.copy_from_slice(self.state.finalize().as_bytes());
	}

	/// Consume the `HashWriter`, outputting a `Hash` corresponding to its
	/// current state
	pub fn into_hash(self) -> Hash {
		let mut new_hash = ZERO_HASH;
		new_hash.0.copy_from_slice(self.state.finalize().as_bytes());
		new_hash
	}
}

impl Default for HashWriter {
	fn default() -> HashWriter {
		HashWriter {
			state: Blake2b::new(HASH_SIZE),
		}
	}
}

impl Writer for HashWriter {
	fn serialization_mode(&self) -> SerializationMode {
		SerializationMode::Hash
	}

	fn write_fixed_bytes<T: AsRef<[u8]>>(&mut self, bytes: T) -> Result<(), ser::Error> {
		self.state.update(bytes.as_ref());
		Ok(())
	}
}

/// A trait for types that have a canonical hash
pub trait Hashed {
	/// Obtain the hash of the object
	fn hash(&self) -> Hash;
}

impl<W: Writeable> Hashed for W {
	fn hash(&self) -> Hash {
		let mut hasher = HashWriter::default();
		Writeable::write(self, &mut hasher).unwrap();
		let mut ret = [0; HASH_SIZE];
		hasher.finalize(&mut ret);
		Hash(ret)
	}
}

/// Hash of the concatenation of the given byte slices, in order. Ids derived
/// from a parent id plus an index all come through here.
pub fn hash_all(parts: &[&[u8]]) -> Hash {
	let mut hasher = HashWriter::default();
	for part in parts {
		hasher.write_fixed_bytes(part).unwrap();
	}
	hasher.into_hash()
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn hash_is_stable() {
		let h1 = hash_all(&[b"some data"]);
		let h2 = hash_all(&[b"some data"]);
		assert_eq!(h1, h2);
		assert_ne!(h1, hash_all(&[b"other data"]));
	}

	#[test]
	fn hex_round_trip() {
		let h = hash_all(&[b"round trip"]);
		assert_eq!(Hash::from_hex(&h.to_hex()).unwrap(), h);
	}
}
