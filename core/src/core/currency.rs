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

//! Unbounded unsigned currency values.
//!
//! Payouts compound prices over sector sizes and block counts, so the type
//! must not overflow under multiplication. Encoded canonically as a
//! length-prefixed big-endian magnitude, which keeps the encoding of equal
//! values identical regardless of how they were computed.

use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul};

use num_bigint::BigUint;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::ser::{self, Readable, Reader, Writeable, Writer};

/// An amount of siacoins or siafunds. Always non-negative; subtraction is
/// checked.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Debug, Default)]
pub struct Currency(BigUint);

impl Currency {
	/// The zero amount.
	pub fn zero() -> Currency {
		Currency(BigUint::from(0u32))
	}

	/// Whether this is the zero amount.
	pub fn is_zero(&self) -> bool {
		self.0 == BigUint::from(0u32)
	}

	/// Subtraction, `None` when the result would go negative.
	pub fn checked_sub(&self, other: &Currency) -> Option<Currency> {
		if self.0 >= other.0 {
			Some(Currency(self.0.clone() - other.0.clone()))
		} else {
			None
		}
	}

	/// Big-endian magnitude bytes, no leading zeroes. The zero amount is an
	/// empty slice.
	pub fn to_bytes(&self) -> Vec<u8> {
		if self.is_zero() {
			vec![]
		} else {
			self.0.to_bytes_be()
		}
	}

	/// Parses a big-endian magnitude.
	pub fn from_bytes(bytes: &[u8]) -> Currency {
		Currency(BigUint::from_bytes_be(bytes))
	}
}

impl From<u64> for Currency {
	fn from(n: u64) -> Currency {
		Currency(BigUint::from(n))
	}
}

impl Add for Currency {
	type Output = Currency;
	fn add(self, other: Currency) -> Currency {
		Currency(self.0 + other.0)
	}
}

impl<'a> Add<&'a Currency> for Currency {
	type Output = Currency;
	fn add(self, other: &'a Currency) -> Currency {
		Currency(self.0 + other.0.clone())
	}
}

impl AddAssign for Currency {
	fn add_assign(&mut self, other: Currency) {
		self.0 += other.0;
	}
}

impl Mul<u64> for Currency {
	type Output = Currency;
	fn mul(self, n: u64) -> Currency {
		Currency(self.0 * BigUint::from(n))
	}
}

impl<'a> Mul<u64> for &'a Currency {
	type Output = Currency;
	fn mul(self, n: u64) -> Currency {
		Currency(self.0.clone() * BigUint::from(n))
	}
}

impl Sum for Currency {
	fn sum<I: Iterator<Item = Currency>>(iter: I) -> Currency {
		iter.fold(Currency::zero(), Add::add)
	}
}

impl fmt::Display for Currency {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0.to_str_radix(10))
	}
}

impl Writeable for Currency {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
		writer.write_bytes(&self.to_bytes())
	}
}

impl Readable for Currency {
	fn read(reader: &mut dyn Reader) -> Result<Currency, ser::Error> {
		let bytes = reader.read_bytes_len_prefix()?;
		Ok(Currency::from_bytes(&bytes))
	}
}

impl Serialize for Currency {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.serialize_str(&self.0.to_str_radix(10))
	}
}

impl<'de> Deserialize<'de> for Currency {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Currency, D::Error> {
		let s = String::deserialize(deserializer)?;
		let n = BigUint::parse_bytes(s.as_bytes(), 10)
			.ok_or_else(|| de::Error::custom("invalid currency"))?;
		Ok(Currency(n))
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::ser::{deserialize, ser_vec};

	#[test]
	fn arithmetic() {
		let a = Currency::from(100);
		let b = Currency::from(42);
		assert_eq!(a.clone() + b.clone(), Currency::from(142));
		assert_eq!(a.checked_sub(&b), Some(Currency::from(58)));
		assert_eq!(b.checked_sub(&a), None);
		assert_eq!(&a * 3, Currency::from(300));
	}

	#[test]
	fn does_not_overflow() {
		// storage price x sector size x proof window, all large
		let price = Currency::from(u64::max_value());
		let total = &(&price * u64::max_value()) * u64::max_value();
		assert!(total > price);
	}

	#[test]
	fn encoding_round_trip() {
		for n in &[0u64, 1, 255, 256, u64::max_value()] {
			let c = Currency::from(*n);
			let encoded = ser_vec(&c).unwrap();
			let decoded: Currency = deserialize(&mut &encoded[..]).unwrap();
			assert_eq!(decoded, c);
		}
	}

	#[test]
	fn zero_encodes_empty() {
		assert_eq!(Currency::zero().to_bytes(), Vec::<u8>::new());
		assert_eq!(ser_vec(&Currency::zero()).unwrap(), 0u64.to_le_bytes());
	}
}
