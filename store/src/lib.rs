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

//! Storage of core types using LMDB.

#![deny(non_upper_case_globals)]
#![deny(non_camel_case_types)]
#![deny(non_snake_case)]
#![deny(unused_mut)]
#![warn(missing_docs)]

extern crate failure;
#[macro_use]
extern crate failure_derive;
#[macro_use]
extern crate log;

use sia_core as core;

pub mod lmdb;

pub use crate::lmdb::{option_to_not_found, Batch, Error, SerIterator, Store};

use byteorder::{BigEndian, WriteBytesExt};

/// Big-endian encoding of a u64, so lexicographic key order matches numeric
/// order. Height-indexed buckets rely on this to iterate in chain order.
pub fn u64_key(n: u64) -> Vec<u8> {
	let mut k = Vec::with_capacity(8);
	k.write_u64::<BigEndian>(n).expect("infallible vec write");
	k
}
