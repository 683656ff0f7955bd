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

//! Blocks and block headers.

use chrono::prelude::{DateTime, TimeZone, Utc};

use crate::core::hash::{hash_all, Hash, Hashed};
use crate::core::transaction::{SiacoinOutput, SiacoinOutputId, Transaction};
use crate::ser::{self, read_multi, write_multi, Readable, Reader, Writeable, Writer};

/// Id of a block, the hash of its header.
pub type BlockId = Hash;

/// Block header. The id of a block is the hash of this structure alone, so
/// its serialization must be deterministic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockHeader {
	/// Id of the previous block
	pub parent_id: BlockId,
	/// Proof of work nonce
	pub nonce: u64,
	/// Claimed creation time
	pub timestamp: DateTime<Utc>,
	/// Outputs paying the miner; spendable once mature
	pub miner_payouts: Vec<SiacoinOutput>,
}

impl Default for BlockHeader {
	fn default() -> BlockHeader {
		BlockHeader {
			parent_id: Hash::default(),
			nonce: 0,
			timestamp: Utc.timestamp_opt(0, 0).unwrap(),
			miner_payouts: vec![],
		}
	}
}

impl Writeable for BlockHeader {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
		self.parent_id.write(writer)?;
		writer.write_u64(self.nonce)?;
		writer.write_i64(self.timestamp.timestamp())?;
		write_multi(writer, &self.miner_payouts)
	}
}

impl Readable for BlockHeader {
	fn read(reader: &mut dyn Reader) -> Result<BlockHeader, ser::Error> {
		let parent_id = Hash::read(reader)?;
		let nonce = reader.read_u64()?;
		let timestamp = reader.read_i64()?;
		let count = reader.read_u64()?;
		let miner_payouts = read_multi(reader, count)?;
		let timestamp = Utc
			.timestamp_opt(timestamp, 0)
			.single()
			.ok_or(ser::Error::CorruptedData)?;
		Ok(BlockHeader {
			parent_id,
			nonce,
			timestamp,
			miner_payouts,
		})
	}
}

/// A block: a header plus the ordered transactions it confirms.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Block {
	/// The header the block's id derives from
	pub header: BlockHeader,
	/// Confirmed transactions, in order
	pub transactions: Vec<Transaction>,
}

impl Writeable for Block {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
		self.header.write(writer)?;
		write_multi(writer, &self.transactions)
	}
}

impl Readable for Block {
	fn read(reader: &mut dyn Reader) -> Result<Block, ser::Error> {
		let header = BlockHeader::read(reader)?;
		let count = reader.read_u64()?;
		let transactions = read_multi(reader, count)?;
		Ok(Block {
			header,
			transactions,
		})
	}
}

impl Block {
	/// The block's id, the hash of its header.
	pub fn id(&self) -> BlockId {
		self.header.hash()
	}

	/// Id of the miner payout output at the given index.
	pub fn miner_payout_id(&self, i: u64) -> SiacoinOutputId {
		hash_all(&[self.id().as_bytes(), &i.to_le_bytes()])
	}

	/// Serialized size of the block in bytes.
	pub fn encoded_len(&self) -> u64 {
		ser::ser_vec(self).map(|v| v.len() as u64).unwrap_or(0)
	}
}
