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

//! Record types stored in the explorer's index buckets.

use crate::core::core::transaction::TransactionId;
use crate::core::core::{Block, BlockId, Hash};
use crate::core::ser::{self, read_multi, write_multi, Readable, Reader, Writeable, Writer};

/// What kind of object a 32-byte hash identifies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashClass {
	/// A block id
	Block,
	/// A transaction id
	Transaction,
	/// A file contract id
	FileContract,
	/// A siacoin output id
	SiacoinOutput,
	/// A siafund output id
	SiafundOutput,
	/// An unlock hash
	UnlockHash,
}

impl Writeable for HashClass {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
		let tag = match self {
			HashClass::Block => 1,
			HashClass::Transaction => 2,
			HashClass::FileContract => 3,
			HashClass::SiacoinOutput => 4,
			HashClass::SiafundOutput => 5,
			HashClass::UnlockHash => 6,
		};
		writer.write_u8(tag)
	}
}

impl Readable for HashClass {
	fn read(reader: &mut dyn Reader) -> Result<HashClass, ser::Error> {
		match reader.read_u8()? {
			1 => Ok(HashClass::Block),
			2 => Ok(HashClass::Transaction),
			3 => Ok(HashClass::FileContract),
			4 => Ok(HashClass::SiacoinOutput),
			5 => Ok(HashClass::SiafundOutput),
			6 => Ok(HashClass::UnlockHash),
			tag => Err(ser::Error::UnknownVariant(tag)),
		}
	}
}

/// A block and the height it sits at on the current chain.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockRecord {
	/// The block itself
	pub block: Block,
	/// Its height on the current chain
	pub height: u64,
}

impl Writeable for BlockRecord {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
		self.block.write(writer)?;
		writer.write_u64(self.height)
	}
}

impl Readable for BlockRecord {
	fn read(reader: &mut dyn Reader) -> Result<BlockRecord, ser::Error> {
		Ok(BlockRecord {
			block: Block::read(reader)?,
			height: reader.read_u64()?,
		})
	}
}

/// Where a transaction lives: its block and its index within it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionRecord {
	/// Block containing the transaction
	pub block_id: BlockId,
	/// Position within the block
	pub index: u64,
}

impl Writeable for TransactionRecord {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
		self.block_id.write(writer)?;
		writer.write_u64(self.index)
	}
}

impl Readable for TransactionRecord {
	fn read(reader: &mut dyn Reader) -> Result<TransactionRecord, ser::Error> {
		Ok(TransactionRecord {
			block_id: Hash::read(reader)?,
			index: reader.read_u64()?,
		})
	}
}

/// The ordered transactions that have referenced an unlock hash.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AddressRecord(pub Vec<TransactionId>);

impl Writeable for AddressRecord {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
		write_multi(writer, &self.0)
	}
}

impl Readable for AddressRecord {
	fn read(reader: &mut dyn Reader) -> Result<AddressRecord, ser::Error> {
		let count = reader.read_u64()?;
		Ok(AddressRecord(read_multi(reader, count)?))
	}
}

/// A file contract's on-chain history: the transaction that formed it, the
/// revisions in order, and the storage proof if one landed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileContractRecord {
	/// Transaction that created the contract
	pub contract_tx: TransactionId,
	/// Transactions revising it, in chain order
	pub revision_txs: Vec<TransactionId>,
	/// Transaction carrying its storage proof, if any
	pub proof_tx: Option<TransactionId>,
}

impl Writeable for FileContractRecord {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
		self.contract_tx.write(writer)?;
		write_multi(writer, &self.revision_txs)?;
		match &self.proof_tx {
			Some(id) => {
				writer.write_u8(1)?;
				id.write(writer)
			}
			None => writer.write_u8(0),
		}
	}
}

impl Readable for FileContractRecord {
	fn read(reader: &mut dyn Reader) -> Result<FileContractRecord, ser::Error> {
		let contract_tx = Hash::read(reader)?;
		let count = reader.read_u64()?;
		let revision_txs = read_multi(reader, count)?;
		let proof_tx = match reader.read_u8()? {
			0 => None,
			_ => Some(Hash::read(reader)?),
		};
		Ok(FileContractRecord {
			contract_tx,
			revision_txs,
			proof_tx,
		})
	}
}

/// An output's creation and, once seen, its consumption.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputRecord {
	/// Transaction that created the output (the block id for miner payouts)
	pub creating_tx: TransactionId,
	/// Transaction that spent it, once one is on the chain
	pub spending_tx: Option<TransactionId>,
}

impl Writeable for OutputRecord {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
		self.creating_tx.write(writer)?;
		match &self.spending_tx {
			Some(id) => {
				writer.write_u8(1)?;
				id.write(writer)
			}
			None => writer.write_u8(0),
		}
	}
}

impl Readable for OutputRecord {
	fn read(reader: &mut dyn Reader) -> Result<OutputRecord, ser::Error> {
		let creating_tx = Hash::read(reader)?;
		let spending_tx = match reader.read_u8()? {
			0 => None,
			_ => Some(Hash::read(reader)?),
		};
		Ok(OutputRecord {
			creating_tx,
			spending_tx,
		})
	}
}

/// Per-height summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeightRecord {
	/// Block at this height
	pub block_id: BlockId,
	/// Its claimed unix timestamp
	pub timestamp: i64,
	/// Difficulty target in force at this height
	pub target: Hash,
	/// Serialized size of the block in bytes
	pub size: u64,
}

impl Writeable for HeightRecord {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
		self.block_id.write(writer)?;
		writer.write_i64(self.timestamp)?;
		self.target.write(writer)?;
		writer.write_u64(self.size)
	}
}

impl Readable for HeightRecord {
	fn read(reader: &mut dyn Reader) -> Result<HeightRecord, ser::Error> {
		Ok(HeightRecord {
			block_id: Hash::read(reader)?,
			timestamp: reader.read_i64()?,
			target: Hash::read(reader)?,
			size: reader.read_u64()?,
		})
	}
}
