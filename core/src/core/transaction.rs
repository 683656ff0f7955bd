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

//! Transactions, file contracts, contract revisions and storage proofs.
//!
//! A transaction id is the hash of the transaction *excluding* its
//! signatures; the `SerializationMode` on the writer carries that
//! distinction. Output ids are derived from their parent's id and their
//! index, so every cross-reference in the system is a content address.

use crate::core::currency::Currency;
use crate::core::hash::{hash_all, Hash, Hashed};
use crate::core::merkle;
use crate::ser::{
	self, read_multi, write_multi, Readable, Reader, SerializationMode, Writeable, Writer,
};

/// Id of a transaction, the hash of its signature-less serialization.
pub type TransactionId = Hash;
/// Id of a file contract, derived from its creating transaction.
pub type FileContractId = Hash;
/// Id of a siacoin output.
pub type SiacoinOutputId = Hash;
/// Id of a siafund output.
pub type SiafundOutputId = Hash;
/// Content address of the conditions required to spend an output.
pub type UnlockHash = Hash;

// Distinguishes file contract ids from output ids derived from the same
// transaction and index.
const FILE_CONTRACT_SPECIFIER: &[u8] = b"file contract";

/// Index of the renter's entry in a contract's proof output lists.
pub const RENTER_PAYOUT_INDEX: usize = 0;
/// Index of the host's entry in a contract's proof output lists.
pub const HOST_PAYOUT_INDEX: usize = 1;
/// Index of the void entry in a contract's missed proof outputs.
pub const VOID_PAYOUT_INDEX: usize = 2;

/// Number of valid-proof outputs a well-formed contract carries.
pub const VALID_PROOF_OUTPUT_COUNT: usize = 2;
/// Number of missed-proof outputs a well-formed contract carries.
pub const MISSED_PROOF_OUTPUT_COUNT: usize = 3;

/// The conditions under which an output can be spent: a timelock, a set of
/// public keys and how many of them must sign.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UnlockConditions {
	/// Height before which the conditions cannot be satisfied
	pub timelock: u64,
	/// Raw public keys able to sign
	pub public_keys: Vec<Vec<u8>>,
	/// How many of the keys must sign
	pub signatures_required: u64,
}

impl UnlockConditions {
	/// The content address of these conditions, a merkle root over the
	/// timelock, each key and the signature count.
	pub fn unlock_hash(&self) -> UnlockHash {
		let mut leaves = Vec::with_capacity(self.public_keys.len() + 2);
		leaves.push(merkle::leaf_hash(&self.timelock.to_le_bytes()));
		for key in &self.public_keys {
			leaves.push(merkle::leaf_hash(key));
		}
		leaves.push(merkle::leaf_hash(&self.signatures_required.to_le_bytes()));
		merkle::root_from_hashes(&leaves)
	}
}

impl Writeable for UnlockConditions {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
		writer.write_u64(self.timelock)?;
		writer.write_u64(self.public_keys.len() as u64)?;
		for key in &self.public_keys {
			writer.write_bytes(key)?;
		}
		writer.write_u64(self.signatures_required)
	}
}

impl Readable for UnlockConditions {
	fn read(reader: &mut dyn Reader) -> Result<UnlockConditions, ser::Error> {
		let timelock = reader.read_u64()?;
		let count = reader.read_u64()?;
		let public_keys = read_multi(reader, count)?;
		let signatures_required = reader.read_u64()?;
		Ok(UnlockConditions {
			timelock,
			public_keys,
			signatures_required,
		})
	}
}

/// Consumes a siacoin output identified by its id.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SiacoinInput {
	/// Id of the output being spent
	pub parent_id: SiacoinOutputId,
	/// Conditions hashing to the parent output's unlock hash
	pub unlock_conditions: UnlockConditions,
}

impl Writeable for SiacoinInput {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
		self.parent_id.write(writer)?;
		self.unlock_conditions.write(writer)
	}
}

impl Readable for SiacoinInput {
	fn read(reader: &mut dyn Reader) -> Result<SiacoinInput, ser::Error> {
		Ok(SiacoinInput {
			parent_id: Hash::read(reader)?,
			unlock_conditions: UnlockConditions::read(reader)?,
		})
	}
}

/// A volume of siacoins spendable by whoever satisfies the unlock hash.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SiacoinOutput {
	/// Amount held
	pub value: Currency,
	/// Who can spend it
	pub unlock_hash: UnlockHash,
}

impl Writeable for SiacoinOutput {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
		self.value.write(writer)?;
		self.unlock_hash.write(writer)
	}
}

impl Readable for SiacoinOutput {
	fn read(reader: &mut dyn Reader) -> Result<SiacoinOutput, ser::Error> {
		Ok(SiacoinOutput {
			value: Currency::read(reader)?,
			unlock_hash: Hash::read(reader)?,
		})
	}
}

/// Consumes a siafund output.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SiafundInput {
	/// Id of the output being spent
	pub parent_id: SiafundOutputId,
	/// Conditions hashing to the parent output's unlock hash
	pub unlock_conditions: UnlockConditions,
}

impl Writeable for SiafundInput {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
		self.parent_id.write(writer)?;
		self.unlock_conditions.write(writer)
	}
}

impl Readable for SiafundInput {
	fn read(reader: &mut dyn Reader) -> Result<SiafundInput, ser::Error> {
		Ok(SiafundInput {
			parent_id: Hash::read(reader)?,
			unlock_conditions: UnlockConditions::read(reader)?,
		})
	}
}

/// A volume of siafunds spendable by whoever satisfies the unlock hash.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SiafundOutput {
	/// Amount held
	pub value: Currency,
	/// Who can spend it
	pub unlock_hash: UnlockHash,
}

impl Writeable for SiafundOutput {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
		self.value.write(writer)?;
		self.unlock_hash.write(writer)
	}
}

impl Readable for SiafundOutput {
	fn read(reader: &mut dyn Reader) -> Result<SiafundOutput, ser::Error> {
		Ok(SiafundOutput {
			value: Currency::read(reader)?,
			unlock_hash: Hash::read(reader)?,
		})
	}
}

/// Commits a host to storing a file, conditionally paying out at the proof
/// window. Immutable once on chain; revisions overlay it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FileContract {
	/// Size in bytes of the committed data
	pub file_size: u64,
	/// Merkle root of the committed data
	pub file_merkle_root: Hash,
	/// Height at which the proof window opens
	pub window_start: u64,
	/// Height at which the proof window closes
	pub window_end: u64,
	/// Total value the contract carries
	pub payout: Currency,
	/// Payouts if a valid storage proof appears in the window: renter, host
	pub valid_proof_outputs: Vec<SiacoinOutput>,
	/// Payouts if no proof appears: renter, host, void
	pub missed_proof_outputs: Vec<SiacoinOutput>,
	/// Who can revise the contract
	pub unlock_hash: UnlockHash,
	/// Revision number the contract starts at
	pub revision_number: u64,
}

impl Writeable for FileContract {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
		writer.write_u64(self.file_size)?;
		self.file_merkle_root.write(writer)?;
		writer.write_u64(self.window_start)?;
		writer.write_u64(self.window_end)?;
		self.payout.write(writer)?;
		write_multi(writer, &self.valid_proof_outputs)?;
		write_multi(writer, &self.missed_proof_outputs)?;
		self.unlock_hash.write(writer)?;
		writer.write_u64(self.revision_number)
	}
}

impl Readable for FileContract {
	fn read(reader: &mut dyn Reader) -> Result<FileContract, ser::Error> {
		let file_size = reader.read_u64()?;
		let file_merkle_root = Hash::read(reader)?;
		let window_start = reader.read_u64()?;
		let window_end = reader.read_u64()?;
		let payout = Currency::read(reader)?;
		let count = reader.read_u64()?;
		let valid_proof_outputs = read_multi(reader, count)?;
		let count = reader.read_u64()?;
		let missed_proof_outputs = read_multi(reader, count)?;
		let unlock_hash = Hash::read(reader)?;
		let revision_number = reader.read_u64()?;
		Ok(FileContract {
			file_size,
			file_merkle_root,
			window_start,
			window_end,
			payout,
			valid_proof_outputs,
			missed_proof_outputs,
			unlock_hash,
			revision_number,
		})
	}
}

/// Supersedes the mutable fields of a file contract. Only the revision with
/// the highest number for a contract counts.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FileContractRevision {
	/// Contract being revised
	pub parent_id: FileContractId,
	/// Conditions hashing to the contract's unlock hash
	pub unlock_conditions: UnlockConditions,
	/// Strictly greater than any previous revision of the contract
	pub new_revision_number: u64,
	/// New size of the committed data
	pub new_file_size: u64,
	/// New merkle root of the committed data
	pub new_file_merkle_root: Hash,
	/// Must equal the original contract's window start
	pub new_window_start: u64,
	/// Must equal the original contract's window end
	pub new_window_end: u64,
	/// New payouts on a valid proof: renter, host
	pub new_valid_proof_outputs: Vec<SiacoinOutput>,
	/// New payouts on a missed proof: renter, host, void
	pub new_missed_proof_outputs: Vec<SiacoinOutput>,
	/// Must equal the original contract's unlock hash
	pub new_unlock_hash: UnlockHash,
}

impl Writeable for FileContractRevision {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
		self.parent_id.write(writer)?;
		self.unlock_conditions.write(writer)?;
		writer.write_u64(self.new_revision_number)?;
		writer.write_u64(self.new_file_size)?;
		self.new_file_merkle_root.write(writer)?;
		writer.write_u64(self.new_window_start)?;
		writer.write_u64(self.new_window_end)?;
		write_multi(writer, &self.new_valid_proof_outputs)?;
		write_multi(writer, &self.new_missed_proof_outputs)?;
		self.new_unlock_hash.write(writer)
	}
}

impl Readable for FileContractRevision {
	fn read(reader: &mut dyn Reader) -> Result<FileContractRevision, ser::Error> {
		let parent_id = Hash::read(reader)?;
		let unlock_conditions = UnlockConditions::read(reader)?;
		let new_revision_number = reader.read_u64()?;
		let new_file_size = reader.read_u64()?;
		let new_file_merkle_root = Hash::read(reader)?;
		let new_window_start = reader.read_u64()?;
		let new_window_end = reader.read_u64()?;
		let count = reader.read_u64()?;
		let new_valid_proof_outputs = read_multi(reader, count)?;
		let count = reader.read_u64()?;
		let new_missed_proof_outputs = read_multi(reader, count)?;
		let new_unlock_hash = Hash::read(reader)?;
		Ok(FileContractRevision {
			parent_id,
			unlock_conditions,
			new_revision_number,
			new_file_size,
			new_file_merkle_root,
			new_window_start,
			new_window_end,
			new_valid_proof_outputs,
			new_missed_proof_outputs,
			new_unlock_hash,
		})
	}
}

/// Proves storage of a contract's data by revealing a segment and its merkle
/// path.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StorageProof {
	/// Contract being proven
	pub parent_id: FileContractId,
	/// The revealed segment bytes
	pub segment: Vec<u8>,
	/// Sibling hashes recomputing the contract's merkle root
	pub hash_set: Vec<Hash>,
}

impl Writeable for StorageProof {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
		self.parent_id.write(writer)?;
		writer.write_bytes(&self.segment)?;
		write_multi(writer, &self.hash_set)
	}
}

impl Readable for StorageProof {
	fn read(reader: &mut dyn Reader) -> Result<StorageProof, ser::Error> {
		let parent_id = Hash::read(reader)?;
		let segment = reader.read_bytes_len_prefix()?;
		let count = reader.read_u64()?;
		let hash_set = read_multi(reader, count)?;
		Ok(StorageProof {
			parent_id,
			segment,
			hash_set,
		})
	}
}

/// Which parts of a transaction a signature covers.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CoveredFields {
	/// Covers everything except other signatures
	pub whole_transaction: bool,
}

impl Writeable for CoveredFields {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
		writer.write_u8(self.whole_transaction as u8)
	}
}

impl Readable for CoveredFields {
	fn read(reader: &mut dyn Reader) -> Result<CoveredFields, ser::Error> {
		let b = reader.read_u8()?;
		match b {
			0 => Ok(CoveredFields {
				whole_transaction: false,
			}),
			1 => Ok(CoveredFields {
				whole_transaction: true,
			}),
			n => Err(ser::Error::UnknownVariant(n)),
		}
	}
}

/// A signature over (part of) a transaction. Excluded from the transaction's
/// id so signing doesn't change what is being signed.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TransactionSignature {
	/// Id of the object the signing key belongs to
	pub parent_id: Hash,
	/// Index of the key within the parent's unlock conditions
	pub public_key_index: u64,
	/// Height before which this signature is invalid
	pub timelock: u64,
	/// What the signature covers
	pub covered_fields: CoveredFields,
	/// The signature bytes themselves
	pub signature: Vec<u8>,
}

impl Writeable for TransactionSignature {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
		self.parent_id.write(writer)?;
		writer.write_u64(self.public_key_index)?;
		writer.write_u64(self.timelock)?;
		self.covered_fields.write(writer)?;
		writer.write_bytes(&self.signature)
	}
}

impl Readable for TransactionSignature {
	fn read(reader: &mut dyn Reader) -> Result<TransactionSignature, ser::Error> {
		Ok(TransactionSignature {
			parent_id: Hash::read(reader)?,
			public_key_index: reader.read_u64()?,
			timelock: reader.read_u64()?,
			covered_fields: CoveredFields::read(reader)?,
			signature: reader.read_bytes_len_prefix()?,
		})
	}
}

/// An atomic state change: spends outputs, creates outputs, forms contracts,
/// revises them, proves them.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Transaction {
	/// Siacoin outputs being spent
	pub siacoin_inputs: Vec<SiacoinInput>,
	/// Siacoin outputs being created
	pub siacoin_outputs: Vec<SiacoinOutput>,
	/// New file contracts
	pub file_contracts: Vec<FileContract>,
	/// Revisions of existing contracts
	pub file_contract_revisions: Vec<FileContractRevision>,
	/// Storage proofs against existing contracts
	pub storage_proofs: Vec<StorageProof>,
	/// Siafund outputs being spent
	pub siafund_inputs: Vec<SiafundInput>,
	/// Siafund outputs being created
	pub siafund_outputs: Vec<SiafundOutput>,
	/// Fees paid to the miner including this transaction
	pub miner_fees: Vec<Currency>,
	/// Arbitrary byte payloads
	pub arbitrary_data: Vec<Vec<u8>>,
	/// Signatures authorizing the above; not covered by the transaction id
	pub transaction_signatures: Vec<TransactionSignature>,
}

impl Writeable for Transaction {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
		write_multi(writer, &self.siacoin_inputs)?;
		write_multi(writer, &self.siacoin_outputs)?;
		write_multi(writer, &self.file_contracts)?;
		write_multi(writer, &self.file_contract_revisions)?;
		write_multi(writer, &self.storage_proofs)?;
		write_multi(writer, &self.siafund_inputs)?;
		write_multi(writer, &self.siafund_outputs)?;
		write_multi(writer, &self.miner_fees)?;
		write_multi(writer, &self.arbitrary_data)?;
		// the id covers everything above, never the signatures
		if writer.serialization_mode() == SerializationMode::Full {
			write_multi(writer, &self.transaction_signatures)?;
		}
		Ok(())
	}
}

impl Readable for Transaction {
	fn read(reader: &mut dyn Reader) -> Result<Transaction, ser::Error> {
		let count = reader.read_u64()?;
		let siacoin_inputs = read_multi(reader, count)?;
		let count = reader.read_u64()?;
		let siacoin_outputs = read_multi(reader, count)?;
		let count = reader.read_u64()?;
		let file_contracts = read_multi(reader, count)?;
		let count = reader.read_u64()?;
		let file_contract_revisions = read_multi(reader, count)?;
		let count = reader.read_u64()?;
		let storage_proofs = read_multi(reader, count)?;
		let count = reader.read_u64()?;
		let siafund_inputs = read_multi(reader, count)?;
		let count = reader.read_u64()?;
		let siafund_outputs = read_multi(reader, count)?;
		let count = reader.read_u64()?;
		let miner_fees = read_multi(reader, count)?;
		let count = reader.read_u64()?;
		let arbitrary_data = read_multi(reader, count)?;
		let count = reader.read_u64()?;
		let transaction_signatures = read_multi(reader, count)?;
		Ok(Transaction {
			siacoin_inputs,
			siacoin_outputs,
			file_contracts,
			file_contract_revisions,
			storage_proofs,
			siafund_inputs,
			siafund_outputs,
			miner_fees,
			arbitrary_data,
			transaction_signatures,
		})
	}
}

impl Transaction {
	/// The transaction's id, the hash of everything but its signatures.
	pub fn id(&self) -> TransactionId {
		self.hash()
	}

	/// Id of the siacoin output at the given index.
	pub fn siacoin_output_id(&self, i: u64) -> SiacoinOutputId {
		hash_all(&[self.id().as_bytes(), &i.to_le_bytes()])
	}

	/// Id of the siafund output at the given index.
	pub fn siafund_output_id(&self, i: u64) -> SiafundOutputId {
		hash_all(&[self.id().as_bytes(), &i.to_le_bytes()])
	}

	/// Id of the file contract at the given index.
	pub fn file_contract_id(&self, i: u64) -> FileContractId {
		hash_all(&[
			FILE_CONTRACT_SPECIFIER,
			self.id().as_bytes(),
			&i.to_le_bytes(),
		])
	}
}

/// Id of the siacoin output a storage proof resolution creates for the given
/// contract. `valid` selects the valid-proof or missed-proof list.
pub fn proof_output_id(parent: FileContractId, valid: bool, i: u64) -> SiacoinOutputId {
	hash_all(&[parent.as_bytes(), &[valid as u8], &i.to_le_bytes()])
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::ser::{deserialize, ser_vec};

	fn sample_tx() -> Transaction {
		let mut tx = Transaction::default();
		tx.siacoin_outputs.push(SiacoinOutput {
			value: Currency::from(1000),
			unlock_hash: hash_all(&[b"addr"]),
		});
		tx.miner_fees.push(Currency::from(10));
		tx
	}

	#[test]
	fn id_excludes_signatures() {
		let mut tx = sample_tx();
		let id = tx.id();
		tx.transaction_signatures.push(TransactionSignature {
			parent_id: hash_all(&[b"parent"]),
			public_key_index: 0,
			timelock: 0,
			covered_fields: CoveredFields {
				whole_transaction: true,
			},
			signature: vec![1, 2, 3],
		});
		assert_eq!(tx.id(), id);

		// but the full serialization does change
		let with_sig = ser_vec(&tx).unwrap();
		tx.transaction_signatures.clear();
		assert_ne!(ser_vec(&tx).unwrap(), with_sig);
	}

	#[test]
	fn output_ids_differ_by_index_and_kind() {
		let tx = sample_tx();
		assert_ne!(tx.siacoin_output_id(0), tx.siacoin_output_id(1));
		assert_ne!(tx.siacoin_output_id(0), tx.file_contract_id(0));
		let fcid = tx.file_contract_id(0);
		assert_ne!(
			proof_output_id(fcid, true, 0),
			proof_output_id(fcid, false, 0)
		);
		assert_ne!(
			proof_output_id(fcid, true, 0),
			proof_output_id(fcid, true, 1)
		);
	}

	#[test]
	fn transaction_round_trip() {
		let mut tx = sample_tx();
		tx.file_contract_revisions.push(FileContractRevision {
			parent_id: hash_all(&[b"contract"]),
			new_revision_number: 7,
			new_file_size: 4096,
			..Default::default()
		});
		let encoded = ser_vec(&tx).unwrap();
		let decoded: Transaction = deserialize(&mut &encoded[..]).unwrap();
		assert_eq!(decoded, tx);
	}

	#[test]
	fn unlock_hash_commits_to_all_conditions() {
		let conditions = UnlockConditions {
			timelock: 5,
			public_keys: vec![vec![1; 32]],
			signatures_required: 1,
		};
		let mut other = conditions.clone();
		other.signatures_required = 2;
		assert_ne!(conditions.unlock_hash(), other.unlock_hash());
	}
}
