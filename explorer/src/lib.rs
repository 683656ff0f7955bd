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

//! The explorer: consumes consensus changes and maintains a reorg-safe
//! index from block ids, transaction ids, unlock hashes, output ids and
//! file contract ids to their on-chain locations.
//!
//! Each consensus change lands in a single store batch: reverted blocks are
//! undone tip-first, applied blocks inserted oldest-first, and no partially
//! updated index is ever observable. Subscribers are poked after the commit
//! through bounded channels; a full channel is skipped, the index itself is
//! the source of truth to reconcile from.

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

pub mod store;
pub mod types;

pub use crate::types::{
	AddressRecord, BlockRecord, FileContractRecord, HashClass, HeightRecord, OutputRecord,
	TransactionRecord,
};

use std::sync::mpsc::{sync_channel, Receiver, SyncSender};

use crate::core::consensus::ROOT_TARGET;
use crate::core::core::transaction::{
	FileContractId, SiacoinOutputId, SiafundOutputId, Transaction, TransactionId, UnlockHash,
};
use crate::core::core::{Block, BlockId, ConsensusChange, Hash};
use crate::core::ser;
use crate::store::*;
use sia_store::u64_key;
use sia_util::Mutex;

// Bound on a subscriber's pending notifications before they get dropped.
const SUBSCRIBER_CHANNEL_SIZE: usize = 32;

/// Main error type for the explorer.
#[derive(Clone, Eq, PartialEq, Debug, Fail)]
pub enum Error {
	/// Couldn't find what we were looking for
	#[fail(display = "explorer entry not found: {}", _0)]
	NotFound(String),
	/// The index contradicts itself or the incoming change
	#[fail(display = "explorer index corrupt: {}", _0)]
	Corrupt(String),
	/// Wraps an error from the underlying store
	#[fail(display = "store error: {}", _0)]
	Store(sia_store::Error),
	/// Wraps a serialization error
	#[fail(display = "serialization error: {}", _0)]
	Ser(ser::Error),
}

impl From<sia_store::Error> for Error {
	fn from(e: sia_store::Error) -> Error {
		Error::Store(e)
	}
}

impl From<ser::Error> for Error {
	fn from(e: ser::Error) -> Error {
		Error::Ser(e)
	}
}

fn not_found<T>(res: Option<T>, what: &str) -> Result<T, Error> {
	res.ok_or_else(|| Error::NotFound(what.to_owned()))
}

/// The explorer subsystem: index writer and lookup surface. The only writer
/// is `process_consensus_change`; lookups go straight to the store.
pub struct Explorer {
	db: sia_store::Store,
	subscribers: Mutex<Vec<SyncSender<()>>>,
}

impl Explorer {
	/// Opens (creating if necessary) the explorer index under the given
	/// directory.
	pub fn open(db_root: &str) -> Result<Explorer, Error> {
		let db = sia_store::Store::new(
			db_root,
			&ALL_BUCKETS,
			EXPLORER_DB_HEADER,
			EXPLORER_DB_VERSION,
		)?;
		Ok(Explorer {
			db,
			subscribers: Mutex::new(vec![]),
		})
	}

	/// Height of the chain tip, `None` before the genesis block arrives.
	pub fn height(&self) -> Result<Option<u64>, Error> {
		let length: u64 = self.db.get_ser(SYNC_BUCKET, CHAIN_LENGTH_KEY)?.unwrap_or(0);
		Ok(length.checked_sub(1))
	}

	/// Registers a subscriber poked after every processed change.
	/// Notifications are best effort; a subscriber that falls behind misses
	/// pokes and reconciles from the index directly.
	pub fn subscribe(&self) -> Receiver<()> {
		let (sender, receiver) = sync_channel(SUBSCRIBER_CHANNEL_SIZE);
		self.subscribers.lock().push(sender);
		receiver
	}

	/// Digests one consensus change in a single atomic batch: reverts
	/// tip-first, then applies oldest-first.
	pub fn process_consensus_change(&self, cc: &ConsensusChange) -> Result<(), Error> {
		let mut length: u64 = self.db.get_ser(SYNC_BUCKET, CHAIN_LENGTH_KEY)?.unwrap_or(0);

		let batch = self.db.batch()?;

		for block in &cc.reverted_blocks {
			if length == 0 {
				return Err(Error::Corrupt("revert below genesis".to_owned()));
			}
			revert_block(&batch, block, length - 1)?;
			length -= 1;
		}

		for block in &cc.applied_blocks {
			apply_block(&batch, block, length)?;
			length += 1;
		}

		batch.put_ser(SYNC_BUCKET, CHAIN_LENGTH_KEY, &length)?;
		batch.commit()?;

		debug!(
			"processed consensus change: -{} +{} blocks, length {}",
			cc.reverted_blocks.len(),
			cc.applied_blocks.len(),
			length
		);

		// poke subscribers, dropping the slow and the gone
		let mut subscribers = self.subscribers.lock();
		subscribers.retain(|sub| match sub.try_send(()) {
			Ok(()) => true,
			Err(std::sync::mpsc::TrySendError::Full(())) => {
				trace!("explorer subscriber full, dropping notification");
				true
			}
			Err(std::sync::mpsc::TrySendError::Disconnected(())) => false,
		});

		Ok(())
	}

	/// The block with the given id, with its height.
	pub fn block(&self, id: &BlockId) -> Result<BlockRecord, Error> {
		not_found(
			self.db.get_ser(BLOCKS_BUCKET, id.as_bytes())?,
			&format!("block {}", id),
		)
	}

	/// The block at the given height on the current chain.
	pub fn block_at_height(&self, height: u64) -> Result<BlockRecord, Error> {
		let id_bytes = not_found(
			self.db.get(BLOCK_PATH_BUCKET, &u64_key(height))?,
			&format!("block at height {}", height),
		)?;
		self.block(&Hash::from_vec(&id_bytes))
	}

	/// Where the given transaction sits on the current chain.
	pub fn transaction(&self, id: &TransactionId) -> Result<TransactionRecord, Error> {
		not_found(
			self.db.get_ser(TRANSACTIONS_BUCKET, id.as_bytes())?,
			&format!("transaction {}", id),
		)
	}

	/// What kind of object a hash names, if the chain has seen it.
	pub fn hash_class(&self, hash: &Hash) -> Result<HashClass, Error> {
		not_found(
			self.db.get_ser(HASHES_BUCKET, hash.as_bytes())?,
			&format!("hash {}", hash),
		)
	}

	/// Transactions that have referenced the unlock hash, in chain order.
	/// Empty when the chain has never seen it.
	pub fn address_transactions(&self, unlock_hash: &UnlockHash) -> Result<Vec<TransactionId>, Error> {
		let record: Option<AddressRecord> =
			self.db.get_ser(ADDRESSES_BUCKET, unlock_hash.as_bytes())?;
		Ok(record.unwrap_or_default().0)
	}

	/// A file contract's on-chain history.
	pub fn file_contract(&self, id: &FileContractId) -> Result<FileContractRecord, Error> {
		not_found(
			self.db.get_ser(FILE_CONTRACTS_BUCKET, id.as_bytes())?,
			&format!("file contract {}", id),
		)
	}

	/// A siacoin output's creation and consumption.
	pub fn siacoin_output(&self, id: &SiacoinOutputId) -> Result<OutputRecord, Error> {
		not_found(
			self.db.get_ser(SIACOIN_OUTPUTS_BUCKET, id.as_bytes())?,
			&format!("siacoin output {}", id),
		)
	}

	/// A siafund output's creation and consumption.
	pub fn siafund_output(&self, id: &SiafundOutputId) -> Result<OutputRecord, Error> {
		not_found(
			self.db.get_ser(SIAFUND_OUTPUTS_BUCKET, id.as_bytes())?,
			&format!("siafund output {}", id),
		)
	}

	/// The per-height summary.
	pub fn height_summary(&self, height: u64) -> Result<HeightRecord, Error> {
		not_found(
			self.db.get_ser(HEIGHTS_BUCKET, &u64_key(height))?,
			&format!("height {}", height),
		)
	}

	/// Raw contents of an index bucket, for consistency checks and tooling.
	pub fn bucket_pairs(&self, bucket: &str) -> Result<Vec<(Vec<u8>, Vec<u8>)>, Error> {
		Ok(self.db.pairs(bucket)?)
	}
}

// Appends the transaction to the unlock hash's address record and tags the
// hash.
fn add_address(
	batch: &sia_store::Batch<'_>,
	unlock_hash: UnlockHash,
	tx_id: TransactionId,
) -> Result<(), Error> {
	let mut record: AddressRecord = batch
		.get_ser(ADDRESSES_BUCKET, unlock_hash.as_bytes())?
		.unwrap_or_default();
	record.0.push(tx_id);
	batch.put_ser(ADDRESSES_BUCKET, unlock_hash.as_bytes(), &record)?;
	batch.put_ser(HASHES_BUCKET, unlock_hash.as_bytes(), &HashClass::UnlockHash)?;
	Ok(())
}

// Removes the last matching entry from the unlock hash's address record,
// dropping the record and the hash tag when it empties.
fn remove_address(
	batch: &sia_store::Batch<'_>,
	unlock_hash: UnlockHash,
	tx_id: TransactionId,
) -> Result<(), Error> {
	let mut record: AddressRecord = match batch.get_ser(ADDRESSES_BUCKET, unlock_hash.as_bytes())? {
		Some(record) => record,
		None => {
			return Err(Error::Corrupt(format!(
				"unlinking {} from unknown address {}",
				tx_id, unlock_hash
			)));
		}
	};
	if let Some(pos) = record.0.iter().rposition(|id| *id == tx_id) {
		record.0.remove(pos);
	}
	if record.0.is_empty() {
		batch.delete(ADDRESSES_BUCKET, unlock_hash.as_bytes())?;
		batch.delete(HASHES_BUCKET, unlock_hash.as_bytes())?;
	} else {
		batch.put_ser(ADDRESSES_BUCKET, unlock_hash.as_bytes(), &record)?;
	}
	Ok(())
}

// Inserts everything one applied block contributes to the index.
fn apply_block(batch: &sia_store::Batch<'_>, block: &Block, height: u64) -> Result<(), Error> {
	let block_id = block.id();

	batch.put_ser(
		BLOCKS_BUCKET,
		block_id.as_bytes(),
		&BlockRecord {
			block: block.clone(),
			height,
		},
	)?;
	batch.put(BLOCK_PATH_BUCKET, &u64_key(height), block_id.to_vec())?;
	batch.put_ser(HASHES_BUCKET, block_id.as_bytes(), &HashClass::Block)?;

	// genesis has no parent to look a target up from
	let target = if height == 0 {
		ROOT_TARGET
	} else {
		let parent: HeightRecord = batch
			.get_ser(HEIGHTS_BUCKET, &u64_key(height - 1))?
			.ok_or_else(|| Error::Corrupt(format!("no height record below {}", height)))?;
		parent.target
	};
	batch.put_ser(
		HEIGHTS_BUCKET,
		&u64_key(height),
		&HeightRecord {
			block_id,
			timestamp: block.header.timestamp.timestamp(),
			target,
			size: block.encoded_len(),
		},
	)?;

	// miner payouts have no creating transaction; the block id stands in
	for (i, payout) in block.header.miner_payouts.iter().enumerate() {
		let oid = block.miner_payout_id(i as u64);
		batch.put_ser(
			SIACOIN_OUTPUTS_BUCKET,
			oid.as_bytes(),
			&OutputRecord {
				creating_tx: block_id,
				spending_tx: None,
			},
		)?;
		batch.put_ser(HASHES_BUCKET, oid.as_bytes(), &HashClass::SiacoinOutput)?;
		add_address(batch, payout.unlock_hash, block_id)?;
	}

	for (i, tx) in block.transactions.iter().enumerate() {
		let tx_id = tx.id();
		batch.put_ser(
			TRANSACTIONS_BUCKET,
			tx_id.as_bytes(),
			&TransactionRecord {
				block_id,
				index: i as u64,
			},
		)?;
		batch.put_ser(HASHES_BUCKET, tx_id.as_bytes(), &HashClass::Transaction)?;
		apply_transaction(batch, tx, tx_id)?;
	}

	Ok(())
}

// Updates the secondary indices for one applied transaction.
fn apply_transaction(
	batch: &sia_store::Batch<'_>,
	tx: &Transaction,
	tx_id: TransactionId,
) -> Result<(), Error> {
	for input in &tx.siacoin_inputs {
		let mut record: OutputRecord = batch
			.get_ser(SIACOIN_OUTPUTS_BUCKET, input.parent_id.as_bytes())?
			.ok_or_else(|| Error::Corrupt(format!("spend of unknown output {}", input.parent_id)))?;
		record.spending_tx = Some(tx_id);
		batch.put_ser(SIACOIN_OUTPUTS_BUCKET, input.parent_id.as_bytes(), &record)?;
		add_address(batch, input.unlock_conditions.unlock_hash(), tx_id)?;
	}

	for (i, output) in tx.siacoin_outputs.iter().enumerate() {
		let oid = tx.siacoin_output_id(i as u64);
		batch.put_ser(
			SIACOIN_OUTPUTS_BUCKET,
			oid.as_bytes(),
			&OutputRecord {
				creating_tx: tx_id,
				spending_tx: None,
			},
		)?;
		batch.put_ser(HASHES_BUCKET, oid.as_bytes(), &HashClass::SiacoinOutput)?;
		add_address(batch, output.unlock_hash, tx_id)?;
	}

	for (i, contract) in tx.file_contracts.iter().enumerate() {
		let fcid = tx.file_contract_id(i as u64);
		batch.put_ser(
			FILE_CONTRACTS_BUCKET,
			fcid.as_bytes(),
			&FileContractRecord {
				contract_tx: tx_id,
				revision_txs: vec![],
				proof_tx: None,
			},
		)?;
		batch.put_ser(HASHES_BUCKET, fcid.as_bytes(), &HashClass::FileContract)?;
		add_address(batch, contract.unlock_hash, tx_id)?;
	}

	for revision in &tx.file_contract_revisions {
		let mut record: FileContractRecord = batch
			.get_ser(FILE_CONTRACTS_BUCKET, revision.parent_id.as_bytes())?
			.ok_or_else(|| {
				Error::Corrupt(format!("revision of unknown contract {}", revision.parent_id))
			})?;
		record.revision_txs.push(tx_id);
		batch.put_ser(FILE_CONTRACTS_BUCKET, revision.parent_id.as_bytes(), &record)?;
		add_address(batch, revision.new_unlock_hash, tx_id)?;
	}

	for proof in &tx.storage_proofs {
		let mut record: FileContractRecord = batch
			.get_ser(FILE_CONTRACTS_BUCKET, proof.parent_id.as_bytes())?
			.ok_or_else(|| {
				Error::Corrupt(format!("proof of unknown contract {}", proof.parent_id))
			})?;
		record.proof_tx = Some(tx_id);
		batch.put_ser(FILE_CONTRACTS_BUCKET, proof.parent_id.as_bytes(), &record)?;
	}

	for input in &tx.siafund_inputs {
		let mut record: OutputRecord = batch
			.get_ser(SIAFUND_OUTPUTS_BUCKET, input.parent_id.as_bytes())?
			.ok_or_else(|| Error::Corrupt(format!("spend of unknown output {}", input.parent_id)))?;
		record.spending_tx = Some(tx_id);
		batch.put_ser(SIAFUND_OUTPUTS_BUCKET, input.parent_id.as_bytes(), &record)?;
		add_address(batch, input.unlock_conditions.unlock_hash(), tx_id)?;
	}

	for (i, output) in tx.siafund_outputs.iter().enumerate() {
		let oid = tx.siafund_output_id(i as u64);
		batch.put_ser(
			SIAFUND_OUTPUTS_BUCKET,
			oid.as_bytes(),
			&OutputRecord {
				creating_tx: tx_id,
				spending_tx: None,
			},
		)?;
		batch.put_ser(HASHES_BUCKET, oid.as_bytes(), &HashClass::SiafundOutput)?;
		add_address(batch, output.unlock_hash, tx_id)?;
	}

	Ok(())
}

// Undoes everything one reverted block contributed to the index. The block
// must be the one at `height` on the indexed chain.
fn revert_block(batch: &sia_store::Batch<'_>, block: &Block, height: u64) -> Result<(), Error> {
	let block_id = block.id();

	match batch.get(BLOCK_PATH_BUCKET, &u64_key(height))? {
		Some(ref stored) if stored[..] == block_id.as_bytes()[..] => {}
		_ => {
			return Err(Error::Corrupt(format!(
				"reverting {} which is not the tip at height {}",
				block_id, height
			)));
		}
	}

	// transactions are undone in reverse so later spends unwind before the
	// outputs they touched
	for tx in block.transactions.iter().rev() {
		let tx_id = tx.id();
		revert_transaction(batch, tx, tx_id)?;
		batch.delete(TRANSACTIONS_BUCKET, tx_id.as_bytes())?;
		batch.delete(HASHES_BUCKET, tx_id.as_bytes())?;
	}

	for (i, payout) in block.header.miner_payouts.iter().enumerate().rev() {
		let oid = block.miner_payout_id(i as u64);
		batch.delete(SIACOIN_OUTPUTS_BUCKET, oid.as_bytes())?;
		batch.delete(HASHES_BUCKET, oid.as_bytes())?;
		remove_address(batch, payout.unlock_hash, block_id)?;
	}

	batch.delete(BLOCKS_BUCKET, block_id.as_bytes())?;
	batch.delete(BLOCK_PATH_BUCKET, &u64_key(height))?;
	batch.delete(HEIGHTS_BUCKET, &u64_key(height))?;
	batch.delete(HASHES_BUCKET, block_id.as_bytes())?;

	Ok(())
}

// Undoes the secondary index changes of one reverted transaction.
fn revert_transaction(
	batch: &sia_store::Batch<'_>,
	tx: &Transaction,
	tx_id: TransactionId,
) -> Result<(), Error> {
	for (i, output) in tx.siafund_outputs.iter().enumerate().rev() {
		let oid = tx.siafund_output_id(i as u64);
		batch.delete(SIAFUND_OUTPUTS_BUCKET, oid.as_bytes())?;
		batch.delete(HASHES_BUCKET, oid.as_bytes())?;
		remove_address(batch, output.unlock_hash, tx_id)?;
	}

	for input in tx.siafund_inputs.iter().rev() {
		let mut record: OutputRecord = batch
			.get_ser(SIAFUND_OUTPUTS_BUCKET, input.parent_id.as_bytes())?
			.ok_or_else(|| {
				Error::Corrupt(format!("unspending unknown output {}", input.parent_id))
			})?;
		record.spending_tx = None;
		batch.put_ser(SIAFUND_OUTPUTS_BUCKET, input.parent_id.as_bytes(), &record)?;
		remove_address(batch, input.unlock_conditions.unlock_hash(), tx_id)?;
	}

	for proof in tx.storage_proofs.iter().rev() {
		let mut record: FileContractRecord = batch
			.get_ser(FILE_CONTRACTS_BUCKET, proof.parent_id.as_bytes())?
			.ok_or_else(|| {
				Error::Corrupt(format!("unproving unknown contract {}", proof.parent_id))
			})?;
		record.proof_tx = None;
		batch.put_ser(FILE_CONTRACTS_BUCKET, proof.parent_id.as_bytes(), &record)?;
	}

	for revision in tx.file_contract_revisions.iter().rev() {
		let mut record: FileContractRecord = batch
			.get_ser(FILE_CONTRACTS_BUCKET, revision.parent_id.as_bytes())?
			.ok_or_else(|| {
				Error::Corrupt(format!(
					"unrevising unknown contract {}",
					revision.parent_id
				))
			})?;
		if let Some(pos) = record.revision_txs.iter().rposition(|id| *id == tx_id) {
			record.revision_txs.remove(pos);
		}
		batch.put_ser(FILE_CONTRACTS_BUCKET, revision.parent_id.as_bytes(), &record)?;
		remove_address(batch, revision.new_unlock_hash, tx_id)?;
	}

	for (i, contract) in tx.file_contracts.iter().enumerate().rev() {
		let fcid = tx.file_contract_id(i as u64);
		batch.delete(FILE_CONTRACTS_BUCKET, fcid.as_bytes())?;
		batch.delete(HASHES_BUCKET, fcid.as_bytes())?;
		remove_address(batch, contract.unlock_hash, tx_id)?;
	}

	for (i, output) in tx.siacoin_outputs.iter().enumerate().rev() {
		let oid = tx.siacoin_output_id(i as u64);
		batch.delete(SIACOIN_OUTPUTS_BUCKET, oid.as_bytes())?;
		batch.delete(HASHES_BUCKET, oid.as_bytes())?;
		remove_address(batch, output.unlock_hash, tx_id)?;
	}

	for input in tx.siacoin_inputs.iter().rev() {
		let mut record: OutputRecord = batch
			.get_ser(SIACOIN_OUTPUTS_BUCKET, input.parent_id.as_bytes())?
			.ok_or_else(|| {
				Error::Corrupt(format!("unspending unknown output {}", input.parent_id))
			})?;
		record.spending_tx = None;
		batch.put_ser(SIACOIN_OUTPUTS_BUCKET, input.parent_id.as_bytes(), &record)?;
		remove_address(batch, input.unlock_conditions.unlock_hash(), tx_id)?;
	}

	Ok(())
}
