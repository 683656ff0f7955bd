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

//! Storage obligations and the registry that persists them.
//!
//! An obligation aggregates everything the host needs to service one file
//! contract: the contract itself, the ordered sector roots backing it, the
//! latest revision transaction and the money at stake. Sectors are stored
//! once and refcounted by root, so obligations referencing the same data
//! share bytes; a sector's bytes are only freed when its last reference
//! goes.
//!
//! All registry mutations for one revision land in a single store batch.
//! A crash between protocol acceptance and commit therefore rolls back to
//! the last committed obligation.

use std::collections::HashSet;

use crate::core::core::transaction::{FileContract, FileContractId, FileContractRevision};
use crate::core::core::{ConsensusChange, Currency, Hash, Transaction};
use crate::core::ser::{self, read_multi, write_multi, Readable, Reader, Writeable, Writer};
use crate::error::{Error, ErrorKind};
use crate::util::{Condvar, Mutex};
use sia_store as store;
use sia_store::option_to_not_found;

/// Bucket of obligation records keyed by contract id.
pub const OBLIGATIONS_BUCKET: &str = "obligations";
/// Bucket of sector refcounts keyed by sector root.
pub const SECTOR_REFS_BUCKET: &str = "sectorrefs";
/// Bucket of sector bytes keyed by sector root.
pub const SECTOR_DATA_BUCKET: &str = "sectordata";
/// Bucket tracking how much of the chain the registry has processed.
pub const SYNC_BUCKET: &str = "sync";

const CHAIN_LENGTH_KEY: &[u8] = b"chainlength";

/// Identifies the host's obligation store on disk.
pub const HOST_DB_HEADER: &str = "Sia Host DB";
/// Version of the host's obligation store layout.
pub const HOST_DB_VERSION: &str = "1.0";

/// Everything needed to service, revise and prove a single file contract.
#[derive(Debug, Clone, PartialEq)]
pub struct StorageObligation {
	/// Id of the contract this obligation services
	pub id: FileContractId,
	/// The contract as it appeared on chain
	pub contract: FileContract,
	/// Roots of the sectors backing the contract, in file order
	pub sector_roots: Vec<Hash>,
	/// The most recent revision transaction, once one exists
	pub revision_transaction: Option<Transaction>,
	/// Revenue earned at the proof window for storing data
	pub potential_storage_revenue: Currency,
	/// Revenue earned for accepted uploads
	pub potential_upload_revenue: Currency,
	/// Revenue earned for served downloads
	pub potential_download_revenue: Currency,
	/// Collateral lost if the proof is missed
	pub risked_collateral: Currency,
	/// Whether the contract formation has been seen on chain
	pub origin_confirmed: bool,
	/// Whether a storage proof has been seen on chain
	pub proof_confirmed: bool,
}

impl StorageObligation {
	/// A fresh obligation for a newly formed contract.
	pub fn new(id: FileContractId, contract: FileContract) -> StorageObligation {
		StorageObligation {
			id,
			contract,
			sector_roots: vec![],
			revision_transaction: None,
			potential_storage_revenue: Currency::zero(),
			potential_upload_revenue: Currency::zero(),
			potential_download_revenue: Currency::zero(),
			risked_collateral: Currency::zero(),
			origin_confirmed: false,
			proof_confirmed: false,
		}
	}

	/// Height after which the host refuses further revisions.
	pub fn expiration(&self) -> u64 {
		self.contract.window_start
	}

	/// Height by which the storage proof must be in; collateral and storage
	/// revenue accrue until here.
	pub fn proof_deadline(&self) -> u64 {
		self.contract.window_end
	}

	/// The revision currently in force: the one in the latest revision
	/// transaction, or the contract's own terms when nothing has been
	/// revised yet.
	pub fn last_revision(&self) -> FileContractRevision {
		if let Some(tx) = &self.revision_transaction {
			if let Some(rev) = tx.file_contract_revisions.first() {
				return rev.clone();
			}
		}
		FileContractRevision {
			parent_id: self.id,
			unlock_conditions: Default::default(),
			new_revision_number: self.contract.revision_number,
			new_file_size: self.contract.file_size,
			new_file_merkle_root: self.contract.file_merkle_root,
			new_window_start: self.contract.window_start,
			new_window_end: self.contract.window_end,
			new_valid_proof_outputs: self.contract.valid_proof_outputs.clone(),
			new_missed_proof_outputs: self.contract.missed_proof_outputs.clone(),
			new_unlock_hash: self.contract.unlock_hash,
		}
	}
}

impl Writeable for StorageObligation {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
		self.id.write(writer)?;
		self.contract.write(writer)?;
		write_multi(writer, &self.sector_roots)?;
		match &self.revision_transaction {
			Some(tx) => {
				writer.write_u8(1)?;
				tx.write(writer)?;
			}
			None => writer.write_u8(0)?,
		}
		self.potential_storage_revenue.write(writer)?;
		self.potential_upload_revenue.write(writer)?;
		self.potential_download_revenue.write(writer)?;
		self.risked_collateral.write(writer)?;
		writer.write_u8(self.origin_confirmed as u8)?;
		writer.write_u8(self.proof_confirmed as u8)
	}
}

impl Readable for StorageObligation {
	fn read(reader: &mut dyn Reader) -> Result<StorageObligation, ser::Error> {
		let id = Hash::read(reader)?;
		let contract = FileContract::read(reader)?;
		let count = reader.read_u64()?;
		let sector_roots = read_multi(reader, count)?;
		let revision_transaction = match reader.read_u8()? {
			0 => None,
			_ => Some(Transaction::read(reader)?),
		};
		Ok(StorageObligation {
			id,
			contract,
			sector_roots,
			revision_transaction,
			potential_storage_revenue: Currency::read(reader)?,
			potential_upload_revenue: Currency::read(reader)?,
			potential_download_revenue: Currency::read(reader)?,
			risked_collateral: Currency::read(reader)?,
			origin_confirmed: reader.read_u8()? != 0,
			proof_confirmed: reader.read_u8()? != 0,
		})
	}
}

/// Registry of active obligations with per-contract cooperative locking.
/// Reads go through read transactions; every mutation for a revision lands
/// in one atomic batch.
pub struct ObligationStore {
	db: store::Store,
	locked: Mutex<HashSet<FileContractId>>,
	lock_released: Condvar,
}

/// Holds a contract's revision lock; dropping it releases the lock on every
/// path, panics included.
pub struct ObligationLock<'a> {
	store: &'a ObligationStore,
	id: FileContractId,
}

impl<'a> Drop for ObligationLock<'a> {
	fn drop(&mut self) {
		let mut locked = self.store.locked.lock();
		locked.remove(&self.id);
		self.store.lock_released.notify_all();
	}
}

impl ObligationStore {
	/// Opens (creating if necessary) the obligation store under the given
	/// directory.
	pub fn new(db_root: &str) -> Result<ObligationStore, Error> {
		let db = store::Store::new(
			db_root,
			&[
				OBLIGATIONS_BUCKET,
				SECTOR_REFS_BUCKET,
				SECTOR_DATA_BUCKET,
				SYNC_BUCKET,
			],
			HOST_DB_HEADER,
			HOST_DB_VERSION,
		)?;
		Ok(ObligationStore {
			db,
			locked: Mutex::new(HashSet::new()),
			lock_released: Condvar::new(),
		})
	}

	/// Takes the contract's revision lock, blocking until the current
	/// holder releases it.
	pub fn lock(&self, id: FileContractId) -> ObligationLock<'_> {
		let mut locked = self.locked.lock();
		while locked.contains(&id) {
			self.lock_released.wait(&mut locked);
		}
		locked.insert(id);
		ObligationLock { store: self, id }
	}

	/// Takes the contract's revision lock, failing immediately when another
	/// session holds it.
	pub fn try_lock(&self, id: FileContractId) -> Result<ObligationLock<'_>, Error> {
		let mut locked = self.locked.lock();
		if !locked.insert(id) {
			return Err(ErrorKind::ObligationLocked.into());
		}
		Ok(ObligationLock { store: self, id })
	}

	/// Records a fresh obligation. Sectors arrive later through `commit`.
	pub fn add(&self, so: &StorageObligation) -> Result<(), Error> {
		let batch = self.db.batch()?;
		batch.put_ser(OBLIGATIONS_BUCKET, so.id.as_bytes(), so)?;
		batch.commit()?;
		Ok(())
	}

	/// Loads the current state of an obligation.
	pub fn get(&self, id: &FileContractId) -> Result<StorageObligation, Error> {
		let so = option_to_not_found(
			self.db.get_ser(OBLIGATIONS_BUCKET, id.as_bytes()),
			&format!("obligation {}", id),
		)?;
		Ok(so)
	}

	/// Whether an obligation exists for the contract.
	pub fn exists(&self, id: &FileContractId) -> Result<bool, Error> {
		Ok(self.db.exists(OBLIGATIONS_BUCKET, id.as_bytes())?)
	}

	/// All active obligations.
	pub fn all(&self) -> Result<Vec<StorageObligation>, Error> {
		Ok(self.db.iter(OBLIGATIONS_BUCKET, &[])?.collect())
	}

	/// Commits a revised obligation together with its sector diff in one
	/// atomic batch: the new record, refcount increments for added sectors
	/// (bytes written only on first reference) and decrements for removed
	/// ones (bytes freed on last).
	pub fn commit(
		&self,
		so: &StorageObligation,
		added_sectors: &[(Hash, Vec<u8>)],
		removed_sectors: &[Hash],
	) -> Result<(), Error> {
		let batch = self.db.batch()?;

		for (root, data) in added_sectors {
			let key = root.as_bytes();
			let refs: u64 = batch.get_ser(SECTOR_REFS_BUCKET, key)?.unwrap_or(0);
			if refs == 0 {
				batch.put(SECTOR_DATA_BUCKET, key, data.clone())?;
			}
			batch.put_ser(SECTOR_REFS_BUCKET, key, &(refs + 1))?;
		}

		for root in removed_sectors {
			let key = root.as_bytes();
			let refs: u64 = match batch.get_ser(SECTOR_REFS_BUCKET, key)? {
				Some(refs) => refs,
				None => return Err(ErrorKind::SectorNotFound.into()),
			};
			if refs <= 1 {
				batch.delete(SECTOR_REFS_BUCKET, key)?;
				batch.delete(SECTOR_DATA_BUCKET, key)?;
			} else {
				batch.put_ser(SECTOR_REFS_BUCKET, key, &(refs - 1))?;
			}
		}

		batch.put_ser(OBLIGATIONS_BUCKET, so.id.as_bytes(), so)?;
		batch.commit()?;

		debug!(
			"committed obligation {} at revision {}, {} sectors",
			so.id,
			so.last_revision().new_revision_number,
			so.sector_roots.len()
		);
		Ok(())
	}

	/// The bytes of a stored sector.
	pub fn sector(&self, root: &Hash) -> Result<Vec<u8>, Error> {
		match self.db.get(SECTOR_DATA_BUCKET, root.as_bytes())? {
			Some(data) => Ok(data),
			None => Err(ErrorKind::SectorNotFound.into()),
		}
	}

	/// How many obligations reference the sector. Zero means the bytes are
	/// gone too.
	pub fn sector_refcount(&self, root: &Hash) -> Result<u64, Error> {
		Ok(self
			.db
			.get_ser(SECTOR_REFS_BUCKET, root.as_bytes())?
			.unwrap_or(0))
	}

	/// Current chain height as far as the registry has processed, zero
	/// before anything arrives.
	pub fn height(&self) -> Result<u64, Error> {
		let len: u64 = self
			.db
			.get_ser(SYNC_BUCKET, CHAIN_LENGTH_KEY)?
			.unwrap_or(0);
		Ok(len.saturating_sub(1))
	}

	/// Digests a consensus change: tracks height, marks contract formations
	/// and storage proofs (un)confirmed, and closes obligations whose proof
	/// window has passed, releasing their sector references.
	pub fn process_consensus_change(&self, cc: &ConsensusChange) -> Result<(), Error> {
		let chain_length: u64 = self
			.db
			.get_ser(SYNC_BUCKET, CHAIN_LENGTH_KEY)?
			.unwrap_or(0);
		let new_length = (chain_length as i64 + cc.height_delta()).max(0) as u64;
		let height = new_length.saturating_sub(1);

		let batch = self.db.batch()?;
		batch.put_ser(SYNC_BUCKET, CHAIN_LENGTH_KEY, &new_length)?;

		for block in &cc.reverted_blocks {
			for tx in &block.transactions {
				for (i, _fc) in tx.file_contracts.iter().enumerate() {
					let id = tx.file_contract_id(i as u64);
					if let Some(mut so) =
						batch.get_ser::<StorageObligation>(OBLIGATIONS_BUCKET, id.as_bytes())?
					{
						so.origin_confirmed = false;
						batch.put_ser(OBLIGATIONS_BUCKET, id.as_bytes(), &so)?;
					}
				}
				for proof in &tx.storage_proofs {
					let id = proof.parent_id;
					if let Some(mut so) =
						batch.get_ser::<StorageObligation>(OBLIGATIONS_BUCKET, id.as_bytes())?
					{
						so.proof_confirmed = false;
						batch.put_ser(OBLIGATIONS_BUCKET, id.as_bytes(), &so)?;
					}
				}
			}
		}

		for block in &cc.applied_blocks {
			for tx in &block.transactions {
				for (i, _fc) in tx.file_contracts.iter().enumerate() {
					let id = tx.file_contract_id(i as u64);
					if let Some(mut so) =
						batch.get_ser::<StorageObligation>(OBLIGATIONS_BUCKET, id.as_bytes())?
					{
						so.origin_confirmed = true;
						batch.put_ser(OBLIGATIONS_BUCKET, id.as_bytes(), &so)?;
					}
				}
				for proof in &tx.storage_proofs {
					let id = proof.parent_id;
					if let Some(mut so) =
						batch.get_ser::<StorageObligation>(OBLIGATIONS_BUCKET, id.as_bytes())?
					{
						so.proof_confirmed = true;
						batch.put_ser(OBLIGATIONS_BUCKET, id.as_bytes(), &so)?;
					}
				}
			}
		}

		// close everything whose window has passed
		let expired: Vec<StorageObligation> = self
			.db
			.iter::<StorageObligation>(OBLIGATIONS_BUCKET, &[])?
			.filter(|so| so.proof_deadline() < height)
			.collect();
		for so in &expired {
			info!(
				"obligation {} passed its proof window at height {}, closing",
				so.id, height
			);
			for root in &so.sector_roots {
				let key = root.as_bytes();
				let refs: u64 = batch.get_ser(SECTOR_REFS_BUCKET, key)?.unwrap_or(0);
				if refs <= 1 {
					batch.delete(SECTOR_REFS_BUCKET, key)?;
					batch.delete(SECTOR_DATA_BUCKET, key)?;
				} else {
					batch.put_ser(SECTOR_REFS_BUCKET, key, &(refs - 1))?;
				}
			}
			batch.delete(OBLIGATIONS_BUCKET, so.id.as_bytes())?;
		}

		batch.commit()?;
		Ok(())
	}
}
