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

//! The host side of the contract revision protocol.
//!
//! One session revises one contract over one authenticated connection. The
//! exchange is a strict alternation: the host offers its settings, the
//! renter proposes an action list and a matching revision, the host
//! verifies, both sign, the host commits, and the loop either continues or
//! stops. Nothing is persisted before the commit, so a dropped connection
//! discards the in-flight iteration.
//!
//! On the wire every object is a length-prefixed frame; per iteration:
//! settings, renter response, action list, proposed revision, host
//! response, renter signature, host continue/stop, host signature, then
//! the download payload when any was requested.

use std::time::Instant;

use crate::core::core::transaction::{FileContractRevision, Transaction};
use crate::core::core::{merkle, Currency, Hash};
use crate::core::global;
use crate::core::ser::{self, read_multi, Readable, Reader, Writeable, Writer};
use crate::error::{Error, ErrorKind};
use crate::net::{self, Conn};
use crate::obligation::{ObligationStore, StorageObligation};
use crate::types::{
	max_actions_len, HostSettings, TransactionSigner, ITERATED_CONNECTION_TIME,
	MAX_CONTRACT_ID_LEN, MAX_REVISION_LEN, MAX_SIGNATURE_LEN, REVISION_ITERATION_TIME,
};
use crate::verify::verify_revision;

const ACTION_DELETE: u8 = 0;
const ACTION_INSERT: u8 = 1;
const ACTION_MODIFY: u8 = 2;
const ACTION_DOWNLOAD: u8 = 3;

/// One step of a revision: a mutation of the sector vector or a download
/// request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevisionAction {
	/// Remove the sector at the index
	Delete {
		/// Position in the sector vector
		sector_index: u64,
	},
	/// Insert a full sector at the index (index == len appends)
	Insert {
		/// Position in the sector vector
		sector_index: u64,
		/// Exactly one sector of bytes
		data: Vec<u8>,
	},
	/// Overwrite part of the sector at the index
	Modify {
		/// Position in the sector vector
		sector_index: u64,
		/// Byte offset within the sector
		offset: u64,
		/// Replacement bytes
		data: Vec<u8>,
	},
	/// Emit part of a stored sector into the iteration's payload
	Download {
		/// Root of the sector to read
		root: Hash,
		/// Byte offset within the sector
		offset: u64,
		/// How many bytes to emit
		length: u64,
	},
}

impl Writeable for RevisionAction {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
		match self {
			RevisionAction::Delete { sector_index } => {
				writer.write_u8(ACTION_DELETE)?;
				writer.write_u64(*sector_index)
			}
			RevisionAction::Insert { sector_index, data } => {
				writer.write_u8(ACTION_INSERT)?;
				writer.write_u64(*sector_index)?;
				writer.write_bytes(data)
			}
			RevisionAction::Modify {
				sector_index,
				offset,
				data,
			} => {
				writer.write_u8(ACTION_MODIFY)?;
				writer.write_u64(*sector_index)?;
				writer.write_u64(*offset)?;
				writer.write_bytes(data)
			}
			RevisionAction::Download {
				root,
				offset,
				length,
			} => {
				writer.write_u8(ACTION_DOWNLOAD)?;
				root.write(writer)?;
				writer.write_u64(*offset)?;
				writer.write_u64(*length)
			}
		}
	}
}

impl Readable for RevisionAction {
	fn read(reader: &mut dyn Reader) -> Result<RevisionAction, ser::Error> {
		match reader.read_u8()? {
			ACTION_DELETE => Ok(RevisionAction::Delete {
				sector_index: reader.read_u64()?,
			}),
			ACTION_INSERT => Ok(RevisionAction::Insert {
				sector_index: reader.read_u64()?,
				data: reader.read_bytes_len_prefix()?,
			}),
			ACTION_MODIFY => Ok(RevisionAction::Modify {
				sector_index: reader.read_u64()?,
				offset: reader.read_u64()?,
				data: reader.read_bytes_len_prefix()?,
			}),
			ACTION_DOWNLOAD => Ok(RevisionAction::Download {
				root: Hash::read(reader)?,
				offset: reader.read_u64()?,
				length: reader.read_u64()?,
			}),
			tag => Err(ser::Error::UnknownVariant(tag)),
		}
	}
}

/// The ordered action list as it travels in one frame.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RevisionActions(pub Vec<RevisionAction>);

impl Writeable for RevisionActions {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
		writer.write_u64(self.0.len() as u64)?;
		for action in &self.0 {
			action.write(writer)?;
		}
		Ok(())
	}
}

impl Readable for RevisionActions {
	fn read(reader: &mut dyn Reader) -> Result<RevisionActions, ser::Error> {
		let count = reader.read_u64()?;
		Ok(RevisionActions(read_multi(reader, count)?))
	}
}

// Everything one iteration's actions add up to, before any of it is
// persisted.
#[derive(Default)]
struct ActionOutcome {
	added: Vec<(Hash, Vec<u8>)>,
	removed: Vec<Hash>,
	payload: Vec<u8>,
	downloads_requested: bool,
	root_changed: bool,
	storage_revenue: Currency,
	upload_revenue: Currency,
	download_revenue: Currency,
	new_collateral: Currency,
}

impl ActionOutcome {
	fn total_exchange(&self) -> Currency {
		self.storage_revenue.clone()
			+ &self.upload_revenue
			+ &self.download_revenue
	}
}

// A sector touched this iteration may not be committed yet; look through
// the iteration's additions before the store.
fn fetch_sector(
	store: &ObligationStore,
	added: &[(Hash, Vec<u8>)],
	root: &Hash,
) -> Result<Vec<u8>, Error> {
	if let Some((_, data)) = added.iter().rev().find(|(r, _)| r == root) {
		return Ok(data.clone());
	}
	store.sector(root)
}

// Applies the action list to the obligation's in-memory sector vector,
// checking bounds and accumulating pricing. Nothing here touches the
// store's write path.
fn execute_actions(
	store: &ObligationStore,
	settings: &HostSettings,
	so: &mut StorageObligation,
	actions: &[RevisionAction],
	blocks_until_deadline: u64,
) -> Result<ActionOutcome, Error> {
	// the profile owns the sector size; settings merely advertise it, and
	// the verifier sizes the file against the same authority
	let sector_size = global::sector_size();
	let mut outcome = ActionOutcome::default();
	let mut download_total: u64 = 0;

	for action in actions {
		match action {
			RevisionAction::Delete { sector_index } => {
				let i = *sector_index as usize;
				if i >= so.sector_roots.len() {
					return Err(ErrorKind::BadModificationIndex.into());
				}
				// capture the root before the vector changes under it
				let removed = so.sector_roots[i];
				so.sector_roots.remove(i);
				outcome.removed.push(removed);
				outcome.root_changed = true;
			}
			RevisionAction::Insert { sector_index, data } => {
				let i = *sector_index as usize;
				if i > so.sector_roots.len() {
					return Err(ErrorKind::BadModificationIndex.into());
				}
				if data.len() as u64 != sector_size {
					return Err(ErrorKind::BadSectorSize.into());
				}
				let root = merkle::sector_root(data);
				so.sector_roots.insert(i, root);
				outcome.added.push((root, data.clone()));
				outcome.root_changed = true;

				outcome.storage_revenue +=
					&settings.storage_price * sector_size * blocks_until_deadline;
				outcome.upload_revenue += &settings.upload_bandwidth_price * sector_size;
				outcome.new_collateral +=
					&settings.collateral * sector_size * blocks_until_deadline;
			}
			RevisionAction::Modify {
				sector_index,
				offset,
				data,
			} => {
				let i = *sector_index as usize;
				if i >= so.sector_roots.len() {
					return Err(ErrorKind::BadModificationIndex.into());
				}
				if data.len() as u64 > sector_size {
					return Err(ErrorKind::LargeSector.into());
				}
				if *offset > sector_size || offset + data.len() as u64 > sector_size {
					return Err(ErrorKind::IllegalOffsetAndLength.into());
				}

				let old_root = so.sector_roots[i];
				let mut sector = fetch_sector(store, &outcome.added, &old_root)?;
				sector[*offset as usize..*offset as usize + data.len()].copy_from_slice(data);
				let new_root = merkle::sector_root(&sector);

				outcome.removed.push(old_root);
				so.sector_roots[i] = new_root;
				outcome.added.push((new_root, sector));
				outcome.root_changed = true;

				outcome.upload_revenue +=
					&settings.upload_bandwidth_price * data.len() as u64;
			}
			RevisionAction::Download {
				root,
				offset,
				length,
			} => {
				if !so.sector_roots.contains(root) {
					return Err(ErrorKind::BadModificationIndex.into());
				}
				if *length > sector_size || offset + length > sector_size {
					return Err(ErrorKind::RequestOutOfBounds.into());
				}
				download_total += length;
				if download_total > settings.max_download_batch_size {
					return Err(ErrorKind::LargeDownloadBatch.into());
				}

				let sector = fetch_sector(store, &outcome.added, root)?;
				outcome
					.payload
					.extend_from_slice(&sector[*offset as usize..(*offset + *length) as usize]);
				outcome.downloads_requested = true;

				outcome.download_revenue += &settings.download_bandwidth_price * *length;
			}
		}
	}

	Ok(outcome)
}

/// Drives a whole revision session over a pre-authenticated connection:
/// reads the contract id, takes the obligation's lock for the duration, and
/// runs revision iterations until the renter stops, an error ends the
/// session, or the outer deadline makes the host stop it.
pub fn manage_revision_loop<S: Conn>(
	store: &ObligationStore,
	settings: &HostSettings,
	signer: &dyn TransactionSigner,
	conn: &mut S,
) -> Result<(), Error> {
	conn.set_deadline(Some(REVISION_ITERATION_TIME))
		.map_err(net::Error::from)?;
	let contract_id: Hash = net::read_object(conn, MAX_CONTRACT_ID_LEN)?;

	// one in-flight revision per contract; waits for a concurrent session
	let _lock = store.lock(contract_id);

	let session_start = Instant::now();
	loop {
		// per-iteration deadline resets here, the outer bound decides
		// whether this turn is the last
		conn.set_deadline(Some(REVISION_ITERATION_TIME))
			.map_err(net::Error::from)?;
		let final_iter = session_start.elapsed() >= ITERATED_CONNECTION_TIME;

		match revision_iteration(store, settings, signer, conn, &contract_id, final_iter) {
			Ok(true) => continue,
			Ok(false) => return Ok(()),
			Err(e) => match e.kind() {
				// the renter ending the loop is a clean exit
				ErrorKind::StopResponse => return Ok(()),
				_ => {
					warn!(
						"revision session for {} failed: {}",
						contract_id, e
					);
					return Err(e);
				}
			},
		}
	}
}

// Reads one of the renter's proposal frames. A deserialization failure the
// renter caused (an unknown action tag, say) is answered with its typed
// rejection before the session ends; transport failures just end it.
fn read_proposal<S: Conn, T: Readable>(conn: &mut S, max_len: u64) -> Result<T, Error> {
	match net::read_object(conn, max_len) {
		Ok(object) => Ok(object),
		Err(e) => {
			let e = Error::from(e);
			if e.kind().is_validation() {
				let _ = net::write_rejection(conn, &e.kind().rejection_string());
			}
			Err(e)
		}
	}
}

// One full iteration. Returns whether the loop continues.
fn revision_iteration<S: Conn>(
	store: &ObligationStore,
	settings: &HostSettings,
	signer: &dyn TransactionSigner,
	conn: &mut S,
	contract_id: &Hash,
	final_iter: bool,
) -> Result<bool, Error> {
	// settings out, renter's verdict in
	net::write_object(conn, settings)?;
	net::read_acceptance(conn)?;

	// the proposed work: actions then the revision meant to pay for them
	let actions: RevisionActions = read_proposal(conn, max_actions_len())?;
	let revision: FileContractRevision = read_proposal(conn, MAX_REVISION_LEN)?;

	let mut so = store.get(contract_id)?;
	let height = store.height()?;
	let blocks_until_deadline = so.proof_deadline().saturating_sub(height);

	// execute in memory, then verify money against the outcome; any error
	// becomes a typed rejection before the session ends
	let outcome = execute_actions(store, settings, &mut so, &actions.0, blocks_until_deadline)
		.and_then(|outcome| {
			verify_revision(
				&so,
				&revision,
				height,
				&outcome.total_exchange(),
				&outcome.new_collateral,
				outcome.root_changed,
			)?;
			Ok(outcome)
		});
	let outcome = match outcome {
		Ok(outcome) => {
			net::write_acceptance(conn)?;
			outcome
		}
		Err(e) => {
			debug!("rejecting revision of {}: {}", contract_id, e);
			let _ = net::write_rejection(conn, &e.kind().rejection_string());
			return Err(e);
		}
	};

	let renter_sig = net::read_object(conn, MAX_SIGNATURE_LEN)?;

	// both signatures land in the revision transaction that supersedes the
	// old one
	let mut tx = Transaction::default();
	tx.file_contract_revisions.push(revision);
	tx.transaction_signatures.push(renter_sig);
	let host_sig = match signer.sign_revision(&tx) {
		Ok(sig) => sig,
		Err(e) => {
			let _ = net::write_rejection(conn, &e.kind().rejection_string());
			return Err(e);
		}
	};
	tx.transaction_signatures.push(host_sig.clone());

	so.revision_transaction = Some(tx);
	so.potential_storage_revenue += outcome.storage_revenue.clone();
	so.potential_upload_revenue += outcome.upload_revenue.clone();
	so.potential_download_revenue += outcome.download_revenue.clone();
	so.risked_collateral += outcome.new_collateral.clone();

	if let Err(e) = store.commit(&so, &outcome.added, &outcome.removed) {
		let _ = net::write_rejection(conn, &e.kind().rejection_string());
		return Err(e);
	}

	// continue or wind the session down, then our signature, then whatever
	// downloads the renter asked for
	if final_iter {
		net::write_stop(conn)?;
	} else {
		net::write_acceptance(conn)?;
	}
	net::write_object(conn, &host_sig)?;
	if outcome.downloads_requested {
		net::write_object(conn, &outcome.payload)?;
	}

	Ok(!final_iter)
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::core::ser::{deserialize, ser_vec};

	#[test]
	fn action_round_trip() {
		let actions = RevisionActions(vec![
			RevisionAction::Delete { sector_index: 3 },
			RevisionAction::Insert {
				sector_index: 0,
				data: vec![0xAB; 128],
			},
			RevisionAction::Modify {
				sector_index: 1,
				offset: 64,
				data: vec![0xFF],
			},
			RevisionAction::Download {
				root: Default::default(),
				offset: 0,
				length: 64,
			},
		]);
		let encoded = ser_vec(&actions).unwrap();
		let decoded: RevisionActions = deserialize(&mut &encoded[..]).unwrap();
		assert_eq!(decoded, actions);
	}

	#[test]
	fn unknown_tag_is_typed() {
		let mut encoded = ser_vec(&1u64).unwrap();
		encoded.push(0xEE);
		let res: Result<RevisionActions, ser::Error> = deserialize(&mut &encoded[..]);
		match res {
			Err(ser::Error::UnknownVariant(0xEE)) => {}
			other => panic!("expected UnknownVariant, got {:?}", other),
		}
	}
}
