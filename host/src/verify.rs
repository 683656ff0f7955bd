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

//! Byzantine-safe verification of a proposed contract revision.
//!
//! Pure over its inputs: the obligation (with the sector vector already
//! reflecting the iteration's actions), the proposed revision, the current
//! height and what the host expects to be paid and to risk. Every check has
//! its own error kind so the renter can classify a rejection.

use crate::core::core::merkle;
use crate::core::core::transaction::{
	FileContractRevision, HOST_PAYOUT_INDEX, MISSED_PROOF_OUTPUT_COUNT, RENTER_PAYOUT_INDEX,
	VALID_PROOF_OUTPUT_COUNT,
};
use crate::core::core::Currency;
use crate::core::global;
use crate::error::{Error, ErrorKind};
use crate::obligation::StorageObligation;

/// Accepts or rejects a proposed revision against the obligation's current
/// state. `expected_exchange` is the payment the host computed for the
/// iteration's actions, `expected_collateral` the additional collateral it
/// agreed to risk, and `root_changed` whether any action touched the sector
/// vector.
pub fn verify_revision(
	so: &StorageObligation,
	revision: &FileContractRevision,
	block_height: u64,
	expected_exchange: &Currency,
	expected_collateral: &Currency,
	root_changed: bool,
) -> Result<(), Error> {
	// the fixed output shape everything below indexes into
	if revision.new_valid_proof_outputs.len() != VALID_PROOF_OUTPUT_COUNT
		|| revision.new_missed_proof_outputs.len() != MISSED_PROOF_OUTPUT_COUNT
	{
		return Err(ErrorKind::BadOutputCounts.into());
	}

	// late revisions risk the final revision never confirming before the
	// proof window
	if block_height + global::revision_submission_buffer() >= so.expiration() {
		return Err(ErrorKind::LateRevision.into());
	}

	let old = so.last_revision();

	if revision.parent_id != so.id {
		return Err(ErrorKind::BadParent.into());
	}
	if revision.unlock_conditions.unlock_hash() != so.contract.unlock_hash {
		return Err(ErrorKind::BadUnlockConditions.into());
	}
	if revision.new_unlock_hash != old.new_unlock_hash {
		return Err(ErrorKind::BadUnlockHash.into());
	}
	if revision.new_window_start != old.new_window_start
		|| revision.new_window_end != old.new_window_end
	{
		return Err(ErrorKind::BadWindow.into());
	}

	if revision.new_file_size != so.sector_roots.len() as u64 * global::sector_size() {
		return Err(ErrorKind::BadFileSize.into());
	}

	if revision.new_revision_number <= old.new_revision_number {
		return Err(ErrorKind::BadRevisionNumber.into());
	}

	// the renter's valid output may only decrease, by at least the agreed
	// exchange
	let old_renter_valid = &old.new_valid_proof_outputs[RENTER_PAYOUT_INDEX].value;
	let new_renter_valid = &revision.new_valid_proof_outputs[RENTER_PAYOUT_INDEX].value;
	let exchange = match old_renter_valid.checked_sub(new_renter_valid) {
		Some(exchange) => exchange,
		None => return Err(ErrorKind::HighRenterValidOutput.into()),
	};
	if &exchange < expected_exchange {
		return Err(ErrorKind::HighRenterValidOutput.into());
	}

	// the host's valid output must gain exactly what the renter gave up
	let old_host_valid = &old.new_valid_proof_outputs[HOST_PAYOUT_INDEX].value;
	let new_host_valid = &revision.new_valid_proof_outputs[HOST_PAYOUT_INDEX].value;
	match new_host_valid.checked_sub(old_host_valid) {
		Some(gain) if gain == exchange => {}
		_ => return Err(ErrorKind::LowHostValidOutput.into()),
	}

	// a renter paid more on a missed proof than a valid one would profit
	// from the host failing
	let new_renter_missed = &revision.new_missed_proof_outputs[RENTER_PAYOUT_INDEX].value;
	if new_renter_missed > new_renter_valid {
		return Err(ErrorKind::HighRenterMissedOutput.into());
	}

	// the host's missed output may drop by at most the agreed collateral
	let old_host_missed = &old.new_missed_proof_outputs[HOST_PAYOUT_INDEX].value;
	let new_host_missed = &revision.new_missed_proof_outputs[HOST_PAYOUT_INDEX].value;
	if let Some(risked) = old_host_missed.checked_sub(new_host_missed) {
		if &risked > expected_collateral {
			return Err(ErrorKind::LargeHostCollateral.into());
		}
	}

	if root_changed && merkle::cached_root(&so.sector_roots) != revision.new_file_merkle_root {
		return Err(ErrorKind::BadFileMerkleRoot.into());
	}

	Ok(())
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::core::core::hash::hash_all;
	use crate::core::core::transaction::{FileContract, SiacoinOutput, UnlockConditions};
	use crate::core::global::{set_chain_type, ChainTypes};

	fn conditions() -> UnlockConditions {
		UnlockConditions {
			timelock: 0,
			public_keys: vec![vec![1u8; 32], vec![2u8; 32]],
			signatures_required: 2,
		}
	}

	fn obligation() -> StorageObligation {
		set_chain_type(ChainTypes::AutomatedTesting);
		let contract = FileContract {
			file_size: 0,
			file_merkle_root: Default::default(),
			window_start: 1000,
			window_end: 1100,
			payout: Currency::from(1_000_000),
			valid_proof_outputs: vec![
				SiacoinOutput {
					value: Currency::from(500_000),
					unlock_hash: hash_all(&[b"renter"]),
				},
				SiacoinOutput {
					value: Currency::from(500_000),
					unlock_hash: hash_all(&[b"host"]),
				},
			],
			missed_proof_outputs: vec![
				SiacoinOutput {
					value: Currency::from(500_000),
					unlock_hash: hash_all(&[b"renter"]),
				},
				SiacoinOutput {
					value: Currency::from(400_000),
					unlock_hash: hash_all(&[b"host"]),
				},
				SiacoinOutput {
					value: Currency::from(100_000),
					unlock_hash: hash_all(&[b"void"]),
				},
			],
			unlock_hash: conditions().unlock_hash(),
			revision_number: 5,
		};
		StorageObligation::new(hash_all(&[b"contract id"]), contract)
	}

	// a revision moving `amount` from the renter's valid output to the
	// host's
	fn paying_revision(so: &StorageObligation, amount: u64) -> FileContractRevision {
		let old = so.last_revision();
		let mut rev = old.clone();
		rev.unlock_conditions = conditions();
		rev.new_revision_number = old.new_revision_number + 1;
		rev.new_valid_proof_outputs[RENTER_PAYOUT_INDEX].value = old.new_valid_proof_outputs
			[RENTER_PAYOUT_INDEX]
			.value
			.checked_sub(&Currency::from(amount))
			.unwrap();
		rev.new_valid_proof_outputs[HOST_PAYOUT_INDEX].value =
			old.new_valid_proof_outputs[HOST_PAYOUT_INDEX].value.clone() + Currency::from(amount);
		rev.new_missed_proof_outputs[RENTER_PAYOUT_INDEX].value =
			rev.new_valid_proof_outputs[RENTER_PAYOUT_INDEX].value.clone();
		rev
	}

	#[test]
	fn accepts_a_clean_payment() {
		let so = obligation();
		let rev = paying_revision(&so, 1000);
		verify_revision(&so, &rev, 10, &Currency::from(1000), &Currency::zero(), false).unwrap();
	}

	#[test]
	fn rejects_equal_revision_number() {
		let so = obligation();
		let mut rev = paying_revision(&so, 1000);
		rev.new_revision_number = so.last_revision().new_revision_number;
		let err = verify_revision(&so, &rev, 10, &Currency::from(1000), &Currency::zero(), false)
			.unwrap_err();
		assert_eq!(err.kind(), ErrorKind::BadRevisionNumber);
	}

	#[test]
	fn rejects_late_revision() {
		let so = obligation();
		let rev = paying_revision(&so, 1000);
		// right at the buffer boundary
		let height = so.expiration() - global::revision_submission_buffer();
		let err = verify_revision(
			&so,
			&rev,
			height,
			&Currency::from(1000),
			&Currency::zero(),
			false,
		)
		.unwrap_err();
		assert_eq!(err.kind(), ErrorKind::LateRevision);
	}

	#[test]
	fn rejects_wrong_output_counts() {
		let so = obligation();
		let mut rev = paying_revision(&so, 1000);
		rev.new_missed_proof_outputs.pop();
		let err = verify_revision(&so, &rev, 10, &Currency::from(1000), &Currency::zero(), false)
			.unwrap_err();
		assert_eq!(err.kind(), ErrorKind::BadOutputCounts);
	}

	#[test]
	fn rejects_underpayment() {
		let so = obligation();
		let rev = paying_revision(&so, 999);
		let err = verify_revision(&so, &rev, 10, &Currency::from(1000), &Currency::zero(), false)
			.unwrap_err();
		assert_eq!(err.kind(), ErrorKind::HighRenterValidOutput);
	}

	#[test]
	fn rejects_host_not_gaining_the_exchange() {
		let so = obligation();
		let mut rev = paying_revision(&so, 1000);
		// renter pays but the host output doesn't gain it all
		rev.new_valid_proof_outputs[HOST_PAYOUT_INDEX].value =
			so.last_revision().new_valid_proof_outputs[HOST_PAYOUT_INDEX]
				.value
				.clone() + Currency::from(999);
		let err = verify_revision(&so, &rev, 10, &Currency::from(1000), &Currency::zero(), false)
			.unwrap_err();
		assert_eq!(err.kind(), ErrorKind::LowHostValidOutput);
	}

	#[test]
	fn rejects_renter_missed_above_valid() {
		let so = obligation();
		let mut rev = paying_revision(&so, 1000);
		rev.new_missed_proof_outputs[RENTER_PAYOUT_INDEX].value =
			rev.new_valid_proof_outputs[RENTER_PAYOUT_INDEX].value.clone() + Currency::from(1);
		let err = verify_revision(&so, &rev, 10, &Currency::from(1000), &Currency::zero(), false)
			.unwrap_err();
		assert_eq!(err.kind(), ErrorKind::HighRenterMissedOutput);
	}

	#[test]
	fn rejects_excess_collateral() {
		let so = obligation();
		let mut rev = paying_revision(&so, 1000);
		rev.new_missed_proof_outputs[HOST_PAYOUT_INDEX].value = so.last_revision()
			.new_missed_proof_outputs[HOST_PAYOUT_INDEX]
			.value
			.checked_sub(&Currency::from(5000))
			.unwrap();
		let err = verify_revision(
			&so,
			&rev,
			10,
			&Currency::from(1000),
			&Currency::from(4999),
			false,
		)
		.unwrap_err();
		assert_eq!(err.kind(), ErrorKind::LargeHostCollateral);
	}

	#[test]
	fn rejects_window_change() {
		let so = obligation();
		let mut rev = paying_revision(&so, 1000);
		rev.new_window_end += 1;
		let err = verify_revision(&so, &rev, 10, &Currency::from(1000), &Currency::zero(), false)
			.unwrap_err();
		assert_eq!(err.kind(), ErrorKind::BadWindow);
	}

	#[test]
	fn merkle_root_checked_only_when_changed() {
		let mut so = obligation();
		so.sector_roots.push(hash_all(&[b"sector"]));
		so.contract.file_size = global::sector_size();
		let mut rev = paying_revision(&so, 1000);
		rev.new_file_size = global::sector_size();
		rev.new_file_merkle_root = hash_all(&[b"not the root"]);

		let err = verify_revision(&so, &rev, 10, &Currency::from(1000), &Currency::zero(), true)
			.unwrap_err();
		assert_eq!(err.kind(), ErrorKind::BadFileMerkleRoot);

		// with the right root it passes
		rev.new_file_merkle_root = merkle::cached_root(&so.sector_roots);
		verify_revision(&so, &rev, 10, &Currency::from(1000), &Currency::zero(), true).unwrap();
	}
}
