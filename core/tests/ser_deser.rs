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

use sia_core as core;

use chrono::prelude::{TimeZone, Utc};

use self::core::core::hash::hash_all;
use self::core::core::{
	Block, Currency, FileContract, FileContractRevision, SiacoinInput, SiacoinOutput,
	Transaction, TransactionSignature, UnlockConditions,
};
use self::core::ser::{deserialize, ser_vec};

fn sample_conditions() -> UnlockConditions {
	UnlockConditions {
		timelock: 0,
		public_keys: vec![vec![7u8; 32], vec![9u8; 32]],
		signatures_required: 2,
	}
}

fn sample_contract() -> FileContract {
	FileContract {
		file_size: 1 << 12,
		file_merkle_root: hash_all(&[b"root"]),
		window_start: 1000,
		window_end: 1100,
		payout: Currency::from(1_000_000),
		valid_proof_outputs: vec![
			SiacoinOutput {
				value: Currency::from(700_000),
				unlock_hash: hash_all(&[b"renter"]),
			},
			SiacoinOutput {
				value: Currency::from(300_000),
				unlock_hash: hash_all(&[b"host"]),
			},
		],
		missed_proof_outputs: vec![
			SiacoinOutput {
				value: Currency::from(700_000),
				unlock_hash: hash_all(&[b"renter"]),
			},
			SiacoinOutput {
				value: Currency::from(200_000),
				unlock_hash: hash_all(&[b"host"]),
			},
			SiacoinOutput {
				value: Currency::from(100_000),
				unlock_hash: hash_all(&[b"void"]),
			},
		],
		unlock_hash: sample_conditions().unlock_hash(),
		revision_number: 1,
	}
}

fn sample_transaction() -> Transaction {
	let mut tx = Transaction::default();
	tx.siacoin_inputs.push(SiacoinInput {
		parent_id: hash_all(&[b"parent output"]),
		unlock_conditions: sample_conditions(),
	});
	tx.siacoin_outputs.push(SiacoinOutput {
		value: Currency::from(12345),
		unlock_hash: hash_all(&[b"destination"]),
	});
	tx.file_contracts.push(sample_contract());
	tx.file_contract_revisions.push(FileContractRevision {
		parent_id: hash_all(&[b"contract"]),
		unlock_conditions: sample_conditions(),
		new_revision_number: 2,
		new_file_size: 1 << 12,
		new_file_merkle_root: hash_all(&[b"new root"]),
		new_window_start: 1000,
		new_window_end: 1100,
		new_valid_proof_outputs: sample_contract().valid_proof_outputs,
		new_missed_proof_outputs: sample_contract().missed_proof_outputs,
		new_unlock_hash: sample_conditions().unlock_hash(),
	});
	tx.miner_fees.push(Currency::from(500));
	tx.arbitrary_data.push(b"host announcement".to_vec());
	tx.transaction_signatures.push(TransactionSignature {
		parent_id: hash_all(&[b"parent output"]),
		public_key_index: 1,
		timelock: 0,
		covered_fields: Default::default(),
		signature: vec![0xAB; 64],
	});
	tx
}

#[test]
fn transaction_round_trip() {
	let tx = sample_transaction();
	let encoded = ser_vec(&tx).unwrap();
	let decoded: Transaction = deserialize(&mut &encoded[..]).unwrap();
	assert_eq!(decoded, tx);
}

#[test]
fn block_round_trip() {
	let mut block = Block::default();
	block.header.parent_id = hash_all(&[b"parent block"]);
	block.header.nonce = 0xDEADBEEF;
	block.header.timestamp = Utc.timestamp_opt(1_500_000_000, 0).unwrap();
	block.header.miner_payouts.push(SiacoinOutput {
		value: Currency::from(300_000),
		unlock_hash: hash_all(&[b"miner"]),
	});
	block.transactions.push(sample_transaction());

	let encoded = ser_vec(&block).unwrap();
	let decoded: Block = deserialize(&mut &encoded[..]).unwrap();
	assert_eq!(decoded, block);
	assert_eq!(decoded.id(), block.id());
}

#[test]
fn revision_round_trip() {
	let rev = sample_transaction().file_contract_revisions[0].clone();
	let encoded = ser_vec(&rev).unwrap();
	let decoded: FileContractRevision = deserialize(&mut &encoded[..]).unwrap();
	assert_eq!(decoded, rev);
}

#[test]
fn signature_round_trip() {
	let sig = sample_transaction().transaction_signatures[0].clone();
	let encoded = ser_vec(&sig).unwrap();
	let decoded: TransactionSignature = deserialize(&mut &encoded[..]).unwrap();
	assert_eq!(decoded, sig);
}

#[test]
fn serialization_is_canonical() {
	// the same transaction must always produce the same bytes; ids depend
	// on it
	let a = ser_vec(&sample_transaction()).unwrap();
	let b = ser_vec(&sample_transaction()).unwrap();
	assert_eq!(a, b);
}

#[test]
fn id_stable_across_round_trip() {
	let tx = sample_transaction();
	let encoded = ser_vec(&tx).unwrap();
	let decoded: Transaction = deserialize(&mut &encoded[..]).unwrap();
	assert_eq!(decoded.id(), tx.id());
}
