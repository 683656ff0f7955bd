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
use sia_explorer as explorer;
use sia_util as util;

use std::fs;

use chrono::prelude::{TimeZone, Utc};

use self::core::core::hash::hash_all;
use self::core::core::transaction::{
	FileContractRevision, SiacoinInput, SiafundInput, SiafundOutput, StorageProof,
	UnlockConditions,
};
use self::core::core::{
	Block, ConsensusChange, Currency, FileContract, SiacoinOutput, Transaction,
};
use explorer::{Error, Explorer, HashClass};

fn clean_output_dir(test_dir: &str) {
	let _ = fs::remove_dir_all(test_dir);
}

fn setup(test_dir: &str) {
	util::init_test_logger();
	clean_output_dir(test_dir);
}

fn conditions(seed: u8) -> UnlockConditions {
	UnlockConditions {
		timelock: 0,
		public_keys: vec![vec![seed; 32]],
		signatures_required: 1,
	}
}

// A distinct empty block; the nonce keeps ids apart.
fn bare_block(parent: &Block, nonce: u64) -> Block {
	let mut block = Block::default();
	block.header.parent_id = parent.id();
	block.header.nonce = nonce;
	block.header.timestamp = Utc.timestamp_opt(1_500_000_000 + nonce as i64, 0).unwrap();
	block
}

fn apply(explorer: &Explorer, blocks: &[&Block]) {
	let mut cc = ConsensusChange::default();
	cc.applied_blocks = blocks.iter().map(|b| (*b).clone()).collect();
	explorer.process_consensus_change(&cc).unwrap();
}

#[test]
fn reorg_rewrites_the_block_path() {
	let test_dir = "test_output/explorer_reorg";
	setup(test_dir);

	let explorer = Explorer::open(test_dir).unwrap();

	let genesis = Block::default();
	let b1 = bare_block(&genesis, 1);
	let mut b2 = bare_block(&b1, 2);
	let mut b3 = bare_block(&b2, 3);

	// b2 and b3 each confirm a transaction
	let mut tx2 = Transaction::default();
	tx2.arbitrary_data.push(b"b2 payload".to_vec());
	b2.transactions.push(tx2.clone());
	let mut tx3 = Transaction::default();
	tx3.arbitrary_data.push(b"b3 payload".to_vec());
	b3.transactions.push(tx3.clone());

	apply(&explorer, &[&genesis, &b1, &b2, &b3]);
	assert_eq!(explorer.height().unwrap(), Some(3));

	// reorg: b3 and b2 leave, b2' and b3' arrive
	let mut b2p = bare_block(&b1, 22);
	let mut tx2p = Transaction::default();
	tx2p.arbitrary_data.push(b"b2' payload".to_vec());
	b2p.transactions.push(tx2p.clone());
	let mut b3p = bare_block(&b2p, 33);
	let mut tx3p = Transaction::default();
	tx3p.arbitrary_data.push(b"b3' payload".to_vec());
	b3p.transactions.push(tx3p.clone());

	let mut cc = ConsensusChange::default();
	cc.reverted_blocks = vec![b3.clone(), b2.clone()];
	cc.applied_blocks = vec![b2p.clone(), b3p.clone()];
	explorer.process_consensus_change(&cc).unwrap();

	assert_eq!(explorer.height().unwrap(), Some(3));
	assert_eq!(explorer.block_at_height(0).unwrap().block.id(), genesis.id());
	assert_eq!(explorer.block_at_height(1).unwrap().block.id(), b1.id());
	assert_eq!(explorer.block_at_height(2).unwrap().block.id(), b2p.id());
	assert_eq!(explorer.block_at_height(3).unwrap().block.id(), b3p.id());

	// transactions confined to the abandoned branch are gone
	for id in &[tx2.id(), tx3.id()] {
		match explorer.transaction(id) {
			Err(Error::NotFound(_)) => {}
			other => panic!("expected NotFound, got {:?}", other),
		}
	}
	// the new branch's transactions resolve
	assert_eq!(
		explorer.transaction(&tx2p.id()).unwrap().block_id,
		b2p.id()
	);
	assert_eq!(
		explorer.transaction(&tx3p.id()).unwrap().block_id,
		b3p.id()
	);

	clean_output_dir(test_dir);
}

#[test]
fn block_path_is_contiguous() {
	let test_dir = "test_output/explorer_contiguous";
	setup(test_dir);

	let explorer = Explorer::open(test_dir).unwrap();

	let genesis = Block::default();
	let b1 = bare_block(&genesis, 1);
	let b2 = bare_block(&b1, 2);
	apply(&explorer, &[&genesis, &b1, &b2]);

	let height = explorer.height().unwrap().unwrap();
	assert_eq!(height, 2);
	for h in 0..=height {
		let record = explorer.block_at_height(h).unwrap();
		assert_eq!(record.height, h);
		// every path entry resolves in the blocks bucket too
		explorer.block(&record.block.id()).unwrap();
	}
	match explorer.block_at_height(height + 1) {
		Err(Error::NotFound(_)) => {}
		other => panic!("expected NotFound, got {:?}", other),
	}

	clean_output_dir(test_dir);
}

// A block that touches every secondary index: spends outputs from the
// setup block, creates new ones, forms, revises and proves contracts.
fn busy_block(parent: &Block, setup_tx: &Transaction, setup_block: &Block) -> Block {
	let mut block = bare_block(parent, 77);
	block.header.miner_payouts.push(SiacoinOutput {
		value: Currency::from(50_000),
		unlock_hash: hash_all(&[b"miner"]),
	});

	// forms a contract and spends the setup outputs
	let mut tx_a = Transaction::default();
	tx_a.siacoin_inputs.push(SiacoinInput {
		parent_id: setup_tx.siacoin_output_id(0),
		unlock_conditions: conditions(1),
	});
	tx_a.siafund_inputs.push(SiafundInput {
		parent_id: setup_tx.siafund_output_id(0),
		unlock_conditions: conditions(2),
	});
	tx_a.siacoin_outputs.push(SiacoinOutput {
		value: Currency::from(900),
		unlock_hash: hash_all(&[b"change"]),
	});
	tx_a.siafund_outputs.push(SiafundOutput {
		value: Currency::from(10),
		unlock_hash: hash_all(&[b"fund change"]),
	});
	tx_a.file_contracts.push(FileContract {
		window_start: 500,
		window_end: 600,
		unlock_hash: conditions(3).unlock_hash(),
		..Default::default()
	});
	block.transactions.push(tx_a.clone());

	// revises and proves the contract formed in the setup block
	let setup_contract_id = setup_tx.file_contract_id(0);
	let mut tx_b = Transaction::default();
	tx_b.file_contract_revisions.push(FileContractRevision {
		parent_id: setup_contract_id,
		unlock_conditions: conditions(3),
		new_revision_number: 1,
		new_unlock_hash: hash_all(&[b"contract addr"]),
		..Default::default()
	});
	tx_b.storage_proofs.push(StorageProof {
		parent_id: setup_contract_id,
		segment: vec![0u8; 64],
		hash_set: vec![hash_all(&[b"sibling"])],
	});
	block.transactions.push(tx_b);

	// a miner payout from the setup block gets spent as well
	let mut tx_c = Transaction::default();
	tx_c.siacoin_inputs.push(SiacoinInput {
		parent_id: setup_block.miner_payout_id(0),
		unlock_conditions: conditions(4),
	});
	block.transactions.push(tx_c);

	block
}

#[test]
fn apply_then_revert_restores_every_bucket() {
	let test_dir = "test_output/explorer_restore";
	setup(test_dir);

	let explorer = Explorer::open(test_dir).unwrap();

	// setup chain: genesis plus a block creating outputs, a contract and a
	// miner payout for the busy block to consume
	let genesis = Block::default();
	let mut b1 = bare_block(&genesis, 1);
	b1.header.miner_payouts.push(SiacoinOutput {
		value: Currency::from(300_000),
		unlock_hash: hash_all(&[b"b1 miner"]),
	});
	let mut setup_tx = Transaction::default();
	setup_tx.siacoin_outputs.push(SiacoinOutput {
		value: Currency::from(1000),
		unlock_hash: hash_all(&[b"funds"]),
	});
	setup_tx.siafund_outputs.push(SiafundOutput {
		value: Currency::from(10),
		unlock_hash: hash_all(&[b"funds"]),
	});
	setup_tx.file_contracts.push(FileContract {
		window_start: 500,
		window_end: 600,
		unlock_hash: hash_all(&[b"contract addr"]),
		..Default::default()
	});
	b1.transactions.push(setup_tx.clone());
	apply(&explorer, &[&genesis, &b1]);

	let before: Vec<_> = explorer::store::ALL_BUCKETS
		.iter()
		.map(|bucket| explorer.bucket_pairs(bucket).unwrap())
		.collect();

	// apply the busy block, then revert it
	let b2 = busy_block(&b1, &setup_tx, &b1);
	apply(&explorer, &[&b2]);

	// the apply visibly changed things
	assert_eq!(
		explorer
			.siacoin_output(&setup_tx.siacoin_output_id(0))
			.unwrap()
			.spending_tx,
		Some(b2.transactions[0].id())
	);
	assert_eq!(
		explorer
			.file_contract(&setup_tx.file_contract_id(0))
			.unwrap()
			.revision_txs
			.len(),
		1
	);

	let mut cc = ConsensusChange::default();
	cc.reverted_blocks = vec![b2];
	explorer.process_consensus_change(&cc).unwrap();

	// every bucket is back to its pre-apply bytes
	let after: Vec<_> = explorer::store::ALL_BUCKETS
		.iter()
		.map(|bucket| explorer.bucket_pairs(bucket).unwrap())
		.collect();
	assert_eq!(before, after);

	clean_output_dir(test_dir);
}

#[test]
fn subscribers_are_poked_after_commit() {
	let test_dir = "test_output/explorer_subscribe";
	setup(test_dir);

	let explorer = Explorer::open(test_dir).unwrap();
	let receiver = explorer.subscribe();

	let genesis = Block::default();
	apply(&explorer, &[&genesis]);

	// the poke arrives only after the index reflects the change
	receiver
		.recv_timeout(std::time::Duration::from_secs(5))
		.unwrap();
	assert_eq!(explorer.height().unwrap(), Some(0));

	clean_output_dir(test_dir);
}

#[test]
fn hashes_classify_everything() {
	let test_dir = "test_output/explorer_hashes";
	setup(test_dir);

	let explorer = Explorer::open(test_dir).unwrap();

	let genesis = Block::default();
	let mut b1 = bare_block(&genesis, 1);
	let mut tx = Transaction::default();
	tx.siacoin_outputs.push(SiacoinOutput {
		value: Currency::from(1000),
		unlock_hash: hash_all(&[b"addr"]),
	});
	tx.file_contracts.push(FileContract {
		window_start: 500,
		window_end: 600,
		..Default::default()
	});
	b1.transactions.push(tx.clone());
	apply(&explorer, &[&genesis, &b1]);

	assert_eq!(explorer.hash_class(&b1.id()).unwrap(), HashClass::Block);
	assert_eq!(
		explorer.hash_class(&tx.id()).unwrap(),
		HashClass::Transaction
	);
	assert_eq!(
		explorer.hash_class(&tx.siacoin_output_id(0)).unwrap(),
		HashClass::SiacoinOutput
	);
	assert_eq!(
		explorer.hash_class(&tx.file_contract_id(0)).unwrap(),
		HashClass::FileContract
	);
	assert_eq!(
		explorer.hash_class(&hash_all(&[b"addr"])).unwrap(),
		HashClass::UnlockHash
	);
	assert_eq!(
		explorer.address_transactions(&hash_all(&[b"addr"])).unwrap(),
		vec![tx.id()]
	);

	// the genesis height summary carries the root target
	let summary = explorer.height_summary(0).unwrap();
	assert_eq!(summary.target, self::core::consensus::ROOT_TARGET);
	assert_eq!(summary.block_id, genesis.id());

	clean_output_dir(test_dir);
}
