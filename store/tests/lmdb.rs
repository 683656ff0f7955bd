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

use sia_store as store;
use sia_util as util;

use std::fs;

use store::{u64_key, Error, Store};

const TEST_HEADER: &str = "Test Store";
const TEST_VERSION: &str = "1.0";

fn clean_output_dir(test_dir: &str) {
	let _ = fs::remove_dir_all(test_dir);
}

fn setup(test_dir: &str) {
	util::init_test_logger();
	clean_output_dir(test_dir);
}

#[test]
fn multi_bucket_batch_is_atomic() {
	let test_dir = "test_output/lmdb_multi_bucket";
	setup(test_dir);

	let store = Store::new(test_dir, &["one", "two"], TEST_HEADER, TEST_VERSION).unwrap();

	{
		let batch = store.batch().unwrap();
		batch.put("one", b"k1", b"v1".to_vec()).unwrap();
		batch.put("two", b"k2", b"v2".to_vec()).unwrap();

		// visible within the batch
		assert_eq!(batch.get("one", b"k1").unwrap(), Some(b"v1".to_vec()));
		// not visible outside before commit
		assert_eq!(store.get("one", b"k1").unwrap(), None);

		batch.commit().unwrap();
	}

	assert_eq!(store.get("one", b"k1").unwrap(), Some(b"v1".to_vec()));
	assert_eq!(store.get("two", b"k2").unwrap(), Some(b"v2".to_vec()));

	// a dropped batch leaves no trace
	{
		let batch = store.batch().unwrap();
		batch.put("one", b"k3", b"v3".to_vec()).unwrap();
		// batch dropped without commit
	}
	assert_eq!(store.get("one", b"k3").unwrap(), None);

	clean_output_dir(test_dir);
}

#[test]
fn reopen_checks_metadata() {
	let test_dir = "test_output/lmdb_metadata";
	setup(test_dir);

	{
		let store = Store::new(test_dir, &["data"], TEST_HEADER, TEST_VERSION).unwrap();
		let batch = store.batch().unwrap();
		batch.put("data", b"key", b"value".to_vec()).unwrap();
		batch.commit().unwrap();
	}

	// reopening with matching metadata sees the data
	{
		let store = Store::new(test_dir, &["data"], TEST_HEADER, TEST_VERSION).unwrap();
		assert_eq!(store.get("data", b"key").unwrap(), Some(b"value".to_vec()));
	}

	// wrong header and wrong version produce distinct errors
	match Store::new(test_dir, &["data"], "Other Store", TEST_VERSION) {
		Err(Error::BadHeader { .. }) => {}
		other => panic!("expected BadHeader, got {:?}", other.err()),
	}
	match Store::new(test_dir, &["data"], TEST_HEADER, "2.0") {
		Err(Error::BadVersion { .. }) => {}
		other => panic!("expected BadVersion, got {:?}", other.err()),
	}

	clean_output_dir(test_dir);
}

#[test]
fn delete_and_exists() {
	let test_dir = "test_output/lmdb_delete";
	setup(test_dir);

	let store = Store::new(test_dir, &["data"], TEST_HEADER, TEST_VERSION).unwrap();

	let batch = store.batch().unwrap();
	batch.put("data", b"key", b"value".to_vec()).unwrap();
	batch.commit().unwrap();
	assert!(store.exists("data", b"key").unwrap());

	let batch = store.batch().unwrap();
	batch.delete("data", b"key").unwrap();
	batch.commit().unwrap();
	assert!(!store.exists("data", b"key").unwrap());

	clean_output_dir(test_dir);
}

#[test]
fn unknown_bucket_is_rejected() {
	let test_dir = "test_output/lmdb_unknown_bucket";
	setup(test_dir);

	let store = Store::new(test_dir, &["data"], TEST_HEADER, TEST_VERSION).unwrap();
	match store.get("nope", b"key") {
		Err(Error::UnknownBucket(_)) => {}
		other => panic!("expected UnknownBucket, got {:?}", other),
	}

	clean_output_dir(test_dir);
}

#[test]
fn iteration_follows_key_order() {
	let test_dir = "test_output/lmdb_iter";
	setup(test_dir);

	let store = Store::new(test_dir, &["heights"], TEST_HEADER, TEST_VERSION).unwrap();

	let batch = store.batch().unwrap();
	for h in &[3u64, 1, 0, 2] {
		batch
			.put_ser("heights", &u64_key(*h), &(*h * 10))
			.unwrap();
	}
	batch.commit().unwrap();

	// big-endian keys iterate in numeric order
	let values: Vec<u64> = store.iter("heights", &[]).unwrap().collect();
	assert_eq!(values, vec![0, 10, 20, 30]);

	clean_output_dir(test_dir);
}
