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

use sia_util as util;

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use util::persist::{self, Error, Metadata, MANUAL_CHECKSUM};

fn setup(test_dir: &str) -> PathBuf {
	util::init_test_logger();
	let _ = fs::remove_dir_all(test_dir);
	fs::create_dir_all(test_dir).unwrap();
	Path::new(test_dir).join("snapshot.json")
}

fn meta() -> Metadata {
	Metadata::new("Test Snapshot", "1.0")
}

fn truncate(path: &Path) {
	OpenOptions::new()
		.write(true)
		.truncate(true)
		.open(path)
		.unwrap();
}

#[test]
fn round_trip() {
	let path = setup("test_output/persist_round_trip");

	let value = vec!["one".to_string(), "two".to_string()];
	persist::save_json(&meta(), &value, &path).unwrap();

	let loaded: Vec<String> = persist::load_json(&meta(), &path).unwrap();
	assert_eq!(loaded, value);
}

#[test]
fn save_leaves_a_sibling_copy() {
	let path = setup("test_output/persist_sibling");

	persist::save_json(&meta(), &42u64, &path).unwrap();
	assert!(path.exists());
	assert!(persist::temp_path(&path).exists());
}

#[test]
fn truncated_primary_falls_back_to_sibling() {
	let path = setup("test_output/persist_fallback");

	persist::save_json(&meta(), &"the value".to_string(), &path).unwrap();
	truncate(&path);

	let loaded: String = persist::load_json(&meta(), &path).unwrap();
	assert_eq!(loaded, "the value");
}

#[test]
fn corrupting_both_copies_is_a_typed_error() {
	let path = setup("test_output/persist_both_corrupt");

	persist::save_json(&meta(), &"the value".to_string(), &path).unwrap();
	truncate(&path);
	truncate(&persist::temp_path(&path));

	let res: Result<String, Error> = persist::load_json(&meta(), &path);
	match res {
		Err(Error::BadFormat) => {}
		other => panic!("expected BadFormat, got {:?}", other.err()),
	}
}

#[test]
fn tampered_payload_fails_its_checksum() {
	let path = setup("test_output/persist_checksum");

	persist::save_json(&meta(), &"honest".to_string(), &path).unwrap();

	// flip the payload in both copies so no fallback saves the day
	for p in &[path.clone(), persist::temp_path(&path)] {
		let text = fs::read_to_string(p).unwrap();
		fs::write(p, text.replace("honest", "forged")).unwrap();
	}

	let res: Result<String, Error> = persist::load_json(&meta(), &path);
	match res {
		Err(Error::BadChecksum) => {}
		other => panic!("expected BadChecksum, got {:?}", other.err()),
	}
}

#[test]
fn manual_checksum_allows_operator_edits() {
	let path = setup("test_output/persist_manual");

	persist::save_json(&meta(), &"machine written".to_string(), &path).unwrap();

	// an operator rewrites the payload and marks the checksum manual
	let text = fs::read_to_string(&path).unwrap();
	let mut lines: Vec<&str> = text.splitn(4, '\n').collect();
	let edited_payload = "\"hand written\"";
	let manual_line = format!("\"{}\"", MANUAL_CHECKSUM);
	lines[2] = &manual_line;
	lines[3] = edited_payload;
	fs::write(&path, lines.join("\n")).unwrap();

	let loaded: String = persist::load_json(&meta(), &path).unwrap();
	assert_eq!(loaded, "hand written");
}

#[test]
fn wrong_metadata_fails_fast() {
	let path = setup("test_output/persist_metadata");

	persist::save_json(&meta(), &1u64, &path).unwrap();

	let res: Result<u64, Error> =
		persist::load_json(&Metadata::new("Other Snapshot", "1.0"), &path);
	match res {
		Err(Error::BadHeader) => {}
		other => panic!("expected BadHeader, got {:?}", other.err()),
	}

	let res: Result<u64, Error> = persist::load_json(&Metadata::new("Test Snapshot", "9.9"), &path);
	match res {
		Err(Error::BadVersion) => {}
		other => panic!("expected BadVersion, got {:?}", other.err()),
	}
}
