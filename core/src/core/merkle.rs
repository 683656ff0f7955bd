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

//! Merkle tree construction over sector data and sector roots.
//!
//! Leaves and interior nodes are domain separated by a prefix byte, so a
//! leaf can never be reinterpreted as a node. Trees over a non-power-of-two
//! number of leaves split left-biased at the largest power of two strictly
//! smaller than the leaf count. A sector's root is the tree over its
//! fixed-size segments; a file's root is the tree joining the sector roots
//! as cached subtrees.

use crate::consensus::SEGMENT_SIZE;
use crate::core::hash::{Hash, HashWriter, ZERO_HASH};
use crate::ser::Writer;

/// Domain separation prefix for leaf hashes.
const LEAF_PREFIX: u8 = 0x00;
/// Domain separation prefix for interior node hashes.
const NODE_PREFIX: u8 = 0x01;

/// Hash of a single leaf.
pub fn leaf_hash(data: &[u8]) -> Hash {
	let mut hasher = HashWriter::default();
	hasher.write_u8(LEAF_PREFIX).unwrap();
	hasher.write_fixed_bytes(data).unwrap();
	hasher.into_hash()
}

/// Hash joining two subtree roots into their parent.
pub fn node_hash(left: &Hash, right: &Hash) -> Hash {
	let mut hasher = HashWriter::default();
	hasher.write_u8(NODE_PREFIX).unwrap();
	hasher.write_fixed_bytes(left).unwrap();
	hasher.write_fixed_bytes(right).unwrap();
	hasher.into_hash()
}

// Largest power of two strictly smaller than n. Callers guarantee n >= 2.
fn split_point(n: usize) -> usize {
	let mut k = 1;
	while k * 2 < n {
		k *= 2;
	}
	k
}

/// Root of the tree whose leaves are already hashed (or are roots of cached
/// subtrees, which join identically). An empty slice yields the zero hash.
pub fn root_from_hashes(hashes: &[Hash]) -> Hash {
	match hashes.len() {
		0 => ZERO_HASH,
		1 => hashes[0],
		n => {
			let split = split_point(n);
			node_hash(
				&root_from_hashes(&hashes[..split]),
				&root_from_hashes(&hashes[split..]),
			)
		}
	}
}

/// Merkle root of a sector's contents, the tree over its fixed-size
/// segments. The last segment may be short if the data isn't a segment
/// multiple, which only comes up in tests; committed sectors are always
/// full.
pub fn sector_root(data: &[u8]) -> Hash {
	let leaves: Vec<Hash> = data
		.chunks(SEGMENT_SIZE as usize)
		.map(leaf_hash)
		.collect();
	root_from_hashes(&leaves)
}

/// Merkle root over an ordered list of sector roots, each treated as the
/// root of a cached subtree. This is the file-level root a contract
/// revision commits to.
pub fn cached_root(roots: &[Hash]) -> Hash {
	root_from_hashes(roots)
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn empty_and_single() {
		assert_eq!(root_from_hashes(&[]), ZERO_HASH);
		let h = leaf_hash(b"leaf");
		assert_eq!(root_from_hashes(&[h]), h);
	}

	#[test]
	fn two_leaves_join_as_node() {
		let a = leaf_hash(b"a");
		let b = leaf_hash(b"b");
		assert_eq!(root_from_hashes(&[a, b]), node_hash(&a, &b));
	}

	#[test]
	fn left_biased_split() {
		// five leaves split 4 + 1
		let leaves: Vec<Hash> = (0u8..5).map(|i| leaf_hash(&[i])).collect();
		let left = root_from_hashes(&leaves[..4]);
		let right = leaves[4];
		assert_eq!(root_from_hashes(&leaves), node_hash(&left, &right));
	}

	#[test]
	fn leaves_and_nodes_are_domain_separated() {
		let a = leaf_hash(b"a");
		let b = leaf_hash(b"b");
		let mut concat = vec![];
		concat.extend_from_slice(a.as_bytes());
		concat.extend_from_slice(b.as_bytes());
		assert_ne!(node_hash(&a, &b), leaf_hash(&concat));
	}

	#[test]
	fn sector_root_segments() {
		// two full segments hash as two leaves
		let data = vec![0xABu8; 2 * SEGMENT_SIZE as usize];
		let l = leaf_hash(&data[..SEGMENT_SIZE as usize]);
		let r = leaf_hash(&data[SEGMENT_SIZE as usize..]);
		assert_eq!(sector_root(&data), node_hash(&l, &r));
	}

	#[test]
	fn cached_root_matches_plain_join() {
		let roots: Vec<Hash> = (0u8..3).map(|i| leaf_hash(&[i])).collect();
		assert_eq!(cached_root(&roots), root_from_hashes(&roots));
	}
}
