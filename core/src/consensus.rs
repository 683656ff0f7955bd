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

//! All the constants the protocol itself fixes. Per-profile values
//! (anything that differs between production and the testing profiles) live
//! behind accessors in `global` instead.

use crate::core::hash::Hash;

/// Size in bytes of a merkle leaf at the sector level. A sector's root is
/// the merkle root over its segments.
pub const SEGMENT_SIZE: u64 = 64;

/// Production sector size, 4 MiB.
pub const MAINNET_SECTOR_SIZE: u64 = 1 << 22;

/// User testing sector size, 64 KiB, keeps manual runs fast while still
/// exercising multi-segment trees.
pub const USER_TESTING_SECTOR_SIZE: u64 = 1 << 16;

/// Automated testing sector size, 4 KiB.
pub const AUTOMATED_TESTING_SECTOR_SIZE: u64 = 1 << 12;

/// Production count of blocks before a contract's proof window inside which
/// the host refuses further revisions, leaving room to get the final
/// revision confirmed.
pub const MAINNET_REVISION_SUBMISSION_BUFFER: u64 = 144;

/// User testing revision submission buffer.
pub const USER_TESTING_REVISION_SUBMISSION_BUFFER: u64 = 10;

/// Automated testing revision submission buffer.
pub const AUTOMATED_TESTING_REVISION_SUBMISSION_BUFFER: u64 = 2;

/// The easiest representable difficulty target. The genesis block has no
/// parent to inherit a target from, so indexers record this root value for
/// it.
pub const ROOT_TARGET: Hash = Hash([0xff; 32]);
