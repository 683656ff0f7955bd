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

//! Values that should be shared across all modules, without necessarily
//! having to pass them all over the place, but aren't consensus values.
//! should be used sparingly.

use crate::consensus::{
	AUTOMATED_TESTING_REVISION_SUBMISSION_BUFFER, AUTOMATED_TESTING_SECTOR_SIZE,
	MAINNET_REVISION_SUBMISSION_BUFFER, MAINNET_SECTOR_SIZE,
	USER_TESTING_REVISION_SUBMISSION_BUFFER, USER_TESTING_SECTOR_SIZE,
};
use sia_util::RwLock;

/// Parameter profiles. Selects the full set of sizes and timings the rest
/// of the workspace runs with; set once at startup (or per test) before
/// anything reads it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChainTypes {
	/// For CI testing
	AutomatedTesting,
	/// For User testing
	UserTesting,
	/// Production, use the values in consensus.rs
	Mainnet,
}

impl Default for ChainTypes {
	fn default() -> ChainTypes {
		ChainTypes::Mainnet
	}
}

lazy_static! {
	/// The active parameter profile
	pub static ref CHAIN_TYPE: RwLock<ChainTypes> = RwLock::new(ChainTypes::Mainnet);
}

/// Set the profile
pub fn set_chain_type(new_type: ChainTypes) {
	let mut param_ref = CHAIN_TYPE.write();
	*param_ref = new_type;
}

/// The active profile
pub fn chain_type() -> ChainTypes {
	*CHAIN_TYPE.read()
}

/// Size in bytes of a sector under the active profile
pub fn sector_size() -> u64 {
	match chain_type() {
		ChainTypes::AutomatedTesting => AUTOMATED_TESTING_SECTOR_SIZE,
		ChainTypes::UserTesting => USER_TESTING_SECTOR_SIZE,
		ChainTypes::Mainnet => MAINNET_SECTOR_SIZE,
	}
}

/// Blocks before a proof window inside which revisions are refused, under
/// the active profile
pub fn revision_submission_buffer() -> u64 {
	match chain_type() {
		ChainTypes::AutomatedTesting => AUTOMATED_TESTING_REVISION_SUBMISSION_BUFFER,
		ChainTypes::UserTesting => USER_TESTING_REVISION_SUBMISSION_BUFFER,
		ChainTypes::Mainnet => MAINNET_REVISION_SUBMISSION_BUFFER,
	}
}

/// Are we in production mode?
pub fn is_production_mode() -> bool {
	ChainTypes::Mainnet == chain_type()
}

/// Are we in automated testing mode?
pub fn is_automated_testing_mode() -> bool {
	ChainTypes::AutomatedTesting == chain_type()
}
