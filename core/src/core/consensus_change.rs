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

//! The delta a consensus engine delivers to its subscribers when the chain
//! tip moves. Consumers apply the reverts first, in the order given, then
//! the applied blocks; the consensus engine guarantees the result is a
//! consistent chain.

use crate::core::block::Block;
use crate::core::transaction::{
	FileContract, FileContractId, SiacoinOutput, SiacoinOutputId, SiafundOutput, SiafundOutputId,
};

/// Whether a diff is being introduced to or withdrawn from the consensus set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffDirection {
	/// The element enters the consensus set
	Apply,
	/// The element leaves the consensus set
	Revert,
}

/// A siacoin output entering or leaving the consensus set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiacoinOutputDiff {
	/// Apply or revert
	pub direction: DiffDirection,
	/// Id of the output
	pub id: SiacoinOutputId,
	/// The output itself
	pub output: SiacoinOutput,
}

/// A siafund output entering or leaving the consensus set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiafundOutputDiff {
	/// Apply or revert
	pub direction: DiffDirection,
	/// Id of the output
	pub id: SiafundOutputId,
	/// The output itself
	pub output: SiafundOutput,
}

/// A file contract entering or leaving the consensus set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileContractDiff {
	/// Apply or revert
	pub direction: DiffDirection,
	/// Id of the contract
	pub id: FileContractId,
	/// The contract itself
	pub contract: FileContract,
}

/// One tip movement: the blocks leaving the chain (tip-first, the order they
/// must be undone) and the blocks joining it (oldest-first), with the
/// output-level diffs the movement implies.
#[derive(Debug, Clone, Default)]
pub struct ConsensusChange {
	/// Blocks no longer on the chain, tip first
	pub reverted_blocks: Vec<Block>,
	/// Blocks newly on the chain, oldest first
	pub applied_blocks: Vec<Block>,
	/// Siacoin output diffs implied by the movement
	pub siacoin_output_diffs: Vec<SiacoinOutputDiff>,
	/// Siafund output diffs implied by the movement
	pub siafund_output_diffs: Vec<SiafundOutputDiff>,
	/// File contract diffs implied by the movement
	pub file_contract_diffs: Vec<FileContractDiff>,
}

impl ConsensusChange {
	/// Net change in chain height this change causes.
	pub fn height_delta(&self) -> i64 {
		self.applied_blocks.len() as i64 - self.reverted_blocks.len() as i64
	}
}
