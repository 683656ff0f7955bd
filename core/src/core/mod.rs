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

//! Core types

pub mod block;
pub mod consensus_change;
pub mod currency;
pub mod hash;
pub mod merkle;
pub mod transaction;

pub use self::block::{Block, BlockHeader, BlockId};
pub use self::consensus_change::{
	ConsensusChange, DiffDirection, FileContractDiff, SiacoinOutputDiff, SiafundOutputDiff,
};
pub use self::currency::Currency;
pub use self::hash::{Hash, Hashed, ZERO_HASH};
pub use self::transaction::{
	proof_output_id, CoveredFields, FileContract, FileContractId, FileContractRevision,
	SiacoinInput, SiacoinOutput, SiacoinOutputId, SiafundInput, SiafundOutput, SiafundOutputId,
	StorageProof, Transaction, TransactionId, TransactionSignature, UnlockConditions, UnlockHash,
	HOST_PAYOUT_INDEX, MISSED_PROOF_OUTPUT_COUNT, RENTER_PAYOUT_INDEX, VALID_PROOF_OUTPUT_COUNT,
	VOID_PAYOUT_INDEX,
};
