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

//! Bucket layout of the explorer's index.

/// Block id to block record.
pub const BLOCKS_BUCKET: &str = "blocks";
/// Big-endian height to block id; contiguous from zero to the tip.
pub const BLOCK_PATH_BUCKET: &str = "blockpath";
/// Transaction id to its position on the chain.
pub const TRANSACTIONS_BUCKET: &str = "transactions";
/// Any 32-byte hash to what kind of object it names.
pub const HASHES_BUCKET: &str = "hashes";
/// Unlock hash to the transactions that referenced it.
pub const ADDRESSES_BUCKET: &str = "addresses";
/// File contract id to its on-chain history.
pub const FILE_CONTRACTS_BUCKET: &str = "filecontracts";
/// Siacoin output id to its creation and consumption.
pub const SIACOIN_OUTPUTS_BUCKET: &str = "siacoinoutputs";
/// Siafund output id to its creation and consumption.
pub const SIAFUND_OUTPUTS_BUCKET: &str = "siafundoutputs";
/// Big-endian height to the per-height summary.
pub const HEIGHTS_BUCKET: &str = "heights";
/// How much of the chain the index has digested.
pub const SYNC_BUCKET: &str = "sync";

/// Identifies the explorer's store on disk.
pub const EXPLORER_DB_HEADER: &str = "Sia Explorer DB";
/// Version of the explorer's index layout.
pub const EXPLORER_DB_VERSION: &str = "1.0";

/// Every bucket the index uses, for opening the store.
pub const ALL_BUCKETS: [&str; 10] = [
	BLOCKS_BUCKET,
	BLOCK_PATH_BUCKET,
	TRANSACTIONS_BUCKET,
	HASHES_BUCKET,
	ADDRESSES_BUCKET,
	FILE_CONTRACTS_BUCKET,
	SIACOIN_OUTPUTS_BUCKET,
	SIAFUND_OUTPUTS_BUCKET,
	HEIGHTS_BUCKET,
	SYNC_BUCKET,
];

/// Key of the chain length record in the sync bucket.
pub const CHAIN_LENGTH_KEY: &[u8] = b"chainlength";
