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

//! Settings, timing constants and the external seams of the host.

use std::time::Duration;

use crate::core::core::{Currency, Transaction, TransactionSignature};
use crate::core::global;
use crate::core::ser::{self, Readable, Reader, Writeable, Writer};
use crate::error::Error;

/// Bound on a whole revision session. When it expires the host ends the
/// loop on its next turn rather than cutting the connection.
pub const ITERATED_CONNECTION_TIME: Duration = Duration::from_secs(1200);

/// Bound on a single revision iteration; reset when the host sends its
/// settings.
pub const REVISION_ITERATION_TIME: Duration = Duration::from_secs(120);

/// Cap on the frame carrying the contract id that opens a session.
pub const MAX_CONTRACT_ID_LEN: u64 = 64;

/// Cap on a settings frame.
pub const MAX_SETTINGS_LEN: u64 = 16 * 1024;

/// Cap on a revision frame.
pub const MAX_REVISION_LEN: u64 = 16 * 1024;

/// Cap on a transaction signature frame.
pub const MAX_SIGNATURE_LEN: u64 = 2 * 1024;

/// Cap on an action list frame. Inserted sector data travels inside it, so
/// the cap scales with the profile's sector size.
pub fn max_actions_len() -> u64 {
	8 * global::sector_size() + (1 << 20)
}

/// The host's advertised terms, sent to the renter at the top of every
/// revision iteration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostSettings {
	/// Whether new obligations are welcome
	pub accepting_contracts: bool,
	/// Cumulative download bytes allowed in one iteration
	pub max_download_batch_size: u64,
	/// Sector size in force, owned by the active profile and echoed here so
	/// renters can size their actions
	pub sector_size: u64,
	/// Collateral locked per byte per block of remaining duration
	pub collateral: Currency,
	/// Price per byte per block of remaining duration
	pub storage_price: Currency,
	/// Price per uploaded byte
	pub upload_bandwidth_price: Currency,
	/// Price per downloaded byte
	pub download_bandwidth_price: Currency,
}

impl Default for HostSettings {
	fn default() -> HostSettings {
		let sector_size = global::sector_size();
		HostSettings {
			accepting_contracts: true,
			max_download_batch_size: 4 * sector_size,
			sector_size,
			collateral: Currency::zero(),
			storage_price: Currency::zero(),
			upload_bandwidth_price: Currency::zero(),
			download_bandwidth_price: Currency::zero(),
		}
	}
}

impl Writeable for HostSettings {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
		writer.write_u8(self.accepting_contracts as u8)?;
		writer.write_u64(self.max_download_batch_size)?;
		writer.write_u64(self.sector_size)?;
		self.collateral.write(writer)?;
		self.storage_price.write(writer)?;
		self.upload_bandwidth_price.write(writer)?;
		self.download_bandwidth_price.write(writer)
	}
}

impl Readable for HostSettings {
	fn read(reader: &mut dyn Reader) -> Result<HostSettings, ser::Error> {
		Ok(HostSettings {
			accepting_contracts: reader.read_u8()? != 0,
			max_download_batch_size: reader.read_u64()?,
			sector_size: reader.read_u64()?,
			collateral: Currency::read(reader)?,
			storage_price: Currency::read(reader)?,
			upload_bandwidth_price: Currency::read(reader)?,
			download_bandwidth_price: Currency::read(reader)?,
		})
	}
}

/// Aggregated earnings and exposure across all obligations, kept in the
/// host's JSON snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FinancialMetrics {
	/// Revenue from storing data, earned at the proof window
	pub potential_storage_revenue: Currency,
	/// Revenue from accepting uploads
	pub potential_upload_revenue: Currency,
	/// Revenue from serving downloads
	pub potential_download_revenue: Currency,
	/// Collateral lost if proofs are missed
	pub risked_collateral: Currency,
}

/// Everything the host keeps in its JSON snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HostPersist {
	/// Advertised terms
	pub settings: HostSettings,
	/// Aggregated earnings and exposure
	pub financial_metrics: FinancialMetrics,
}

/// The wallet's narrow interface: something able to sign a revision
/// transaction on the host's behalf.
pub trait TransactionSigner: Send + Sync {
	/// Produces the host's signature over the given revision transaction.
	fn sign_revision(&self, tx: &Transaction) -> Result<TransactionSignature, Error>;
}
