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

//! The host: tracks storage obligations against file contracts, stores the
//! sectors backing them, and negotiates contract revisions with renters
//! over the framed revision protocol.

#![deny(non_upper_case_globals)]
#![deny(non_camel_case_types)]
#![deny(non_snake_case)]
#![deny(unused_mut)]
#![warn(missing_docs)]

extern crate failure;
#[macro_use]
extern crate failure_derive;
#[macro_use]
extern crate log;
#[macro_use]
extern crate serde_derive;

use sia_core as core;
use sia_net as net;
use sia_util as util;

pub mod error;
pub mod negotiate;
pub mod obligation;
pub mod types;
pub mod verify;

pub use crate::error::{Error, ErrorKind};
pub use crate::negotiate::{manage_revision_loop, RevisionAction, RevisionActions};
pub use crate::obligation::{ObligationLock, ObligationStore, StorageObligation};
pub use crate::types::{FinancialMetrics, HostPersist, HostSettings, TransactionSigner};
pub use crate::verify::verify_revision;

use std::path::PathBuf;

use crate::core::core::ConsensusChange;
use crate::core::global;
use crate::net::Conn;
use crate::util::persist::{self, Metadata};
use crate::util::RwLock;

/// Header line of the host's JSON snapshot.
pub const HOST_PERSIST_HEADER: &str = "Sia Host";
/// Version line of the host's JSON snapshot.
pub const HOST_PERSIST_VERSION: &str = "1.0";

const PERSIST_FILENAME: &str = "host.json";

/// The host subsystem: obligation registry, advertised settings and the
/// revision protocol entry point.
pub struct Host {
	obligations: ObligationStore,
	settings: RwLock<HostSettings>,
	signer: Box<dyn TransactionSigner>,
	persist_path: PathBuf,
}

impl Host {
	/// Opens the host under the given directory, restoring settings from
	/// its JSON snapshot when one exists.
	pub fn open(dir: &str, signer: Box<dyn TransactionSigner>) -> Result<Host, Error> {
		let obligations = ObligationStore::new(dir)?;
		let persist_path = PathBuf::from(dir).join(PERSIST_FILENAME);

		let meta = Metadata::new(HOST_PERSIST_HEADER, HOST_PERSIST_VERSION);
		let mut settings = match persist::load_json::<HostPersist>(&meta, &persist_path) {
			Ok(saved) => saved.settings,
			Err(persist::Error::Io(ref e)) if e.kind() == std::io::ErrorKind::NotFound => {
				debug!("no host snapshot at {:?}, starting fresh", persist_path);
				HostSettings::default()
			}
			Err(e) => {
				return Err(ErrorKind::Internal(format!(
					"could not load host snapshot: {}",
					e
				))
				.into());
			}
		};
		// the profile owns the sector size; the snapshot only echoes it
		settings.sector_size = global::sector_size();

		Ok(Host {
			obligations,
			settings: RwLock::new(settings),
			signer,
			persist_path,
		})
	}

	/// The registry of active obligations.
	pub fn obligations(&self) -> &ObligationStore {
		&self.obligations
	}

	/// The currently advertised settings.
	pub fn settings(&self) -> HostSettings {
		self.settings.read().clone()
	}

	/// Replaces the advertised settings and snapshots them. The sector size
	/// always comes from the active profile, whatever the caller put there.
	pub fn update_settings(&self, mut settings: HostSettings) -> Result<(), Error> {
		settings.sector_size = global::sector_size();
		*self.settings.write() = settings;
		self.save()
	}

	/// Writes the host's JSON snapshot: settings plus financial metrics
	/// aggregated over all active obligations.
	pub fn save(&self) -> Result<(), Error> {
		let mut metrics = FinancialMetrics::default();
		for so in self.obligations.all()? {
			metrics.potential_storage_revenue += so.potential_storage_revenue;
			metrics.potential_upload_revenue += so.potential_upload_revenue;
			metrics.potential_download_revenue += so.potential_download_revenue;
			metrics.risked_collateral += so.risked_collateral;
		}
		let state = HostPersist {
			settings: self.settings(),
			financial_metrics: metrics,
		};
		let meta = Metadata::new(HOST_PERSIST_HEADER, HOST_PERSIST_VERSION);
		persist::save_json(&meta, &state, &self.persist_path)
			.map_err(|e| ErrorKind::Internal(format!("could not save host snapshot: {}", e)))?;
		Ok(())
	}

	/// Serves one inbound revision session on the given connection.
	pub fn handle_revision_rpc<S: Conn>(&self, conn: &mut S) -> Result<(), Error> {
		let settings = self.settings();
		manage_revision_loop(&self.obligations, &settings, self.signer.as_ref(), conn)
	}

	/// Digests a consensus change into the obligation registry.
	pub fn process_consensus_change(&self, cc: &ConsensusChange) -> Result<(), Error> {
		self.obligations.process_consensus_change(cc)
	}
}
