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

//! Error types for the host.
//!
//! Validation kinds are written to the renter verbatim so it can classify
//! the failure; everything else is collapsed to a single generic string on
//! the wire and only logged in full locally.

use failure::{Backtrace, Context, Fail};
use std::fmt::{self, Display};

use crate::core::ser;
use crate::net;
use sia_store as store;

/// Error definition
#[derive(Debug)]
pub struct Error {
	inner: Context<ErrorKind>,
}

/// Host error definitions
#[derive(Clone, Eq, PartialEq, Debug, Fail)]
pub enum ErrorKind {
	/// A modification action indexes past the end of the sector vector
	#[fail(display = "invalid sector index for modification")]
	BadModificationIndex,
	/// Inserted sector data isn't exactly one sector
	#[fail(display = "invalid sector size")]
	BadSectorSize,
	/// A modify action's offset and length reach outside the sector
	#[fail(display = "illegal offset and length")]
	IllegalOffsetAndLength,
	/// A modify action's data alone exceeds the sector size
	#[fail(display = "modification data exceeds sector size")]
	LargeSector,
	/// A download range reaches outside the sector
	#[fail(display = "download request out of bounds")]
	RequestOutOfBounds,
	/// Cumulative download length exceeds the advertised batch limit
	#[fail(display = "download batch too large")]
	LargeDownloadBatch,
	/// An action tag no known action claims
	#[fail(display = "unknown modification type")]
	UnknownModification,
	/// A revision without the fixed two valid / three missed outputs
	#[fail(display = "wrong number of proof outputs")]
	BadOutputCounts,
	/// A revision arriving too close to the proof window to get confirmed
	#[fail(display = "revision submitted too close to the proof window")]
	LateRevision,
	/// A revision naming a different contract
	#[fail(display = "revision has a bad parent id")]
	BadParent,
	/// A revision whose unlock conditions don't hash to the contract's
	/// unlock hash
	#[fail(display = "revision has bad unlock conditions")]
	BadUnlockConditions,
	/// A revision changing the unlock hash
	#[fail(display = "revision has a bad unlock hash")]
	BadUnlockHash,
	/// A revision moving the proof window
	#[fail(display = "revision changes the proof window")]
	BadWindow,
	/// A revision whose file size disagrees with the sector vector
	#[fail(display = "revision has a bad file size")]
	BadFileSize,
	/// A revision number not strictly greater than the last
	#[fail(display = "revision number is not strictly greater")]
	BadRevisionNumber,
	/// The renter's valid output pays the host less than the exchange
	#[fail(display = "renter valid proof output is too high")]
	HighRenterValidOutput,
	/// The host's valid output doesn't gain exactly the renter's decrease
	#[fail(display = "host valid proof output is too low")]
	LowHostValidOutput,
	/// The renter's missed output exceeds its valid output
	#[fail(display = "renter missed proof output is too high")]
	HighRenterMissedOutput,
	/// The host's missed output drops by more than the agreed collateral
	#[fail(display = "host missed proof output risks too much collateral")]
	LargeHostCollateral,
	/// A revision whose merkle root doesn't match the sector vector
	#[fail(display = "revision has a bad file merkle root")]
	BadFileMerkleRoot,
	/// Another session holds the obligation's lock
	#[fail(display = "storage obligation is locked by another session")]
	ObligationLocked,
	/// No obligation for the given contract id
	#[fail(display = "storage obligation not found")]
	ObligationNotFound,
	/// A referenced sector isn't in the sector bucket
	#[fail(display = "sector not found")]
	SectorNotFound,
	/// The renter rejected one of our objects
	#[fail(display = "renter rejected: {}", _0)]
	Rejected(String),
	/// The renter chose to end the revision loop; not a failure
	#[fail(display = "the renter ended the loop")]
	StopResponse,
	/// Internal issue when trying to save or load data from store
	#[fail(display = "Store Error: {}", _1)]
	StoreErr(store::Error, String),
	/// Error serializing or deserializing a type
	#[fail(display = "Serialization Error")]
	SerErr(ser::Error),
	/// Transport level failure, deadline expiry included
	#[fail(display = "Connection Error: {}", _0)]
	ConnectionErr(String),
	/// Anything else that must not leak detail to the renter
	#[fail(display = "Internal Error: {}", _0)]
	Internal(String),
}

// What the renter is told when an iteration fails for reasons that are none
// of its business.
const GENERIC_REJECTION: &str = "internal host error";

impl ErrorKind {
	/// Whether this kind is a protocol validation failure the renter caused
	/// and may learn the details of.
	pub fn is_validation(&self) -> bool {
		match self {
			ErrorKind::BadModificationIndex
			| ErrorKind::BadSectorSize
			| ErrorKind::IllegalOffsetAndLength
			| ErrorKind::LargeSector
			| ErrorKind::RequestOutOfBounds
			| ErrorKind::LargeDownloadBatch
			| ErrorKind::UnknownModification
			| ErrorKind::BadOutputCounts
			| ErrorKind::LateRevision
			| ErrorKind::BadParent
			| ErrorKind::BadUnlockConditions
			| ErrorKind::BadUnlockHash
			| ErrorKind::BadWindow
			| ErrorKind::BadFileSize
			| ErrorKind::BadRevisionNumber
			| ErrorKind::HighRenterValidOutput
			| ErrorKind::LowHostValidOutput
			| ErrorKind::HighRenterMissedOutput
			| ErrorKind::LargeHostCollateral
			| ErrorKind::BadFileMerkleRoot => true,
			_ => false,
		}
	}

	/// The string written to the renter as a rejection for this kind.
	/// Validation kinds are spelled out, everything else is generic.
	pub fn rejection_string(&self) -> String {
		if self.is_validation() {
			format!("{}", self)
		} else {
			GENERIC_REJECTION.to_owned()
		}
	}
}

impl Display for Error {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		Display::fmt(&self.inner, f)
	}
}

impl Error {
	/// get kind
	pub fn kind(&self) -> ErrorKind {
		self.inner.get_context().clone()
	}
	/// get cause
	pub fn cause(&self) -> Option<&dyn Fail> {
		self.inner.cause()
	}
	/// get backtrace
	pub fn backtrace(&self) -> Option<&Backtrace> {
		self.inner.backtrace()
	}
}

impl From<ErrorKind> for Error {
	fn from(kind: ErrorKind) -> Error {
		Error {
			inner: Context::new(kind),
		}
	}
}

impl From<Context<ErrorKind>> for Error {
	fn from(inner: Context<ErrorKind>) -> Error {
		Error { inner }
	}
}

impl From<store::Error> for Error {
	fn from(error: store::Error) -> Error {
		let kind = match &error {
			store::Error::NotFoundErr(_) => ErrorKind::ObligationNotFound,
			_ => ErrorKind::StoreErr(error.clone(), format!("{}", error)),
		};
		Error {
			inner: Context::new(kind),
		}
	}
}

impl From<ser::Error> for Error {
	fn from(error: ser::Error) -> Error {
		Error {
			inner: Context::new(ErrorKind::SerErr(error)),
		}
	}
}

impl From<net::Error> for Error {
	fn from(error: net::Error) -> Error {
		let kind = match error {
			net::Error::StopResponse => ErrorKind::StopResponse,
			net::Error::Rejected(reason) => ErrorKind::Rejected(reason),
			// an unknown tag inside a frame is the renter sending an action
			// we don't recognize, which has its own typed rejection
			net::Error::Serialization(ser::Error::UnknownVariant(_)) => {
				ErrorKind::UnknownModification
			}
			net::Error::Serialization(e) => ErrorKind::SerErr(e),
			other => ErrorKind::ConnectionErr(format!("{}", other)),
		};
		Error {
			inner: Context::new(kind),
		}
	}
}
