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

//! Checksummed, versioned JSON snapshots with a durable sibling copy.
//!
//! On disk a snapshot is four parts, newline separated: a JSON-encoded header
//! string, a JSON-encoded version string, a JSON-encoded 64-character hex
//! SHA-256 of the payload (or the sentinel `"manual"` to allow operator
//! edits), then the indented JSON payload itself. Saving writes the sibling
//! `<path>_temp` first and syncs it before touching the primary, so one of
//! the two files survives a crash at any point; loading falls back to the
//! sibling when the primary fails its checksum.

use std::collections::HashSet;
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::hex::to_hex;
use crate::Mutex;

/// Suffix of the sibling copy kept next to every snapshot.
pub const TEMP_SUFFIX: &str = "_temp";

/// Checksum sentinel accepted in place of a real hash, so operators can edit
/// a snapshot by hand.
pub const MANUAL_CHECKSUM: &str = "manual";

lazy_static! {
	// Paths with a save in flight. Two concurrent saves to one path would
	// interleave the primary and sibling writes.
	static ref ACTIVE_FILES: Mutex<HashSet<PathBuf>> = Mutex::new(HashSet::new());
}

/// Identifies the type and version of a persisted file. Readers fail fast
/// when the stored metadata doesn't match theirs.
#[derive(Debug, Clone, PartialEq)]
pub struct Metadata {
	/// Name of the persisted structure
	pub header: String,
	/// Version of the persisted structure
	pub version: String,
}

impl Metadata {
	/// Convenience constructor
	pub fn new(header: &str, version: &str) -> Metadata {
		Metadata {
			header: header.to_owned(),
			version: version.to_owned(),
		}
	}
}

/// Errors that saving or loading a snapshot can produce.
#[derive(Debug)]
pub enum Error {
	/// The stored header string doesn't match the caller's
	BadHeader,
	/// The stored version string doesn't match the caller's
	BadVersion,
	/// The payload doesn't hash to the stored checksum
	BadChecksum,
	/// The file is missing one of its metadata lines
	BadFormat,
	/// Another save to the same path is in flight
	FileInUse(PathBuf),
	/// Wraps an io error from reading or writing the snapshot
	Io(io::Error),
	/// Wraps a JSON encoding or decoding error
	Json(serde_json::Error),
}

impl fmt::Display for Error {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Error::BadHeader => write!(f, "wrong header"),
			Error::BadVersion => write!(f, "wrong version"),
			Error::BadChecksum => write!(f, "checksum mismatch"),
			Error::BadFormat => write!(f, "malformed persist file"),
			Error::FileInUse(p) => write!(f, "file already in use: {}", p.display()),
			Error::Io(e) => write!(f, "io error: {}", e),
			Error::Json(e) => write!(f, "json error: {}", e),
		}
	}
}

impl std::error::Error for Error {}

impl From<io::Error> for Error {
	fn from(e: io::Error) -> Error {
		Error::Io(e)
	}
}

impl From<serde_json::Error> for Error {
	fn from(e: serde_json::Error) -> Error {
		Error::Json(e)
	}
}

// Removes the path from the active set when a save finishes, error paths
// included.
struct ActiveFileGuard {
	path: PathBuf,
}

impl Drop for ActiveFileGuard {
	fn drop(&mut self) {
		ACTIVE_FILES.lock().remove(&self.path);
	}
}

fn register_active(path: &Path) -> Result<ActiveFileGuard, Error> {
	let mut active = ACTIVE_FILES.lock();
	if !active.insert(path.to_path_buf()) {
		return Err(Error::FileInUse(path.to_path_buf()));
	}
	Ok(ActiveFileGuard {
		path: path.to_path_buf(),
	})
}

/// Path of the sibling copy for the given snapshot path.
pub fn temp_path(path: &Path) -> PathBuf {
	let mut name = path.as_os_str().to_owned();
	name.push(TEMP_SUFFIX);
	PathBuf::from(name)
}

fn encode<T: Serialize>(meta: &Metadata, object: &T) -> Result<Vec<u8>, Error> {
	let payload = serde_json::to_vec_pretty(object)?;

	let mut hasher = Sha256::new();
	hasher.update(&payload);
	let checksum = to_hex(hasher.finalize().to_vec());

	let mut data = Vec::with_capacity(payload.len() + 128);
	serde_json::to_writer(&mut data, &meta.header)?;
	data.push(b'\n');
	serde_json::to_writer(&mut data, &meta.version)?;
	data.push(b'\n');
	serde_json::to_writer(&mut data, &checksum)?;
	data.push(b'\n');
	data.extend_from_slice(&payload);
	Ok(data)
}

fn write_file(path: &Path, data: &[u8]) -> Result<(), Error> {
	let mut file = OpenOptions::new()
		.write(true)
		.create(true)
		.truncate(true)
		.open(path)?;
	file.write_all(data)?;
	file.sync_all()?;
	Ok(())
}

fn sync_dir(path: &Path) -> Result<(), Error> {
	if let Some(parent) = path.parent() {
		if !parent.as_os_str().is_empty() {
			File::open(parent)?.sync_all()?;
		}
	}
	Ok(())
}

/// Saves the object as a checksummed JSON snapshot at the given path. The
/// sibling `<path>_temp` is written and synced first, then the primary, so a
/// crash mid-save always leaves one intact copy.
pub fn save_json<T: Serialize>(meta: &Metadata, object: &T, path: &Path) -> Result<(), Error> {
	let _guard = register_active(path)?;

	let data = encode(meta, object)?;
	write_file(&temp_path(path), &data)?;
	write_file(path, &data)?;
	sync_dir(path)?;
	Ok(())
}

fn decode<T: DeserializeOwned>(meta: &Metadata, data: &[u8]) -> Result<T, Error> {
	let text = std::str::from_utf8(data).map_err(|_| Error::BadFormat)?;
	let mut lines = text.splitn(4, '\n');

	let header: String =
		serde_json::from_str(lines.next().ok_or(Error::BadFormat)?).map_err(|_| Error::BadFormat)?;
	let version: String =
		serde_json::from_str(lines.next().ok_or(Error::BadFormat)?).map_err(|_| Error::BadFormat)?;
	let checksum: String =
		serde_json::from_str(lines.next().ok_or(Error::BadFormat)?).map_err(|_| Error::BadFormat)?;
	let payload = lines.next().ok_or(Error::BadFormat)?;

	if header != meta.header {
		return Err(Error::BadHeader);
	}
	if version != meta.version {
		return Err(Error::BadVersion);
	}

	if checksum != MANUAL_CHECKSUM {
		let mut hasher = Sha256::new();
		hasher.update(payload.as_bytes());
		if checksum != to_hex(hasher.finalize().to_vec()) {
			return Err(Error::BadChecksum);
		}
	}

	Ok(serde_json::from_str(payload)?)
}

fn read_file(path: &Path) -> Result<Vec<u8>, Error> {
	let mut data = vec![];
	File::open(path)?.read_to_end(&mut data)?;
	Ok(data)
}

/// Loads a snapshot saved with `save_json`, verifying metadata and checksum.
/// Header and version mismatches fail immediately; a corrupt or unreadable
/// primary falls back to the sibling `<path>_temp`.
pub fn load_json<T: DeserializeOwned>(meta: &Metadata, path: &Path) -> Result<T, Error> {
	let primary = read_file(path).and_then(|data| decode(meta, &data));
	match primary {
		Ok(object) => Ok(object),
		Err(e @ Error::BadHeader) | Err(e @ Error::BadVersion) => Err(e),
		Err(e) => {
			warn!(
				"persist file {} unreadable ({}), trying {} sibling",
				path.display(),
				e,
				TEMP_SUFFIX
			);
			read_file(&temp_path(path)).and_then(|data| decode(meta, &data))
		}
	}
}

/// Removes a snapshot and its sibling copy.
pub fn remove(path: &Path) -> Result<(), Error> {
	let _ = fs::remove_file(temp_path(path));
	fs::remove_file(path)?;
	Ok(())
}
