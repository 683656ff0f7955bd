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

//! Storage of core types using LMDB.
//!
//! One environment per subsystem, holding a set of named buckets. All
//! writes go through a `Batch` wrapping a single LMDB write transaction, so
//! mutations spanning several buckets land atomically or not at all. A
//! `metadata` bucket records a header and version string; opening a store
//! verifies them against the caller's expectations and fails with distinct
//! errors on mismatch.

use std::collections::HashMap;
use std::fs;
use std::marker;
use std::sync::Arc;

use lmdb_zero as lmdb;
use lmdb_zero::traits::CreateCursor;
use lmdb_zero::LmdbResultExt;

use crate::core::ser;

/// Internal bucket holding the header and version records.
pub const METADATA_BUCKET: &str = "metadata";

const HEADER_KEY: &[u8] = b"header";
const VERSION_KEY: &[u8] = b"version";

// Plenty of room for every bucket a subsystem declares plus metadata.
const MAX_BUCKETS: u32 = 32;

/// Main error type for this lmdb
#[derive(Clone, Eq, PartialEq, Debug, Fail)]
pub enum Error {
	/// Couldn't find what we were looking for
	#[fail(display = "DB Not Found Error: {}", _0)]
	NotFoundErr(String),
	/// The store was created by something else entirely
	#[fail(display = "Bad Header: expected {}, found {}", expected, found)]
	BadHeader {
		/// What the caller wanted
		expected: String,
		/// What the file holds
		found: String,
	},
	/// The store's contents predate (or postdate) this code
	#[fail(display = "Bad Version: expected {}, found {}", expected, found)]
	BadVersion {
		/// What the caller wanted
		expected: String,
		/// What the file holds
		found: String,
	},
	/// A bucket name that was never declared at open
	#[fail(display = "Unknown Bucket: {}", _0)]
	UnknownBucket(String),
	/// Couldn't create or open the store's files
	#[fail(display = "File Error: {}", _0)]
	FileErr(String),
	/// Wraps an error originating from LMDB
	#[fail(display = "LMDB error: {}", _0)]
	LmdbErr(lmdb::error::Error),
	/// Wraps a serialization error for Writeable or Readable
	#[fail(display = "Serialization Error: {}", _0)]
	SerErr(String),
}

impl From<lmdb::error::Error> for Error {
	fn from(e: lmdb::error::Error) -> Error {
		Error::LmdbErr(e)
	}
}

/// unwraps the inner option by converting the none case to a not found error
pub fn option_to_not_found<T>(res: Result<Option<T>, Error>, field_name: &str) -> Result<T, Error> {
	match res {
		Ok(None) => Err(Error::NotFoundErr(field_name.to_owned())),
		Ok(Some(o)) => Ok(o),
		Err(e) => Err(e),
	}
}

// Half a TB of map should give us plenty of room, will be an issue on 32
// bits (which we don't support anyway).
const MAP_SIZE: usize = 549_755_813_888;

fn new_env(path: &str) -> Result<lmdb::Environment, Error> {
	let full_path = [path, "lmdb"].join("/");
	fs::create_dir_all(&full_path).map_err(|e| Error::FileErr(e.to_string()))?;
	let env = unsafe {
		let mut env_builder = lmdb::EnvBuilder::new()?;
		env_builder.set_maxdbs(MAX_BUCKETS)?;
		env_builder.set_mapsize(MAP_SIZE)?;
		env_builder.open(&full_path, lmdb::open::Flags::empty(), 0o600)?
	};
	Ok(env)
}

/// LMDB-backed store facilitating data access and serialization. All writes
/// are done through a Batch abstraction providing atomicity.
pub struct Store {
	env: Arc<lmdb::Environment>,
	buckets: HashMap<String, Arc<lmdb::Database<'static>>>,
}

impl Store {
	/// Opens (creating if necessary) a store under the given directory with
	/// the given named buckets, verifying the stored header and version
	/// against the expected values. A store with no metadata yet (fresh
	/// create) has the expected values written.
	pub fn new(path: &str, bucket_names: &[&str], header: &str, version: &str) -> Result<Store, Error> {
		let env = Arc::new(new_env(path)?);

		let mut buckets = HashMap::new();
		for name in bucket_names.iter().map(|n| *n).chain(Some(METADATA_BUCKET)) {
			let db = Arc::new(lmdb::Database::open(
				env.clone(),
				Some(name),
				&lmdb::DatabaseOptions::new(lmdb::db::CREATE),
			)?);
			buckets.insert(name.to_owned(), db);
		}

		let store = Store { env, buckets };
		store.check_metadata(header, version)?;
		Ok(store)
	}

	// Verifies the metadata bucket against expectations, writing the
	// expected values when none are present yet.
	fn check_metadata(&self, header: &str, version: &str) -> Result<(), Error> {
		let stored_header = self.get(METADATA_BUCKET, HEADER_KEY)?;
		let stored_version = self.get(METADATA_BUCKET, VERSION_KEY)?;

		match (stored_header, stored_version) {
			(Some(h), Some(v)) => {
				if h != header.as_bytes() {
					return Err(Error::BadHeader {
						expected: header.to_owned(),
						found: String::from_utf8_lossy(&h).into_owned(),
					});
				}
				if v != version.as_bytes() {
					return Err(Error::BadVersion {
						expected: version.to_owned(),
						found: String::from_utf8_lossy(&v).into_owned(),
					});
				}
				Ok(())
			}
			_ => {
				debug!("store has no metadata yet, writing {}/{}", header, version);
				let batch = self.batch()?;
				batch.put(METADATA_BUCKET, HEADER_KEY, header.as_bytes().to_vec())?;
				batch.put(METADATA_BUCKET, VERSION_KEY, version.as_bytes().to_vec())?;
				batch.commit()
			}
		}
	}

	fn bucket(&self, name: &str) -> Result<&Arc<lmdb::Database<'static>>, Error> {
		self.buckets
			.get(name)
			.ok_or_else(|| Error::UnknownBucket(name.to_owned()))
	}

	/// Gets a value from a bucket, provided its key
	pub fn get(&self, bucket: &str, key: &[u8]) -> Result<Option<Vec<u8>>, Error> {
		let db = self.bucket(bucket)?;
		let txn = lmdb::ReadTransaction::new(self.env.clone())?;
		let access = txn.access();
		let res = access.get(db, key);
		res.map(|res: &[u8]| res.to_vec())
			.to_opt()
			.map_err(From::from)
	}

	/// Gets a `Readable` value from a bucket, provided its key. Encapsulates
	/// serialization.
	pub fn get_ser<T: ser::Readable>(&self, bucket: &str, key: &[u8]) -> Result<Option<T>, Error> {
		let db = self.bucket(bucket)?;
		let txn = lmdb::ReadTransaction::new(self.env.clone())?;
		let access = txn.access();
		get_ser_access(db, key, &access)
	}

	/// Whether the provided key exists in the bucket
	pub fn exists(&self, bucket: &str, key: &[u8]) -> Result<bool, Error> {
		let db = self.bucket(bucket)?;
		let txn = lmdb::ReadTransaction::new(self.env.clone())?;
		let access = txn.access();
		let res: lmdb::error::Result<&lmdb::Ignore> = access.get(db, key);
		res.to_opt().map(|r| r.is_some()).map_err(From::from)
	}

	/// Produces an iterator of `Readable` types moving forward from the
	/// provided key prefix.
	pub fn iter<T: ser::Readable>(&self, bucket: &str, from: &[u8]) -> Result<SerIterator<T>, Error> {
		let db = self.bucket(bucket)?;
		let txn = Arc::new(lmdb::ReadTransaction::new(self.env.clone())?);
		let cursor = Arc::new(txn.cursor(db.clone())?);
		Ok(SerIterator {
			tx: txn,
			cursor,
			seek: false,
			prefix: from.to_vec(),
			_marker: marker::PhantomData,
		})
	}

	/// Every key/value pair in a bucket, in key order. Intended for
	/// consistency checks and tooling, not hot paths.
	pub fn pairs(&self, bucket: &str) -> Result<Vec<(Vec<u8>, Vec<u8>)>, Error> {
		let db = self.bucket(bucket)?;
		let txn = lmdb::ReadTransaction::new(self.env.clone())?;
		let mut cursor = txn.cursor(db.clone())?;
		let access = txn.access();

		let mut pairs = vec![];
		let mut kv = cursor.first::<[u8], [u8]>(&access).to_opt()?;
		while let Some((k, v)) = kv {
			pairs.push((k.to_vec(), v.to_vec()));
			kv = cursor.next::<[u8], [u8]>(&access).to_opt()?;
		}
		Ok(pairs)
	}

	/// Builds a new batch to be used with this store.
	pub fn batch(&self) -> Result<Batch<'_>, Error> {
		let txn = lmdb::WriteTransaction::new(self.env.clone())?;
		Ok(Batch {
			store: self,
			tx: txn,
		})
	}
}

fn get_ser_access<T: ser::Readable>(
	db: &lmdb::Database<'static>,
	key: &[u8],
	access: &lmdb::ConstAccessor<'_>,
) -> Result<Option<T>, Error> {
	let res: lmdb::error::Result<&[u8]> = access.get(db, key);
	match res.to_opt() {
		Ok(Some(mut res)) => match ser::deserialize(&mut res) {
			Ok(res) => Ok(Some(res)),
			Err(e) => Err(Error::SerErr(format!("{}", e))),
		},
		Ok(None) => Ok(None),
		Err(e) => Err(From::from(e)),
	}
}

/// Batch to write multiple Writeables to the store in an atomic manner.
/// Bucket names are resolved against the owning store; writes land together
/// on commit or not at all.
pub struct Batch<'a> {
	store: &'a Store,
	tx: lmdb::WriteTransaction<'a>,
}

impl<'a> Batch<'a> {
	/// Writes a single key/value pair to a bucket
	pub fn put(&self, bucket: &str, key: &[u8], value: Vec<u8>) -> Result<(), Error> {
		let db = self.store.bucket(bucket)?;
		self.tx
			.access()
			.put(db, key, &value, lmdb::put::Flags::empty())?;
		Ok(())
	}

	/// Writes a single key and its `Writeable` value to a bucket.
	/// Encapsulates serialization.
	pub fn put_ser<W: ser::Writeable>(&self, bucket: &str, key: &[u8], value: &W) -> Result<(), Error> {
		let ser_value = ser::ser_vec(value);
		match ser_value {
			Ok(data) => self.put(bucket, key, data),
			Err(err) => Err(Error::SerErr(format!("{}", err))),
		}
	}

	/// Gets a value from a bucket, taking the content of the current batch
	/// into account.
	pub fn get(&self, bucket: &str, key: &[u8]) -> Result<Option<Vec<u8>>, Error> {
		let db = self.store.bucket(bucket)?;
		let access = self.tx.access();
		let res: lmdb::error::Result<&[u8]> = access.get(db, key);
		res.map(|res: &[u8]| res.to_vec())
			.to_opt()
			.map_err(From::from)
	}

	/// Whether the provided key exists in the bucket, taking the content of
	/// the current batch into account.
	pub fn exists(&self, bucket: &str, key: &[u8]) -> Result<bool, Error> {
		let db = self.store.bucket(bucket)?;
		let access = self.tx.access();
		let res: lmdb::error::Result<&lmdb::Ignore> = access.get(db, key);
		res.to_opt().map(|r| r.is_some()).map_err(From::from)
	}

	/// Gets a `Readable` value from a bucket, taking the content of the
	/// current batch into account.
	pub fn get_ser<T: ser::Readable>(&self, bucket: &str, key: &[u8]) -> Result<Option<T>, Error> {
		let db = self.store.bucket(bucket)?;
		let access = self.tx.access();
		get_ser_access(db, key, &access)
	}

	/// Deletes a key/value pair from a bucket
	pub fn delete(&self, bucket: &str, key: &[u8]) -> Result<(), Error> {
		let db = self.store.bucket(bucket)?;
		self.tx.access().del_key(db, key)?;
		Ok(())
	}

	/// Writes the batch to the store
	pub fn commit(self) -> Result<(), Error> {
		self.tx.commit()?;
		Ok(())
	}
}

/// An iterator that produces Readable instances back. Wraps the lower level
/// DBIterator and deserializes the returned values.
pub struct SerIterator<T>
where
	T: ser::Readable,
{
	tx: Arc<lmdb::ReadTransaction<'static>>,
	cursor: Arc<lmdb::Cursor<'static, 'static>>,
	seek: bool,
	prefix: Vec<u8>,
	_marker: marker::PhantomData<T>,
}

impl<T> Iterator for SerIterator<T>
where
	T: ser::Readable,
{
	type Item = T;

	fn next(&mut self) -> Option<T> {
		let access = self.tx.access();
		let kv = if self.seek {
			Arc::get_mut(&mut self.cursor).unwrap().next(&access)
		} else {
			self.seek = true;
			Arc::get_mut(&mut self.cursor)
				.unwrap()
				.seek_range_k(&access, &self.prefix[..])
		};
		self.deser_if_prefix_match(kv)
	}
}

impl<T> SerIterator<T>
where
	T: ser::Readable,
{
	fn deser_if_prefix_match(&self, kv: Result<(&[u8], &[u8]), lmdb::Error>) -> Option<T> {
		match kv {
			Ok((k, v)) => {
				let plen = self.prefix.len();
				if plen == 0 || (k.len() >= plen && k[0..plen] == self.prefix[..]) {
					ser::deserialize(&mut &v[..]).ok()
				} else {
					None
				}
			}
			Err(_) => None,
		}
	}
}
