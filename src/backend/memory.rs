//! In-memory stand-ins for the case store and object storage.

use crate::backend::{BlobStore, BlobStream, CaseStore, CaseStoreError, StorageError};
use crate::case::CaseRecord;
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::io;
use std::sync::Mutex;

#[derive(Default)]
pub struct MemoryCaseStore {
	cases: HashMap<String, CaseRecord>,
	unavailable: bool,
}

impl MemoryCaseStore {
	pub fn with_case(mut self, case: CaseRecord) -> Self {
		self.cases.insert(case.id.clone(), case);
		self
	}

	/// Every lookup fails as if the database was unreachable.
	pub fn unavailable() -> Self {
		Self {
			unavailable: true,
			..Self::default()
		}
	}
}

#[async_trait]
impl CaseStore for MemoryCaseStore {
	async fn find_case(&self, case_id: &str) -> Result<Option<CaseRecord>, CaseStoreError> {
		if self.unavailable {
			return Err(CaseStoreError::Query(sqlx::Error::PoolTimedOut));
		}
		Ok(self.cases.get(case_id).cloned())
	}
}

/// Object storage with S3 delimiter semantics: folders only exist as key prefixes.
#[derive(Default)]
pub struct MemoryBlobStore {
	objects: BTreeMap<String, Bytes>,
	broken_directories: HashSet<String>,
	broken_downloads: HashSet<String>,
	listed: Mutex<Vec<String>>,
}

impl MemoryBlobStore {
	pub fn with_object(mut self, path: &str, content: impl Into<Bytes>) -> Self {
		self.objects.insert(path.to_owned(), content.into());
		self
	}

	pub fn with_broken_listing(mut self, directory: &str) -> Self {
		self.broken_directories.insert(directory.to_owned());
		self
	}

	pub fn with_broken_download(mut self, path: &str) -> Self {
		self.broken_downloads.insert(path.to_owned());
		self
	}

	/// Directories listed so far, in call order.
	pub fn listed(&self) -> Vec<String> {
		self.listed.lock().map(|l| l.clone()).unwrap_or_default()
	}
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
	async fn list(&self, directory: &str) -> Result<Vec<String>, StorageError> {
		if let Ok(mut listed) = self.listed.lock() {
			listed.push(directory.to_owned());
		}
		if self.broken_directories.contains(directory) {
			return Err(StorageError::List {
				directory: directory.to_owned(),
				source: Box::new(io::Error::other("listing failed")),
			});
		}

		let prefix = if directory.is_empty() {
			String::new()
		} else {
			format!("{}/", directory.trim_end_matches('/'))
		};
		let children: BTreeSet<String> = self
			.objects
			.keys()
			.filter_map(|key| key.strip_prefix(&prefix))
			.filter_map(|rest| rest.split('/').next())
			.filter(|name| !name.is_empty())
			.map(ToOwned::to_owned)
			.collect();

		Ok(children.into_iter().collect())
	}

	async fn download(&self, path: &str) -> Result<BlobStream, StorageError> {
		let content = self
			.objects
			.get(path)
			.filter(|_| !self.broken_downloads.contains(path))
			.cloned()
			.ok_or_else(|| StorageError::Download {
				path: path.to_owned(),
				source: Box::new(io::Error::new(io::ErrorKind::NotFound, "no such key")),
			})?;

		Ok(futures::stream::once(async move { Ok(content) }).boxed())
	}
}
