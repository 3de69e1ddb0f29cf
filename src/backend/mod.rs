use crate::case::CaseRecord;
use crate::config::AppConfig;
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, instrument};

#[cfg(test)]
pub mod memory;
pub mod postgres;
pub mod s3;

/// Streamed content of a single blob.
pub type BlobStream = BoxStream<'static, Result<Bytes, std::io::Error>>;

/// Read access to the relational store that holds the case rows.
#[async_trait]
pub trait CaseStore: Send + Sync {
	/// Returns `None` if no case with the given identifier exists.
	async fn find_case(&self, case_id: &str) -> Result<Option<CaseRecord>, CaseStoreError>;
}

/// Read access to the object storage that holds the files of each case.
#[async_trait]
pub trait BlobStore: Send + Sync {
	/// Lists the names of the immediate children of `directory`, files and folders alike.
	async fn list(&self, directory: &str) -> Result<Vec<String>, StorageError>;

	async fn download(&self, path: &str) -> Result<BlobStream, StorageError>;
}

#[derive(Debug, Error)]
pub enum CaseStoreError {
	#[error("Failed to query case store: {0}")]
	Query(#[from] sqlx::Error),
}

#[derive(Debug, Error)]
pub enum StorageError {
	#[error("Failed to list `{directory}`")]
	List {
		directory: String,
		source: Box<dyn std::error::Error + Send + Sync>,
	},
	#[error("Failed to download `{path}`")]
	Download {
		path: String,
		source: Box<dyn std::error::Error + Send + Sync>,
	},
}

/// The clients used by every request. Constructed once at startup and shared via the state.
#[derive(Clone)]
pub struct Backend {
	pub cases: Arc<dyn CaseStore>,
	pub blobs: Arc<dyn BlobStore>,
}

impl Backend {
	pub fn new(config: &AppConfig) -> Result<Self, sqlx::Error> {
		let cases = postgres::PostgresCaseStore::new(&config.database)?;
		let blobs = s3::S3BlobStore::new(&config.storage);

		Ok(Self {
			cases: Arc::new(cases),
			blobs: Arc::new(blobs),
		})
	}

	#[instrument(skip(self))]
	pub async fn resolve_case(&self, case_id: &str) -> Result<Option<CaseRecord>, CaseStoreError> {
		let case = self.cases.find_case(case_id).await?;
		if case.is_none() {
			debug!("Case does not exist (yet)");
		}
		Ok(case)
	}
}
