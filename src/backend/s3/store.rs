use super::S3ClientExt;
use crate::backend::{BlobStore, BlobStream, StorageError};
use crate::config::{S3EndpointStyle, StorageConfig};
use async_trait::async_trait;
use aws_config::retry::RetryConfig;
use aws_config::{AppName, Region};
use aws_credential_types::Credentials;
use aws_sdk_s3::config::BehaviorVersion;
use futures::{StreamExt, TryStreamExt};
use tokio_util::io::ReaderStream;
use tracing::{info, instrument, warn};

pub struct S3BlobStore {
	s3: aws_sdk_s3::Client,
	bucket: String,
}

impl S3BlobStore {
	pub fn new(config: &StorageConfig) -> Self {
		let mut builder = aws_sdk_s3::config::Builder::new()
			.region(config.region.clone().map(Region::new))
			.behavior_version(BehaviorVersion::latest())
			.force_path_style(matches!(config.endpoint_style, S3EndpointStyle::Path))
			// Transient failures are surfaced to the client, which retries on its own.
			.retry_config(RetryConfig::disabled());

		if let Ok(app_name) = AppName::new("case-dicomweb") {
			builder = builder.app_name(app_name);
		}

		if let Some(endpoint) = &config.endpoint {
			info!("Using S3 endpoint {endpoint}");
			builder = builder.endpoint_url(endpoint);
		}

		if let Some(credentials) = &config.credentials {
			builder = builder.credentials_provider(Credentials::new(
				&credentials.access_key,
				&credentials.secret_key,
				None,
				None,
				"case-dicomweb",
			));
		} else {
			warn!("No storage credentials configured. Requests to the bucket will be anonymous.");
		}

		Self {
			s3: aws_sdk_s3::Client::from_conf(builder.build()),
			bucket: config.bucket.clone(),
		}
	}
}

#[async_trait]
impl BlobStore for S3BlobStore {
	#[instrument(skip(self))]
	async fn list(&self, directory: &str) -> Result<Vec<String>, StorageError> {
		self.s3
			.list_children()
			.bucket(&self.bucket)
			.directory(directory)
			.send()
			.await
			.map_err(|err| StorageError::List {
				directory: directory.to_owned(),
				source: Box::new(err),
			})
	}

	#[instrument(skip(self))]
	async fn download(&self, path: &str) -> Result<BlobStream, StorageError> {
		let object = self
			.s3
			.get_object()
			.bucket(&self.bucket)
			.key(path)
			.send()
			.await
			.map_err(|err| StorageError::Download {
				path: path.to_owned(),
				source: Box::new(err),
			})?;

		let stream = ReaderStream::new(object.body.into_async_read())
			.inspect_err(|err| warn!("Download stream aborted: {err}"));
		Ok(stream.boxed())
	}
}
