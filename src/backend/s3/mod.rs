mod store;

pub use store::S3BlobStore;

use aws_sdk_s3 as s3;
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::operation::list_objects_v2::{ListObjectsV2Error, ListObjectsV2Output};
use tracing::{error, trace};

pub trait S3ClientExt {
	/// Lists the immediate children of a folder, following continuation tokens.
	fn list_children(&self) -> ListChildrenFluentBuilder<'_>;
}

impl S3ClientExt for s3::Client {
	fn list_children(&self) -> ListChildrenFluentBuilder<'_> {
		ListChildrenFluentBuilder {
			handle: self,
			bucket: String::new(),
			directory: String::new(),
		}
	}
}

pub struct ListChildrenFluentBuilder<'a> {
	handle: &'a s3::Client,
	bucket: String,
	directory: String,
}

impl ListChildrenFluentBuilder<'_> {
	pub fn bucket(mut self, bucket: impl Into<String>) -> Self {
		self.bucket = bucket.into();
		self
	}

	pub fn directory(mut self, directory: impl Into<String>) -> Self {
		self.directory = directory.into();
		self
	}

	fn prefix(&self) -> String {
		folder_prefix(&self.directory)
	}

	async fn list_next(
		&self,
		prefix: &str,
		continuation_token: Option<String>,
	) -> Result<ListObjectsV2Output, SdkError<ListObjectsV2Error>> {
		self.handle
			.list_objects_v2()
			.bucket(&self.bucket)
			.prefix(prefix)
			.delimiter("/")
			.set_continuation_token(continuation_token)
			.send()
			.await
	}

	/// Returns the child names relative to the directory. Folders have no trailing slash.
	pub async fn send(self) -> Result<Vec<String>, SdkError<ListObjectsV2Error>> {
		let prefix = self.prefix();
		let mut children = Vec::new();
		let mut continuation_token: Option<String> = None;
		loop {
			match self.list_next(&prefix, continuation_token).await {
				Ok(response) => {
					for object in response.contents.unwrap_or_default() {
						if let Some(name) = object.key.as_deref().and_then(|k| child_name(&prefix, k))
						{
							children.push(name);
						}
					}
					for folder in response.common_prefixes.unwrap_or_default() {
						if let Some(name) =
							folder.prefix.as_deref().and_then(|p| child_name(&prefix, p))
						{
							children.push(name);
						}
					}
					if response.is_truncated.unwrap_or(false) {
						continuation_token = response.next_continuation_token;
					} else {
						break;
					}
				}
				Err(err) => {
					error!("{err:?}");
					return Err(err);
				}
			}
		}

		trace!(%prefix, count = children.len(), "Listed folder");
		Ok(children)
	}
}

fn folder_prefix(directory: &str) -> String {
	let directory = directory.trim_matches('/');
	if directory.is_empty() {
		String::new()
	} else {
		format!("{directory}/")
	}
}

/// Strips the listing prefix from a key or common prefix. The folder marker itself yields `None`.
fn child_name(prefix: &str, key: &str) -> Option<String> {
	let name = key.strip_prefix(prefix)?.trim_end_matches('/');
	if name.is_empty() {
		None
	} else {
		Some(name.to_owned())
	}
}
