//! Locates the files of a case in object storage.
//!
//! Cases are uploaded in different layouts: loose DICOM files next to the stored file, DICOM
//! files in sub-folders, or a single archive. Discovery tolerates all of them and produces a list
//! sorted by file name. The position in that list (starting at 1) is the only key that addresses
//! an instance, so the order must be stable for unchanged storage.

use crate::backend::BlobStore;
use crate::case::CaseRecord;
use futures::StreamExt;
use std::cmp::Ordering;
use tracing::{debug, instrument, warn};

/// Extensions of files that are served as one instance each.
pub const INSTANCE_EXTENSIONS: &[&str] = &["dcm", "dicom"];

/// Extensions of archives that are served as a single opaque instance if nothing else is found.
pub const ARCHIVE_EXTENSIONS: &[&str] = &["zip", "tar", "tgz", "gz", "7z", "rar"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredFile {
	/// The last path segment, used for ordering and as download file name.
	pub name: String,
	/// The full storage path.
	pub path: String,
}

impl DiscoveredFile {
	fn in_directory(directory: &str, name: &str) -> Self {
		Self {
			name: name.to_owned(),
			path: join(directory, name),
		}
	}

	fn from_path(path: &str) -> Self {
		let name = path.rsplit('/').next().unwrap_or(path);
		Self {
			name: name.to_owned(),
			path: path.to_owned(),
		}
	}

	/// Whether the file carries one of the [`INSTANCE_EXTENSIONS`].
	pub fn is_dicom(&self) -> bool {
		has_extension_in(&self.name, INSTANCE_EXTENSIONS)
	}
}

impl Ord for DiscoveredFile {
	fn cmp(&self, other: &Self) -> Ordering {
		self.name
			.cmp(&other.name)
			.then_with(|| self.path.cmp(&other.path))
	}
}

impl PartialOrd for DiscoveredFile {
	fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
		Some(self.cmp(other))
	}
}

pub struct FileDiscovery<'a> {
	store: &'a dyn BlobStore,
	concurrency: usize,
}

impl<'a> FileDiscovery<'a> {
	pub fn new(store: &'a dyn BlobStore, concurrency: usize) -> Self {
		Self {
			store,
			concurrency: concurrency.max(1),
		}
	}

	/// Discovers the files of a case.
	///
	/// Lists the folder of the stored file and, for every child without an extension, exactly
	/// one more level. Falls back to an archive in the folder and finally to the stored file.
	#[instrument(skip_all, fields(case_id = %case.id))]
	pub async fn discover(&self, case: &CaseRecord) -> Vec<DiscoveredFile> {
		let base = base_directory(case);
		let children = self.list_or_empty(&base).await;

		let mut files = Vec::new();
		let mut folders = Vec::new();
		for name in &children {
			if has_extension_in(name, INSTANCE_EXTENSIONS) {
				files.push(DiscoveredFile::in_directory(&base, name));
			} else if !name.contains('.') {
				folders.push(join(&base, name));
			}
		}

		// Never deeper than this second level.
		let nested: Vec<Vec<DiscoveredFile>> = futures::stream::iter(folders)
			.map(|folder| self.list_folder(folder))
			.buffered(self.concurrency)
			.collect()
			.await;
		files.extend(nested.into_iter().flatten());

		if files.is_empty() {
			if let Some(archive) = children
				.iter()
				.filter(|name| has_extension_in(name, ARCHIVE_EXTENSIONS))
				.min()
			{
				debug!(%archive, "No DICOM files found, serving archive");
				files.push(DiscoveredFile::in_directory(&base, archive));
			}
		}

		if files.is_empty() {
			if let Some(path) = &case.file_path {
				debug!(%path, "Nothing found in storage, serving stored file");
				files.push(DiscoveredFile::from_path(path));
			}
		}

		files.sort();
		debug!(count = files.len(), "Discovered files");
		files
	}

	async fn list_folder(&self, folder: String) -> Vec<DiscoveredFile> {
		let children = self.list_or_empty(&folder).await;
		children
			.into_iter()
			.filter(|name| has_extension_in(name, INSTANCE_EXTENSIONS))
			.map(|name| DiscoveredFile::in_directory(&folder, &name))
			.collect()
	}

	async fn list_or_empty(&self, directory: &str) -> Vec<String> {
		match self.store.list(directory).await {
			Ok(children) => children,
			Err(err) => {
				warn!("Treating folder as empty: {err:?}");
				Vec::new()
			}
		}
	}
}

/// Picks a file by its 1-based position. Positions outside `1..=files.len()` yield `None`.
pub fn by_ordinal(files: &[DiscoveredFile], ordinal: i64) -> Option<(usize, &DiscoveredFile)> {
	let position = usize::try_from(ordinal).ok()?;
	let file = files.get(position.checked_sub(1)?)?;
	Some((position, file))
}

/// The folder that contains the stored file. Legacy rows without a folder use the case id.
fn base_directory(case: &CaseRecord) -> String {
	match case.file_path.as_deref().and_then(|path| path.rsplit_once('/')) {
		Some((directory, _)) => directory.to_owned(),
		None => case.id.clone(),
	}
}

fn join(directory: &str, name: &str) -> String {
	if directory.is_empty() {
		name.to_owned()
	} else {
		format!("{directory}/{name}")
	}
}

fn has_extension_in(name: &str, extensions: &[&str]) -> bool {
	name.rsplit_once('.').is_some_and(|(_, extension)| {
		extensions
			.iter()
			.any(|candidate| extension.eq_ignore_ascii_case(candidate))
	})
}
