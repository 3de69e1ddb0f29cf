use crate::api::error::ApiError;
use crate::api::router::ResourceQuery;
use crate::case::CaseRecord;
use crate::discovery::{by_ordinal, DiscoveredFile, FileDiscovery};
use crate::identity::{parse_ordinal, CaseIdentity};
use crate::metadata::MetadataSynthesizer;
use crate::AppState;
use axum::http::header::CONTENT_TYPE;
use axum::http::HeaderValue;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tracing::debug;

pub const DICOM_JSON: &str = "application/dicom+json";
pub const DICOM: &str = "application/dicom";

/// Serializes a list of attribute sets as `application/dicom+json`.
pub fn dicom_json<T: Serialize>(body: &T) -> Result<Response, ApiError> {
	let body = serde_json::to_vec(body).map_err(|err| ApiError::Internal(err.to_string()))?;
	Ok(([(CONTENT_TYPE, HeaderValue::from_static(DICOM_JSON))], body).into_response())
}

/// A case together with its synthesized identity and the files found in storage.
pub struct CaseContext {
	pub case: CaseRecord,
	pub identity: CaseIdentity,
	pub files: Vec<DiscoveredFile>,
}

impl CaseContext {
	/// Returns `None` if the case does not exist.
	pub async fn load(state: &AppState, case_id: &str) -> Result<Option<Self>, ApiError> {
		let Some(case) = state.backend.resolve_case(case_id).await? else {
			return Ok(None);
		};

		let files = FileDiscovery::new(
			state.backend.blobs.as_ref(),
			state.config.storage.listing_concurrency,
		)
		.discover(&case)
		.await;
		let identity = state.uids.identify(&case.id);

		Ok(Some(Self {
			case,
			identity,
			files,
		}))
	}

	/// Like [`CaseContext::load`], but a missing case is an error.
	pub async fn require(state: &AppState, case_id: &str) -> Result<Self, ApiError> {
		Self::load(state, case_id)
			.await?
			.ok_or_else(|| ApiError::CaseNotFound(case_id.to_owned()))
	}

	pub fn synthesizer(&self) -> MetadataSynthesizer<'_> {
		MetadataSynthesizer::new(&self.case, &self.identity, self.files.len())
	}

	/// Resolves the instance UID of the request to its position and file.
	pub fn select(&self, query: &ResourceQuery) -> Result<(usize, &DiscoveredFile), ApiError> {
		let uid = query.sop_instance_uid.as_deref().unwrap_or_default();
		parse_ordinal(uid)
			.and_then(|ordinal| by_ordinal(&self.files, ordinal))
			.ok_or_else(|| ApiError::InstanceNotFound(uid.to_owned()))
	}

	/// The case id alone selects the case. UIDs in the path are informational only.
	pub fn note_foreign_uids(&self, query: &ResourceQuery) {
		let foreign_study = query
			.study_instance_uid
			.as_ref()
			.is_some_and(|uid| *uid != self.identity.study_instance_uid);
		let foreign_series = query
			.series_instance_uid
			.as_ref()
			.is_some_and(|uid| *uid != self.identity.series_instance_uid);

		if foreign_study || foreign_series {
			debug!(
				study_instance_uid = ?query.study_instance_uid,
				series_instance_uid = ?query.series_instance_uid,
				"Path UIDs do not belong to the case, serving the case anyway"
			);
		}
	}
}
