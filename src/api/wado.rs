//! Retrieve transaction (WADO-RS).
//!
//! <https://dicom.nema.org/medical/dicom/current/output/html/part18.html#sect_10.4>

use crate::api::common::{dicom_json, CaseContext, DICOM};
use crate::api::error::ApiError;
use crate::api::router::ResourceQuery;
use crate::AppState;
use axum::body::Body;
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::http::StatusCode;
use axum::response::Response;
use tracing::{debug, instrument};

/// Streams the stored file of an instance as-is.
#[instrument(skip(state))]
pub async fn retrieve(
	state: &AppState,
	case_id: &str,
	query: &ResourceQuery,
) -> Result<Response, ApiError> {
	let context = CaseContext::require(state, case_id).await?;
	context.note_foreign_uids(query);
	let (_, file) = context.select(query)?;

	let stream = state.backend.blobs.download(&file.path).await?;
	let response = Response::builder().status(StatusCode::OK);
	let response = if file.is_dicom() {
		response.header(CONTENT_TYPE, DICOM)
	} else {
		response.header(CONTENT_TYPE, mime::APPLICATION_OCTET_STREAM.as_ref())
	};

	response
		.header(CONTENT_DISPOSITION, attachment(&file.name))
		.body(Body::from_stream(stream))
		.map_err(|err| ApiError::Internal(err.to_string()))
}

/// Returns the combined study, series and instance attributes of one instance.
#[instrument(skip(state))]
pub async fn metadata(
	state: &AppState,
	case_id: &str,
	query: &ResourceQuery,
) -> Result<Response, ApiError> {
	let context = CaseContext::require(state, case_id).await?;
	context.note_foreign_uids(query);
	let (ordinal, _) = context.select(query)?;

	dicom_json(&[context.synthesizer().instance_metadata(ordinal)])
}

/// Files are never decoded, so frame requests return the whole instance.
#[instrument(skip(state))]
pub async fn frames(
	state: &AppState,
	case_id: &str,
	query: &ResourceQuery,
	frames: &str,
) -> Result<Response, ApiError> {
	debug!("Serving the whole instance instead of individual frames");
	retrieve(state, case_id, query).await
}

fn attachment(file_name: &str) -> String {
	let file_name: String = file_name
		.chars()
		.filter(|c| *c != '"' && *c != '\\' && !c.is_control())
		.collect();
	format!("attachment; filename=\"{file_name}\"")
}
