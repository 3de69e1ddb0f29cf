//! Search transaction (QIDO-RS).
//!
//! <https://dicom.nema.org/medical/dicom/current/output/html/part18.html#sect_10.6>

use crate::api::common::{dicom_json, CaseContext};
use crate::api::error::ApiError;
use crate::api::router::ResourceQuery;
use crate::metadata::Attributes;
use crate::types::QueryRetrieveLevel;
use crate::AppState;
use axum::response::Response;
use tracing::instrument;

/// Searches the synthesized hierarchy of a case on the given level.
///
/// An unknown case is an empty result, not an error.
#[instrument(skip(state, level), fields(level = %level))]
pub async fn search(
	state: &AppState,
	case_id: &str,
	level: QueryRetrieveLevel,
	query: &ResourceQuery,
) -> Result<Response, ApiError> {
	let Some(context) = CaseContext::load(state, case_id).await? else {
		return dicom_json(&Vec::<Attributes>::new());
	};
	context.note_foreign_uids(query);

	let synthesizer = context.synthesizer();
	let matches: Vec<Attributes> = match level {
		QueryRetrieveLevel::Study => vec![synthesizer.study()],
		QueryRetrieveLevel::Series => vec![synthesizer.series()],
		QueryRetrieveLevel::Image => (1..=context.files.len())
			.map(|ordinal| synthesizer.instance(ordinal))
			.collect(),
	};
	dicom_json(&matches)
}
