use crate::api::error::ApiError;
use crate::api::router::{ResourceQuery, Route, RoutedRequest};
use crate::types::QueryRetrieveLevel;
use crate::AppState;
use axum::extract::State;
use axum::http::{Method, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use tracing::{debug, instrument};

mod common;
pub mod error;
mod home;
mod qido;
pub mod router;
mod wado;

/// All requests go through [`dispatch`], because the case id may be embedded in the path and has
/// to be removed before the path can be matched.
pub fn routes() -> Router<AppState> {
	Router::new().fallback(dispatch)
}

#[instrument(skip_all, fields(%method, path = uri.path()))]
async fn dispatch(State(state): State<AppState>, method: Method, uri: Uri) -> Response {
	let request = RoutedRequest::parse(&method, &uri, &state.config.server.http.base_path);
	debug!(route = ?request.route, case_id = ?request.case_id, "Resolved request");

	handle(&state, request)
		.await
		.unwrap_or_else(IntoResponse::into_response)
}

async fn handle(state: &AppState, request: RoutedRequest) -> Result<Response, ApiError> {
	let RoutedRequest { route, case_id } = request;
	if matches!(route, Route::Home | Route::Fallback) {
		return Ok(home::index());
	}
	let case_id = case_id.ok_or(ApiError::MissingCaseId)?;

	match route {
		Route::SearchStudies => {
			let query = ResourceQuery::default();
			qido::search(state, &case_id, QueryRetrieveLevel::Study, &query).await
		}
		Route::SearchSeries(query) => {
			qido::search(state, &case_id, QueryRetrieveLevel::Series, &query).await
		}
		Route::SearchInstances(query) => {
			qido::search(state, &case_id, QueryRetrieveLevel::Image, &query).await
		}
		Route::RetrieveInstance(query) => wado::retrieve(state, &case_id, &query).await,
		Route::InstanceMetadata(query) => wado::metadata(state, &case_id, &query).await,
		Route::RetrieveFrames(query, frames) => {
			wado::frames(state, &case_id, &query, &frames).await
		}
		Route::Home | Route::Fallback => Ok(home::index()),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::backend::memory::{MemoryBlobStore, MemoryCaseStore};
	use crate::backend::Backend;
	use crate::case::CaseRecord;
	use crate::config::AppConfig;
	use axum::body::{to_bytes, Body};
	use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
	use axum::http::{HeaderMap, Request, StatusCode};
	use bytes::Bytes;
	use chrono::{TimeZone, Utc};
	use serde_json::Value;
	use std::sync::Arc;
	use tower::ServiceExt;

	const ROOT: &str = "1.2.826.0.1.3680043.8.498";

	fn case(id: &str, file_path: &str) -> CaseRecord {
		CaseRecord {
			id: id.to_owned(),
			patient_name: String::from("Doe^Jane"),
			patient_id: String::from("P-1"),
			patient_birth_date: None,
			clinical_question: String::from("Fracture?"),
			uploaded_at: Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 3).single(),
			file_path: Some(file_path.to_owned()),
		}
	}

	fn app_with(config: AppConfig, cases: MemoryCaseStore, blobs: MemoryBlobStore) -> Router {
		let backend = Backend {
			cases: Arc::new(cases),
			blobs: Arc::new(blobs),
		};
		routes().with_state(AppState::new(config, backend))
	}

	fn app(cases: MemoryCaseStore, blobs: MemoryBlobStore) -> Router {
		app_with(AppConfig::defaults(), cases, blobs)
	}

	/// A case with three loose files, one of them in a sub-folder.
	fn three_files() -> Router {
		app(
			MemoryCaseStore::default().with_case(case("c1", "u1/123/upload.zip")),
			MemoryBlobStore::default()
				.with_object("u1/123/b.dcm", "second")
				.with_object("u1/123/a.dcm", "first")
				.with_object("u1/123/series/c.DCM", "third")
				.with_object("u1/123/upload.zip", "ignored"),
		)
	}

	/// The case of a user that uploaded a single zip archive.
	fn single_archive() -> Router {
		app(
			MemoryCaseStore::default().with_case(case("c1", "u1/123/scan.zip")),
			MemoryBlobStore::default().with_object("u1/123/scan.zip", "PK\x03\x04archive"),
		)
	}

	async fn send(app: Router, method: Method, uri: &str) -> (StatusCode, HeaderMap, Bytes) {
		let request = Request::builder()
			.method(method)
			.uri(uri)
			.body(Body::empty())
			.unwrap();
		let response = app.oneshot(request).await.unwrap();
		let status = response.status();
		let headers = response.headers().clone();
		let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
		(status, headers, body)
	}

	async fn get(app: Router, uri: &str) -> (StatusCode, HeaderMap, Bytes) {
		send(app, Method::GET, uri).await
	}

	async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
		let (status, _, body) = get(app, uri).await;
		(status, serde_json::from_slice(&body).unwrap())
	}

	fn study_uid(case_id: &str) -> String {
		format!("{ROOT}.{}", case_id.replace('-', ""))
	}

	fn instances_uri(case_id: &str) -> String {
		let study = study_uid(case_id);
		format!("/studies/{study}/series/{study}.1/instances?caseId={case_id}")
	}

	fn instance_uri(case_id: &str, ordinal: i64, suffix: &str) -> String {
		let study = study_uid(case_id);
		format!(
			"/studies/{study}/series/{study}.1/instances/{study}.1.{ordinal}{suffix}?caseId={case_id}"
		)
	}

	#[tokio::test]
	async fn home_lists_endpoints() {
		let (status, json) = get_json(three_files(), "/").await;

		assert_eq!(status, StatusCode::OK);
		assert_eq!(json["service"], env!("CARGO_PKG_NAME"));
		assert_eq!(json["endpoints"].as_array().map(Vec::len), Some(7));
		assert_eq!(json["endpoints"][1]["path"], "/studies?caseId={caseId}");
	}

	#[tokio::test]
	async fn unknown_path_and_method_fall_back_to_home() {
		let (status, json) = get_json(three_files(), "/nothing/here").await;
		assert_eq!(status, StatusCode::OK);
		assert!(json["endpoints"].is_array());

		let (status, headers, _) = send(three_files(), Method::POST, "/studies?caseId=c1").await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(headers[CONTENT_TYPE], "application/json");
	}

	#[tokio::test]
	async fn missing_case_id_is_rejected() {
		let (status, json) = get_json(three_files(), "/studies").await;

		assert_eq!(status, StatusCode::BAD_REQUEST);
		assert!(json["error"].as_str().is_some_and(|e| e.contains("caseId")));
	}

	#[tokio::test]
	async fn unknown_case_is_an_empty_search_result() {
		let (status, headers, body) = get(three_files(), "/studies?caseId=unknown-id").await;

		assert_eq!(status, StatusCode::OK);
		assert_eq!(headers[CONTENT_TYPE], "application/dicom+json");
		assert_eq!(body, "[]");
	}

	#[tokio::test]
	async fn unknown_case_is_not_found_on_retrieve() {
		let (status, json) = get_json(three_files(), &instance_uri("nope", 1, "")).await;

		assert_eq!(status, StatusCode::NOT_FOUND);
		assert!(json["error"].is_string());
	}

	#[tokio::test]
	async fn study_search_counts_instances() {
		let (status, json) = get_json(three_files(), "/studies?caseId=c1").await;

		assert_eq!(status, StatusCode::OK);
		assert_eq!(json.as_array().map(Vec::len), Some(1));
		assert_eq!(json[0]["0020000D"]["Value"][0], study_uid("c1"));
		assert_eq!(json[0]["00201206"]["Value"][0], 1);
		assert_eq!(json[0]["00201208"]["Value"][0], 3);
	}

	#[tokio::test]
	async fn series_search_returns_the_only_series() {
		let study = study_uid("c1");
		let (status, json) =
			get_json(three_files(), &format!("/studies/{study}/series?caseId=c1")).await;

		assert_eq!(status, StatusCode::OK);
		assert_eq!(json.as_array().map(Vec::len), Some(1));
		assert_eq!(json[0]["0020000E"]["Value"][0], format!("{study}.1"));
		assert_eq!(json[0]["00201209"]["Value"][0], 3);
	}

	#[tokio::test]
	async fn instance_search_returns_one_record_per_file() {
		let (status, json) = get_json(three_files(), &instances_uri("c1")).await;
		let study = study_uid("c1");

		assert_eq!(status, StatusCode::OK);
		let uids: Vec<&Value> = json
			.as_array()
			.unwrap()
			.iter()
			.map(|instance| &instance["00080018"]["Value"][0])
			.collect();
		assert_eq!(
			uids,
			vec![
				&Value::from(format!("{study}.1.1")),
				&Value::from(format!("{study}.1.2")),
				&Value::from(format!("{study}.1.3")),
			]
		);
	}

	#[tokio::test]
	async fn repeated_searches_are_identical() {
		let (_, _, first) = get(three_files(), &instances_uri("c1")).await;
		let (_, _, second) = get(three_files(), &instances_uri("c1")).await;

		assert_eq!(first, second);
	}

	#[tokio::test]
	async fn ordinals_address_files_in_name_order() {
		for (ordinal, content) in [(1, "first"), (2, "second"), (3, "third")] {
			let (status, _, body) = get(three_files(), &instance_uri("c1", ordinal, "")).await;
			assert_eq!(status, StatusCode::OK);
			assert_eq!(body, content);
		}
	}

	#[tokio::test]
	async fn ordinals_outside_the_file_list_are_not_found() {
		for ordinal in [0, 4, -1] {
			let (status, _, _) = get(three_files(), &instance_uri("c1", ordinal, "")).await;
			assert_eq!(status, StatusCode::NOT_FOUND);
		}

		let study = study_uid("c1");
		let uri = format!("/studies/{study}/series/{study}.1/instances/{study}.1.x?caseId=c1");
		let (status, _, _) = get(three_files(), &uri).await;
		assert_eq!(status, StatusCode::NOT_FOUND);
	}

	#[tokio::test]
	async fn dicom_files_are_served_as_dicom() {
		let (status, headers, _) = get(three_files(), &instance_uri("c1", 3, "")).await;

		assert_eq!(status, StatusCode::OK);
		assert_eq!(headers[CONTENT_TYPE], "application/dicom");
		assert_eq!(headers[CONTENT_DISPOSITION], "attachment; filename=\"c.DCM\"");
	}

	#[tokio::test]
	async fn single_archive_is_one_instance() {
		let (_, json) = get_json(single_archive(), &instances_uri("c1")).await;
		assert_eq!(json.as_array().map(Vec::len), Some(1));

		let (status, headers, body) = get(single_archive(), &instance_uri("c1", 1, "")).await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body, "PK\x03\x04archive");
		assert_eq!(headers[CONTENT_TYPE], "application/octet-stream");
		assert_eq!(headers[CONTENT_DISPOSITION], "attachment; filename=\"scan.zip\"");
	}

	#[tokio::test]
	async fn metadata_is_a_single_combined_record() {
		let (status, json) = get_json(three_files(), &instance_uri("c1", 2, "/metadata")).await;
		let study = study_uid("c1");

		assert_eq!(status, StatusCode::OK);
		assert_eq!(json.as_array().map(Vec::len), Some(1));
		assert_eq!(json[0]["0020000D"]["Value"][0], study);
		assert_eq!(json[0]["0020000E"]["Value"][0], format!("{study}.1"));
		assert_eq!(json[0]["00080018"]["Value"][0], format!("{study}.1.2"));
		assert_eq!(json[0]["00100010"]["Value"][0]["Alphabetic"], "Doe^Jane");
		assert_eq!(json[0]["00200013"]["Value"][0], 2);
	}

	#[tokio::test]
	async fn frames_return_the_whole_instance() {
		let (_, _, instance) = get(three_files(), &instance_uri("c1", 2, "")).await;
		let (status, _, frames) = get(three_files(), &instance_uri("c1", 2, "/frames/1,2")).await;

		assert_eq!(status, StatusCode::OK);
		assert_eq!(frames, instance);
	}

	#[tokio::test]
	async fn case_id_embedded_in_path() {
		let (status, json) = get_json(three_files(), "/studies&caseId=c1").await;

		assert_eq!(status, StatusCode::OK);
		assert_eq!(json[0]["0020000D"]["Value"][0], study_uid("c1"));
	}

	#[tokio::test]
	async fn base_path_is_stripped() {
		let mut config = AppConfig::defaults();
		config.server.http.base_path = String::from("/functions/v1/dicomweb");
		let app = app_with(
			config,
			MemoryCaseStore::default().with_case(case("c1", "u1/123/scan.zip")),
			MemoryBlobStore::default().with_object("u1/123/scan.zip", "PK"),
		);

		let (status, json) = get_json(app, "/functions/v1/dicomweb/studies?caseId=c1").await;

		assert_eq!(status, StatusCode::OK);
		assert_eq!(json[0]["00201208"]["Value"][0], 1);
	}

	#[tokio::test]
	async fn case_without_files_has_no_instances() {
		let mut record = case("c1", "");
		record.file_path = None;
		let build = || {
			app(
				MemoryCaseStore::default().with_case(record.clone()),
				MemoryBlobStore::default(),
			)
		};

		let (status, json) = get_json(build(), "/studies?caseId=c1").await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(json[0]["00201208"]["Value"][0], 0);

		let (status, json) = get_json(build(), &instances_uri("c1")).await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(json, Value::Array(Vec::new()));
	}

	#[tokio::test]
	async fn case_store_failure_is_an_internal_error() {
		let app = app(MemoryCaseStore::unavailable(), MemoryBlobStore::default());
		let (status, json) = get_json(app, "/studies?caseId=c1").await;

		assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
		assert!(json["error"].is_string());
	}

	#[tokio::test]
	async fn download_failure_is_an_internal_error() {
		let app = app(
			MemoryCaseStore::default().with_case(case("c1", "u1/123/scan.zip")),
			MemoryBlobStore::default()
				.with_object("u1/123/scan.zip", "PK")
				.with_broken_download("u1/123/scan.zip"),
		);
		let (status, json) = get_json(app, &instance_uri("c1", 1, "")).await;

		assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
		assert_eq!(json["error"], "Failed to download `u1/123/scan.zip`");
	}
}
