use crate::backend::{CaseStoreError, StorageError};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;
use std::any::Any;
use thiserror::Error;
use tracing::{debug, error};

#[derive(Debug, Error)]
pub enum ApiError {
	#[error("Missing required query parameter `caseId`")]
	MissingCaseId,
	#[error("Case `{0}` does not exist")]
	CaseNotFound(String),
	#[error("Instance `{0}` does not exist")]
	InstanceNotFound(String),
	#[error(transparent)]
	CaseStore(#[from] CaseStoreError),
	#[error(transparent)]
	Storage(#[from] StorageError),
	#[error("{0}")]
	Internal(String),
}

impl ApiError {
	pub const fn status(&self) -> StatusCode {
		match self {
			Self::MissingCaseId => StatusCode::BAD_REQUEST,
			Self::CaseNotFound(_) | Self::InstanceNotFound(_) => StatusCode::NOT_FOUND,
			Self::CaseStore(_) | Self::Storage(_) | Self::Internal(_) => {
				StatusCode::INTERNAL_SERVER_ERROR
			}
		}
	}
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let status = self.status();
		if status.is_server_error() {
			error!("{self:?}");
		} else {
			debug!("{self}");
		}
		error_response(status, &self.to_string())
	}
}

/// Every error is returned as `{"error": "<message>"}`.
pub fn error_response(status: StatusCode, message: &str) -> Response {
	(status, Json(json!({ "error": message }))).into_response()
}

/// Converts a panic of a request handler into a regular 500 response.
pub fn handle_panic(panic: Box<dyn Any + Send + 'static>) -> Response {
	let details = panic
		.downcast_ref::<String>()
		.map(String::as_str)
		.or_else(|| panic.downcast_ref::<&str>().copied())
		.unwrap_or("unknown panic");
	error!(details, "Request handler panicked");
	error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
}
