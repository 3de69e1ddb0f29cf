use crate::api::router::{CASE_ID_PARAMETER, ROUTES};
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;

#[derive(Debug, Serialize)]
struct ServiceDescription {
	service: &'static str,
	version: &'static str,
	usage: String,
	endpoints: Vec<EndpointDescription>,
}

#[derive(Debug, Serialize)]
struct EndpointDescription {
	method: &'static str,
	path: &'static str,
	description: &'static str,
}

/// Describes the service. Also served for every request that matches no endpoint.
pub fn index() -> Response {
	let endpoints = ROUTES
		.iter()
		.map(|entry| EndpointDescription {
			method: entry.method.as_str(),
			path: entry.template,
			description: entry.description,
		})
		.collect();

	Json(ServiceDescription {
		service: env!("CARGO_PKG_NAME"),
		version: env!("CARGO_PKG_VERSION"),
		usage: format!(
			"Every endpoint except this one requires the `{CASE_ID_PARAMETER}` query parameter"
		),
		endpoints,
	})
	.into_response()
}
