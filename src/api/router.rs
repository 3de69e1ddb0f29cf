use crate::types::UI;
use axum::http::{Method, Uri};

/// The query parameter that carries the case identifier.
pub const CASE_ID_PARAMETER: &str = "caseId";

/// Some callers append the case id to the path instead of the query, e.g. `/studies&caseId=..`.
const EMBEDDED_CASE_ID: &str = "caseId=";

/// The operation a request resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
	Home,
	SearchStudies,
	SearchSeries(ResourceQuery),
	SearchInstances(ResourceQuery),
	RetrieveInstance(ResourceQuery),
	InstanceMetadata(ResourceQuery),
	/// Frame numbers are kept for logging only. Frames are served as the whole instance.
	RetrieveFrames(ResourceQuery, String),
	Fallback,
}

/// The UIDs given in the request path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceQuery {
	pub study_instance_uid: Option<UI>,
	pub series_instance_uid: Option<UI>,
	pub sop_instance_uid: Option<UI>,
}

type Params = std::vec::IntoIter<String>;

impl ResourceQuery {
	fn take(params: &mut Params) -> Self {
		Self {
			study_instance_uid: params.next(),
			series_instance_uid: params.next(),
			sop_instance_uid: params.next(),
		}
	}
}

#[derive(Debug, Clone, Copy)]
enum Segment {
	Literal(&'static str),
	Param,
}

use Segment::{Literal, Param};

pub struct RouteEntry {
	pub method: Method,
	pub template: &'static str,
	pub description: &'static str,
	segments: &'static [Segment],
	build: fn(Params) -> Route,
}

impl RouteEntry {
	fn matches(&self, method: &Method, segments: &[&str]) -> Option<Vec<String>> {
		if self.method != method || self.segments.len() != segments.len() {
			return None;
		}

		let mut params = Vec::new();
		for (pattern, segment) in self.segments.iter().zip(segments) {
			match pattern {
				Literal(literal) if literal == segment => {}
				Literal(_) => return None,
				Param => params.push((*segment).to_owned()),
			}
		}
		Some(params)
	}
}

/// Supported endpoints, evaluated top-down. The first match wins.
#[rustfmt::skip]
pub static ROUTES: &[RouteEntry] = &[
	RouteEntry {
		method: Method::GET,
		template: "/",
		description: "Lists the supported endpoints",
		segments: &[],
		build: |_| Route::Home,
	},
	RouteEntry {
		method: Method::GET,
		template: "/studies?caseId={caseId}",
		description: "Searches the study of a case (QIDO-RS)",
		segments: &[Literal("studies")],
		build: |_| Route::SearchStudies,
	},
	RouteEntry {
		method: Method::GET,
		template: "/studies/{study}/series?caseId={caseId}",
		description: "Searches the series of a case (QIDO-RS)",
		segments: &[Literal("studies"), Param, Literal("series")],
		build: |mut params| Route::SearchSeries(ResourceQuery::take(&mut params)),
	},
	RouteEntry {
		method: Method::GET,
		template: "/studies/{study}/series/{series}/instances?caseId={caseId}",
		description: "Searches the instances of a case (QIDO-RS)",
		segments: &[Literal("studies"), Param, Literal("series"), Param, Literal("instances")],
		build: |mut params| Route::SearchInstances(ResourceQuery::take(&mut params)),
	},
	RouteEntry {
		method: Method::GET,
		template: "/studies/{study}/series/{series}/instances/{instance}?caseId={caseId}",
		description: "Retrieves the file of an instance (WADO-RS)",
		segments: &[Literal("studies"), Param, Literal("series"), Param, Literal("instances"), Param],
		build: |mut params| Route::RetrieveInstance(ResourceQuery::take(&mut params)),
	},
	RouteEntry {
		method: Method::GET,
		template: "/studies/{study}/series/{series}/instances/{instance}/metadata?caseId={caseId}",
		description: "Retrieves the metadata of an instance (WADO-RS)",
		segments: &[Literal("studies"), Param, Literal("series"), Param, Literal("instances"), Param, Literal("metadata")],
		build: |mut params| Route::InstanceMetadata(ResourceQuery::take(&mut params)),
	},
	RouteEntry {
		method: Method::GET,
		template: "/studies/{study}/series/{series}/instances/{instance}/frames/{frames}?caseId={caseId}",
		description: "Retrieves the whole file of an instance; frames are not extracted (WADO-RS)",
		segments: &[Literal("studies"), Param, Literal("series"), Param, Literal("instances"), Param, Literal("frames"), Param],
		build: |mut params| {
			let query = ResourceQuery::take(&mut params);
			Route::RetrieveFrames(query, params.next().unwrap_or_default())
		},
	},
];

/// Matches a path against [`ROUTES`]. Unknown paths resolve to [`Route::Fallback`].
pub fn route(method: &Method, path: &str) -> Route {
	let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
	ROUTES
		.iter()
		.find_map(|entry| {
			entry
				.matches(method, &segments)
				.map(|params| (entry.build)(params.into_iter()))
		})
		.unwrap_or(Route::Fallback)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutedRequest {
	pub route: Route,
	pub case_id: Option<String>,
}

impl RoutedRequest {
	/// Resolves the route and the case id of a request.
	///
	/// The case id is taken from the query. If it is missing there, the path is searched for an
	/// embedded `caseId=` fragment, which is removed from the path before matching.
	pub fn parse(method: &Method, uri: &Uri, base_path: &str) -> Self {
		let mut path = strip_base_path(uri.path(), base_path).to_owned();
		let mut case_id = uri.query().and_then(case_id_from_query);

		if case_id.is_none() {
			if let Some((embedded, stripped)) = extract_embedded_case_id(&path) {
				case_id = Some(embedded);
				path = stripped;
			}
		}

		Self {
			route: route(method, &path),
			case_id,
		}
	}
}

fn strip_base_path<'a>(path: &'a str, base_path: &str) -> &'a str {
	let base_path = base_path.trim_end_matches('/');
	if base_path.is_empty() {
		return path;
	}
	match path.strip_prefix(base_path) {
		Some(rest) if rest.is_empty() || rest.starts_with('/') => rest,
		_ => path,
	}
}

fn case_id_from_query(query: &str) -> Option<String> {
	url::form_urlencoded::parse(query.as_bytes())
		.find(|(key, _)| key == CASE_ID_PARAMETER)
		.map(|(_, value)| value.into_owned())
		.filter(|value| !value.is_empty())
}

/// Returns the embedded case id and the path without the `caseId=<id>` fragment.
fn extract_embedded_case_id(path: &str) -> Option<(String, String)> {
	let start = path.find(EMBEDDED_CASE_ID)?;
	let value_start = start + EMBEDDED_CASE_ID.len();
	let value_end = path[value_start..]
		.find(|c: char| matches!(c, '/' | '&' | '?' | ';'))
		.map_or(path.len(), |offset| value_start + offset);
	let value = &path[value_start..value_end];
	if value.is_empty() {
		return None;
	}

	let before = &path[..start];
	let cut = if before.ends_with(|c: char| matches!(c, '?' | '&' | ';')) {
		start - 1
	} else if ["%3F", "%3f", "%26"].iter().any(|s| before.ends_with(s)) {
		start - 3
	} else {
		start
	};

	let stripped = format!("{}{}", &path[..cut], &path[value_end..]);
	Some((value.to_owned(), stripped))
}
