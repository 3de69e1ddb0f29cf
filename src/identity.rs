//! Deterministic UIDs for the synthesized hierarchy.
//!
//! Nothing is stored: the same case id always yields the same study and series UIDs, and the
//! same storage state always yields the same instance UIDs.

use crate::types::UI;

/// Appended to the study UID to form the UID of the only series of a study.
pub const SERIES_SUFFIX: &str = ".1";

#[derive(Debug, Clone)]
pub struct UidGenerator {
	root: String,
}

impl UidGenerator {
	pub fn new(root: &str) -> Self {
		Self {
			root: root.trim_end_matches('.').to_owned(),
		}
	}

	/// Derives the study and series UIDs of a case. Dashes of the case id are stripped.
	pub fn identify(&self, case_id: &str) -> CaseIdentity {
		let study_instance_uid = format!("{}.{}", self.root, case_id.replace('-', ""));
		let series_instance_uid = format!("{study_instance_uid}{SERIES_SUFFIX}");
		CaseIdentity {
			study_instance_uid,
			series_instance_uid,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseIdentity {
	pub study_instance_uid: UI,
	pub series_instance_uid: UI,
}

impl CaseIdentity {
	/// The UID of the instance at the given 1-based position.
	pub fn sop_instance_uid(&self, ordinal: usize) -> UI {
		format!("{}.{ordinal}", self.series_instance_uid)
	}
}

/// Recovers the position from the last component of an instance UID.
pub fn parse_ordinal(sop_instance_uid: &str) -> Option<i64> {
	sop_instance_uid.rsplit('.').next()?.parse().ok()
}
