use chrono::{DateTime, NaiveDate, Utc};

/// A case as stored by the case-management system.
///
/// The gateway never writes cases. Every request reads the current row again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseRecord {
	pub id: String,
	pub patient_name: String,
	/// The internal patient identifier assigned by the case-management system.
	pub patient_id: String,
	pub patient_birth_date: Option<NaiveDate>,
	pub clinical_question: String,
	pub uploaded_at: Option<DateTime<Utc>>,
	/// Storage path of the uploaded file. May point at a single file or a folder.
	pub file_path: Option<String>,
}
