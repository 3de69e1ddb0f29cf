use crate::backend::{CaseStore, CaseStoreError};
use crate::case::CaseRecord;
use crate::config::DatabaseConfig;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::FromRow;
use tracing::info;

// The id is compared as text so that malformed identifiers simply do not match.
const FIND_CASE: &str = r"
	SELECT
		id::text AS id,
		patient_name,
		patient_internal_id,
		patient_birth_date::date AS patient_birth_date,
		clinical_question,
		created_at,
		file_path
	FROM cases
	WHERE id::text = $1
";

pub struct PostgresCaseStore {
	pool: PgPool,
}

impl PostgresCaseStore {
	/// Creates a lazily connecting pool. No connection is opened before the first query.
	pub fn new(config: &DatabaseConfig) -> Result<Self, sqlx::Error> {
		let pool = PgPoolOptions::new()
			.max_connections(config.max_connections)
			.connect_lazy(&config.url)?;
		info!(
			max_connections = config.max_connections,
			"Configured case store pool"
		);
		Ok(Self { pool })
	}
}

#[derive(Debug, FromRow)]
struct CaseRow {
	id: String,
	patient_name: Option<String>,
	patient_internal_id: Option<String>,
	patient_birth_date: Option<NaiveDate>,
	clinical_question: Option<String>,
	created_at: Option<DateTime<Utc>>,
	file_path: Option<String>,
}

impl From<CaseRow> for CaseRecord {
	fn from(row: CaseRow) -> Self {
		Self {
			id: row.id,
			patient_name: row.patient_name.unwrap_or_default(),
			patient_id: row.patient_internal_id.unwrap_or_default(),
			patient_birth_date: row.patient_birth_date,
			clinical_question: row.clinical_question.unwrap_or_default(),
			uploaded_at: row.created_at,
			file_path: row.file_path.filter(|path| !path.is_empty()),
		}
	}
}

#[async_trait]
impl CaseStore for PostgresCaseStore {
	async fn find_case(&self, case_id: &str) -> Result<Option<CaseRecord>, CaseStoreError> {
		let row = sqlx::query_as::<_, CaseRow>(FIND_CASE)
			.bind(case_id)
			.fetch_optional(&self.pool)
			.await?;

		Ok(row.map(CaseRecord::from))
	}
}
