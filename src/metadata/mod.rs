//! Synthesized DICOM attributes for the study, series and instance levels.

mod attributes;

pub use attributes::Attributes;

use crate::case::CaseRecord;
use crate::identity::CaseIdentity;
use crate::types::{IS, US};
use dicom::core::VR;
use dicom::dictionary_std::{tags, uids};

/// Every instance is announced as a Secondary Capture image.
pub const SOP_CLASS_UID: &str = uids::SECONDARY_CAPTURE_IMAGE_STORAGE;
pub const TRANSFER_SYNTAX_UID: &str = uids::EXPLICIT_VR_LITTLE_ENDIAN;
/// "Other"
pub const MODALITY: &str = "OT";
pub const DEFAULT_STUDY_DESCRIPTION: &str = "Case study";
pub const SERIES_DESCRIPTION: &str = "Case files";
pub const SERIES_NUMBER: IS = 1;
/// Cases carry no series information, so each study has exactly one series.
pub const SERIES_PER_STUDY: IS = 1;

/// Image geometry reported for every instance.
///
/// The files are never parsed, so these values are placeholders that only signal that an image
/// exists. Clients must take rows, columns and bit depth from the headers of the retrieved file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaceholderGeometry {
	pub rows: US,
	pub columns: US,
	pub bits_allocated: US,
}

pub const PLACEHOLDER_GEOMETRY: PlaceholderGeometry = PlaceholderGeometry {
	rows: 512,
	columns: 512,
	bits_allocated: 16,
};

pub struct MetadataSynthesizer<'a> {
	case: &'a CaseRecord,
	identity: &'a CaseIdentity,
	instance_count: IS,
}

impl<'a> MetadataSynthesizer<'a> {
	pub fn new(case: &'a CaseRecord, identity: &'a CaseIdentity, instance_count: usize) -> Self {
		Self {
			case,
			identity,
			instance_count: IS::try_from(instance_count).unwrap_or(IS::MAX),
		}
	}

	pub fn study(&self) -> Attributes {
		let (study_date, study_time) = self
			.case
			.uploaded_at
			.map(|uploaded_at| {
				(
					uploaded_at.format("%Y%m%d").to_string(),
					uploaded_at.format("%H%M%S").to_string(),
				)
			})
			.unwrap_or_default();
		let description = if self.case.clinical_question.trim().is_empty() {
			DEFAULT_STUDY_DESCRIPTION
		} else {
			self.case.clinical_question.as_str()
		};
		let birth_date = self
			.case
			.patient_birth_date
			.map(|date| date.format("%Y%m%d").to_string())
			.unwrap_or_default();

		Attributes::new()
			.with_string(
				tags::STUDY_INSTANCE_UID,
				VR::UI,
				&self.identity.study_instance_uid,
			)
			.with_string(tags::STUDY_DATE, VR::DA, study_date)
			.with_string(tags::STUDY_TIME, VR::TM, study_time)
			.with_string(tags::ACCESSION_NUMBER, VR::SH, &self.case.id)
			.with_string(tags::STUDY_DESCRIPTION, VR::LO, description)
			.with_string(tags::MODALITIES_IN_STUDY, VR::CS, MODALITY)
			.with_person_name(tags::PATIENT_NAME, &self.case.patient_name)
			.with_string(tags::PATIENT_ID, VR::LO, &self.case.patient_id)
			.with_string(tags::PATIENT_BIRTH_DATE, VR::DA, birth_date)
			.with_integer(
				tags::NUMBER_OF_STUDY_RELATED_SERIES,
				VR::IS,
				SERIES_PER_STUDY,
			)
			.with_integer(
				tags::NUMBER_OF_STUDY_RELATED_INSTANCES,
				VR::IS,
				self.instance_count,
			)
	}

	pub fn series(&self) -> Attributes {
		Attributes::new()
			.with_string(
				tags::STUDY_INSTANCE_UID,
				VR::UI,
				&self.identity.study_instance_uid,
			)
			.with_string(
				tags::SERIES_INSTANCE_UID,
				VR::UI,
				&self.identity.series_instance_uid,
			)
			.with_integer(tags::SERIES_NUMBER, VR::IS, SERIES_NUMBER)
			.with_string(tags::SERIES_DESCRIPTION, VR::LO, SERIES_DESCRIPTION)
			.with_string(tags::MODALITY, VR::CS, MODALITY)
			.with_integer(
				tags::NUMBER_OF_SERIES_RELATED_INSTANCES,
				VR::IS,
				self.instance_count,
			)
	}

	/// The attributes of the instance at the given 1-based position.
	pub fn instance(&self, ordinal: usize) -> Attributes {
		Attributes::new()
			.with_string(
				tags::STUDY_INSTANCE_UID,
				VR::UI,
				&self.identity.study_instance_uid,
			)
			.with_string(
				tags::SERIES_INSTANCE_UID,
				VR::UI,
				&self.identity.series_instance_uid,
			)
			.with_string(
				tags::SOP_INSTANCE_UID,
				VR::UI,
				self.identity.sop_instance_uid(ordinal),
			)
			.with_string(tags::SOP_CLASS_UID, VR::UI, SOP_CLASS_UID)
			.with_string(tags::TRANSFER_SYNTAX_UID, VR::UI, TRANSFER_SYNTAX_UID)
			.with_integer(
				tags::INSTANCE_NUMBER,
				VR::IS,
				IS::try_from(ordinal).unwrap_or(IS::MAX),
			)
			.with_integer(tags::ROWS, VR::US, PLACEHOLDER_GEOMETRY.rows.into())
			.with_integer(tags::COLUMNS, VR::US, PLACEHOLDER_GEOMETRY.columns.into())
			.with_integer(
				tags::BITS_ALLOCATED,
				VR::US,
				PLACEHOLDER_GEOMETRY.bits_allocated.into(),
			)
	}

	/// Study, series and instance attributes combined, as returned by WADO-RS metadata.
	pub fn instance_metadata(&self, ordinal: usize) -> Attributes {
		self.study()
			.merge(self.series())
			.merge(self.instance(ordinal))
	}
}
