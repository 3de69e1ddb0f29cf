use crate::types::IS;
use dicom::core::{Tag, VR};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;

/// A set of DICOM attributes in the JSON model of PS3.18 Annex F.
///
/// Serializes to `{"GGGGEEEE": {"vr": "..", "Value": [..]}}`, ordered by tag.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attributes(BTreeMap<Tag, Attribute>);

#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
	pub vr: VR,
	pub value: AttributeValue,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
	/// Zero-length attribute. Only the VR is serialized.
	Empty,
	Strings(Vec<String>),
	Integers(Vec<IS>),
	PersonName(String),
}

impl Attributes {
	pub fn new() -> Self {
		Self::default()
	}

	/// Adds a single string value. Empty strings become zero-length attributes.
	pub fn with_string(self, tag: Tag, vr: VR, value: impl Into<String>) -> Self {
		let value: String = value.into();
		let value = if value.is_empty() {
			AttributeValue::Empty
		} else {
			AttributeValue::Strings(vec![value])
		};
		self.with(tag, vr, value)
	}

	pub fn with_person_name(self, tag: Tag, value: impl Into<String>) -> Self {
		let value: String = value.into();
		let value = if value.is_empty() {
			AttributeValue::Empty
		} else {
			AttributeValue::PersonName(value)
		};
		self.with(tag, VR::PN, value)
	}

	pub fn with_integer(self, tag: Tag, vr: VR, value: IS) -> Self {
		self.with(tag, vr, AttributeValue::Integers(vec![value]))
	}

	/// Adds all attributes of `other`. Attributes of `other` replace existing ones.
	pub fn merge(mut self, other: Self) -> Self {
		self.0.extend(other.0);
		self
	}

	fn with(mut self, tag: Tag, vr: VR, value: AttributeValue) -> Self {
		self.0.insert(tag, Attribute { vr, value });
		self
	}
}

impl Serialize for Attributes {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		let mut map = serializer.serialize_map(Some(self.0.len()))?;
		for (tag, attribute) in &self.0 {
			map.serialize_entry(
				&format!("{:04X}{:04X}", tag.group(), tag.element()),
				attribute,
			)?;
		}
		map.end()
	}
}

#[derive(Serialize)]
struct PersonNameComponents<'a> {
	#[serde(rename = "Alphabetic")]
	alphabetic: &'a str,
}

impl Serialize for Attribute {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		let mut map = serializer.serialize_map(None)?;
		map.serialize_entry("vr", &self.vr.to_string())?;
		match &self.value {
			AttributeValue::Empty => {}
			AttributeValue::Strings(values) => map.serialize_entry("Value", values)?,
			AttributeValue::Integers(values) => map.serialize_entry("Value", values)?,
			AttributeValue::PersonName(name) => map.serialize_entry(
				"Value",
				&[PersonNameComponents { alphabetic: name }],
			)?,
		}
		map.end()
	}
}
