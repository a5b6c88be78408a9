// SPDX-License-Identifier: MIT

//! Form field definitions

use serde::{Deserialize, Serialize};

/// A form made of field definitions
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
pub struct FormDefinition {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub fields: Vec<FieldDefinition>,
}

/// Definition of a single form field
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct FieldDefinition {
    pub id: String,
    #[serde(default)]
    pub label: String,
    #[serde(rename = "type", default)]
    pub field_type: FieldType,
    #[serde(default)]
    pub required: bool,
    /// Value computed from other fields; always read-only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub derived: Option<DerivedSpec>,
    /// Value copied once from the requester's profile; always read-only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefill: Option<PrefillSpec>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct DerivedSpec {
    pub expression: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct PrefillSpec {
    /// Dot path into the profile document (e.g. `department.name`)
    #[serde(alias = "sourceKey")]
    pub source_key: String,
}

/// Supported field types
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    #[default]
    Text,
    Textarea,
    Number,
    Date,
    Select,
    Checkbox,
    Email,
    #[serde(other)]
    Other,
}

impl FieldDefinition {
    pub fn new(id: impl Into<String>, label: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            field_type,
            required: false,
            derived: None,
            prefill: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn derived(mut self, expression: impl Into<String>) -> Self {
        self.derived = Some(DerivedSpec {
            expression: expression.into(),
        });
        self
    }

    pub fn prefilled(mut self, source_key: impl Into<String>) -> Self {
        self.prefill = Some(PrefillSpec {
            source_key: source_key.into(),
        });
        self
    }

    pub fn is_derived(&self) -> bool {
        self.derived.is_some()
    }

    pub fn is_prefilled(&self) -> bool {
        self.prefill.is_some()
    }

    /// Derived and prefilled fields cannot be edited by the user
    pub fn is_read_only(&self) -> bool {
        self.is_derived() || self.is_prefilled()
    }
}
