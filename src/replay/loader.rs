// SPDX-License-Identifier: MIT

//! Document loader - JSON and YAML files
//!
//! Process definitions, snapshots, step logs, form definitions and value maps
//! can all be kept on disk. The format follows the file extension; files
//! without a known extension are tried as JSON first, then YAML.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::fs;
use std::path::Path;

use super::execution::{ExecutionSnapshot, ExecutionStep};
use super::form::{FieldDefinition, FormDefinition};
use super::formula::FieldValues;
use super::graph::ProcessDefinition;
use crate::runtime::ReplayError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    Yaml,
    Unknown,
}

impl Format {
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("json") => Format::Json,
            Some("yaml") | Some("yml") => Format::Yaml,
            _ => Format::Unknown,
        }
    }
}

/// A step log stored either as a bare list or under a `steps` key
#[derive(Deserialize)]
#[serde(untagged)]
enum StepsDocument {
    List(Vec<ExecutionStep>),
    Wrapped { steps: Vec<ExecutionStep> },
}

/// Form fields stored either as a full form or as a bare list
#[derive(Deserialize)]
#[serde(untagged)]
enum FieldsDocument {
    Form(FormDefinition),
    List(Vec<FieldDefinition>),
}

/// Loads documents from JSON or YAML files
pub struct DocumentLoader;

impl DocumentLoader {
    pub fn new() -> Self {
        Self
    }

    /// Load any deserializable document
    pub fn load<T, P>(&self, path: P) -> Result<T, ReplayError>
    where
        T: DeserializeOwned,
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        log::debug!("Loaded {} ({} bytes)", path.display(), content.len());
        Self::parse(&content, Format::from_path(path))
    }

    pub fn parse<T: DeserializeOwned>(content: &str, format: Format) -> Result<T, ReplayError> {
        match format {
            Format::Json => Ok(serde_json::from_str(content)?),
            Format::Yaml => Ok(serde_yaml::from_str(content)?),
            Format::Unknown => match serde_json::from_str(content) {
                Ok(doc) => Ok(doc),
                Err(_) => Ok(serde_yaml::from_str(content)?),
            },
        }
    }

    pub fn load_definition<P: AsRef<Path>>(
        &self,
        path: P,
    ) -> Result<ProcessDefinition, ReplayError> {
        self.load(path)
    }

    pub fn load_snapshot<P: AsRef<Path>>(&self, path: P) -> Result<ExecutionSnapshot, ReplayError> {
        self.load(path)
    }

    pub fn load_steps<P: AsRef<Path>>(&self, path: P) -> Result<Vec<ExecutionStep>, ReplayError> {
        Ok(match self.load(path)? {
            StepsDocument::List(steps) | StepsDocument::Wrapped { steps } => steps,
        })
    }

    pub fn load_form<P: AsRef<Path>>(&self, path: P) -> Result<FormDefinition, ReplayError> {
        Ok(match self.load(path)? {
            FieldsDocument::Form(form) => form,
            FieldsDocument::List(fields) => FormDefinition {
                title: String::new(),
                fields,
            },
        })
    }

    pub fn load_values<P: AsRef<Path>>(&self, path: P) -> Result<FieldValues, ReplayError> {
        self.load(path)
    }

    /// Arbitrary profile document used for prefill
    pub fn load_profile<P: AsRef<Path>>(&self, path: P) -> Result<Value, ReplayError> {
        self.load(path)
    }
}

impl Default for DocumentLoader {
    fn default() -> Self {
        Self::new()
    }
}
