//! Ontology fragment as produced by the language-model collaborator.
//!
//! Keys are camelCase; the snake_case spellings emitted by the extraction
//! prompts (`data_properties`, `recommended_data_type`, ...) are accepted too.
//! Unknown keys such as `domain`, `scope` or `ambiguous_terms` are ignored.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use onto_core::{OntoError, OntoResult};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fragment {
    #[serde(default)]
    pub classes: Vec<ClassFragment>,
    #[serde(default, alias = "important_terms")]
    pub important_terms: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassFragment {
    pub name: String,
    #[serde(default)]
    pub instances: Vec<String>,
    #[serde(default, alias = "data_properties")]
    pub data_properties: Vec<DataPropertyFragment>,
    #[serde(default, alias = "object_properties")]
    pub object_properties: Vec<ObjectPropertyFragment>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataPropertyFragment {
    pub name: String,
    #[serde(alias = "recommended_data_type")]
    pub recommended_data_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectPropertyFragment {
    pub name: String,
    #[serde(default, alias = "recommended_domain")]
    pub recommended_domain: Vec<String>,
    #[serde(default, alias = "recommended_range")]
    pub recommended_range: Vec<String>,
}

fn malformed(e: serde_json::Error) -> OntoError {
    OntoError::Validation(format!("malformed fragment: {e}"))
}

fn non_blank(what: &str, value: &str, class: &str) -> OntoResult<()> {
    if value.trim().is_empty() {
        return Err(OntoError::Validation(format!(
            "blank {what} in class '{class}'"
        )));
    }
    Ok(())
}

impl Fragment {
    /// Decode and validate a fragment from a JSON value.
    pub fn from_value(value: Value) -> OntoResult<Self> {
        let fragment: Fragment = serde_json::from_value(value).map_err(malformed)?;
        fragment.validate()?;
        Ok(fragment)
    }

    /// Decode and validate a fragment from JSON text.
    pub fn from_json(text: &str) -> OntoResult<Self> {
        let fragment: Fragment = serde_json::from_str(text).map_err(malformed)?;
        fragment.validate()?;
        Ok(fragment)
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty() && self.important_terms.is_empty()
    }

    /// Every name and data type must be non-blank after trimming.
    pub fn validate(&self) -> OntoResult<()> {
        for class in &self.classes {
            if class.name.trim().is_empty() {
                return Err(OntoError::Validation("blank class name".to_string()));
            }
            let owner = class.name.trim();

            for instance in &class.instances {
                non_blank("instance name", instance, owner)?;
            }
            for dp in &class.data_properties {
                non_blank("data property name", &dp.name, owner)?;
                non_blank("recommendedDataType", &dp.recommended_data_type, owner)?;
            }
            for op in &class.object_properties {
                non_blank("object property name", &op.name, owner)?;
                for name in op.recommended_domain.iter().chain(&op.recommended_range) {
                    non_blank("domain/range name", name, owner)?;
                }
            }
        }
        Ok(())
    }
}
