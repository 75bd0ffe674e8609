//! Evaluation response returned by the horizon service.
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Declared type of a toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToggleType {
    /// `true` or `false`.
    Boolean,
    /// A string.
    String,
    /// An integer or floating-point number.
    Number,
    /// A JSON object, possibly encoded as a string.
    Object,
}

impl ToggleType {
    /// Name of the type as used on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            ToggleType::Boolean => "boolean",
            ToggleType::String => "string",
            ToggleType::Number => "number",
            ToggleType::Object => "object",
        }
    }
}

/// A single evaluated toggle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Evaluation {
    /// Toggle key. Filled from the response map key when the server omits it.
    #[serde(default)]
    pub key: String,
    /// Raw value, not yet checked against `toggle_type`.
    #[serde(default)]
    pub value: serde_json::Value,
    /// Declared type.
    #[serde(rename = "type")]
    pub toggle_type: ToggleType,
    /// Why this value was chosen.
    #[serde(default)]
    pub reason: Option<String>,
    /// Set when the server failed to evaluate this toggle.
    #[serde(default)]
    pub error_message: Option<String>,
    /// Variant name.
    #[serde(default)]
    pub variant: Option<String>,
}

/// All toggles evaluated for one context.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EvaluationResponse {
    /// Evaluations keyed by toggle key.
    pub toggles: HashMap<String, Evaluation>,
}

impl EvaluationResponse {
    /// Parse a response body.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ResponseParse`] if the body is not a valid evaluation response.
    pub fn from_json(body: &str) -> Result<EvaluationResponse> {
        let mut response: EvaluationResponse =
            serde_json::from_str(body).map_err(|err| Error::ResponseParse(err.into()))?;

        for (key, evaluation) in response.toggles.iter_mut() {
            if evaluation.key.is_empty() {
                evaluation.key.clone_from(key);
            }
        }

        Ok(response)
    }

    /// Get the evaluation for `key`.
    pub fn get(&self, key: &str) -> Option<&Evaluation> {
        self.toggles.get(key)
    }
}
