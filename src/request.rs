//! The request boundary: a closed tagged union over the three phase payloads.
//!
//! Incoming traffic is `{"step": "...", "data": {...}}`. The step tag and the
//! payload shape are both resolved here, once, so the phase functions never
//! shape-guess an untyped value.

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::outline::{FieldIssue, OutlineStructure, summarize_issues};
use crate::store::CourseId;

/// A validated pipeline request, discriminated by its `step` tag.
#[derive(Clone, Debug, PartialEq)]
pub enum GenerationRequest {
    GenerateStructure(GenerateStructureRequest),
    ApproveStructure(ApproveStructureRequest),
    GenerateContent(GenerateContentRequest),
}

/// Phase-1 payload: draft an outline from a title and options.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GenerateStructureRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub use_web_search: bool,
    #[serde(default)]
    pub include_objectives: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_prompt: Option<String>,
}

/// Phase-2 payload: persist an approved outline.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ApproveStructureRequest {
    pub structure: OutlineStructure,
}

/// Phase-3 payload: expand every leaf of an approved outline into content.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub course_id: CourseId,
    pub structure: OutlineStructure,
    #[serde(default)]
    pub use_web_search: bool,
    #[serde(default)]
    pub include_quizzes: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_prompt: Option<String>,
}

/// Errors raised at the request boundary, before any phase runs.
#[derive(Debug, Error, Diagnostic)]
pub enum RequestError {
    #[error("unrecognized step: {step}")]
    #[diagnostic(
        code(courseforge::request::invalid_step),
        help("valid steps are generate_structure, approve_structure, and generate_content")
    )]
    InvalidStep { step: String },

    #[error("request validation failed: {}", summarize_issues(.issues))]
    #[diagnostic(code(courseforge::request::validation))]
    Validation { issues: Vec<FieldIssue> },
}

impl RequestError {
    pub fn issue(field: impl Into<String>, message: impl Into<String>) -> Self {
        RequestError::Validation {
            issues: vec![FieldIssue::new(field, message)],
        }
    }
}

impl GenerationRequest {
    pub const GENERATE_STRUCTURE: &'static str = "generate_structure";
    pub const APPROVE_STRUCTURE: &'static str = "approve_structure";
    pub const GENERATE_CONTENT: &'static str = "generate_content";

    /// Parse a raw `{"step": ..., "data": ...}` envelope.
    pub fn from_value(value: Value) -> Result<Self, RequestError> {
        let step = value
            .get("step")
            .and_then(Value::as_str)
            .ok_or_else(|| RequestError::issue("step", "missing or not a string"))?
            .to_string();
        let data = value.get("data").cloned().unwrap_or(Value::Null);
        if !data.is_object() {
            return Err(RequestError::issue("data", "missing or not an object"));
        }
        Self::from_step_and_data(&step, data)
    }

    /// Parse a payload for an already-extracted step tag.
    pub fn from_step_and_data(step: &str, data: Value) -> Result<Self, RequestError> {
        let request = match step {
            Self::GENERATE_STRUCTURE => {
                GenerationRequest::GenerateStructure(decode(data)?)
            }
            Self::APPROVE_STRUCTURE => GenerationRequest::ApproveStructure(decode(data)?),
            Self::GENERATE_CONTENT => GenerationRequest::GenerateContent(decode(data)?),
            other => {
                return Err(RequestError::InvalidStep {
                    step: other.to_string(),
                });
            }
        };
        request.validate()?;
        Ok(request)
    }

    /// Step tag of this request.
    pub fn step(&self) -> &'static str {
        match self {
            GenerationRequest::GenerateStructure(_) => Self::GENERATE_STRUCTURE,
            GenerationRequest::ApproveStructure(_) => Self::APPROVE_STRUCTURE,
            GenerationRequest::GenerateContent(_) => Self::GENERATE_CONTENT,
        }
    }

    /// Semantic validation beyond the serde shape check.
    pub fn validate(&self) -> Result<(), RequestError> {
        let issues = match self {
            GenerationRequest::GenerateStructure(request) => {
                let mut issues = Vec::new();
                if request.title.trim().is_empty() {
                    issues.push(FieldIssue::new("title", "must not be empty"));
                }
                issues
            }
            GenerationRequest::ApproveStructure(request) => {
                request.structure.validate().err().unwrap_or_default()
            }
            GenerationRequest::GenerateContent(request) => {
                request.structure.validate().err().unwrap_or_default()
            }
        };
        if issues.is_empty() {
            Ok(())
        } else {
            Err(RequestError::Validation { issues })
        }
    }
}

fn decode<T: serde::de::DeserializeOwned>(data: Value) -> Result<T, RequestError> {
    serde_json::from_value(data).map_err(|err| RequestError::issue("data", err.to_string()))
}
