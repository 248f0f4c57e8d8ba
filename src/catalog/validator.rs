//! Schema validation for raw content records.
//!
//! Validation is pure and exhaustive: every record is checked and every
//! problem is reported, so one run yields the complete list. Any error is
//! fatal; there is no partial catalog.
//!
//! Checks:
//! - Category id present, non-blank, unique across categories
//! - Category title/description non-blank, topics non-empty
//! - Topic id present, non-blank, unique across the entire catalog
//! - Topic title/body non-blank
//! - Difficulty is one of the closed set of tiers (never coerced)
//! - Key points and facts, when present, are lists of non-blank strings
//! - Lock flag, when present, is a boolean
//! - Every text field holds a string; a wrong type is reported like any
//!   other violation

use std::collections::HashMap;

use serde_json::Value;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::domain::{
    CategoryId, Difficulty, Presentation, RawCategory, RawTopic, Topic, TopicId,
};

/// Why a field failed validation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationIssue {
    #[error("is missing")]
    Missing,

    #[error("is blank")]
    Blank,

    #[error("must not be empty")]
    Empty,

    #[error("duplicates the id first seen at {first_seen}")]
    Duplicate { first_seen: String },

    #[error("has unknown difficulty '{0}' (expected Beginner, Intermediate or Advanced)")]
    UnknownDifficulty(String),

    #[error("must be a boolean, got {0}")]
    NotABoolean(&'static str),

    #[error("must be a string, got {0}")]
    NotAString(&'static str),

    #[error("must be a list, got {0}")]
    NotAList(&'static str),

    #[error("must be an object, got {0}")]
    NotAnObject(&'static str),
}

/// A single schema violation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{record_path}.{field} {reason}")]
pub struct ValidationError {
    /// Locator of the offending record, e.g. `categories[0].topics[3]`
    pub record_path: String,

    /// Field name as authored
    pub field: String,

    pub reason: ValidationIssue,
}

/// Every violation found in one validation run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrorList(Vec<ValidationError>);

impl ValidationErrorList {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ValidationError> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[ValidationError] {
        &self.0
    }

    pub fn into_inner(self) -> Vec<ValidationError> {
        self.0
    }
}

impl std::fmt::Display for ValidationErrorList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Content failed validation with {} error(s)", self.0.len())?;
        for error in &self.0 {
            write!(f, "\n  - {}", error)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrorList {}

impl<'a> IntoIterator for &'a ValidationErrorList {
    type Item = &'a ValidationError;
    type IntoIter = std::slice::Iter<'a, ValidationError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// A category that passed validation, still owning its topics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedCategory {
    pub id: CategoryId,
    pub title: String,
    pub description: String,
    pub presentation: Presentation,
    pub topics: Vec<Topic>,
}

/// Input the catalog index may trust. Only [`validate`] produces it.
#[derive(Debug, Clone)]
pub struct ValidatedCatalogInput {
    pub(crate) release: String,
    pub(crate) categories: Vec<ValidatedCategory>,
}

impl ValidatedCatalogInput {
    /// Release fingerprint of the raw content
    pub fn release(&self) -> &str {
        &self.release
    }

    pub fn categories(&self) -> &[ValidatedCategory] {
        &self.categories
    }

    /// Total number of topics across all categories
    pub fn topic_count(&self) -> usize {
        self.categories.iter().map(|c| c.topics.len()).sum()
    }
}

/// Validate raw categories, returning either trusted input or the full
/// list of violations.
pub fn validate(raw: &[RawCategory]) -> Result<ValidatedCatalogInput, ValidationErrorList> {
    let mut validator = Validator::default();

    let categories: Vec<ValidatedCategory> = raw
        .iter()
        .enumerate()
        .filter_map(|(index, category)| validator.category(index, category))
        .collect();

    if !validator.errors.is_empty() {
        tracing::debug!(
            errors = validator.errors.len(),
            "Content rejected by schema validation"
        );
        return Err(ValidationErrorList(validator.errors));
    }

    Ok(ValidatedCatalogInput {
        release: release_fingerprint(raw),
        categories,
    })
}

/// Fingerprint a content snapshot (first 16 hex chars of SHA256 over its
/// canonical JSON encoding)
pub fn release_fingerprint(raw: &[RawCategory]) -> String {
    let bytes = serde_json::to_vec(raw).unwrap_or_default();
    let digest = Sha256::digest(&bytes);
    hex::encode(&digest[..8])
}

#[derive(Default)]
struct Validator {
    errors: Vec<ValidationError>,
    /// category id -> path where first seen
    category_ids: HashMap<String, String>,
    /// topic id -> path where first seen
    topic_ids: HashMap<String, String>,
}

impl Validator {
    fn push(&mut self, path: &str, field: &str, reason: ValidationIssue) {
        self.errors.push(ValidationError {
            record_path: path.to_string(),
            field: field.to_string(),
            reason,
        });
    }

    fn category(&mut self, index: usize, raw: &RawCategory) -> Option<ValidatedCategory> {
        let errors_before = self.errors.len();
        let path = format!("categories[{}]", index);

        let id = self.required(&path, "id", raw.id.as_ref());
        if let Some(id) = id {
            Self::claim(&mut self.category_ids, &mut self.errors, &path, id);
        }
        let title = self.required(&path, "title", raw.title.as_ref());
        let description = self.required(&path, "description", raw.description.as_ref());

        let mut topics = Vec::new();
        match &raw.topics {
            None | Some(Value::Null) => self.push(&path, "topics", ValidationIssue::Missing),
            Some(Value::Array(list)) if list.is_empty() => {
                self.push(&path, "topics", ValidationIssue::Empty)
            }
            Some(Value::Array(list)) => {
                // Topics are checked even when the category itself is broken
                // so the report stays complete.
                for (topic_index, value) in list.iter().enumerate() {
                    let raw_topic = match value {
                        Value::Object(_) => serde_json::from_value::<RawTopic>(value.clone()).ok(),
                        _ => None,
                    };
                    match raw_topic {
                        Some(raw_topic) => {
                            let topic_path = format!("{}.topics[{}]", path, topic_index);
                            if let Some(topic) = self.topic(&topic_path, &raw_topic) {
                                topics.push(topic);
                            }
                        }
                        None => self.push(
                            &path,
                            &format!("topics[{}]", topic_index),
                            ValidationIssue::NotAnObject(json_type_name(value)),
                        ),
                    }
                }
            }
            Some(other) => self.push(
                &path,
                "topics",
                ValidationIssue::NotAList(json_type_name(other)),
            ),
        }

        if self.errors.len() != errors_before {
            return None;
        }

        Some(ValidatedCategory {
            id: CategoryId::new(id?),
            title: title?.to_string(),
            description: description?.to_string(),
            presentation: Presentation {
                icon: hint(raw.icon.as_ref()),
                gradient: gradient_stops(raw.gradient.as_ref()),
                image: hint(raw.image.as_ref()),
            },
            topics,
        })
    }

    fn topic(&mut self, path: &str, raw: &RawTopic) -> Option<Topic> {
        let errors_before = self.errors.len();

        let id = self.required(path, "id", raw.id.as_ref());
        if let Some(id) = id {
            Self::claim(&mut self.topic_ids, &mut self.errors, path, id);
        }
        let title = self.required(path, "title", raw.title.as_ref());
        let body = self.required(path, "body", raw.body.as_ref());

        let difficulty = match &raw.difficulty {
            None | Some(Value::Null) => {
                self.push(path, "difficulty", ValidationIssue::Missing);
                None
            }
            Some(Value::String(s)) => match s.parse::<Difficulty>() {
                Ok(difficulty) => Some(difficulty),
                Err(_) => {
                    self.push(
                        path,
                        "difficulty",
                        ValidationIssue::UnknownDifficulty(s.clone()),
                    );
                    None
                }
            },
            Some(other) => {
                self.push(
                    path,
                    "difficulty",
                    ValidationIssue::NotAString(json_type_name(other)),
                );
                None
            }
        };

        let read_time = self.optional(path, "readTime", raw.read_time.as_ref());
        let key_points = self.string_list(path, "keyPoints", raw.key_points.as_ref());
        let facts = self.string_list(path, "facts", raw.facts.as_ref());

        let locked = match &raw.locked {
            None | Some(Value::Null) => false,
            Some(Value::Bool(locked)) => *locked,
            Some(other) => {
                self.push(
                    path,
                    "locked",
                    ValidationIssue::NotABoolean(json_type_name(other)),
                );
                false
            }
        };

        if self.errors.len() != errors_before {
            return None;
        }

        Some(Topic {
            id: TopicId::new(id?),
            title: title?.to_string(),
            body: body?.to_string(),
            key_points,
            difficulty: difficulty?,
            read_time,
            facts,
            locked,
        })
    }

    /// A required, non-blank string field
    fn required<'r>(
        &mut self,
        path: &str,
        field: &str,
        value: Option<&'r Value>,
    ) -> Option<&'r str> {
        match value {
            None | Some(Value::Null) => {
                self.push(path, field, ValidationIssue::Missing);
                None
            }
            Some(Value::String(s)) if s.trim().is_empty() => {
                self.push(path, field, ValidationIssue::Blank);
                None
            }
            Some(Value::String(s)) => Some(s.as_str()),
            Some(other) => {
                self.push(path, field, ValidationIssue::NotAString(json_type_name(other)));
                None
            }
        }
    }

    /// An optional string field; absent and null are the same
    fn optional(&mut self, path: &str, field: &str, value: Option<&Value>) -> Option<String> {
        match value {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(other) => {
                self.push(path, field, ValidationIssue::NotAString(json_type_name(other)));
                None
            }
        }
    }

    /// An optional list whose entries must all be non-blank strings
    fn string_list(&mut self, path: &str, field: &str, value: Option<&Value>) -> Vec<String> {
        let values = match value {
            None | Some(Value::Null) => return Vec::new(),
            Some(Value::Array(values)) => values,
            Some(other) => {
                self.push(path, field, ValidationIssue::NotAList(json_type_name(other)));
                return Vec::new();
            }
        };

        let mut out = Vec::new();
        for (index, value) in values.iter().enumerate() {
            let entry_field = format!("{}[{}]", field, index);
            match value {
                Value::String(s) if s.trim().is_empty() => {
                    self.push(path, &entry_field, ValidationIssue::Blank);
                }
                Value::String(s) => out.push(s.clone()),
                other => {
                    self.push(
                        path,
                        &entry_field,
                        ValidationIssue::NotAString(json_type_name(other)),
                    );
                }
            }
        }
        out
    }

    /// Register an id, flagging it if an earlier record already owns it
    fn claim(
        seen: &mut HashMap<String, String>,
        errors: &mut Vec<ValidationError>,
        path: &str,
        id: &str,
    ) {
        if let Some(first_seen) = seen.get(id) {
            errors.push(ValidationError {
                record_path: path.to_string(),
                field: "id".to_string(),
                reason: ValidationIssue::Duplicate {
                    first_seen: first_seen.clone(),
                },
            });
        } else {
            seen.insert(id.to_string(), path.to_string());
        }
    }
}

/// Presentation is out of scope for validation: anything that is not a
/// string (or list of strings, for gradients) is dropped.
fn hint(value: Option<&Value>) -> Option<String> {
    value.and_then(Value::as_str).map(str::to_string)
}

fn gradient_stops(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::String(s)) => vec![s.clone()],
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
