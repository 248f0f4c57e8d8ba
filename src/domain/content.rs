//! Content records: categories, topics and their identifiers.
//!
//! Raw records mirror the authored content files and keep loosely typed
//! fields as JSON values, so a wrong type surfaces as a validation error
//! rather than a parse failure. Validated records are strongly typed.

use std::borrow::Borrow;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Topic identifier, unique across the whole catalog
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TopicId(String);

impl TopicId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the raw string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for TopicId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TopicId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl std::fmt::Display for TopicId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(&self.0)
    }
}

/// Category identifier, unique across the whole catalog
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryId(String);

impl CategoryId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the raw string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for CategoryId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for CategoryId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl std::fmt::Display for CategoryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(&self.0)
    }
}

/// Difficulty tier of a topic. Parsing is case-insensitive everywhere,
/// including deserialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Advanced,
}

impl Difficulty {
    /// All tiers, easiest first
    pub const ALL: [Difficulty; 3] = [
        Difficulty::Beginner,
        Difficulty::Intermediate,
        Difficulty::Advanced,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Beginner => "Beginner",
            Difficulty::Intermediate => "Intermediate",
            Difficulty::Advanced => "Advanced",
        }
    }
}

impl std::fmt::Display for Difficulty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// A difficulty string outside the closed set of tiers
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown difficulty: {0} (expected Beginner, Intermediate or Advanced)")]
pub struct UnknownDifficulty(pub String);

impl std::str::FromStr for Difficulty {
    type Err = UnknownDifficulty;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "beginner" => Ok(Difficulty::Beginner),
            "intermediate" => Ok(Difficulty::Intermediate),
            "advanced" => Ok(Difficulty::Advanced),
            _ => Err(UnknownDifficulty(s.to_string())),
        }
    }
}

impl TryFrom<String> for Difficulty {
    type Error = UnknownDifficulty;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// Presentation hints, carried through untouched
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Presentation {
    /// Icon name
    pub icon: Option<String>,

    /// Color gradient stops
    #[serde(default)]
    pub gradient: Vec<String>,

    /// Optional header image
    pub image: Option<String>,
}

/// A validated topic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    pub id: TopicId,
    pub title: String,
    pub body: String,

    /// Ordered key points (may be empty)
    #[serde(default)]
    pub key_points: Vec<String>,

    pub difficulty: Difficulty,

    /// Estimated read time label, e.g. "5 min read"
    pub read_time: Option<String>,

    /// Supplementary short facts (may be empty)
    #[serde(default)]
    pub facts: Vec<String>,

    /// Authored default lock state. This is the initial per-user state,
    /// never a live flag.
    #[serde(default)]
    pub locked: bool,
}

/// An indexed category. Topics live in the catalog arena and are
/// referenced here by id, in display order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub title: String,
    pub description: String,
    pub presentation: Presentation,
    pub topic_ids: Vec<TopicId>,
}

impl Category {
    /// Number of topics in this category
    pub fn len(&self) -> usize {
        self.topic_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.topic_ids.is_empty()
    }
}

// ============================================================================
// Raw records (as authored)
// ============================================================================

/// A category record as authored. Every field is kept as a JSON value so
/// that a wrong type is reported by the validator instead of failing the
/// whole document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCategory {
    pub id: Option<Value>,
    pub title: Option<Value>,
    pub description: Option<Value>,
    pub icon: Option<Value>,

    /// A single color or a list of gradient stops
    #[serde(alias = "color")]
    pub gradient: Option<Value>,

    pub image: Option<Value>,

    /// Expected to be a list of topic objects
    pub topics: Option<Value>,
}

/// A topic record as authored
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTopic {
    pub id: Option<Value>,
    pub title: Option<Value>,

    #[serde(alias = "content")]
    pub body: Option<Value>,

    pub key_points: Option<Value>,
    pub difficulty: Option<Value>,
    pub read_time: Option<Value>,
    pub facts: Option<Value>,
    pub locked: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_difficulty_from_str() {
        assert_eq!("Beginner".parse::<Difficulty>().unwrap(), Difficulty::Beginner);
        assert_eq!("ADVANCED".parse::<Difficulty>().unwrap(), Difficulty::Advanced);
        assert_eq!(
            "intermediate".parse::<Difficulty>().unwrap(),
            Difficulty::Intermediate
        );
        assert!("Begginer".parse::<Difficulty>().is_err());
        assert!("expert".parse::<Difficulty>().is_err());
    }

    #[test]
    fn test_difficulty_deserializes_like_from_str() {
        let parsed: Vec<Difficulty> =
            serde_json::from_str(r#"["advanced", "Beginner", "INTERMEDIATE"]"#).unwrap();
        assert_eq!(
            parsed,
            vec![
                Difficulty::Advanced,
                Difficulty::Beginner,
                Difficulty::Intermediate
            ]
        );
        assert!(serde_json::from_str::<Difficulty>(r#""expert""#).is_err());

        // Serialized form stays canonical
        assert_eq!(
            serde_json::to_string(&Difficulty::Advanced).unwrap(),
            r#""Advanced""#
        );
    }

    #[test]
    fn test_wrongly_typed_fields_still_deserialize() {
        let raw: RawCategory = serde_json::from_str(
            r#"{"id": 101, "title": ["x"], "topics": "none", "icon": false}"#,
        )
        .unwrap();

        assert_eq!(raw.id, Some(Value::from(101)));
        assert!(raw.title.as_ref().is_some_and(Value::is_array));
        assert_eq!(raw.topics, Some(Value::from("none")));
    }

    #[test]
    fn test_ids_borrow_as_str() {
        let mut map = HashMap::new();
        map.insert(TopicId::new("plate-tectonics"), 1);

        assert_eq!(map.get("plate-tectonics"), Some(&1));
        assert_eq!(TopicId::from("t1").to_string(), "t1");
    }

    #[test]
    fn test_raw_topic_accepts_authored_field_names() {
        let raw: RawTopic = serde_json::from_str(
            r#"{
                "id": "t1",
                "title": "Volcanoes",
                "content": "Molten rock rises.",
                "keyPoints": ["Magma", "Lava"],
                "difficulty": "Beginner",
                "readTime": "4 min read"
            }"#,
        )
        .unwrap();

        assert_eq!(raw.body.as_ref().and_then(Value::as_str), Some("Molten rock rises."));
        assert_eq!(
            raw.key_points.as_ref().and_then(Value::as_array).map(Vec::len),
            Some(2)
        );
        assert_eq!(raw.read_time.as_ref().and_then(Value::as_str), Some("4 min read"));
        assert!(raw.locked.is_none());
    }
}
