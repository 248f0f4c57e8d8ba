//! Immutable, indexed catalog for one content release.
//!
//! Topics live in a single arena in authored order (category by category).
//! Every lookup structure points into that arena and is built in one pass,
//! so they cannot disagree with each other.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use super::validator::ValidatedCatalogInput;
use crate::domain::{Category, CategoryId, Difficulty, Topic, TopicId};

/// A topic together with its owning category
#[derive(Debug, Clone)]
pub struct CatalogEntry {
    pub topic: Topic,
    pub category_id: CategoryId,
    pub(crate) keys: SearchKeys,
}

/// Lowercased text used for matching, computed once at build time
#[derive(Debug, Clone)]
pub(crate) struct SearchKeys {
    pub(crate) title: String,
    pub(crate) body: String,
    pub(crate) key_points: Vec<String>,
}

impl SearchKeys {
    fn for_topic(topic: &Topic) -> Self {
        Self {
            title: topic.title.to_lowercase(),
            body: topic.body.to_lowercase(),
            key_points: topic.key_points.iter().map(|k| k.to_lowercase()).collect(),
        }
    }
}

/// Summary counts for a catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogStats {
    pub release: String,
    pub categories: usize,
    pub topics: usize,

    /// Topics whose authored default is locked
    pub locked_by_default: usize,

    pub by_difficulty: BTreeMap<Difficulty, usize>,
}

/// The validated, indexed content of one release
#[derive(Debug, Clone)]
pub struct Catalog {
    release: String,

    /// Categories in display order
    categories: Vec<Category>,

    /// Topic arena in catalog order
    entries: Vec<CatalogEntry>,

    /// topic id -> arena position
    by_topic: HashMap<TopicId, usize>,

    /// category id -> position in `categories`
    by_category: HashMap<CategoryId, usize>,

    /// difficulty -> topic ids in catalog order
    by_difficulty: HashMap<Difficulty, Vec<TopicId>>,
}

impl Catalog {
    /// Build the index from validated input. Input is trusted and never
    /// re-validated.
    pub fn build(input: ValidatedCatalogInput) -> Self {
        let ValidatedCatalogInput {
            release,
            categories: validated,
        } = input;

        let topic_count = validated.iter().map(|c| c.topics.len()).sum();
        let mut categories = Vec::with_capacity(validated.len());
        let mut entries = Vec::with_capacity(topic_count);
        let mut by_topic = HashMap::with_capacity(topic_count);
        let mut by_category = HashMap::with_capacity(validated.len());
        let mut by_difficulty: HashMap<Difficulty, Vec<TopicId>> = HashMap::new();

        for category in validated {
            let mut topic_ids = Vec::with_capacity(category.topics.len());

            for topic in category.topics {
                by_topic.insert(topic.id.clone(), entries.len());
                by_difficulty
                    .entry(topic.difficulty)
                    .or_default()
                    .push(topic.id.clone());
                topic_ids.push(topic.id.clone());

                entries.push(CatalogEntry {
                    keys: SearchKeys::for_topic(&topic),
                    topic,
                    category_id: category.id.clone(),
                });
            }

            by_category.insert(category.id.clone(), categories.len());
            categories.push(Category {
                id: category.id,
                title: category.title,
                description: category.description,
                presentation: category.presentation,
                topic_ids,
            });
        }

        tracing::debug!(
            release = %release,
            categories = categories.len(),
            topics = entries.len(),
            "Catalog index built"
        );

        Self {
            release,
            categories,
            entries,
            by_topic,
            by_category,
            by_difficulty,
        }
    }

    /// Release fingerprint of the content this catalog was built from
    pub fn release(&self) -> &str {
        &self.release
    }

    /// Categories in display order
    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    /// Get a category by ID
    pub fn category(&self, id: &str) -> Option<&Category> {
        self.by_category.get(id).map(|&i| &self.categories[i])
    }

    /// Get a topic by ID
    pub fn topic(&self, id: &str) -> Option<&Topic> {
        self.entry(id).map(|e| &e.topic)
    }

    /// Get a topic and its owning category by topic ID
    pub fn entry(&self, id: &str) -> Option<&CatalogEntry> {
        self.by_topic.get(id).map(|&i| &self.entries[i])
    }

    /// Owning category of a topic
    pub fn category_of(&self, topic_id: &str) -> Option<&CategoryId> {
        self.entry(topic_id).map(|e| &e.category_id)
    }

    /// Topic IDs of a category in display order (empty for unknown IDs)
    pub fn topic_ids_in(&self, category_id: &str) -> &[TopicId] {
        self.category(category_id)
            .map(|c| c.topic_ids.as_slice())
            .unwrap_or_default()
    }

    /// Topic IDs at a difficulty tier, in catalog order
    pub fn topics_at(&self, difficulty: Difficulty) -> &[TopicId] {
        self.by_difficulty
            .get(&difficulty)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// All topics in catalog order
    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn contains_topic(&self, id: &str) -> bool {
        self.by_topic.contains_key(id)
    }

    /// Number of topics
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CatalogStats {
        CatalogStats {
            release: self.release.clone(),
            categories: self.categories.len(),
            topics: self.entries.len(),
            locked_by_default: self.entries.iter().filter(|e| e.topic.locked).count(),
            by_difficulty: Difficulty::ALL
                .iter()
                .map(|&d| (d, self.topics_at(d).len()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::validator::validate;
    use crate::domain::RawCategory;
    use serde_json::json;

    fn catalog() -> Catalog {
        let raw: Vec<RawCategory> = serde_json::from_value(json!([
            {"id": "earth", "title": "Earth", "description": "Our planet", "topics": [
                {"id": "t1", "title": "Rocks", "body": "Igneous", "difficulty": "Beginner"},
                {"id": "t2", "title": "Mantle", "body": "Hot", "difficulty": "Advanced",
                 "locked": true}
            ]},
            {"id": "space", "title": "Space", "description": "Up there", "topics": [
                {"id": "s1", "title": "Orbits", "body": "Round", "difficulty": "Intermediate"},
                {"id": "s2", "title": "Black Holes", "body": "Dense", "difficulty": "Advanced"}
            ]}
        ]))
        .unwrap();
        Catalog::build(validate(&raw).unwrap())
    }

    #[test]
    fn test_lookup_by_id() {
        let catalog = catalog();

        assert_eq!(catalog.len(), 4);
        assert_eq!(catalog.topic("s1").unwrap().title, "Orbits");
        assert_eq!(catalog.category_of("t2").unwrap().as_str(), "earth");
        assert!(catalog.topic("missing").is_none());
        assert!(catalog.category("missing").is_none());
    }

    #[test]
    fn test_display_order_preserved() {
        let catalog = catalog();

        let categories: Vec<_> = catalog.categories().iter().map(|c| c.id.as_str()).collect();
        assert_eq!(categories, vec!["earth", "space"]);

        let order: Vec<_> = catalog.entries().iter().map(|e| e.topic.id.as_str()).collect();
        assert_eq!(order, vec!["t1", "t2", "s1", "s2"]);

        let space: Vec<_> = catalog.topic_ids_in("space").iter().map(|t| t.as_str()).collect();
        assert_eq!(space, vec!["s1", "s2"]);
        assert!(catalog.topic_ids_in("missing").is_empty());
    }

    #[test]
    fn test_difficulty_index_is_consistent() {
        let catalog = catalog();

        let advanced: Vec<_> = catalog
            .topics_at(Difficulty::Advanced)
            .iter()
            .map(|t| t.as_str())
            .collect();
        assert_eq!(advanced, vec!["t2", "s2"]);

        for difficulty in Difficulty::ALL {
            for id in catalog.topics_at(difficulty) {
                assert_eq!(catalog.topic(id.as_str()).unwrap().difficulty, difficulty);
            }
        }
    }

    #[test]
    fn test_stats() {
        let stats = catalog().stats();

        assert_eq!(stats.categories, 2);
        assert_eq!(stats.topics, 4);
        assert_eq!(stats.locked_by_default, 1);
        assert_eq!(stats.by_difficulty[&Difficulty::Beginner], 1);
        assert_eq!(stats.by_difficulty[&Difficulty::Intermediate], 1);
        assert_eq!(stats.by_difficulty[&Difficulty::Advanced], 2);
    }
}
