//! Keyword and facet queries against a catalog.
//!
//! All supplied criteria are combined with AND. Results are a lazy,
//! restartable sequence: with a text query the catalog is scanned once per
//! match field (title, then body, then key points), which yields relevance
//! order with ties in catalog order and never needs a sort.

use serde::{Deserialize, Serialize};

use super::index::{Catalog, CatalogEntry};
use crate::domain::{CategoryId, Difficulty, Topic, TopicId};

/// Query options. Absent options impose no constraint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchCriteria {
    /// Case-insensitive substring; blank means no text constraint
    pub text: Option<String>,

    pub category_id: Option<String>,

    pub difficulty: Option<Difficulty>,

    /// Only topics whose lock state is locked
    pub locked_only: bool,

    /// Only topics whose lock state is unlocked
    pub unlocked_only: bool,
}

impl SearchCriteria {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_category(mut self, category_id: impl Into<String>) -> Self {
        self.category_id = Some(category_id.into());
        self
    }

    pub fn with_difficulty(mut self, difficulty: Difficulty) -> Self {
        self.difficulty = Some(difficulty);
        self
    }

    pub fn only_locked(mut self) -> Self {
        self.locked_only = true;
        self
    }

    pub fn only_unlocked(mut self) -> Self {
        self.unlocked_only = true;
        self
    }

    /// The same criteria without lock constraints
    pub(crate) fn without_lock_filters(&self) -> Self {
        Self {
            locked_only: false,
            unlocked_only: false,
            ..self.clone()
        }
    }
}

/// Which field a text query matched, best first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchField {
    Title,
    Body,
    KeyPoint,
}

impl MatchField {
    fn next(self) -> Option<Self> {
        match self {
            MatchField::Title => Some(MatchField::Body),
            MatchField::Body => Some(MatchField::KeyPoint),
            MatchField::KeyPoint => None,
        }
    }
}

impl std::fmt::Display for MatchField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchField::Title => write!(f, "title"),
            MatchField::Body => write!(f, "body"),
            MatchField::KeyPoint => write!(f, "key point"),
        }
    }
}

/// A search hit: the topic and its owning category
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TopicRef<'a> {
    pub topic_id: &'a TopicId,
    pub category_id: &'a CategoryId,
    pub topic: &'a Topic,

    /// Set when the query had text
    pub matched: Option<MatchField>,
}

impl<'a> TopicRef<'a> {
    fn new(entry: &'a CatalogEntry, matched: Option<MatchField>) -> Self {
        Self {
            topic_id: &entry.topic.id,
            category_id: &entry.category_id,
            topic: &entry.topic,
            matched,
        }
    }
}

/// Run a query against a catalog
pub fn query<'a>(catalog: &'a Catalog, criteria: &SearchCriteria) -> SearchResults<'a> {
    SearchResults {
        catalog,
        filter: Filter::new(catalog, criteria),
    }
}

/// Criteria normalized once per query
#[derive(Debug, Clone)]
struct Filter {
    needle: Option<String>,
    category_id: Option<String>,
    difficulty: Option<Difficulty>,
    locked_only: bool,
    unlocked_only: bool,

    /// True when no topic can possibly match (unknown category, or both
    /// lock constraints at once)
    matches_nothing: bool,
}

impl Filter {
    fn new(catalog: &Catalog, criteria: &SearchCriteria) -> Self {
        let needle = criteria
            .text
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_lowercase);

        let unknown_category = criteria
            .category_id
            .as_deref()
            .is_some_and(|id| catalog.category(id).is_none());

        Self {
            needle,
            category_id: criteria.category_id.clone(),
            difficulty: criteria.difficulty,
            locked_only: criteria.locked_only,
            unlocked_only: criteria.unlocked_only,
            matches_nothing: unknown_category || (criteria.locked_only && criteria.unlocked_only),
        }
    }

    /// Facet constraints (everything except text)
    fn accepts(&self, entry: &CatalogEntry) -> bool {
        if let Some(ref category_id) = self.category_id {
            if entry.category_id.as_str() != category_id {
                return false;
            }
        }
        if let Some(difficulty) = self.difficulty {
            if entry.topic.difficulty != difficulty {
                return false;
            }
        }
        if self.locked_only && !entry.topic.locked {
            return false;
        }
        if self.unlocked_only && entry.topic.locked {
            return false;
        }
        true
    }

    /// Best field the needle occurs in
    fn best_match(&self, entry: &CatalogEntry) -> Option<MatchField> {
        let needle = self.needle.as_deref()?;
        let keys = &entry.keys;

        if keys.title.contains(needle) {
            Some(MatchField::Title)
        } else if keys.body.contains(needle) {
            Some(MatchField::Body)
        } else if keys.key_points.iter().any(|k| k.contains(needle)) {
            Some(MatchField::KeyPoint)
        } else {
            None
        }
    }
}

/// Ordered, finite, restartable query results
#[derive(Debug, Clone)]
pub struct SearchResults<'a> {
    catalog: &'a Catalog,
    filter: Filter,
}

impl<'a> SearchResults<'a> {
    /// Iterate from the start. May be called any number of times.
    pub fn iter(&self) -> SearchIter<'a> {
        let pass = if self.filter.needle.is_some() {
            Pass::Field(MatchField::Title)
        } else {
            Pass::All
        };

        SearchIter {
            catalog: self.catalog,
            filter: self.filter.clone(),
            pass: if self.filter.matches_nothing {
                Pass::Done
            } else {
                pass
            },
            position: 0,
        }
    }

    /// Number of hits
    pub fn count(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }

    /// Hit IDs in result order
    pub fn topic_ids(&self) -> Vec<&'a TopicId> {
        self.iter().map(|r| r.topic_id).collect()
    }

    pub fn to_vec(&self) -> Vec<TopicRef<'a>> {
        self.iter().collect()
    }
}

impl<'a> IntoIterator for &SearchResults<'a> {
    type Item = TopicRef<'a>;
    type IntoIter = SearchIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pass {
    /// No text: one pass in catalog order
    All,

    /// Text: yield topics whose best match is this field
    Field(MatchField),

    Done,
}

/// Iterator over search hits
#[derive(Debug, Clone)]
pub struct SearchIter<'a> {
    catalog: &'a Catalog,
    filter: Filter,
    pass: Pass,
    position: usize,
}

impl<'a> Iterator for SearchIter<'a> {
    type Item = TopicRef<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let entries = self.catalog.entries();

        loop {
            if self.pass == Pass::Done {
                return None;
            }

            while let Some(entry) = entries.get(self.position) {
                self.position += 1;

                if !self.filter.accepts(entry) {
                    continue;
                }

                match self.pass {
                    Pass::All => return Some(TopicRef::new(entry, None)),
                    Pass::Field(field) => {
                        if self.filter.best_match(entry) == Some(field) {
                            return Some(TopicRef::new(entry, Some(field)));
                        }
                    }
                    Pass::Done => return None,
                }
            }

            self.position = 0;
            self.pass = match self.pass {
                Pass::Field(field) => field.next().map(Pass::Field).unwrap_or(Pass::Done),
                Pass::All | Pass::Done => Pass::Done,
            };
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
                {"id": "t1", "title": "Rocks", "body": "Volcanoes make igneous rock",
                 "keyPoints": ["Magma cools"], "difficulty": "Beginner"},
                {"id": "t2", "title": "Volcanoes", "body": "Vents in the crust",
                 "difficulty": "Advanced", "locked": true},
                {"id": "t3", "title": "Oceans", "body": "Salt water",
                 "keyPoints": ["Underwater volcanoes exist"], "difficulty": "Intermediate"}
            ]},
            {"id": "space", "title": "Space", "description": "Up there", "topics": [
                {"id": "s1", "title": "Volcanoes on Io", "body": "Sulfur", "difficulty": "Advanced"}
            ]}
        ]))
        .unwrap();
        Catalog::build(validate(&raw).unwrap())
    }

    fn ids(results: &SearchResults<'_>) -> Vec<String> {
        results.iter().map(|r| r.topic_id.to_string()).collect()
    }

    #[test]
    fn test_no_criteria_returns_catalog_order() {
        let catalog = catalog();
        let results = query(&catalog, &SearchCriteria::new());

        assert_eq!(ids(&results), vec!["t1", "t2", "t3", "s1"]);
        assert!(results.iter().all(|r| r.matched.is_none()));
    }

    #[test]
    fn test_text_relevance_order() {
        let catalog = catalog();
        let results = query(&catalog, &SearchCriteria::new().with_text("VOLCANO"));

        // Title hits in catalog order, then body, then key points
        assert_eq!(ids(&results), vec!["t2", "s1", "t1", "t3"]);

        let fields: Vec<_> = results.iter().map(|r| r.matched.unwrap()).collect();
        assert_eq!(
            fields,
            vec![
                MatchField::Title,
                MatchField::Title,
                MatchField::Body,
                MatchField::KeyPoint
            ]
        );
    }

    #[test]
    fn test_blank_text_is_no_constraint() {
        let catalog = catalog();
        let results = query(&catalog, &SearchCriteria::new().with_text("   "));

        assert_eq!(results.count(), catalog.len());
    }

    #[test]
    fn test_unknown_category_is_empty() {
        let catalog = catalog();
        let results = query(&catalog, &SearchCriteria::new().with_category("oceans"));

        assert!(results.is_empty());
    }

    #[test]
    fn test_filters_are_conjunctive() {
        let catalog = catalog();
        let both = SearchCriteria::new()
            .with_category("earth")
            .with_difficulty(Difficulty::Advanced);

        assert_eq!(ids(&query(&catalog, &both)), vec!["t2"]);

        let text_and_category = SearchCriteria::new().with_text("volcano").with_category("space");
        assert_eq!(ids(&query(&catalog, &text_and_category)), vec!["s1"]);
    }

    #[test]
    fn test_lock_filters_use_authored_default() {
        let catalog = catalog();

        let locked = query(&catalog, &SearchCriteria::new().only_locked());
        assert_eq!(ids(&locked), vec!["t2"]);

        let unlocked = query(&catalog, &SearchCriteria::new().only_unlocked());
        assert_eq!(ids(&unlocked), vec!["t1", "t3", "s1"]);

        let contradictory = SearchCriteria::new().only_locked().only_unlocked();
        assert!(query(&catalog, &contradictory).is_empty());
    }

    #[test]
    fn test_results_are_restartable() {
        let catalog = catalog();
        let results = query(&catalog, &SearchCriteria::new().with_text("o"));

        let first: Vec<_> = results.iter().collect();
        let second: Vec<_> = (&results).into_iter().collect();
        assert_eq!(first, second);
        assert_eq!(results.topic_ids().len(), first.len());
    }

    #[test]
    fn test_criteria_deserialize_from_camel_case() {
        let criteria: SearchCriteria = serde_json::from_value(json!({
            "categoryId": "earth",
            "difficulty": "Advanced",
            "lockedOnly": true
        }))
        .unwrap();

        assert_eq!(criteria.category_id.as_deref(), Some("earth"));
        assert_eq!(criteria.difficulty, Some(Difficulty::Advanced));
        assert!(criteria.locked_only);
        assert!(!criteria.unlocked_only);
        assert!(criteria.text.is_none());
    }
}
