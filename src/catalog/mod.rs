//! Content catalog: validation, indexing, search and loading.
//!
//! ```text
//! raw records -> validator -> index (Catalog) -> search
//!      ^
//!   loader (file / glob / URL), watcher (rebuild on change)
//! ```

pub mod index;
pub mod loader;
pub mod search;
pub mod validator;
pub mod watcher;

pub use index::{Catalog, CatalogEntry, CatalogStats};
pub use loader::{load_sources, ContentSource};
pub use search::{query, MatchField, SearchCriteria, SearchIter, SearchResults, TopicRef};
pub use validator::{
    validate, ValidatedCatalogInput, ValidatedCategory, ValidationError, ValidationErrorList,
    ValidationIssue,
};
pub use watcher::{CatalogUpdate, CatalogWatcher, WatchHandle, WatcherConfig, WatcherError};
