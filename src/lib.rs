//! curio - Content catalog and progression engine
//!
//! Turns authored learning content (categories of topics) into an
//! immutable, validated, searchable catalog, and tracks each user's
//! progress through it with a small state machine.
//!
//! # Architecture
//!
//! - Content is validated as a whole; any problem rejects the release
//!   with the complete list of errors
//! - An accepted release is indexed once and never mutated
//! - Per-user progress lives outside the catalog and is persisted as an
//!   append-only event journal, replayed on load
//!
//! # Modules
//!
//! - `domain`: Data structures (Topic, Category, TopicState, ProgressEvent)
//! - `catalog`: Validation, indexing, search, loading and watching
//! - `progress`: State machine, progress stores, journal
//! - `facade`: Single entry point tying the above together
//! - `config`: Layered configuration
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Check content
//! curio --source content.json validate
//!
//! # Find advanced topics about volcanoes
//! curio search volcano --difficulty advanced
//!
//! # Record progress
//! curio --user alice progress complete t1
//! ```

pub mod catalog;
pub mod cli;
pub mod config;
pub mod domain;
pub mod facade;
pub mod progress;

// Re-export main types at crate root for convenience
pub use catalog::{
    Catalog, ContentSource, SearchCriteria, TopicRef, ValidationError, ValidationErrorList,
};
pub use domain::{Category, CategoryId, Difficulty, RawCategory, Topic, TopicId, TopicState};
pub use facade::{load_catalog, load_catalog_from, progression, search};
pub use progress::{
    JournalLock, MemoryProgressStore, ProgressJournal, ProgressStore, ProgressionHandle,
    TransitionError,
};
