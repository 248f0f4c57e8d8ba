//! Single entry point for callers.
//!
//! Wiring only: validation failures propagate verbatim, everything else is
//! a pass-through to the catalog and progression modules.

use std::sync::Arc;

use anyhow::Result;

use crate::catalog::{
    self, Catalog, ContentSource, SearchCriteria, SearchResults, ValidationErrorList,
};
use crate::domain::RawCategory;
use crate::progress::{ProgressStore, ProgressionHandle};

/// Validate raw content and build its catalog
pub fn load_catalog(raw: &[RawCategory]) -> Result<Catalog, ValidationErrorList> {
    let input = catalog::validate(raw)?;
    let catalog = Catalog::build(input);

    tracing::info!(
        release = %catalog.release(),
        categories = catalog.categories().len(),
        topics = catalog.len(),
        "Catalog loaded"
    );

    Ok(catalog)
}

/// Load sources and build the catalog. A validation failure stays
/// downcastable to [`ValidationErrorList`].
pub async fn load_catalog_from(sources: &[ContentSource]) -> Result<Catalog> {
    let raw = catalog::load_sources(sources).await?;
    let catalog = load_catalog(&raw)?;
    Ok(catalog)
}

/// Query a catalog
pub fn search<'a>(catalog: &'a Catalog, criteria: &SearchCriteria) -> SearchResults<'a> {
    catalog::query(catalog, criteria)
}

/// Bind a catalog to one user's progress store
pub fn progression<S: ProgressStore>(catalog: Arc<Catalog>, store: S) -> ProgressionHandle<S> {
    ProgressionHandle::new(catalog, store)
}
