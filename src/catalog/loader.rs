//! Loading raw content snapshots.
//!
//! A source is a local file, a glob over local files, or an HTTP(S) URL.
//! `.yaml`/`.yml` files parse as YAML, everything else as JSON. A document
//! is either a bare list of categories or `{ "categories": [...] }`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_json::Value;
use tokio::fs;

use crate::domain::RawCategory;

/// Where content comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentSource {
    /// A single local file
    File(PathBuf),

    /// A glob pattern over local files, loaded in sorted path order
    Glob(String),

    /// An HTTP(S) snapshot URL returning JSON
    Url(String),
}

impl ContentSource {
    /// Whether the source lives on the local filesystem
    pub fn is_local(&self) -> bool {
        !matches!(self, ContentSource::Url(_))
    }

    /// Resolve a relative file or glob against `base`
    pub fn absolutize(&self, base: &Path) -> Self {
        match self {
            ContentSource::File(path) if path.is_relative() => ContentSource::File(base.join(path)),
            ContentSource::Glob(pattern) if Path::new(pattern).is_relative() => {
                ContentSource::Glob(base.join(pattern).to_string_lossy().to_string())
            }
            other => other.clone(),
        }
    }
}

impl std::fmt::Display for ContentSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContentSource::File(path) => write!(f, "{}", path.display()),
            ContentSource::Glob(pattern) => write!(f, "{}", pattern),
            ContentSource::Url(url) => write!(f, "{}", url),
        }
    }
}

impl std::str::FromStr for ContentSource {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            anyhow::bail!("Content source is empty");
        }

        if s.starts_with("http://") || s.starts_with("https://") {
            Ok(ContentSource::Url(s.to_string()))
        } else if s.contains(['*', '?', '[']) {
            Ok(ContentSource::Glob(s.to_string()))
        } else {
            Ok(ContentSource::File(PathBuf::from(s)))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Json,
    Yaml,
}

impl Format {
    fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
                Format::Yaml
            }
            _ => Format::Json,
        }
    }
}

/// Parse one content document. Only the document shape is checked here;
/// field-level problems are left to the validator.
fn parse_document(text: &str, format: Format) -> Result<Vec<RawCategory>> {
    let document: Value = match format {
        Format::Json => serde_json::from_str(text).context("Failed to parse content JSON")?,
        Format::Yaml => serde_yaml::from_str(text).context("Failed to parse content YAML")?,
    };

    let entries = match document {
        Value::Array(entries) => entries,
        Value::Object(mut map) => match map.remove("categories") {
            Some(Value::Array(entries)) => entries,
            Some(_) => anyhow::bail!("`categories` must be a list"),
            None => anyhow::bail!("Expected a `categories` list"),
        },
        _ => anyhow::bail!("Expected a list of categories or an object with `categories`"),
    };

    entries
        .into_iter()
        .enumerate()
        .map(|(index, entry)| {
            if !entry.is_object() {
                anyhow::bail!("Category entry {} is not an object", index);
            }
            serde_json::from_value(entry)
                .with_context(|| format!("Invalid category entry {}", index))
        })
        .collect()
}

/// Load all sources, concatenating categories in the order given
pub async fn load_sources(sources: &[ContentSource]) -> Result<Vec<RawCategory>> {
    if sources.is_empty() {
        anyhow::bail!("No content sources configured");
    }

    let mut categories = Vec::new();
    for source in sources {
        let loaded = load_source(source).await?;
        tracing::debug!(source = %source, categories = loaded.len(), "Loaded content source");
        categories.extend(loaded);
    }

    Ok(categories)
}

/// Load a single source
pub async fn load_source(source: &ContentSource) -> Result<Vec<RawCategory>> {
    match source {
        ContentSource::File(path) => load_file(path).await,
        ContentSource::Glob(pattern) => {
            let mut categories = Vec::new();
            for path in expand_glob(pattern)? {
                categories.extend(load_file(&path).await?);
            }
            Ok(categories)
        }
        ContentSource::Url(url) => fetch_url(url).await,
    }
}

/// Load one local file
pub async fn load_file(path: &Path) -> Result<Vec<RawCategory>> {
    let text = fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read content file: {}", path.display()))?;

    parse_document(&text, Format::from_path(path))
        .with_context(|| format!("Invalid content file: {}", path.display()))
}

/// Expand a glob into sorted file paths; matching nothing is an error
pub fn expand_glob(pattern: &str) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    let entries =
        glob::glob(pattern).with_context(|| format!("Invalid glob pattern: {}", pattern))?;
    for entry in entries {
        let path = entry.with_context(|| format!("Failed to read glob match for {}", pattern))?;
        if path.is_file() {
            paths.push(path);
        }
    }

    if paths.is_empty() {
        anyhow::bail!("No content files match {}", pattern);
    }

    paths.sort();
    Ok(paths)
}

/// Fetch a JSON snapshot over HTTP(S)
async fn fetch_url(url: &str) -> Result<Vec<RawCategory>> {
    let response = reqwest::get(url)
        .await
        .with_context(|| format!("Failed to fetch content: {}", url))?
        .error_for_status()
        .with_context(|| format!("Content server rejected request: {}", url))?;

    let text = response
        .text()
        .await
        .with_context(|| format!("Failed to read content response: {}", url))?;

    parse_document(&text, Format::Json)
        .with_context(|| format!("Invalid content snapshot: {}", url))
}
