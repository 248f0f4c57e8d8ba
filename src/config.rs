//! Configuration for curio.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (CURIO_HOME, CURIO_CONTENT, CURIO_USER)
//! 2. Config file (.curio/config.yaml)
//! 3. Defaults (~/.curio)
//!
//! Config file discovery:
//! - Searches current directory and parents for .curio/config.yaml
//! - Paths in config file are relative to the project root (the parent of .curio/)

use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::catalog::ContentSource;

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

const DEFAULT_CONTENT: &str = "content.json";
const DEFAULT_USER: &str = "default";
const DEFAULT_DEBOUNCE_MS: u64 = 500;

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    #[serde(default)]
    pub content: ContentConfig,
    #[serde(default)]
    pub progress: ProgressConfig,
    #[serde(default)]
    pub watch: Option<WatchConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContentConfig {
    /// Files, globs or URLs (relative paths resolve against the project root)
    #[serde(default)]
    pub sources: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProgressConfig {
    /// Journal directory (relative to the project root)
    pub dir: Option<String>,
    /// Default user name
    pub user: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WatchConfig {
    pub debounce_ms: Option<u64>,
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Absolute path to curio home (engine state)
    pub home: PathBuf,
    /// Content sources in load order
    pub content_sources: Vec<ContentSource>,
    /// Directory holding per-user progress journals
    pub progress_dir: PathBuf,
    /// User whose progress is used when none is given
    pub default_user: String,
    /// Debounce interval for the content watcher
    pub watch_debounce: Duration,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(".curio").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to the project root
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
            .canonicalize()
            .unwrap_or_else(|_| base.join(path_str))
    }
}

/// Parse content sources, resolving local ones against `base`
fn parse_sources<'s>(
    base: &Path,
    raw: impl IntoIterator<Item = &'s str>,
) -> Result<Vec<ContentSource>> {
    raw.into_iter()
        .filter(|s| !s.trim().is_empty())
        .map(|s| {
            s.parse::<ContentSource>()
                .map(|source| source.absolutize(base))
                .with_context(|| format!("Invalid content source: {}", s))
        })
        .collect()
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    let default_home = dirs::home_dir()
        .context("Failed to determine home directory")?
        .join(".curio");
    let cwd = std::env::current_dir().context("Failed to determine current directory")?;

    let config_file = find_config_file();
    let file = match config_file {
        Some(ref path) => Some(load_config_file(path)?),
        None => None,
    };

    // Base directory is the parent of .curio/ (i.e., grandparent of config.yaml)
    let base_dir = config_file
        .as_deref()
        .and_then(Path::parent)
        .and_then(Path::parent)
        .map(Path::to_path_buf)
        .unwrap_or_else(|| cwd.clone());

    let home = std::env::var("CURIO_HOME")
        .map(PathBuf::from)
        .unwrap_or(default_home);

    let content_sources = if let Ok(env_content) = std::env::var("CURIO_CONTENT") {
        parse_sources(&cwd, env_content.split(','))?
    } else {
        match file.as_ref().map(|f| &f.content.sources) {
            Some(sources) if !sources.is_empty() => {
                parse_sources(&base_dir, sources.iter().map(String::as_str))?
            }
            _ => parse_sources(&base_dir, [DEFAULT_CONTENT])?,
        }
    };

    let progress_dir = file
        .as_ref()
        .and_then(|f| f.progress.dir.as_deref())
        .map(|dir| resolve_path(&base_dir, dir))
        .unwrap_or_else(|| home.join("progress"));

    let default_user = std::env::var("CURIO_USER")
        .ok()
        .or_else(|| file.as_ref().and_then(|f| f.progress.user.clone()))
        .unwrap_or_else(|| DEFAULT_USER.to_string());

    let watch_debounce = Duration::from_millis(
        file.as_ref()
            .and_then(|f| f.watch.as_ref())
            .and_then(|w| w.debounce_ms)
            .unwrap_or(DEFAULT_DEBOUNCE_MS),
    );

    Ok(ResolvedConfig {
        home,
        content_sources,
        progress_dir,
        default_user,
        watch_debounce,
        config_file,
    })
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| format!("{:#}", e)));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}

/// Force reload configuration (useful for testing)
pub fn reload_config() -> Result<ResolvedConfig> {
    load_config()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_config_file_parsing() {
        let temp = TempDir::new().unwrap();
        let curio_dir = temp.path().join(".curio");
        std::fs::create_dir_all(&curio_dir).unwrap();

        let config_path = curio_dir.join("config.yaml");
        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(
            file,
            r#"
version: "1.0"
content:
  sources:
    - content/*.json
    - https://cdn.example.com/catalog.json
progress:
  dir: ./progress
  user: alice
watch:
  debounce_ms: 750
"#
        )
        .unwrap();

        let config = load_config_file(&config_path).unwrap();
        assert_eq!(config.version, "1.0");
        assert_eq!(config.content.sources.len(), 2);
        assert_eq!(config.progress.dir.as_deref(), Some("./progress"));
        assert_eq!(config.progress.user.as_deref(), Some("alice"));
        assert_eq!(config.watch.unwrap().debounce_ms, Some(750));
    }

    #[test]
    fn test_minimal_config_file() {
        let temp = TempDir::new().unwrap();
        let config_path = temp.path().join("config.yaml");
        std::fs::write(&config_path, "version: \"1.0\"\n").unwrap();

        let config = load_config_file(&config_path).unwrap();
        assert!(config.content.sources.is_empty());
        assert!(config.progress.dir.is_none());
        assert!(config.watch.is_none());
    }

    #[test]
    fn test_parse_sources_resolves_local_paths() {
        let base = PathBuf::from("/project");
        let sources = parse_sources(
            &base,
            ["content/*.json", " ", "https://cdn.example.com/c.json", "/abs/c.yaml"],
        )
        .unwrap();

        assert_eq!(
            sources,
            vec![
                ContentSource::Glob("/project/content/*.json".to_string()),
                ContentSource::Url("https://cdn.example.com/c.json".to_string()),
                ContentSource::File(PathBuf::from("/abs/c.yaml")),
            ]
        );
    }

    #[test]
    fn test_resolve_relative_path() {
        let base = PathBuf::from("/home/user/project");

        assert_eq!(
            resolve_path(&base, "./subdir"),
            PathBuf::from("/home/user/project/subdir")
        );
        assert_eq!(
            resolve_path(&base, "/absolute/path"),
            PathBuf::from("/absolute/path")
        );
    }
}
