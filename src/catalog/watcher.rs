//! Content file watcher.
//!
//! Watches local content sources and rebuilds the catalog wholesale when
//! they change. Each rebuild is reported as a [`CatalogUpdate`]; an accepted
//! catalog is never mutated afterwards, a rejected one is simply not
//! published.

use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use glob::Pattern;
use notify::RecursiveMode;
use notify_debouncer_mini::new_debouncer;
use thiserror::Error;
use tokio::sync::mpsc;

use super::index::Catalog;
use super::loader::ContentSource;
use super::validator::ValidationErrorList;

/// Errors that can occur with the watcher
#[derive(Debug, Error)]
pub enum WatcherError {
    #[error("No local content sources to watch")]
    NothingToWatch,

    #[error("Notify error: {0}")]
    Notify(#[from] notify::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result of one rebuild
#[derive(Debug, Clone)]
pub enum CatalogUpdate {
    /// New catalog accepted
    Reloaded(Arc<Catalog>),

    /// Content changed but failed validation
    Rejected(ValidationErrorList),

    /// Content could not be read or parsed
    Failed(String),
}

/// Configuration for the watcher
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Sources to rebuild from (URLs are loaded but not watched)
    pub sources: Vec<ContentSource>,

    /// Debounce interval for filesystem events
    pub debounce: Duration,
}

impl WatcherConfig {
    pub fn new(sources: Vec<ContentSource>) -> Self {
        Self {
            sources,
            debounce: Duration::from_millis(500),
        }
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }
}

/// A directory registration with the OS watcher
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WatchTarget {
    pub dir: PathBuf,
    pub recursive: bool,
}

/// Watches content sources and emits catalog rebuilds
pub struct CatalogWatcher {
    config: WatcherConfig,
    patterns: Vec<Pattern>,
    files: HashSet<PathBuf>,
}

impl CatalogWatcher {
    /// Relative sources are resolved against the current directory
    pub fn new(config: WatcherConfig) -> Result<Self, WatcherError> {
        let cwd = std::env::current_dir()?;
        let sources: Vec<ContentSource> = config
            .sources
            .iter()
            .map(|s| s.absolutize(&cwd))
            .collect();

        let mut patterns = Vec::new();
        let mut files = HashSet::new();
        for source in &sources {
            match source {
                ContentSource::File(path) => {
                    files.insert(path.clone());
                }
                ContentSource::Glob(pattern) => {
                    if let Ok(pattern) = Pattern::new(pattern) {
                        patterns.push(pattern);
                    }
                }
                ContentSource::Url(_) => {}
            }
        }

        if files.is_empty() && patterns.is_empty() {
            return Err(WatcherError::NothingToWatch);
        }

        Ok(Self {
            config: WatcherConfig { sources, ..config },
            patterns,
            files,
        })
    }

    pub fn config(&self) -> &WatcherConfig {
        &self.config
    }

    /// Directories to register. Files are watched through their parent so
    /// editors that replace files on save are still seen.
    pub fn targets(&self) -> Vec<WatchTarget> {
        let mut targets = Vec::new();

        for source in &self.config.sources {
            let target = match source {
                ContentSource::File(path) => WatchTarget {
                    dir: path
                        .parent()
                        .map(Path::to_path_buf)
                        .unwrap_or_else(|| PathBuf::from(".")),
                    recursive: false,
                },
                ContentSource::Glob(pattern) => glob_root(pattern),
                ContentSource::Url(_) => continue,
            };
            if !targets.contains(&target) {
                targets.push(target);
            }
        }

        targets
    }

    /// Whether a changed path belongs to one of the sources
    pub fn is_relevant(&self, path: &Path) -> bool {
        self.files.contains(path) || self.patterns.iter().any(|p| p.matches_path(path))
    }

    /// Watch in the background until the handle is stopped
    pub async fn watch(self) -> Result<(mpsc::Receiver<CatalogUpdate>, WatchHandle), WatcherError> {
        let (update_tx, update_rx) = mpsc::channel::<CatalogUpdate>(16);
        let (stop_tx, mut stop_rx) = mpsc::channel::<()>(1);

        let handle = tokio::spawn(async move {
            if let Err(e) = run_watcher(self, update_tx, &mut stop_rx).await {
                tracing::error!("Content watcher error: {}", e);
            }
        });

        Ok((
            update_rx,
            WatchHandle {
                stop_tx,
                task: handle,
            },
        ))
    }
}

/// Handle to control the watcher
pub struct WatchHandle {
    stop_tx: mpsc::Sender<()>,
    task: tokio::task::JoinHandle<()>,
}

impl WatchHandle {
    /// Stop the watcher
    pub async fn stop(self) -> Result<()> {
        let _ = self.stop_tx.send(()).await;
        self.task.await?;
        Ok(())
    }
}

/// Rebuild the catalog from sources and classify the outcome
pub async fn rebuild(sources: &[ContentSource]) -> CatalogUpdate {
    match crate::facade::load_catalog_from(sources).await {
        Ok(catalog) => CatalogUpdate::Reloaded(Arc::new(catalog)),
        Err(e) => match e.downcast_ref::<ValidationErrorList>() {
            Some(errors) => CatalogUpdate::Rejected(errors.clone()),
            None => CatalogUpdate::Failed(format!("{:#}", e)),
        },
    }
}

/// Internal watcher loop
async fn run_watcher(
    watcher: CatalogWatcher,
    update_tx: mpsc::Sender<CatalogUpdate>,
    stop_rx: &mut mpsc::Receiver<()>,
) -> Result<()> {
    let (tx, rx) = std::sync::mpsc::channel();
    let mut debouncer = new_debouncer(watcher.config.debounce, tx)?;

    for target in watcher.targets() {
        let mode = if target.recursive {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        };
        debouncer.watcher().watch(&target.dir, mode)?;
        tracing::info!("Watching {} for content changes", target.dir.display());
    }

    loop {
        if stop_rx.try_recv().is_ok() {
            tracing::info!("Content watcher stopping...");
            break;
        }

        let changed = match rx.recv_timeout(Duration::from_millis(250)) {
            Ok(Ok(events)) => events.iter().any(|event| watcher.is_relevant(&event.path)),
            Ok(Err(e)) => {
                tracing::warn!("Watcher error: {:?}", e);
                false
            }
            Err(std::sync::mpsc::RecvTimeoutError::Timeout) => false,
            Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => {
                tracing::error!("Watcher channel disconnected");
                break;
            }
        };

        if changed {
            let update = rebuild(&watcher.config.sources).await;
            match &update {
                CatalogUpdate::Reloaded(catalog) => tracing::info!(
                    release = %catalog.release(),
                    topics = catalog.len(),
                    "Catalog reloaded"
                ),
                CatalogUpdate::Rejected(errors) => {
                    tracing::warn!(errors = errors.len(), "Content change rejected")
                }
                CatalogUpdate::Failed(reason) => {
                    tracing::warn!("Content reload failed: {}", reason)
                }
            }

            if update_tx.send(update).await.is_err() {
                break;
            }
        }

        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    Ok(())
}

/// Directory above the first wildcard component of a glob
fn glob_root(pattern: &str) -> WatchTarget {
    let path = Path::new(pattern);
    let mut dir = PathBuf::new();
    let mut components = path.components().peekable();

    while let Some(component) = components.next() {
        let text = component.as_os_str().to_string_lossy();
        if text.contains(['*', '?', '[']) {
            // Wildcards above the file name mean matches can be nested
            let recursive = components.peek().is_some() || text.contains("**");
            return WatchTarget {
                dir: if dir.as_os_str().is_empty() {
                    PathBuf::from(".")
                } else {
                    dir
                },
                recursive,
            };
        }
        if !matches!(component, Component::CurDir) {
            dir.push(component);
        }
    }

    WatchTarget {
        dir: path.parent().map(Path::to_path_buf).unwrap_or_default(),
        recursive: false,
    }
}
