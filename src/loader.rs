//! Content loading and locator resolution.
//!
//! Fetching bytes and canonicalising references are host concerns; the
//! transpiler only sees the two traits below. A filesystem loader, an
//! in-memory loader (used by tests and embedders that already hold sources)
//! and a lexical path resolver are provided.

use futures::future::BoxFuture;
use futures::FutureExt;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError, RwLock};
use std::time::Duration;
use thiserror::Error;

use crate::error::{Result, TranspileError};
use crate::sfc::Identity;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct LoadError(pub String);

// ═══════════════════════════════════════════════════════════════════════════════
// CONTENT LOADING
// ═══════════════════════════════════════════════════════════════════════════════

pub trait ContentLoader: Send + Sync {
    fn load<'a>(
        &'a self,
        locator: &'a Identity,
    ) -> BoxFuture<'a, std::result::Result<String, LoadError>>;
}

/// Reads locators as filesystem paths. `file://` prefixes are stripped and
/// absolute locators are re-rooted under `root` when one is set.
#[derive(Debug, Clone, Default)]
pub struct FsContentLoader {
    root: Option<PathBuf>,
}

impl FsContentLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    fn path_for(&self, locator: &Identity) -> PathBuf {
        let raw = locator.as_str();
        let raw = raw.strip_prefix("file://").unwrap_or(raw);
        let raw = raw.split(['?', '#']).next().unwrap_or(raw);
        match &self.root {
            Some(root) => root.join(raw.trim_start_matches('/')),
            None => PathBuf::from(raw),
        }
    }
}

impl ContentLoader for FsContentLoader {
    fn load<'a>(
        &'a self,
        locator: &'a Identity,
    ) -> BoxFuture<'a, std::result::Result<String, LoadError>> {
        async move {
            let path = self.path_for(locator);
            tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| LoadError(format!("{}: {}", path.display(), e)))
        }
        .boxed()
    }
}

/// Serves sources from memory and counts every fetch per locator.
#[derive(Debug, Default)]
pub struct MemoryContentLoader {
    sources: RwLock<HashMap<Identity, String>>,
    fetches: Mutex<HashMap<Identity, usize>>,
    latency: Option<Duration>,
}

impl MemoryContentLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every load sleeps for `latency` first, so concurrent resolutions
    /// genuinely interleave.
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency: Some(latency),
            ..Self::default()
        }
    }

    pub fn insert(&self, locator: impl Into<Identity>, source: impl Into<String>) {
        self.sources
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(locator.into(), source.into());
    }

    pub fn fetch_count(&self, locator: &Identity) -> usize {
        self.fetches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(locator)
            .copied()
            .unwrap_or(0)
    }

    pub fn total_fetches(&self) -> usize {
        self.fetches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .sum()
    }
}

impl ContentLoader for MemoryContentLoader {
    fn load<'a>(
        &'a self,
        locator: &'a Identity,
    ) -> BoxFuture<'a, std::result::Result<String, LoadError>> {
        async move {
            *self
                .fetches
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .entry(locator.clone())
                .or_insert(0) += 1;

            if let Some(latency) = self.latency {
                tokio::time::sleep(latency).await;
            }

            self.sources
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .get(locator)
                .cloned()
                .ok_or_else(|| LoadError(format!("{} not found", locator)))
        }
        .boxed()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// LOCATOR RESOLUTION
// ═══════════════════════════════════════════════════════════════════════════════

pub trait LocatorResolver: Send + Sync {
    /// Resolve `reference` relative to the document `base`.
    fn resolve(&self, reference: &str, base: &Identity) -> Result<Identity>;

    /// Canonical form of a top-level locator.
    fn canonicalize(&self, locator: &str) -> Result<Identity> {
        self.resolve(locator, &Identity::new(""))
    }
}

/// URL-style lexical resolution: `./` and `../` segments are folded, a
/// `scheme://authority` origin is kept, query and fragment are carried over.
#[derive(Debug, Clone, Copy, Default)]
pub struct PathResolver;

impl LocatorResolver for PathResolver {
    fn resolve(&self, reference: &str, base: &Identity) -> Result<Identity> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(TranspileError::Resolve {
                reference: reference.to_string(),
                base: base.clone(),
                reason: "empty reference".to_string(),
            });
        }

        let (ref_path, suffix) = split_suffix(reference);
        let (ref_origin, ref_path) = split_origin(ref_path);

        let (origin, joined) = if !ref_origin.is_empty() {
            (ref_origin, ref_path.to_string())
        } else if ref_path.starts_with('/') {
            let (base_origin, _) = split_origin(split_suffix(base.as_str()).0);
            (base_origin, ref_path.to_string())
        } else {
            let (base_origin, base_path) = split_origin(split_suffix(base.as_str()).0);
            let dir = match base_path.rfind('/') {
                Some(idx) => &base_path[..=idx],
                None => "",
            };
            (base_origin, format!("{}{}", dir, ref_path))
        };

        Ok(Identity::new(format!(
            "{}{}{}",
            origin,
            normalize_path(&joined),
            suffix
        )))
    }
}

/// Splits `path?query#fragment` into the path and the rest.
fn split_suffix(locator: &str) -> (&str, &str) {
    match locator.find(['?', '#']) {
        Some(idx) => (&locator[..idx], &locator[idx..]),
        None => (locator, ""),
    }
}

/// Splits `scheme://authority/path` into origin and path.
fn split_origin(locator: &str) -> (&str, &str) {
    if let Some(scheme_end) = locator.find("://") {
        let after = scheme_end + 3;
        return match locator[after..].find('/') {
            Some(rel) => locator.split_at(after + rel),
            None => (locator, "/"),
        };
    }
    ("", locator)
}

fn normalize_path(path: &str) -> String {
    let absolute = path.starts_with('/');
    let mut segments: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.last().map_or(false, |s| *s != "..") {
                    segments.pop();
                } else if !absolute {
                    segments.push("..");
                }
            }
            other => segments.push(other),
        }
    }

    let mut normalized = segments.join("/");
    if path.ends_with('/') && !normalized.is_empty() {
        normalized.push('/');
    }
    if absolute {
        normalized.insert(0, '/');
    }
    normalized
}
