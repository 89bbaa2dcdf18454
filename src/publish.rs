//! Artifact Publisher
//!
//! Turns generated module text into an addressable resource. The default
//! store keeps artifacts in memory and addresses them by content hash, so a
//! location is stable for identical code and never points at different text.

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use crate::error::{Result, TranspileError};
use crate::sfc::ArtifactLocation;

pub trait ArtifactStore: Send + Sync {
    /// Store module text and return where a loader can find it.
    fn put(&self, code: &str) -> std::result::Result<ArtifactLocation, String>;

    /// Module text previously stored at `location`.
    fn get(&self, location: &ArtifactLocation) -> Option<Arc<str>>;
}

pub fn compute_hash(code: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(code.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[derive(Debug)]
pub struct MemoryArtifactStore {
    scheme: String,
    artifacts: RwLock<HashMap<ArtifactLocation, Arc<str>>>,
    publications: AtomicUsize,
}

impl MemoryArtifactStore {
    pub fn new(scheme: impl Into<String>) -> Self {
        Self {
            scheme: scheme.into(),
            artifacts: RwLock::new(HashMap::new()),
            publications: AtomicUsize::new(0),
        }
    }

    pub fn len(&self) -> usize {
        self.artifacts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of `put` calls, including ones that hit an existing artifact.
    pub fn publication_count(&self) -> usize {
        self.publications.load(Ordering::SeqCst)
    }
}

impl Default for MemoryArtifactStore {
    fn default() -> Self {
        Self::new("sfc-artifact")
    }
}

impl ArtifactStore for MemoryArtifactStore {
    fn put(&self, code: &str) -> std::result::Result<ArtifactLocation, String> {
        let location = ArtifactLocation::new(format!("{}:{}.js", self.scheme, compute_hash(code)));
        self.publications.fetch_add(1, Ordering::SeqCst);
        self.artifacts
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(location.clone())
            .or_insert_with(|| Arc::from(code));
        Ok(location)
    }

    fn get(&self, location: &ArtifactLocation) -> Option<Arc<str>> {
        self.artifacts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(location)
            .cloned()
    }
}

#[derive(Clone)]
pub struct ArtifactPublisher {
    store: Arc<dyn ArtifactStore>,
}

impl ArtifactPublisher {
    pub fn new(store: Arc<dyn ArtifactStore>) -> Self {
        Self { store }
    }

    /// Publish module text. The text is not validated; syntax errors only
    /// surface when the artifact is loaded.
    pub fn publish(&self, code: &str) -> Result<ArtifactLocation> {
        self.store.put(code).map_err(TranspileError::Publish)
    }

    /// Module text behind a published location.
    pub fn load(&self, location: &ArtifactLocation) -> Option<Arc<str>> {
        self.store.get(location)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_and_load() {
        let store = Arc::new(MemoryArtifactStore::default());
        let publisher = ArtifactPublisher::new(store.clone());
        let location = publisher.publish("export default 1;").unwrap();
        assert!(location.as_str().starts_with("sfc-artifact:"));
        assert!(location.as_str().ends_with(".js"));
        assert_eq!(
            publisher.load(&location).as_deref(),
            Some("export default 1;")
        );
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_identical_code_shares_location() {
        let store = Arc::new(MemoryArtifactStore::new("mem"));
        let publisher = ArtifactPublisher::new(store.clone());
        let a = publisher.publish("x").unwrap();
        let b = publisher.publish("x").unwrap();
        let c = publisher.publish("y").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(store.len(), 2);
        assert_eq!(store.publication_count(), 3);
    }

    #[test]
    fn test_unknown_location_loads_nothing() {
        let publisher = ArtifactPublisher::new(Arc::new(MemoryArtifactStore::default()));
        assert!(publisher
            .load(&ArtifactLocation::new("sfc-artifact:missing.js"))
            .is_none());
    }

    #[test]
    fn test_compute_hash_is_hex_sha256() {
        let hash = compute_hash("abc");
        assert_eq!(
            hash,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
