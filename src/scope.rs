//! Scope id allocation.
//!
//! A scope id is the attribute name appended to scoped selectors, e.g.
//! `data-v-3f2a9c01`. Ids are built from a coarse time component and a random
//! component; the allocator remembers every id it has issued and retries on
//! collision, so two allocations from the same allocator are never equal.
//! Shared allocators are kept per prefix for the whole process, so contexts
//! built with the same prefix draw from one issued set.

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

pub const DEFAULT_SCOPE_PREFIX: &str = "data-v-";

lazy_static! {
    static ref SHARED_ALLOCATORS: Mutex<HashMap<String, Arc<ScopeAllocator>>> =
        Mutex::new(HashMap::new());
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScopeId(String);

impl ScopeId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Attribute selector form: `[data-v-xxxxxxxx]`.
    pub fn selector_suffix(&self) -> String {
        format!("[{}]", self.0)
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug)]
pub struct ScopeAllocator {
    prefix: String,
    issued: Mutex<HashSet<String>>,
}

impl ScopeAllocator {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            issued: Mutex::new(HashSet::new()),
        }
    }

    /// Process-wide allocator using the default prefix.
    pub fn global() -> Arc<ScopeAllocator> {
        Self::for_prefix(DEFAULT_SCOPE_PREFIX)
    }

    /// Process-wide allocator for `prefix`, created on first use.
    pub fn for_prefix(prefix: &str) -> Arc<ScopeAllocator> {
        SHARED_ALLOCATORS
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(prefix.to_string())
            .or_insert_with(|| Arc::new(ScopeAllocator::new(prefix)))
            .clone()
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Issue a fresh id. Check and registration happen under one lock.
    pub fn allocate(&self) -> ScopeId {
        let mut issued = self.issued.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            let candidate = self.candidate();
            if issued.insert(candidate.clone()) {
                return ScopeId(candidate);
            }
            tracing::trace!("scope id collision on {}, retrying", candidate);
        }
    }

    pub fn issued_count(&self) -> usize {
        self.issued
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn candidate(&self) -> String {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0);
        let time_part = (millis % 65535) as u16;
        let random_part: u16 = rand::random();
        format!("{}{:04x}{:04x}", self.prefix, time_part, random_part)
    }
}

impl Default for ScopeAllocator {
    fn default() -> Self {
        Self::new(DEFAULT_SCOPE_PREFIX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_scope_id_format() {
        let allocator = ScopeAllocator::default();
        let id = allocator.allocate();
        assert!(id.as_str().starts_with("data-v-"));
        assert_eq!(id.as_str().len(), "data-v-".len() + 8);
        assert!(id.as_str()["data-v-".len()..]
            .chars()
            .all(|c| c.is_ascii_hexdigit()));
        assert_eq!(id.selector_suffix(), format!("[{}]", id));
    }

    #[test]
    fn test_sequential_allocations_are_unique() {
        let allocator = ScopeAllocator::default();
        let ids: HashSet<_> = (0..2000).map(|_| allocator.allocate()).collect();
        assert_eq!(ids.len(), 2000);
        assert_eq!(allocator.issued_count(), 2000);
    }

    #[test]
    fn test_concurrent_allocations_are_unique() {
        let allocator = Arc::new(ScopeAllocator::new("x-"));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let allocator = allocator.clone();
                thread::spawn(move || (0..250).map(|_| allocator.allocate()).collect::<Vec<_>>())
            })
            .collect();

        let mut all = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(all.insert(id), "duplicate scope id issued");
            }
        }
        assert_eq!(all.len(), 2000);
    }

    #[test]
    fn test_global_allocator_is_shared() {
        let a = ScopeAllocator::global();
        let b = ScopeAllocator::global();
        assert!(Arc::ptr_eq(&a, &b));
        assert_ne!(a.allocate(), b.allocate());
    }

    #[test]
    fn test_shared_allocators_are_per_prefix() {
        let a = ScopeAllocator::for_prefix("shared-x-");
        let b = ScopeAllocator::for_prefix("shared-x-");
        let other = ScopeAllocator::for_prefix("shared-y-");
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &other));
        assert_eq!(other.prefix(), "shared-y-");
        assert!(Arc::ptr_eq(
            &ScopeAllocator::global(),
            &ScopeAllocator::for_prefix(DEFAULT_SCOPE_PREFIX)
        ));
    }
}
