//! Dependency Cache
//!
//! Maps each identity to the single resolution of that identity. The entry
//! is installed when the identity is first claimed, before any of its work
//! runs, as a shared future: every later request joins that future instead of
//! starting a second resolution. Completed entries (successes and failures)
//! stay cached until evicted.
//!
//! The cache also records which in-flight identity is waiting on which. A
//! join that would close a loop in that wait-for graph is refused with
//! `CyclicDependency`, because the futures involved could never complete.

use futures::future::{BoxFuture, FutureExt, Shared};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::{Result, TranspileError};
use crate::scope::ScopeId;
use crate::sfc::{ArtifactLocation, DependencyStack, Identity, SfcObject};

pub type EntryFuture = Shared<BoxFuture<'static, Result<CacheEntry>>>;

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub identity: Identity,
    pub artifact_location: ArtifactLocation,
    pub sfc: Arc<SfcObject>,
}

/// Outcome of claiming an identity.
pub enum Claim {
    /// This call installed the entry; its future has not been polled yet.
    Created(EntryFuture),
    /// An entry already existed.
    Joined(EntryFuture),
}

impl Claim {
    pub fn is_created(&self) -> bool {
        matches!(self, Claim::Created(_))
    }

    pub fn into_future(self) -> EntryFuture {
        match self {
            Claim::Created(f) | Claim::Joined(f) => f,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryStatus {
    Pending,
    Ready(ArtifactLocation),
    Failed(TranspileError),
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<Identity, EntryFuture>,
    /// Claim order, for stable snapshots.
    order: Vec<Identity>,
    /// waiter -> identities it is currently awaiting
    waits: HashMap<Identity, HashSet<Identity>>,
}

impl CacheState {
    /// Path `from -> ... -> to` through the wait-for graph, if any.
    fn wait_path(&self, from: &Identity, to: &Identity) -> Option<Vec<Identity>> {
        let mut previous: HashMap<&Identity, &Identity> = HashMap::new();
        let mut seen: HashSet<&Identity> = HashSet::from([from]);
        let mut queue = VecDeque::from([from]);

        while let Some(current) = queue.pop_front() {
            if current == to {
                let mut path = vec![current.clone()];
                let mut cursor = current;
                while let Some(prev) = previous.get(cursor) {
                    path.push((*prev).clone());
                    cursor = *prev;
                }
                path.reverse();
                return Some(path);
            }
            for next in self.waits.get(current).into_iter().flatten() {
                if seen.insert(next) {
                    previous.insert(next, current);
                    queue.push_back(next);
                }
            }
        }
        None
    }
}

#[derive(Default)]
pub struct DependencyCache {
    state: Mutex<CacheState>,
}

impl DependencyCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Join the entry for `identity`, or install one built by `start`.
    ///
    /// Lookup and installation happen under one lock with no suspension in
    /// between. `stack` is the requesting chain; its last frame (if any)
    /// becomes a waiter on `identity` until `release_wait` is called.
    pub fn claim<F>(&self, identity: &Identity, stack: &DependencyStack, start: F) -> Result<Claim>
    where
        F: FnOnce() -> BoxFuture<'static, Result<CacheEntry>>,
    {
        let mut state = self.lock();
        let waiter = stack.last();

        if let Some(existing) = state.entries.get(identity).cloned() {
            if existing.peek().is_some() {
                return Ok(Claim::Joined(existing));
            }
            if let Some(waiter) = waiter {
                if let Some(path) = state.wait_path(identity, waiter) {
                    let mut chain = stack.as_slice().to_vec();
                    chain.extend(path);
                    return Err(TranspileError::CyclicDependency { chain });
                }
                state
                    .waits
                    .entry(waiter.clone())
                    .or_default()
                    .insert(identity.clone());
            }
            tracing::debug!("joined in-flight resolution of {}", identity);
            return Ok(Claim::Joined(existing));
        }

        let future = start().shared();
        state.entries.insert(identity.clone(), future.clone());
        state.order.push(identity.clone());
        if let Some(waiter) = waiter {
            state
                .waits
                .entry(waiter.clone())
                .or_default()
                .insert(identity.clone());
        }
        Ok(Claim::Created(future))
    }

    /// `waiter` is no longer blocked on `identity`.
    pub fn release_wait(&self, waiter: &Identity, identity: &Identity) {
        let mut state = self.lock();
        if let Some(targets) = state.waits.get_mut(waiter) {
            targets.remove(identity);
            if targets.is_empty() {
                state.waits.remove(waiter);
            }
        }
    }

    /// Drop every wait edge out of `waiter`.
    pub fn clear_waits(&self, waiter: &Identity) {
        self.lock().waits.remove(waiter);
    }

    pub fn contains(&self, identity: &Identity) -> bool {
        self.lock().entries.contains_key(identity)
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn status(&self, identity: &Identity) -> Option<EntryStatus> {
        self.lock().entries.get(identity).map(status_of)
    }

    /// Completed, successful entry for `identity`.
    pub fn get(&self, identity: &Identity) -> Option<CacheEntry> {
        let state = self.lock();
        match state.entries.get(identity)?.peek() {
            Some(Ok(entry)) => Some(entry.clone()),
            _ => None,
        }
    }

    /// Completed, successful entries in claim order.
    pub fn entries(&self) -> Vec<CacheEntry> {
        let state = self.lock();
        state
            .order
            .iter()
            .filter_map(|id| match state.entries.get(id)?.peek() {
                Some(Ok(entry)) => Some(entry.clone()),
                _ => None,
            })
            .collect()
    }

    /// Remove the entry so the next request resolves `identity` afresh.
    /// Callers already awaiting the old entry still receive its result.
    pub fn evict(&self, identity: &Identity) -> bool {
        let mut state = self.lock();
        let removed = state.entries.remove(identity).is_some();
        if removed {
            state.order.retain(|id| id != identity);
            tracing::debug!("evicted {}", identity);
        }
        removed
    }

    pub fn clear(&self) {
        let mut state = self.lock();
        state.entries.clear();
        state.order.clear();
    }

    /// Direct SFC children of every completed entry.
    pub fn graph(&self) -> BTreeMap<Identity, Vec<Identity>> {
        self.entries()
            .into_iter()
            .map(|entry| (entry.identity, entry.sfc.children.clone()))
            .collect()
    }

    pub fn snapshot(&self) -> CacheSnapshot {
        let state = self.lock();
        let mut snapshot = CacheSnapshot::default();

        for id in &state.order {
            let Some(future) = state.entries.get(id) else {
                continue;
            };
            match future.peek() {
                None => snapshot.pending.push(id.clone()),
                Some(Ok(entry)) => snapshot.entries.push(SnapshotEntry {
                    identity: entry.identity.clone(),
                    artifact_location: entry.artifact_location.clone(),
                    scope_id: entry.sfc.scope_id.clone(),
                    children: entry.sfc.children.clone(),
                }),
                Some(Err(err)) => snapshot.failed.push(FailedEntry {
                    identity: id.clone(),
                    code: err.code().to_string(),
                    message: err.to_string(),
                }),
            }
        }
        snapshot
    }
}

fn status_of(future: &EntryFuture) -> EntryStatus {
    match future.peek() {
        None => EntryStatus::Pending,
        Some(Ok(entry)) => EntryStatus::Ready(entry.artifact_location.clone()),
        Some(Err(err)) => EntryStatus::Failed(err.clone()),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SNAPSHOT
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheSnapshot {
    pub entries: Vec<SnapshotEntry>,
    pub pending: Vec<Identity>,
    pub failed: Vec<FailedEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotEntry {
    pub identity: Identity,
    pub artifact_location: ArtifactLocation,
    pub scope_id: Option<ScopeId>,
    pub children: Vec<Identity>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedEntry {
    pub identity: Identity,
    pub code: String,
    pub message: String,
}

impl CacheSnapshot {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
