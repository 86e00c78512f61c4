//! Point-in-time lookup of `FeatureGate` objects
//!
//! Observers only need to fetch the singleton `FeatureGate` by name, so the
//! source is a one-method trait. [`FeatureGateCache`] is a snapshot cache an
//! informer (or a test) feeds; reads are a single atomic load and never block
//! writers.

use arc_swap::ArcSwap;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::error::ListerError;
use crate::source::FeatureGate;

/// Read-only lookup of `FeatureGate` objects by name
pub trait FeatureGateLister: Send + Sync {
    /// Get the `FeatureGate` called `name`; `Ok(None)` when it does not exist
    fn get(&self, name: &str) -> Result<Option<Arc<FeatureGate>>, ListerError>;
}

impl<L: FeatureGateLister + ?Sized> FeatureGateLister for Arc<L> {
    fn get(&self, name: &str) -> Result<Option<Arc<FeatureGate>>, ListerError> {
        (**self).get(name)
    }
}

#[derive(Debug, Clone, Default)]
struct Snapshot {
    synced: bool,
    gates: HashMap<String, Arc<FeatureGate>>,
}

/// Snapshot cache of `FeatureGate` objects.
///
/// A freshly created cache is unsynced and every lookup fails with
/// [`ListerError::NotSynced`] until [`replace_all`](Self::replace_all) is
/// called. Clones share the same underlying snapshot.
#[derive(Debug, Clone, Default)]
pub struct FeatureGateCache {
    inner: Arc<ArcSwap<Snapshot>>,
}

impl FeatureGateCache {
    /// Create an empty, unsynced cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a synced cache holding `gates`
    pub fn with_gates(gates: impl IntoIterator<Item = FeatureGate>) -> Self {
        let cache = Self::new();
        cache.replace_all(gates);
        cache
    }

    /// Replace the whole content of the cache and mark it synced
    pub fn replace_all(&self, gates: impl IntoIterator<Item = FeatureGate>) {
        let gates: HashMap<_, _> = gates
            .into_iter()
            .map(|gate| (gate.name().to_string(), Arc::new(gate)))
            .collect();
        debug!(count = gates.len(), "Replacing feature gate cache");
        self.inner.store(Arc::new(Snapshot {
            synced: true,
            gates,
        }));
    }

    /// Insert or update a single `FeatureGate`
    pub fn upsert(&self, gate: FeatureGate) {
        let name = gate.name().to_string();
        let gate = Arc::new(gate);
        self.inner.rcu(|current| {
            let mut next = Snapshot::clone(current);
            next.gates.insert(name.clone(), Arc::clone(&gate));
            next
        });
        debug!(name = %name, "Updated feature gate in cache");
    }

    /// Remove a `FeatureGate`, returning it if it was cached
    pub fn remove(&self, name: &str) -> Option<Arc<FeatureGate>> {
        let previous = self.inner.rcu(|current| {
            let mut next = Snapshot::clone(current);
            next.gates.remove(name);
            next
        });
        previous.gates.get(name).cloned()
    }

    /// Mark the cache unsynced, e.g. after the watch connection was lost
    pub fn mark_unsynced(&self) {
        self.inner.rcu(|current| Snapshot {
            synced: false,
            gates: current.gates.clone(),
        });
    }

    pub fn is_synced(&self) -> bool {
        self.inner.load().synced
    }

    pub fn len(&self) -> usize {
        self.inner.load().gates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FeatureGateLister for FeatureGateCache {
    fn get(&self, name: &str) -> Result<Option<Arc<FeatureGate>>, ListerError> {
        let snapshot = self.inner.load();
        if !snapshot.synced {
            return Err(ListerError::NotSynced);
        }
        Ok(snapshot.gates.get(name).cloned())
    }
}
