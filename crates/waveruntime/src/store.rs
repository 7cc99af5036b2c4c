//! Shared endpoint → value storage for one run.

use dashmap::DashMap;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use wavecore::{Endpoint, NodeKey};

/// Concurrency-safe map from endpoint to value.
///
/// Cloning the store clones the handle, not the contents. Writers to distinct
/// endpoints never contend on a lock the caller can see; readers always get
/// their own clone of the stored value.
pub struct DataStore<K, V> {
    entries: Arc<DashMap<Endpoint<K>, V>>,
}

impl<K, V> Clone for DataStore<K, V> {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
        }
    }
}

impl<K: NodeKey, V: Clone> DataStore<K, V> {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
        }
    }

    /// Store pre-seeded with `initial` entries.
    pub fn with_initial<I>(initial: I) -> Self
    where
        I: IntoIterator<Item = (Endpoint<K>, V)>,
    {
        Self {
            entries: Arc::new(initial.into_iter().collect()),
        }
    }

    /// A clone of the value at `endpoint`, or `None` when nothing was published there.
    pub fn get(&self, endpoint: &Endpoint<K>) -> Option<V> {
        self.entries.get(endpoint).map(|entry| entry.value().clone())
    }

    /// Same as [`get`](Self::get) without building the endpoint first.
    pub fn get_port(&self, node: &K, port: &str) -> Option<V> {
        self.get(&Endpoint::new(node.clone(), port))
    }

    pub fn contains(&self, endpoint: &Endpoint<K>) -> bool {
        self.entries.contains_key(endpoint)
    }

    /// Publish `value` at `endpoint`, returning whatever was there before.
    pub fn publish(&self, endpoint: Endpoint<K>, value: V) -> Option<V> {
        self.entries.insert(endpoint, value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Every port value published by `node`, keyed by port name.
    pub fn outputs_of(&self, node: &K) -> BTreeMap<String, V> {
        self.entries
            .iter()
            .filter(|entry| entry.key().node == *node)
            .map(|entry| (entry.key().port.clone(), entry.value().clone()))
            .collect()
    }

    /// Point-in-time copy of every entry.
    pub fn snapshot(&self) -> HashMap<Endpoint<K>, V> {
        self.entries
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    /// Consume the store, avoiding a copy when this is the last handle.
    pub fn into_map(self) -> HashMap<Endpoint<K>, V> {
        match Arc::try_unwrap(self.entries) {
            Ok(entries) => entries.into_iter().collect(),
            Err(shared) => DataStore { entries: shared }.snapshot(),
        }
    }
}

impl<K: NodeKey, V: Clone> Default for DataStore<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: NodeKey, V> fmt::Debug for DataStore<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<String> = self.entries.iter().map(|e| e.key().to_string()).collect();
        keys.sort();
        f.debug_struct("DataStore").field("endpoints", &keys).finish()
    }
}
