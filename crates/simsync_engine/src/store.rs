//! Keyed resource dictionary.
//!
//! The store is the only shared mutable state of the engine. Every change goes
//! through [`ResourceStore::dispatch`], which runs a reducer against the
//! current entry under the write lock, stamps the result with a fresh
//! revision and notifies subscribers.

use crate::entity::{Entity, EntityState};
use parking_lot::RwLock;
use simsync_state::ResourceKey;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::broadcast;
use tracing::trace;

/// Number of events a lagging subscriber may fall behind before losing some.
const EVENT_BUFFER: usize = 256;

/// One entry of the store.
#[derive(Debug, Clone)]
pub struct Entry<E: Entity> {
    /// Current state.
    pub state: EntityState<E>,
    /// Revision stamped by the transition that produced `state`.
    pub revision: u64,
}

/// Result of a reducer passed to [`ResourceStore::dispatch`].
#[derive(Debug, Clone)]
pub enum Transition<S> {
    /// Leave the entry as it is.
    Keep,
    /// Replace (or insert) the entry's state.
    Set(S),
    /// Remove the entry.
    Remove,
}

/// What happened to an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// The entry was inserted or replaced.
    Updated,
    /// The entry was removed.
    Removed,
}

/// Notification emitted after every applied transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreEvent {
    /// Affected key.
    pub key: ResourceKey,
    /// Revision of the transition.
    pub revision: u64,
    /// Kind of change.
    pub kind: EventKind,
}

struct Inner<E: Entity> {
    entries: HashMap<ResourceKey, Entry<E>>,
    last_revision: u64,
}

/// Keyed dictionary of entity states.
///
/// Revisions are drawn from one counter per store, so they increase
/// monotonically across all keys and a removed key never sees an old
/// revision again.
pub struct ResourceStore<E: Entity> {
    inner: RwLock<Inner<E>>,
    events: broadcast::Sender<StoreEvent>,
}

impl<E: Entity> ResourceStore<E> {
    /// Creates an empty store.
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            inner: RwLock::new(Inner {
                entries: HashMap::new(),
                last_revision: 0,
            }),
            events,
        }
    }

    /// Creates a store seeded with built-in entries.
    pub fn with_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (ResourceKey, EntityState<E>)>,
    {
        let store = Self::new();
        {
            let mut inner = store.inner.write();
            for (key, state) in entries {
                inner.last_revision += 1;
                let revision = inner.last_revision;
                inner.entries.insert(key, Entry { state, revision });
            }
        }
        store
    }

    /// Returns a copy of the entry at `key`.
    pub fn get(&self, key: &ResourceKey) -> Option<Entry<E>> {
        self.inner.read().entries.get(key).cloned()
    }

    /// Returns the state at `key`; keys never seen are `Unloaded`.
    pub fn state(&self, key: &ResourceKey) -> EntityState<E> {
        self.inner
            .read()
            .entries
            .get(key)
            .map(|entry| entry.state.clone())
            .unwrap_or_default()
    }

    /// Returns the revision of the entry at `key`.
    pub fn revision(&self, key: &ResourceKey) -> Option<u64> {
        self.inner.read().entries.get(key).map(|entry| entry.revision)
    }

    /// Returns true if the store has an entry at `key`.
    pub fn contains(&self, key: &ResourceKey) -> bool {
        self.inner.read().entries.contains_key(key)
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    /// Returns true if the store has no entries.
    pub fn is_empty(&self) -> bool {
        self.inner.read().entries.is_empty()
    }

    /// Returns the keys of one collection, sorted.
    pub fn keys(&self, collection: &str) -> Vec<ResourceKey> {
        let mut keys: Vec<_> = self
            .inner
            .read()
            .entries
            .keys()
            .filter(|key| key.collection() == collection)
            .cloned()
            .collect();
        keys.sort();
        keys
    }

    /// Returns a sorted copy of every state.
    pub fn snapshot(&self) -> BTreeMap<ResourceKey, EntityState<E>> {
        self.inner
            .read()
            .entries
            .iter()
            .map(|(key, entry)| (key.clone(), entry.state.clone()))
            .collect()
    }

    /// Subscribes to store events.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    /// Replaces the state at `key`, returning the new revision.
    pub fn set(&self, key: &ResourceKey, state: EntityState<E>) -> u64 {
        self.dispatch(key, |_| Transition::Set(state))
            .map_or(0, |event| event.revision)
    }

    /// Removes the entry at `key`. Returns false if there was none.
    pub fn remove(&self, key: &ResourceKey) -> bool {
        self.dispatch(key, |entry| match entry {
            Some(_) => Transition::Remove,
            None => Transition::Keep,
        })
        .is_some()
    }

    /// Applies `reducer` to the entry at `key` atomically.
    ///
    /// The reducer sees the current entry (`None` if absent) and decides what
    /// happens to it. It runs under the store's write lock and must not call
    /// back into the store. Returns the emitted event, or `None` if nothing
    /// changed.
    pub fn dispatch<F>(&self, key: &ResourceKey, reducer: F) -> Option<StoreEvent>
    where
        F: FnOnce(Option<&Entry<E>>) -> Transition<EntityState<E>>,
    {
        let event = {
            let mut inner = self.inner.write();
            match reducer(inner.entries.get(key)) {
                Transition::Keep => return None,
                Transition::Set(state) => {
                    inner.last_revision += 1;
                    let revision = inner.last_revision;
                    inner.entries.insert(key.clone(), Entry { state, revision });
                    StoreEvent {
                        key: key.clone(),
                        revision,
                        kind: EventKind::Updated,
                    }
                }
                Transition::Remove => {
                    inner.entries.remove(key)?;
                    inner.last_revision += 1;
                    StoreEvent {
                        key: key.clone(),
                        revision: inner.last_revision,
                        kind: EventKind::Removed,
                    }
                }
            }
        };

        trace!(key = %event.key, revision = event.revision, kind = ?event.kind, "store transition");
        // No subscribers is fine.
        let _ = self.events.send(event.clone());
        Some(event)
    }
}

impl<E: Entity> Default for ResourceStore<E> {
    fn default() -> Self {
        Self::new()
    }
}
