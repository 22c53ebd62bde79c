//! Verb choreography for one collection.
//!
//! Each verb makes its optimistic transition synchronously, issues its
//! request before returning, and reconciles the outcome in a spawned task.
//! Completions carry the revision of the transition that issued them and
//! compare it with the entry's revision when they land, so a response that
//! was overtaken by a newer local change never clobbers it.

use crate::entity::{Entity, EntityState};
use crate::store::{Entry, ResourceStore, Transition};
use simsync_client::{HttpClient, RemoteClient, ReqwestClient};
use simsync_state::{mutate, AsyncState, ResourceKey, StateTag, SyncError, SyncResult};
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Synchronizes one collection of a [`ResourceStore`] with the document store.
///
/// Verbs return the handle of the reconciliation task, or `None` when the
/// current state does not allow the verb. They must be called from within a
/// Tokio runtime.
pub struct Synchronizer<E: Entity, C: HttpClient = ReqwestClient> {
    collection: String,
    client: Arc<RemoteClient<C>>,
    store: Arc<ResourceStore<E>>,
}

impl<E: Entity, C: HttpClient> Clone for Synchronizer<E, C> {
    fn clone(&self) -> Self {
        Self {
            collection: self.collection.clone(),
            client: Arc::clone(&self.client),
            store: Arc::clone(&self.store),
        }
    }
}

impl<E: Entity, C: HttpClient> Synchronizer<E, C> {
    /// Creates a synchronizer for `collection`.
    pub fn new(
        collection: impl Into<String>,
        client: Arc<RemoteClient<C>>,
        store: Arc<ResourceStore<E>>,
    ) -> Self {
        Self {
            collection: collection.into(),
            client,
            store,
        }
    }

    /// Returns the collection name.
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Returns the remote client.
    pub fn client(&self) -> &Arc<RemoteClient<C>> {
        &self.client
    }

    /// Returns the store.
    pub fn store(&self) -> &Arc<ResourceStore<E>> {
        &self.store
    }

    /// Returns the key of `id` in this collection.
    pub fn key(&self, id: &str) -> ResourceKey {
        ResourceKey::new(self.collection.as_str(), id)
    }

    /// Returns the current state of `id`.
    pub fn state(&self, id: &str) -> EntityState<E> {
        self.store.state(&self.key(id))
    }

    /// Fetches `id`.
    ///
    /// Ignored while a load is already in flight. A missing entity ends in
    /// `LoadFailed` with a 404 error; callers wanting create-on-missing issue
    /// [`create`](Self::create) in response.
    pub fn load(&self, id: &str) -> Option<JoinHandle<()>> {
        let key = self.key(id);
        let issued = self.store.dispatch(&key, |entry| match entry {
            Some(Entry {
                state: AsyncState::Loading { .. },
                ..
            }) => Transition::Keep,
            entry => Transition::Set(AsyncState::loading(
                entry.and_then(|e| e.state.brief().cloned()),
            )),
        });
        let Some(issued) = issued else {
            debug!(key = %key, "load already in flight");
            return None;
        };

        debug!(key = %key, "loading");
        let request = self.client.get::<E>(&key);
        let store = Arc::clone(&self.store);

        Some(tokio::spawn(async move {
            let outcome = request.await;
            if let Err(error) = &outcome {
                warn!(key = %key, %error, "load failed");
            }

            let applied = store.dispatch(&key, |entry| match entry {
                Some(entry) if entry.revision == issued.revision => {
                    let brief = entry.state.brief().cloned();
                    Transition::Set(match outcome {
                        Ok(Some(value)) => {
                            let brief = brief.or_else(|| Some(value.brief()));
                            AsyncState::loaded(brief, value)
                        }
                        Ok(None) => AsyncState::load_failed(brief, SyncError::not_found()),
                        Err(error) => AsyncState::load_failed(brief, error),
                    })
                }
                _ => Transition::Keep,
            });
            if applied.is_none() {
                debug!(key = %key, "dropping stale load completion");
            }
        }))
    }

    /// Persists a brand-new entity under `id`.
    ///
    /// Ignored while a create of `id` is already in flight.
    pub fn create(&self, id: &str, value: E) -> Option<JoinHandle<()>> {
        let key = self.key(id);
        let creating = AsyncState::creating(value.clone());
        let issued = self.store.dispatch(&key, |entry| match entry {
            Some(Entry {
                state: AsyncState::Creating { .. },
                ..
            }) => Transition::Keep,
            _ => Transition::Set(creating),
        });
        let Some(issued) = issued else {
            debug!(key = %key, "create already in flight");
            return None;
        };

        debug!(key = %key, "creating");
        let request = self.client.set(&key, &value);
        let store = Arc::clone(&self.store);

        Some(tokio::spawn(async move {
            let outcome = request.await;
            if let Err(error) = &outcome {
                warn!(key = %key, %error, "create failed");
            }

            let applied = store.dispatch(&key, |entry| match entry {
                Some(entry) if entry.revision == issued.revision => {
                    Transition::Set(match outcome {
                        Ok(()) => AsyncState::loaded(Some(value.brief()), value),
                        Err(error) => AsyncState::create_failed(value, error),
                    })
                }
                _ => Transition::Keep,
            });
            if applied.is_none() {
                debug!(key = %key, "dropping stale create completion");
            }
        }))
    }

    /// Sends the pending edit of `id`.
    ///
    /// Accepted from `Saveable`, and from `SaveFailed` as a retry; ignored in
    /// every other state.
    pub fn save(&self, id: &str) -> Option<JoinHandle<()>> {
        let key = self.key(id);
        let mut pending = None;
        let issued = self.store.dispatch(&key, |entry| match entry.map(|e| &e.state) {
            Some(AsyncState::Saveable {
                brief,
                original,
                value,
            })
            | Some(AsyncState::SaveFailed {
                brief,
                original,
                value,
                ..
            }) => {
                pending = Some((original.clone(), value.clone()));
                Transition::Set(AsyncState::saving(
                    brief.clone(),
                    original.clone(),
                    value.clone(),
                ))
            }
            _ => Transition::Keep,
        });
        let (issued, original, saved) = match (issued, pending) {
            (Some(issued), Some((original, saved))) => (issued, original, saved),
            _ => {
                debug!(key = %key, "nothing to save");
                return None;
            }
        };

        debug!(key = %key, "saving");
        let request = self.client.set(&key, &saved);
        let store = Arc::clone(&self.store);

        Some(tokio::spawn(async move {
            let outcome = request.await;
            if let Err(error) = &outcome {
                warn!(key = %key, %error, "save failed");
            }

            let applied = store.dispatch(&key, |entry| match entry {
                Some(entry) => settle_save(entry, issued.revision, original, saved, outcome),
                None => Transition::Keep,
            });
            if applied.is_none() {
                debug!(key = %key, "dropping stale save completion");
            }
        }))
    }

    /// Removes `id` from the document store.
    ///
    /// Ignored while a delete of `id` is already in flight. On success the
    /// entry disappears from the store.
    pub fn delete(&self, id: &str) -> Option<JoinHandle<()>> {
        let key = self.key(id);
        let issued = self.store.dispatch(&key, |entry| match entry.map(|e| &e.state) {
            Some(AsyncState::Deleting { .. }) => Transition::Keep,
            current => Transition::Set(AsyncState::deleting(
                current.and_then(|s| s.brief().cloned()),
                current.and_then(|s| s.latest_value().cloned()),
            )),
        });
        let Some(issued) = issued else {
            debug!(key = %key, "delete already in flight");
            return None;
        };

        debug!(key = %key, "deleting");
        let request = self.client.delete(&key);
        let store = Arc::clone(&self.store);

        Some(tokio::spawn(async move {
            let outcome = request.await;
            if let Err(error) = &outcome {
                warn!(key = %key, %error, "delete failed");
            }

            let applied = store.dispatch(&key, |entry| match entry {
                Some(entry) if entry.revision == issued.revision => match (outcome, &entry.state) {
                    (Ok(()), _) => Transition::Remove,
                    (Err(error), AsyncState::Deleting { brief, value }) => Transition::Set(
                        AsyncState::delete_failed(brief.clone(), value.clone(), error),
                    ),
                    (Err(_), _) => Transition::Keep,
                },
                _ => Transition::Keep,
            });
            if applied.is_none() {
                debug!(key = %key, "dropping stale delete completion");
            }
        }))
    }

    /// Applies a local edit to `id` without touching the network.
    ///
    /// The recipe runs while the store is locked and must not call back into
    /// it.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidMutation`] if `id` has no editable value.
    pub fn mutate<F>(&self, id: &str, recipe: F) -> SyncResult<()>
    where
        F: FnOnce(&mut E),
    {
        let key = self.key(id);
        let mut result = Ok(());
        self.store.dispatch(&key, |entry| {
            let unloaded = EntityState::<E>::default();
            let current = entry.map_or(&unloaded, |e| &e.state);
            match mutate(&key, current, recipe) {
                Ok(next) => Transition::Set(next),
                Err(error) => {
                    result = Err(error);
                    Transition::Keep
                }
            }
        });
        result
    }

    /// Fetches the whole collection.
    ///
    /// Every listed entity becomes `Loaded` unless its entry carries local
    /// work or a request in flight; those are left alone. Resolves to the
    /// number of entries updated. A failure changes no entry.
    pub fn load_all(&self) -> impl Future<Output = SyncResult<usize>> + Send + 'static {
        debug!(collection = %self.collection, "listing");
        let request = self.client.list::<E>(&self.collection);
        let store = Arc::clone(&self.store);
        let collection = self.collection.clone();

        async move {
            let values = request.await.map_err(|error| {
                warn!(collection = %collection, %error, "list failed");
                error
            })?;

            let listed = values.len();
            let mut applied = 0;
            for (id, value) in values {
                let key = ResourceKey::new(collection.as_str(), id);
                let brief = value.brief();
                let event = store.dispatch(&key, |entry| match entry.map(|e| e.state.tag()) {
                    None
                    | Some(StateTag::Unloaded | StateTag::Loaded | StateTag::LoadFailed) => {
                        Transition::Set(AsyncState::loaded(Some(brief), value))
                    }
                    Some(_) => Transition::Keep,
                });
                applied += usize::from(event.is_some());
            }

            debug!(collection = %collection, listed, applied, "listed");
            Ok::<_, SyncError>(applied)
        }
    }

    /// Throws away the pending edit of `id`, returning to the persisted value.
    ///
    /// Only applies to `Saveable` and `SaveFailed`. Returns true if the entry
    /// changed.
    pub fn discard(&self, id: &str) -> bool {
        self.store
            .dispatch(&self.key(id), |entry| match entry {
                Some(entry)
                    if entry.state.has_unsaved_changes() && !entry.state.is_in_flight() =>
                {
                    entry
                        .state
                        .reset()
                        .map_or(Transition::Keep, Transition::Set)
                }
                _ => Transition::Keep,
            })
            .is_some()
    }

    /// Clears the stored failure of `id`, keeping its local values.
    ///
    /// A failed creation has nowhere to go and falls back to `Unloaded`; its
    /// value is handed back instead of being dropped.
    pub fn clear_error(&self, id: &str) -> Option<E> {
        let mut abandoned = None;
        self.store.dispatch(&self.key(id), |entry| match entry {
            Some(entry) if entry.state.is_failed() => {
                if let AsyncState::CreateFailed { value, .. } = &entry.state {
                    abandoned = Some(value.clone());
                }
                Transition::Set(entry.state.unfail())
            }
            _ => Transition::Keep,
        });
        abandoned
    }
}

/// Reconciles a save of `saved` issued at revision `issued` with the entry it
/// finds on completion.
///
/// - Unchanged entry: `Loaded` on success, `SaveFailed` on failure.
/// - Newer edit pending (`Saveable`/`SaveFailed`): on success the edit stays
///   pending on top of the new baseline; on failure a `Saveable` edit becomes
///   `SaveFailed`.
/// - Newer save in flight: only its baseline moves.
/// - Load in flight: the save wins and the load's completion goes stale. A
///   failed save lands in `SaveFailed` so the edit outlives the load.
fn settle_save<E: Entity>(
    entry: &Entry<E>,
    issued: u64,
    original: E,
    saved: E,
    outcome: SyncResult<()>,
) -> Transition<EntityState<E>> {
    let current = &entry.state;
    let unchanged = entry.revision == issued;

    match outcome {
        Ok(()) if unchanged => Transition::Set(AsyncState::loaded(current.brief().cloned(), saved)),
        Ok(()) => match current {
            AsyncState::Saveable { brief, value, .. } | AsyncState::SaveFailed { brief, value, .. } => {
                Transition::Set(AsyncState::saveable(brief.clone(), saved, value.clone()))
            }
            AsyncState::Saving { brief, value, .. } => {
                Transition::Set(AsyncState::saving(brief.clone(), saved, value.clone()))
            }
            AsyncState::Loading { brief } => {
                Transition::Set(AsyncState::loaded(brief.clone(), saved))
            }
            _ => Transition::Keep,
        },
        Err(error) => match current {
            AsyncState::Saving {
                brief,
                original,
                value,
            } if unchanged => Transition::Set(AsyncState::save_failed(
                brief.clone(),
                original.clone(),
                value.clone(),
                error,
            )),
            AsyncState::Saveable {
                brief,
                original,
                value,
            } if !unchanged => Transition::Set(AsyncState::save_failed(
                brief.clone(),
                original.clone(),
                value.clone(),
                error,
            )),
            AsyncState::Loading { brief } => Transition::Set(AsyncState::save_failed(
                brief.clone(),
                original,
                saved,
                error,
            )),
            _ => Transition::Keep,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn entry(state: EntityState<Value>, revision: u64) -> Entry<Value> {
        Entry { state, revision }
    }

    fn set(transition: Transition<EntityState<Value>>) -> EntityState<Value> {
        match transition {
            Transition::Set(state) => state,
            other => panic!("expected a new state, got {:?}", other),
        }
    }

    #[test]
    fn clean_save_loads() {
        let saving = entry(AsyncState::saving(None, json!(1), json!(2)), 7);
        let next = set(settle_save(&saving, 7, json!(1), json!(2), Ok(())));
        assert_eq!(next, AsyncState::loaded(None, json!(2)));
    }

    #[test]
    fn newer_edit_survives_success() {
        let edited = entry(AsyncState::saveable(None, json!(1), json!(3)), 9);
        let next = set(settle_save(&edited, 7, json!(1), json!(2), Ok(())));
        assert_eq!(next, AsyncState::saveable(None, json!(2), json!(3)));
    }

    #[test]
    fn newer_save_in_flight_gets_new_baseline() {
        let saving = entry(AsyncState::saving(None, json!(1), json!(3)), 9);
        let next = set(settle_save(&saving, 7, json!(1), json!(2), Ok(())));
        assert_eq!(next, AsyncState::saving(None, json!(2), json!(3)));
    }

    #[test]
    fn save_beats_concurrent_load() {
        let loading = entry(AsyncState::loading(Some(json!({"name": "A"}))), 9);
        let next = set(settle_save(&loading, 7, json!(1), json!(2), Ok(())));
        assert_eq!(next, AsyncState::loaded(Some(json!({"name": "A"})), json!(2)));
    }

    #[test]
    fn failure_keeps_edit() {
        let error = SyncError::db(500, "db unavailable");
        let saving = entry(AsyncState::saving(None, json!(1), json!(2)), 7);
        let next = set(settle_save(&saving, 7, json!(1), json!(2), Err(error.clone())));
        assert_eq!(
            next,
            AsyncState::save_failed(None, json!(1), json!(2), error.clone())
        );

        let edited = entry(AsyncState::saveable(None, json!(1), json!(3)), 9);
        let next = set(settle_save(&edited, 7, json!(1), json!(2), Err(error.clone())));
        assert_eq!(next, AsyncState::save_failed(None, json!(1), json!(3), error));
    }

    #[test]
    fn failure_during_load_keeps_edit() {
        let error = SyncError::db(500, "db unavailable");
        let loading = entry(AsyncState::loading(Some(json!({"name": "A"}))), 9);
        let next = set(settle_save(&loading, 7, json!(1), json!(2), Err(error.clone())));
        assert_eq!(
            next,
            AsyncState::save_failed(Some(json!({"name": "A"})), json!(1), json!(2), error)
        );
    }

    #[test]
    fn stale_completions_are_dropped() {
        let deleting = entry(AsyncState::deleting(None, Some(json!(2))), 9);
        assert!(matches!(
            settle_save(&deleting, 7, json!(1), json!(2), Ok(())),
            Transition::Keep
        ));

        let loaded = entry(AsyncState::loaded(None, json!(3)), 9);
        assert!(matches!(
            settle_save(&loaded, 7, json!(1), json!(2), Ok(())),
            Transition::Keep
        ));

        let saving = entry(AsyncState::saving(None, json!(1), json!(3)), 9);
        assert!(matches!(
            settle_save(&saving, 7, json!(1), json!(2), Err(SyncError::transport("offline"))),
            Transition::Keep
        ));
    }
}
