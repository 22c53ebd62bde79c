//! Prefetch planning.

use crate::entity::{Entity, EntityState};
use crate::synchronizer::Synchronizer;
use futures::future::join_all;
use simsync_client::HttpClient;
use simsync_state::{AsyncState, ResourceKey};
use std::collections::HashSet;
use tokio::task::JoinHandle;
use tracing::warn;

type Loader = Box<dyn FnOnce() -> Option<JoinHandle<()>> + Send>;

/// Collects the entities a view needs and loads the missing ones in one go.
///
/// A plan may span collections: each [`require`](Self::require) names the
/// synchronizer responsible for the id, so a caller can require a challenge,
/// read the scene id out of it, and require that scene too.
#[derive(Default)]
pub struct LoadPlan {
    planned: HashSet<ResourceKey>,
    loads: Vec<(ResourceKey, Loader)>,
}

impl LoadPlan {
    /// Creates an empty plan.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current state of `id` and plans a load if it is `Unloaded`.
    ///
    /// Each key is planned at most once.
    pub fn require<E, C>(&mut self, sync: &Synchronizer<E, C>, id: &str) -> EntityState<E>
    where
        E: Entity,
        C: HttpClient,
    {
        let state = sync.state(id);
        if matches!(state, AsyncState::Unloaded { .. }) {
            let key = sync.key(id);
            if self.planned.insert(key.clone()) {
                let sync = sync.clone();
                let id = id.to_string();
                self.loads.push((key, Box::new(move || sync.load(&id))));
            }
        }
        state
    }

    /// Returns the planned keys in the order they were required.
    pub fn keys(&self) -> impl Iterator<Item = &ResourceKey> {
        self.loads.iter().map(|(key, _)| key)
    }

    /// Returns the number of planned loads.
    pub fn len(&self) -> usize {
        self.loads.len()
    }

    /// Returns true if nothing needs loading.
    pub fn is_empty(&self) -> bool {
        self.loads.is_empty()
    }

    /// Issues every planned load, in the order the keys were required.
    pub fn dispatch(self) -> Vec<JoinHandle<()>> {
        self.loads
            .into_iter()
            .filter_map(|(_, load)| load())
            .collect()
    }

    /// Issues every planned load and waits for all of them to settle.
    pub async fn run(self) {
        for joined in join_all(self.dispatch()).await {
            if let Err(error) = joined {
                warn!(%error, "load task did not complete");
            }
        }
    }
}
