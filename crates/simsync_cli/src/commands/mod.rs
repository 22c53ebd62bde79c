//! CLI command implementations.

pub mod delete;
pub mod edit;
pub mod get;
pub mod list;
pub mod put;

use serde::Serialize;
use serde_json::Value;
use simsync_client::{ClientConfig, RemoteClient};
use simsync_engine::{EntityState, ResourceKey, ResourceStore, SyncResult, Synchronizer};
use std::process::ExitCode;
use std::sync::Arc;

/// Result type of a command.
pub type CommandResult = Result<Outcome, Box<dyn std::error::Error>>;

/// How a command ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The document ended in a settled state.
    Settled,
    /// The document ended in a `*Failed` state.
    Failed,
}

impl Outcome {
    /// Classifies a final state.
    pub fn of(state: &EntityState<Value>) -> Self {
        if state.is_failed() {
            Outcome::Failed
        } else {
            Outcome::Settled
        }
    }

    /// Returns the process exit code.
    pub fn exit_code(self) -> ExitCode {
        match self {
            Outcome::Settled => ExitCode::SUCCESS,
            Outcome::Failed => ExitCode::FAILURE,
        }
    }
}

/// Shared client and store for one invocation.
pub struct Context {
    client: Arc<RemoteClient>,
    store: Arc<ResourceStore<Value>>,
}

impl Context {
    /// Connects to the document store.
    pub fn connect(config: ClientConfig) -> SyncResult<Self> {
        Ok(Self {
            client: Arc::new(RemoteClient::connect(config)?),
            store: Arc::new(ResourceStore::new()),
        })
    }

    /// Returns a synchronizer for `collection`.
    pub fn sync(&self, collection: &str) -> Synchronizer<Value> {
        Synchronizer::new(collection, Arc::clone(&self.client), Arc::clone(&self.store))
    }
}

#[derive(Serialize)]
struct Report<'a> {
    key: &'a ResourceKey,
    #[serde(flatten)]
    state: &'a EntityState<Value>,
}

/// Prints the state of `key` as JSON and classifies it.
pub fn report(key: &ResourceKey, state: &EntityState<Value>) -> CommandResult {
    println!("{}", serde_json::to_string_pretty(&Report { key, state })?);
    Ok(Outcome::of(state))
}
