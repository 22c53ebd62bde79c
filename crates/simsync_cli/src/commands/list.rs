//! List command implementation.

use super::{CommandResult, Context, Outcome};
use serde_json::Value;
use simsync_engine::EntityState;
use std::collections::BTreeMap;

/// Runs the list command.
pub async fn run(ctx: &Context, collection: &str) -> CommandResult {
    let sync = ctx.sync(collection);
    let loaded = sync.load_all().await?;
    tracing::debug!(collection, loaded, "collection listed");

    let states: BTreeMap<String, EntityState<Value>> = sync
        .store()
        .keys(collection)
        .into_iter()
        .map(|key| {
            let state = sync.store().state(&key);
            (key.id().to_string(), state)
        })
        .collect();

    println!("{}", serde_json::to_string_pretty(&states)?);
    Ok(Outcome::Settled)
}
