//! Put command implementation.

use super::{report, CommandResult, Context};
use serde_json::Value;
use uuid::Uuid;

/// Runs the put command.
pub async fn run(ctx: &Context, collection: &str, id: Option<String>, json: &str) -> CommandResult {
    let value: Value = serde_json::from_str(json)
        .map_err(|e| format!("Document body is not valid JSON: {}", e))?;
    let id = id.unwrap_or_else(|| Uuid::new_v4().to_string());

    let sync = ctx.sync(collection);
    if let Some(create) = sync.create(&id, value) {
        create.await?;
    }
    report(&sync.key(&id), &sync.state(&id))
}
