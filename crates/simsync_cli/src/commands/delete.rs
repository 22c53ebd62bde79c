//! Delete command implementation.

use super::{report, CommandResult, Context, Outcome};
use serde_json::json;

/// Runs the delete command.
pub async fn run(ctx: &Context, collection: &str, id: &str) -> CommandResult {
    let sync = ctx.sync(collection);
    let key = sync.key(id);
    if let Some(delete) = sync.delete(id) {
        delete.await?;
    }

    match sync.store().get(&key) {
        Some(entry) => report(&key, &entry.state),
        None => {
            let deleted = json!({ "key": key, "state": "deleted" });
            println!("{}", serde_json::to_string_pretty(&deleted)?);
            Ok(Outcome::Settled)
        }
    }
}
