//! Get command implementation.

use super::{report, CommandResult, Context};

/// Runs the get command.
pub async fn run(ctx: &Context, collection: &str, id: &str) -> CommandResult {
    let sync = ctx.sync(collection);
    if let Some(load) = sync.load(id) {
        load.await?;
    }
    report(&sync.key(id), &sync.state(id))
}
