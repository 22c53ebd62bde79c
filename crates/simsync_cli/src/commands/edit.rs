//! Edit command implementation.

use super::{report, CommandResult, Context};
use serde_json::Value;
use simsync_engine::StateTag;

/// Runs the edit command.
///
/// Loads the document, replaces the field at `pointer` with `json`, and
/// saves it. Stops at the first state that is not the expected one.
pub async fn run(
    ctx: &Context,
    collection: &str,
    id: &str,
    pointer: &str,
    json: &str,
) -> CommandResult {
    let field: Value = serde_json::from_str(json)
        .map_err(|e| format!("Field value is not valid JSON: {}", e))?;

    let sync = ctx.sync(collection);
    let key = sync.key(id);
    if let Some(load) = sync.load(id) {
        load.await?;
    }

    let state = sync.state(id);
    if state.tag() != StateTag::Loaded {
        return report(&key, &state);
    }
    if state
        .latest_value()
        .and_then(|value| value.pointer(pointer))
        .is_none()
    {
        return Err(format!("No field at {} in {}", pointer, key).into());
    }

    sync.mutate(id, |value| {
        if let Some(slot) = value.pointer_mut(pointer) {
            *slot = field;
        }
    })?;
    if let Some(save) = sync.save(id) {
        save.await?;
    }
    report(&key, &sync.state(id))
}
