//! Draft mutation.
//!
//! Edits are copy-on-write: the current value is cloned, the recipe edits the
//! clone through a plain `&mut`, and a new `Saveable` state is returned. The
//! input state is never touched, so a recipe that panics leaves it intact.

use crate::error::{SyncError, SyncResult};
use crate::key::ResourceKey;
use crate::state::AsyncState;

/// Applies a local edit to the value held by `current`.
///
/// Accepted from `Loaded`, `Saveable`, `Saving` and `SaveFailed`. The
/// `original` baseline is carried over from a pending edit when there is one,
/// otherwise it is the loaded value, so chained edits before a save never
/// move the baseline.
///
/// # Errors
///
/// Returns [`SyncError::InvalidMutation`] for every other state; there is no
/// editable value to start from.
pub fn mutate<B, V, F>(
    key: &ResourceKey,
    current: &AsyncState<B, V>,
    recipe: F,
) -> SyncResult<AsyncState<B, V>>
where
    B: Clone,
    V: Clone,
    F: FnOnce(&mut V),
{
    let (brief, original, mut draft) = match current {
        AsyncState::Loaded { brief, value } => (brief.clone(), value.clone(), value.clone()),
        AsyncState::Saveable {
            brief,
            original,
            value,
        }
        | AsyncState::Saving {
            brief,
            original,
            value,
        }
        | AsyncState::SaveFailed {
            brief,
            original,
            value,
            ..
        } => (brief.clone(), original.clone(), value.clone()),
        other => {
            return Err(SyncError::InvalidMutation {
                key: key.clone(),
                state: other.tag(),
            })
        }
    };

    recipe(&mut draft);

    Ok(AsyncState::saveable(brief, original, draft))
}
