//! Resource state tagged union.

use crate::error::SyncError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The synchronization status of one entity.
///
/// `B` is the brief (a lightweight summary usable for list rendering),
/// `V` the fully hydrated value. Exactly one variant is active at a time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum AsyncState<B, V> {
    /// Known to exist but not fetched.
    Unloaded {
        /// Summary, if known.
        #[serde(skip_serializing_if = "Option::is_none")]
        brief: Option<B>,
    },
    /// Fetch in flight.
    Loading {
        /// Summary, if known.
        #[serde(skip_serializing_if = "Option::is_none")]
        brief: Option<B>,
    },
    /// Authoritative local copy with no pending edits.
    Loaded {
        /// Summary.
        #[serde(skip_serializing_if = "Option::is_none")]
        brief: Option<B>,
        /// Value.
        value: V,
    },
    /// Fetch failed; no value available.
    LoadFailed {
        /// Summary, if known.
        #[serde(skip_serializing_if = "Option::is_none")]
        brief: Option<B>,
        /// Failure.
        error: SyncError,
    },
    /// A new entity is being persisted for the first time.
    Creating {
        /// Value being created.
        value: V,
    },
    /// Creation failed; the value is retained client-side.
    CreateFailed {
        /// Value that failed to be created.
        value: V,
        /// Failure.
        error: SyncError,
    },
    /// Locally mutated and not yet sent, or superseded by a newer edit.
    Saveable {
        /// Summary.
        #[serde(skip_serializing_if = "Option::is_none")]
        brief: Option<B>,
        /// Last persisted value.
        original: V,
        /// Edited value.
        value: V,
    },
    /// A save of `value` is in flight.
    Saving {
        /// Summary.
        #[serde(skip_serializing_if = "Option::is_none")]
        brief: Option<B>,
        /// Last persisted value.
        original: V,
        /// Value being saved.
        value: V,
    },
    /// Save failed; the local edit is retained.
    SaveFailed {
        /// Summary.
        #[serde(skip_serializing_if = "Option::is_none")]
        brief: Option<B>,
        /// Last persisted value.
        original: V,
        /// Edited value that failed to save.
        value: V,
        /// Failure.
        error: SyncError,
    },
    /// Delete in flight.
    Deleting {
        /// Summary.
        #[serde(skip_serializing_if = "Option::is_none")]
        brief: Option<B>,
        /// Latest value at the time of deletion, if one was loaded.
        #[serde(skip_serializing_if = "Option::is_none")]
        value: Option<V>,
    },
    /// Delete failed; the entity is still considered present.
    DeleteFailed {
        /// Summary.
        #[serde(skip_serializing_if = "Option::is_none")]
        brief: Option<B>,
        /// Latest value at the time of deletion, if one was loaded.
        #[serde(skip_serializing_if = "Option::is_none")]
        value: Option<V>,
        /// Failure.
        error: SyncError,
    },
}

/// Fieldless discriminant of [`AsyncState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateTag {
    /// See [`AsyncState::Unloaded`].
    Unloaded,
    /// See [`AsyncState::Loading`].
    Loading,
    /// See [`AsyncState::Loaded`].
    Loaded,
    /// See [`AsyncState::LoadFailed`].
    LoadFailed,
    /// See [`AsyncState::Creating`].
    Creating,
    /// See [`AsyncState::CreateFailed`].
    CreateFailed,
    /// See [`AsyncState::Saveable`].
    Saveable,
    /// See [`AsyncState::Saving`].
    Saving,
    /// See [`AsyncState::SaveFailed`].
    SaveFailed,
    /// See [`AsyncState::Deleting`].
    Deleting,
    /// See [`AsyncState::DeleteFailed`].
    DeleteFailed,
}

impl StateTag {
    /// Returns the snake_case name of the tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            StateTag::Unloaded => "unloaded",
            StateTag::Loading => "loading",
            StateTag::Loaded => "loaded",
            StateTag::LoadFailed => "load_failed",
            StateTag::Creating => "creating",
            StateTag::CreateFailed => "create_failed",
            StateTag::Saveable => "saveable",
            StateTag::Saving => "saving",
            StateTag::SaveFailed => "save_failed",
            StateTag::Deleting => "deleting",
            StateTag::DeleteFailed => "delete_failed",
        }
    }

    /// Returns true if a network operation is in flight in this state.
    pub fn is_in_flight(&self) -> bool {
        matches!(
            self,
            StateTag::Loading | StateTag::Creating | StateTag::Saving | StateTag::Deleting
        )
    }

    /// Returns true for the `*Failed` tags.
    pub fn is_failed(&self) -> bool {
        matches!(
            self,
            StateTag::LoadFailed
                | StateTag::CreateFailed
                | StateTag::SaveFailed
                | StateTag::DeleteFailed
        )
    }
}

impl fmt::Display for StateTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<B, V> Default for AsyncState<B, V> {
    fn default() -> Self {
        Self::Unloaded { brief: None }
    }
}

impl<B, V> AsyncState<B, V> {
    /// Creates an `Unloaded` state.
    pub fn unloaded(brief: Option<B>) -> Self {
        Self::Unloaded { brief }
    }

    /// Creates a `Loading` state.
    pub fn loading(brief: Option<B>) -> Self {
        Self::Loading { brief }
    }

    /// Creates a `Loaded` state.
    pub fn loaded(brief: Option<B>, value: V) -> Self {
        Self::Loaded { brief, value }
    }

    /// Creates a `LoadFailed` state.
    pub fn load_failed(brief: Option<B>, error: SyncError) -> Self {
        Self::LoadFailed { brief, error }
    }

    /// Creates a `Creating` state.
    pub fn creating(value: V) -> Self {
        Self::Creating { value }
    }

    /// Creates a `CreateFailed` state.
    pub fn create_failed(value: V, error: SyncError) -> Self {
        Self::CreateFailed { value, error }
    }

    /// Creates a `Saveable` state.
    pub fn saveable(brief: Option<B>, original: V, value: V) -> Self {
        Self::Saveable {
            brief,
            original,
            value,
        }
    }

    /// Creates a `Saving` state.
    pub fn saving(brief: Option<B>, original: V, value: V) -> Self {
        Self::Saving {
            brief,
            original,
            value,
        }
    }

    /// Creates a `SaveFailed` state.
    pub fn save_failed(brief: Option<B>, original: V, value: V, error: SyncError) -> Self {
        Self::SaveFailed {
            brief,
            original,
            value,
            error,
        }
    }

    /// Creates a `Deleting` state.
    pub fn deleting(brief: Option<B>, value: Option<V>) -> Self {
        Self::Deleting { brief, value }
    }

    /// Creates a `DeleteFailed` state.
    pub fn delete_failed(brief: Option<B>, value: Option<V>, error: SyncError) -> Self {
        Self::DeleteFailed {
            brief,
            value,
            error,
        }
    }

    /// Returns the active tag.
    pub fn tag(&self) -> StateTag {
        match self {
            AsyncState::Unloaded { .. } => StateTag::Unloaded,
            AsyncState::Loading { .. } => StateTag::Loading,
            AsyncState::Loaded { .. } => StateTag::Loaded,
            AsyncState::LoadFailed { .. } => StateTag::LoadFailed,
            AsyncState::Creating { .. } => StateTag::Creating,
            AsyncState::CreateFailed { .. } => StateTag::CreateFailed,
            AsyncState::Saveable { .. } => StateTag::Saveable,
            AsyncState::Saving { .. } => StateTag::Saving,
            AsyncState::SaveFailed { .. } => StateTag::SaveFailed,
            AsyncState::Deleting { .. } => StateTag::Deleting,
            AsyncState::DeleteFailed { .. } => StateTag::DeleteFailed,
        }
    }

    /// Returns the best available summary.
    ///
    /// Never requires a fetch: `Creating`/`CreateFailed` carry no brief.
    pub fn brief(&self) -> Option<&B> {
        match self {
            AsyncState::Unloaded { brief }
            | AsyncState::Loading { brief }
            | AsyncState::Loaded { brief, .. }
            | AsyncState::LoadFailed { brief, .. }
            | AsyncState::Saveable { brief, .. }
            | AsyncState::Saving { brief, .. }
            | AsyncState::SaveFailed { brief, .. }
            | AsyncState::Deleting { brief, .. }
            | AsyncState::DeleteFailed { brief, .. } => brief.as_ref(),
            AsyncState::Creating { .. } | AsyncState::CreateFailed { .. } => None,
        }
    }

    /// Returns the most recent value a human would see.
    pub fn latest_value(&self) -> Option<&V> {
        match self {
            AsyncState::Loaded { value, .. }
            | AsyncState::Creating { value }
            | AsyncState::CreateFailed { value, .. }
            | AsyncState::Saveable { value, .. }
            | AsyncState::Saving { value, .. }
            | AsyncState::SaveFailed { value, .. } => Some(value),
            AsyncState::Deleting { value, .. } | AsyncState::DeleteFailed { value, .. } => {
                value.as_ref()
            }
            AsyncState::Unloaded { .. }
            | AsyncState::Loading { .. }
            | AsyncState::LoadFailed { .. } => None,
        }
    }

    /// Returns the last value known to be persisted.
    ///
    /// For states with pending edits this is `original`.
    pub fn previous_value(&self) -> Option<&V> {
        match self {
            AsyncState::Saveable { original, .. }
            | AsyncState::Saving { original, .. }
            | AsyncState::SaveFailed { original, .. } => Some(original),
            _ => self.latest_value(),
        }
    }

    /// Returns the stored failure, if any.
    pub fn error(&self) -> Option<&SyncError> {
        match self {
            AsyncState::LoadFailed { error, .. }
            | AsyncState::CreateFailed { error, .. }
            | AsyncState::SaveFailed { error, .. }
            | AsyncState::DeleteFailed { error, .. } => Some(error),
            _ => None,
        }
    }

    /// Returns true if a network operation is in flight.
    pub fn is_in_flight(&self) -> bool {
        self.tag().is_in_flight()
    }

    /// Returns true for the `*Failed` variants.
    pub fn is_failed(&self) -> bool {
        self.tag().is_failed()
    }

    /// Returns true if the state holds a local edit that is not persisted.
    pub fn has_unsaved_changes(&self) -> bool {
        matches!(
            self,
            AsyncState::Saveable { .. } | AsyncState::Saving { .. } | AsyncState::SaveFailed { .. }
        )
    }
}

impl<B: Clone, V: Clone> AsyncState<B, V> {
    /// Discards local edits, returning to the persisted baseline.
    ///
    /// Returns `None` for states that have no baseline to return to.
    pub fn reset(&self) -> Option<Self> {
        match self {
            AsyncState::Loaded { .. } => Some(self.clone()),
            AsyncState::Saveable {
                brief, original, ..
            }
            | AsyncState::Saving {
                brief, original, ..
            }
            | AsyncState::SaveFailed {
                brief, original, ..
            } => Some(Self::loaded(brief.clone(), original.clone())),
            _ => None,
        }
    }

    /// Clears a stored failure, keeping every local value.
    ///
    /// `CreateFailed` has no server-side counterpart, so it falls back to
    /// `Unloaded`; callers that still need the value should read it first.
    pub fn unfail(&self) -> Self {
        match self {
            AsyncState::LoadFailed { brief, .. } => Self::unloaded(brief.clone()),
            AsyncState::CreateFailed { .. } => Self::unloaded(None),
            AsyncState::SaveFailed {
                brief,
                original,
                value,
                ..
            } => Self::saveable(brief.clone(), original.clone(), value.clone()),
            AsyncState::DeleteFailed {
                brief,
                value: Some(value),
                ..
            } => Self::loaded(brief.clone(), value.clone()),
            AsyncState::DeleteFailed {
                brief, value: None, ..
            } => Self::unloaded(brief.clone()),
            _ => self.clone(),
        }
    }
}
