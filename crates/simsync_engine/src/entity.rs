//! Synchronized entity types.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use simsync_state::AsyncState;
use std::fmt::Debug;

/// A value kept in sync with one collection of the document store.
pub trait Entity: Clone + Debug + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Lightweight summary used for list rendering.
    type Brief: Clone + Debug + Send + Sync + 'static;

    /// Derives the summary from a full value.
    fn brief(&self) -> Self::Brief;
}

/// Synchronization state of an entity.
pub type EntityState<E> = AsyncState<<E as Entity>::Brief, E>;

/// Fields of an untyped document copied into its brief.
pub const BRIEF_FIELDS: &[&str] = &["name", "description"];

/// Untyped documents. The brief is an object holding whichever of
/// [`BRIEF_FIELDS`] the document has.
impl Entity for Value {
    type Brief = Value;

    fn brief(&self) -> Value {
        let mut brief = Map::new();
        if let Value::Object(fields) = self {
            for name in BRIEF_FIELDS {
                if let Some(field) = fields.get(*name) {
                    brief.insert((*name).to_string(), field.clone());
                }
            }
        }
        Value::Object(brief)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_brief_keeps_summary_fields() {
        let challenge = json!({
            "name": "JBC1",
            "description": "Drive forward",
            "events": ["start", "stop"],
        });
        assert_eq!(
            challenge.brief(),
            json!({"name": "JBC1", "description": "Drive forward"})
        );
    }

    #[test]
    fn json_brief_of_non_object_is_empty() {
        assert_eq!(json!([1, 2]).brief(), json!({}));
        assert_eq!(json!({"robots": 2}).brief(), json!({}));
    }
}
