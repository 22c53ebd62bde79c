//! Resource key.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Identifies one synchronized entity: a collection name plus a string id.
///
/// The key doubles as the REST path of the entity (`{collection}/{id}`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResourceKey {
    collection: String,
    id: String,
}

impl ResourceKey {
    /// Creates a key.
    pub fn new(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            id: id.into(),
        }
    }

    /// Returns the collection name.
    #[must_use]
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Returns the entity id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the REST path relative to the store base URI.
    #[must_use]
    pub fn path(&self) -> String {
        format!("{}/{}", self.collection, self.id)
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

/// Error returned when parsing a `collection/id` string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid resource key {input:?}: expected `collection/id`")]
pub struct ParseKeyError {
    input: String,
}

impl FromStr for ResourceKey {
    type Err = ParseKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('/') {
            Some((collection, id))
                if !collection.is_empty() && !id.is_empty() && !id.contains('/') =>
            {
                Ok(Self::new(collection, id))
            }
            _ => Err(ParseKeyError { input: s.into() }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_and_path_match() {
        let key = ResourceKey::new("challenge", "jbc1");
        assert_eq!(key.to_string(), "challenge/jbc1");
        assert_eq!(key.path(), "challenge/jbc1");
        assert_eq!(key.collection(), "challenge");
        assert_eq!(key.id(), "jbc1");
    }

    #[test]
    fn parse_key() {
        let key: ResourceKey = "scenes/moon".parse().unwrap();
        assert_eq!(key, ResourceKey::new("scenes", "moon"));

        assert!("scenes".parse::<ResourceKey>().is_err());
        assert!("/moon".parse::<ResourceKey>().is_err());
        assert!("scenes/".parse::<ResourceKey>().is_err());
        assert!("a/b/c".parse::<ResourceKey>().is_err());
    }

    #[test]
    fn keys_order_by_collection_then_id() {
        let mut keys = vec![
            ResourceKey::new("scene", "b"),
            ResourceKey::new("challenge", "z"),
            ResourceKey::new("scene", "a"),
        ];
        keys.sort();
        assert_eq!(keys[0].collection(), "challenge");
        assert_eq!(keys[1].id(), "a");
    }
}
