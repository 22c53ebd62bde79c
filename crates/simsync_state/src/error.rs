//! Error types for resource synchronization.

use crate::key::ResourceKey;
use crate::state::StateTag;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Result type for synchronization operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur while synchronizing a resource.
///
/// Verb failures are stored verbatim inside the `*Failed` states, so the
/// type is cloneable and comparable.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SyncError {
    /// The request never produced an HTTP response (offline, DNS, TLS...).
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
    },

    /// The server answered with a non-success status.
    #[error("db error {code}: {message}")]
    Db {
        /// HTTP status code.
        code: u16,
        /// Server message, raw body or status text.
        message: String,
    },

    /// A success response body did not decode into the expected type.
    #[error("decode error: {message}")]
    Decode {
        /// Error message.
        message: String,
    },

    /// Too many requests are waiting for an authentication token.
    #[error("pending request queue is full ({capacity} requests)")]
    QueueFull {
        /// Configured queue capacity.
        capacity: usize,
    },

    /// A request waited for an authentication token longer than allowed.
    #[error("no authentication token within {waited:?}")]
    TokenTimeout {
        /// How long the request waited.
        waited: Duration,
    },

    /// A draft mutation was attempted on a resource without an editable value.
    #[error("cannot mutate {key} while {state}")]
    InvalidMutation {
        /// The resource.
        key: ResourceKey,
        /// Its state at the time of the attempt.
        state: StateTag,
    },
}

impl SyncError {
    /// Creates a transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Creates a status-coded db error.
    pub fn db(code: u16, message: impl Into<String>) -> Self {
        Self::Db {
            code,
            message: message.into(),
        }
    }

    /// Creates a decode error.
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Creates the error stored when a single-entity lookup finds nothing.
    pub fn not_found() -> Self {
        Self::db(404, "not found")
    }

    /// Returns the HTTP status code, if the error came from a response.
    pub fn code(&self) -> Option<u16> {
        match self {
            SyncError::Db { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Returns true for a 404 response.
    pub fn is_not_found(&self) -> bool {
        self.code() == Some(404)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes() {
        assert_eq!(SyncError::db(500, "db unavailable").code(), Some(500));
        assert_eq!(SyncError::transport("offline").code(), None);
        assert!(SyncError::not_found().is_not_found());
        assert!(!SyncError::db(403, "nope").is_not_found());
    }

    #[test]
    fn error_display() {
        let err = SyncError::db(500, "db unavailable");
        assert_eq!(err.to_string(), "db error 500: db unavailable");

        let err = SyncError::InvalidMutation {
            key: ResourceKey::new("scene", "moon"),
            state: StateTag::Unloaded,
        };
        assert_eq!(err.to_string(), "cannot mutate scene/moon while unloaded");

        let err = SyncError::QueueFull { capacity: 8 };
        assert!(err.to_string().contains('8'));
    }

    #[test]
    fn serialized_with_kind_tag() {
        let json = serde_json::to_value(SyncError::db(401, "bad token")).unwrap();
        assert_eq!(json["kind"], "db");
        assert_eq!(json["code"], 401);
        assert_eq!(json["message"], "bad token");
    }
}
