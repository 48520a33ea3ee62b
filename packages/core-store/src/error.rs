//! Error types shared by every flatstore layer.

use std::fmt::Display;

use crate::{Key, PathError};

/// Failures reported by a store adapter.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Network, I/O or client failure underneath the adapter.
    #[error("transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The store refused or could not perform the operation right now.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A transaction lost a race on this entity and was not committed.
    #[error("transaction conflict on {0}")]
    Conflict(Key),

    /// The transaction was rolled back after an earlier failure.
    #[error("transaction aborted")]
    Aborted,

    /// The transaction or batch was already committed, rolled back or submitted.
    #[error("transaction or batch already finished")]
    AlreadyFinished,

    /// Any other adapter-specific failure.
    #[error("{0}")]
    Other(String),
}

/// Errors surfaced to callers.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Decode-time structural failure: a required property is absent, a
    /// value has the wrong kind, or no enum alternative matched. Also used
    /// for the few encode-time failures (invalid segment, integer overflow).
    #[error("serialization error at '{path}': {message}")]
    Serialization { path: String, message: String },

    /// Any failure from the store adapter.
    #[error("database error: {0}")]
    Database(#[from] StoreError),

    /// Tried to delete or update an entity that was never persisted.
    #[error("entity {0} has not been saved")]
    NotSaved(Key),

    /// A reference pointed at an entity that does not exist.
    #[error("entity {0} not found")]
    NotFound(Key),

    /// A property name could not be parsed or built.
    #[error("path error: {0}")]
    Path(#[from] PathError),
}

impl Error {
    /// A serialization error at a rendered path.
    pub fn serialization(path: impl Display, message: impl Display) -> Self {
        Error::Serialization {
            path: path.to_string(),
            message: message.to_string(),
        }
    }

    /// Attach a path to a serialization error raised without one.
    ///
    /// Errors created through serde's `custom` hooks do not know where
    /// they happened; the encoder and decoder fill the path in on the way out.
    #[must_use]
    pub fn at(self, path: impl Display) -> Self {
        match self {
            Error::Serialization { path: p, message } if p.is_empty() => Error::Serialization {
                path: path.to_string(),
                message,
            },
            other => other,
        }
    }

    pub fn is_serialization(&self) -> bool {
        matches!(self, Error::Serialization { .. })
    }
}

impl serde::ser::Error for Error {
    fn custom<T: Display>(msg: T) -> Self {
        Error::serialization("", msg)
    }
}

impl serde::de::Error for Error {
    fn custom<T: Display>(msg: T) -> Self {
        Error::serialization("", msg)
    }
}

/// Result type alias for flatstore operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Kind, Namespace};
    use std::error::Error as StdError;

    fn key() -> Key {
        Key::new(Kind::new("User"), Namespace::default(), "alice")
    }

    #[test]
    fn serialization_display() {
        let e = Error::serialization("address.city", "missing property");
        assert_eq!(
            e.to_string(),
            "serialization error at 'address.city': missing property"
        );
    }

    #[test]
    fn at_fills_only_empty_paths() {
        let e = <Error as serde::de::Error>::custom("boom").at("a.b");
        assert!(matches!(e, Error::Serialization { ref path, .. } if path == "a.b"));

        let e = Error::serialization("x", "boom").at("a.b");
        assert!(matches!(e, Error::Serialization { ref path, .. } if path == "x"));
    }

    #[test]
    fn store_error_converts_to_database() {
        let e: Error = StoreError::Unavailable("quota".to_string()).into();
        assert!(matches!(e, Error::Database(StoreError::Unavailable(_))));
        assert!(StdError::source(&e).is_some());
        assert!(e.to_string().contains("quota"));
    }

    #[test]
    fn not_saved_display() {
        assert_eq!(
            Error::NotSaved(key()).to_string(),
            "entity User/alice has not been saved"
        );
    }

    #[test]
    fn transport_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::TimedOut, "timed out");
        let e = StoreError::Transport(Box::new(io));
        assert!(StdError::source(&e).is_some());
        assert!(e.to_string().contains("timed out"));
    }
}
