//! Error types for world generation, simulation and save handling

use thiserror::Error;

use crate::node::NodeId;

/// Errors that can occur while building a world or loading a save
///
/// Rejected player actions are not errors: the engine reports them as a
/// `false` return and leaves state untouched.
#[derive(Error, Debug)]
pub enum NetworkError {
    /// Configuration validation failed
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A node id is referenced that does not exist in the base node set
    #[error("node {0} is not part of the generated world")]
    UnknownNode(NodeId),

    /// Two base nodes were given the same id
    #[error("duplicate node id {0}")]
    DuplicateNode(NodeId),

    /// Save payload could not be parsed
    #[error("malformed save: {0}")]
    MalformedSave(#[from] serde_json::Error),

    /// Save payload was written by a newer codec
    #[error("unsupported save version {0}")]
    UnsupportedSaveVersion(u32),

    /// Save payload describes connections that do not form a forest
    #[error("inconsistent save: {0}")]
    InconsistentSave(String),

    /// A save store failed to persist a payload
    #[error("failed to persist save: {0}")]
    Persist(String),
}

impl NetworkError {
    /// Whether the caller can recover by discarding the save and starting fresh
    pub fn is_recoverable_save_error(&self) -> bool {
        matches!(
            self,
            NetworkError::MalformedSave(_) | NetworkError::UnsupportedSaveVersion(_)
        )
    }
}

/// Result type alias for network operations
pub type Result<T> = std::result::Result<T, NetworkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_save_is_recoverable() {
        let err = serde_json::from_str::<u32>("not json").unwrap_err();
        let err = NetworkError::from(err);
        assert!(err.is_recoverable_save_error());
        assert!(err.to_string().starts_with("malformed save"));
    }

    #[test]
    fn test_unknown_node_is_fatal() {
        let err = NetworkError::UnknownNode(42);
        assert!(!err.is_recoverable_save_error());
        assert_eq!(err.to_string(), "node 42 is not part of the generated world");
    }
}
