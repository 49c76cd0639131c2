#![forbid(unsafe_code)]

//! Error types for the recorder.

use stackset_core::{ContainerId, WorldError};
use thiserror::Error;

use crate::undo::{GroupId, UndoError};

/// Error returned by a mutation closure.
///
/// Boxed so closures can use `?` on any error type.
pub type MutationError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Build a [`MutationError`] from a message.
pub fn mutation_error(message: impl Into<String>) -> MutationError {
    let message: String = message.into();
    MutationError::from(message)
}

/// Result alias for recorder operations.
pub type Result<T> = std::result::Result<T, RecorderError>;

/// Errors that can occur while running a transaction.
#[derive(Debug, Error)]
pub enum RecorderError {
    #[error("transaction needs at least one target")]
    EmptyTargets,

    #[error("transaction label must not be empty")]
    EmptyLabel,

    /// The mutation closure failed. `group` is still open.
    #[error("mutation failed on target {index} ({container}); {group} left open")]
    Mutation {
        index: usize,
        container: ContainerId,
        group: GroupId,
        #[source]
        source: MutationError,
    },

    #[error("undo host error: {0}")]
    Undo(#[from] UndoError),

    #[error("world error: {0}")]
    World(#[from] WorldError),
}

impl RecorderError {
    /// The undo group left open by a failed mutation.
    #[must_use]
    pub fn open_group(&self) -> Option<GroupId> {
        match self {
            Self::Mutation { group, .. } => Some(*group),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn mutation_error_display_and_source() {
        let err = RecorderError::Mutation {
            index: 2,
            container: ContainerId::new(7),
            group: GroupId::new(3),
            source: mutation_error("bad layout"),
        };
        assert_eq!(
            err.to_string(),
            "mutation failed on target 2 (container#7); group#3 left open"
        );
        assert_eq!(err.source().map(|s| s.to_string()), Some("bad layout".into()));
        assert_eq!(err.open_group(), Some(GroupId::new(3)));
    }

    #[test]
    fn conversions() {
        let err: RecorderError = UndoError::NoOpenGroup.into();
        assert!(matches!(err, RecorderError::Undo(UndoError::NoOpenGroup)));
        assert_eq!(err.open_group(), None);

        let err: RecorderError = WorldError::StaleContainer(ContainerId::new(1)).into();
        assert_eq!(err.to_string(), "world error: stale container handle container#1");
    }
}
