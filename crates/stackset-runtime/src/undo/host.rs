#![forbid(unsafe_code)]

//! The undo-stack contract consumed by the recorder.
//!
//! The recorder never owns an undo stack; it is handed one through
//! [`UndoHost`]. [`UndoHistory`](super::UndoHistory) is the in-memory
//! implementation used by [`EditorSession`](crate::EditorSession) and tests.
//!
//! # Contract
//!
//! - Exactly one group is open at a time, between `begin_group` and
//!   `collapse_group`.
//! - `record_full_snapshot` is idempotent per container per group: the first
//!   snapshot of a container wins.
//! - `register_created` is additive and order-independent.
//! - After `collapse_group` the group is immutable and reversed as a whole.

use std::fmt;

use stackset_core::{ChildId, ContainerSnapshot, WorldError};
use thiserror::Error;

/// Identifier of an undo group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GroupId(pub u64);

impl GroupId {
    /// Create a group id from a raw value.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw id value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "group#{}", self.0)
    }
}

/// Errors raised by an undo host.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UndoError {
    #[error("no undo group is open")]
    NoOpenGroup,

    #[error("{0} is not the open undo group")]
    UnknownGroup(GroupId),

    #[error("{0} is still open")]
    GroupStillOpen(GroupId),

    #[error(transparent)]
    World(#[from] WorldError),
}

/// Host undo subsystem.
pub trait UndoHost {
    /// Open a new group labelled for display, returning its id.
    fn begin_group(&mut self, label: &str) -> GroupId;

    /// Record the pre-mutation state of a container into the open group.
    fn record_full_snapshot(&mut self, snapshot: ContainerSnapshot) -> Result<(), UndoError>;

    /// Register a child created since the group opened.
    fn register_created(&mut self, child: ChildId) -> Result<(), UndoError>;

    /// Seal the open group into a single atomic undo step.
    fn collapse_group(&mut self, group: GroupId) -> Result<(), UndoError>;

    /// The currently open group, if any.
    fn open_group(&self) -> Option<GroupId>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_id_display() {
        assert_eq!(GroupId::new(3).to_string(), "group#3");
        assert_eq!(GroupId::new(3).raw(), 3);
    }

    #[test]
    fn error_display() {
        assert_eq!(
            UndoError::UnknownGroup(GroupId::new(9)).to_string(),
            "group#9 is not the open undo group"
        );
        let err: UndoError = WorldError::StaleChild(ChildId::new(4)).into();
        assert_eq!(err.to_string(), "stale child handle child#4");
    }
}
