#![forbid(unsafe_code)]

//! StackSet error model and recovery guidance.
//!
//! # Design Principles
//!
//! 1. **Result everywhere**: no panics on the edit path.
//! 2. **Domain-specific errors**: each layer keeps its own typed error; this
//!    module only unifies them for callers that drive a whole session.
//! 3. **Recovery guidance**: every variant maps to a [`RecoveryAction`] that
//!    tells an editor front end how to keep the session usable.

use stackset_core::WorldError;
use stackset_runtime::{ConfigError, GroupId, RecorderError, TemplateError, UndoError};
use thiserror::Error;

// ── Unified Error ───────────────────────────────────────────────────────

/// Top-level error type for StackSet sessions.
///
/// Use [`Error::recovery`] to decide what to do next.
#[derive(Debug, Error)]
pub enum Error {
    /// Entity storage rejected a handle or index.
    #[error(transparent)]
    World(#[from] WorldError),
    /// A batch transaction failed.
    #[error(transparent)]
    Recorder(#[from] RecorderError),
    /// The undo host refused an operation.
    #[error(transparent)]
    Undo(#[from] UndoError),
    /// Template bookkeeping failed.
    #[error(transparent)]
    Template(#[from] TemplateError),
    /// Configuration could not be loaded or is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Standard result type for StackSet APIs.
pub type Result<T> = std::result::Result<T, Error>;

// ── Recovery ────────────────────────────────────────────────────────────

/// What an editor front end should do when an error occurs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryAction {
    /// Refresh the selection; some handle went stale.
    RefreshSelection,
    /// A transaction stopped part-way. Collapse or revert the named group.
    ResolveOpenGroup(GroupId),
    /// The request itself was malformed; report it and do nothing.
    RejectRequest,
    /// Let the pending host cycle finish, then retry.
    RetryNextCycle,
    /// Fall back to the default configuration.
    UseDefaultConfig,
}

impl Error {
    /// Determine the recovery action for this error.
    #[must_use]
    pub fn recovery(&self) -> RecoveryAction {
        match self {
            Self::World(_) => RecoveryAction::RefreshSelection,

            Self::Recorder(RecorderError::Mutation { group, .. }) => {
                RecoveryAction::ResolveOpenGroup(*group)
            }
            Self::Recorder(RecorderError::EmptyTargets | RecorderError::EmptyLabel) => {
                RecoveryAction::RejectRequest
            }
            Self::Recorder(RecorderError::World(_)) => RecoveryAction::RefreshSelection,
            Self::Recorder(RecorderError::Undo(err)) | Self::Undo(err) => undo_recovery(err),

            Self::Template(TemplateError::NotAnInstance(_)) => RecoveryAction::RefreshSelection,
            Self::Template(TemplateError::UnknownTemplate(_)) => RecoveryAction::RejectRequest,

            Self::Config(_) => RecoveryAction::UseDefaultConfig,
        }
    }

    /// Error type label for logs.
    #[must_use]
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::World(_) => "world",
            Self::Recorder(_) => "recorder",
            Self::Undo(_) => "undo",
            Self::Template(_) => "template",
            Self::Config(_) => "config",
        }
    }

    /// The undo group a failed transaction left open, if any.
    #[must_use]
    pub fn open_group(&self) -> Option<GroupId> {
        match self.recovery() {
            RecoveryAction::ResolveOpenGroup(group) => Some(group),
            _ => None,
        }
    }
}

fn undo_recovery(err: &UndoError) -> RecoveryAction {
    match err {
        UndoError::GroupStillOpen(group) => RecoveryAction::ResolveOpenGroup(*group),
        UndoError::NoOpenGroup | UndoError::UnknownGroup(_) => RecoveryAction::RetryNextCycle,
        UndoError::World(_) => RecoveryAction::RefreshSelection,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stackset_core::ContainerId;

    #[test]
    fn stale_handles_refresh_selection() {
        let err = Error::from(WorldError::StaleContainer(ContainerId::new(9)));
        assert_eq!(err.recovery(), RecoveryAction::RefreshSelection);
        assert_eq!(err.error_type(), "world");
        assert_eq!(err.to_string(), WorldError::StaleContainer(ContainerId::new(9)).to_string());
    }

    #[test]
    fn failed_transaction_points_at_open_group() {
        let err = Error::from(RecorderError::Mutation {
            index: 2,
            container: ContainerId::new(3),
            group: GroupId::new(7),
            source: stackset_runtime::mutation_error("boom"),
        });
        assert_eq!(err.recovery(), RecoveryAction::ResolveOpenGroup(GroupId::new(7)));
        assert_eq!(err.open_group(), Some(GroupId::new(7)));
    }

    #[test]
    fn malformed_requests_are_rejected() {
        assert_eq!(
            Error::from(RecorderError::EmptyTargets).recovery(),
            RecoveryAction::RejectRequest
        );
        assert_eq!(
            Error::from(RecorderError::EmptyLabel).open_group(),
            None
        );
    }

    #[test]
    fn undo_refused_while_open() {
        let err = Error::from(UndoError::GroupStillOpen(GroupId::new(2)));
        assert_eq!(err.open_group(), Some(GroupId::new(2)));
        assert_eq!(
            Error::from(UndoError::NoOpenGroup).recovery(),
            RecoveryAction::RetryNextCycle
        );
    }

    #[test]
    fn config_errors_fall_back_to_defaults() {
        let err = Error::from(ConfigError::Validation(vec!["history.max_depth must be > 0".into()]));
        assert_eq!(err.recovery(), RecoveryAction::UseDefaultConfig);
        assert_eq!(err.error_type(), "config");
    }
}
