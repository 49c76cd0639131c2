#![forbid(unsafe_code)]

//! StackSet public facade crate.
//!
//! This crate provides the stable, ergonomic surface area for users. It
//! re-exports common types from the internal crates and offers a lightweight
//! prelude for day-to-day usage.
//!
//! ```
//! use stackset::prelude::*;
//!
//! let mut session = EditorSession::new();
//! let a = session.create_container_with_default_layout("left").unwrap();
//! let b = session.create_container_with_default_layout("right").unwrap();
//!
//! session.set_child_count(&[a, b], 5).unwrap();
//! assert_eq!(session.world().children_of(a).unwrap().len(), 5);
//!
//! session.undo().unwrap().unwrap();
//! assert_eq!(session.world().children_of(b).unwrap().len(), 3);
//! ```

pub mod error;

// --- Entity model ---------------------------------------------------------

pub use stackset_core::{
    Child, ChildId, Container, ContainerFields, ContainerId, ContainerMut, ContainerSnapshot,
    EntityWorld, FadeMode, WorldError,
};

// --- Runtime --------------------------------------------------------------

pub use stackset_runtime::{
    BatchMutationRecorder, CancellationToken, CycleReport, DeferredHandle, DeferredQueue,
    EditorSession, FieldSummary, GroupId, HistoryConfig, HostCycle, MutationError, OverrideSet,
    OverrideValue, RecorderContext, RecorderError, SessionConfig, TemplateHost, TemplateId,
    TemplateRegistry, TransactionReport, UndoError, UndoHistory, UndoHost, mutation_error,
};

// --- Errors ---------------------------------------------------------------

pub use error::{Error, RecoveryAction, Result};

// --- Prelude --------------------------------------------------------------

pub mod prelude {
    pub use crate::{
        ChildId, ContainerFields, ContainerId, ContainerMut, EditorSession, Error, FadeMode,
        FieldSummary, GroupId, MutationError, RecoveryAction, Result, SessionConfig,
        TemplateHost, TransactionReport, UndoHost, mutation_error,
    };

    pub use crate::{core, runtime};
}

pub use stackset_core as core;
pub use stackset_runtime as runtime;
