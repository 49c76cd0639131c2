#![forbid(unsafe_code)]

//! StackSet Runtime
//!
//! This crate records batch edits over the `stackset-core` entity model as
//! single undo steps and drives the host cycle those edits live in.
//!
//! # Key Components
//!
//! - [`BatchMutationRecorder`] - Turns one mutation over N containers into one undo group
//! - [`UndoHost`] / [`UndoHistory`] - Undo contract and its bounded in-memory host
//! - [`TemplateHost`] / [`TemplateRegistry`] - Template instances and override persistence
//! - [`DeferredQueue`] - Cancellable tasks that run on the next host cycle
//! - [`EditorSession`] - World, history, templates and queue bundled as one host loop
//! - [`SessionConfig`] - Tunables, loadable from TOML/JSON with `config-files`
//!
//! # Role in StackSet
//! `stackset-runtime` is the orchestrator. It never stores entities itself;
//! it snapshots them through `stackset-core`, hands them to an undo host, and
//! defers template bookkeeping until the undo group is sealed.

pub mod cancellation;
pub mod config;
pub mod deferred;
pub mod error;
pub mod recorder;
pub mod session;
pub mod template;
pub mod undo;

pub use cancellation::{CancellationSource, CancellationToken};
pub use config::{ConfigError, SessionConfig};
pub use deferred::{CycleReport, DeferredConfig, DeferredHandle, DeferredQueue, DeferredTask, HostCycle};
pub use error::{MutationError, RecorderError, Result, mutation_error};
pub use recorder::{BatchMutationRecorder, RecorderContext, TransactionReport};
pub use session::{EditorSession, FieldSummary};
pub use template::{
    OverrideSet, OverrideValue, PropertyOverride, Template, TemplateError, TemplateHost, TemplateId,
    TemplateRegistry,
};
pub use undo::{GroupEntry, GroupId, HistoryConfig, UndoError, UndoGroup, UndoHistory, UndoHost};
