#![forbid(unsafe_code)]

//! Undo groups and the host contract that records them.
//!
//! The recorder talks to undo bookkeeping only through [`UndoHost`]. A host
//! opens one group per transaction, accepts whole-container snapshots and
//! created-child registrations, then seals the group so it is reversed as a
//! single step.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         UndoHistory                             │
//! │  open: Option<UndoGroup>                                        │
//! │     │ collapse_group()                                          │
//! │     ▼                                                           │
//! │  ┌──────────────────┐          ┌──────────────────┐             │
//! │  │   Undo Stack     │  undo()  │   Redo Stack     │             │
//! │  │  [g1, g2, g3]    │ ──────►  │  [g4]            │             │
//! │  │                  │  ◄────── │                  │             │
//! │  └──────────────────┘  redo()  └──────────────────┘             │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Module Structure
//!
//! - [`host`]: the [`UndoHost`] trait, [`GroupId`] and [`UndoError`]
//! - [`group`]: [`UndoGroup`] and its revert/replay passes
//! - [`history`]: [`UndoHistory`], the bounded in-memory host
//!
//! # Memory Budget
//!
//! Every group reports its size via `size_bytes()`, the sum of its recorded
//! snapshots. The history evicts the oldest groups once the configured
//! budget (10MB by default) is exceeded.

pub mod group;
pub mod history;
pub mod host;

pub use group::{GroupEntry, UndoGroup};
pub use history::{HistoryConfig, UndoHistory};
pub use host::{GroupId, UndoError, UndoHost};
