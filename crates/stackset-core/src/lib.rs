#![forbid(unsafe_code)]

//! Core: the entity model StackSet edits.
//!
//! # Role in StackSet
//! `stackset-core` owns entity state. Containers hold ordered sequences of
//! children; the [`EntityWorld`] arena owns both and hands out stable,
//! never-reused handles. The runtime (`stackset-runtime`) records undo groups
//! over this model and never touches entity storage directly.
//!
//! # Primary responsibilities
//! - **Handles**: [`ContainerId`] / [`ChildId`], tolerant of going stale.
//! - **Entities**: [`Container`], [`Child`], [`ContainerFields`], [`FadeMode`].
//! - **Snapshots**: [`ContainerSnapshot`] whole-object captures and restore.
//! - **Mutation operations**: [`ContainerMut`] (`set_child_count`,
//!   `clear_children`, `regenerate_children`, `reset_children`, ...).

pub mod entity;
pub mod error;
pub mod id;
pub mod ops;
pub mod snapshot;
pub mod world;

pub use entity::{Child, Container, ContainerFields, FadeMode};
pub use error::{Result, WorldError};
pub use id::{ChildId, ContainerId};
pub use ops::ContainerMut;
pub use snapshot::{ChildSnapshot, ContainerSnapshot};
pub use world::EntityWorld;
