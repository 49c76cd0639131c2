#![forbid(unsafe_code)]

//! Whole-object value snapshots.
//!
//! A [`ContainerSnapshot`] captures a container's name, scalar fields, child
//! sequence, and the full state of every child it owns. Restoring one
//! through [`EntityWorld::restore_container`](crate::EntityWorld::restore_container)
//! reverses any combination of field edits, reorders, removals, and child
//! destructions applied since it was taken.
//!
//! Snapshots deliberately exclude the `dirty` flag: restoring a snapshot is
//! itself a modification.

use crate::entity::{Child, ContainerFields};
use crate::id::{ChildId, ContainerId};

/// Value copy of a single child.
pub type ChildSnapshot = Child;

/// Value copy of a container and every child it owns.
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerSnapshot {
    /// Handle of the captured container.
    pub id: ContainerId,
    /// Display name.
    pub name: String,
    /// Scalar configuration.
    pub fields: ContainerFields,
    /// Owned children in display order.
    pub children: Vec<ChildSnapshot>,
}

impl ContainerSnapshot {
    /// Child handles in display order.
    pub fn child_ids(&self) -> impl Iterator<Item = ChildId> + '_ {
        self.children.iter().map(|c| c.id)
    }

    /// Whether the snapshot references `child`.
    #[must_use]
    pub fn references(&self, child: ChildId) -> bool {
        self.children.iter().any(|c| c.id == child)
    }

    /// Approximate heap + inline size, for history budgeting.
    #[must_use]
    pub fn size_bytes(&self) -> usize {
        std::mem::size_of::<Self>()
            + self.name.len()
            + self
                .children
                .iter()
                .map(|c| std::mem::size_of::<ChildSnapshot>() + c.label.len())
                .sum::<usize>()
    }
}
