#![forbid(unsafe_code)]

//! Undo groups: the atomic unit of reversal.
//!
//! An [`UndoGroup`] is an append-only list of [`GroupEntry`] values. Once
//! collapsed it is reversed and replayed as a whole:
//!
//! ```text
//! revert():  capture post-state ─► restore pre-snapshots (newest first) ─► destroy created + leftovers
//! replay():  restore post-state ─► destroy leftovers
//! ```
//!
//! *Leftovers* are children that the restore pass detached from a container
//! and that no restored container references. On revert these are children
//! the mutation created (registered ones are removed unconditionally); on
//! replay they are the pre-existing children the mutation destroyed.

use std::collections::HashSet;

use stackset_core::{ChildId, ContainerId, ContainerSnapshot, EntityWorld};

use super::host::GroupId;

/// One record in an undo group.
#[derive(Debug, Clone, PartialEq)]
pub enum GroupEntry {
    /// Pre-mutation state of a container.
    Snapshot(ContainerSnapshot),
    /// A child that did not exist before the group opened.
    Created(ChildId),
}

/// Post-mutation state of a snapshotted container, captured on revert.
#[derive(Debug, Clone, PartialEq)]
enum AfterState {
    Live(ContainerSnapshot),
    Destroyed(ContainerId),
}

/// An ordered, append-only record of snapshots and creations.
#[derive(Debug, Clone)]
pub struct UndoGroup {
    id: GroupId,
    label: String,
    entries: Vec<GroupEntry>,
    after: Vec<AfterState>,
}

impl UndoGroup {
    /// Create an empty group.
    #[must_use]
    pub fn new(id: GroupId, label: impl Into<String>) -> Self {
        Self {
            id,
            label: label.into(),
            entries: Vec::new(),
            after: Vec::new(),
        }
    }

    /// Group id.
    #[must_use]
    pub fn id(&self) -> GroupId {
        self.id
    }

    /// Display label.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Recorded entries in append order.
    #[must_use]
    pub fn entries(&self) -> &[GroupEntry] {
        &self.entries
    }

    /// Number of recorded entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Recorded pre-mutation snapshots.
    pub fn snapshots(&self) -> impl Iterator<Item = &ContainerSnapshot> {
        self.entries.iter().filter_map(|e| match e {
            GroupEntry::Snapshot(s) => Some(s),
            GroupEntry::Created(_) => None,
        })
    }

    /// Registered created children.
    pub fn created(&self) -> impl Iterator<Item = ChildId> + '_ {
        self.entries.iter().filter_map(|e| match e {
            GroupEntry::Created(c) => Some(*c),
            GroupEntry::Snapshot(_) => None,
        })
    }

    /// Whether a snapshot of `container` is recorded.
    #[must_use]
    pub fn has_snapshot(&self, container: ContainerId) -> bool {
        self.snapshots().any(|s| s.id == container)
    }

    /// Record a pre-mutation snapshot. Returns `false` if the container was
    /// already captured (the first snapshot wins).
    pub fn record_snapshot(&mut self, snapshot: ContainerSnapshot) -> bool {
        if self.has_snapshot(snapshot.id) {
            return false;
        }
        self.entries.push(GroupEntry::Snapshot(snapshot));
        true
    }

    /// Register a created child. Returns `false` if already registered.
    pub fn register_created(&mut self, child: ChildId) -> bool {
        if self.created().any(|c| c == child) {
            return false;
        }
        self.entries.push(GroupEntry::Created(child));
        true
    }

    /// Approximate size in bytes, for history budgeting.
    #[must_use]
    pub fn size_bytes(&self) -> usize {
        let entry_bytes = |e: &GroupEntry| match e {
            GroupEntry::Snapshot(s) => s.size_bytes(),
            GroupEntry::Created(_) => std::mem::size_of::<GroupEntry>(),
        };
        let after_bytes = |a: &AfterState| match a {
            AfterState::Live(s) => s.size_bytes(),
            AfterState::Destroyed(_) => std::mem::size_of::<AfterState>(),
        };
        std::mem::size_of::<Self>()
            + self.label.len()
            + self.entries.iter().map(entry_bytes).sum::<usize>()
            + self.after.iter().map(after_bytes).sum::<usize>()
    }

    // ========================================================================
    // Reversal
    // ========================================================================

    /// Reverse the group: restore every snapshotted container and remove
    /// the children created while the group was open.
    ///
    /// Snapshots are restored newest first. A later target's snapshot may
    /// already contain a child an earlier target handed to it; restoring
    /// the earlier target last reclaims that child.
    ///
    /// The current state of each container is captured first so that
    /// [`replay`](Self::replay) can re-apply it.
    pub(crate) fn revert(&mut self, world: &mut EntityWorld) {
        self.after = self
            .snapshots()
            .map(|s| match world.snapshot_container(s.id) {
                Ok(current) => AfterState::Live(current),
                Err(_) => AfterState::Destroyed(s.id),
            })
            .collect();

        let restored: Vec<&ContainerSnapshot> = self.snapshots().collect();
        let mut leftovers = Vec::new();
        for snapshot in restored.iter().rev() {
            leftovers.extend(world.restore_container(snapshot));
        }
        for child in self.created() {
            if world.destroy_child(child).is_ok() {
                tracing::trace!(target: "stackset.undo", child = %child, "created child removed");
            }
        }
        destroy_unreferenced(world, &restored, leftovers);
    }

    /// Re-apply the post-mutation state captured by the last
    /// [`revert`](Self::revert).
    pub(crate) fn replay(&mut self, world: &mut EntityWorld) {
        let mut leftovers = Vec::new();
        let mut restored = Vec::new();
        for state in &self.after {
            match state {
                AfterState::Live(snapshot) => {
                    leftovers.extend(world.restore_container(snapshot));
                    restored.push(snapshot);
                }
                AfterState::Destroyed(id) => {
                    if let Ok(children) = world.destroy_container(*id) {
                        leftovers.extend(children);
                    }
                }
            }
        }
        destroy_unreferenced(world, &restored, leftovers);
    }
}

/// Destroy every live candidate that no restored snapshot references.
fn destroy_unreferenced(
    world: &mut EntityWorld,
    restored: &[&ContainerSnapshot],
    candidates: Vec<ChildId>,
) {
    let referenced: HashSet<ChildId> = restored.iter().flat_map(|s| s.child_ids()).collect();
    let mut seen = HashSet::new();
    for child in candidates {
        if referenced.contains(&child) || !seen.insert(child) {
            continue;
        }
        if world.destroy_child(child).is_ok() {
            tracing::trace!(target: "stackset.undo", child = %child, "child removed by reversal");
        }
    }
}
