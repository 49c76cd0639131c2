#![forbid(unsafe_code)]

//! Entity arena owning every container and child.
//!
//! [`EntityWorld`] is the single owner of entity state. Everything else
//! refers to entities through [`ContainerId`] / [`ChildId`] handles and
//! tolerates those handles going stale.
//!
//! # Invariants
//!
//! 1. Handles are allocated monotonically and never reused.
//! 2. A live child is listed by exactly one live container, and its `owner`
//!    names that container (checked by [`EntityWorld::validate`]).
//! 3. Revived entities keep their original handle and advance the allocator
//!    past it.

use ahash::AHashMap;

use crate::entity::{Child, Container, ContainerFields};
use crate::error::{Result, WorldError};
use crate::id::{ChildId, ContainerId, IdAllocator};
use crate::snapshot::{ChildSnapshot, ContainerSnapshot};

/// Arena of containers and children.
#[derive(Debug, Clone, Default)]
pub struct EntityWorld {
    ids: IdAllocator,
    containers: AHashMap<ContainerId, Container>,
    children: AHashMap<ChildId, Child>,
}

impl EntityWorld {
    /// Create an empty world.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Lookup
    // ========================================================================

    /// Look up a live container.
    #[must_use]
    pub fn container(&self, id: ContainerId) -> Option<&Container> {
        self.containers.get(&id)
    }

    /// Look up a live container mutably.
    pub fn container_mut(&mut self, id: ContainerId) -> Option<&mut Container> {
        self.containers.get_mut(&id)
    }

    /// Look up a live child.
    #[must_use]
    pub fn child(&self, id: ChildId) -> Option<&Child> {
        self.children.get(&id)
    }

    /// Look up a live child mutably.
    pub fn child_mut(&mut self, id: ChildId) -> Option<&mut Child> {
        self.children.get_mut(&id)
    }

    /// Whether `id` refers to a live container.
    #[must_use]
    pub fn is_live_container(&self, id: ContainerId) -> bool {
        self.containers.contains_key(&id)
    }

    /// Whether `id` refers to a live child.
    #[must_use]
    pub fn is_live_child(&self, id: ChildId) -> bool {
        self.children.contains_key(&id)
    }

    /// Number of live containers.
    #[must_use]
    pub fn container_count(&self) -> usize {
        self.containers.len()
    }

    /// Number of live children.
    #[must_use]
    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    /// Live container handles in allocation order.
    #[must_use]
    pub fn container_ids(&self) -> Vec<ContainerId> {
        let mut ids: Vec<_> = self.containers.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Child handles of a container, in display order.
    pub fn children_of(&self, id: ContainerId) -> Result<&[ChildId]> {
        self.containers
            .get(&id)
            .map(|c| c.children.as_slice())
            .ok_or(WorldError::StaleContainer(id))
    }

    fn live_container_mut(&mut self, id: ContainerId) -> Result<&mut Container> {
        self.containers
            .get_mut(&id)
            .ok_or(WorldError::StaleContainer(id))
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Create a container with no children.
    pub fn spawn_container(
        &mut self,
        name: impl Into<String>,
        fields: ContainerFields,
    ) -> ContainerId {
        let id = ContainerId::new(self.ids.next_raw());
        self.containers.insert(
            id,
            Container {
                id,
                name: name.into(),
                children: Vec::new(),
                fields,
                dirty: true,
            },
        );
        #[cfg(feature = "tracing")]
        tracing::trace!(target: "stackset.world", container = %id, "container spawned");
        id
    }

    /// Destroy a container and every child it owns.
    ///
    /// Returns the destroyed child handles.
    pub fn destroy_container(&mut self, id: ContainerId) -> Result<Vec<ChildId>> {
        let container = self
            .containers
            .remove(&id)
            .ok_or(WorldError::StaleContainer(id))?;
        for child in &container.children {
            self.children.remove(child);
        }
        #[cfg(feature = "tracing")]
        tracing::trace!(
            target: "stackset.world",
            container = %id,
            children = container.children.len(),
            "container destroyed"
        );
        Ok(container.children)
    }

    /// Create a child at the end of `owner`'s sequence.
    pub fn spawn_child(&mut self, owner: ContainerId, label: impl Into<String>) -> Result<ChildId> {
        if !self.containers.contains_key(&owner) {
            return Err(WorldError::StaleContainer(owner));
        }
        let id = ChildId::new(self.ids.next_raw());
        self.children.insert(
            id,
            Child {
                id,
                owner,
                label: label.into(),
                active: false,
            },
        );
        self.live_container_mut(owner)?.children.push(id);
        Ok(id)
    }

    /// Detach a child from its owner and destroy it.
    pub fn destroy_child(&mut self, id: ChildId) -> Result<()> {
        let child = self.children.remove(&id).ok_or(WorldError::StaleChild(id))?;
        if let Some(owner) = self.containers.get_mut(&child.owner) {
            owner.children.retain(|c| *c != id);
        }
        Ok(())
    }

    /// Move a child into `to`, keeping its handle.
    ///
    /// `index` of `None` appends. The index is interpreted against `to`'s
    /// sequence after the child has been detached from its previous owner.
    pub fn transfer_child(
        &mut self,
        id: ChildId,
        to: ContainerId,
        index: Option<usize>,
    ) -> Result<()> {
        if !self.containers.contains_key(&to) {
            return Err(WorldError::StaleContainer(to));
        }
        let from = self.children.get(&id).ok_or(WorldError::StaleChild(id))?.owner;

        let target_len = {
            let len = self.children_of(to)?.len();
            if from == to && self.children_of(to)?.contains(&id) {
                len - 1
            } else {
                len
            }
        };
        let index = index.unwrap_or(target_len);
        if index > target_len {
            return Err(WorldError::IndexOutOfBounds {
                index,
                len: target_len,
            });
        }

        if let Some(previous) = self.containers.get_mut(&from) {
            previous.children.retain(|c| *c != id);
        }
        self.live_container_mut(to)?.children.insert(index, id);
        if let Some(child) = self.children.get_mut(&id) {
            child.owner = to;
        }
        Ok(())
    }

    // ========================================================================
    // Snapshots
    // ========================================================================

    /// Capture a container together with the full state of its children.
    ///
    /// Stale handles found in the sequence are left out of the snapshot.
    pub fn snapshot_container(&self, id: ContainerId) -> Result<ContainerSnapshot> {
        let container = self
            .containers
            .get(&id)
            .ok_or(WorldError::StaleContainer(id))?;
        Ok(ContainerSnapshot {
            id,
            name: container.name.clone(),
            fields: container.fields,
            children: container
                .children
                .iter()
                .filter_map(|c| self.children.get(c).cloned())
                .collect(),
        })
    }

    /// Capture a single child.
    pub fn snapshot_child(&self, id: ChildId) -> Result<ChildSnapshot> {
        self.children
            .get(&id)
            .cloned()
            .ok_or(WorldError::StaleChild(id))
    }

    /// Restore a container to a snapshot.
    ///
    /// - Revives the container if it was destroyed.
    /// - Revives destroyed children and reclaims children that were moved to
    ///   other containers, under their snapshot handles.
    /// - Detaches children currently listed that the snapshot does not
    ///   reference. Detached children stay alive; their handles are returned
    ///   so the caller can destroy or re-home them.
    pub fn restore_container(&mut self, snapshot: &ContainerSnapshot) -> Vec<ChildId> {
        let id = snapshot.id;
        self.ids.observe(id.raw());
        let previous = match self.containers.get(&id) {
            Some(existing) => existing.children.clone(),
            None => Vec::new(),
        };

        for child in &snapshot.children {
            self.ids.observe(child.id.raw());
            let moved_from = self
                .children
                .get(&child.id)
                .map(|c| c.owner)
                .filter(|owner| *owner != id);
            if let Some(owner) = moved_from
                && let Some(other) = self.containers.get_mut(&owner)
            {
                other.children.retain(|c| *c != child.id);
            }
            let mut state = child.clone();
            state.owner = id;
            self.children.insert(child.id, state);
        }

        let restored: Vec<ChildId> = snapshot.child_ids().collect();
        let detached: Vec<ChildId> = previous
            .into_iter()
            .filter(|c| !restored.contains(c))
            .collect();

        let container = self.containers.entry(id).or_insert_with(|| Container {
            id,
            name: String::new(),
            children: Vec::new(),
            fields: snapshot.fields,
            dirty: true,
        });
        container.name.clone_from(&snapshot.name);
        container.fields = snapshot.fields;
        container.children = restored;
        container.dirty = true;

        #[cfg(feature = "tracing")]
        tracing::trace!(
            target: "stackset.world",
            container = %id,
            children = container.children.len(),
            detached = detached.len(),
            "container restored"
        );
        detached
    }

    // ========================================================================
    // Consistency
    // ========================================================================

    /// Check ownership invariants, returning one message per violation.
    ///
    /// An empty list means the world is consistent.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        let mut listed: AHashMap<ChildId, ContainerId> = AHashMap::new();

        for id in self.container_ids() {
            let Some(container) = self.containers.get(&id) else {
                continue;
            };
            for child in &container.children {
                if !self.children.contains_key(child) {
                    errors.push(format!("{id} lists stale {child}"));
                }
                if let Some(first) = listed.insert(*child, id) {
                    errors.push(format!("{child} listed by both {first} and {id}"));
                }
            }
        }

        let mut children: Vec<_> = self.children.values().collect();
        children.sort_unstable_by_key(|c| c.id);
        for child in children {
            match listed.get(&child.id) {
                None => errors.push(format!("{} is orphaned", child.id)),
                Some(owner) if *owner != child.owner => errors.push(format!(
                    "{} claims owner {} but is listed by {}",
                    child.id, child.owner, owner
                )),
                Some(_) => {}
            }
        }
        errors
    }
}
